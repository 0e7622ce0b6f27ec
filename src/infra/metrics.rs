// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one row per validation run to {model_dir}/metrics.csv:
//
//   step,epoch,train_loss,valid_loss,valid_perplexity
//   200,0,5.912300,5.870100,354.210000
//   400,1,5.301200,5.344800,209.470000
//
// The header is written only when the file is new, so resumed
// runs keep appending to the same log.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

const HEADER: &str = "step,epoch,train_loss,valid_loss,valid_perplexity";

/// One validation checkpoint in the training log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub step: usize,
    pub epoch: usize,
    /// Mean training loss since the previous validation run
    pub train_loss: f64,
    pub valid_loss: f64,
    /// exp(valid NLL)
    pub valid_perplexity: f64,
}

impl ValidationMetrics {
    pub fn is_improvement(&self, best_valid_loss: f64) -> bool {
        self.valid_loss < best_valid_loss
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &ValidationMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{},{:.6},{:.6},{:.6}",
            m.step, m.epoch, m.train_loss, m.valid_loss, m.valid_perplexity,
        )?;

        tracing::debug!(
            "Logged step {} metrics: train_loss={:.4}, valid_loss={:.4}",
            m.step,
            m.train_loss,
            m.valid_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(step: usize, valid_loss: f64) -> ValidationMetrics {
        ValidationMetrics {
            step,
            epoch: 0,
            train_loss: 3.0,
            valid_loss,
            valid_perplexity: valid_loss.exp(),
        }
    }

    #[test]
    fn test_is_improvement() {
        let m = row(10, 2.3);
        assert!(m.is_improvement(3.0));
        assert!(!m.is_improvement(2.0));
    }

    #[test]
    fn test_header_written_once_and_rows_appended() {
        let dir = tempfile::tempdir().unwrap();

        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&row(200, 2.0)).unwrap();
        // reopening (e.g. a resumed run) must not repeat the header
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&row(400, 1.5)).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].starts_with("200,0,3.000000,2.000000,"));
        assert!(lines[2].starts_with("400,0,"));
    }
}
