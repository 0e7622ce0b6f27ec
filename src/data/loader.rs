// ============================================================
// Layer 4 — Parallel Text Loader
// ============================================================
// Reads a source file and a target file line by line and
// pairs line i of one with line i of the other:
//
//   sources.txt                    summaries.txt
//   "police arrest man in ..."  ↔  "man arrested"
//   "stocks fell sharply ..."   ↔  "stocks fall"
//
// Pairs where either side tokenises to nothing are skipped
// (and logged at debug level); pairs longer than max_length
// on either side are dropped when a limit is set.

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::data::preprocessor::Preprocessor;
use crate::domain::error::DataError;
use crate::domain::traits::{PairSource, TextPair};

pub struct ParallelTextLoader {
    source_path: String,
    target_path: String,
    preprocessor: Preprocessor,
    max_length: Option<usize>,
}

impl ParallelTextLoader {
    pub fn new(
        source_path: impl Into<String>,
        target_path: impl Into<String>,
        preprocessor: Preprocessor,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            target_path: target_path.into(),
            preprocessor,
            max_length: None,
        }
    }

    pub fn with_max_length(mut self, max_length: Option<usize>) -> Self {
        self.max_length = max_length;
        self
    }
}

impl PairSource for ParallelTextLoader {
    fn load_pairs(&self) -> Result<Vec<TextPair>> {
        let sources = read_lines(&self.source_path)?;
        let targets = read_lines(&self.target_path)?;

        if sources.len() != targets.len() {
            return Err(DataError::LineCountMismatch {
                source_lines: sources.len(),
                target_lines: targets.len(),
            })
            .with_context(|| {
                format!("Pairing '{}' with '{}'", self.source_path, self.target_path)
            });
        }

        let mut pairs = Vec::with_capacity(sources.len());
        let mut skipped = 0usize;

        for (line_no, (src, tgt)) in sources.iter().zip(targets.iter()).enumerate() {
            let source = self.preprocessor.tokenize(src);
            let target = self.preprocessor.tokenize(tgt);

            if source.is_empty() || target.is_empty() {
                tracing::debug!("Skipping empty pair at line {}", line_no + 1);
                skipped += 1;
                continue;
            }
            if let Some(max) = self.max_length {
                if source.len() > max || target.len() > max {
                    skipped += 1;
                    continue;
                }
            }
            pairs.push(TextPair::new(source, target));
        }

        tracing::info!(
            "Loaded {} pairs from '{}' ({} skipped)",
            pairs.len(),
            self.source_path,
            skipped
        );
        Ok(pairs)
    }
}

/// Read a UTF-8 text file into lines (without terminators).
pub fn read_lines(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(text.lines().map(str::to_string).collect())
}
