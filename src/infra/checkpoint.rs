// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What gets saved per checkpoint:
//   1. Model weights ({model_name}-{step}.mpk)
//   2. Optimizer state ({model_name}-{step}-optim.mpk), so a
//      resumed run keeps its Adam/RMSProp moments
//   3. latest_checkpoint.json  — {"step": …, "epoch": …}
//
// Plus, once per run:
//   train_config.json — every hyperparameter, so eval/infer can
//                       rebuild the exact architecture before
//                       loading weights into it.
//
// File layout:
//   checkpoints/summarizer/
//     model-1000.mpk
//     model-1000-optim.mpk
//     model-2000.mpk
//     ...
//     latest_checkpoint.json
//     train_config.json
//     metrics.csv
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{bail, Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Record, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::PointerGeneratorModel;

const LATEST_FILE: &str = "latest_checkpoint.json";
const CONFIG_FILE: &str = "train_config.json";
// CompactRecorder writes uncompressed named MessagePack
const RECORD_EXTENSION: &str = ".mpk";

/// Position in training at which a checkpoint was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointInfo {
    /// Global optimizer step
    pub step: usize,
    /// Completed epochs
    pub epoch: usize,
}

pub struct CheckpointManager {
    dir: PathBuf,
    model_name: String,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>, model_name: impl Into<String>) -> Result<Self> {
        let dir = dir.into();
        let model_name = model_name.into();
        // the recorder rewrites everything after the first dot as an extension
        if model_name.is_empty() || model_name.contains(['.', '/', '\\']) {
            bail!("Invalid model name '{model_name}': use letters, digits, '-' or '_'");
        }
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir, model_name })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Weight file for `step`, without the recorder extension.
    pub fn model_path(&self, step: usize) -> PathBuf {
        self.dir.join(format!("{}-{step}", self.model_name))
    }

    fn optimizer_path(&self, step: usize) -> PathBuf {
        self.dir.join(format!("{}-{step}-optim", self.model_name))
    }

    /// Save model weights and move the latest pointer to `info`.
    pub fn save<B: Backend>(&self, model: &PointerGeneratorModel<B>, info: CheckpointInfo) -> Result<PathBuf> {
        let path = self.model_path(info.step);

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let latest_path = self.dir.join(LATEST_FILE);
        fs::write(&latest_path, serde_json::to_string(&info)?)
            .with_context(|| format!("Failed to write '{}'", latest_path.display()))?;

        tracing::info!("Saved checkpoint '{}' (epoch {})", path.display(), info.epoch);
        Ok(path)
    }

    pub fn save_optimizer<B: Backend, R: Record<B>>(&self, record: R, step: usize) -> Result<()> {
        let path = self.optimizer_path(step);
        CompactRecorder::new()
            .record(record, path.clone())
            .with_context(|| format!("Failed to save optimizer state to '{}'", path.display()))?;
        Ok(())
    }

    /// Optimizer state saved with the checkpoint at `step`, if any.
    pub fn load_optimizer<B: Backend, R: Record<B>>(&self, step: usize, device: &B::Device) -> Result<Option<R>> {
        let path = self.optimizer_path(step);
        if !with_extension(&path).exists() {
            return Ok(None);
        }
        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| format!("Cannot load optimizer state '{}'", path.display()))?;
        Ok(Some(record))
    }

    /// The latest checkpoint pointer, or None before the first save.
    pub fn latest(&self) -> Result<Option<CheckpointInfo>> {
        let path = self.dir.join(LATEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        let info = serde_json::from_str(&s)
            .with_context(|| format!("Corrupt checkpoint pointer '{}'", path.display()))?;
        Ok(Some(info))
    }

    pub fn load_latest<B: Backend>(
        &self,
        model: PointerGeneratorModel<B>,
        device: &B::Device,
    ) -> Result<(PointerGeneratorModel<B>, CheckpointInfo)> {
        let Some(info) = self.latest()? else {
            bail!(
                "No checkpoint in '{}'. Have you run 'train' first?",
                self.dir.display()
            );
        };
        tracing::info!("Loading checkpoint from step {}", info.step);
        let model = self.load_from(model, self.model_path(info.step), device)?;
        Ok((model, info))
    }

    /// Load weights from an explicit path; the `.mpk` suffix is
    /// optional.
    pub fn load_from<B: Backend>(
        &self,
        model: PointerGeneratorModel<B>,
        path: impl AsRef<Path>,
        device: &B::Device,
    ) -> Result<PointerGeneratorModel<B>> {
        let path = strip_extension(path.as_ref());
        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load checkpoint '{}'. Does it match train_config.json?",
                    path.display()
                )
            })?;
        Ok(model.load_record(record))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        load_config_from(&self.dir)
    }
}

/// Read `train_config.json` from a model directory without
/// creating anything.
pub fn load_config_from(dir: impl AsRef<Path>) -> Result<TrainConfig> {
    let path = dir.as_ref().join(CONFIG_FILE);
    let json = fs::read_to_string(&path).with_context(|| {
        format!(
            "Cannot read config from '{}'. \
             Make sure you have run 'train' before 'eval' or 'infer'.",
            path.display()
        )
    })?;
    serde_json::from_str(&json).with_context(|| format!("Invalid config '{}'", path.display()))
}

fn with_extension(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(RECORD_EXTENSION);
    PathBuf::from(s)
}

fn strip_extension(path: &Path) -> PathBuf {
    match path.to_str().and_then(|s| s.strip_suffix(RECORD_EXTENSION)) {
        Some(stem) => PathBuf::from(stem),
        None => path.to_path_buf(),
    }
}
