// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate the configuration
//   Step 2: Load + tokenise training pairs     (Layer 4 - data)
//   Step 3: Load / build vocabularies          (Layer 6 - infra)
//   Step 4: Fix the effective vocab sizes
//   Step 5: Validation pairs (files or split)  (Layer 4 - data)
//   Step 6: Encode into datasets               (Layer 4 - data)
//   Step 7: Save config for eval/infer         (Layer 6 - infra)
//   Step 8: Run the training loop              (Layer 5 - ml)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::SummaryDataset,
    iterator::IteratorConfig,
    loader::ParallelTextLoader,
    preprocessor::Preprocessor,
    splitter::split_train_val,
};
use crate::domain::{
    error::DataError,
    example::{StepLimits, VocabLimits},
    traits::{PairSource, TextPair},
    vocab::Vocabulary,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::MetricsLogger,
    vocab_store,
};
use crate::ml::{
    attention::AttentionType,
    cell::CellType,
    model::PointerGeneratorConfig,
    optim::OptimizerKind,
    trainer::run_training,
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Every hyperparameter of a run. Saved as train_config.json next
// to the checkpoints; eval and infer rebuild the model from it.
// Missing fields in an older file fall back to the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    // ── Data ──
    pub source_vocabulary: String,
    pub target_vocabulary: String,
    pub source_train_data: String,
    pub target_train_data: String,
    pub source_valid_data: Option<String>,
    pub target_valid_data: Option<String>,
    /// Fraction of training pairs held out when no validation files are given
    pub valid_split: f64,
    /// Token separator; "" splits into characters
    pub split_sign: String,

    // ── Network ──
    pub cell_type: CellType,
    pub attention_type: AttentionType,
    pub hidden_units: usize,
    pub attention_units: usize,
    pub encoder_depth: usize,
    pub decoder_depth: usize,
    pub embedding_size: usize,
    /// Source vocabulary limit; ids at or above it become <unk>
    pub encoder_vocab_size: usize,
    /// Target vocabulary limit; also the generator's output size
    pub decoder_vocab_size: usize,
    pub use_residual: bool,
    pub use_dropout: bool,
    pub use_bidirectional: bool,
    pub dropout_rate: f64,
    pub pointer_gen: bool,
    pub coverage: bool,
    pub share_embedding: bool,
    pub coverage_loss_weight: f64,

    // ── Training ──
    pub learning_rate: f64,
    pub max_gradient_norm: f64,
    pub batch_size: usize,
    pub max_epochs: usize,
    pub max_load_batches: usize,
    pub encoder_max_time_steps: usize,
    pub decoder_max_time_steps: usize,
    pub display_freq: usize,
    pub save_freq: usize,
    pub valid_freq: usize,
    pub optimizer_type: OptimizerKind,
    pub model_dir: String,
    pub model_name: String,
    pub shuffle_each_epoch: bool,
    pub sort_by_length: bool,
    /// Continue from latest_checkpoint.json in model_dir
    pub resume: bool,
    pub seed: u64,

    // ── Decoding ──
    pub beam_width: usize,
    pub inference_batch_size: usize,
    pub max_inference_step: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            source_vocabulary: "data/vocab.json".to_string(),
            target_vocabulary: "data/vocab.json".to_string(),
            source_train_data: "data/sources.txt".to_string(),
            target_train_data: "data/summaries.txt".to_string(),
            source_valid_data: None,
            target_valid_data: None,
            valid_split: 0.0,
            split_sign: " ".to_string(),

            cell_type: CellType::Gru,
            attention_type: AttentionType::Bahdanau,
            hidden_units: 500,
            attention_units: 256,
            encoder_depth: 3,
            decoder_depth: 3,
            embedding_size: 300,
            encoder_vocab_size: 30000,
            decoder_vocab_size: 30000,
            use_residual: false,
            use_dropout: true,
            use_bidirectional: false,
            dropout_rate: 0.3,
            pointer_gen: true,
            coverage: true,
            share_embedding: false,
            coverage_loss_weight: 1.0,

            learning_rate: 0.0002,
            max_gradient_norm: 1.0,
            batch_size: 5,
            max_epochs: 10000,
            max_load_batches: 20,
            encoder_max_time_steps: 30,
            decoder_max_time_steps: 30,
            display_freq: 5,
            save_freq: 1000,
            valid_freq: 200,
            optimizer_type: OptimizerKind::Adam,
            model_dir: "checkpoints/summarizer".to_string(),
            model_name: "model".to_string(),
            shuffle_each_epoch: false,
            sort_by_length: false,
            resume: false,
            seed: 42,

            beam_width: 1,
            inference_batch_size: 256,
            max_inference_step: 60,
        }
    }
}

impl TrainConfig {
    pub fn model_config(&self) -> PointerGeneratorConfig {
        PointerGeneratorConfig::new(self.encoder_vocab_size, self.decoder_vocab_size)
            .with_embedding_size(self.embedding_size)
            .with_hidden_units(self.hidden_units)
            .with_attention_units(self.attention_units)
            .with_encoder_depth(self.encoder_depth)
            .with_decoder_depth(self.decoder_depth)
            .with_cell_type(self.cell_type)
            .with_attention_type(self.attention_type)
            .with_bidirectional(self.use_bidirectional)
            .with_residual(self.use_residual)
            .with_dropout(if self.use_dropout { self.dropout_rate } else { 0.0 })
            .with_pointer_gen(self.pointer_gen)
            .with_coverage(self.coverage)
            .with_share_embedding(self.share_embedding)
            .with_coverage_loss_weight(self.coverage_loss_weight)
    }

    pub fn iterator_config(&self) -> IteratorConfig {
        IteratorConfig {
            batch_size: self.batch_size,
            max_load_batches: self.max_load_batches,
            sort_by_length: self.sort_by_length,
            shuffle_each_epoch: self.shuffle_each_epoch,
            seed: self.seed,
        }
    }

    pub fn preprocessor(&self) -> Preprocessor {
        Preprocessor::new(self.split_sign.clone())
    }

    /// The limits the model was (or will be) built with.
    pub fn vocab_limits(&self) -> VocabLimits {
        VocabLimits {
            source: self.encoder_vocab_size,
            target: self.decoder_vocab_size,
        }
    }

    pub fn step_limits(&self) -> StepLimits {
        StepLimits {
            source: self.encoder_max_time_steps,
            target: self.decoder_max_time_steps,
        }
    }

    /// Shrink the vocab limits to what the loaded vocabularies
    /// actually hold, so no embedding row is left untrained.
    pub fn fit_vocab_sizes(&mut self, source: &Vocabulary, target: &Vocabulary) {
        let (src, tgt) = (
            self.encoder_vocab_size.min(source.len()),
            self.decoder_vocab_size.min(target.len()),
        );
        if src != self.encoder_vocab_size || tgt != self.decoder_vocab_size {
            tracing::info!(
                "Vocabulary sizes adjusted to the files: source {} → {}, target {} → {}",
                self.encoder_vocab_size, src, self.decoder_vocab_size, tgt
            );
        }
        self.encoder_vocab_size = src;
        self.decoder_vocab_size = tgt;
    }

    pub fn validate(&self) -> Result<(), DataError> {
        let positive = [
            ("batch_size", self.batch_size),
            ("max_load_batches", self.max_load_batches),
            ("encoder_max_time_steps", self.encoder_max_time_steps),
            ("decoder_max_time_steps", self.decoder_max_time_steps),
            ("display_freq", self.display_freq),
            ("save_freq", self.save_freq),
            ("valid_freq", self.valid_freq),
            ("beam_width", self.beam_width),
            ("inference_batch_size", self.inference_batch_size),
            ("max_inference_step", self.max_inference_step),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(DataError::InvalidConfig(format!("{name} must be greater than zero")));
        }
        if !(0.0..1.0).contains(&self.valid_split) {
            return Err(DataError::InvalidConfig(format!(
                "valid_split must be in [0, 1), got {}",
                self.valid_split
            )));
        }
        if self.learning_rate <= 0.0 {
            return Err(DataError::InvalidConfig("learning_rate must be positive".into()));
        }
        if self.source_valid_data.is_some() != self.target_valid_data.is_some() {
            return Err(DataError::InvalidConfig(
                "source_valid_data and target_valid_data must be given together".into(),
            ));
        }
        self.model_config().validate()
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let mut cfg = self.config.clone();

        // ── Step 1: Validate ────────────────────────────────────────────────
        cfg.validate().context("Invalid training configuration")?;

        // ── Step 2: Load training pairs ─────────────────────────────────────
        let preprocessor = cfg.preprocessor();
        let train_pairs = ParallelTextLoader::new(
            &cfg.source_train_data,
            &cfg.target_train_data,
            preprocessor.clone(),
        )
        .load_pairs()?;

        // ── Step 3: Vocabularies ────────────────────────────────────────────
        let (source_vocab, target_vocab) = load_vocabularies(&cfg, &train_pairs)?;

        // ── Step 4: Effective vocab sizes ───────────────────────────────────
        cfg.fit_vocab_sizes(&source_vocab, &target_vocab);
        cfg.validate().context("Invalid configuration after fitting vocabulary sizes")?;
        let (limits, steps) = (cfg.vocab_limits(), cfg.step_limits());

        // ── Step 5: Validation pairs ────────────────────────────────────────
        let (train_pairs, valid_pairs) = match (&cfg.source_valid_data, &cfg.target_valid_data) {
            (Some(src), Some(tgt)) => {
                let valid = ParallelTextLoader::new(src, tgt, preprocessor).load_pairs()?;
                (train_pairs, valid)
            }
            _ if cfg.valid_split > 0.0 => split_train_val(train_pairs, cfg.valid_split, cfg.seed),
            _ => (train_pairs, Vec::new()),
        };
        tracing::info!(
            "Split: {} train, {} validation",
            train_pairs.len(),
            valid_pairs.len()
        );

        // ── Step 6: Datasets ────────────────────────────────────────────────
        let train_dataset = SummaryDataset::from_pairs(&train_pairs, &source_vocab, &target_vocab, limits, steps);
        let valid_dataset = (!valid_pairs.is_empty())
            .then(|| SummaryDataset::from_pairs(&valid_pairs, &source_vocab, &target_vocab, limits, steps));

        // ── Step 7: Save config ─────────────────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.model_dir, cfg.model_name.clone())?;
        ckpt_manager.save_config(&cfg)?;
        let metrics = MetricsLogger::new(&cfg.model_dir)?;

        // ── Step 8: Train ───────────────────────────────────────────────────
        run_training(&cfg, train_dataset, valid_dataset, ckpt_manager, metrics)
    }
}

/// Load both vocabularies, building missing files from the
/// training pairs. A single shared file is built from both sides.
fn load_vocabularies(cfg: &TrainConfig, pairs: &[TextPair]) -> Result<(Vocabulary, Vocabulary)> {
    if cfg.source_vocabulary == cfg.target_vocabulary {
        let corpus = pairs.iter().flat_map(|p| [&p.source, &p.target]);
        let size = cfg.encoder_vocab_size.max(cfg.decoder_vocab_size);
        let vocab = vocab_store::load_or_build(&cfg.source_vocabulary, corpus, size)?;
        return Ok((vocab.clone(), vocab));
    }

    let source = vocab_store::load_or_build(
        &cfg.source_vocabulary,
        pairs.iter().map(|p| &p.source),
        cfg.encoder_vocab_size,
    )?;
    let target = vocab_store::load_or_build(
        &cfg.target_vocabulary,
        pairs.iter().map(|p| &p.target),
        cfg.decoder_vocab_size,
    )?;
    Ok((source, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn test_use_dropout_false_zeroes_rate() {
        let cfg = TrainConfig {
            use_dropout: false,
            ..TrainConfig::default()
        };
        assert_eq!(cfg.model_config().dropout, 0.0);
        assert_eq!(TrainConfig::default().model_config().dropout, 0.3);
    }

    #[test]
    fn test_validate_catches_half_validation_pair() {
        let cfg = TrainConfig {
            source_valid_data: Some("valid.x".into()),
            ..TrainConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_config_json_fills_missing_fields_with_defaults() {
        let cfg: TrainConfig = serde_json::from_str(r#"{"hidden_units": 32, "cell_type": "lstm"}"#).unwrap();
        assert_eq!(cfg.hidden_units, 32);
        assert_eq!(cfg.cell_type, CellType::Lstm);
        assert_eq!(cfg.batch_size, 5);
    }

    #[test]
    fn test_step_limits_follow_time_step_caps() {
        let cfg = TrainConfig {
            encoder_max_time_steps: 12,
            decoder_max_time_steps: 4,
            ..TrainConfig::default()
        };
        assert_eq!(cfg.step_limits(), StepLimits { source: 12, target: 4 });
    }

    #[test]
    fn test_fit_vocab_sizes_shrinks_to_files() {
        let mut cfg = TrainConfig::default();
        let src = Vocabulary::from_words(["a", "b"]);
        let tgt = Vocabulary::from_words(["c"]);
        cfg.fit_vocab_sizes(&src, &tgt);
        assert_eq!(cfg.vocab_limits(), VocabLimits { source: 6, target: 5 });
    }

    #[test]
    fn test_shared_vocabulary_built_from_both_sides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.json").display().to_string();
        let cfg = TrainConfig {
            source_vocabulary: path.clone(),
            target_vocabulary: path.clone(),
            ..TrainConfig::default()
        };
        let pairs = vec![TextPair::new(vec!["long".into(), "text".into()], vec!["short".into()])];

        let (src, tgt) = load_vocabularies(&cfg, &pairs).unwrap();
        assert_eq!(src, tgt);
        assert_ne!(src.id("short"), crate::domain::vocab::UNK);
        assert!(fs::metadata(&path).is_ok());
    }

    #[test]
    fn test_execute_trains_tiny_model_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = |name: &str| dir.path().join(name).display().to_string();
        fs::write(path("src.txt"), "a b c d\nb c d e\nc d e a\n").unwrap();
        fs::write(path("tgt.txt"), "a b\nb c\nc d\n").unwrap();

        let cfg = TrainConfig {
            source_vocabulary: path("vocab.json"),
            target_vocabulary: path("vocab.json"),
            source_train_data: path("src.txt"),
            target_train_data: path("tgt.txt"),
            model_dir: path("model"),
            hidden_units: 8,
            attention_units: 4,
            embedding_size: 6,
            encoder_depth: 1,
            decoder_depth: 1,
            batch_size: 2,
            max_epochs: 2,
            display_freq: 1,
            save_freq: 100,
            valid_freq: 1,
            valid_split: 0.34,
            ..TrainConfig::default()
        };
        TrainUseCase::new(cfg).execute().unwrap();

        let ckpt = CheckpointManager::new(path("model"), "model").unwrap();
        let latest = ckpt.latest().unwrap().expect("checkpoint written");
        assert_eq!(latest.epoch, 2);
        // 2 train pairs, batch 2 → one step per epoch
        assert_eq!(latest.step, 2);
        let saved = ckpt.load_config().unwrap();
        assert_eq!(saved.decoder_vocab_size, 9);
        let csv = fs::read_to_string(dir.path().join("model").join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }
}
