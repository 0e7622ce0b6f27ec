// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the subcommands `train`, `eval`, `infer` and
// `build-vocab` and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, CellType, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::ml::{attention::AttentionType, cell::CellType, optim::OptimizerKind};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the pointer-generator on parallel source/summary files
    Train(Box<TrainArgs>),

    /// Score a trained checkpoint on a source/summary set
    Eval(EvalArgs),

    /// Summarise a file of documents, one per line
    Infer(InferArgs),

    /// Build a vocabulary JSON file from text files
    BuildVocab(BuildVocabArgs),
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    // ── Data ──────────────────────────────────────────────────────────────────
    /// Source vocabulary JSON (built from the training data if missing)
    #[arg(long, default_value = "data/vocab.json")]
    pub source_vocabulary: String,

    /// Target vocabulary JSON; may be the same file as the source one
    #[arg(long, default_value = "data/vocab.json")]
    pub target_vocabulary: String,

    #[arg(long, default_value = "data/sources.txt")]
    pub source_train_data: String,

    #[arg(long, default_value = "data/summaries.txt")]
    pub target_train_data: String,

    #[arg(long)]
    pub source_valid_data: Option<String>,

    #[arg(long)]
    pub target_valid_data: Option<String>,

    /// Fraction of training pairs held out for validation when no
    /// validation files are given
    #[arg(long, default_value_t = 0.0)]
    pub valid_split: f64,

    /// Token separator; an empty string splits into characters
    #[arg(long, default_value = " ")]
    pub split_sign: String,

    // ── Network ───────────────────────────────────────────────────────────────
    /// RNN cell for encoder and decoder: gru or lstm
    #[arg(long, default_value = "gru")]
    pub cell_type: CellType,

    /// Attention mechanism: bahdanau or luong
    #[arg(long, default_value = "bahdanau")]
    pub attention_type: AttentionType,

    #[arg(long, default_value_t = 500)]
    pub hidden_units: usize,

    #[arg(long, default_value_t = 256)]
    pub attention_units: usize,

    #[arg(long, default_value_t = 3)]
    pub encoder_depth: usize,

    #[arg(long, default_value_t = 3)]
    pub decoder_depth: usize,

    #[arg(long, default_value_t = 300)]
    pub embedding_size: usize,

    /// Source vocabulary size; rarer words become <unk>
    #[arg(long, default_value_t = 30000)]
    pub encoder_vocab_size: usize,

    /// Target vocabulary size (generator output size)
    #[arg(long, default_value_t = 30000)]
    pub decoder_vocab_size: usize,

    #[arg(long)]
    pub use_residual: bool,

    /// Disable dropout in the RNN layers
    #[arg(long)]
    pub no_dropout: bool,

    #[arg(long)]
    pub use_bidirectional: bool,

    #[arg(long, default_value_t = 0.3)]
    pub dropout_rate: f64,

    /// Turn off the copy mechanism (plain attention seq2seq)
    #[arg(long)]
    pub no_pointer_gen: bool,

    /// Turn off the coverage mechanism and its loss
    #[arg(long)]
    pub no_coverage: bool,

    /// Decoder reuses the encoder embedding (needs equal vocab sizes)
    #[arg(long)]
    pub share_embedding: bool,

    #[arg(long, default_value_t = 1.0)]
    pub coverage_loss_weight: f64,

    // ── Training ──────────────────────────────────────────────────────────────
    #[arg(long, default_value_t = 0.0002)]
    pub learning_rate: f64,

    /// Clip each gradient to this L2 norm (0 disables clipping)
    #[arg(long, default_value_t = 1.0)]
    pub max_gradient_norm: f64,

    #[arg(long, default_value_t = 5)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 10000)]
    pub max_epochs: usize,

    /// Batches prefetched (and optionally sorted) at a time
    #[arg(long, default_value_t = 20)]
    pub max_load_batches: usize,

    #[arg(long, default_value_t = 30)]
    pub encoder_max_time_steps: usize,

    #[arg(long, default_value_t = 30)]
    pub decoder_max_time_steps: usize,

    #[arg(long, default_value_t = 5)]
    pub display_freq: usize,

    #[arg(long, default_value_t = 1000)]
    pub save_freq: usize,

    #[arg(long, default_value_t = 200)]
    pub valid_freq: usize,

    /// adam, rmsprop or adagrad
    #[arg(long, default_value = "adam")]
    pub optimizer_type: OptimizerKind,

    #[arg(long, default_value = "checkpoints/summarizer")]
    pub model_dir: String,

    #[arg(long, default_value = "model")]
    pub model_name: String,

    #[arg(long)]
    pub shuffle_each_epoch: bool,

    #[arg(long)]
    pub sort_by_length: bool,

    /// Continue from the latest checkpoint in --model-dir
    #[arg(long)]
    pub resume: bool,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    // ── Decoding defaults stored with the model ───────────────────────────────
    #[arg(long, default_value_t = 1)]
    pub beam_width: usize,

    #[arg(long, default_value_t = 256)]
    pub inference_batch_size: usize,

    #[arg(long, default_value_t = 60)]
    pub max_inference_step: usize,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            source_vocabulary: a.source_vocabulary,
            target_vocabulary: a.target_vocabulary,
            source_train_data: a.source_train_data,
            target_train_data: a.target_train_data,
            source_valid_data: a.source_valid_data,
            target_valid_data: a.target_valid_data,
            valid_split: a.valid_split,
            split_sign: a.split_sign,
            cell_type: a.cell_type,
            attention_type: a.attention_type,
            hidden_units: a.hidden_units,
            attention_units: a.attention_units,
            encoder_depth: a.encoder_depth,
            decoder_depth: a.decoder_depth,
            embedding_size: a.embedding_size,
            encoder_vocab_size: a.encoder_vocab_size,
            decoder_vocab_size: a.decoder_vocab_size,
            use_residual: a.use_residual,
            use_dropout: !a.no_dropout,
            use_bidirectional: a.use_bidirectional,
            dropout_rate: a.dropout_rate,
            pointer_gen: !a.no_pointer_gen,
            coverage: !a.no_coverage,
            share_embedding: a.share_embedding,
            coverage_loss_weight: a.coverage_loss_weight,
            learning_rate: a.learning_rate,
            max_gradient_norm: a.max_gradient_norm,
            batch_size: a.batch_size,
            max_epochs: a.max_epochs,
            max_load_batches: a.max_load_batches,
            encoder_max_time_steps: a.encoder_max_time_steps,
            decoder_max_time_steps: a.decoder_max_time_steps,
            display_freq: a.display_freq,
            save_freq: a.save_freq,
            valid_freq: a.valid_freq,
            optimizer_type: a.optimizer_type,
            model_dir: a.model_dir,
            model_name: a.model_name,
            shuffle_each_epoch: a.shuffle_each_epoch,
            sort_by_length: a.sort_by_length,
            resume: a.resume,
            seed: a.seed,
            beam_width: a.beam_width,
            inference_batch_size: a.inference_batch_size,
            max_inference_step: a.max_inference_step,
        }
    }
}

/// All arguments for the `eval` command
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Directory the model was trained into
    #[arg(long, default_value = "checkpoints/summarizer")]
    pub model_dir: String,

    /// Specific checkpoint (default: the latest in --model-dir)
    #[arg(long)]
    pub model_path: Option<String>,

    #[arg(long)]
    pub source_data: String,

    #[arg(long)]
    pub target_data: String,

    /// Batch size (default: the training batch size)
    #[arg(long)]
    pub batch_size: Option<usize>,
}

/// All arguments for the `infer` command
#[derive(Args, Debug)]
pub struct InferArgs {
    /// Directory the model was trained into
    #[arg(long, default_value = "checkpoints/summarizer")]
    pub model_dir: String,

    /// Specific checkpoint (default: the latest in --model-dir)
    #[arg(long)]
    pub model_path: Option<String>,

    /// Documents to summarise, one per line
    #[arg(long)]
    pub inference_input: String,

    /// Where to write the summaries, one per line
    #[arg(long)]
    pub inference_output: String,

    /// Overrides the value stored with the model
    #[arg(long)]
    pub beam_width: Option<usize>,

    #[arg(long)]
    pub inference_batch_size: Option<usize>,

    #[arg(long)]
    pub max_inference_step: Option<usize>,
}

/// All arguments for the `build-vocab` command
#[derive(Args, Debug)]
pub struct BuildVocabArgs {
    /// Text files to count tokens in
    #[arg(long = "input", required = true, num_args = 1..)]
    pub inputs: Vec<String>,

    #[arg(long)]
    pub output: String,

    /// Maximum entries, special tokens included
    #[arg(long, default_value_t = 30000)]
    pub max_size: usize,

    #[arg(long, default_value = " ")]
    pub split_sign: String,
}
