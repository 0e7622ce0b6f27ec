// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Four commands are supported:
//   1. `train`       — trains the summarizer on parallel files
//   2. `eval`        — scores a checkpoint (loss / perplexity)
//   3. `infer`       — summarises a file of documents
//   4. `build-vocab` — writes a vocabulary JSON from text
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{BuildVocabArgs, Commands, EvalArgs, InferArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "pgen-summarizer",
    version,
    about = "Train a pointer-generator summarizer with coverage, then summarise text with it."
)]
pub struct Cli {
    /// Log at debug level (RUST_LOG still takes precedence)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Also append plain-text logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(*args),
            Commands::Eval(args) => run_eval(args),
            Commands::Infer(args) => run_infer(args),
            Commands::BuildVocab(args) => run_build_vocab(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!(
        "Starting training on '{}' / '{}'",
        args.source_train_data,
        args.target_train_data
    );
    let model_dir = args.model_dir.clone();
    TrainUseCase::new(args.into()).execute()?;

    println!("Training complete. Checkpoints in '{model_dir}'.");
    Ok(())
}

fn run_eval(args: EvalArgs) -> Result<()> {
    use crate::application::eval_use_case::EvalUseCase;

    let report = EvalUseCase::new(args.model_dir, args.model_path, args.batch_size)
        .execute(&args.source_data, &args.target_data)?;

    println!(
        "loss={:.4} nll={:.4} coverage={:.4} perplexity={:.2} ({} tokens)",
        report.loss,
        report.nll,
        report.coverage_loss,
        report.perplexity(),
        report.tokens
    );
    Ok(())
}

fn run_infer(args: InferArgs) -> Result<()> {
    use crate::application::infer_use_case::{InferOptions, InferUseCase};

    let use_case = InferUseCase::new(
        &args.model_dir,
        InferOptions {
            model_path: args.model_path,
            beam_width: args.beam_width,
            batch_size: args.inference_batch_size,
            max_inference_step: args.max_inference_step,
        },
    )?;
    let written = use_case.execute(&args.inference_input, &args.inference_output)?;

    println!("Wrote {written} summaries to '{}'.", args.inference_output);
    Ok(())
}

fn run_build_vocab(args: BuildVocabArgs) -> Result<()> {
    use crate::application::vocab_use_case::BuildVocabUseCase;

    let vocab = BuildVocabUseCase::new(args.inputs, args.split_sign, args.max_size).execute(&args.output)?;

    println!("Wrote {} entries to '{}'.", vocab.len(), args.output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainConfig;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let cli = Cli::parse_from(["pgen-summarizer", "train"]);
        let Commands::Train(args) = cli.command else {
            panic!("expected train");
        };
        let from_cli: TrainConfig = (*args).into();
        let defaults = TrainConfig::default();
        assert_eq!(
            serde_json::to_value(&from_cli).unwrap(),
            serde_json::to_value(&defaults).unwrap()
        );
    }

    #[test]
    fn test_train_flags_parse_enums_and_negations() {
        let cli = Cli::parse_from([
            "pgen-summarizer",
            "--debug",
            "train",
            "--cell-type",
            "LSTM",
            "--attention-type",
            "luong",
            "--optimizer-type",
            "rmsprop",
            "--no-coverage",
            "--split-sign",
            "",
        ]);
        assert!(cli.debug);
        let Commands::Train(args) = cli.command else {
            panic!("expected train");
        };
        let cfg: TrainConfig = (*args).into();
        assert_eq!(cfg.cell_type, crate::ml::cell::CellType::Lstm);
        assert_eq!(cfg.attention_type, crate::ml::attention::AttentionType::Luong);
        assert_eq!(cfg.optimizer_type, crate::ml::optim::OptimizerKind::RmsProp);
        assert!(!cfg.coverage && cfg.pointer_gen);
        assert_eq!(cfg.split_sign, "");
    }

    #[test]
    fn test_adadelta_is_rejected_at_parse_time() {
        let result = Cli::try_parse_from(["pgen-summarizer", "train", "--optimizer-type", "adadelta"]);
        assert!(result.is_err());
    }
}
