// ============================================================
// Layer 2 — EvalUseCase
// ============================================================
// Scores a trained checkpoint on a parallel source/summary set
// with teacher forcing: mean loss, NLL, coverage loss and
// perplexity, each averaged over target tokens.

use anyhow::Result;

use crate::application::infer_use_case::{restore, Restored};
use crate::data::{
    batcher::SummaryBatcher,
    dataset::SummaryDataset,
    iterator::{IteratorConfig, TextIterator},
    loader::ParallelTextLoader,
};
use crate::domain::{error::DataError, traits::PairSource};
use crate::infra::backend::InferBackend;
use crate::ml::trainer::{evaluate, EvalReport};

pub struct EvalUseCase {
    model_dir: String,
    model_path: Option<String>,
    batch_size: Option<usize>,
}

impl EvalUseCase {
    pub fn new(model_dir: impl Into<String>, model_path: Option<String>, batch_size: Option<usize>) -> Self {
        Self { model_dir: model_dir.into(), model_path, batch_size }
    }

    pub fn execute(&self, source_data: &str, target_data: &str) -> Result<EvalReport> {
        let Restored { cfg, source_vocab, target_vocab, model, device } =
            restore(&self.model_dir, self.model_path.as_deref())?;

        let pairs = ParallelTextLoader::new(source_data, target_data, cfg.preprocessor()).load_pairs()?;
        if pairs.is_empty() {
            return Err(DataError::EmptyDataset(format!("no usable pairs in '{source_data}'")).into());
        }
        let dataset = SummaryDataset::from_pairs(&pairs, &source_vocab, &target_vocab, cfg.vocab_limits(), cfg.step_limits());

        let batcher = SummaryBatcher::<InferBackend>::new(
            device,
            cfg.encoder_max_time_steps,
            cfg.decoder_max_time_steps,
            cfg.pointer_gen,
        );
        let mut iter = TextIterator::new(
            dataset,
            IteratorConfig {
                batch_size: self.batch_size.unwrap_or(cfg.batch_size),
                shuffle_each_epoch: false,
                ..cfg.iterator_config()
            },
        );

        let report = evaluate(&model, &mut iter, &batcher);
        tracing::info!(
            "Evaluated {} pairs ({} tokens): loss={:.4} nll={:.4} coverage={:.4} perplexity={:.2}",
            pairs.len(),
            report.tokens,
            report.loss,
            report.nll,
            report.coverage_loss,
            report.perplexity()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::application::train_use_case::{TrainConfig, TrainUseCase};

    #[test]
    fn test_eval_reports_finite_perplexity() {
        let dir = tempfile::tempdir().unwrap();
        let path = |name: &str| dir.path().join(name).display().to_string();
        fs::write(path("src.txt"), "a b c d\nb c d e\nc d\n").unwrap();
        fs::write(path("tgt.txt"), "a b\nb c\nd\n").unwrap();
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
            max_epochs: 1,
            ..TrainConfig::default()
        };
        TrainUseCase::new(cfg).execute().unwrap();

        let report = EvalUseCase::new(path("model"), None, Some(2))
            .execute(&path("src.txt"), &path("tgt.txt"))
            .unwrap();
        assert_eq!(report.batches, 2);
        // 2 + 2 + 1 target words, each plus </s>
        assert_eq!(report.tokens, 8);
        assert!(report.perplexity().is_finite() && report.perplexity() > 1.0);
    }

    #[test]
    fn test_eval_without_checkpoint_fails() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("model");
        let result = EvalUseCase::new(model_dir.display().to_string(), None, None).execute("a", "b");
        assert!(result.is_err());
    }
}
