// ============================================================
// Layer 2 — InferUseCase
// ============================================================
// Summarises a file of documents, one per line:
//
//   Step 1: Read train_config.json from the model directory
//   Step 2: Load both vocabularies                  (Layer 6)
//   Step 3: Rebuild the model, load the checkpoint  (Layer 6)
//   Step 4: Tokenise input lines                    (Layer 4)
//   Step 5: Decode in batches of inference_batch_size (Layer 5)
//   Step 6: Map ids back to words, copied OOVs included,
//           and write one summary per line

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::application::train_use_case::TrainConfig;
use crate::data::{loader::read_lines, preprocessor::Preprocessor};
use crate::domain::{example::SummaryExample, traits::Summarizer, vocab::Vocabulary};
use crate::infra::{
    backend::{default_device, Device, InferBackend},
    checkpoint::{load_config_from, CheckpointManager},
    vocab_store,
};
use crate::ml::{
    inferencer::{DecodeSettings, Inferencer},
    model::PointerGeneratorModel,
};

/// A trained model with everything needed to feed it.
pub(crate) struct Restored {
    pub cfg: TrainConfig,
    pub source_vocab: Vocabulary,
    pub target_vocab: Vocabulary,
    pub model: PointerGeneratorModel<InferBackend>,
    pub device: Device,
}

/// Rebuild the model from `{model_dir}/train_config.json` and load
/// either `model_path` or the latest checkpoint into it.
pub(crate) fn restore(model_dir: &str, model_path: Option<&str>) -> Result<Restored> {
    let cfg = load_config_from(model_dir)?;
    let source_vocab = vocab_store::load(&cfg.source_vocabulary)?;
    let target_vocab = vocab_store::load(&cfg.target_vocabulary)?;

    let device = default_device();
    let ckpt = CheckpointManager::new(model_dir, cfg.model_name.clone())?;
    let model: PointerGeneratorModel<InferBackend> = cfg.model_config().with_dropout(0.0).init(&device);
    let model = match model_path {
        Some(path) => ckpt.load_from(model, path, &device)?,
        None => ckpt.load_latest(model, &device)?.0,
    };
    tracing::info!("Model loaded from '{}'", model_dir);

    Ok(Restored { cfg, source_vocab, target_vocab, model, device })
}

/// Command-line overrides for decoding; None keeps the trained value.
#[derive(Debug, Clone, Default)]
pub struct InferOptions {
    pub model_path: Option<String>,
    pub beam_width: Option<usize>,
    pub batch_size: Option<usize>,
    pub max_inference_step: Option<usize>,
}

pub struct InferUseCase {
    cfg: TrainConfig,
    source_vocab: Vocabulary,
    target_vocab: Vocabulary,
    preprocessor: Preprocessor,
    inferencer: Inferencer<InferBackend>,
    settings: DecodeSettings,
    batch_size: usize,
}

impl InferUseCase {
    pub fn new(model_dir: &str, options: InferOptions) -> Result<Self> {
        let Restored { mut cfg, source_vocab, target_vocab, model, device } =
            restore(model_dir, options.model_path.as_deref())?;

        if let Some(w) = options.beam_width {
            cfg.beam_width = w;
        }
        if let Some(b) = options.batch_size {
            cfg.inference_batch_size = b;
        }
        if let Some(s) = options.max_inference_step {
            cfg.max_inference_step = s;
        }
        cfg.validate().context("Invalid decoding options")?;

        let settings = DecodeSettings {
            beam_width: cfg.beam_width,
            max_steps: cfg.max_inference_step,
        };
        tracing::info!(
            "Decoding with {} (max {} steps)",
            if settings.beam_width > 1 { format!("beam search, width {}", settings.beam_width) } else { "greedy search".to_string() },
            settings.max_steps
        );

        Ok(Self {
            preprocessor: cfg.preprocessor(),
            inferencer: Inferencer::new(model, device, cfg.encoder_max_time_steps),
            batch_size: cfg.inference_batch_size,
            settings,
            cfg,
            source_vocab,
            target_vocab,
        })
    }

    /// Summarise every line of `input` into `output`. Returns the
    /// number of lines written.
    pub fn execute(&self, input: &str, output: &str) -> Result<usize> {
        let lines = read_lines(input)?;
        let documents: Vec<Vec<String>> = lines.iter().map(|l| self.preprocessor.tokenize(l)).collect();
        let empty = documents.iter().filter(|d| d.is_empty()).count();
        if empty > 0 {
            tracing::warn!("{} empty input lines; their summaries will be empty or noise", empty);
        }
        tracing::info!("Summarising {} documents from '{}'", documents.len(), input);

        let summaries = self.summarize(&documents)?;

        let mut text = String::new();
        for summary in &summaries {
            text.push_str(&self.preprocessor.join(summary));
            text.push('\n');
        }
        if let Some(parent) = Path::new(output).parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        fs::write(output, text).with_context(|| format!("Cannot write summaries to '{output}'"))?;

        tracing::info!("Wrote {} summaries to '{}'", summaries.len(), output);
        Ok(summaries.len())
    }
}

impl Summarizer for InferUseCase {
    fn summarize(&self, documents: &[Vec<String>]) -> Result<Vec<Vec<String>>> {
        let limits = self.cfg.vocab_limits();
        let max_source = self.cfg.encoder_max_time_steps;
        let mut summaries = Vec::with_capacity(documents.len());

        for (i, chunk) in documents.chunks(self.batch_size).enumerate() {
            let examples: Vec<SummaryExample> = chunk
                .iter()
                .map(|doc| {
                    let doc = &doc[..doc.len().min(max_source)];
                    SummaryExample::encode_source(doc, &self.source_vocab, &self.target_vocab, limits)
                })
                .collect();

            let hypotheses = self.inferencer.decode(examples.clone(), self.settings);
            for (example, hyp) in examples.iter().zip(hypotheses) {
                summaries.push(example.decode_extended(&hyp.ids, &self.target_vocab, limits.target));
            }
            tracing::debug!("Decoded batch {} ({} documents)", i + 1, chunk.len());
        }
        Ok(summaries)
    }
}
