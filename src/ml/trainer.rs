// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Step-driven train loop over the TextIterator:
//
//   for each epoch (until max_epochs):
//     for each batch:
//       forward_train ─► loss.backward ─► optimizer step
//       every display_freq: loss, perplexity, steps/s, words/s
//       every valid_freq:   evaluate on model.valid(), CSV row
//       every save_freq:    checkpoint
//     end of epoch: checkpoint
//
// Burn insight (same as any Autodiff setup):
//   - Training uses TrainBackend (Autodiff<InferBackend>)
//   - model.valid() returns the model on InferBackend, without
//     dropout and without building a graph
//   - the validation batcher must therefore use InferBackend
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use std::time::Instant;

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::SummaryBatcher,
    dataset::SummaryDataset,
    iterator::{IteratorConfig, TextIterator},
};
use crate::domain::{error::DataError, example::SummaryExample};
use crate::infra::{
    backend::{backend_name, default_device, Device, InferBackend, TrainBackend},
    checkpoint::{CheckpointInfo, CheckpointManager},
    metrics::{MetricsLogger, ValidationMetrics},
};
use crate::ml::model::{PointerGeneratorConfig, PointerGeneratorModel};
use crate::ml::optim::{self, OptimizerKind};

pub fn run_training(
    cfg: &TrainConfig,
    train_dataset: SummaryDataset,
    valid_dataset: Option<SummaryDataset>,
    ckpt_manager: CheckpointManager,
    metrics: MetricsLogger,
) -> Result<()> {
    if train_dataset.is_empty() {
        return Err(DataError::EmptyDataset(format!(
            "no usable training pairs in '{}'",
            cfg.source_train_data
        ))
        .into());
    }

    let device = default_device();
    tracing::info!("Using {} backend, device {:?}", backend_name(), device);

    let model_cfg = cfg.model_config();
    let session = Session { cfg, ckpt: &ckpt_manager, metrics: &metrics };
    let clip = cfg.max_gradient_norm;

    type Model = PointerGeneratorModel<TrainBackend>;
    match cfg.optimizer_type {
        OptimizerKind::Adam => session.train_loop(
            model_cfg,
            train_dataset,
            valid_dataset,
            optim::adam(clip).init::<TrainBackend, Model>(),
            device,
        ),
        OptimizerKind::RmsProp => session.train_loop(
            model_cfg,
            train_dataset,
            valid_dataset,
            optim::rmsprop(clip).init::<TrainBackend, Model>(),
            device,
        ),
        OptimizerKind::AdaGrad => session.train_loop(
            model_cfg,
            train_dataset,
            valid_dataset,
            optim::adagrad(clip).init::<TrainBackend, Model>(),
            device,
        ),
    }
}

struct Session<'a> {
    cfg: &'a TrainConfig,
    ckpt: &'a CheckpointManager,
    metrics: &'a MetricsLogger,
}

impl Session<'_> {
    fn train_loop<O>(
        &self,
        model_cfg: PointerGeneratorConfig,
        train_dataset: SummaryDataset,
        valid_dataset: Option<SummaryDataset>,
        mut optim: O,
        device: Device,
    ) -> Result<()>
    where
        O: Optimizer<PointerGeneratorModel<TrainBackend>, TrainBackend>,
    {
        let cfg = self.cfg;

        // ── Build or restore the model ────────────────────────────────────────
        let mut model: PointerGeneratorModel<TrainBackend> = model_cfg.init(&device);
        let mut progress = CheckpointInfo { step: 0, epoch: 0 };

        if cfg.resume {
            match self.ckpt.latest()? {
                Some(info) => {
                    model = self.ckpt.load_from(model, self.ckpt.model_path(info.step), &device)?;
                    match self.ckpt.load_optimizer::<TrainBackend, O::Record>(info.step, &device)? {
                        Some(record) => optim = optim.load_record(record),
                        None => tracing::warn!("No optimizer state for step {}; moments start from zero", info.step),
                    }
                    progress = info;
                    tracing::info!("Resumed from step {} (epoch {})", info.step, info.epoch);
                }
                None => tracing::warn!(
                    "--resume given but '{}' has no checkpoint; starting fresh",
                    self.ckpt.dir().display()
                ),
            }
        }
        tracing::info!(
            "Model ready: {:?} cells, {}+{} layers, hidden={}, pointer_gen={}, coverage={}",
            cfg.cell_type,
            cfg.encoder_depth,
            cfg.decoder_depth,
            cfg.hidden_units,
            cfg.pointer_gen,
            cfg.coverage
        );

        // ── Batchers and iterators ────────────────────────────────────────────
        let train_batcher = SummaryBatcher::<TrainBackend>::new(
            device.clone(),
            cfg.encoder_max_time_steps,
            cfg.decoder_max_time_steps,
            cfg.pointer_gen,
        );
        let valid_batcher = SummaryBatcher::<InferBackend>::new(
            device.clone(),
            cfg.encoder_max_time_steps,
            cfg.decoder_max_time_steps,
            cfg.pointer_gen,
        );
        let mut train_iter = TextIterator::new(train_dataset, cfg.iterator_config());
        let mut valid_iter = valid_dataset.map(|d| {
            TextIterator::new(d, IteratorConfig { shuffle_each_epoch: false, ..cfg.iterator_config() })
        });

        tracing::info!(
            "Training on {} pairs ({} batches per epoch), validation on {}",
            train_iter.dataset_len(),
            train_iter.batches_per_epoch(),
            valid_iter.as_ref().map_or(0, |v| v.dataset_len())
        );

        let mut window = DisplayWindow::new();
        let mut since_valid = RunningMean::default();
        let mut best_valid_loss = f64::INFINITY;

        // ── Epoch loop ────────────────────────────────────────────────────────
        while progress.epoch < cfg.max_epochs {
            train_iter.reset();

            while let Some(items) = train_iter.next_batch() {
                let batch = train_batcher.batch(items);
                let output = model.forward_train(&batch);

                let loss_val = output.loss.clone().into_scalar().elem::<f64>();
                let nll_val = output.nll_loss.clone().into_scalar().elem::<f64>();
                if !loss_val.is_finite() {
                    tracing::warn!("Non-finite loss at step {}", progress.step + 1);
                }

                let grads = GradientsParams::from_grads(output.loss.backward(), &model);
                model = optim.step(cfg.learning_rate, model, grads);
                progress.step += 1;

                window.add(loss_val, nll_val, batch.source_tokens, batch.target_tokens);
                since_valid.add(loss_val);

                if progress.step % cfg.display_freq == 0 {
                    window.report(progress);
                    window = DisplayWindow::new();
                }

                if progress.step % cfg.valid_freq == 0 {
                    if let Some(valid_iter) = valid_iter.as_mut() {
                        let report = evaluate(&model.valid(), valid_iter, &valid_batcher);
                        let row = ValidationMetrics {
                            step: progress.step,
                            epoch: progress.epoch,
                            train_loss: since_valid.take(),
                            valid_loss: report.loss,
                            valid_perplexity: report.perplexity(),
                        };
                        tracing::info!(
                            "Validation step {} | loss={:.4} | perplexity={:.2}{}",
                            row.step,
                            row.valid_loss,
                            row.valid_perplexity,
                            if row.is_improvement(best_valid_loss) { " (best)" } else { "" }
                        );
                        best_valid_loss = best_valid_loss.min(row.valid_loss);
                        self.metrics.log(&row)?;
                    }
                }

                if progress.step % cfg.save_freq == 0 {
                    self.save(&model, &optim, progress)?;
                }
            }

            progress.epoch += 1;
            tracing::info!("Epoch {} complete at step {}", progress.epoch, progress.step);
            self.save(&model, &optim, progress)?;
        }

        tracing::info!("Training complete!");
        Ok(())
    }

    fn save<O>(&self, model: &PointerGeneratorModel<TrainBackend>, optim: &O, progress: CheckpointInfo) -> Result<()>
    where
        O: Optimizer<PointerGeneratorModel<TrainBackend>, TrainBackend>,
    {
        self.ckpt.save(model, progress)?;
        self.ckpt.save_optimizer::<TrainBackend, _>(optim.to_record(), progress.step)
    }
}

// ─── Evaluation ───────────────────────────────────────────────────────────────
/// Token-weighted averages over one pass of a dataset.
#[derive(Debug, Clone, Copy)]
pub struct EvalReport {
    pub loss: f64,
    pub nll: f64,
    pub coverage_loss: f64,
    /// Decoder positions scored (targets + EOS)
    pub tokens: usize,
    pub batches: usize,
}

impl EvalReport {
    pub fn perplexity(&self) -> f64 {
        self.nll.exp()
    }
}

/// One full pass over `iter` with teacher forcing. Pass a
/// `model.valid()` model so dropout is off.
pub fn evaluate<B: Backend, D: Dataset<SummaryExample>>(
    model: &PointerGeneratorModel<B>,
    iter: &mut TextIterator<D>,
    batcher: &SummaryBatcher<B>,
) -> EvalReport {
    iter.reset();

    let (mut loss_sum, mut nll_sum, mut cov_sum) = (0.0f64, 0.0f64, 0.0f64);
    let mut tokens = 0usize;
    let mut batches = 0usize;

    for items in iter.by_ref() {
        let batch = batcher.batch(items);
        let weight = batch.decoder_mask.clone().sum().into_scalar().elem::<f64>();
        let output = model.forward_train(&batch);

        loss_sum += output.loss.into_scalar().elem::<f64>() * weight;
        nll_sum += output.nll_loss.into_scalar().elem::<f64>() * weight;
        if let Some(cov) = output.coverage_loss {
            cov_sum += cov.into_scalar().elem::<f64>() * weight;
        }
        tokens += weight as usize;
        batches += 1;
    }

    let denom = tokens.max(1) as f64;
    if tokens == 0 {
        tracing::warn!("Evaluation set produced no batches");
    }
    EvalReport {
        loss: loss_sum / denom,
        nll: nll_sum / denom,
        coverage_loss: cov_sum / denom,
        tokens,
        batches,
    }
}

// ─── Progress bookkeeping ─────────────────────────────────────────────────────
struct DisplayWindow {
    start: Instant,
    steps: usize,
    loss_sum: f64,
    nll_sum: f64,
    source_words: usize,
    target_words: usize,
}

impl DisplayWindow {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            steps: 0,
            loss_sum: 0.0,
            nll_sum: 0.0,
            source_words: 0,
            target_words: 0,
        }
    }

    fn add(&mut self, loss: f64, nll: f64, source_words: usize, target_words: usize) {
        self.steps += 1;
        self.loss_sum += loss;
        self.nll_sum += nll;
        self.source_words += source_words;
        self.target_words += target_words;
    }

    fn report(&self, progress: CheckpointInfo) {
        let steps = self.steps.max(1) as f64;
        let secs = self.start.elapsed().as_secs_f64().max(1e-9);
        tracing::info!(
            "Epoch {:>3} Step {:>7} | loss={:.4} | perplexity={:.2} | {:.2} steps/s | {:.1} src words/s | {:.1} tgt words/s",
            progress.epoch,
            progress.step,
            self.loss_sum / steps,
            (self.nll_sum / steps).exp(),
            self.steps as f64 / secs,
            self.source_words as f64 / secs,
            self.target_words as f64 / secs,
        );
    }
}

#[derive(Default)]
struct RunningMean {
    sum: f64,
    count: usize,
}

impl RunningMean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// Mean since the last call (NaN if nothing was added).
    fn take(&mut self) -> f64 {
        let mean = if self.count > 0 { self.sum / self.count as f64 } else { f64::NAN };
        *self = Self::default();
        mean
    }
}
