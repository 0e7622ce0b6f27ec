// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains ALL Burn model code: the recurrent
// building blocks, the pointer-generator network, the
// optimiser choices, the training loop and decoding.
//
// What's in this layer:
//
//   cell.rs       — GRU and LSTM cells plus stacked layers
//   attention.rs  — Bahdanau / Luong attention with coverage
//   encoder.rs    — (bi)directional multi-layer RNN encoder
//   decoder.rs    — one decoder step: attention, generation
//                   probability and the copy/generate mixture
//   model.rs      — the full model, teacher-forced loss with
//                   the coverage penalty
//   optim.rs      — Adam / RMSProp / AdaGrad with clipping
//   trainer.rs    — training loop, validation, checkpoints
//   inferencer.rs — greedy and beam-search decoding
//
// Reference: See et al. (2017) Get To The Point
//            Bahdanau et al. (2015), Luong et al. (2015)
//            Burn Book §3 (Building Blocks), §5 (Training)

/// GRU / LSTM cells and stacked recurrent layers
pub mod cell;

/// Bahdanau and Luong attention with a coverage feature
pub mod attention;

/// Source-side recurrent encoder
pub mod encoder;

/// Single-step attention decoder with copy mechanism
pub mod decoder;

/// Pointer-generator model and its training loss
pub mod model;

/// Optimizer configs and gradient clipping
pub mod optim;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Greedy and beam-search decoding over a trained model
pub mod inferencer;
