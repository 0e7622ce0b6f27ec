// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From parallel text files to padded tensor batches:
//
//   sources.txt / summaries.txt
//       │
//       ▼
//   ParallelTextLoader  → aligned line pairs
//       │
//       ▼
//   Preprocessor        → clean + split on split_sign
//       │
//       ▼
//   SummaryDataset      → vocab ids + extended (OOV) ids,
//       │                 implements Burn's Dataset trait
//       ▼
//   TextIterator        → prefetch, optional sort/shuffle,
//       │                 cut into mini-batches
//       ▼
//   SummaryBatcher      → pad, shift, mask → tensors
//
// Each step is its own module and is tested on its own.

pub use crate::domain::error::DataError;

/// Reads aligned source/target files
pub mod loader;

/// Cleans lines and splits them into tokens
pub mod preprocessor;

/// Burn Dataset over encoded examples
pub mod dataset;

/// Epoch-wise mini-batch iteration with prefetch
pub mod iterator;

/// Padding and tensor construction (Burn Batcher)
pub mod batcher;

/// Held-out validation split
pub mod splitter;
