// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by several layers:
//
//   backend.rs     — Which Burn backend runs the model
//                    (NdArray by default, WGPU behind a feature)
//
//   checkpoint.rs  — Saving and loading model weights and
//                    optimizer state with CompactRecorder, plus
//                    train_config.json so eval/infer can rebuild
//                    the model
//
//   vocab_store.rs — Vocabulary JSON files; builds one from the
//                    training corpus when the file is missing
//
//   metrics.rs     — Validation metrics appended to a CSV file
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Backend type aliases and device selection
pub mod backend;

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Vocabulary loading, building and saving
pub mod vocab_store;

/// Validation metrics CSV logger
pub mod metrics;
