// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one goal: train, evaluate, or summarise.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing or printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The training workflow and its configuration
pub mod train_use_case;

// Teacher-forced scoring of a checkpoint
pub mod eval_use_case;

// Summarising a file of documents
pub mod infer_use_case;

// Building vocabulary files from text
pub mod vocab_use_case;
