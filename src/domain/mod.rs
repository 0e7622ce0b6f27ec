// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that describe a summarization example:
// the vocabulary with its reserved ids, the encoded
// source/target pair with its per-example OOV list, and the
// traits that the data and application layers implement.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only structs, enums and traits
//
// Reference: See, Liu & Manning (2017),
//            "Get To The Point: Summarization with
//             Pointer-Generator Networks" §2.2 (extended vocabulary)

// Structured data-layer errors
pub mod error;

// Token <-> id mapping with reserved special ids
pub mod vocab;

// An encoded source/summary pair with its OOV extension
pub mod example;

// Core abstractions (traits) that other layers implement
pub mod traits;
