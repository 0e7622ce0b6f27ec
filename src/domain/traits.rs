// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer programs against these traits, not
// against the concrete loaders and decoders:
//   - ParallelTextLoader implements PairSource
//   - InferUseCase implements Summarizer

use anyhow::Result;

/// A tokenised (source, summary) pair before vocabulary lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPair {
    pub source: Vec<String>,
    pub target: Vec<String>,
}

impl TextPair {
    pub fn new(source: Vec<String>, target: Vec<String>) -> Self {
        Self { source, target }
    }
}

// ─── PairSource ───────────────────────────────────────────────────────────────
/// Anything that can produce aligned source/summary pairs.
pub trait PairSource {
    fn load_pairs(&self) -> Result<Vec<TextPair>>;
}

// ─── Summarizer ───────────────────────────────────────────────────────────────
/// Anything that can turn tokenised documents into tokenised
/// summaries, one output per input, in order.
pub trait Summarizer {
    fn summarize(&self, documents: &[Vec<String>]) -> Result<Vec<Vec<String>>>;
}
