// ============================================================
// Layer 3 — SummaryExample
// ============================================================
// One source document and its reference summary, encoded
// twice:
//
//   source / target                  ids in the (limited) vocab,
//                                    OOV → <unk>. These feed the
//                                    embedding layers.
//
//   source_extended / target_extended
//                                    ids in the EXTENDED vocab:
//                                    every distinct source OOV gets
//                                    a temporary id n_tgt + k. The
//                                    copy distribution lands on these
//                                    ids, and the loss is
//                                    taken against them, so the model
//                                    can produce a source OOV word.
//
// Example (n_tgt = 10):
//   source  "police arrest zorblax in paris"
//   oovs    ["zorblax", "paris"]  (not in the first 10 ids)
//   source_extended  [.., .., 10, .., 11]
//   target  "zorblax fled"  → target_extended [10, <unk>]
//   ("fled" is not in the source, so it cannot be copied)
//
// Both sides are cut to the encoder / decoder step caps before
// any of this, so an OOV that only appears past the source cap
// never gets an extended id.
//
// Reference: See et al. (2017) §2.2

use serde::{Deserialize, Serialize};

use crate::domain::vocab::{Vocabulary, EOS, GO, PAD, UNK, UNK_TOKEN};

/// Per-side vocabulary limits (n_words_source / n_words_target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabLimits {
    pub source: usize,
    pub target: usize,
}

/// Encoder / decoder time-step caps (encoder_max_time_steps /
/// decoder_max_time_steps). Tokens past them are dropped before OOV
/// extension, so every copyable target word has a source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepLimits {
    pub source: usize,
    pub target: usize,
}

fn clip<S>(tokens: &[S], max: usize) -> &[S] {
    &tokens[..tokens.len().min(max)]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryExample {
    pub source: Vec<u32>,
    pub target: Vec<u32>,
    pub source_extended: Vec<u32>,
    pub target_extended: Vec<u32>,
    /// Source words outside the target vocabulary, in first-seen order.
    pub oovs: Vec<String>,
}

impl SummaryExample {
    pub fn encode<S: AsRef<str>>(
        source_tokens: &[S],
        target_tokens: &[S],
        source_vocab: &Vocabulary,
        target_vocab: &Vocabulary,
        limits: VocabLimits,
    ) -> Self {
        let source = source_vocab.encode_limited(source_tokens, limits.source);
        let target = target_vocab.encode_limited(target_tokens, limits.target);

        let mut oovs: Vec<String> = Vec::new();
        let source_extended = source_tokens
            .iter()
            .map(|t| {
                let t = t.as_ref();
                match target_vocab.id_limited(t, limits.target) {
                    Some(id) => id,
                    None => {
                        let k = match oovs.iter().position(|o| o == t) {
                            Some(k) => k,
                            None => {
                                oovs.push(t.to_string());
                                oovs.len() - 1
                            }
                        };
                        (limits.target + k) as u32
                    }
                }
            })
            .collect();

        let target_extended = target_tokens
            .iter()
            .map(|t| {
                let t = t.as_ref();
                target_vocab
                    .id_limited(t, limits.target)
                    .or_else(|| {
                        oovs.iter()
                            .position(|o| o == t)
                            .map(|k| (limits.target + k) as u32)
                    })
                    .unwrap_or(UNK)
            })
            .collect();

        Self { source, target, source_extended, target_extended, oovs }
    }

    /// `encode` after cutting both sides to `steps`.
    pub fn encode_clipped<S: AsRef<str>>(
        source_tokens: &[S],
        target_tokens: &[S],
        source_vocab: &Vocabulary,
        target_vocab: &Vocabulary,
        limits: VocabLimits,
        steps: StepLimits,
    ) -> Self {
        Self::encode(
            clip(source_tokens, steps.source),
            clip(target_tokens, steps.target),
            source_vocab,
            target_vocab,
            limits,
        )
    }

    /// Source-only example for decoding (no reference summary).
    pub fn encode_source<S: AsRef<str>>(
        source_tokens: &[S],
        source_vocab: &Vocabulary,
        target_vocab: &Vocabulary,
        limits: VocabLimits,
    ) -> Self {
        let no_target: &[S] = &[];
        Self::encode(source_tokens, no_target, source_vocab, target_vocab, limits)
    }

    pub fn oov_count(&self) -> usize {
        self.oovs.len()
    }

    /// Map extended ids back to words. Stops at </s>; skips
    /// <pad> and <s>.
    pub fn decode_extended(&self, ids: &[u32], target_vocab: &Vocabulary, target_limit: usize) -> Vec<String> {
        let mut words = Vec::new();
        for &id in ids {
            match id {
                EOS => break,
                PAD | GO => continue,
                id if (id as usize) >= target_limit => {
                    let k = id as usize - target_limit;
                    let word = self
                        .oovs
                        .get(k)
                        .map(String::as_str)
                        .unwrap_or(UNK_TOKEN);
                    words.push(word.to_string());
                }
                id => {
                    let word = target_vocab
                        .token(id)
                        .unwrap_or(UNK_TOKEN);
                    words.push(word.to_string());
                }
            }
        }
        words
    }
}
