// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Free-running decoding from a trained model.
//
// Greedy (beam_width = 1), whole batch at once:
//   y_0 = <s>;  y_t = argmax P_final(· | y_<t)
//   copied OOV ids (≥ V) are fed back as <unk>
//   stops when every row has produced </s> or at max_steps
//
// Beam search (beam_width = k > 1), one source at a time:
//   - the source is encoded once and tiled k times
//   - each live beam proposes its top-k next tokens
//   - the best k non-</s> candidates survive; the recurrent
//     state, context and coverage are reordered by parent
//   - candidates ending in </s> are set aside as finished
//   - stop once k hypotheses finished or at max_steps (live
//     beams then count as finished)
//   - winner = highest log P / length
//
// All ids returned are in the extended vocabulary.

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::batcher::{SummaryBatch, SummaryBatcher};
use crate::domain::example::SummaryExample;
use crate::domain::vocab::{EOS, GO};
use crate::ml::attention::AttentionMemory;
use crate::ml::model::PointerGeneratorModel;

const LOG_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
pub struct DecodeSettings {
    pub beam_width: usize,
    pub max_steps: usize,
}

/// One decoded sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis {
    /// Extended-vocabulary ids, without </s>
    pub ids: Vec<u32>,
    /// Sum of token log-probabilities (</s> included when emitted)
    pub log_prob: f64,
    /// Scored tokens (ids plus </s> when emitted)
    pub length: usize,
}

impl Hypothesis {
    fn empty() -> Self {
        Self { ids: Vec::new(), log_prob: 0.0, length: 0 }
    }

    pub fn normalized_score(&self) -> f64 {
        self.log_prob / self.length.max(1) as f64
    }

    fn extend(&self, id: u32, log_prob: f64) -> Self {
        let mut ids = self.ids.clone();
        ids.push(id);
        Self { ids, log_prob: self.log_prob + log_prob, length: self.length + 1 }
    }

    fn finish(&self, log_prob: f64) -> Self {
        Self { ids: self.ids.clone(), log_prob: self.log_prob + log_prob, length: self.length + 1 }
    }
}

pub struct Inferencer<B: Backend> {
    model: PointerGeneratorModel<B>,
    batcher: SummaryBatcher<B>,
    device: B::Device,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(model: PointerGeneratorModel<B>, device: B::Device, max_source_steps: usize) -> Self {
        let pointer_gen = model.uses_pointer();
        let batcher = SummaryBatcher::new(device.clone(), max_source_steps, 1, pointer_gen);
        Self { model, batcher, device }
    }

    /// One hypothesis per example, in order.
    pub fn decode(&self, examples: Vec<SummaryExample>, settings: DecodeSettings) -> Vec<Hypothesis> {
        if examples.is_empty() {
            return Vec::new();
        }
        let batch = self.batcher.batch(examples);
        if settings.beam_width <= 1 {
            self.greedy(&batch, settings.max_steps)
        } else {
            (0..batch.batch_size())
                .map(|row| self.beam_search(&batch, row, settings.beam_width, settings.max_steps))
                .collect()
        }
    }

    fn greedy(&self, batch: &SummaryBatch<B>, max_steps: usize) -> Vec<Hypothesis> {
        let rows = batch.batch_size();
        let (memory, mut state) = self
            .model
            .encode(batch.encoder_inputs.clone(), batch.encoder_mask.clone());

        let mut input = Tensor::<B, 1, Int>::full([rows], GO as i64, &self.device);
        let mut hyps = vec![Hypothesis::empty(); rows];
        let mut finished = vec![false; rows];

        for _ in 0..max_steps {
            let (out, next) = self.model.decode_step(
                input,
                state,
                &memory,
                batch.encoder_inputs_extended.clone(),
                batch.max_oovs,
            );
            state = next;

            let (best_probs, best_ids) = out.distribution.max_dim_with_indices(1);
            let ids: Vec<u32> = best_ids.clone().into_data().iter::<i64>().map(|id| id as u32).collect();
            let probs: Vec<f64> = best_probs.into_data().iter::<f32>().map(f64::from).collect();

            for row in 0..rows {
                if finished[row] {
                    continue;
                }
                let log_prob = (probs[row] + LOG_EPSILON).ln();
                if ids[row] == EOS {
                    hyps[row] = hyps[row].finish(log_prob);
                    finished[row] = true;
                } else {
                    hyps[row] = hyps[row].extend(ids[row], log_prob);
                }
            }
            if finished.iter().all(|&f| f) {
                break;
            }
            input = best_ids.reshape([rows]);
        }
        hyps
    }

    fn beam_search(&self, batch: &SummaryBatch<B>, row: usize, width: usize, max_steps: usize) -> Hypothesis {
        let [_, time] = batch.encoder_inputs.dims();
        let (memory, state) = self.model.encode(
            batch.encoder_inputs.clone().slice([row..row + 1, 0..time]),
            batch.encoder_mask.clone().slice([row..row + 1, 0..time]),
        );
        let source_extended = batch.encoder_inputs_extended.clone().slice([row..row + 1, 0..time]);

        // tile the single source across the beam
        let tile = Tensor::<B, 1, Int>::zeros([width], &self.device);
        let memory = AttentionMemory {
            keys: memory.keys.select(0, tile.clone()),
            values: memory.values.select(0, tile.clone()),
            mask: memory.mask.select(0, tile.clone()),
        };
        let source_extended = source_extended.select(0, tile.clone());
        let mut state = state.select(tile);

        let mut beams = vec![Hypothesis::empty()];
        let mut finished: Vec<Hypothesis> = Vec::new();

        for _ in 0..max_steps {
            let inputs: Vec<i64> = (0..width)
                .map(|i| beams.get(i).unwrap_or(&beams[0]).ids.last().map_or(GO, |&id| id) as i64)
                .collect();
            let input = Tensor::<B, 1, Int>::from_data(TensorData::new(inputs, [width]), &self.device);

            let (out, next) = self.model.decode_step(
                input,
                state,
                &memory,
                source_extended.clone(),
                batch.max_oovs,
            );

            let vocab = out.distribution.dims()[1];
            let k = width.min(vocab);
            let (top_probs, top_ids) = out.distribution.topk_with_indices(k, 1);
            let top_probs: Vec<f64> = top_probs.into_data().iter::<f32>().map(f64::from).collect();
            let top_ids: Vec<u32> = top_ids.into_data().iter::<i64>().map(|id| id as u32).collect();

            // (parent, token, log prob of token, running total)
            let mut candidates: Vec<(usize, u32, f64, f64)> = Vec::with_capacity(beams.len() * k);
            for (parent, beam) in beams.iter().enumerate() {
                for j in 0..k {
                    let lp = (top_probs[parent * k + j] + LOG_EPSILON).ln();
                    candidates.push((parent, top_ids[parent * k + j], lp, beam.log_prob + lp));
                }
            }
            candidates.sort_by(|a, b| b.3.total_cmp(&a.3));

            let mut next_beams = Vec::with_capacity(width);
            let mut parents = Vec::with_capacity(width);
            for (parent, token, lp, _) in candidates {
                if token == EOS {
                    finished.push(beams[parent].finish(lp));
                } else {
                    next_beams.push(beams[parent].extend(token, lp));
                    parents.push(parent as i64);
                }
                if next_beams.len() == width {
                    break;
                }
            }

            if finished.len() >= width || next_beams.is_empty() {
                beams = next_beams;
                break;
            }

            let pad = parents[0];
            parents.resize(width, pad);
            let order = Tensor::<B, 1, Int>::from_data(TensorData::new(parents, [width]), &self.device);
            state = next.select(order);
            beams = next_beams;
        }

        if finished.len() < width {
            finished.extend(beams);
        }
        finished
            .into_iter()
            .max_by(|a, b| a.normalized_score().total_cmp(&b.normalized_score()))
            .unwrap_or_else(Hypothesis::empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    use crate::domain::{example::VocabLimits, vocab::Vocabulary};
    use crate::ml::model::PointerGeneratorConfig;

    type TestBackend = NdArray;

    fn setup(pointer_gen: bool) -> (Inferencer<TestBackend>, Vec<SummaryExample>) {
        let device = Default::default();
        let model = PointerGeneratorConfig::new(10, 10)
            .with_embedding_size(6)
            .with_hidden_units(8)
            .with_attention_units(4)
            .with_encoder_depth(1)
            .with_decoder_depth(2)
            .with_pointer_gen(pointer_gen)
            .init(&device);
        let vocab = Vocabulary::from_words(["a", "b", "c", "d", "e", "f"]);
        let limits = VocabLimits { source: 10, target: 10 };
        let examples = ["a b zork", "c d e f a", "qux"]
            .iter()
            .map(|s| {
                let tokens: Vec<&str> = s.split(' ').collect();
                SummaryExample::encode_source(&tokens, &vocab, &vocab, limits)
            })
            .collect();
        (Inferencer::new(model, device, 20), examples)
    }

    #[test]
    fn test_greedy_respects_step_limit_and_vocab() {
        let (inferencer, examples) = setup(true);
        let max_oovs = examples.iter().map(|e| e.oovs.len()).max().unwrap();
        let hyps = inferencer.decode(examples, DecodeSettings { beam_width: 1, max_steps: 7 });

        assert_eq!(hyps.len(), 3);
        for h in &hyps {
            assert!(h.ids.len() <= 7);
            assert!(h.length >= h.ids.len());
            assert!(h.ids.iter().all(|&id| (id as usize) < 10 + max_oovs));
            assert!(!h.ids.contains(&EOS));
            assert!(h.log_prob <= 0.0);
        }
    }

    #[test]
    fn test_beam_search_one_hypothesis_per_source() {
        let (inferencer, examples) = setup(true);
        let hyps = inferencer.decode(examples, DecodeSettings { beam_width: 3, max_steps: 6 });

        assert_eq!(hyps.len(), 3);
        for h in &hyps {
            assert!(h.ids.len() <= 6);
            assert!(!h.ids.contains(&EOS));
            assert!(h.normalized_score().is_finite());
        }
    }

    #[test]
    fn test_beam_width_larger_than_vocab_without_pointer() {
        let (inferencer, examples) = setup(false);
        let hyps = inferencer.decode(examples, DecodeSettings { beam_width: 16, max_steps: 3 });
        assert_eq!(hyps.len(), 3);
        assert!(hyps.iter().all(|h| h.ids.iter().all(|&id| id < 10)));
    }

    #[test]
    fn test_normalized_score_prefers_better_average() {
        let short = Hypothesis { ids: vec![4], log_prob: -2.0, length: 2 };
        let long = Hypothesis { ids: vec![4, 5, 6], log_prob: -3.0, length: 4 };
        assert!(long.normalized_score() > short.normalized_score());
    }

    #[test]
    fn test_empty_input_decodes_to_nothing() {
        let (inferencer, _) = setup(true);
        assert!(inferencer.decode(Vec::new(), DecodeSettings { beam_width: 2, max_steps: 5 }).is_empty());
    }
}
