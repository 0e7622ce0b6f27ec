// ============================================================
// Layer 4 — Summary Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<SummaryExample>
// into padded tensors for one forward pass.
//
// Padding happens here (sequences have their natural length
// until now): every sequence is truncated to its side's max
// time steps, then padded with <pad> to the longest sequence
// left in the batch.
//
// Decoder side, for a target "a b c":
//
//   decoder_inputs   <s>  a   b   c        (embedding ids, OOV → <unk>)
//   decoder_targets  a    b   c   </s>     (extended ids when copying)
//   decoder_mask     1    1   1   1
//
// Shapes (b = batch, Ts / Tt = padded source / target length):
//   encoder_inputs           [b, Ts]     Int
//   encoder_inputs_extended  [b, Ts]     Int
//   encoder_mask             [b, Ts]     Float 1/0
//   decoder_inputs           [b, Tt + 1] Int
//   decoder_targets          [b, Tt + 1] Int
//   decoder_mask             [b, Tt + 1] Float 1/0

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::iterator::oovs_max_size;
use crate::domain::example::SummaryExample;
use crate::domain::vocab::{EOS, GO, PAD};

/// Output of `prepare_pair_batch`: padded rows plus the length
/// of each row before padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairBatch {
    pub source: Vec<Vec<u32>>,
    pub source_lengths: Vec<usize>,
    pub target: Vec<Vec<u32>>,
    pub target_lengths: Vec<usize>,
}

/// Truncate each sequence to `max_len`, then pad to the longest.
/// Lengths are clamped up to `min_len` (extra slots are <pad>).
pub fn pad_sequences(seqs: &[Vec<u32>], max_len: usize, min_len: usize) -> (Vec<Vec<u32>>, Vec<usize>) {
    let lengths: Vec<usize> = seqs.iter().map(|s| s.len().min(max_len).max(min_len)).collect();
    let width = lengths.iter().copied().max().unwrap_or(min_len);

    let rows = seqs
        .iter()
        .map(|s| {
            let mut row: Vec<u32> = s.iter().take(max_len).copied().collect();
            row.resize(width, PAD);
            row
        })
        .collect();

    (rows, lengths)
}

/// Pad a batch of source/target id sequences to rectangular shape.
pub fn prepare_pair_batch(
    sources: &[Vec<u32>],
    targets: &[Vec<u32>],
    max_source_steps: usize,
    max_target_steps: usize,
) -> PairBatch {
    let (source, source_lengths) = pad_sequences(sources, max_source_steps, 1);
    let (target, target_lengths) = pad_sequences(targets, max_target_steps, 0);
    PairBatch { source, source_lengths, target, target_lengths }
}

#[derive(Debug, Clone)]
pub struct SummaryBatch<B: Backend> {
    pub encoder_inputs: Tensor<B, 2, Int>,
    pub encoder_inputs_extended: Tensor<B, 2, Int>,
    pub encoder_mask: Tensor<B, 2>,
    pub encoder_lengths: Vec<usize>,
    pub decoder_inputs: Tensor<B, 2, Int>,
    pub decoder_targets: Tensor<B, 2, Int>,
    pub decoder_mask: Tensor<B, 2>,
    /// Extra ids the copy distribution needs beyond the vocabulary.
    pub max_oovs: usize,
    pub oovs: Vec<Vec<String>>,
    /// Unpadded token counts, for throughput logging.
    pub source_tokens: usize,
    pub target_tokens: usize,
}

impl<B: Backend> SummaryBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.encoder_lengths.len()
    }
}

#[derive(Clone, Debug)]
pub struct SummaryBatcher<B: Backend> {
    pub device: B::Device,
    pub max_source_steps: usize,
    pub max_target_steps: usize,
    /// Train against extended target ids (pointer-generator) or
    /// plain vocabulary ids.
    pub pointer_gen: bool,
}

impl<B: Backend> SummaryBatcher<B> {
    pub fn new(device: B::Device, max_source_steps: usize, max_target_steps: usize, pointer_gen: bool) -> Self {
        Self { device, max_source_steps, max_target_steps, pointer_gen }
    }

    fn int_tensor(&self, rows: &[Vec<u32>]) -> Tensor<B, 2, Int> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let flat: Vec<i64> = rows.iter().flat_map(|r| r.iter().map(|&x| x as i64)).collect();
        Tensor::from_data(TensorData::new(flat, [height, width]), &self.device)
    }

    fn mask_tensor(&self, lengths: &[usize], width: usize) -> Tensor<B, 2> {
        let flat: Vec<f32> = lengths
            .iter()
            .flat_map(|&len| (0..width).map(move |t| if t < len { 1.0 } else { 0.0 }))
            .collect();
        Tensor::from_data(TensorData::new(flat, [lengths.len(), width]), &self.device)
    }
}

impl<B: Backend> Batcher<SummaryExample, SummaryBatch<B>> for SummaryBatcher<B> {
    fn batch(&self, items: Vec<SummaryExample>) -> SummaryBatch<B> {
        let sources: Vec<Vec<u32>> = items.iter().map(|e| e.source.clone()).collect();
        let sources_ext: Vec<Vec<u32>> = items.iter().map(|e| e.source_extended.clone()).collect();
        let targets: Vec<Vec<u32>> = items.iter().map(|e| e.target.clone()).collect();
        let targets_out: Vec<Vec<u32>> = if self.pointer_gen {
            items.iter().map(|e| e.target_extended.clone()).collect()
        } else {
            targets.clone()
        };

        let pair = prepare_pair_batch(&sources, &targets, self.max_source_steps, self.max_target_steps);
        let (source_ext, _) = pad_sequences(&sources_ext, self.max_source_steps, 1);
        let (target_out, _) = pad_sequences(&targets_out, self.max_target_steps, 0);

        // <s> + target, and target + </s> placed right after the last real token
        let decoder_inputs: Vec<Vec<u32>> = pair
            .target
            .iter()
            .map(|row| std::iter::once(GO).chain(row.iter().copied()).collect())
            .collect();
        let decoder_targets: Vec<Vec<u32>> = target_out
            .iter()
            .zip(pair.target_lengths.iter())
            .map(|(row, &len)| {
                let mut out = row.clone();
                out.push(PAD);
                out[len] = EOS;
                out
            })
            .collect();
        let decoder_lengths: Vec<usize> = pair.target_lengths.iter().map(|l| l + 1).collect();

        let source_width = pair.source.first().map(Vec::len).unwrap_or(1);
        let decoder_width = decoder_inputs.first().map(Vec::len).unwrap_or(1);

        SummaryBatch {
            encoder_inputs: self.int_tensor(&pair.source),
            encoder_inputs_extended: self.int_tensor(&source_ext),
            encoder_mask: self.mask_tensor(&pair.source_lengths, source_width),
            encoder_lengths: pair.source_lengths.clone(),
            decoder_inputs: self.int_tensor(&decoder_inputs),
            decoder_targets: self.int_tensor(&decoder_targets),
            decoder_mask: self.mask_tensor(&decoder_lengths, decoder_width),
            max_oovs: oovs_max_size(&items),
            oovs: items.iter().map(|e| e.oovs.clone()).collect(),
            source_tokens: items.iter().map(|e| e.source.len()).sum(),
            target_tokens: items.iter().map(|e| e.target.len()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn ids(t: Tensor<TestBackend, 2, Int>) -> Vec<i64> {
        t.into_data().iter::<i64>().collect()
    }

    fn floats(t: Tensor<TestBackend, 2>) -> Vec<f32> {
        t.into_data().iter::<f32>().collect()
    }

    #[test]
    fn test_prepare_pair_batch_pads_and_truncates() {
        let sources = vec![vec![4, 5, 6, 7], vec![8]];
        let targets = vec![vec![9], vec![10, 11, 12]];
        let b = prepare_pair_batch(&sources, &targets, 3, 2);

        assert_eq!(b.source, vec![vec![4, 5, 6], vec![8, PAD, PAD]]);
        assert_eq!(b.source_lengths, vec![3, 1]);
        assert_eq!(b.target, vec![vec![9, PAD], vec![10, 11]]);
        assert_eq!(b.target_lengths, vec![1, 2]);
    }

    #[test]
    fn test_empty_source_gets_one_pad() {
        let (rows, lens) = pad_sequences(&[vec![]], 5, 1);
        assert_eq!(rows, vec![vec![PAD]]);
        assert_eq!(lens, vec![1]);
    }

    #[test]
    fn test_decoder_inputs_and_targets_are_shifted() {
        let device = Default::default();
        let batcher = SummaryBatcher::<TestBackend>::new(device, 10, 10, true);
        let items = vec![
            SummaryExample {
                source: vec![4, 1],
                target: vec![5, 1],
                source_extended: vec![4, 20],
                target_extended: vec![5, 20],
                oovs: vec!["zed".into()],
            },
            SummaryExample {
                source: vec![6, 7, 8],
                target: vec![9],
                source_extended: vec![6, 7, 8],
                target_extended: vec![9],
                oovs: vec![],
            },
        ];
        let batch = batcher.batch(items);

        assert_eq!(batch.max_oovs, 1);
        assert_eq!(ids(batch.decoder_inputs), vec![GO as i64, 5, 1, GO as i64, 9, 0]);
        assert_eq!(ids(batch.decoder_targets), vec![5, 20, EOS as i64, 9, EOS as i64, 0]);
        assert_eq!(floats(batch.decoder_mask), vec![1.0, 1.0, 1.0, 1.0, 1.0, 0.0]);
        assert_eq!(floats(batch.encoder_mask), vec![1.0, 1.0, 0.0, 1.0, 1.0, 1.0]);
        assert_eq!(ids(batch.encoder_inputs_extended), vec![4, 20, 0, 6, 7, 8]);
    }

    #[test]
    fn test_without_pointer_targets_use_vocab_ids() {
        let device = Default::default();
        let batcher = SummaryBatcher::<TestBackend>::new(device, 10, 10, false);
        let items = vec![SummaryExample {
            source: vec![4],
            target: vec![1],
            source_extended: vec![20],
            target_extended: vec![20],
            oovs: vec!["zed".into()],
        }];
        let batch = batcher.batch(items);
        assert_eq!(ids(batch.decoder_targets), vec![1, EOS as i64]);
    }
}
