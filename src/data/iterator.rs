// ============================================================
// Layer 4 — TextIterator
// ============================================================
// Cuts a dataset into mini-batches of SummaryExamples, one
// epoch at a time.
//
// Batches are produced through a prefetch buffer:
//
//   dataset order ──► take batch_size × max_load_batches examples
//                     │
//                     ├─ sort_by_length: stable sort by target
//                     │  length so each batch pads to a similar size
//                     ▼
//                     cut into batches of batch_size ──► queue
//
// reset() starts a new epoch; with shuffle_each_epoch the
// dataset order is reshuffled from a seeded RNG first.
// The last batch of an epoch may be short.

use std::collections::VecDeque;

use burn::data::dataset::Dataset;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::example::SummaryExample;

#[derive(Debug, Clone, Copy)]
pub struct IteratorConfig {
    pub batch_size: usize,
    pub max_load_batches: usize,
    pub sort_by_length: bool,
    pub shuffle_each_epoch: bool,
    pub seed: u64,
}

impl Default for IteratorConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_load_batches: 20,
            sort_by_length: false,
            shuffle_each_epoch: false,
            seed: 42,
        }
    }
}

pub struct TextIterator<D> {
    dataset: D,
    config: IteratorConfig,
    order: Vec<usize>,
    cursor: usize,
    queue: VecDeque<Vec<SummaryExample>>,
    rng: StdRng,
}

impl<D: Dataset<SummaryExample>> TextIterator<D> {
    pub fn new(dataset: D, config: IteratorConfig) -> Self {
        let order = (0..dataset.len()).collect();
        let rng = StdRng::seed_from_u64(config.seed);
        let mut it = Self {
            dataset,
            config: IteratorConfig {
                batch_size: config.batch_size.max(1),
                max_load_batches: config.max_load_batches.max(1),
                ..config
            },
            order,
            cursor: 0,
            queue: VecDeque::new(),
            rng,
        };
        it.reset();
        it
    }

    /// Rewind to the start of a new epoch.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.queue.clear();
        if self.config.shuffle_each_epoch {
            self.order.shuffle(&mut self.rng);
        }
    }

    pub fn dataset_len(&self) -> usize {
        self.dataset.len()
    }

    pub fn batches_per_epoch(&self) -> usize {
        self.dataset.len().div_ceil(self.config.batch_size)
    }

    pub fn next_batch(&mut self) -> Option<Vec<SummaryExample>> {
        if self.queue.is_empty() {
            self.fill();
        }
        self.queue.pop_front()
    }

    fn fill(&mut self) {
        let want = self.config.batch_size * self.config.max_load_batches;
        let end = (self.cursor + want).min(self.order.len());
        if self.cursor >= end {
            return;
        }

        let mut buffer: Vec<SummaryExample> = self.order[self.cursor..end]
            .iter()
            .filter_map(|&i| self.dataset.get(i))
            .collect();
        self.cursor = end;

        if self.config.sort_by_length {
            buffer.sort_by_key(|ex| ex.target.len());
        }

        let mut buffer = buffer.into_iter().peekable();
        while buffer.peek().is_some() {
            let batch: Vec<SummaryExample> = buffer.by_ref().take(self.config.batch_size).collect();
            self.queue.push_back(batch);
        }
        tracing::debug!("Prefetched {} batches", self.queue.len());
    }
}

impl<D: Dataset<SummaryExample>> Iterator for TextIterator<D> {
    type Item = Vec<SummaryExample>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch()
    }
}

/// Largest OOV list in a batch; sizes the extended vocabulary.
pub fn oovs_max_size(batch: &[SummaryExample]) -> usize {
    batch.iter().map(SummaryExample::oov_count).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::SummaryDataset;

    fn example(target_len: usize, oovs: usize) -> SummaryExample {
        SummaryExample {
            source: vec![4; 3],
            target: vec![5; target_len],
            source_extended: vec![4; 3],
            target_extended: vec![5; target_len],
            oovs: (0..oovs).map(|i| format!("w{i}")).collect(),
        }
    }

    fn dataset(n: usize) -> SummaryDataset {
        SummaryDataset::new((0..n).map(|i| example(n - i, 0)).collect())
    }

    #[test]
    fn test_batches_cover_every_example() {
        let cfg = IteratorConfig { batch_size: 3, max_load_batches: 2, ..Default::default() };
        let it = TextIterator::new(dataset(10), cfg);
        let sizes: Vec<usize> = it.map(|b| b.len()).collect();
        assert_eq!(sizes, vec![3, 3, 3, 1]);
    }

    #[test]
    fn test_reset_starts_a_new_epoch() {
        let cfg = IteratorConfig { batch_size: 4, ..Default::default() };
        let mut it = TextIterator::new(dataset(6), cfg);
        assert_eq!(it.by_ref().count(), 2);
        assert!(it.next_batch().is_none());
        it.reset();
        assert_eq!(it.count(), 2);
    }

    #[test]
    fn test_sort_by_length_within_buffer() {
        let cfg = IteratorConfig {
            batch_size: 2,
            max_load_batches: 3,
            sort_by_length: true,
            ..Default::default()
        };
        let mut it = TextIterator::new(dataset(6), cfg);
        let first = it.next_batch().unwrap();
        // target lengths were 6,5,4,3,2,1 → shortest come first
        assert_eq!(first[0].target.len(), 1);
        assert_eq!(first[1].target.len(), 2);
    }

    #[test]
    fn test_shuffle_keeps_all_examples() {
        let cfg = IteratorConfig { batch_size: 2, shuffle_each_epoch: true, ..Default::default() };
        let it = TextIterator::new(dataset(7), cfg);
        let mut lens: Vec<usize> = it.flatten().map(|e| e.target.len()).collect();
        lens.sort();
        assert_eq!(lens, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_empty_dataset_has_no_batches() {
        let mut it = TextIterator::new(dataset(0), IteratorConfig::default());
        assert!(it.next_batch().is_none());
        assert_eq!(it.batches_per_epoch(), 0);
    }

    #[test]
    fn test_oovs_max_size() {
        let batch = vec![example(1, 2), example(1, 5), example(1, 0)];
        assert_eq!(oovs_max_size(&batch), 5);
        assert_eq!(oovs_max_size(&[]), 0);
    }
}
