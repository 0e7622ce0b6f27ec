use burn::data::dataset::Dataset;

use crate::domain::example::{StepLimits, SummaryExample, VocabLimits};
use crate::domain::traits::TextPair;
use crate::domain::vocab::Vocabulary;

/// In-memory collection of encoded summary examples.
pub struct SummaryDataset {
    examples: Vec<SummaryExample>,
}

impl SummaryDataset {
    pub fn new(examples: Vec<SummaryExample>) -> Self {
        Self { examples }
    }

    pub fn from_pairs(
        pairs: &[TextPair],
        source_vocab: &Vocabulary,
        target_vocab: &Vocabulary,
        limits: VocabLimits,
        steps: StepLimits,
    ) -> Self {
        let examples = pairs
            .iter()
            .map(|p| SummaryExample::encode_clipped(&p.source, &p.target, source_vocab, target_vocab, limits, steps))
            .collect();
        Self { examples }
    }
}

impl Dataset<SummaryExample> for SummaryDataset {
    fn get(&self, index: usize) -> Option<SummaryExample> {
        self.examples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.examples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vocab::UNK;

    fn words(s: &str) -> Vec<String> {
        s.split(' ').map(String::from).collect()
    }

    #[test]
    fn test_from_pairs_clips_before_extending() {
        let vocab = Vocabulary::from_words(["a", "b"]);
        let pairs = vec![TextPair::new(words("a b a zorb"), words("zorb b a"))];
        let dataset = SummaryDataset::from_pairs(
            &pairs,
            &vocab,
            &vocab,
            VocabLimits { source: 6, target: 6 },
            StepLimits { source: 2, target: 2 },
        );

        let ex = dataset.get(0).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(ex.source_extended.len(), 2);
        assert!(ex.oovs.is_empty());
        assert_eq!(ex.target_extended, vec![UNK, 5]);
    }
}
