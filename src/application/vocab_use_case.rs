// ============================================================
// Layer 2 — BuildVocabUseCase
// ============================================================
// Builds a frequency-ranked vocabulary JSON from one or more
// text files, tokenised the same way training tokenises them.

use anyhow::Result;

use crate::data::{loader::read_lines, preprocessor::Preprocessor};
use crate::domain::vocab::Vocabulary;
use crate::infra::vocab_store;

pub struct BuildVocabUseCase {
    inputs: Vec<String>,
    preprocessor: Preprocessor,
    max_size: usize,
}

impl BuildVocabUseCase {
    pub fn new(inputs: Vec<String>, split_sign: impl Into<String>, max_size: usize) -> Self {
        Self {
            inputs,
            preprocessor: Preprocessor::new(split_sign),
            max_size,
        }
    }

    pub fn execute(&self, output: &str) -> Result<Vocabulary> {
        let mut corpus: Vec<Vec<String>> = Vec::new();
        for input in &self.inputs {
            let lines = read_lines(input)?;
            tracing::info!("Read {} lines from '{}'", lines.len(), input);
            corpus.extend(lines.iter().map(|l| self.preprocessor.tokenize(l)));
        }

        let vocab = vocab_store::build(&corpus, self.max_size);
        vocab_store::save(&vocab, output)?;
        Ok(vocab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_builds_from_several_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        let out = dir.path().join("vocab.json");
        fs::write(&a, "x y\n").unwrap();
        fs::write(&b, "y z\n").unwrap();

        let vocab = BuildVocabUseCase::new(
            vec![a.display().to_string(), b.display().to_string()],
            " ",
            100,
        )
        .execute(out.to_str().unwrap())
        .unwrap();

        assert_eq!(vocab.len(), 7);
        // y appears twice, so it ranks first
        assert_eq!(vocab.id("y"), 4);
        let reloaded = vocab_store::load(&out).unwrap();
        assert_eq!(reloaded, vocab);
    }

    #[test]
    fn test_character_level_when_split_sign_empty() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        fs::write(&a, "abca\n").unwrap();
        let out = dir.path().join("chars.json");

        let vocab = BuildVocabUseCase::new(vec![a.display().to_string()], "", 100)
            .execute(out.to_str().unwrap())
            .unwrap();
        assert_eq!(vocab.id("a"), 4);
        assert_eq!(vocab.len(), 7);
    }
}
