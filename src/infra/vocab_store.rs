// ============================================================
// Layer 6 — Vocabulary Store
// ============================================================
// Vocabularies live as JSON next to the data. When the file is
// missing, one is built from the training corpus:
//
//   count every token ─► sort by frequency (desc), then token
//   (asc) ─► keep the top (max_size − 4) ─► prepend the specials
//
// so the same corpus always yields the same ids.

use anyhow::{Context, Result};
use std::{collections::HashMap, fs, path::Path};

use crate::domain::vocab::{Vocabulary, NUM_SPECIALS};

pub fn load(path: impl AsRef<Path>) -> Result<Vocabulary> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read vocabulary '{}'", path.display()))?;
    let vocab = Vocabulary::from_json(&json)
        .with_context(|| format!("Invalid vocabulary file '{}'", path.display()))?;
    tracing::info!("Loaded vocabulary '{}' ({} entries)", path.display(), vocab.len());
    Ok(vocab)
}

pub fn save(vocab: &Vocabulary, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }
    fs::write(path, vocab.to_json()?)
        .with_context(|| format!("Cannot write vocabulary '{}'", path.display()))?;
    tracing::info!("Saved vocabulary '{}' ({} entries)", path.display(), vocab.len());
    Ok(())
}

/// Frequency-ranked vocabulary of at most `max_size` entries
/// (specials included).
pub fn build<'a, I>(corpus: I, max_size: usize) -> Vocabulary
where
    I: IntoIterator<Item = &'a Vec<String>>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for sentence in corpus {
        for token in sentence {
            *counts.entry(token.as_str()).or_default() += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let keep = max_size.saturating_sub(NUM_SPECIALS);
    Vocabulary::from_words(ranked.into_iter().map(|(token, _)| token).take(keep))
}

/// Load `path` if it exists, otherwise build from `corpus` and save.
pub fn load_or_build<'a, I>(path: impl AsRef<Path>, corpus: I, max_size: usize) -> Result<Vocabulary>
where
    I: IntoIterator<Item = &'a Vec<String>>,
{
    let path = path.as_ref();
    if path.exists() {
        return load(path);
    }

    tracing::info!("Vocabulary '{}' not found, building from corpus", path.display());
    let vocab = build(corpus, max_size);
    save(&vocab, path)?;
    Ok(vocab)
}
