// ============================================================
// Layer 3 — Vocabulary
// ============================================================
// Maps tokens to integer ids and back.
//
// The first four ids are reserved and fixed for every
// vocabulary, whatever file it was loaded from:
//
//   0  <pad>   padding for batches
//   1  <unk>   any token outside the (limited) vocabulary
//   2  <s>     decoder start token (GO)
//   3  </s>    end of sequence (EOS)
//
// Two on-disk forms are accepted:
//   {"<pad>": 0, "the": 4, ...}   object: token → id
//   ["<pad>", "<unk>", "<s>", "</s>", "the", ...]
//                                array: index = id, so it must
//                                open with the four specials
//
// A vocabulary can be "limited" to its first n ids at lookup
// time (n_words_source / n_words_target). Ids at or above the
// limit are looked up as UNK.

use std::collections::HashMap;

use serde::Deserialize;

use crate::domain::error::DataError;

pub const PAD: u32 = 0;
pub const UNK: u32 = 1;
pub const GO: u32 = 2;
pub const EOS: u32 = 3;

pub const PAD_TOKEN: &str = "<pad>";
pub const UNK_TOKEN: &str = "<unk>";
pub const GO_TOKEN: &str = "<s>";
pub const EOS_TOKEN: &str = "</s>";

/// Number of reserved ids at the start of every vocabulary.
pub const NUM_SPECIALS: usize = 4;

const SPECIALS: [(&str, u32); NUM_SPECIALS] = [
    (PAD_TOKEN, PAD),
    (UNK_TOKEN, UNK),
    (GO_TOKEN, GO),
    (EOS_TOKEN, EOS),
];

#[derive(Deserialize)]
#[serde(untagged)]
enum VocabFile {
    Map(HashMap<String, u32>),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    token_to_id: HashMap<String, u32>,
    id_to_token: Vec<Option<String>>,
}

impl Vocabulary {
    /// Build a vocabulary from words in order of preference.
    /// Specials take ids 0..4; duplicates keep their first id.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Self::specials_only();
        for word in words {
            let word = word.as_ref();
            if word.is_empty() || vocab.token_to_id.contains_key(word) {
                continue;
            }
            let id = vocab.id_to_token.len() as u32;
            vocab.token_to_id.insert(word.to_string(), id);
            vocab.id_to_token.push(Some(word.to_string()));
        }
        vocab
    }

    /// Parse a vocabulary from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, DataError> {
        let file: VocabFile = serde_json::from_str(json)
            .map_err(|e| DataError::InvalidVocabulary(e.to_string()))?;

        match file {
            VocabFile::List(words) => Self::from_list(words),
            VocabFile::Map(map) => Self::from_map(map),
        }
    }

    fn from_map(map: HashMap<String, u32>) -> Result<Self, DataError> {
        let mut vocab = Self::specials_only();

        let max_id = map.values().copied().max().unwrap_or(0) as usize;
        vocab.id_to_token.resize(max_id.max(NUM_SPECIALS - 1) + 1, None);

        for (token, id) in map {
            let is_special = SPECIALS.iter().any(|(t, _)| *t == token);
            if is_special {
                // reserved ids win over whatever the file says
                continue;
            }
            if (id as usize) < NUM_SPECIALS {
                return Err(DataError::InvalidVocabulary(format!(
                    "token '{token}' uses reserved id {id}"
                )));
            }
            if let Some(Some(existing)) = vocab.id_to_token.get(id as usize) {
                return Err(DataError::InvalidVocabulary(format!(
                    "id {id} assigned to both '{existing}' and '{token}'"
                )));
            }
            vocab.id_to_token[id as usize] = Some(token.clone());
            vocab.token_to_id.insert(token, id);
        }

        Ok(vocab)
    }

    fn from_list(words: Vec<String>) -> Result<Self, DataError> {
        let mut vocab = Self::specials_only();

        for (index, word) in words.into_iter().enumerate() {
            if let Some((expected, _)) = SPECIALS.get(index) {
                if word != *expected {
                    return Err(DataError::InvalidVocabulary(format!(
                        "list entry {index} is '{word}', expected '{expected}'"
                    )));
                }
                continue;
            }
            if let Some(&id) = vocab.token_to_id.get(&word) {
                return Err(DataError::InvalidVocabulary(format!(
                    "'{word}' listed at both {id} and {index}"
                )));
            }
            vocab.token_to_id.insert(word.clone(), index as u32);
            vocab.id_to_token.push(Some(word));
        }

        Ok(vocab)
    }

    fn specials_only() -> Self {
        let mut token_to_id = HashMap::new();
        let mut id_to_token = Vec::with_capacity(NUM_SPECIALS);
        for (token, id) in SPECIALS {
            token_to_id.insert(token.to_string(), id);
            id_to_token.push(Some(token.to_string()));
        }
        Self { token_to_id, id_to_token }
    }

    /// Serialise to the object form `{token: id}`.
    pub fn to_json(&self) -> Result<String, DataError> {
        let map: std::collections::BTreeMap<&str, u32> = self
            .token_to_id
            .iter()
            .map(|(t, &id)| (t.as_str(), id))
            .collect();
        serde_json::to_string_pretty(&map).map_err(|e| DataError::InvalidVocabulary(e.to_string()))
    }

    /// Id of `token`, or UNK.
    pub fn id(&self, token: &str) -> u32 {
        self.token_to_id.get(token).copied().unwrap_or(UNK)
    }

    /// Id of `token` if it is known AND below `limit`.
    pub fn id_limited(&self, token: &str, limit: usize) -> Option<u32> {
        self.token_to_id
            .get(token)
            .copied()
            .filter(|&id| (id as usize) < limit)
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.id_to_token
            .get(id as usize)
            .and_then(|t| t.as_deref())
    }

    /// Encode tokens, mapping unknown and out-of-limit tokens to UNK.
    pub fn encode_limited<S: AsRef<str>>(&self, tokens: &[S], limit: usize) -> Vec<u32> {
        tokens
            .iter()
            .map(|t| self.id_limited(t.as_ref(), limit).unwrap_or(UNK))
            .collect()
    }

    /// Size of the id space (highest id + 1).
    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= NUM_SPECIALS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specials_are_reserved() {
        let v = Vocabulary::from_words(["the", "cat"]);
        assert_eq!(v.id(PAD_TOKEN), PAD);
        assert_eq!(v.id(EOS_TOKEN), EOS);
        assert_eq!(v.id("the"), 4);
        assert_eq!(v.id("cat"), 5);
        assert_eq!(v.len(), 6);
    }

    #[test]
    fn test_unknown_maps_to_unk() {
        let v = Vocabulary::from_words(["a"]);
        assert_eq!(v.id("zebra"), UNK);
    }

    #[test]
    fn test_duplicates_keep_first_id() {
        let v = Vocabulary::from_words(["a", "b", "a", "</s>"]);
        assert_eq!(v.id("a"), 4);
        assert_eq!(v.id("b"), 5);
        assert_eq!(v.len(), 6);
    }

    #[test]
    fn test_limit_turns_rare_words_into_unk() {
        let v = Vocabulary::from_words(["a", "b", "c"]);
        // ids: a=4 b=5 c=6 — limit 6 drops "c"
        assert_eq!(v.encode_limited(&["a", "c", "b"], 6), vec![4, UNK, 5]);
    }

    #[test]
    fn test_json_list_form() {
        let v = Vocabulary::from_json(r#"["<pad>", "<unk>", "<s>", "</s>", "hello", "world"]"#).unwrap();
        assert_eq!(v.id("hello"), 4);
        assert_eq!(v.token(5), Some("world"));
        assert_eq!(v.len(), 6);
    }

    #[test]
    fn test_json_list_index_is_the_id() {
        // specials out of place would shift every id
        let err = Vocabulary::from_json(r#"["</s>", "<s>", "<unk>", "<pad>", "hello"]"#).unwrap_err();
        assert!(matches!(err, DataError::InvalidVocabulary(ref m) if m.contains("entry 0")));

        let err = Vocabulary::from_json(r#"["the", "cat"]"#).unwrap_err();
        assert!(matches!(err, DataError::InvalidVocabulary(_)));

        let err = Vocabulary::from_json(r#"["<pad>", "<unk>", "<s>", "</s>", "a", "a"]"#).unwrap_err();
        assert!(matches!(err, DataError::InvalidVocabulary(ref m) if m.contains("both 4 and 5")));
    }

    #[test]
    fn test_json_map_form_round_trip() {
        let v = Vocabulary::from_words(["x", "y"]);
        let json = v.to_json().unwrap();
        let back = Vocabulary::from_json(&json).unwrap();
        assert_eq!(back.id("y"), v.id("y"));
        assert_eq!(back.len(), v.len());
    }

    #[test]
    fn test_map_rejects_reserved_id() {
        let err = Vocabulary::from_json(r#"{"oops": 2}"#).unwrap_err();
        assert!(matches!(err, DataError::InvalidVocabulary(_)));
    }

    #[test]
    fn test_map_with_gaps() {
        let v = Vocabulary::from_json(r#"{"far": 10}"#).unwrap();
        assert_eq!(v.len(), 11);
        assert_eq!(v.token(7), None);
        assert_eq!(v.token(10), Some("far"));
    }
}
