// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Turns one raw line of a corpus file into tokens.
//
// Corpus files hold one document (or one summary) per line,
// already segmented: tokens are separated by `split_sign`
// (a space for English, often a space for pre-segmented
// Chinese as well). An EMPTY split_sign means the line is
// tokenised character by character, which is how the
// character-level LCSTS variant is trained.
//
// Cleaning applied first:
//   1. Tab, NBSP, zero-width space, BOM, control chars → space
//   2. Runs of spaces collapse to one
//   3. Leading/trailing whitespace trimmed

#[derive(Debug, Clone)]
pub struct Preprocessor {
    split_sign: String,
}

impl Preprocessor {
    pub fn new(split_sign: impl Into<String>) -> Self {
        Self { split_sign: split_sign.into() }
    }

    /// Clean a single line. Newlines are treated like any other
    /// control character since every record is one line.
    pub fn clean(&self, line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        let mut last_space = false;

        for c in line.chars() {
            let c = match c {
                '\t' | '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_control() => ' ',
                c => c,
            };
            if c == ' ' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        out.trim().to_string()
    }

    /// Clean then split into tokens. Empty tokens are dropped.
    pub fn tokenize(&self, line: &str) -> Vec<String> {
        let cleaned = self.clean(line);

        if self.split_sign.is_empty() {
            return cleaned
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| c.to_string())
                .collect();
        }

        cleaned
            .split(self.split_sign.as_str())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Join tokens back into a line with the same separator.
    pub fn join(&self, tokens: &[String]) -> String {
        tokens.join(&self.split_sign)
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_multiple_spaces() {
        let p = Preprocessor::default();
        assert_eq!(p.clean("hello   world"), "hello world");
    }

    #[test]
    fn test_removes_control_chars() {
        let p = Preprocessor::default();
        assert_eq!(p.clean("hello\x01world\u{00A0}!"), "hello world !");
    }

    #[test]
    fn test_tokenize_on_space() {
        let p = Preprocessor::default();
        assert_eq!(p.tokenize("  the  cat sat "), vec!["the", "cat", "sat"]);
    }

    #[test]
    fn test_tokenize_custom_sign() {
        let p = Preprocessor::new("|");
        assert_eq!(p.tokenize("a|b||c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_character_level() {
        let p = Preprocessor::new("");
        assert_eq!(p.tokenize("北京 大学"), vec!["北", "京", "大", "学"]);
    }

    #[test]
    fn test_empty_line() {
        let p = Preprocessor::default();
        assert!(p.tokenize("   ").is_empty());
    }

    #[test]
    fn test_join_uses_split_sign() {
        let p = Preprocessor::new("");
        assert_eq!(p.join(&["北".to_string(), "京".to_string()]), "北京");
    }
}
