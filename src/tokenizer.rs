//! Text normalization for indexing and querying.
//!
//! Tokenization is intentionally simple and language-agnostic: Unicode
//! word extraction, a bilingual stop-word set, and synthesized bigrams for
//! short inputs (which improves recall on short queries). Token counts are
//! preserved for downstream frequency weighting.

use std::collections::HashSet;

/// Stop words dropped during tokenization (English and Russian).
const STOP_WORDS: &[&str] = &[
    // Russian
    "и", "в", "на", "с", "по", "для", "от", "из", "к", "о", "у", "за",
    "это", "что", "как", "или", "если", "то", "не", "все", "так",
    // English
    "the", "a", "an", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has",
];

/// Domain terms kept even though they fall under the minimum length.
const SHORT_ALLOWLIST: &[&str] = &["c", "r", "go", "js", "ts", "ai", "id", "db"];

/// Token sequences of this length or shorter get adjacent-pair bigrams
/// appended (but only when there is more than one token to pair).
const BIGRAM_MAX_TOKENS: usize = 5;

#[derive(Debug)]
pub struct Tokenizer {
    stop_words: HashSet<&'static str>,
    short_allowlist: HashSet<&'static str>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self {
            stop_words: STOP_WORDS.iter().copied().collect(),
            short_allowlist: SHORT_ALLOWLIST.iter().copied().collect(),
        }
    }
}

impl Tokenizer {
    /// Tokenize text into index terms.
    ///
    /// Lower-cases the input, extracts runs of Unicode letters/digits
    /// (hyphens and underscores allowed inside a word), drops stop words
    /// and sub-2-character terms outside the allow-list, and appends
    /// adjacent-pair bigrams for short sequences. Output is not
    /// deduplicated.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();

        let mut tokens = Vec::new();
        for raw in lower
            .split(|c: char| !is_word_char(c))
            .map(|w| w.trim_matches(['-', '_']))
        {
            if raw.is_empty() {
                continue;
            }
            if self.stop_words.contains(raw) {
                continue;
            }
            if raw.chars().count() < 2 && !self.short_allowlist.contains(raw) {
                continue;
            }
            tokens.push(raw.to_string());
        }

        if tokens.len() > 1 && tokens.len() <= BIGRAM_MAX_TOKENS {
            let bigrams: Vec<String> = tokens
                .windows(2)
                .map(|pair| format!("{}_{}", pair[0], pair[1]))
                .collect();
            tokens.extend(bigrams);
        }

        tokens
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(text: &str) -> Vec<String> {
        Tokenizer::default().tokenize(text)
    }

    #[test]
    fn lowercases_and_splits_on_punctuation() {
        let tokens =
            tokenize("Hello, World! Greeting people; everywhere... today");
        assert_eq!(tokens, vec!["hello", "world", "greeting", "people",
            "everywhere", "today"]);
    }

    #[test]
    fn drops_stop_words_in_both_languages() {
        let tokens = tokenize("the cat sat on мат и ковёр");
        assert!(!tokens.iter().any(|t| t == "the" || t == "on" || t == "и"));
        assert!(tokens.contains(&"cat".to_string()));
        assert!(tokens.contains(&"ковёр".to_string()));
    }

    #[test]
    fn drops_short_terms_outside_allowlist() {
        let tokens = tokenize("x y programming");
        assert!(!tokens.iter().any(|t| t == "x" || t == "y"));
        assert!(tokens.contains(&"programming".to_string()));
    }

    #[test]
    fn keeps_allowlisted_acronyms() {
        let tokens = tokenize("written c and r code");
        assert!(tokens.contains(&"c".to_string()));
        assert!(tokens.contains(&"r".to_string()));
    }

    #[test]
    fn keeps_hyphens_and_underscores_inside_words() {
        let tokens = tokenize("well-known snake_case value");
        assert!(tokens.contains(&"well-known".to_string()));
        assert!(tokens.contains(&"snake_case".to_string()));
    }

    #[test]
    fn short_input_gets_bigrams() {
        let tokens = tokenize("rust memory safety");
        assert!(tokens.contains(&"rust_memory".to_string()));
        assert!(tokens.contains(&"memory_safety".to_string()));
    }

    #[test]
    fn single_token_gets_no_bigrams() {
        let tokens = tokenize("rust");
        assert_eq!(tokens, vec!["rust"]);
    }

    #[test]
    fn long_input_gets_no_bigrams() {
        let text = "alpha beta gamma delta epsilon zeta";
        let tokens = tokenize(text);
        assert_eq!(tokens.len(), 6);
        assert!(!tokens.iter().any(|t| t.contains('_')));
    }

    #[test]
    fn counts_are_preserved() {
        let text = "cache cache cache miss flush purge refill";
        let tokens = tokenize(text);
        let cache_count = tokens.iter().filter(|t| *t == "cache").count();
        assert_eq!(cache_count, 3);
    }

    #[test]
    fn empty_and_punctuation_only_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("... !!! ???").is_empty());
    }

    #[test]
    fn cyrillic_words_are_extracted() {
        let tokens = tokenize("Индексация документов");
        assert!(tokens.contains(&"индексация".to_string()));
        assert!(tokens.contains(&"документов".to_string()));
    }
}
