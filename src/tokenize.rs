use ahash::AHashSet;

/// Minimum token length in characters.
/// Single-character tokens carry almost no topical signal.
const MIN_TOKEN_LEN: usize = 2;

/// Bundled English stop-word list (NLTK's list, minus the
/// apostrophe-bearing contraction forms this tokenizer can never produce).
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you",
    "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "her", "hers", "herself", "it", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this",
    "that", "these", "those", "am", "is", "are", "was", "were", "be", "been",
    "being", "have", "has", "had", "having", "do", "does", "did", "doing",
    "a", "an", "the", "and", "but", "if", "or", "because", "as", "until",
    "while", "of", "at", "by", "for", "with", "about", "against", "between",
    "into", "through", "during", "before", "after", "above", "below", "to",
    "from", "up", "down", "in", "out", "on", "off", "over", "under", "again",
    "further", "then", "once", "here", "there", "when", "where", "why",
    "how", "all", "any", "both", "each", "few", "more", "most", "other",
    "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "should", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "couldn", "didn",
    "doesn", "hadn", "hasn", "haven", "isn", "ma", "mightn", "mustn",
    "needn", "shan", "shouldn", "wasn", "weren", "won", "wouldn",
];

/// Splits raw text into normalized terms.
///
/// Rules are pinned so that vocabulary selection is reproducible across
/// environments:
/// - case folding: Unicode lowercase
/// - a token is a maximal run of alphanumeric characters; punctuation and
///   whitespace are separators
/// - tokens shorter than two characters are dropped
/// - tokens in the stop-word set are dropped
#[derive(Debug, Clone)]
pub struct Tokenizer {
    stop_words: AHashSet<Box<str>>,
}

impl Tokenizer {
    /// Create a tokenizer with a caller-supplied stop-word set.
    /// Stop words are matched after case folding, so they should be
    /// provided in lowercase.
    pub fn new<I, T>(stop_words: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        Self {
            stop_words: stop_words
                .into_iter()
                .map(|w| w.as_ref().into())
                .collect(),
        }
    }

    /// Create a tokenizer with the bundled English stop-word list.
    pub fn english() -> Self {
        Self::new(ENGLISH_STOP_WORDS)
    }

    /// Tokenize `text` into normalized terms, in input order.
    /// An empty or all-separator input yields an empty list.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|raw| !raw.is_empty())
            .map(|raw| raw.to_lowercase())
            .filter(|tok| tok.chars().count() >= MIN_TOKEN_LEN)
            .filter(|tok| !self.stop_words.contains(tok.as_str()))
            .collect()
    }

    /// Check whether a (lowercase) term is in the stop-word set.
    #[inline]
    pub fn is_stop_word(&self, term: &str) -> bool {
        self.stop_words.contains(term)
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::english()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_splits_on_punctuation() {
        let tok = Tokenizer::new(Vec::<&str>::new());
        let terms = tok.tokenize("Hello, World! RUST-lang?");
        assert_eq!(terms, vec!["hello", "world", "rust", "lang"]);
    }

    #[test]
    fn tokenize_drops_short_tokens() {
        let tok = Tokenizer::new(Vec::<&str>::new());
        let terms = tok.tokenize("a b cd e fg");
        assert_eq!(terms, vec!["cd", "fg"]);
    }

    #[test]
    fn tokenize_drops_stop_words() {
        let tok = Tokenizer::english();
        let terms = tok.tokenize("cats are great pets");
        assert_eq!(terms, vec!["cats", "great", "pets"]);
    }

    #[test]
    fn tokenize_empty_and_whitespace_inputs() {
        let tok = Tokenizer::english();
        assert!(tok.tokenize("").is_empty());
        assert!(tok.tokenize("   \t\n  ").is_empty());
        assert!(tok.tokenize("..!?--").is_empty());
    }

    #[test]
    fn tokenize_keeps_unicode_and_digits() {
        let tok = Tokenizer::new(Vec::<&str>::new());
        let terms = tok.tokenize("Café au 42nd");
        assert_eq!(terms, vec!["café", "au", "42nd"]);
    }

    #[test]
    fn custom_stop_words_are_matched_after_folding() {
        let tok = Tokenizer::new(["dogs"]);
        let terms = tok.tokenize("DOGS and dogs");
        assert_eq!(terms, vec!["and"]);
        assert!(tok.is_stop_word("dogs"));
        assert!(!tok.is_stop_word("cats"));
    }
}
