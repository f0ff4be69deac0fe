use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::Algorithm;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;

use crate::config::NormalizerConfig;

lazy_static! {
    // Maximal runs of word characters; apostrophes split contractions.
    static ref RE: Regex = Regex::new(r"\w+").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could",
            "did","do","does","doing","down","during",
            "each","few","for","from","further",
            "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","it","its","itself",
            "me","more","most","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","should","so","some","such",
            "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","very",
            "was","we","were","what","when","where","which","while","who","whom","why","with","would",
            "you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Reduces a lowercase token to its root form.
///
/// Implementations must be stable (the same token always yields the same
/// root) and idempotent on their own output.
pub trait Stemmer: Send + Sync {
    fn stem<'a>(&self, token: &'a str) -> Cow<'a, str>;
}

/// English Snowball (Porter2) stemmer.
///
/// Porter2 refines the original Porter algorithm, so a few roots differ
/// from classic Porter output. A single Snowball pass can still strip more
/// from its own output ("agreed" -> "agre" -> "agr"), so the stemmer is
/// applied until the root stops changing.
pub struct SnowballStemmer {
    inner: rust_stemmers::Stemmer,
}

impl SnowballStemmer {
    pub fn new() -> Self {
        Self { inner: rust_stemmers::Stemmer::create(Algorithm::English) }
    }
}

impl Default for SnowballStemmer {
    fn default() -> Self { Self::new() }
}

impl Stemmer for SnowballStemmer {
    fn stem<'a>(&self, token: &'a str) -> Cow<'a, str> {
        let mut current = self.inner.stem(token);
        // Every rewrite keeps or shortens the root, so this terminates.
        for _ in 0..token.len() {
            let next = self.inner.stem(&current).into_owned();
            if next == current {
                break;
            }
            current = Cow::Owned(next);
        }
        current
    }
}

/// Turns extractor text into normalized terms. Cheap to clone.
#[derive(Clone)]
pub struct Normalizer {
    config: NormalizerConfig,
    stemmer: Arc<dyn Stemmer>,
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Normalizer").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Default for Normalizer {
    fn default() -> Self { Self::new(NormalizerConfig::default()) }
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self::with_stemmer(config, Arc::new(SnowballStemmer::new()))
    }

    pub fn with_stemmer(config: NormalizerConfig, stemmer: Arc<dyn Stemmer>) -> Self {
        Self { config, stemmer }
    }

    /// Lowercase, split on non-word characters and stem. Empty or
    /// delimiter-only input yields an empty vector.
    pub fn normalize(&self, text: &str) -> Vec<String> {
        let folded = if self.config.unicode_nfkc {
            text.nfkc().collect::<String>().to_lowercase()
        } else {
            text.to_lowercase()
        };
        let mut terms = Vec::new();
        for mat in RE.find_iter(&folded) {
            let token = mat.as_str();
            if self.config.remove_stopwords && is_stopword(token) { continue; }
            terms.push(self.stemmer.stem(token).into_owned());
        }
        terms
    }
}

/// Normalize with the default configuration.
pub fn tokenize(text: &str) -> Vec<String> {
    lazy_static! {
        static ref DEFAULT: Normalizer = Normalizer::default();
    }
    DEFAULT.normalize(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Running, runner's run!");
        assert_eq!(t[0], "run");
        assert!(t.contains(&"s".to_string()));
    }

    #[test]
    fn contractions_split_on_apostrophe() {
        assert_eq!(tokenize("don't"), vec!["don".to_string(), "t".to_string()]);
    }

    #[test]
    fn delimiter_only_input_is_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize(" ,.;!? -- ").is_empty());
    }

    struct Keep;
    impl Stemmer for Keep {
        fn stem<'a>(&self, token: &'a str) -> Cow<'a, str> { Cow::Borrowed(token) }
    }

    #[test]
    fn underscores_and_digits_are_word_characters() {
        let n = Normalizer::with_stemmer(NormalizerConfig::default(), Arc::new(Keep));
        assert_eq!(n.normalize("snake_case, 42!"), vec!["snake_case".to_string(), "42".to_string()]);
    }

    struct Upper;
    impl Stemmer for Upper {
        fn stem<'a>(&self, token: &'a str) -> Cow<'a, str> { Cow::Owned(token.to_uppercase()) }
    }

    #[test]
    fn custom_stemmer_is_used() {
        let n = Normalizer::with_stemmer(NormalizerConfig::default(), Arc::new(Upper));
        assert_eq!(n.normalize("Hello world"), vec!["HELLO".to_string(), "WORLD".to_string()]);
    }

    #[test]
    fn stopwords_only_removed_when_enabled() {
        let on = Normalizer::new(NormalizerConfig { remove_stopwords: true, ..Default::default() });
        assert_eq!(on.normalize("the cat"), vec!["cat".to_string()]);
        assert_eq!(tokenize("the cat"), vec!["the".to_string(), "cat".to_string()]);
    }
}
