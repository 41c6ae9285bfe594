use crate::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref DEFAULT_STOPWORDS: HashSet<String> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().map(|w| w.to_string()).collect()
    };
}

/// NFKC normalization, lowercasing, stop-word removal and English stemming.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    stopwords: HashSet<String>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self { stopwords: DEFAULT_STOPWORDS.clone() }
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stopwords<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let stopwords = words.into_iter().map(|w| w.as_ref().trim().to_lowercase()).filter(|w| !w.is_empty()).collect();
        Self { stopwords }
    }

    /// One stop word per line; blank lines and `#` comments are ignored.
    pub fn from_stopwords_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let words = text.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#'));
        Ok(Self::with_stopwords(words))
    }

    /// Built-in list, or the given file when one is configured.
    pub fn load(stopwords: Option<&Path>) -> Result<Self> {
        match stopwords {
            Some(path) => Self::from_stopwords_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    /// Tokenize text into (term, position); positions count every word, stop words included.
    pub fn tokenize(&self, text: &str) -> Vec<(String, u32)> {
        self.tokenize_from(text, 0).0
    }

    /// Like [`Tokenizer::tokenize`], numbering positions from `start`. Returns the next free position.
    pub fn tokenize_from(&self, text: &str, start: u32) -> (Vec<(String, u32)>, u32) {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let mut tokens = Vec::new();
        let mut pos = start;
        for mat in RE.find_iter(&normalized) {
            let token = mat.as_str();
            let here = pos;
            pos += 1;
            if self.is_stopword(token) {
                continue;
            }
            let stem = STEMMER.stem(token).to_string();
            tokens.push((stem, here));
        }
        (tokens, pos)
    }

    /// Terms of a multi-field document, positions running across fields.
    pub fn tokenize_fields<S: AsRef<str>>(&self, fields: &[S]) -> Vec<(String, u32)> {
        let mut all = Vec::new();
        let mut next = 0;
        for field in fields {
            let (tokens, after) = self.tokenize_from(field.as_ref(), next);
            all.extend(tokens);
            next = after;
        }
        all
    }
}
