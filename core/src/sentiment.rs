//! Opinion lexicon and polarity types.

use crate::tokenizer::normalize_term;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

/// Orientation of a requested opinion term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
    /// The term is in neither lexicon list. Filters treat this as "no signal".
    Unknown,
}

/// Binary label produced by the classifier and used for training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Negative,
    Positive,
}

impl Sentiment {
    /// Training label for a declared rating: positive iff above 3.
    pub fn from_rating(rating: u8) -> Self {
        if rating > 3 { Self::Positive } else { Self::Negative }
    }

    pub fn matches(&self, polarity: Polarity) -> bool {
        matches!(
            (self, polarity),
            (Self::Positive, Polarity::Positive) | (Self::Negative, Polarity::Negative)
        )
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Negative => "negative",
            Self::Positive => "positive",
        })
    }
}

/// Two disjoint word sets. Read-only once loaded.
///
/// Entries are stored in tokenizer form, so a hyphenated or compatibility-form
/// entry is kept as its space-joined words ("well-made" becomes "well made").
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    positive: HashSet<String>,
    negative: HashSet<String>,
    /// Word count of the longest entry.
    longest: usize,
}

impl Lexicon {
    /// Load the positive list first, then the negative list. A word present in
    /// both keeps its positive classification.
    pub fn load(positive: &Path, negative: &Path) -> Result<Self> {
        let pos = read_word_list(positive)?;
        let neg = read_word_list(negative)?;
        let lexicon = Self::from_words(pos, neg);
        tracing::info!(
            positive = lexicon.positive.len(),
            negative = lexicon.negative.len(),
            "loaded opinion lexicon"
        );
        Ok(lexicon)
    }

    pub fn from_words<P, N>(positive: P, negative: N) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        N: IntoIterator,
        N::Item: AsRef<str>,
    {
        let positive: HashSet<String> = positive
            .into_iter()
            .filter_map(|w| normalize_entry(w.as_ref()))
            .collect();
        let mut negative_set = HashSet::new();
        for word in negative.into_iter().filter_map(|w| normalize_entry(w.as_ref())) {
            if positive.contains(&word) {
                tracing::warn!(%word, "word listed as both positive and negative; keeping positive");
                continue;
            }
            negative_set.insert(word);
        }
        let longest = positive
            .iter()
            .chain(&negative_set)
            .map(|e| e.split(' ').count())
            .max()
            .unwrap_or(0);
        Self { positive, negative: negative_set, longest }
    }

    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.negative.is_empty()
    }

    pub fn is_positive(&self, word: &str) -> bool { self.positive.contains(&lexicon_key(word)) }

    pub fn is_negative(&self, word: &str) -> bool { self.negative.contains(&lexicon_key(word)) }

    /// Polarity of a literal opinion term, normalized the same way as the
    /// entries.
    pub fn determine_positivity(&self, word: &str) -> Polarity {
        let word = lexicon_key(word);
        if self.positive.contains(&word) {
            Polarity::Positive
        } else if self.negative.contains(&word) {
            Polarity::Negative
        } else {
            Polarity::Unknown
        }
    }

    /// Count positive and negative entries in a token stream. Multi-word
    /// entries match consecutive tokens; at each position the longest entry
    /// wins and its tokens are consumed.
    pub fn count_polar(&self, tokens: &[String]) -> (u32, u32) {
        let (mut pos, mut neg, mut i) = (0u32, 0u32, 0usize);
        while i < tokens.len() {
            let mut step = 1;
            for len in (1..=self.longest.min(tokens.len() - i)).rev() {
                let key = tokens[i..i + len].join(" ");
                if self.positive.contains(&key) {
                    pos += 1;
                } else if self.negative.contains(&key) {
                    neg += 1;
                } else {
                    continue;
                }
                step = len;
                break;
            }
            i += step;
        }
        (pos, neg)
    }
}

fn lexicon_key(text: &str) -> String {
    normalize_term(text).join(" ")
}

fn normalize_entry(line: &str) -> Option<String> {
    let word = line.trim();
    if word.is_empty() || word.starts_with(';') {
        return None;
    }
    let key = lexicon_key(word);
    (!key.is_empty()).then_some(key)
}

fn read_word_list(path: &Path) -> Result<Vec<String>> {
    let bytes = fs::read(path).map_err(|e| Error::from_io(path, e))?;
    let text = String::from_utf8(bytes).map_err(|e| Error::malformed(path.display().to_string(), e))?;
    Ok(text.lines().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_trimmed_and_case_folded() {
        let lex = Lexicon::from_words(["useful", "great"], ["poor"]);
        assert_eq!(lex.determine_positivity(" Useful "), Polarity::Positive);
        assert_eq!(lex.determine_positivity("poor"), Polarity::Negative);
        assert_eq!(lex.determine_positivity("blue"), Polarity::Unknown);
    }

    #[test]
    fn conflicting_word_stays_positive() {
        let lex = Lexicon::from_words(["cheap"], ["cheap", "flimsy"]);
        assert!(lex.is_positive("cheap"));
        assert!(!lex.is_negative("cheap"));
        assert!(lex.is_negative("flimsy"));
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        let lex = Lexicon::from_words(["; opinion lexicon", "", "  good  "], Vec::<&str>::new());
        assert!(lex.is_positive("good"));
        assert!(!lex.is_positive(""));
        assert!(!lex.is_positive("; opinion lexicon"));
    }

    #[test]
    fn entries_share_tokenizer_normalization() {
        let lex = Lexicon::from_words(["ｇｏｏｄ", "Well-Made"], ["POOR!"]);
        assert_eq!(lex.determine_positivity("good"), Polarity::Positive);
        assert_eq!(lex.determine_positivity("well made"), Polarity::Positive);
        assert_eq!(lex.determine_positivity("well-made"), Polarity::Positive);
        assert_eq!(lex.determine_positivity("poor"), Polarity::Negative);
        assert!(lex.is_positive("ＧＯＯＤ"));
    }

    #[test]
    fn phrases_match_consecutive_tokens() {
        let lex = Lexicon::from_words(["well made", "well"], ["made up"]);
        let tokens: Vec<String> = ["well", "made", "and", "made", "up", "well"].iter().map(|s| s.to_string()).collect();
        assert_eq!(lex.count_polar(&tokens), (2, 1));
        assert_eq!(Lexicon::default().count_polar(&tokens), (0, 0));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Lexicon::load(Path::new("/nonexistent/pos.txt"), Path::new("/nonexistent/neg.txt")).unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound(p) if p.ends_with("pos.txt")));
    }

    #[test]
    fn rating_label_threshold() {
        assert_eq!(Sentiment::from_rating(4), Sentiment::Positive);
        assert_eq!(Sentiment::from_rating(3), Sentiment::Negative);
    }
}
