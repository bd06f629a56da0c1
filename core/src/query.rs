//! Boolean query evaluation over the inverted index.

use crate::tokenizer::normalize_term;
use crate::{Error, InvertedIndex, Result, ReviewId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// How the two aspect terms and the opinion term are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// aspect1 OR aspect2 OR opinion
    Method1,
    /// aspect1 AND aspect2 AND opinion
    Method2,
    /// (aspect1 OR aspect2) AND opinion
    Method3,
}

impl Combinator {
    pub const ALL: [Combinator; 3] = [Self::Method1, Self::Method2, Self::Method3];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Method1 => "method1",
            Self::Method2 => "method2",
            Self::Method3 => "method3",
        }
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Combinator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "method1" => Ok(Self::Method1),
            "method2" => Ok(Self::Method2),
            "method3" => Ok(Self::Method3),
            other => Err(Error::user_input(format!(
                "unsupported method {other:?}; expected method1, method2 or method3"
            ))),
        }
    }
}

/// A set of review IDs. Iterates in ascending order, which is also the
/// export order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet(BTreeSet<ReviewId>);

impl ResultSet {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn contains(&self, id: ReviewId) -> bool { self.0.contains(&id) }

    pub fn iter(&self) -> impl Iterator<Item = ReviewId> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<ReviewId> {
        self.0.iter().copied().collect()
    }

    pub fn union(&self, other: &ResultSet) -> ResultSet {
        ResultSet(self.0.union(&other.0).copied().collect())
    }

    pub fn intersection(&self, other: &ResultSet) -> ResultSet {
        ResultSet(self.0.intersection(&other.0).copied().collect())
    }

    pub fn is_superset(&self, other: &ResultSet) -> bool {
        self.0.is_superset(&other.0)
    }

    /// Keep only the IDs for which `keep` returns true.
    pub fn retain(&self, mut keep: impl FnMut(ReviewId) -> bool) -> ResultSet {
        ResultSet(self.0.iter().copied().filter(|id| keep(*id)).collect())
    }
}

impl FromIterator<ReviewId> for ResultSet {
    fn from_iter<T: IntoIterator<Item = ReviewId>>(iter: T) -> Self {
        ResultSet(iter.into_iter().collect())
    }
}

impl From<&[ReviewId]> for ResultSet {
    fn from(ids: &[ReviewId]) -> Self {
        ids.iter().copied().collect()
    }
}

/// A normalized query term. Usually a single word; a multi-word term matches
/// reviews that contain every one of its words.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term {
    words: Vec<String>,
}

impl Term {
    pub fn parse(raw: &str, role: &str) -> Result<Self> {
        let words = normalize_term(raw);
        if words.is_empty() {
            return Err(Error::user_input(format!("{role} term {raw:?} contains no words")));
        }
        Ok(Self { words })
    }

    pub fn words(&self) -> &[String] { &self.words }

    /// The term as the opinion lexicon sees it: words joined by a space.
    pub fn display_form(&self) -> String { self.words.join(" ") }

    fn file_stem(&self) -> String { self.words.join("-") }

    /// Reviews containing every word of this term.
    pub fn resolve(&self, index: &InvertedIndex) -> ResultSet {
        let mut words = self.words.iter();
        let first = match words.next() {
            Some(w) => ResultSet::from(index.get(w)),
            None => return ResultSet::new(),
        };
        words.fold(first, |acc, w| acc.intersection(&ResultSet::from(index.get(w))))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_form())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    pub aspect1: Term,
    pub aspect2: Term,
    pub opinion: Term,
    pub combinator: Combinator,
}

impl Query {
    pub fn new(aspect1: &str, aspect2: &str, opinion: &str, combinator: Combinator) -> Result<Self> {
        Ok(Self {
            aspect1: Term::parse(aspect1, "aspect1")?,
            aspect2: Term::parse(aspect2, "aspect2")?,
            opinion: Term::parse(opinion, "opinion")?,
            combinator,
        })
    }

    /// Same as [`Query::new`] with the combinator given by name.
    pub fn parse(aspect1: &str, aspect2: &str, opinion: &str, method: &str) -> Result<Self> {
        Self::new(aspect1, aspect2, opinion, method.parse()?)
    }

    pub fn execute(&self, index: &InvertedIndex) -> ResultSet {
        let a1 = self.aspect1.resolve(index);
        let a2 = self.aspect2.resolve(index);
        let op = self.opinion.resolve(index);
        let result = match self.combinator {
            Combinator::Method1 => a1.union(&a2).union(&op),
            Combinator::Method2 => a1.intersection(&a2).intersection(&op),
            Combinator::Method3 => a1.union(&a2).intersection(&op),
        };
        tracing::debug!(query = %self.artifact_name(), hits = result.len(), "executed query");
        result
    }

    /// Deterministic name for this query's persisted result,
    /// `{aspect1}_{aspect2}_{opinion}_{method}`.
    pub fn artifact_name(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.aspect1.file_stem(),
            self.aspect2.file_stem(),
            self.opinion.file_stem(),
            self.combinator
        )
    }
}
