//! Post-hoc narrowing of boolean hit sets with sentiment signals.
//!
//! Each filter takes a result set and the polarity of the opinion term and
//! returns a subset. `Polarity::Unknown` passes the input through untouched.
//! The combined refinement is the intersection of the selected filters.

use crate::classifier::ClassifierArtifact;
use crate::tokenizer::tokenize;
use crate::{Error, Lexicon, MetadataStore, Polarity, Result, ResultSet, ReviewId, Sentiment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Rating,
    Lexicon,
    Classifier,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rating => "rating",
            Self::Lexicon => "lexicon",
            Self::Classifier => "classifier",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rating" => Ok(Self::Rating),
            "lexicon" => Ok(Self::Lexicon),
            "classifier" => Ok(Self::Classifier),
            other => Err(Error::user_input(format!(
                "unknown filter {other:?}; expected rating, lexicon or classifier"
            ))),
        }
    }
}

/// Which filters take part in a refinement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection(BTreeSet<FilterKind>);

impl FilterSelection {
    pub fn none() -> Self { Self::default() }

    /// The strictest configuration.
    pub fn all() -> Self {
        [FilterKind::Rating, FilterKind::Lexicon, FilterKind::Classifier].into_iter().collect()
    }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn contains(&self, kind: FilterKind) -> bool { self.0.contains(&kind) }

    pub fn kinds(&self) -> impl Iterator<Item = FilterKind> + '_ {
        self.0.iter().copied()
    }

    /// Parse a comma-separated list such as `rating,lexicon`.
    pub fn parse_list(list: &str) -> Result<Self> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(FilterKind::from_str)
            .collect()
    }
}

impl FromIterator<FilterKind> for FilterSelection {
    fn from_iter<T: IntoIterator<Item = FilterKind>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    pub ids: ResultSet,
    /// The filter would have emptied a non-empty input and returned it unchanged instead.
    pub inconclusive: bool,
}

impl FilterOutcome {
    fn decided(ids: ResultSet) -> Self {
        Self { ids, inconclusive: false }
    }
}

#[derive(Debug, Clone)]
pub struct Refinement {
    pub polarity: Polarity,
    pub outcomes: Vec<(FilterKind, FilterOutcome)>,
    /// Intersection of every selected filter's output.
    pub combined: ResultSet,
}

/// Split of every review into rating > 3 and the rest. Unrated reviews land
/// on the negative side, so each review is in exactly one half.
#[derive(Debug, Clone, Default)]
pub struct RatingPartition {
    positive: BTreeSet<ReviewId>,
    negative: BTreeSet<ReviewId>,
}

impl RatingPartition {
    pub fn new(metadata: &MetadataStore) -> Self {
        let mut partition = Self::default();
        for (id, meta) in metadata.iter() {
            match meta.rating.map(Sentiment::from_rating) {
                Some(Sentiment::Positive) => partition.positive.insert(id),
                _ => partition.negative.insert(id),
            };
        }
        partition
    }

    pub fn positive(&self) -> &BTreeSet<ReviewId> { &self.positive }

    pub fn negative(&self) -> &BTreeSet<ReviewId> { &self.negative }
}

/// Share of lexicon-positive tokens among all lexicon tokens in `text`.
/// `None` when the text holds no lexicon words at all.
pub fn lexicon_ratio(text: &str, lexicon: &Lexicon) -> Option<f64> {
    let (pos, neg) = lexicon.count_polar(&tokenize(text));
    let total = pos + neg;
    (total > 0).then(|| pos as f64 / total as f64)
}

/// Applies sentiment filters against one immutable metadata snapshot.
pub struct Refiner<'a> {
    metadata: &'a MetadataStore,
    lexicon: &'a Lexicon,
    classifier: Option<&'a ClassifierArtifact>,
    partition: RatingPartition,
}

impl<'a> Refiner<'a> {
    pub fn new(metadata: &'a MetadataStore, lexicon: &'a Lexicon, classifier: Option<&'a ClassifierArtifact>) -> Self {
        Self { metadata, lexicon, classifier, partition: RatingPartition::new(metadata) }
    }

    pub fn partition(&self) -> &RatingPartition { &self.partition }

    /// Every candidate must exist in metadata; a gap means index corruption.
    fn check_known(&self, ids: &ResultSet) -> Result<()> {
        for id in ids.iter() {
            self.metadata.require(id)?;
        }
        Ok(())
    }

    pub fn rating_filter(&self, ids: &ResultSet, polarity: Polarity) -> Result<FilterOutcome> {
        self.check_known(ids)?;
        let side = match polarity {
            Polarity::Positive => &self.partition.positive,
            Polarity::Negative => &self.partition.negative,
            Polarity::Unknown => return Ok(FilterOutcome::decided(ids.clone())),
        };
        Ok(FilterOutcome::decided(ids.retain(|id| side.contains(&id))))
    }

    /// Keep reviews whose lexicon ratio agrees with `polarity`. Reviews with
    /// no lexicon words are dropped. If nothing survives, the input is
    /// returned unchanged and the outcome is flagged inconclusive.
    pub fn lexicon_ratio_filter(&self, ids: &ResultSet, polarity: Polarity) -> Result<FilterOutcome> {
        self.check_known(ids)?;
        if polarity == Polarity::Unknown {
            return Ok(FilterOutcome::decided(ids.clone()));
        }
        let mut kept = Vec::new();
        for id in ids.iter() {
            let text = &self.metadata.require(id)?.text;
            let keep = match lexicon_ratio(text, self.lexicon) {
                Some(r) if polarity == Polarity::Positive => r > 0.5,
                Some(r) => r <= 0.5,
                None => false,
            };
            if keep {
                kept.push(id);
            }
        }
        if kept.is_empty() && !ids.is_empty() {
            tracing::info!(candidates = ids.len(), ?polarity, "lexicon filter inconclusive; keeping unfiltered set");
            return Ok(FilterOutcome { ids: ids.clone(), inconclusive: true });
        }
        Ok(FilterOutcome::decided(kept.into_iter().collect()))
    }

    pub fn classifier_filter(&self, ids: &ResultSet, polarity: Polarity) -> Result<FilterOutcome> {
        self.check_known(ids)?;
        if polarity == Polarity::Unknown {
            return Ok(FilterOutcome::decided(ids.clone()));
        }
        let classifier = self.classifier.ok_or_else(|| {
            Error::user_input("classifier filter requested but no classifier artifact is loaded")
        })?;
        let mut kept = Vec::new();
        for id in ids.iter() {
            let text = &self.metadata.require(id)?.text;
            if classifier.predict_one(text).matches(polarity) {
                kept.push(id);
            }
        }
        Ok(FilterOutcome::decided(kept.into_iter().collect()))
    }

    pub fn apply(&self, kind: FilterKind, ids: &ResultSet, polarity: Polarity) -> Result<FilterOutcome> {
        match kind {
            FilterKind::Rating => self.rating_filter(ids, polarity),
            FilterKind::Lexicon => self.lexicon_ratio_filter(ids, polarity),
            FilterKind::Classifier => self.classifier_filter(ids, polarity),
        }
    }

    /// Run the selected filters and intersect their outputs. With nothing
    /// selected the input comes back as is.
    pub fn refine(&self, ids: &ResultSet, polarity: Polarity, selection: &FilterSelection) -> Result<Refinement> {
        self.check_known(ids)?;
        let mut outcomes = Vec::new();
        let mut combined = ids.clone();
        for kind in selection.kinds() {
            let outcome = self.apply(kind, ids, polarity)?;
            combined = combined.intersection(&outcome.ids);
            outcomes.push((kind, outcome));
        }
        tracing::debug!(input = ids.len(), refined = combined.len(), ?polarity, "refined result set");
        Ok(Refinement { polarity, outcomes, combined })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{train, TrainConfig};
    use crate::{build, Review};

    fn metadata() -> MetadataStore {
        build(vec![
            Review::new(0, "wifi is great, really great", Some(5)),
            Review::new(1, "audio poor quality", Some(2)),
            Review::new(2, "gps map is useful", Some(4)),
            Review::new(3, "screen cracked, great price but poor glass", Some(1)),
            Review::new(4, "no stars given", None),
        ])
        .unwrap()
        .1
    }

    fn lexicon() -> Lexicon {
        Lexicon::from_words(["great", "useful"], ["poor", "cracked"])
    }

    fn set(ids: &[ReviewId]) -> ResultSet {
        ResultSet::from(ids)
    }

    #[test]
    fn partition_is_exhaustive_and_disjoint() {
        let meta = metadata();
        let p = RatingPartition::new(&meta);
        assert!(p.positive().is_disjoint(p.negative()));
        assert_eq!(p.positive().len() + p.negative().len(), meta.len());
        assert_eq!(p.positive().iter().copied().collect::<Vec<_>>(), vec![0, 2]);
        assert!(p.negative().contains(&4));
    }

    #[test]
    fn rating_filter_follows_polarity() {
        let (meta, lex) = (metadata(), lexicon());
        let r = Refiner::new(&meta, &lex, None);
        let all = set(&[0, 1, 2, 3]);
        assert_eq!(r.rating_filter(&all, Polarity::Positive).unwrap().ids, set(&[0, 2]));
        assert_eq!(r.rating_filter(&all, Polarity::Negative).unwrap().ids, set(&[1, 3]));
        assert_eq!(r.rating_filter(&all, Polarity::Unknown).unwrap().ids, all);
    }

    #[test]
    fn ratio_is_undefined_without_lexicon_words() {
        let lex = lexicon();
        assert_eq!(lexicon_ratio("gps map", &lex), None);
        assert_eq!(lexicon_ratio("great great poor", &lex), Some(2.0 / 3.0));
    }

    #[test]
    fn ratio_sees_normalized_and_hyphenated_entries() {
        let lex = Lexicon::from_words(["ｇｏｏｄ", "well-made"], ["flimsy"]);
        assert_eq!(lexicon_ratio("good", &lex), Some(1.0));
        assert_eq!(lexicon_ratio("Well-made but flimsy", &lex), Some(0.5));
        assert_eq!(lexicon_ratio("made well", &lex), None);
    }

    #[test]
    fn lexicon_filter_keeps_matching_ratio() {
        let (meta, lex) = (metadata(), lexicon());
        let r = Refiner::new(&meta, &lex, None);
        // review 3 has one positive and two negative words: ratio 1/3
        let out = r.lexicon_ratio_filter(&set(&[0, 1, 3, 4]), Polarity::Negative).unwrap();
        assert!(!out.inconclusive);
        assert_eq!(out.ids, set(&[1, 3]));
    }

    #[test]
    fn lexicon_filter_falls_back_when_everything_is_dropped() {
        let (meta, lex) = (metadata(), lexicon());
        let r = Refiner::new(&meta, &lex, None);
        // both reviews are clearly negative by ratio
        let input = set(&[1, 3]);
        let out = r.lexicon_ratio_filter(&input, Polarity::Positive).unwrap();
        assert!(out.inconclusive);
        assert_eq!(out.ids, input);
    }

    #[test]
    fn unknown_id_is_a_consistency_fault() {
        let (meta, lex) = (metadata(), lexicon());
        let r = Refiner::new(&meta, &lex, None);
        for kind in [FilterKind::Rating, FilterKind::Lexicon, FilterKind::Classifier] {
            let err = r.apply(kind, &set(&[0, 99]), Polarity::Positive).unwrap_err();
            assert!(matches!(err, Error::ConsistencyViolation(_)), "{kind}");
        }
    }

    #[test]
    fn classifier_filter_requires_artifact_unless_unknown() {
        let (meta, lex) = (metadata(), lexicon());
        let r = Refiner::new(&meta, &lex, None);
        assert!(r.classifier_filter(&set(&[0]), Polarity::Positive).is_err());
        assert_eq!(r.classifier_filter(&set(&[0]), Polarity::Unknown).unwrap().ids, set(&[0]));
    }

    #[test]
    fn combined_is_intersection_of_selected_filters() {
        let (meta, lex) = (metadata(), lexicon());
        let labeled = vec![
            ("great great useful".to_string(), Sentiment::Positive),
            ("useful and great".to_string(), Sentiment::Positive),
            ("poor cracked".to_string(), Sentiment::Negative),
            ("cracked poor poor".to_string(), Sentiment::Negative),
        ];
        let config = TrainConfig { validation_fraction: 0.0, ..TrainConfig::default() };
        let (artifact, _) = train(&labeled, &config).unwrap();
        let r = Refiner::new(&meta, &lex, Some(&artifact));

        let input = set(&[0, 1, 2, 3]);
        let refined = r.refine(&input, Polarity::Positive, &FilterSelection::all()).unwrap();
        for (_, outcome) in &refined.outcomes {
            assert!(outcome.ids.is_superset(&refined.combined));
        }
        assert_eq!(refined.outcomes.len(), 3);
        assert_eq!(refined.combined, set(&[0, 2]));

        let untouched = r.refine(&input, Polarity::Positive, &FilterSelection::none()).unwrap();
        assert_eq!(untouched.combined, input);
    }

    #[test]
    fn selection_parses_comma_lists() {
        let sel = FilterSelection::parse_list("rating, lexicon").unwrap();
        assert!(sel.contains(FilterKind::Rating) && sel.contains(FilterKind::Lexicon));
        assert!(!sel.contains(FilterKind::Classifier));
        assert!(FilterSelection::parse_list("rating,stars").unwrap_err().is_user_error());
    }
}
