//! Inverted index over review text.
//!
//! Maps each term to the ascending list of review IDs that contain it at
//! least once. Term frequency is not tracked; membership is all the boolean
//! query layer needs.

use crate::tokenizer::tokenize;
use crate::{Error, MetadataStore, Result, Review, ReviewId, ReviewMeta};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvertedIndex {
    /// term -> review IDs, ascending and unique
    postings: BTreeMap<String, Vec<ReviewId>>,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Postings for `term`, or an empty slice when the term never occurs.
    pub fn get(&self, term: &str) -> &[ReviewId] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_term(&self, term: &str) -> bool {
        self.postings.contains_key(term)
    }

    pub fn num_terms(&self) -> usize { self.postings.len() }

    /// Terms in lexicographic order with their postings.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ReviewId])> + '_ {
        self.postings.iter().map(|(t, ids)| (t.as_str(), ids.as_slice()))
    }

    /// Rebuild from a decoded postings map, restoring the ordering invariant.
    pub(crate) fn from_postings(mut postings: BTreeMap<String, Vec<ReviewId>>) -> Self {
        for ids in postings.values_mut() {
            ids.sort_unstable();
            ids.dedup();
        }
        Self { postings }
    }

    pub(crate) fn postings(&self) -> &BTreeMap<String, Vec<ReviewId>> {
        &self.postings
    }
}

/// Build the index and metadata store from a batch of reviews.
///
/// Tokenization runs in parallel; postings are merged in input order and
/// frozen into sorted vectors, so the output does not depend on scheduling.
/// Every review lands in the metadata store even if it produced no terms.
pub fn build<I>(reviews: I) -> Result<(InvertedIndex, MetadataStore)>
where
    I: IntoIterator<Item = Review>,
{
    let reviews: Vec<Review> = reviews.into_iter().collect();

    let mut seen: HashSet<ReviewId> = HashSet::with_capacity(reviews.len());
    for review in &reviews {
        if !seen.insert(review.id) {
            return Err(Error::DuplicateKey(review.id));
        }
    }

    let term_sets: Vec<BTreeSet<String>> = reviews
        .par_iter()
        .map(|r| tokenize(&r.text).into_iter().collect())
        .collect();

    let mut merged: BTreeMap<String, BTreeSet<ReviewId>> = BTreeMap::new();
    for (review, terms) in reviews.iter().zip(term_sets) {
        for term in terms {
            merged.entry(term).or_default().insert(review.id);
        }
    }
    let postings = merged
        .into_iter()
        .map(|(term, ids)| (term, ids.into_iter().collect()))
        .collect();

    let mut metadata = MetadataStore::new();
    for review in reviews {
        metadata.insert(
            review.id,
            ReviewMeta { rating: review.rating, text: review.text, customer_id: review.customer_id },
        );
    }

    let index = InvertedIndex { postings };
    tracing::info!(num_reviews = metadata.len(), num_terms = index.num_terms(), "built inverted index");
    Ok((index, metadata))
}

/// Check that every review ID referenced by the index exists in `metadata`.
/// Reports the first offender in term order.
pub fn verify_consistency(index: &InvertedIndex, metadata: &MetadataStore) -> Result<()> {
    for (term, ids) in index.iter() {
        if let Some(missing) = ids.iter().find(|id| !metadata.contains(**id)) {
            return Err(Error::ConsistencyViolation(format!(
                "term {term:?} references review {missing}, which is missing from metadata"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Review> {
        vec![
            Review::new(0, "wifi is great", Some(5)),
            Review::new(1, "audio poor quality", Some(2)),
            Review::new(2, "gps map is useful", Some(4)),
            Review::new(3, "screen cracked", Some(1)),
        ]
    }

    #[test]
    fn postings_are_sorted_and_unique() {
        let (idx, _) = build(vec![
            Review::new(7, "great great great", Some(5)),
            Review::new(2, "great value", Some(4)),
        ])
        .unwrap();
        assert_eq!(idx.get("great"), &[2, 7]);
    }

    #[test]
    fn absent_term_is_empty() {
        let (idx, _) = build(corpus()).unwrap();
        assert!(idx.get("battery").is_empty());
    }

    #[test]
    fn terms_iterate_lexicographically() {
        let (idx, _) = build(corpus()).unwrap();
        let terms: Vec<&str> = idx.iter().map(|(t, _)| t).collect();
        let mut sorted = terms.clone();
        sorted.sort_unstable();
        assert_eq!(terms, sorted);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let err = build(vec![Review::new(1, "a", Some(3)), Review::new(1, "b", Some(3))]).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(1)));
    }

    #[test]
    fn tokenless_reviews_still_get_metadata() {
        let (idx, meta) = build(vec![Review::new(0, "!!!", Some(3)), Review::new(1, "ok", None)]).unwrap();
        assert_eq!(meta.len(), 2);
        assert_eq!(idx.num_terms(), 1);
        verify_consistency(&idx, &meta).unwrap();
    }

    #[test]
    fn missing_metadata_fails_consistency_check() {
        let (idx, mut meta) = build(corpus()).unwrap();
        verify_consistency(&idx, &meta).unwrap();
        meta.remove(2);
        let err = verify_consistency(&idx, &meta).unwrap_err();
        assert!(matches!(err, Error::ConsistencyViolation(ref m) if m.contains("review 2")));
    }
}
