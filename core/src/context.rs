//! The read-only snapshot a query runs against.

use crate::classifier::ClassifierArtifact;
use crate::persist::{self, IndexPaths};
use crate::refine::{FilterKind, FilterSelection, Refinement, Refiner};
use crate::{Error, InvertedIndex, Lexicon, MetadataStore, Polarity, Query, Result, ResultSet};
use std::path::Path;

/// Index, metadata and sentiment resources, built once and shared by
/// reference. Nothing in here is mutated after construction, so concurrent
/// queries need no synchronization.
pub struct SearchContext {
    pub index: InvertedIndex,
    pub metadata: MetadataStore,
    pub lexicon: Lexicon,
    pub classifier: Option<ClassifierArtifact>,
}

/// Result of one query plus its optional refinement.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub hits: ResultSet,
    pub refinement: Option<Refinement>,
}

impl SearchContext {
    pub fn new(index: InvertedIndex, metadata: MetadataStore) -> Self {
        Self { index, metadata, lexicon: Lexicon::default(), classifier: None }
    }

    pub fn with_lexicon(mut self, lexicon: Lexicon) -> Self {
        self.lexicon = lexicon;
        self
    }

    pub fn with_classifier(mut self, classifier: ClassifierArtifact) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Load a persisted index directory. The classifier is picked up when
    /// both of its files exist; `require_classifier` turns its absence into
    /// a `ResourceNotFound`.
    pub fn open(paths: &IndexPaths, lexicon: Option<(&Path, &Path)>, require_classifier: bool) -> Result<Self> {
        let (index, metadata) = persist::load_all(paths)?;
        let mut ctx = Self::new(index, metadata);
        if let Some((pos, neg)) = lexicon {
            ctx.lexicon = Lexicon::load(pos, neg)?;
        }
        if require_classifier || persist::has_classifier(paths) {
            ctx.classifier = Some(persist::load_classifier(paths)?);
        }
        tracing::info!(
            root = %paths.root.display(),
            reviews = ctx.metadata.len(),
            terms = ctx.index.num_terms(),
            classifier = ctx.classifier.is_some(),
            "opened search context"
        );
        Ok(ctx)
    }

    pub fn refiner(&self) -> Refiner<'_> {
        Refiner::new(&self.metadata, &self.lexicon, self.classifier.as_ref())
    }

    pub fn polarity(&self, query: &Query) -> Polarity {
        self.lexicon.determine_positivity(&query.opinion.display_form())
    }

    /// Execute `query` and, when any filter is selected, refine the hits
    /// with the polarity of its opinion term.
    pub fn run(&self, query: &Query, filters: &FilterSelection) -> Result<QueryOutcome> {
        let hits = query.execute(&self.index);
        if filters.is_empty() {
            return Ok(QueryOutcome { hits, refinement: None });
        }
        if filters.contains(FilterKind::Classifier) && self.classifier.is_none() {
            return Err(Error::user_input("classifier filter requested but no classifier has been trained"));
        }
        let refinement = self.refiner().refine(&hits, self.polarity(query), filters)?;
        Ok(QueryOutcome { hits, refinement: Some(refinement) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build, Combinator, Review};

    #[test]
    fn context_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SearchContext>();
    }

    #[test]
    fn run_refines_with_opinion_polarity() {
        let (index, metadata) = build(vec![
            Review::new(0, "battery life is great", Some(5)),
            Review::new(1, "battery is great they said, it is not", Some(1)),
        ])
        .unwrap();
        let ctx = SearchContext::new(index, metadata).with_lexicon(Lexicon::from_words(["great"], ["bad"]));
        let q = Query::new("battery", "life", "great", Combinator::Method3).unwrap();

        let plain = ctx.run(&q, &FilterSelection::none()).unwrap();
        assert_eq!(plain.hits.to_vec(), vec![0, 1]);
        assert!(plain.refinement.is_none());

        let refined = ctx.run(&q, &[FilterKind::Rating].into_iter().collect()).unwrap();
        let refinement = refined.refinement.unwrap();
        assert_eq!(refinement.polarity, Polarity::Positive);
        assert_eq!(refinement.combined.to_vec(), vec![0]);

        let err = ctx.run(&q, &FilterSelection::all()).unwrap_err();
        assert!(err.is_user_error());
    }
}
