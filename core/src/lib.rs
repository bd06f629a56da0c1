pub mod classifier;
pub mod context;
pub mod corpus;
pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod refine;
pub mod sentiment;
pub mod tokenizer;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use context::SearchContext;
pub use error::{Error, Result};
pub use index::{build, verify_consistency, InvertedIndex};
pub use query::{Combinator, Query, ResultSet};
pub use refine::{FilterKind, FilterSelection, Refinement, Refiner};
pub use sentiment::{Lexicon, Polarity, Sentiment};

pub type ReviewId = u32;

/// A review as it enters the index builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub id: ReviewId,
    pub text: String,
    /// Declared star rating, 1..=5.
    pub rating: Option<u8>,
    pub customer_id: Option<String>,
}

impl Review {
    pub fn new(id: ReviewId, text: impl Into<String>, rating: Option<u8>) -> Self {
        Self { id, text: text.into(), rating, customer_id: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewMeta {
    pub rating: Option<u8>,
    pub text: String,
    #[serde(default)]
    pub customer_id: Option<String>,
}

/// Review ID -> metadata. Every ID referenced by the index must be a key here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataStore {
    reviews: BTreeMap<ReviewId, ReviewMeta>,
}

impl MetadataStore {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, id: ReviewId) -> Option<&ReviewMeta> {
        self.reviews.get(&id)
    }

    pub fn contains(&self, id: ReviewId) -> bool {
        self.reviews.contains_key(&id)
    }

    pub fn len(&self) -> usize { self.reviews.len() }

    pub fn is_empty(&self) -> bool { self.reviews.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (ReviewId, &ReviewMeta)> + '_ {
        self.reviews.iter().map(|(id, meta)| (*id, meta))
    }

    /// Look up a review that the caller expects to exist. A miss means the
    /// index and the metadata store disagree.
    pub fn require(&self, id: ReviewId) -> Result<&ReviewMeta> {
        self.reviews.get(&id).ok_or_else(|| {
            Error::ConsistencyViolation(format!("review {id} is referenced but missing from metadata"))
        })
    }

    pub(crate) fn insert(&mut self, id: ReviewId, meta: ReviewMeta) -> Option<ReviewMeta> {
        self.reviews.insert(id, meta)
    }

    /// Drops an entry. Only useful for exercising the consistency check.
    pub fn remove(&mut self, id: ReviewId) -> Option<ReviewMeta> {
        self.reviews.remove(&id)
    }
}
