//! Error taxonomy shared by the index, query and refinement layers.

use crate::ReviewId;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required persisted input (corpus, index, lexicon, classifier) is missing.
    #[error("resource not found: {}", .0.display())]
    ResourceNotFound(PathBuf),

    /// The index references a review the metadata store does not hold.
    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),

    /// The same review ID was supplied twice to the index builder.
    #[error("duplicate review id {0}")]
    DuplicateKey(ReviewId),

    /// A persisted artifact or input record could not be decoded.
    #[error("malformed resource {resource}: {cause}")]
    MalformedResource { resource: String, cause: String },

    /// Unsupported combinator, empty query term and similar caller mistakes.
    #[error("invalid input: {0}")]
    UserInput(String),

    #[error("training failed: {0}")]
    Training(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn malformed(resource: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::MalformedResource { resource: resource.into(), cause: cause.to_string() }
    }

    pub fn user_input(msg: impl Into<String>) -> Self {
        Self::UserInput(msg.into())
    }

    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::UserInput(_))
    }

    /// Map an I/O failure on `path`, keeping not-found distinct from other faults.
    pub(crate) fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::ResourceNotFound(path.to_path_buf())
        } else {
            Self::Io(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn not_found_keeps_path() {
        let err = Error::from_io(std::path::Path::new("idx/postings.bin"), io::Error::from(io::ErrorKind::NotFound));
        match err {
            Error::ResourceNotFound(p) => assert_eq!(p, PathBuf::from("idx/postings.bin")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn only_user_input_is_user_error() {
        assert!(Error::user_input("bad method").is_user_error());
        assert!(!Error::DuplicateKey(3).is_user_error());
    }
}
