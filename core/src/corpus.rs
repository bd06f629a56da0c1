//! Review corpus ingestion from JSON / JSONL files.
//!
//! Every decoded record becomes a [`Review`]. Records without an explicit
//! `id` get their 0-based position in the corpus (files in sorted path
//! order, records in file order). Positions count malformed records too, so
//! skipping one never shifts the IDs of the records after it. A `.json` file
//! that does not parse at all has no countable records: under
//! [`DecodePolicy::Skip`] it is dropped whole and uses up no positions, so the
//! IDs of later files move down.

use crate::{Error, Result, Review, ReviewId};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

/// What to do with a record that cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodePolicy {
    /// Fail the whole load with `MalformedResource`.
    #[default]
    Abort,
    /// Log a warning and continue with the next record.
    Skip,
}

impl FromStr for DecodePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            other => Err(Error::user_input(format!("unknown decode policy {other:?}; expected abort or skip"))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InputReview {
    #[serde(default)]
    id: Option<ReviewId>,
    #[serde(alias = "text")]
    review_text: String,
    #[serde(default, alias = "rating")]
    customer_review_rating: Option<Scalar>,
    #[serde(default)]
    customer_id: Option<Scalar>,
}

fn parse_rating(raw: Option<Scalar>) -> std::result::Result<Option<u8>, String> {
    let value = match raw {
        None => return Ok(None),
        Some(Scalar::Int(i)) => i,
        Some(Scalar::Float(f)) if f.fract() == 0.0 => f as i64,
        Some(Scalar::Float(f)) => return Err(format!("rating {f} is not a whole number")),
        Some(Scalar::Text(s)) if s.trim().is_empty() => return Ok(None),
        Some(Scalar::Text(s)) => s.trim().parse::<i64>().map_err(|_| format!("rating {s:?} is not a number"))?,
    };
    match u8::try_from(value) {
        Ok(r @ 1..=5) => Ok(Some(r)),
        _ => Err(format!("rating {value} is outside 1..=5")),
    }
}

#[derive(Debug, Default)]
pub struct Corpus {
    pub reviews: Vec<Review>,
    /// Records dropped under [`DecodePolicy::Skip`].
    pub skipped: usize,
}

struct Loader {
    policy: DecodePolicy,
    position: ReviewId,
    corpus: Corpus,
}

impl Loader {
    fn reject(&mut self, resource: String, cause: impl std::fmt::Display) -> Result<()> {
        match self.policy {
            DecodePolicy::Abort => Err(Error::malformed(resource, cause)),
            DecodePolicy::Skip => {
                tracing::warn!(%resource, %cause, "skipping malformed review record");
                self.corpus.skipped += 1;
                Ok(())
            }
        }
    }

    /// A record that was located but could not be read still takes a position.
    fn reject_record(&mut self, resource: String, cause: impl std::fmt::Display) -> Result<()> {
        self.position += 1;
        self.reject(resource, cause)
    }

    fn ingest(&mut self, resource: String, decoded: serde_json::Result<InputReview>) -> Result<()> {
        let position = self.position;
        self.position += 1;
        let raw = match decoded {
            Ok(raw) => raw,
            Err(e) => return self.reject(resource, e),
        };
        let rating = match parse_rating(raw.customer_review_rating) {
            Ok(r) => r,
            Err(cause) => return self.reject(resource, cause),
        };
        self.corpus.reviews.push(Review {
            id: raw.id.unwrap_or(position),
            text: raw.review_text,
            rating,
            customer_id: raw.customer_id.map(Scalar::into_string),
        });
        Ok(())
    }

    fn load_jsonl(&mut self, file: &Path) -> Result<()> {
        let bytes = fs::read(file).map_err(|e| Error::from_io(file, e))?;
        for (n, raw) in bytes.split(|&b| b == b'\n').enumerate() {
            let resource = format!("{}:{}", file.display(), n + 1);
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let line = match std::str::from_utf8(raw) {
                Ok(line) => line,
                Err(e) => {
                    self.reject_record(resource, e)?;
                    continue;
                }
            };
            if line.trim().is_empty() { continue; }
            self.ingest(resource, serde_json::from_str(line))?;
        }
        Ok(())
    }

    fn load_json(&mut self, file: &Path) -> Result<()> {
        let f = File::open(file).map_err(|e| Error::from_io(file, e))?;
        let json: serde_json::Value = match serde_json::from_reader(BufReader::new(f)) {
            Ok(v) => v,
            Err(e) => return self.reject(file.display().to_string(), e),
        };
        match json {
            serde_json::Value::Array(arr) => {
                for (i, v) in arr.into_iter().enumerate() {
                    self.ingest(format!("{}[{i}]", file.display()), serde_json::from_value(v))?;
                }
                Ok(())
            }
            serde_json::Value::Object(_) => self.ingest(file.display().to_string(), serde_json::from_value(json)),
            _ => self.reject(file.display().to_string(), "expected a review object or an array of them"),
        }
    }
}

fn corpus_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(Error::ResourceNotFound(input.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::malformed(input.display().to_string(), e))?;
        let p = entry.path();
        if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
            files.push(p.to_path_buf());
        }
    }
    Ok(files)
}

/// Load every review under `input` (a file or a directory walked recursively).
pub fn load_corpus(input: &Path, policy: DecodePolicy) -> Result<Corpus> {
    let mut loader = Loader { policy, position: 0, corpus: Corpus::default() };
    for file in corpus_files(input)? {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            loader.load_jsonl(&file)?;
        } else {
            loader.load_json(&file)?;
        }
    }
    tracing::info!(
        reviews = loader.corpus.reviews.len(),
        skipped = loader.corpus.skipped,
        input = %input.display(),
        "loaded review corpus"
    );
    Ok(loader.corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const JSONL: &str = r#"{"review_text": "wifi is great", "customer_review_rating": 5, "customer_id": 17}
{"review_text": "audio poor quality", "customer_review_rating": "2"}

{"review_text": "bad record", "customer_review_rating": 9}
{"text": "screen cracked", "rating": 1.0}
"#;

    #[test]
    fn jsonl_abort_reports_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reviews.jsonl");
        fs::write(&path, JSONL).unwrap();
        let err = load_corpus(&path, DecodePolicy::Abort).unwrap_err();
        match err {
            Error::MalformedResource { resource, cause } => {
                assert!(resource.ends_with("reviews.jsonl:4"), "{resource}");
                assert!(cause.contains("outside"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn jsonl_skip_keeps_positions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reviews.jsonl");
        fs::write(&path, JSONL).unwrap();
        let corpus = load_corpus(&path, DecodePolicy::Skip).unwrap();
        assert_eq!(corpus.skipped, 1);
        let ids: Vec<ReviewId> = corpus.reviews.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1, 3]);
        assert_eq!(corpus.reviews[0].customer_id.as_deref(), Some("17"));
        assert_eq!(corpus.reviews[1].rating, Some(2));
        assert_eq!(corpus.reviews[2].rating, Some(1));
    }

    #[test]
    fn invalid_utf8_line_follows_decode_policy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reviews.jsonl");
        let mut bytes = br#"{"review_text": "wifi is great"}"#.to_vec();
        bytes.extend_from_slice(b"\n{\"review_text\": \"bad \xff byte\"}\r\n");
        bytes.extend_from_slice(br#"{"review_text": "screen cracked"}"#);
        fs::write(&path, bytes).unwrap();

        let corpus = load_corpus(&path, DecodePolicy::Skip).unwrap();
        assert_eq!(corpus.skipped, 1);
        let ids: Vec<ReviewId> = corpus.reviews.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 2]);

        match load_corpus(&path, DecodePolicy::Abort).unwrap_err() {
            Error::MalformedResource { resource, .. } => assert!(resource.ends_with("reviews.jsonl:2"), "{resource}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unparseable_json_file_is_dropped_whole_under_skip() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.json"), "[{\"review_text\": ").unwrap();
        fs::write(dir.path().join("b.json"), r#"[{"review_text": "after"}]"#).unwrap();
        let corpus = load_corpus(dir.path(), DecodePolicy::Skip).unwrap();
        assert_eq!(corpus.skipped, 1);
        assert_eq!(corpus.reviews[0].id, 0);
        assert!(matches!(load_corpus(dir.path(), DecodePolicy::Abort), Err(Error::MalformedResource { .. })));
    }

    #[test]
    fn directory_is_walked_in_path_order() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("b/part.json"), r#"[{"review_text": "second"}]"#).unwrap();
        fs::write(dir.path().join("a.json"), r#"{"review_text": "first", "customer_review_rating": 4}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let corpus = load_corpus(dir.path(), DecodePolicy::Abort).unwrap();
        let texts: Vec<&str> = corpus.reviews.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(corpus.reviews[1].id, 1);
        assert_eq!(corpus.reviews[1].rating, None);
    }

    #[test]
    fn missing_input_is_not_found() {
        let err = load_corpus(Path::new("/no/such/corpus"), DecodePolicy::Abort).unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound(_)));
    }
}
