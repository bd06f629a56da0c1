use crate::classifier::ClassifierArtifact;
use crate::{Error, InvertedIndex, MetadataStore, Query, Result, ResultSet, ReviewId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_reviews: u64,
    pub num_terms: u64,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn describe(index: &InvertedIndex, metadata: &MetadataStore) -> Self {
        let created_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Self {
            num_reviews: metadata.len() as u64,
            num_terms: index.num_terms() as u64,
            created_at,
            version: FORMAT_VERSION,
        }
    }
}

/// Column name of a persisted result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultFile {
    pub review_index: Vec<ReviewId>,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn postings(&self) -> PathBuf { self.root.join("postings.bin") }
    pub fn metadata(&self) -> PathBuf { self.root.join("metadata.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn vectorizer(&self) -> PathBuf { self.root.join("vectorizer.bin") }
    pub fn model(&self) -> PathBuf { self.root.join("model.bin") }
    pub fn results_dir(&self) -> PathBuf { self.root.join("results") }
    pub fn result(&self, name: &str) -> PathBuf { self.results_dir().join(format!("{name}.json")) }
}

fn write_tmp(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let mut f = File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    Ok(tmp)
}

/// Write to a sibling temp file and rename it into place, so a failed write
/// never leaves a truncated artifact under the final name.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = write_tmp(path, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// Write a group of files that are only valid together. Every temp file is
/// written before any rename, and `marker` (the file readers open first) is
/// removed up front and renamed last, so an interrupted save leaves no
/// readable mix of old and new files.
fn write_group(files: &[(PathBuf, Vec<u8>)], marker: &Path) -> Result<()> {
    let mut staged = Vec::with_capacity(files.len());
    for (path, bytes) in files {
        match write_tmp(path, bytes) {
            Ok(tmp) => staged.push((tmp, path)),
            Err(e) => {
                for (tmp, _) in &staged {
                    let _ = fs::remove_file(tmp);
                }
                return Err(e);
            }
        }
    }
    remove_if_present(marker)?;
    for (tmp, path) in staged {
        fs::rename(&tmp, path)?;
    }
    Ok(())
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::from_io(path, e))
}

fn encode_bincode<T: Serialize>(path: &Path, value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| Error::malformed(path.display().to_string(), e))
}

fn save_bincode<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, &encode_bincode(path, value)?)
}

fn load_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let buf = read_bytes(path)?;
    bincode::deserialize(&buf).map_err(|e| Error::malformed(path.display().to_string(), e))
}

fn encode_json<T: Serialize>(path: &Path, value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| Error::malformed(path.display().to_string(), e))
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, &encode_json(path, value)?)
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let buf = read_bytes(path)?;
    serde_json::from_slice(&buf).map_err(|e| Error::malformed(path.display().to_string(), e))
}

pub fn save_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<()> {
    save_bincode(&paths.postings(), index.postings())
}

pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex> {
    let postings: BTreeMap<String, Vec<ReviewId>> = load_bincode(&paths.postings())?;
    Ok(InvertedIndex::from_postings(postings))
}

pub fn save_metadata(paths: &IndexPaths, metadata: &MetadataStore) -> Result<()> {
    save_bincode(&paths.metadata(), metadata)
}

pub fn load_metadata(paths: &IndexPaths) -> Result<MetadataStore> {
    load_bincode(&paths.metadata())
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    save_json(&paths.meta(), meta)
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    load_json(&paths.meta())
}

/// Persist a freshly built index, its metadata and the header file as one
/// group. `meta.json` lands last, so a directory without it is unfinished.
pub fn save_all(paths: &IndexPaths, index: &InvertedIndex, metadata: &MetadataStore) -> Result<MetaFile> {
    let meta = MetaFile::describe(index, metadata);
    let files = [
        (paths.postings(), encode_bincode(&paths.postings(), index.postings())?),
        (paths.metadata(), encode_bincode(&paths.metadata(), metadata)?),
        (paths.meta(), encode_json(&paths.meta(), &meta)?),
    ];
    write_group(&files, &paths.meta())?;
    Ok(meta)
}

/// Load index and metadata together and make sure they agree with each other
/// and with the header written alongside them.
pub fn load_all(paths: &IndexPaths) -> Result<(InvertedIndex, MetadataStore)> {
    let meta = load_meta(paths)?;
    let header = paths.meta().display().to_string();
    if meta.version != FORMAT_VERSION {
        return Err(Error::malformed(header, format!("unsupported index version {}", meta.version)));
    }
    let index = load_index(paths)?;
    let metadata = load_metadata(paths)?;
    if meta.num_terms != index.num_terms() as u64 {
        return Err(Error::malformed(
            paths.postings().display().to_string(),
            format!("{} terms on disk, header records {}", index.num_terms(), meta.num_terms),
        ));
    }
    if meta.num_reviews != metadata.len() as u64 {
        return Err(Error::malformed(
            paths.metadata().display().to_string(),
            format!("{} reviews on disk, header records {}", metadata.len(), meta.num_reviews),
        ));
    }
    crate::verify_consistency(&index, &metadata)?;
    Ok((index, metadata))
}

/// Both halves are staged before either is renamed; the old model is removed
/// first so an interrupted save never pairs a new vectorizer with it.
pub fn save_classifier(paths: &IndexPaths, artifact: &ClassifierArtifact) -> Result<()> {
    let files = [
        (paths.vectorizer(), encode_bincode(&paths.vectorizer(), &artifact.vectorizer)?),
        (paths.model(), encode_bincode(&paths.model(), &artifact.model)?),
    ];
    write_group(&files, &paths.model())
}

/// The vectorizer and model only make sense as a pair; both must be present
/// and fitted together.
pub fn load_classifier(paths: &IndexPaths) -> Result<ClassifierArtifact> {
    let vectorizer = load_bincode(&paths.vectorizer())?;
    let model = load_bincode(&paths.model())?;
    let artifact = ClassifierArtifact { vectorizer, model };
    artifact
        .check_shape()
        .map_err(|cause| Error::malformed(paths.model().display().to_string(), cause))?;
    Ok(artifact)
}

pub fn has_classifier(paths: &IndexPaths) -> bool {
    paths.vectorizer().is_file() && paths.model().is_file()
}

/// Persist a result set under `name`, IDs ascending. Returns the file path.
pub fn save_result(paths: &IndexPaths, name: &str, ids: &ResultSet) -> Result<PathBuf> {
    let path = paths.result(name);
    save_json(&path, &ResultFile { review_index: ids.to_vec() })?;
    Ok(path)
}

pub fn save_query_result(paths: &IndexPaths, query: &Query, ids: &ResultSet) -> Result<PathBuf> {
    save_result(paths, &query.artifact_name(), ids)
}

pub fn load_result(paths: &IndexPaths, name: &str) -> Result<ResultSet> {
    let file: ResultFile = load_json(&paths.result(name))?;
    Ok(file.review_index.into_iter().collect())
}
