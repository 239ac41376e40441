//! Persisted knowledge snapshots.
//!
//! A snapshot is written as two co-located artifacts inside one directory:
//! the binary index blob and a JSON metadata record holding the chunk list
//! and the blob's checksum. The pair is staged in a sibling directory and
//! swapped in with a directory rename, so readers see either the previous
//! pair, the new pair, or no cache at all. A half-present or mismatched pair
//! is an integrity error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::chunker::Chunk;
use crate::knowledge::KnowledgeError;
use crate::vector_index::FlatIndex;

pub const INDEX_FILE: &str = "knowledge.idx";
pub const META_FILE: &str = "knowledge.meta.json";
const METADATA_VERSION: u32 = 1;

/// SHA256 of content, hex encoded.
/// Normalizes CRLF → LF before hashing for cross-OS consistency.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.replace("\r\n", "\n").as_bytes());
    format!("{:x}", hasher.finalize())
}

fn bytes_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Where the in-memory snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    Loaded,
    Built,
}

/// What a snapshot was built from; used for stale-cache detection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Provenance {
    pub embedding_model: String,
    pub chunk_size: usize,
    pub overlap: usize,
    pub corpus_hash: String,
    pub created_at: DateTime<Utc>,
}

/// One immutable generation of (chunks, index).
#[derive(Debug)]
pub struct KnowledgeSnapshot {
    chunks: Vec<Chunk>,
    index: FlatIndex,
    provenance: Provenance,
    origin: SnapshotOrigin,
}

impl KnowledgeSnapshot {
    pub(crate) fn new(
        chunks: Vec<Chunk>,
        index: FlatIndex,
        provenance: Provenance,
        origin: SnapshotOrigin,
    ) -> Result<Self, KnowledgeError> {
        if chunks.len() != index.len() {
            return Err(KnowledgeError::Integrity(format!(
                "{} chunks but {} index vectors",
                chunks.len(),
                index.len()
            )));
        }
        if let Some((pos, chunk)) = chunks.iter().enumerate().find(|(pos, c)| c.id != *pos) {
            return Err(KnowledgeError::Integrity(format!(
                "chunk at position {pos} carries id {}",
                chunk.id
            )));
        }

        Ok(Self {
            chunks,
            index,
            provenance,
            origin,
        })
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn origin(&self) -> SnapshotOrigin {
        self.origin
    }
}

/// On-disk metadata record (the JSON half of the pair).
#[derive(Serialize, Deserialize, Debug)]
struct SnapshotMetadata {
    format_version: u32,
    #[serde(flatten)]
    provenance: Provenance,
    dimension: usize,
    index_checksum: String,
    chunks: Vec<Chunk>,
}

/// Whether a persisted pair exists at `dir`.
///
/// `Ok(false)` when neither artifact is present; an integrity error when
/// only one of them is.
pub fn exists(dir: &Path) -> Result<bool, KnowledgeError> {
    let index = dir.join(INDEX_FILE).is_file();
    let meta = dir.join(META_FILE).is_file();

    match (index, meta) {
        (true, true) => Ok(true),
        (false, false) => Ok(false),
        (true, false) => Err(KnowledgeError::Integrity(format!(
            "{} present without {}",
            INDEX_FILE, META_FILE
        ))),
        (false, true) => Err(KnowledgeError::Integrity(format!(
            "{} present without {}",
            META_FILE, INDEX_FILE
        ))),
    }
}

/// Load and verify the persisted pair at `dir`.
pub fn read(dir: &Path) -> Result<KnowledgeSnapshot, KnowledgeError> {
    let index_path = dir.join(INDEX_FILE);
    let meta_path = dir.join(META_FILE);

    let index_bytes = fs::read(&index_path).map_err(|e| io_error(&index_path, e))?;
    let meta_bytes = fs::read(&meta_path).map_err(|e| io_error(&meta_path, e))?;

    let metadata: SnapshotMetadata = serde_json::from_slice(&meta_bytes)
        .map_err(|e| KnowledgeError::Integrity(format!("unreadable {META_FILE}: {e}")))?;

    if metadata.format_version != METADATA_VERSION {
        return Err(KnowledgeError::Integrity(format!(
            "unsupported metadata version {}",
            metadata.format_version
        )));
    }

    let checksum = bytes_hash(&index_bytes);
    if checksum != metadata.index_checksum {
        return Err(KnowledgeError::Integrity(format!(
            "{INDEX_FILE} checksum {checksum} does not match recorded {}",
            metadata.index_checksum
        )));
    }

    let index = FlatIndex::from_bytes(&index_bytes)
        .map_err(|e| KnowledgeError::Integrity(format!("unreadable {INDEX_FILE}: {e}")))?;

    if !index.is_empty() && index.dimension() != metadata.dimension {
        return Err(KnowledgeError::Integrity(format!(
            "index dimension {} does not match recorded {}",
            index.dimension(),
            metadata.dimension
        )));
    }

    debug!(dir = %dir.display(), chunks = metadata.chunks.len(), "snapshot verified");

    KnowledgeSnapshot::new(
        metadata.chunks,
        index,
        metadata.provenance,
        SnapshotOrigin::Loaded,
    )
}

/// Persist `snapshot` at `dir`, replacing any previous pair as one unit.
pub fn write(dir: &Path, snapshot: &KnowledgeSnapshot) -> Result<(), KnowledgeError> {
    let index_bytes = snapshot.index.to_bytes();
    let metadata = SnapshotMetadata {
        format_version: METADATA_VERSION,
        provenance: snapshot.provenance.clone(),
        dimension: snapshot.index.dimension(),
        index_checksum: bytes_hash(&index_bytes),
        chunks: snapshot.chunks.clone(),
    };
    let meta_bytes = serde_json::to_vec_pretty(&metadata)?;

    let staging = sibling(dir, "staging");
    let retired = sibling(dir, "old");

    if let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    remove_dir_if_present(&staging)?;
    fs::create_dir(&staging).map_err(|e| io_error(&staging, e))?;

    write_synced(&staging.join(INDEX_FILE), &index_bytes)?;
    write_synced(&staging.join(META_FILE), &meta_bytes)?;

    remove_dir_if_present(&retired)?;
    if dir.exists() {
        fs::rename(dir, &retired).map_err(|e| io_error(dir, e))?;
    }
    fs::rename(&staging, dir).map_err(|e| io_error(&staging, e))?;
    remove_dir_if_present(&retired)?;

    info!(
        dir = %dir.display(),
        chunks = snapshot.chunks.len(),
        bytes = index_bytes.len(),
        "snapshot persisted"
    );
    Ok(())
}

fn sibling(dir: &Path, suffix: &str) -> PathBuf {
    let mut name = dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "knowledge".into());
    name.push(format!(".{suffix}"));
    dir.with_file_name(name)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), KnowledgeError> {
    let mut file = fs::File::create(path).map_err(|e| io_error(path, e))?;
    file.write_all(bytes).map_err(|e| io_error(path, e))?;
    file.sync_all().map_err(|e| io_error(path, e))
}

fn remove_dir_if_present(path: &Path) -> Result<(), KnowledgeError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(path, e)),
    }
}

fn io_error(path: &Path, source: io::Error) -> KnowledgeError {
    KnowledgeError::Io {
        path: path.to_path_buf(),
        source,
    }
}
