use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::chunker::{self, ChunkConfig};
use crate::embedder::{EmbedError, EmbeddingProvider};
use crate::snapshot::{self, KnowledgeSnapshot, Provenance, SnapshotOrigin, content_hash};
use crate::vector_index::{FlatIndex, IndexError};

/// Batch size for embedding processing to reduce peak memory usage
const EMBEDDING_BATCH_SIZE: usize = 32;

#[derive(Error, Debug)]
pub enum KnowledgeError {
    /// Persisted index and metadata do not belong together. Fatal.
    #[error("knowledge base integrity error: {0}")]
    Integrity(String),

    #[error("corpus file not found: {}", .0.display())]
    CorpusMissing(PathBuf),

    #[error(transparent)]
    Embedding(#[from] EmbedError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize snapshot metadata: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct KnowledgeConfig {
    pub corpus_path: PathBuf,
    pub index_dir: PathBuf,
    pub chunking: ChunkConfig,
    /// Ignore any persisted snapshot at startup.
    pub force_rebuild: bool,
}

/// Current generation of the knowledge base.
#[derive(Debug, Clone)]
pub enum KnowledgeState {
    /// No corpus and no cache: retrieval always yields nothing.
    Empty,
    Ready(Arc<KnowledgeSnapshot>),
}

/// A chunk returned from retrieval, nearest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub chunk_id: usize,
    pub text: String,
    pub distance: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeStatus {
    pub state: &'static str,
    pub chunks: usize,
    pub dimension: usize,
    pub embedding_model: Option<String>,
    pub origin: Option<SnapshotOrigin>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Single entry point for the knowledge base: load-or-build at construction,
/// read-only retrieval afterwards, explicit rebuild with an atomic swap.
///
/// Construct once at startup and share (e.g. behind an `Arc`). Retrieval
/// clones the current snapshot handle, so a concurrent rebuild never changes
/// what an in-flight query sees.
pub struct KnowledgeStore {
    config: KnowledgeConfig,
    embedder: Mutex<Box<dyn EmbeddingProvider>>,
    state: RwLock<KnowledgeState>,
    /// Serializes rebuilds; they share the staging directory.
    rebuilding: Mutex<()>,
}

impl KnowledgeStore {
    pub fn open(
        config: KnowledgeConfig,
        mut embedder: Box<dyn EmbeddingProvider>,
    ) -> Result<Self, KnowledgeError> {
        let state = initial_state(&config, embedder.as_mut())?;

        match &state {
            KnowledgeState::Ready(snapshot) => info!(
                chunks = snapshot.chunks().len(),
                origin = ?snapshot.origin(),
                model = %snapshot.provenance().embedding_model,
                "knowledge base ready"
            ),
            KnowledgeState::Empty => warn!(
                corpus = %config.corpus_path.display(),
                "knowledge base empty; retrieval will return no context"
            ),
        }

        Ok(Self {
            config,
            embedder: Mutex::new(embedder),
            state: RwLock::new(state),
            rebuilding: Mutex::new(()),
        })
    }

    pub fn state(&self) -> KnowledgeState {
        self.state.read().clone()
    }

    /// Current snapshot, if any.
    pub fn snapshot(&self) -> Option<Arc<KnowledgeSnapshot>> {
        match &*self.state.read() {
            KnowledgeState::Ready(snapshot) => Some(Arc::clone(snapshot)),
            KnowledgeState::Empty => None,
        }
    }

    /// Top-k chunk texts for `query`, nearest first. Empty in the EMPTY state.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, KnowledgeError> {
        Ok(self
            .retrieve_scored(query, k)?
            .into_iter()
            .map(|hit| hit.text)
            .collect())
    }

    /// Like [`retrieve`](Self::retrieve) but keeps ids and distances.
    pub fn retrieve_scored(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, KnowledgeError> {
        let Some(snapshot) = self.snapshot() else {
            return Ok(Vec::new());
        };

        let query_vector = self.embedder.lock().embed_one(query)?;
        let neighbors = snapshot.index().search(&query_vector, k)?;

        neighbors
            .into_iter()
            .map(|n| {
                snapshot
                    .chunks()
                    .get(n.id)
                    .map(|chunk| RetrievedChunk {
                        chunk_id: n.id,
                        text: chunk.text.clone(),
                        distance: n.distance,
                    })
                    .ok_or_else(|| {
                        KnowledgeError::Integrity(format!("index returned unknown chunk id {}", n.id))
                    })
            })
            .collect()
    }

    /// Rebuild from the corpus and swap the new snapshot in.
    ///
    /// The previous snapshot stays in service until the swap and keeps
    /// answering queries between embedding batches. If the corpus is missing
    /// the store is left untouched and `CorpusMissing` returned.
    pub fn rebuild(&self) -> Result<KnowledgeStatus, KnowledgeError> {
        let _rebuilding = self.rebuilding.lock();
        let model_id = self.embedder.lock().model_id().to_string();

        // Lock per batch and hand off fairly so queries interleave with the build.
        let snapshot = build_from_corpus(&self.config, &model_id, |batch| {
            let mut embedder = self.embedder.lock();
            let embedded = embedder.embed_batch(batch);
            MutexGuard::unlock_fair(embedder);
            embedded
        })?
        .ok_or_else(|| KnowledgeError::CorpusMissing(self.config.corpus_path.clone()))?;

        *self.state.write() = KnowledgeState::Ready(Arc::new(snapshot));
        info!("knowledge snapshot swapped after rebuild");

        Ok(self.status())
    }

    pub fn status(&self) -> KnowledgeStatus {
        match self.snapshot() {
            Some(snapshot) => KnowledgeStatus {
                state: "ready",
                chunks: snapshot.chunks().len(),
                dimension: snapshot.index().dimension(),
                embedding_model: Some(snapshot.provenance().embedding_model.clone()),
                origin: Some(snapshot.origin()),
                created_at: Some(snapshot.provenance().created_at),
            },
            None => KnowledgeStatus {
                state: "empty",
                chunks: 0,
                dimension: 0,
                embedding_model: None,
                origin: None,
                created_at: None,
            },
        }
    }
}

fn initial_state(
    config: &KnowledgeConfig,
    embedder: &mut dyn EmbeddingProvider,
) -> Result<KnowledgeState, KnowledgeError> {
    if config.force_rebuild {
        info!("force rebuild requested; ignoring cached snapshot");
    } else if let Some(snapshot) = load_cached(config, embedder.model_id())? {
        return Ok(KnowledgeState::Ready(Arc::new(snapshot)));
    }

    let model_id = embedder.model_id().to_string();
    Ok(match build_from_corpus(config, &model_id, |batch| embedder.embed_batch(batch))? {
        Some(snapshot) => KnowledgeState::Ready(Arc::new(snapshot)),
        None => KnowledgeState::Empty,
    })
}

/// Load the persisted pair unless it is absent or stale.
/// Never touches the embedding provider beyond reading its model id.
fn load_cached(
    config: &KnowledgeConfig,
    model_id: &str,
) -> Result<Option<KnowledgeSnapshot>, KnowledgeError> {
    if !snapshot::exists(&config.index_dir)? {
        info!(dir = %config.index_dir.display(), "no cached snapshot");
        return Ok(None);
    }

    let snapshot = snapshot::read(&config.index_dir)?;

    if let Some(reason) = staleness(snapshot.provenance(), config, model_id)? {
        warn!(reason = %reason, "cached snapshot is stale; rebuilding");
        return Ok(None);
    }

    info!(dir = %config.index_dir.display(), "loaded cached snapshot");
    Ok(Some(snapshot))
}

fn staleness(
    provenance: &Provenance,
    config: &KnowledgeConfig,
    model_id: &str,
) -> Result<Option<String>, KnowledgeError> {
    if provenance.embedding_model != model_id {
        return Ok(Some(format!(
            "embedding model changed from {} to {model_id}",
            provenance.embedding_model
        )));
    }

    if provenance.chunk_size != config.chunking.chunk_size()
        || provenance.overlap != config.chunking.overlap()
    {
        return Ok(Some(format!(
            "chunking changed from {}/{} to {}/{}",
            provenance.chunk_size,
            provenance.overlap,
            config.chunking.chunk_size(),
            config.chunking.overlap()
        )));
    }

    // A missing corpus keeps the cache usable.
    if let Some(corpus) = read_corpus(&config.corpus_path)?
        && content_hash(&corpus) != provenance.corpus_hash
    {
        return Ok(Some("corpus content changed".into()));
    }

    Ok(None)
}

/// Chunk, embed, index and persist the corpus. `None` if the corpus is absent.
fn build_from_corpus(
    config: &KnowledgeConfig,
    model_id: &str,
    mut embed_batch: impl FnMut(&[&str]) -> Result<Vec<Vec<f32>>, EmbedError>,
) -> Result<Option<KnowledgeSnapshot>, KnowledgeError> {
    let Some(corpus) = read_corpus(&config.corpus_path)? else {
        warn!(path = %config.corpus_path.display(), "corpus file not found");
        return Ok(None);
    };

    let chunks = chunker::split(&corpus, &config.chunking);
    info!(
        chunks = chunks.len(),
        chunk_size = config.chunking.chunk_size(),
        overlap = config.chunking.overlap(),
        "corpus chunked"
    );

    let mut vectors = Vec::with_capacity(chunks.len());
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    for batch in texts.chunks(EMBEDDING_BATCH_SIZE) {
        let embedded = embed_batch(batch)?;
        if embedded.len() != batch.len() {
            return Err(EmbedError::Malformed {
                expected: batch.len(),
                got: embedded.len(),
            }
            .into());
        }
        vectors.extend(embedded);
    }

    let index = FlatIndex::build(vectors)?;
    let provenance = Provenance {
        embedding_model: model_id.to_string(),
        chunk_size: config.chunking.chunk_size(),
        overlap: config.chunking.overlap(),
        corpus_hash: content_hash(&corpus),
        created_at: Utc::now(),
    };

    let snapshot = KnowledgeSnapshot::new(chunks, index, provenance, SnapshotOrigin::Built)?;
    snapshot::write(&config.index_dir, &snapshot)?;

    Ok(Some(snapshot))
}

fn read_corpus(path: &Path) -> Result<Option<String>, KnowledgeError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(KnowledgeError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;
    use tempfile::TempDir;

    /// Counts calls so tests can assert the provider was not touched.
    struct CountingEmbedder {
        inner: HashingEmbedder,
        calls: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl EmbeddingProvider for CountingEmbedder {
        fn model_id(&self) -> &str {
            self.inner.model_id()
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.embed_batch(texts)
        }
    }

    struct FailingEmbedder;

    impl EmbeddingProvider for FailingEmbedder {
        fn model_id(&self) -> &str {
            "failing"
        }

        fn dimension(&self) -> usize {
            4
        }

        fn embed_batch(&mut self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Err(EmbedError::Unavailable("model offline".into()))
        }
    }

    /// Drops the last vector of every batch.
    struct ShortEmbedder;

    impl EmbeddingProvider for ShortEmbedder {
        fn model_id(&self) -> &str {
            "short"
        }

        fn dimension(&self) -> usize {
            2
        }

        fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Ok(texts.iter().skip(1).map(|_| vec![1.0, 0.0]).collect())
        }
    }

    /// Sleeps on every multi-text batch; single-query embeds stay fast.
    struct SlowEmbedder {
        inner: HashingEmbedder,
        batch_started: Arc<std::sync::atomic::AtomicBool>,
    }

    impl EmbeddingProvider for SlowEmbedder {
        fn model_id(&self) -> &str {
            self.inner.model_id()
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
            if texts.len() > 1 {
                self.batch_started
                    .store(true, std::sync::atomic::Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(150));
            }
            self.inner.embed_batch(texts)
        }
    }

    fn setup(corpus: Option<&str>) -> (TempDir, KnowledgeConfig) {
        let tmp = TempDir::new().unwrap();
        let corpus_path = tmp.path().join("expert_knowledge.txt");
        if let Some(text) = corpus {
            fs::write(&corpus_path, text).unwrap();
        }
        let config = KnowledgeConfig {
            corpus_path,
            index_dir: tmp.path().join("index"),
            chunking: ChunkConfig::default(),
            force_rebuild: false,
        };
        (tmp, config)
    }

    fn counting() -> (Box<dyn EmbeddingProvider>, Arc<std::sync::atomic::AtomicUsize>) {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let embedder = CountingEmbedder {
            inner: HashingEmbedder::new(256),
            calls: Arc::clone(&calls),
        };
        (Box::new(embedder), calls)
    }

    const CORPUS: &str = "Deadlifts need neutral spine and a braced core.\n\n\
                          Squats build leg strength when depth is controlled.\n";

    #[test]
    fn test_missing_corpus_without_cache_is_empty() {
        let (_tmp, config) = setup(None);
        let store = KnowledgeStore::open(config, Box::new(HashingEmbedder::new(64))).unwrap();

        assert!(matches!(store.state(), KnowledgeState::Empty));
        assert!(store.retrieve("anything", 3).unwrap().is_empty());
        assert_eq!(store.status().state, "empty");
    }

    #[test]
    fn test_build_persists_and_second_open_loads_without_embedding() {
        let (_tmp, config) = setup(Some(CORPUS));
        let (embedder, _) = counting();
        let first = KnowledgeStore::open(config.clone(), embedder).unwrap();
        assert_eq!(first.status().origin, Some(SnapshotOrigin::Built));

        let (embedder, calls) = counting();
        let second = KnowledgeStore::open(config, embedder).unwrap();
        assert_eq!(second.status().origin, Some(SnapshotOrigin::Loaded));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(second.status().chunks, 2);
    }

    #[test]
    fn test_force_rebuild_ignores_cache() {
        let (_tmp, mut config) = setup(Some(CORPUS));
        KnowledgeStore::open(config.clone(), Box::new(HashingEmbedder::new(256))).unwrap();

        config.force_rebuild = true;
        let (embedder, calls) = counting();
        let store = KnowledgeStore::open(config, embedder).unwrap();
        assert_eq!(store.status().origin, Some(SnapshotOrigin::Built));
        assert!(calls.load(std::sync::atomic::Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_changed_model_marks_cache_stale() {
        let (_tmp, config) = setup(Some(CORPUS));
        KnowledgeStore::open(config.clone(), Box::new(HashingEmbedder::new(128))).unwrap();

        let store = KnowledgeStore::open(config, Box::new(HashingEmbedder::new(256))).unwrap();
        assert_eq!(store.status().origin, Some(SnapshotOrigin::Built));
        assert_eq!(store.status().dimension, 256);
    }

    #[test]
    fn test_changed_corpus_marks_cache_stale() {
        let (_tmp, config) = setup(Some(CORPUS));
        KnowledgeStore::open(config.clone(), Box::new(HashingEmbedder::new(128))).unwrap();

        fs::write(&config.corpus_path, "Only one paragraph now.").unwrap();
        let store = KnowledgeStore::open(config, Box::new(HashingEmbedder::new(128))).unwrap();
        assert_eq!(store.status().origin, Some(SnapshotOrigin::Built));
        assert_eq!(store.status().chunks, 1);
    }

    #[test]
    fn test_cache_survives_missing_corpus() {
        let (_tmp, config) = setup(Some(CORPUS));
        KnowledgeStore::open(config.clone(), Box::new(HashingEmbedder::new(128))).unwrap();

        fs::remove_file(&config.corpus_path).unwrap();
        let store = KnowledgeStore::open(config, Box::new(HashingEmbedder::new(128))).unwrap();
        assert_eq!(store.status().origin, Some(SnapshotOrigin::Loaded));
    }

    #[test]
    fn test_embedding_failure_is_surfaced() {
        let (_tmp, config) = setup(Some(CORPUS));
        let err = KnowledgeStore::open(config, Box::new(FailingEmbedder)).err().unwrap();
        assert!(matches!(err, KnowledgeError::Embedding(EmbedError::Unavailable(_))));
    }

    #[test]
    fn test_short_embedding_batch_is_rejected() {
        let (_tmp, config) = setup(Some(CORPUS));
        let err = KnowledgeStore::open(config, Box::new(ShortEmbedder)).err().unwrap();
        assert!(matches!(
            err,
            KnowledgeError::Embedding(EmbedError::Malformed { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_rebuild_swaps_snapshot() {
        let (_tmp, config) = setup(Some(CORPUS));
        let store = KnowledgeStore::open(config.clone(), Box::new(HashingEmbedder::new(128))).unwrap();
        let before = store.snapshot().unwrap();

        fs::write(&config.corpus_path, "Hip hinge drills.\n\nBox jumps.\n\nPlanks.").unwrap();
        let status = store.rebuild().unwrap();

        assert_eq!(status.chunks, 3);
        assert_eq!(before.chunks().len(), 2);
        assert!(!Arc::ptr_eq(&before, &store.snapshot().unwrap()));
    }

    #[test]
    fn test_rebuild_without_corpus_keeps_current_snapshot() {
        let (_tmp, config) = setup(Some(CORPUS));
        let store = KnowledgeStore::open(config.clone(), Box::new(HashingEmbedder::new(128))).unwrap();

        fs::remove_file(&config.corpus_path).unwrap();
        assert!(matches!(store.rebuild(), Err(KnowledgeError::CorpusMissing(_))));
        assert_eq!(store.status().chunks, 2);
    }

    #[test]
    fn test_queries_interleave_with_rebuild_batches() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let (_tmp, config) = setup(Some(CORPUS));
        let batch_started = Arc::new(AtomicBool::new(false));
        let embedder = SlowEmbedder {
            inner: HashingEmbedder::new(128),
            batch_started: Arc::clone(&batch_started),
        };
        let store = Arc::new(KnowledgeStore::open(config.clone(), Box::new(embedder)).unwrap());
        batch_started.store(false, Ordering::SeqCst);

        // Three full embedding batches.
        let corpus: Vec<String> = (0..EMBEDDING_BATCH_SIZE * 3)
            .map(|i| format!("Drill {i} trains posture and grip."))
            .collect();
        fs::write(&config.corpus_path, corpus.join("\n\n")).unwrap();

        let rebuild_done = Arc::new(AtomicBool::new(false));
        let rebuilder = {
            let store = Arc::clone(&store);
            let rebuild_done = Arc::clone(&rebuild_done);
            std::thread::spawn(move || {
                let status = store.rebuild().unwrap();
                rebuild_done.store(true, Ordering::SeqCst);
                status
            })
        };

        while !batch_started.load(Ordering::SeqCst) {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        let hits = store.retrieve("deadlift", 1).unwrap();

        assert_eq!(hits.len(), 1);
        assert!(
            !rebuild_done.load(Ordering::SeqCst),
            "query waited for the whole rebuild"
        );
        assert_eq!(rebuilder.join().unwrap().chunks, EMBEDDING_BATCH_SIZE * 3);
    }

    #[test]
    fn test_retrieve_rejects_zero_k() {
        let (_tmp, config) = setup(Some(CORPUS));
        let store = KnowledgeStore::open(config, Box::new(HashingEmbedder::new(128))).unwrap();
        assert!(matches!(
            store.retrieve("squat", 0),
            Err(KnowledgeError::Index(IndexError::InvalidTopK))
        ));
    }
}
