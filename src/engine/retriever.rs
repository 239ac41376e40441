use std::sync::Arc;

use coach_store::{KnowledgeStore, RetrievedChunk};

use super::EngineError;

/// Retrieved context from vector search, nearest first
#[derive(Debug, Default)]
pub struct RetrievalResult {
    pub chunks: Vec<RetrievedChunk>,
}

impl RetrievalResult {
    pub fn texts(&self) -> Vec<&str> {
        self.chunks.iter().map(|c| c.text.as_str()).collect()
    }
}

/// Embed and search on the blocking pool; the embedder is CPU-bound.
pub async fn retrieve(
    store: &Arc<KnowledgeStore>,
    query: &str,
    k: usize,
) -> Result<RetrievalResult, EngineError> {
    let store = Arc::clone(store);
    let query = query.to_owned();

    let chunks = tokio::task::spawn_blocking(move || store.retrieve_scored(&query, k))
        .await
        .map_err(|e| EngineError::Worker(e.to_string()))??;

    Ok(RetrievalResult { chunks })
}
