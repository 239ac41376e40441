//! coach-store: corpus chunking, embeddings and the persisted knowledge base
//!
//! This crate owns the storage half of the coaching RAG pipeline. It is shared
//! between coach-indexer (builds snapshots offline) and the coach-carter server
//! (loads or builds one snapshot at startup and serves retrieval from it).

pub mod chunker;
pub mod embedder;
pub mod knowledge;
pub mod snapshot;
pub mod vector_index;

pub use chunker::{Chunk, ChunkConfig, ChunkError, split};
pub use embedder::{
    DEFAULT_HASHING_DIMENSION, EmbedError, EmbeddingProvider, FastEmbedder, HashingEmbedder,
    provider_from_name,
};
pub use knowledge::{
    KnowledgeConfig, KnowledgeError, KnowledgeState, KnowledgeStatus, KnowledgeStore,
    RetrievedChunk,
};
pub use snapshot::{KnowledgeSnapshot, Provenance, SnapshotOrigin, content_hash};
pub use vector_index::{FlatIndex, IndexError, Neighbor};
