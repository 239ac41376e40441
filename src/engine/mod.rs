mod config;
pub mod context;
pub mod generator;
pub mod retriever;

pub use config::{GenerationConfig, RetrievalConfig};
pub use generator::{LlmClient, TextGenerator};

use std::sync::Arc;
use std::time::Duration;

use coach_store::{KnowledgeError, KnowledgeStore, RetrievedChunk};
use thiserror::Error;

use crate::models::ChatMode;
use context::ProfileBag;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("knowledge base error: {0}")]
    Knowledge(#[from] KnowledgeError),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("worker task failed: {0}")]
    Worker(String),
}

/// Raw model text plus the context it was grounded on
#[derive(Debug)]
pub struct CoachAnswer {
    pub text: String,
    pub sources: Vec<RetrievedChunk>,
}

/// retrieve → assemble → generate
pub struct CoachEngine {
    knowledge: Arc<KnowledgeStore>,
    generator: Arc<dyn TextGenerator>,
    retrieval: RetrievalConfig,
}

impl CoachEngine {
    pub fn new(
        knowledge: Arc<KnowledgeStore>,
        generator: Arc<dyn TextGenerator>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            knowledge,
            generator,
            retrieval,
        }
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeStore> {
        &self.knowledge
    }

    pub async fn answer(
        &self,
        query: &str,
        mode: ChatMode,
        profile: Option<&ProfileBag>,
    ) -> Result<CoachAnswer, EngineError> {
        let result = retriever::retrieve(&self.knowledge, query, self.retrieval.top_k).await?;
        tracing::info!(
            mode = mode.as_str(),
            chunks = result.chunks.len(),
            profile = profile.is_some(),
            "context retrieved"
        );

        let prompt = context::assemble(query, mode, &result.texts(), profile);

        // LLM call runs without any lock
        let text = self.generator.generate(&prompt).await?;

        Ok(CoachAnswer {
            text,
            sources: result.chunks,
        })
    }
}
