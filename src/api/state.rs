use std::sync::Arc;

use coach_store::{KnowledgeStore, provider_from_name};

use crate::coaching::ExerciseCatalog;
use crate::config::AppConfig;
use crate::engine::{CoachEngine, LlmClient};
use crate::profile::ProfileStore;

/// Shared state for all handlers
pub struct AppState {
    pub engine: CoachEngine,
    pub profiles: ProfileStore,
    pub catalog: ExerciseCatalog,
}

impl AppState {
    pub fn new(engine: CoachEngine, profiles: ProfileStore, catalog: ExerciseCatalog) -> Arc<Self> {
        Arc::new(Self {
            engine,
            profiles,
            catalog,
        })
    }

    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Arc<Self>> {
        let knowledge_config = config.knowledge.clone();
        let model = config.embedding_model.clone();

        // Model load and first build are CPU-heavy
        let knowledge = tokio::task::spawn_blocking(move || -> anyhow::Result<KnowledgeStore> {
            let embedder = provider_from_name(&model)?;
            Ok(KnowledgeStore::open(knowledge_config, embedder)?)
        })
        .await??;

        let llm = LlmClient::new(&config.api_key, config.generation.clone());
        let engine = CoachEngine::new(Arc::new(knowledge), Arc::new(llm), config.retrieval.clone());

        let profiles = ProfileStore::new(&config.profile_dir)?;
        let catalog = ExerciseCatalog::load(&config.exercise_catalog_path)?;

        Ok(Self::new(engine, profiles, catalog))
    }
}
