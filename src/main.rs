//! coach-carter HTTP server

use coach_carter::api::{self, AppState};
use coach_carter::config::AppConfig;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = AppConfig::from_env()?;
    info!(
        corpus = %config.knowledge.corpus_path.display(),
        index_dir = %config.knowledge.index_dir.display(),
        embedding_model = %config.embedding_model,
        generation_model = %config.generation.model,
        "starting coach-carter"
    );

    let state = AppState::from_config(&config).await?;
    let knowledge = state.engine.knowledge().status();
    info!(
        state = knowledge.state,
        chunks = knowledge.chunks,
        "knowledge base ready"
    );

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, api::router(state)).await?;

    Ok(())
}
