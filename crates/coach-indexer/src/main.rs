//! coach-indexer CLI - build and inspect the coaching knowledge base

use clap::{Args, Parser, Subcommand};
use coach_store::{ChunkConfig, KnowledgeConfig, KnowledgeStore, provider_from_name, snapshot};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "coach-indexer")]
#[command(about = "Build, inspect and query the coaching knowledge base")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Settings shared with the server; each falls back to the same env var.
#[derive(Args)]
struct StoreArgs {
    /// Raw expert-knowledge corpus
    #[arg(long, env = "CORPUS_PATH", default_value = "data/expert_knowledge.txt")]
    corpus: PathBuf,

    /// Directory holding the persisted snapshot
    #[arg(long, env = "INDEX_DIR", default_value = "data/knowledge_index")]
    index_dir: PathBuf,

    /// fastembed model name, or `hashing` for the offline embedder
    #[arg(long, env = "EMBEDDING_MODEL", default_value = "bge-small-en-v1.5")]
    model: String,

    /// Chunk window size in characters
    #[arg(long, env = "CHUNK_SIZE", default_value_t = 500)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, env = "CHUNK_OVERLAP", default_value_t = 50)]
    overlap: usize,
}

impl StoreArgs {
    fn open(&self, force_rebuild: bool) -> anyhow::Result<KnowledgeStore> {
        let config = KnowledgeConfig {
            corpus_path: self.corpus.clone(),
            index_dir: self.index_dir.clone(),
            chunking: ChunkConfig::new(self.chunk_size, self.overlap)?,
            force_rebuild,
        };
        let embedder = provider_from_name(&self.model)?;
        Ok(KnowledgeStore::open(config, embedder)?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Load the cached snapshot, or build and persist one from the corpus
    Build {
        #[command(flatten)]
        store: StoreArgs,

        /// Ignore any cached snapshot and rebuild from the corpus
        #[arg(long)]
        force: bool,
    },
    /// Show the persisted snapshot without loading an embedding model
    Status {
        /// Directory holding the persisted snapshot
        #[arg(long, env = "INDEX_DIR", default_value = "data/knowledge_index")]
        index_dir: PathBuf,
    },
    /// Run a retrieval query against the knowledge base
    Search {
        #[command(flatten)]
        store: StoreArgs,

        /// Query text
        query: String,

        /// Number of chunks to return
        #[arg(short, long, default_value_t = 3)]
        k: usize,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build { store, force } => {
            info!("Corpus: {}", store.corpus.display());
            info!("Index directory: {}", store.index_dir.display());

            let knowledge = store.open(force)?;
            let status = knowledge.status();
            info!(
                state = status.state,
                chunks = status.chunks,
                dimension = status.dimension,
                origin = ?status.origin,
                "build finished"
            );
        }
        Commands::Status { index_dir } => {
            info!("Checking status of: {}", index_dir.display());

            if !snapshot::exists(&index_dir)? {
                info!("No snapshot persisted yet");
                return Ok(());
            }

            let snap = snapshot::read(&index_dir)?;
            let provenance = snap.provenance();
            info!(
                chunks = snap.chunks().len(),
                dimension = snap.index().dimension(),
                model = %provenance.embedding_model,
                chunk_size = provenance.chunk_size,
                overlap = provenance.overlap,
                corpus_hash = %provenance.corpus_hash,
                created_at = %provenance.created_at,
                "snapshot verified"
            );
        }
        Commands::Search { store, query, k } => {
            let knowledge = store.open(false)?;
            let hits = knowledge.retrieve_scored(&query, k)?;

            if hits.is_empty() {
                info!("No results (knowledge base is empty)");
            }
            for (rank, hit) in hits.iter().enumerate() {
                info!(
                    rank = rank + 1,
                    chunk_id = hit.chunk_id,
                    distance = hit.distance,
                    "{}",
                    hit.text
                );
            }
        }
    }

    Ok(())
}
