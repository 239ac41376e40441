//! Process configuration read from environment variables.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use coach_store::{ChunkConfig, KnowledgeConfig};
use thiserror::Error;

use crate::engine::{GenerationConfig, RetrievalConfig};

pub const DEFAULT_EMBEDDING_MODEL: &str = "bge-small-en-v1.5";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("required setting {0} is missing")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// HTTP bind settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Host to bind to.
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "0.0.0.0".into(),
        }
    }
}

impl ServerConfig {
    /// Get bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub knowledge: KnowledgeConfig,
    pub embedding_model: String,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    pub exercise_catalog_path: PathBuf,
    pub profile_dir: PathBuf,
    pub server: ServerConfig,
}

// Keeps the API key out of logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &"<redacted>")
            .field("knowledge", &self.knowledge)
            .field("embedding_model", &self.embedding_model)
            .field("retrieval", &self.retrieval)
            .field("generation", &self.generation)
            .field("exercise_catalog_path", &self.exercise_catalog_path)
            .field("profile_dir", &self.profile_dir)
            .field("server", &self.server)
            .finish()
    }
}

impl AppConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("GEMINI_API_KEY").ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

        let chunk_size = parse_or(&get, "CHUNK_SIZE", 500usize)?;
        let overlap = parse_or(&get, "CHUNK_OVERLAP", 50usize)?;
        let chunking = ChunkConfig::new(chunk_size, overlap).map_err(|e| ConfigError::Invalid {
            key: "CHUNK_OVERLAP",
            reason: e.to_string(),
        })?;

        let knowledge = KnowledgeConfig {
            corpus_path: path_or(&get, "CORPUS_PATH", "data/expert_knowledge.txt"),
            index_dir: path_or(&get, "INDEX_DIR", "data/knowledge_index"),
            chunking,
            force_rebuild: bool_or(&get, "FORCE_REBUILD", false)?,
        };

        let top_k = parse_or(&get, "RETRIEVAL_TOP_K", 3usize)?;
        if top_k == 0 {
            return Err(ConfigError::Invalid {
                key: "RETRIEVAL_TOP_K",
                reason: "must be at least 1".into(),
            });
        }

        let defaults = GenerationConfig::default();
        let temperature = parse_or(&get, "GENERATION_TEMPERATURE", defaults.temperature)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::Invalid {
                key: "GENERATION_TEMPERATURE",
                reason: format!("{temperature} is outside 0.0..=2.0"),
            });
        }
        let generation = GenerationConfig {
            model: get("GENERATION_MODEL").unwrap_or(defaults.model),
            temperature,
            max_tokens: parse_or(&get, "GENERATION_MAX_TOKENS", defaults.max_tokens)?,
            timeout: Duration::from_secs(parse_or(
                &get,
                "GENERATION_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )?),
        };

        let server_defaults = ServerConfig::default();
        let server = ServerConfig {
            port: parse_or(&get, "COACH_PORT", server_defaults.port)?,
            host: get("COACH_HOST").unwrap_or(server_defaults.host),
        };

        Ok(Self {
            api_key,
            knowledge,
            embedding_model: get("EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.into()),
            retrieval: RetrievalConfig { top_k },
            generation,
            exercise_catalog_path: path_or(&get, "EXERCISE_CATALOG_PATH", "data/exercise.txt"),
            profile_dir: path_or(&get, "PROFILE_DIR", "data/profiles"),
            server,
        })
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: format!("'{raw}': {e}"),
        }),
        None => Ok(default),
    }
}

fn bool_or(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(raw) = get(key) else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            reason: format!("'{raw}' is not a boolean"),
        }),
    }
}

fn path_or(get: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> PathBuf {
    PathBuf::from(get(key).unwrap_or_else(|| default.to_string()))
}
