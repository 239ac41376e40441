use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use thiserror::Error;

/// Dimension used by the offline hashing provider unless configured otherwise.
pub const DEFAULT_HASHING_DIMENSION: usize = 384;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("failed to initialize embedding model: {0}")]
    Init(String),

    /// The provider could not produce vectors (model failure, network, ...).
    #[error("embedding unavailable: {0}")]
    Unavailable(String),

    #[error("embedding provider returned {got} vectors for {expected} inputs")]
    Malformed { expected: usize, got: usize },
}

/// Maps text to fixed-dimension dense vectors.
///
/// Implementations must be deterministic for a fixed model: the same text
/// always yields the same vector, which is what makes persisted snapshots
/// reusable across restarts.
pub trait EmbeddingProvider: Send {
    /// Identifier recorded in snapshot metadata, e.g. `BGESmallENV15_384`.
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    /// One vector per input, in input order.
    fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError>;

    fn embed_one(&mut self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let vectors = self.embed_batch(&[text])?;
        let got = vectors.len();
        vectors
            .into_iter()
            .next()
            .filter(|_| got == 1)
            .ok_or(EmbedError::Malformed { expected: 1, got })
    }
}

/// Build a provider from its configured name.
///
/// `hashing` selects the offline [`HashingEmbedder`]; anything else is
/// resolved as a fastembed model name.
pub fn provider_from_name(name: &str) -> Result<Box<dyn EmbeddingProvider>, EmbedError> {
    if name.eq_ignore_ascii_case("hashing") {
        return Ok(Box::new(HashingEmbedder::new(DEFAULT_HASHING_DIMENSION)));
    }
    Ok(Box::new(FastEmbedder::from_name(name)?))
}

/// Wraps fastembed model. Holds loaded model weights in memory.
pub struct FastEmbedder {
    model: TextEmbedding,
    model_id: String,
    dimension: usize,
}

impl FastEmbedder {
    /// Initialize with BGE-small-en-v1.5 (384 dimensions)
    pub fn new() -> Result<Self, EmbedError> {
        Self::with_model(EmbeddingModel::BGESmallENV15)
    }

    pub fn from_name(name: &str) -> Result<Self, EmbedError> {
        let model = parse_model_name(name)
            .ok_or_else(|| EmbedError::Init(format!("unknown embedding model '{name}'")))?;
        Self::with_model(model)
    }

    pub fn with_model(model_name: EmbeddingModel) -> Result<Self, EmbedError> {
        let dimension = embedding_dimension(&model_name).ok_or_else(|| {
            EmbedError::Init(format!("unsupported embedding model: {model_name:?}"))
        })?;
        let model_id = format!("{model_name:?}_{dimension}");
        let model =
            TextEmbedding::try_new(InitOptions::new(model_name).with_show_download_progress(true))
                .map_err(|e| EmbedError::Init(e.to_string()))?;

        Ok(Self {
            model,
            model_id,
            dimension,
        })
    }
}

impl EmbeddingProvider for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self
            .model
            .embed(texts, None)
            .map_err(|e| EmbedError::Unavailable(e.to_string()))?;

        if vectors.len() != texts.len() {
            return Err(EmbedError::Malformed {
                expected: texts.len(),
                got: vectors.len(),
            });
        }
        Ok(vectors)
    }
}

fn parse_model_name(name: &str) -> Option<EmbeddingModel> {
    match name.to_ascii_lowercase().as_str() {
        "bge-small-en-v1.5" | "bge-small" => Some(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" | "bge-base" => Some(EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" | "bge-large" => Some(EmbeddingModel::BGELargeENV15),
        "all-minilm-l6-v2" => Some(EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => Some(EmbeddingModel::AllMiniLML12V2),
        _ => None,
    }
}

fn embedding_dimension(model: &EmbeddingModel) -> Option<usize> {
    match model {
        EmbeddingModel::BGESmallENV15 => Some(384),
        EmbeddingModel::BGEBaseENV15 => Some(768),
        EmbeddingModel::BGELargeENV15 => Some(1024),
        EmbeddingModel::AllMiniLML6V2 => Some(384),
        EmbeddingModel::AllMiniLML12V2 => Some(384),
        _ => None,
    }
}

/// Feature-hashing embedder over character trigrams.
///
/// No model download and no network. Lexical rather than semantic, but
/// deterministic across platforms, so it suits offline setups and tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model_id: format!("HashingTrigram_{dimension}"),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let normalized: String = text
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();

        for word in normalized.split_whitespace() {
            let padded: Vec<char> = std::iter::once(' ')
                .chain(word.chars())
                .chain(std::iter::once(' '))
                .collect();
            for gram in padded.windows(3) {
                let bucket = fnv1a(gram) % self.dimension as u64;
                vector[bucket as usize] += 1.0;
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSION)
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET;
    let mut buf = [0u8; 4];
    for c in chars {
        for byte in c.encode_utf8(&mut buf).as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(PRIME);
        }
    }
    hash
}
