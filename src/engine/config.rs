use std::time::Duration;

/// Text-generation settings
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationConfig {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u64,
    /// Caller-side bound on a single generation call
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".into(),
            temperature: 0.7,
            max_tokens: 2048,
            timeout: Duration::from_secs(60),
        }
    }
}

/// How many chunks to retrieve
#[derive(Clone, Debug, PartialEq)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}
