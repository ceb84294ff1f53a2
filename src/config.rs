//! Configuration for the ingestion-and-retrieval pipeline.
//!
//! All behaviour is controlled through [`KbConfig`], built via its
//! [`KbConfigBuilder`]. Keeping every knob in one struct makes it trivial to
//! share configs across tasks, log them, and diff two runs to understand why
//! their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::KbError;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a [`crate::service::KnowledgeService`] and its parts.
///
/// Built via [`KbConfig::builder()`].
///
/// # Example
/// ```rust
/// use pdfrag::KbConfig;
///
/// let config = KbConfig::builder()
///     .storage_dir("/var/lib/pdfrag/files")
///     .snapshot_path("/var/lib/pdfrag/kb.json")
///     .chunk_size(500)
///     .chunk_overlap(100)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct KbConfig {
    /// Directory where uploaded PDFs and extracted page images are stored.
    pub storage_dir: PathBuf,

    /// Path of the on-disk vector collection snapshot.
    pub snapshot_path: PathBuf,

    /// Maximum characters per chunk. Default: 500.
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks. Default: 100.
    ///
    /// Overlap keeps a sentence that straddles a chunk boundary retrievable
    /// from both sides. Must be strictly smaller than `chunk_size`.
    pub chunk_overlap: usize,

    /// Number of native engine workers available to page tasks. Default: 1.
    ///
    /// The rendering engine is backed by heavyweight worker instances; page
    /// tasks beyond this count queue rather than run. Raising this past the
    /// engine's real capacity only creates queuing, not parallelism.
    pub engine_workers: usize,

    /// How long a page task may wait for an engine worker. Default: 30 s.
    ///
    /// Expiry is reported as an extraction error, not retried.
    pub engine_acquire_timeout: Duration,

    /// Base URL of the OpenAI-compatible API used for embeddings and image
    /// description, without a trailing slash. Default: `https://api.openai.com/v1`.
    pub api_base_url: String,

    /// API key. If `None`, `OPENAI_API_KEY` is read from the environment at
    /// client construction time.
    pub api_key: Option<String>,

    /// Embedding model identifier. Default: `text-embedding-3-small`.
    pub embedding_model: String,

    /// Multimodal model used to describe extracted images. Default: `gpt-4o-mini`.
    pub vision_model: String,

    /// Sampling temperature for image description. Default: 0.2.
    ///
    /// Low temperature keeps the description faithful to what is on the
    /// image rather than creative.
    pub vision_temperature: f32,

    /// Maximum tokens the vision model may generate per image. Default: 4096.
    pub vision_max_tokens: usize,

    /// Per-request timeout for remote model calls. Default: 60 s.
    pub api_timeout: Duration,
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("data/files"),
            snapshot_path: PathBuf::from("data/kb.json"),
            chunk_size: 500,
            chunk_overlap: 100,
            engine_workers: 1,
            engine_acquire_timeout: Duration::from_secs(30),
            api_base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            embedding_model: "text-embedding-3-small".to_string(),
            vision_model: "gpt-4o-mini".to_string(),
            vision_temperature: 0.2,
            vision_max_tokens: 4096,
            api_timeout: Duration::from_secs(60),
        }
    }
}

impl KbConfig {
    /// Create a new builder for `KbConfig`.
    pub fn builder() -> KbConfigBuilder {
        KbConfigBuilder {
            config: Self::default(),
        }
    }

    /// The configured API key, falling back to the `OPENAI_API_KEY`
    /// environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }
}

/// Builder for [`KbConfig`].
#[derive(Debug)]
pub struct KbConfigBuilder {
    config: KbConfig,
}

impl KbConfigBuilder {
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = dir.into();
        self
    }

    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.snapshot_path = path.into();
        self
    }

    pub fn chunk_size(mut self, n: usize) -> Self {
        self.config.chunk_size = n.max(1);
        self
    }

    pub fn chunk_overlap(mut self, n: usize) -> Self {
        self.config.chunk_overlap = n;
        self
    }

    pub fn engine_workers(mut self, n: usize) -> Self {
        self.config.engine_workers = n.max(1);
        self
    }

    pub fn engine_acquire_timeout(mut self, t: Duration) -> Self {
        self.config.engine_acquire_timeout = t;
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.config.api_base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision_model = model.into();
        self
    }

    pub fn vision_temperature(mut self, t: f32) -> Self {
        self.config.vision_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn vision_max_tokens(mut self, n: usize) -> Self {
        self.config.vision_max_tokens = n;
        self
    }

    pub fn api_timeout(mut self, t: Duration) -> Self {
        self.config.api_timeout = t;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<KbConfig, KbError> {
        let c = &self.config;
        if c.chunk_overlap >= c.chunk_size {
            return Err(KbError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if c.engine_workers == 0 {
            return Err(KbError::InvalidConfig(
                "engine_workers must be ≥ 1".into(),
            ));
        }
        if c.api_base_url.is_empty() {
            return Err(KbError::InvalidConfig("api_base_url must not be empty".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let config = KbConfig::builder().build().expect("defaults are valid");
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 100);
        assert_eq!(config.engine_workers, 1);
        assert_eq!(config.engine_acquire_timeout, Duration::from_secs(30));
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let err = KbConfig::builder()
            .chunk_size(100)
            .chunk_overlap(100)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = KbConfig::builder()
            .api_base_url("http://localhost:11434/v1/")
            .build()
            .unwrap();
        assert_eq!(config.api_base_url, "http://localhost:11434/v1");
    }
}
