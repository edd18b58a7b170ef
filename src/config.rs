use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Runtime configuration, assembled from environment variables.
///
/// Credentials and the index identity are required and checked before any
/// request is served; everything else has a default. A `.env` file in the
/// working directory is honored.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub vector_api_key: String,
    pub index_name: String,
    pub index_host: String,
    pub embedding: EmbeddingConfig,
    pub cache: CacheConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dims: usize,
    pub batch_size: usize,
    pub index_max_retries: u32,
    pub serve_max_retries: u32,
    pub timeout_secs: u64,
    /// Pause between embedding batches during an indexing run.
    pub batch_delay_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dims: 1536,
            batch_size: 100,
            index_max_retries: 5,
            serve_max_retries: 1,
            timeout_secs: 30,
            batch_delay_ms: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

impl Config {
    /// Load configuration from the environment (and `.env`, if present).
    ///
    /// # Errors
    ///
    /// Fails when a required variable is missing or a numeric override does
    /// not parse. This is the startup-fatal configuration check: callers are
    /// expected to abort before serving anything.
    pub fn from_env() -> Result<Self> {
        // Best-effort: absence of a .env file is not an error.
        let _ = dotenvy::dotenv();

        let openai_api_key = require_var("OPENAI_API_KEY")?;
        let vector_api_key = require_var("PINECONE_API_KEY")?;
        let index_name = require_var("PINECONE_INDEX_NAME")?;
        let index_host = require_var("PINECONE_INDEX_HOST")?;

        let mut embedding = EmbeddingConfig::default();
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            embedding.model = model;
        }
        if let Some(dims) = parse_var::<usize>("EMBEDDING_DIMS")? {
            embedding.dims = dims;
        }
        if let Some(batch) = parse_var::<usize>("EMBED_BATCH_SIZE")? {
            embedding.batch_size = batch;
        }
        if let Some(timeout) = parse_var::<u64>("REQUEST_TIMEOUT_SECS")? {
            embedding.timeout_secs = timeout;
        }

        let cache_dir = std::env::var("DOCDEX_CACHE_DIR").unwrap_or_else(|_| ".cache".to_string());
        let ttl_seconds = parse_var::<i64>("CACHE_TTL_SECONDS")?.unwrap_or(86_400);

        let bind =
            std::env::var("DOCDEX_BIND").unwrap_or_else(|_| "127.0.0.1:8421".to_string());

        let config = Self {
            openai_api_key,
            vector_api_key,
            index_name,
            index_host,
            embedding,
            cache: CacheConfig {
                dir: PathBuf::from(cache_dir),
                ttl_seconds,
            },
            server: ServerConfig { bind },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.embedding.dims == 0 {
            bail!("EMBEDDING_DIMS must be > 0");
        }
        if self.embedding.batch_size == 0 {
            bail!("EMBED_BATCH_SIZE must be > 0");
        }
        if self.cache.ttl_seconds < 0 {
            bail!("CACHE_TTL_SECONDS must be >= 0");
        }
        if !self.index_host.starts_with("http://") && !self.index_host.starts_with("https://") {
            bail!(
                "PINECONE_INDEX_HOST must be a full URL, got '{}'",
                self.index_host
            );
        }
        Ok(())
    }
}

fn require_var(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!(
            "Missing required environment variable: {}. Set it in the environment or a .env file.",
            key
        ),
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => {
            let parsed = raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("Failed to parse {}='{}'", key, raw))?;
            Ok(Some(parsed))
        }
        Err(_) => Ok(None),
    }
}
