use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the docvec server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Hostname of the PostgreSQL backing store.
    pub pg_host: String,
    /// Port of the PostgreSQL backing store.
    pub pg_port: u16,
    /// Database name within the backing store.
    pub pg_database: String,
    /// Role used to authenticate against the backing store.
    pub pg_user: String,
    /// Credential used to authenticate against the backing store.
    pub pg_password: String,
    /// Minimum number of pooled connections held open.
    pub pool_min_size: u32,
    /// Maximum number of pooled connections ever live at once.
    pub pool_max_size: u32,
    /// Seconds an `acquire` waits for a free connection before failing.
    pub pool_acquire_timeout_secs: u64,
    /// Directory where uploaded files are staged before extraction.
    pub upload_dir: PathBuf,
    /// Embedding backend used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL of the Ollama runtime, when that provider is selected.
    pub ollama_url: Option<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the ingestion pipeline.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Deterministic local byte-fold embedding.
    Hash,
    /// Local Ollama runtime reached over HTTP.
    Ollama,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self {
            pg_host: load_env("PGHOST")?,
            pg_port: load_env("PGPORT")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PGPORT".to_string()))?,
            pg_database: load_env("PGDATABASE")?,
            pg_user: load_env("PGUSER")?,
            pg_password: load_env("PGPASSWORD")?,
            pool_min_size: parse_env_or("PGPOOL_MIN_SIZE", 2)?,
            pool_max_size: parse_env_or("PGPOOL_MAX_SIZE", 10)?,
            pool_acquire_timeout_secs: parse_env_or("PGPOOL_ACQUIRE_TIMEOUT_SECS", 30)?,
            upload_dir: load_env_optional("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            embedding_provider: load_env("EMBEDDING_PROVIDER")?
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            ollama_url: load_env_optional("OLLAMA_URL"),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        }
        .validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.pool_max_size == 0 {
            return Err(ConfigError::InvalidValue("PGPOOL_MAX_SIZE".to_string()));
        }
        if self.pool_min_size > self.pool_max_size {
            return Err(ConfigError::InvalidValue("PGPOOL_MIN_SIZE".to_string()));
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()));
        }
        Ok(self)
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|value| value.unwrap_or(default))
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hash" => Ok(Self::Hash),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        pg_host = %config.pg_host,
        pg_database = %config.pg_database,
        pool_min = config.pool_min_size,
        pool_max = config.pool_max_size,
        upload_dir = %config.upload_dir.display(),
        embedding_provider = ?config.embedding_provider,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
