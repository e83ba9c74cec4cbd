use crate::config::{EmbeddingProvider, get_config};
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Provider was unable to produce an embedding for the supplied input.
    #[error("failed to generate embedding: {0}")]
    GenerationFailed(String),
    /// The embedding backend could not be reached or returned an error response.
    #[error("embedding backend request failed: {0}")]
    Backend(String),
    /// The provider returned a vector whose length does not match configuration.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension configured for the service.
        expected: usize,
        /// Dimension actually produced by the provider.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
///
/// Implementations are deterministic for identical input text under a fixed
/// configuration, and always produce vectors of [`dimension`](Self::dimension)
/// length regardless of input length.
#[async_trait]
pub trait EmbeddingClient {
    /// Produce an embedding vector for the supplied text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Dimensionality of every vector this client produces.
    fn dimension(&self) -> usize;
}

/// Deterministic local embedding backend.
///
/// Folds the input bytes into a fixed-size vector and L2-normalizes the
/// result. Identical text always yields an identical vector. Empty text
/// embeds to the all-zero vector of the configured dimension rather than
/// failing; an empty document is a valid document.
pub struct HashEmbeddingClient {
    dimension: usize,
}

impl HashEmbeddingClient {
    /// Construct a client producing vectors of the given dimension.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dimension];

        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % self.dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.dimension == 0 {
            return Err(EmbeddingError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        Ok(self.encode(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Embedding backend speaking to a local Ollama runtime over HTTP.
///
/// Calls `POST {base_url}/api/embed` with the configured model. Transport
/// failures and non-success responses surface as [`EmbeddingError::Backend`];
/// a vector of unexpected length is rejected rather than passed downstream.
pub struct OllamaEmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
}

impl OllamaEmbeddingClient {
    /// Construct a client against the given Ollama base URL.
    pub fn new(base_url: String, model: String, dimension: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            dimension,
        }
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        tracing::debug!(
            model = %self.model,
            dimension = self.dimension,
            chars = text.len(),
            "Requesting embedding from Ollama"
        );

        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|err| EmbeddingError::Backend(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Backend(format!(
                "Ollama returned {status}: {detail}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|err| EmbeddingError::Backend(err.to_string()))?;

        let vector: Vec<f32> = payload
            .get("embeddings")
            .and_then(|value| value.as_array())
            .and_then(|rows| rows.first())
            .and_then(|row| row.as_array())
            .ok_or_else(|| {
                EmbeddingError::GenerationFailed(
                    "Ollama response did not contain an embedding".to_string(),
                )
            })?
            .iter()
            .map(|value| value.as_f64().unwrap_or(0.0) as f32)
            .collect();

        if vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Build an embedding client suitable for the current configuration.
pub fn get_embedding_client() -> Box<dyn EmbeddingClient + Send + Sync> {
    let config = get_config();
    match config.embedding_provider {
        EmbeddingProvider::Hash => Box::new(HashEmbeddingClient::new(config.embedding_dimension)),
        EmbeddingProvider::Ollama => Box::new(OllamaEmbeddingClient::new(
            config
                .ollama_url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            config.embedding_model.clone(),
            config.embedding_dimension,
        )),
    }
}
