//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and concrete backends:
//! - **[`DisabledEmbedder`]** — returns errors; used when embeddings are not configured.
//! - **[`OllamaEmbedder`]** — calls a local Ollama server's `/api/embed` endpoint.
//! - **[`OpenAiEmbedder`]** — calls the OpenAI embeddings API.
//!
//! An embedder is constructed once via [`create_embedder`] and passed by
//! reference through the pipeline — there is no hidden process-wide model
//! state. The batched call is order-preserving by contract: input text *i*
//! produces output vector *i*, and a response with a different cardinality
//! or dimensionality is an [`EmbeddingFailure`](crate::error::QuarryError::EmbeddingFailure).
//!
//! The build-time and query-time embedder must be the identical model; the
//! artifact manifest records the model name so the retriever can enforce it.
//!
//! # Retry strategy
//!
//! HTTP backends retry transient errors with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{QuarryError, Result};

/// Text-to-vector encoder with a fixed model identity.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `768`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| QuarryError::EmbeddingFailure {
            provider: self.model_name().to_string(),
            message: "empty embedding response".to_string(),
        })
    }
}

/// Create the appropriate [`Embedder`] based on configuration.
///
/// | Config value | Backend |
/// |--------------|---------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"ollama"`   | [`OllamaEmbedder`] |
/// | `"openai"`   | [`OpenAiEmbedder`] |
///
/// # Errors
///
/// Returns an error for unknown provider names or when required config
/// (model, dims, API key) is missing.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledEmbedder)),
        "ollama" => Ok(Box::new(OllamaEmbedder::new(config)?)),
        "openai" => Ok(Box::new(OpenAiEmbedder::new(config)?)),
        other => Err(QuarryError::InvalidParameter(format!(
            "unknown embedding provider: '{}'",
            other
        ))),
    }
}

fn require_model(config: &EmbeddingConfig) -> Result<String> {
    config.model.clone().ok_or_else(|| {
        QuarryError::InvalidParameter("embedding.model is required".to_string())
    })
}

fn require_dims(config: &EmbeddingConfig) -> Result<usize> {
    config.dims.filter(|&d| d > 0).ok_or_else(|| {
        QuarryError::InvalidParameter("embedding.dims must be > 0".to_string())
    })
}

fn http_client(timeout_secs: u64, provider: &str) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| QuarryError::EmbeddingFailure {
            provider: provider.to_string(),
            message: e.to_string(),
        })
}

/// POST a JSON body with retry on transient failures, returning the parsed
/// response body. Shared by the Ollama and OpenAI backends.
async fn post_with_retry(
    client: &reqwest::Client,
    provider: &str,
    url: &str,
    api_key: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let mut last_err: Option<QuarryError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        if let Some(key) = api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response.json().await.map_err(|e| QuarryError::EmbeddingFailure {
                        provider: provider.to_string(),
                        message: format!("invalid response body: {}", e),
                    });
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = QuarryError::EmbeddingFailure {
                    provider: provider.to_string(),
                    message: format!("HTTP {}: {}", status, body_text),
                };

                // Rate limited or server error: retry. Other 4xx: fail fast.
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(err);
                    continue;
                }
                return Err(err);
            }
            Err(e) => {
                last_err = Some(QuarryError::EmbeddingFailure {
                    provider: provider.to_string(),
                    message: e.to_string(),
                });
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| QuarryError::EmbeddingFailure {
        provider: provider.to_string(),
        message: "embedding failed after retries".to_string(),
    }))
}

/// Check the response cardinality and dimensionality against the request.
fn validate_batch(
    provider: &str,
    expected_count: usize,
    expected_dims: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected_count {
        return Err(QuarryError::EmbeddingFailure {
            provider: provider.to_string(),
            message: format!(
                "response has {} vectors for {} inputs",
                vectors.len(),
                expected_count
            ),
        });
    }
    for v in &vectors {
        if v.len() != expected_dims {
            return Err(QuarryError::EmbeddingFailure {
                provider: provider.to_string(),
                message: format!("vector has {} dims, expected {}", v.len(), expected_dims),
            });
        }
    }
    Ok(vectors)
}

fn parse_vector_array(provider: &str, value: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let outer = value.as_array().ok_or_else(|| QuarryError::EmbeddingFailure {
        provider: provider.to_string(),
        message: "response embeddings field is not an array".to_string(),
    })?;
    let mut vectors = Vec::with_capacity(outer.len());
    for item in outer {
        let inner = item.as_array().ok_or_else(|| QuarryError::EmbeddingFailure {
            provider: provider.to_string(),
            message: "embedding entry is not an array".to_string(),
        })?;
        vectors.push(inner.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect());
    }
    Ok(vectors)
}

// ============ Disabled embedder ============

/// A no-op embedder that always returns errors.
///
/// Used when `embedding.provider = "disabled"` (the config default), so
/// `qry ingest` works without an embedding backend while `qry build` fails
/// with a clear message.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(QuarryError::EmbeddingFailure {
            provider: "disabled".to_string(),
            message: "embedding provider is disabled; set [embedding] provider in config"
                .to_string(),
        })
    }
}

// ============ Ollama embedder ============

/// Embedding backend using a local Ollama server.
///
/// Calls `POST {base_url}/api/embed` with the whole batch as `input`.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = require_model(config)?;
        let dims = require_dims(config)?;
        Ok(Self {
            client: http_client(config.timeout_secs, "ollama")?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model,
            dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let json =
            post_with_retry(&self.client, "ollama", &url, None, &body, self.max_retries).await?;
        let embeddings = json.get("embeddings").ok_or_else(|| QuarryError::EmbeddingFailure {
            provider: "ollama".to_string(),
            message: "response missing embeddings field".to_string(),
        })?;
        let vectors = parse_vector_array("ollama", embeddings)?;
        validate_batch("ollama", texts.len(), self.dims, vectors)
    }
}

// ============ OpenAI embedder ============

/// Embedding backend using the OpenAI API.
///
/// Calls `POST /v1/embeddings`. Requires the `OPENAI_API_KEY` environment
/// variable to be set.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = require_model(config)?;
        let dims = require_dims(config)?;
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            QuarryError::InvalidParameter(
                "OPENAI_API_KEY environment variable not set".to_string(),
            )
        })?;
        Ok(Self {
            client: http_client(config.timeout_secs, "openai")?,
            api_key,
            model,
            dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let json = post_with_retry(
            &self.client,
            "openai",
            "https://api.openai.com/v1/embeddings",
            Some(&self.api_key),
            &body,
            self.max_retries,
        )
        .await?;

        let data = json
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| QuarryError::EmbeddingFailure {
                provider: "openai".to_string(),
                message: "response missing data array".to_string(),
            })?;

        let mut vectors = Vec::with_capacity(data.len());
        for item in data {
            let embedding =
                item.get("embedding").ok_or_else(|| QuarryError::EmbeddingFailure {
                    provider: "openai".to_string(),
                    message: "response entry missing embedding".to_string(),
                })?;
            vectors.extend(parse_vector_array("openai", &serde_json::json!([embedding]))?);
        }
        validate_batch("openai", texts.len(), self.dims, vectors)
    }
}

// ============ Test support ============

/// Deterministic offline embedder for tests: hashes each text into a small
/// vector so distinct texts land in distinct, stable positions.
#[cfg(test)]
pub(crate) struct StubEmbedder {
    pub dims: usize,
    pub model: String,
}

#[cfg(test)]
impl StubEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims, model: "stub-embedder".to_string() }
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(text.as_bytes());
        (0..self.dims)
            .map(|i| digest[i % digest.len()] as f32 / 255.0)
            .collect()
    }
}

#[cfg(test)]
#[async_trait]
impl Embedder for StubEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: provider.to_string(),
            model: Some("test-model".to_string()),
            dims: Some(8),
            ..EmbeddingConfig::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_embedder_errors() {
        let embedder = create_embedder(&EmbeddingConfig::default()).unwrap();
        assert_eq!(embedder.model_name(), "disabled");
        let err = embedder.embed_batch(&["hi".to_string()]).await.unwrap_err();
        assert!(matches!(err, QuarryError::EmbeddingFailure { .. }));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = create_embedder(&config("faiss")).err().unwrap();
        assert!(matches!(err, QuarryError::InvalidParameter(_)));
    }

    #[test]
    fn test_ollama_requires_model_and_dims() {
        let mut cfg = config("ollama");
        cfg.model = None;
        assert!(create_embedder(&cfg).is_err());

        let mut cfg = config("ollama");
        cfg.dims = Some(0);
        assert!(create_embedder(&cfg).is_err());
    }

    #[test]
    fn test_validate_batch_rejects_cardinality_mismatch() {
        let err = validate_batch("test", 2, 3, vec![vec![0.0; 3]]).unwrap_err();
        assert!(matches!(err, QuarryError::EmbeddingFailure { .. }));
    }

    #[test]
    fn test_validate_batch_rejects_dims_mismatch() {
        let err = validate_batch("test", 1, 3, vec![vec![0.0; 4]]).unwrap_err();
        assert!(matches!(err, QuarryError::EmbeddingFailure { .. }));
    }

    #[tokio::test]
    async fn test_stub_embedder_is_deterministic() {
        let stub = StubEmbedder::new(8);
        let a = stub.embed_batch(&["alpha".to_string()]).await.unwrap();
        let b = stub.embed_batch(&["alpha".to_string()]).await.unwrap();
        assert_eq!(a, b);
        let c = stub.embed_query("beta").await.unwrap();
        assert_ne!(a[0], c);
    }
}
