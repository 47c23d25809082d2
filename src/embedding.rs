//! Embedding service implementations.
//!
//! The [`Embedder`] trait lives in the core crate; this module provides the
//! concrete backends:
//! - **[`HashEmbedder`]** — deterministic feature hashing, no network. Used
//!   for offline runs and tests.
//! - **[`OpenAiEmbedder`]** — calls an OpenAI-compatible `/embeddings`
//!   endpoint with retry and backoff.
//! - **[`DisabledEmbedder`]** — always fails; semantic matches are then
//!   empty rather than the whole query failing.
//!
//! # Provider Selection
//!
//! ```rust
//! # use unified_search::config::EmbeddingConfig;
//! # use unified_search::embedding::create_embedder;
//! let config = EmbeddingConfig::default(); // provider = "hash"
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.dims(), 256);
//! ```
//!
//! # Retry Strategy
//!
//! The OpenAI embedder uses exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub use unified_search_core::embedding::{cosine_similarity, l2_normalize, Embedder};

use crate::config::EmbeddingConfig;

const DEFAULT_HASH_DIMS: usize = 256;
const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";

// ============ Hash Embedder ============

/// Feature-hashing embedder over word tokens and their character trigrams.
///
/// Texts sharing words or word fragments get positive cosine similarity;
/// the output is L2-normalized and fully deterministic.
pub struct HashEmbedder {
    model: String,
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self::with_model("hash-v1", dims)
    }

    pub fn with_model(model: impl Into<String>, dims: usize) -> Self {
        Self {
            model: model.into(),
            dims: dims.max(1),
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(bucket) % self.dims as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign;
    }
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dims];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            self.add_feature(&mut vector, &format!("w:{}", token));
            let chars: Vec<char> = token.chars().collect();
            for gram in chars.windows(3) {
                let gram: String = gram.iter().collect();
                self.add_feature(&mut vector, &format!("g:{}", gram));
            }
        }
        l2_normalize(&mut vector);
        Ok(vector)
    }
}

// ============ Disabled Embedder ============

/// An embedder that always returns errors.
///
/// Used when `embedding.provider = "disabled"` in the configuration.
pub struct DisabledEmbedder;

impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ OpenAI Embedder ============

/// Embedder backed by the OpenAI embeddings API (or a compatible server).
///
/// The API key is read from the environment variable named by
/// `embedding.api_key_env` (default `OPENAI_API_KEY`).
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    endpoint: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::blocking::Client,
}

impl OpenAiEmbedder {
    /// # Errors
    ///
    /// Returns an error if `model` is not set in config, if the API key
    /// variable is not in the environment, or if the HTTP client cannot
    /// be built.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config.dims.unwrap_or(1536);

        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", config.api_key_env))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_ENDPOINT.to_string()),
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.endpoint.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, ?delay, "retrying embedding request");
                std::thread::sleep(delay);
            }

            let resp = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send();

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json()?;
                        return parse_openai_response(&json);
                    }

                    // Rate limited or server error, retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().unwrap_or_default();
                        last_err = Some(anyhow::anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
    }
}

/// Extract the first `data[].embedding` array.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|data| data.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;

    Ok(embedding
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

/// Create an embedder from configuration.
///
/// | Provider     | Implementation       |
/// |--------------|----------------------|
/// | `"hash"`     | [`HashEmbedder`]     |
/// | `"openai"`   | [`OpenAiEmbedder`]   |
/// | `"disabled"` | [`DisabledEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "hash" => {
            let dims = config.dims.unwrap_or(DEFAULT_HASH_DIMS);
            Ok(match &config.model {
                Some(model) => Arc::new(HashEmbedder::with_model(model.clone(), dims)),
                None => Arc::new(HashEmbedder::new(dims)),
            })
        }
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
