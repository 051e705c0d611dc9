use crate::config::{ApiKeys, Vendor};
use crate::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const DEFAULT: usize = 128;
const DEFAULT_BATCH_SIZE: usize = 100;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| SearchError::Embedding {
            provider: "embedder".to_string(),
            details: "no vector returned for query".to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbeddingChoice {
    OpenAi,
    Google,
}

impl EmbeddingChoice {
    pub fn vendor(self) -> Vendor {
        match self {
            EmbeddingChoice::OpenAi => Vendor::OpenAi,
            EmbeddingChoice::Google => Vendor::Google,
        }
    }

    pub fn model(self) -> &'static str {
        match self {
            EmbeddingChoice::OpenAi => "text-embedding-3-large",
            EmbeddingChoice::Google => "text-embedding-004",
        }
    }

    pub fn dimensions(self) -> usize {
        match self {
            EmbeddingChoice::OpenAi => 3072,
            EmbeddingChoice::Google => 768,
        }
    }

    /// Inputs per `/embeddings` request. Google's endpoint caps a batch at 100 inputs;
    /// OpenAI's token cap is the tighter limit for 5000-character windows.
    pub fn batch_size(self) -> usize {
        match self {
            EmbeddingChoice::OpenAi => 64,
            EmbeddingChoice::Google => 100,
        }
    }

    pub fn embedder(self, keys: &ApiKeys) -> Result<HttpEmbedder, crate::ConfigError> {
        let vendor = self.vendor();
        let api_key = keys.require(vendor)?;
        Ok(HttpEmbedder::new(
            vendor.name(),
            vendor.base_url(),
            api_key,
            self.model(),
            self.dimensions(),
        )
        .with_batch_size(self.batch_size()))
    }
}

impl fmt::Display for EmbeddingChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.vendor().name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown embedding provider {0:?}, expected \"openai\" or \"google\"")]
pub struct UnknownEmbeddingChoice(String);

impl FromStr for EmbeddingChoice {
    type Err = UnknownEmbeddingChoice;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(EmbeddingChoice::OpenAi),
            "google" | "gemini" => Ok(EmbeddingChoice::Google),
            other => Err(UnknownEmbeddingChoice(other.to_string())),
        }
    }
}

/// Client for any `/embeddings` endpoint that speaks the OpenAI wire format.
#[derive(Clone)]
pub struct HttpEmbedder {
    client: Client,
    provider: &'static str,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

impl fmt::Debug for HttpEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpEmbedder")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl HttpEmbedder {
    pub fn new(
        provider: &'static str,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            client: Client::new(),
            provider,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            dimensions,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn failure(&self, details: impl Into<String>) -> SearchError {
        SearchError::Embedding {
            provider: self.provider.to_string(),
            details: details.into(),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embeds `texts` in provider-sized batches; vectors come back in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}

impl HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::error!(provider = self.provider, %status, "embedding request failed: {body}");
            return Err(self.failure(format!("status {status}")));
        }

        let mut parsed: EmbeddingResponse = serde_json::from_str(&body)?;
        parsed.data.sort_by_key(|item| item.index);

        if parsed.data.len() != texts.len() {
            return Err(self.failure(format!(
                "expected {} vectors, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

/// Offline embedder hashing lowercase character trigrams into a fixed number of buckets.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}
