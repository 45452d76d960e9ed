use super::config::{Config, EmbedderKind};
use super::ollama_client::OllamaClient;
use futures::stream::{self, StreamExt, TryStreamExt};
use shared::types::Result;

const BATCH_SIZE: usize = 32;
const MAX_IN_FLIGHT: usize = 8;

/// Turns text into vectors. The same backend and model must be used for
/// building an index and for querying it.
pub enum Embedder {
    Ollama(OllamaClient),
    Hashing(HashingEmbedder),
}

impl Embedder {
    pub fn from_config(config: &Config) -> Self {
        match config.embedder {
            EmbedderKind::Ollama => Embedder::Ollama(OllamaClient::new(
                config.ollama_base_url.clone(),
                config.embedding_model.clone(),
            )),
            EmbedderKind::Hashing => Embedder::Hashing(HashingEmbedder::new(config.hashing_dimensions)),
        }
    }

    /// Identifier persisted with an index and checked when it is reopened.
    pub fn model_name(&self) -> String {
        match self {
            Embedder::Ollama(client) => format!("ollama/{}", client.model()),
            Embedder::Hashing(hashing) => format!("hashing-v1/{}", hashing.dimensions()),
        }
    }

    /// Known up front for local backends; remote ones report it with their
    /// first vector.
    pub fn dimensions(&self) -> Option<usize> {
        match self {
            Embedder::Ollama(_) => None,
            Embedder::Hashing(hashing) => Some(hashing.dimensions()),
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match self {
            Embedder::Ollama(client) => client.generate_embedding(text).await,
            Embedder::Hashing(hashing) => Ok(hashing.embed(text)),
        }
    }

    /// Embed many texts; the output is in input order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for (batch_no, batch) in texts.chunks(BATCH_SIZE).enumerate() {
            tracing::debug!(batch = batch_no, size = batch.len(), "generating embeddings");
            let vectors: Vec<Vec<f32>> = stream::iter(batch.iter().map(|text| self.embed(text)))
                .buffered(MAX_IN_FLIGHT)
                .try_collect()
                .await?;
            embeddings.extend(vectors);
        }
        Ok(embeddings)
    }
}

/// Deterministic bag-of-words embedder using signed feature hashing.
///
/// Lower quality than a trained model but needs no server, which makes it
/// the backend for tests and air-gapped use.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// L2-normalised term vector; all zeros for text without words.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = md5::compute(token.as_bytes());
            let bucket = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize
                % self.dimensions;
            let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}
