//! Embedding service: the abstract `embed(text) → vector` contract plus
//! HTTP-backed providers and a deterministic offline fallback.
//!
//! Providers:
//! - **OpenAI** — cloud embeddings via the text-embedding API
//! - **Ollama** — local embeddings via Ollama's `/api/embed`
//! - **Hashing** — deterministic token-hash vectors, no network; used when
//!   no service is configured and by tests

use async_trait::async_trait;
use repograph_core::config::EmbeddingConfig;
use repograph_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Opaque embedding service consumed by the router and evolution.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;
}

/// L2-normalize a vector in place.
pub fn normalize_l2(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (ai, bi) in a.iter().zip(b.iter()) {
        let ai = f64::from(*ai);
        let bi = f64::from(*bi);
        dot += ai * bi;
        norm_a += ai * ai;
        norm_b += bi * bi;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    dot / denom
}

// ---------------------------------------------------------------------------
// HTTP providers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum HttpProvider {
    OpenAi { api_key: String, model: String },
    Ollama { base_url: String, model: String },
}

/// Embedding generator backed by an HTTP embedding API.
pub struct HttpEmbedder {
    provider: HttpProvider,
    http: reqwest::Client,
    dimension: usize,
    timeout: std::time::Duration,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl HttpEmbedder {
    /// Build an embedder from config. Unknown providers fail with an
    /// actionable message; `"hashing"` is handled by [`HashingEmbedder`].
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let provider = match config.provider.as_str() {
            "openai" => {
                let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
                    Error::InvalidInput(
                        "embedding.provider=openai but OPENAI_API_KEY not set".to_string(),
                    )
                })?;
                HttpProvider::OpenAi {
                    api_key,
                    model: config.model.clone(),
                }
            }
            "ollama" => {
                let base_url = std::env::var("REPOGRAPH_OLLAMA_URL")
                    .unwrap_or_else(|_| "http://localhost:11434".to_string());
                HttpProvider::Ollama {
                    base_url,
                    model: config.model.clone(),
                }
            }
            other => {
                return Err(Error::SchemaMismatch(format!(
                    "unknown embedding provider: {other}"
                )));
            }
        };
        Ok(Self {
            provider,
            http: reqwest::Client::new(),
            dimension: config.dimension,
            timeout: std::time::Duration::from_secs(60),
        })
    }

    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let fut = async {
            match &self.provider {
                HttpProvider::OpenAi { api_key, model } => {
                    let req = EmbedRequest {
                        model: model.clone(),
                        input: texts.to_vec(),
                    };
                    let resp = self
                        .http
                        .post("https://api.openai.com/v1/embeddings")
                        .header("Authorization", format!("Bearer {api_key}"))
                        .json(&req)
                        .send()
                        .await
                        .map_err(|e| Error::External(format!("openai embeddings: {e}")))?;
                    if !resp.status().is_success() {
                        let status = resp.status();
                        let body = resp.text().await.unwrap_or_default();
                        return Err(Error::External(format!(
                            "openai embeddings returned {status}: {body}"
                        )));
                    }
                    let body: OpenAiEmbedResponse = resp
                        .json()
                        .await
                        .map_err(|e| Error::External(format!("openai embeddings body: {e}")))?;
                    Ok(body.data.into_iter().map(|d| d.embedding).collect())
                }
                HttpProvider::Ollama { base_url, model } => {
                    let req = EmbedRequest {
                        model: model.clone(),
                        input: texts.to_vec(),
                    };
                    let url = format!("{base_url}/api/embed");
                    let resp = self
                        .http
                        .post(&url)
                        .json(&req)
                        .send()
                        .await
                        .map_err(|e| {
                            Error::External(format!(
                                "ollama embeddings at {url}: {e}. Is Ollama running?"
                            ))
                        })?;
                    if !resp.status().is_success() {
                        let status = resp.status();
                        let body = resp.text().await.unwrap_or_default();
                        return Err(Error::External(format!(
                            "ollama embed returned {status}: {body}"
                        )));
                    }
                    let body: OllamaEmbedResponse = resp
                        .json()
                        .await
                        .map_err(|e| Error::External(format!("ollama embeddings body: {e}")))?;
                    Ok(body.embeddings)
                }
            }
        };

        let mut embeddings: Vec<Vec<f32>> = tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| Error::Timeout("embedding request".to_string()))??;

        if embeddings.len() != texts.len() {
            return Err(Error::External(format!(
                "embedding count mismatch: expected {}, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        for emb in &mut embeddings {
            normalize_l2(emb);
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let batch = self.request_batch(&[text.to_string()]).await?;
        batch
            .into_iter()
            .next()
            .ok_or_else(|| Error::External("empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request_batch(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ---------------------------------------------------------------------------
// Hashing fallback
// ---------------------------------------------------------------------------

/// Deterministic bag-of-tokens embedder: each token hashes to one component
/// with a hash-derived sign, then the vector is L2-normalized. Texts sharing
/// vocabulary land near each other; disjoint texts score near zero.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};

        let mut vector = vec![0.0_f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let index = (h % self.dimension as u64) as usize;
            let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }
        normalize_l2(&mut vector);
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_l2() {
        let mut v = vec![3.0, 4.0];
        normalize_l2(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_l2_zero() {
        let mut v = vec![0.0, 0.0];
        normalize_l2(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![0.6, 0.8];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_hashing_embedder_deterministic() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed("retrieve user session").await.unwrap();
        let b = embedder.embed("retrieve user session").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_hashing_embedder_separates_disjoint_texts() {
        let embedder = HashingEmbedder::new(256);
        let a = embedder.embed("add two numbers").await.unwrap();
        let b = embedder.embed("insert item into database").await.unwrap();
        let sim = cosine_similarity(&a, &b);
        assert!(sim < 0.5, "disjoint texts scored {sim}");

        let c = embedder.embed("add two numbers together").await.unwrap();
        assert!(cosine_similarity(&a, &c) > sim);
    }

    #[tokio::test]
    async fn test_hashing_embedder_is_case_insensitive() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed("Validate Input").await.unwrap();
        let b = embedder.embed("validate input").await.unwrap();
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_batch_mirrors_input_order() {
        let embedder = HashingEmbedder::new(64);
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let batch = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed("alpha").await.unwrap());
        assert_eq!(batch[1], embedder.embed("beta").await.unwrap());
    }

    #[test]
    fn test_unknown_provider_is_schema_mismatch() {
        let config = EmbeddingConfig {
            provider: "quantum".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            HttpEmbedder::from_config(&config),
            Err(Error::SchemaMismatch(_))
        ));
    }
}
