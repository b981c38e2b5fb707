// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding backends.
//!
//! Three tiers, probed at construction in descending order of quality:
//!
//! 1. **Neural**: local multilingual sentence-embedding model via fastembed
//!    (behind the `neural` cargo feature).
//! 2. **Hosted**: remote embedding endpoint over HTTPS with bearer auth and
//!    a timeout; a failed call degrades to the hash tier for that call only.
//! 3. **Hash**: deterministic blake3-derived vectors; same text, same
//!    vector; different texts near-orthogonal with high probability. Always
//!    available, so the pipeline never halts for lack of a model.
//!
//! `embed` and `embed_batch` are total: they log failures and fall back, but
//! never fail outward. All returned vectors are L2-normalized, so the index
//! side can use plain inner product.

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{EmbeddingBackendKind, RagConfig};
use crate::embedding::cache::EmbeddingCache;
use crate::errors::{RagError, Result};

/// Scale a slice to unit L2 norm in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

/// Deterministic hash embedding backend.
///
/// Streams the blake3 XOF of the input into `dimension` floats in [-1, 1]
/// and normalizes. No model, no I/O.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut reader = blake3::Hasher::new().update(text.as_bytes()).finalize_xof();
        let mut bytes = vec![0u8; self.dimension * 4];
        reader.fill(&mut bytes);

        let mut vector: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| {
                let raw = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                // Map the 32-bit word onto [-1, 1].
                (raw as f64 / u32::MAX as f64 * 2.0 - 1.0) as f32
            })
            .collect();
        l2_normalize(&mut vector);
        vector
    }
}

/// Remote embedding endpoint backend.
pub struct HostedEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    dimension: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl HostedEmbedder {
    pub fn new(
        endpoint: String,
        model: String,
        api_key: String,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            model,
            api_key,
            dimension,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// One embeddings request for the whole batch. Fails on non-2xx status,
    /// network error, timeout, a malformed body, or vectors of a width other
    /// than the advertised dimension; the caller degrades.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({ "input": texts, "model": self.model }))
            .send()
            .await?
            .error_for_status()?;

        let parsed: EmbeddingResponse = response.json().await?;
        if parsed.data.len() != texts.len() {
            return Err(RagError::backend_unavailable(format!(
                "embedding endpoint returned {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }
        if let Some(datum) = parsed.data.iter().find(|d| d.embedding.len() != self.dimension) {
            return Err(RagError::backend_unavailable(format!(
                "embedding endpoint returned {}-dimensional vectors, expected {}",
                datum.embedding.len(),
                self.dimension
            )));
        }

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Local sentence-embedding model backend.
#[cfg(feature = "neural")]
pub struct NeuralEmbedder {
    embedder: fastembed::TextEmbedding,
    model_id: String,
}

#[cfg(feature = "neural")]
impl NeuralEmbedder {
    /// Multilingual MiniLM output width.
    pub const DIMENSION: usize = 384;

    pub fn load() -> Result<Self> {
        use anyhow::Context;
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        let model = EmbeddingModel::ParaphraseMLMiniLML12V2;
        let model_id = model.to_string();
        let embedder = TextEmbedding::try_new(InitOptions::new(model))
            .context("failed to initialize local embedding model")?;
        Ok(Self { embedder, model_id })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn embed_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        use anyhow::Context;
        let embeddings = self
            .embedder
            .embed(texts, None)
            .context("local embedding inference failed")?;
        Ok(embeddings)
    }
}

/// The selected backend variant.
enum Backend {
    #[cfg(feature = "neural")]
    Neural(NeuralEmbedder),
    Hosted(HostedEmbedder),
    Hash(HashEmbedder),
}

/// Embedding provider: one backend plus the hash safety net and the cache.
///
/// Dimension is constant for the provider's lifetime; a persisted index built
/// with a different dimension is detected by its stored dimension tag.
pub struct EmbeddingProvider {
    backend: Backend,
    /// Per-call fallback at the backend's own dimension.
    hash: HashEmbedder,
    cache: EmbeddingCache,
    backend_id: String,
}

impl EmbeddingProvider {
    /// Select the best available backend for the configuration: try the
    /// requested tier first, then descend.
    pub fn probe(config: &RagConfig) -> Self {
        let requested = config.embedding_model();

        if requested == EmbeddingBackendKind::Neural {
            match Self::try_neural() {
                Ok(Some(provider)) => return Self::assemble(provider, config),
                Ok(None) => info!("neural embedding backend not compiled in"),
                Err(e) => warn!("neural embedding backend unavailable: {e}"),
            }
        }

        if requested != EmbeddingBackendKind::Hash {
            if let Some(api_key) = config.api_key() {
                match HostedEmbedder::new(
                    config.embedding_endpoint(),
                    config.hosted_embedding_model(),
                    api_key,
                    hosted_dimension(&config.hosted_embedding_model()),
                    config.request_timeout(),
                ) {
                    Ok(hosted) => {
                        info!("using hosted embedding backend");
                        return Self::assemble(Backend::Hosted(hosted), config);
                    }
                    Err(e) => warn!("hosted embedding backend unavailable: {e}"),
                }
            } else {
                info!("no API key configured; skipping hosted embeddings");
            }
        }

        info!("using deterministic hash embeddings");
        Self::assemble(
            Backend::Hash(HashEmbedder::new(config.embedding_dimension())),
            config,
        )
    }

    #[cfg(feature = "neural")]
    fn try_neural() -> Result<Option<Backend>> {
        let neural = NeuralEmbedder::load()?;
        info!("using local embedding model {}", neural.model_id());
        Ok(Some(Backend::Neural(neural)))
    }

    #[cfg(not(feature = "neural"))]
    fn try_neural() -> Result<Option<Backend>> {
        Ok(None)
    }

    fn assemble(backend: Backend, config: &RagConfig) -> Self {
        let dimension = match &backend {
            #[cfg(feature = "neural")]
            Backend::Neural(_) => NeuralEmbedder::DIMENSION,
            Backend::Hosted(hosted) => hosted.dimension(),
            Backend::Hash(hash) => hash.dimension(),
        };
        let backend_id = match &backend {
            #[cfg(feature = "neural")]
            Backend::Neural(neural) => format!("neural:{}", neural.model_id()),
            Backend::Hosted(_) => format!("hosted:{dimension}"),
            Backend::Hash(_) => format!("hash:{dimension}"),
        };

        Self {
            backend,
            hash: HashEmbedder::new(dimension),
            cache: EmbeddingCache::new(config.cache_capacity(), config.cache_ttl()),
            backend_id,
        }
    }

    /// Stable identifier of the active backend, recorded with cached vectors.
    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }

    pub fn dimension(&self) -> usize {
        self.hash.dimension()
    }

    /// Whether the active backend is the hash fallback.
    pub fn is_hash_fallback(&self) -> bool {
        matches!(self.backend, Backend::Hash(_))
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Embed one text. Total: every backend failure degrades to the hash
    /// vector of the same dimension.
    pub async fn embed(&mut self, text: &str) -> Vec<f32> {
        let texts = [text.to_string()];
        self.embed_batch(&texts)
            .await
            .pop()
            .unwrap_or_else(|| self.hash.embed(text))
    }

    /// Embed a batch of texts, consulting the cache first and issuing at
    /// most one backend call for the misses.
    pub async fn embed_batch(&mut self, texts: &[String]) -> Vec<Vec<f32>> {
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut misses: Vec<usize> = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            match self.cache.get(text, &self.backend_id) {
                Some(vector) => results.push(Some(vector)),
                None => {
                    results.push(None);
                    misses.push(i);
                }
            }
        }

        if !misses.is_empty() {
            let miss_texts: Vec<String> = misses.iter().map(|&i| texts[i].clone()).collect();
            let vectors = self.embed_uncached(&miss_texts).await;
            for (&i, mut vector) in misses.iter().zip(vectors) {
                l2_normalize(&mut vector);
                self.cache.put(&texts[i], &self.backend_id, vector.clone());
                results[i] = Some(vector);
            }
        }

        results.into_iter().flatten().collect()
    }

    async fn embed_uncached(&mut self, texts: &[String]) -> Vec<Vec<f32>> {
        match &mut self.backend {
            #[cfg(feature = "neural")]
            Backend::Neural(neural) => match neural.embed_batch(texts) {
                Ok(vectors) => vectors,
                Err(e) => {
                    warn!("neural embedding failed, using hash vectors: {e}");
                    texts.iter().map(|t| self.hash.embed(t)).collect()
                }
            },
            Backend::Hosted(hosted) => match hosted.embed_batch(texts).await {
                Ok(vectors) => vectors,
                Err(e) => {
                    warn!("hosted embedding failed, using hash vectors: {e}");
                    texts.iter().map(|t| self.hash.embed(t)).collect()
                }
            },
            Backend::Hash(hash) => texts.iter().map(|t| hash.embed(t)).collect(),
        }
    }
}

/// Known hosted embedding model widths; anything unrecognized gets the
/// ada-002 width.
fn hosted_dimension(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        _ => 1536,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RagConfig;

    fn hash_config(dimension: usize) -> RagConfig {
        serde_json::from_str(&format!(
            r#"{{"embedding_model": "hash", "embedding_dimension": {dimension}}}"#
        ))
        .unwrap()
    }

    /// One-shot HTTP server on an ephemeral port for hosted-backend tests.
    fn serve_once(status_line: &str, body: &str) -> String {
        use std::io::{Read, Write};
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\n\
             content-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 8192];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}")
    }

    #[test]
    fn hash_embedding_is_deterministic_and_normalized() {
        let hash = HashEmbedder::new(384);
        let a = hash.embed("本益比是什麼");
        let b = hash.embed("本益比是什麼");
        assert_eq!(a, b);
        assert_eq!(a.len(), 384);

        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn different_texts_are_near_orthogonal() {
        let hash = HashEmbedder::new(384);
        let a = hash.embed("股票投資基礎");
        let b = hash.embed("移動平均線");
        let dot: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        assert!(dot.abs() < 0.3, "dot product {dot} too large");
    }

    #[test]
    fn l2_normalize_handles_zero_vector() {
        let mut zero = vec![0.0f32; 8];
        l2_normalize(&mut zero);
        assert!(zero.iter().all(|&v| v == 0.0));
    }

    #[tokio::test]
    async fn provider_embed_is_total_and_cached() {
        let mut provider = EmbeddingProvider::probe(&hash_config(64));
        assert!(provider.is_hash_fallback());
        assert_eq!(provider.dimension(), 64);

        let first = provider.embed("台積電").await;
        let second = provider.embed("台積電").await;
        assert_eq!(first, second);
        assert_eq!(provider.cache_len(), 1);
    }

    #[tokio::test]
    async fn batch_matches_individual() {
        let mut provider = EmbeddingProvider::probe(&hash_config(32));
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let batch = provider.embed_batch(&texts).await;

        let mut fresh = EmbeddingProvider::probe(&hash_config(32));
        for (i, text) in texts.iter().enumerate() {
            assert_eq!(batch[i], fresh.embed(text).await);
        }
    }

    #[tokio::test]
    async fn hosted_wrong_width_response_degrades_to_hash() {
        // The endpoint answers 200 but with three-dimensional vectors; the
        // provider must reject them and hand back hash vectors at the
        // advertised hosted width.
        let endpoint = serve_once("200 OK", r#"{"data":[{"embedding":[0.1,0.2,0.3]}]}"#);
        let config: RagConfig = serde_json::from_str(&format!(
            r#"{{
                "embedding_model": "hosted",
                "api_key": "test-key",
                "embedding_endpoint": "{endpoint}",
                "request_timeout_secs": 2
            }}"#
        ))
        .unwrap();

        let mut provider = EmbeddingProvider::probe(&config);
        assert!(!provider.is_hash_fallback());
        let vector = provider.embed("width check").await;
        assert_eq!(vector.len(), 1536);
    }

    #[tokio::test]
    async fn hosted_failure_degrades_to_hash() {
        // Port 1 is never listening; the call fails fast and the provider
        // must still return a vector of the hosted dimension.
        let config: RagConfig = serde_json::from_str(
            r#"{
                "embedding_model": "hosted",
                "api_key": "test-key",
                "embedding_endpoint": "http://127.0.0.1:1/v1/embeddings",
                "request_timeout_secs": 1
            }"#,
        )
        .unwrap();

        let mut provider = EmbeddingProvider::probe(&config);
        assert!(!provider.is_hash_fallback());
        let vector = provider.embed("fallback please").await;
        assert_eq!(vector.len(), 1536);

        let expected = provider.hash.embed("fallback please");
        let dot: f32 = vector.iter().zip(&expected).map(|(x, y)| x * y).sum();
        assert!((dot - 1.0).abs() < 1e-5);
    }
}
