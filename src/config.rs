// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine configuration.
//!
//! Loaded once from a flat JSON object at engine construction; immutable for
//! the engine's lifetime (re-construct to change). Unknown keys are ignored,
//! missing keys take the documented defaults, and an absent or unparseable
//! file falls back to the built-in defaults with a warning.

use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Vector index backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackendKind {
    /// Flat inner-product index over normalized vectors; persisted to disk.
    #[default]
    Flat,
    /// Linear cosine scan; automatic fallback, never persisted.
    Scan,
}

/// Response generation backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationBackendKind {
    /// Hosted chat-completion endpoint when an API key is available,
    /// demoting to templates on any failure.
    #[default]
    Hosted,
    /// Deterministic template answers only.
    Template,
}

/// Embedding backend kind requested by configuration. The probe may still
/// descend to a lower tier if the requested one is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackendKind {
    /// Local sentence-embedding model, then hosted, then hash.
    #[default]
    Neural,
    /// Hosted embedding endpoint, then hash.
    Hosted,
    /// Deterministic hash vectors only.
    Hash,
}

/// Flat configuration map for the engine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Preferred embedding backend (neural, hosted, hash).
    pub embedding_model: Option<EmbeddingBackendKind>,
    /// Vector index backend (flat, scan).
    pub vector_backend: Option<VectorBackendKind>,
    /// Generation backend (hosted, template).
    pub generation_backend: Option<GenerationBackendKind>,
    /// Number of candidates retrieved per query.
    pub top_k_retrieve: Option<usize>,
    /// Semantic score floor; index hits at or below it are discarded.
    pub confidence_threshold: Option<f32>,
    /// Lexical score floor. Kept separate from `confidence_threshold`; the
    /// two tiers are tuned independently.
    pub lexical_floor: Option<f32>,
    /// Completion budget for hosted generation.
    pub max_tokens: Option<u32>,
    /// Sampling temperature for hosted generation.
    pub temperature: Option<f32>,
    /// Whether the lexical tier runs when the semantic tier yields nothing.
    pub fallback_to_simple: Option<bool>,
    /// Character budget for the generation context window.
    pub max_context_length: Option<usize>,
    /// Bearer token for hosted backends; falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    /// Hosted embedding endpoint.
    pub embedding_endpoint: Option<String>,
    /// Hosted chat-completion endpoint.
    pub generation_endpoint: Option<String>,
    /// Model name sent to the hosted generation endpoint.
    pub generation_model: Option<String>,
    /// Model name sent to the hosted embedding endpoint.
    pub hosted_embedding_model: Option<String>,
    /// Dimension of hash (and hosted-fallback) vectors.
    pub embedding_dimension: Option<usize>,
    /// Timeout applied to every hosted backend call, in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Maximum number of entries in the embedding cache.
    pub cache_capacity: Option<usize>,
    /// Embedding cache entry time-to-live, in seconds.
    pub cache_ttl_secs: Option<u64>,
}

impl RagConfig {
    /// Load configuration from a JSON file. An absent file yields the
    /// defaults; a malformed file is reported and also yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("failed to parse {}: {e}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn embedding_model(&self) -> EmbeddingBackendKind {
        self.embedding_model.unwrap_or_default()
    }

    pub fn vector_backend(&self) -> VectorBackendKind {
        self.vector_backend.unwrap_or_default()
    }

    pub fn generation_backend(&self) -> GenerationBackendKind {
        self.generation_backend.unwrap_or_default()
    }

    /// Retrieval depth (defaults to 3, minimum 1).
    pub fn top_k_retrieve(&self) -> usize {
        self.top_k_retrieve.unwrap_or(3).max(1)
    }

    /// Semantic score floor (defaults to 0.3, clamped to [0, 1]).
    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold.unwrap_or(0.3).clamp(0.0, 1.0)
    }

    /// Lexical score floor (defaults to 0.1, clamped to [0, 1]).
    pub fn lexical_floor(&self) -> f32 {
        self.lexical_floor.unwrap_or(0.1).clamp(0.0, 1.0)
    }

    /// Hosted completion budget (defaults to 500 tokens).
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(500)
    }

    /// Hosted sampling temperature (defaults to 0.7).
    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(0.7)
    }

    /// Whether lexical fallback is enabled (defaults to true).
    pub fn fallback_to_simple(&self) -> bool {
        self.fallback_to_simple.unwrap_or(true)
    }

    /// Context window character budget (defaults to 2000).
    pub fn max_context_length(&self) -> usize {
        self.max_context_length.unwrap_or(2000)
    }

    /// Bearer token for hosted backends, from config or `OPENAI_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()))
    }

    /// Hosted embedding endpoint (defaults to the OpenAI embeddings API).
    pub fn embedding_endpoint(&self) -> String {
        self.embedding_endpoint
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1/embeddings".to_string())
    }

    /// Hosted generation endpoint (defaults to the OpenAI chat API).
    pub fn generation_endpoint(&self) -> String {
        self.generation_endpoint
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string())
    }

    /// Hosted generation model (defaults to "gpt-3.5-turbo").
    pub fn generation_model(&self) -> String {
        self.generation_model
            .clone()
            .unwrap_or_else(|| "gpt-3.5-turbo".to_string())
    }

    /// Hosted embedding model (defaults to "text-embedding-ada-002").
    pub fn hosted_embedding_model(&self) -> String {
        self.hosted_embedding_model
            .clone()
            .unwrap_or_else(|| "text-embedding-ada-002".to_string())
    }

    /// Hash vector dimension (defaults to 384, the local model's width).
    pub fn embedding_dimension(&self) -> usize {
        match self.embedding_dimension {
            Some(dim) if dim > 0 => dim,
            _ => 384,
        }
    }

    /// Timeout for every hosted backend call (defaults to 10 seconds).
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(10).max(1))
    }

    /// Embedding cache capacity (defaults to 4096 entries).
    pub fn cache_capacity(&self) -> usize {
        match self.cache_capacity {
            Some(cap) if cap > 0 => cap,
            _ => 4096,
        }
    }

    /// Embedding cache TTL (defaults to 1 hour).
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs.unwrap_or(3600))
    }
}
