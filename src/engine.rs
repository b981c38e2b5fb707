// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine facade.
//!
//! `RagEngine` owns the document store, the embedding provider, the vector
//! index, and the generation backend. It is an explicitly constructed value
//! with no process-global instance; callers own its lifetime and provide
//! external locking for cross-thread use.
//!
//! `query` never fails: any internal fault is folded into a result with
//! `method = error` carrying the message. The suspending methods are the
//! primary contract; `query_blocking` exists only for hosts without an async
//! runtime at the call site.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::config::RagConfig;
use crate::embedding::EmbeddingProvider;
use crate::errors::Result;
use crate::generator::{GenerationBackend, Method, SourceRef};
use crate::index::VectorIndex;
use crate::retriever::Retriever;
use crate::store::{DocumentInput, DocumentStore};

const KNOWLEDGE_FILE: &str = "knowledge_base.json";

/// The answer to one query. Always constructible, even over an empty
/// knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    /// Up to three citations, best first.
    pub sources: Vec<SourceRef>,
    pub confidence: f32,
    pub method: Method,
    /// RFC 3339 time the result was produced.
    pub timestamp: String,
}

/// Read-only introspection snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total_documents: usize,
    pub index_size: usize,
    pub embedding_backend: String,
    pub vector_backend: String,
    pub generation_backend: String,
    pub embedding_cache_size: usize,
}

/// Retrieval-augmented question answering engine.
pub struct RagEngine {
    store: DocumentStore,
    provider: EmbeddingProvider,
    index: VectorIndex,
    retriever: Retriever,
    generator: GenerationBackend,
    data_dir: PathBuf,
}

impl RagEngine {
    /// Open an engine over `data_dir`: load the document journal, probe the
    /// backends, and load the persisted index or rebuild it from the store.
    pub async fn open(config: RagConfig, data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let store = DocumentStore::open(data_dir.join(KNOWLEDGE_FILE))?;
        let provider = EmbeddingProvider::probe(&config);
        let index = VectorIndex::new(config.vector_backend(), provider.dimension(), &data_dir);
        let retriever = Retriever::from_config(&config);
        let generator = GenerationBackend::probe(&config);

        let mut engine = Self {
            store,
            provider,
            index,
            retriever,
            generator,
            data_dir,
        };

        // A loaded index that disagrees with the store in size is stale.
        if !engine.index.load() || engine.index.len() != engine.store.len() {
            engine.rebuild_index().await?;
        }
        Ok(engine)
    }

    /// Re-embed every stored document and persist the fresh index.
    async fn rebuild_index(&mut self) -> Result<()> {
        self.index.clear();
        if self.store.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = self
            .store
            .iter()
            .map(|doc| format!("{} {}", doc.title, doc.content))
            .collect();
        let ids: Vec<String> = self.store.iter().map(|doc| doc.id.clone()).collect();

        let vectors = self.provider.embed_batch(&texts).await;
        for (id, vector) in ids.iter().zip(vectors) {
            self.index.add(id, vector)?;
        }
        if self.index.is_persistent() {
            self.index.save()?;
        }
        info!("rebuilt vector index with {} entries", self.index.len());
        Ok(())
    }

    /// Answer a query.
    pub async fn query(&mut self, text: &str) -> QueryResult {
        self.query_with_context(text, None).await
    }

    /// Answer a query with optional conversation context. The context is
    /// accepted for interface stability but does not yet influence
    /// retrieval or generation.
    pub async fn query_with_context(&mut self, text: &str, context: Option<&str>) -> QueryResult {
        let _ = context;
        match self.try_query(text).await {
            Ok(result) => result,
            Err(e) => {
                error!("query failed: {e}");
                QueryResult {
                    answer: format!("抱歉，查詢時發生錯誤：{e}"),
                    sources: Vec::new(),
                    confidence: 0.0,
                    method: Method::Error,
                    timestamp: chrono::Utc::now().to_rfc3339(),
                }
            }
        }
    }

    async fn try_query(&mut self, text: &str) -> Result<QueryResult> {
        let docs = self
            .retriever
            .retrieve(text, &mut self.provider, &self.index, &self.store)
            .await;
        let generated = self.generator.generate(text, &docs).await;

        Ok(QueryResult {
            answer: generated.answer,
            sources: generated.sources,
            confidence: generated.confidence.clamp(0.0, 1.0),
            method: generated.method,
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Blocking wrapper for hosts without an async runtime at the call
    /// site. Must not be called from within a tokio runtime.
    pub fn query_blocking(&mut self, text: &str) -> QueryResult {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("failed to start blocking runtime: {e}");
                return QueryResult {
                    answer: format!("抱歉，查詢時發生錯誤：{e}"),
                    sources: Vec::new(),
                    confidence: 0.0,
                    method: Method::Error,
                    timestamp: chrono::Utc::now().to_rfc3339(),
                };
            }
        };
        runtime.block_on(self.query(text))
    }

    /// Add documents to the knowledge base and index them. Embeddings are
    /// awaited before the store or index is touched, so cancellation at the
    /// await never leaves a half-inserted document.
    pub async fn add_knowledge(&mut self, inputs: Vec<DocumentInput>) -> Result<Vec<String>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = inputs
            .iter()
            .map(|input| format!("{} {}", input.title, input.content))
            .collect();
        let vectors = self.provider.embed_batch(&texts).await;

        let ids = self.store.add(inputs)?;
        for (id, vector) in ids.iter().zip(vectors) {
            self.index.add(id, vector)?;
        }
        if self.index.is_persistent() {
            self.index.save()?;
        }

        info!("added {} documents to the knowledge base", ids.len());
        Ok(ids)
    }

    /// Populate an empty knowledge base with the built-in financial corpus.
    /// A no-op when any documents already exist.
    pub async fn seed_default_knowledge(&mut self) -> Result<Vec<String>> {
        if !self.store.is_empty() {
            return Ok(Vec::new());
        }
        self.add_knowledge(crate::seed::default_knowledge()).await
    }

    pub fn statistics(&self) -> Statistics {
        Statistics {
            total_documents: self.store.len(),
            index_size: self.index.len(),
            embedding_backend: self.provider.backend_id().to_string(),
            vector_backend: if self.index.is_persistent() {
                "flat".to_string()
            } else {
                "scan".to_string()
            },
            generation_backend: if self.generator.is_hosted() {
                "hosted".to_string()
            } else {
                "template".to_string()
            },
            embedding_cache_size: self.provider.cache_len(),
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
