// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-tier retrieval.
//!
//! The semantic tier embeds the query and searches the vector index, keeping
//! hits above the configured confidence threshold. When the index is empty,
//! or the semantic tier qualifies nothing, the lexical tier scores every
//! document by weighted term overlap. Retrieval quality degrades smoothly as
//! backends disappear; the worst case is an empty list, never an error.

use tracing::debug;

use crate::config::RagConfig;
use crate::embedding::EmbeddingProvider;
use crate::index::VectorIndex;
use crate::store::{extract_keywords, Document, DocumentStore};

/// A retrieved document with its tier score in [0, 1].
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

/// Retrieval policy knobs, fixed at engine construction.
pub struct Retriever {
    top_k: usize,
    confidence_threshold: f32,
    lexical_floor: f32,
    fallback_to_simple: bool,
}

impl Retriever {
    pub fn from_config(config: &RagConfig) -> Self {
        Self {
            top_k: config.top_k_retrieve(),
            confidence_threshold: config.confidence_threshold(),
            lexical_floor: config.lexical_floor(),
            fallback_to_simple: config.fallback_to_simple(),
        }
    }

    /// Retrieve the top documents for a query. Semantic first, lexical when
    /// the semantic tier is unusable or qualifies nothing.
    pub async fn retrieve(
        &self,
        query: &str,
        provider: &mut EmbeddingProvider,
        index: &VectorIndex,
        store: &DocumentStore,
    ) -> Vec<ScoredDocument> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        if !index.is_empty() {
            let query_vector = provider.embed(query).await;
            let hits = index.search(&query_vector, self.top_k);
            let qualified: Vec<ScoredDocument> = hits
                .into_iter()
                .filter(|(_, score)| *score > self.confidence_threshold)
                .filter_map(|(doc_id, score)| {
                    store.get(&doc_id).map(|doc| ScoredDocument {
                        document: doc.clone(),
                        score,
                    })
                })
                .collect();

            if !qualified.is_empty() {
                debug!("semantic tier matched {} documents", qualified.len());
                return qualified;
            }
        }

        if !self.fallback_to_simple {
            return Vec::new();
        }

        let matches = self.retrieve_lexical(query, store);
        debug!("lexical tier matched {} documents", matches.len());
        matches
    }

    /// Lexical tier: weighted term overlap against every document, floor
    /// applied, descending score with ties in store order.
    pub fn retrieve_lexical(&self, query: &str, store: &DocumentStore) -> Vec<ScoredDocument> {
        let mut scored: Vec<ScoredDocument> = store
            .iter()
            .map(|doc| ScoredDocument {
                document: doc.clone(),
                score: lexical_score(query, doc),
            })
            .filter(|s| s.score > self.lexical_floor)
            .collect();

        // Stable sort keeps store order among equal scores.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(self.top_k);
        scored
    }
}

/// Weighted term-overlap score in [0, 1].
///
/// Query terms are derived the same way as stored keywords. Keyword hits are
/// counted in the document-to-query direction (a stored keyword appearing
/// inside the query), which also works for unsegmented CJK queries where the
/// query side is one long term. Weights: keyword 3, title 2, content 1,
/// normalized by six times the term count.
pub fn lexical_score(query: &str, doc: &Document) -> f32 {
    let terms = extract_keywords(query);
    if terms.is_empty() {
        return 0.0;
    }
    let query_lower = query.to_lowercase();
    let title_lower = doc.title.to_lowercase();
    let content_lower = doc.content.to_lowercase();

    let keyword_hits = doc
        .keywords
        .iter()
        .filter(|kw| query_lower.contains(&kw.to_lowercase()))
        .count();
    let title_hits = terms.iter().filter(|t| title_lower.contains(t.as_str())).count();
    let content_hits = terms
        .iter()
        .filter(|t| content_lower.contains(t.as_str()))
        .count();

    let raw = (3 * keyword_hits + 2 * title_hits + content_hits) as f32
        / (6 * terms.len()) as f32;
    raw.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VectorBackendKind;
    use tempfile::tempdir;

    fn store_with(docs: Vec<(&str, &str)>) -> (tempfile::TempDir, DocumentStore) {
        let dir = tempdir().unwrap();
        let mut store = DocumentStore::open(dir.path().join("kb.json")).unwrap();
        store
            .add(
                docs.into_iter()
                    .map(|(title, content)| crate::store::DocumentInput {
                        title: title.to_string(),
                        content: content.to_string(),
                        ..Default::default()
                    })
                    .collect(),
            )
            .unwrap();
        (dir, store)
    }

    fn retriever() -> Retriever {
        Retriever {
            top_k: 3,
            confidence_threshold: 0.3,
            lexical_floor: 0.1,
            fallback_to_simple: true,
        }
    }

    fn hash_provider(dimension: usize) -> EmbeddingProvider {
        let config: RagConfig = serde_json::from_str(&format!(
            r#"{{"embedding_model": "hash", "embedding_dimension": {dimension}}}"#
        ))
        .unwrap();
        EmbeddingProvider::probe(&config)
    }

    #[test]
    fn cjk_definitional_query_scores_above_floor() {
        let (_dir, store) = store_with(vec![("本益比", "本益比 = 股價 ÷ 每股盈餘")]);
        let doc = store.get("doc_0").unwrap();

        // One keyword hit out of one query term: (3·1) / (6·1).
        let score = lexical_score("什麼是本益比？", doc);
        assert!((score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn curated_uppercase_keywords_still_match() {
        let doc = Document {
            id: "term_001".to_string(),
            title: "本益比 (P/E Ratio)".to_string(),
            content: "本益比 = 股價 ÷ 每股盈餘".to_string(),
            category: "財經術語".to_string(),
            tags: Default::default(),
            keywords: ["PE"].into_iter().map(String::from).collect(),
            source: String::new(),
            timestamp: String::new(),
        };
        assert!(lexical_score("pe 多少算便宜", &doc) > 0.0);
    }

    #[test]
    fn unrelated_query_scores_zero() {
        let (_dir, store) = store_with(vec![("本益比", "本益比 = 股價 ÷ 每股盈餘")]);
        let doc = store.get("doc_0").unwrap();
        assert_eq!(lexical_score("weather forecast", doc), 0.0);
        assert_eq!(lexical_score("", doc), 0.0);
    }

    #[test]
    fn lexical_tier_applies_floor_and_order() {
        let (_dir, store) = store_with(vec![
            ("stocks guide", "stocks and bonds basics"),
            ("bonds", "only bonds here"),
            ("cooking", "pasta recipes"),
        ]);

        let hits = retriever().retrieve_lexical("stocks bonds", &store);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.title, "stocks guide");
        assert_eq!(hits[1].document.title, "bonds");
        assert!(hits.iter().all(|h| h.score > 0.1));
    }

    #[tokio::test]
    async fn semantic_tier_matches_identical_text() {
        let (dir, store) = store_with(vec![("alpha", "alpha content"), ("beta", "beta content")]);
        let mut provider = hash_provider(64);
        let mut index = VectorIndex::new(VectorBackendKind::Flat, 64, dir.path());
        for doc in store.iter() {
            let vector = provider.embed(&format!("{} {}", doc.title, doc.content)).await;
            index.add(&doc.id, vector).unwrap();
        }

        // Identical text embeds to the identical unit vector, so the top
        // score is 1.0 and clears the semantic threshold.
        let hits = retriever()
            .retrieve("alpha alpha content", &mut provider, &index, &store)
            .await;
        assert_eq!(hits[0].document.title, "alpha");
        assert!(hits[0].score > 0.99);
    }

    #[tokio::test]
    async fn empty_index_falls_back_to_lexical() {
        let (dir, store) = store_with(vec![("本益比", "本益比 = 股價 ÷ 每股盈餘")]);
        let mut provider = hash_provider(64);
        let index = VectorIndex::new(VectorBackendKind::Flat, 64, dir.path());

        let hits = retriever()
            .retrieve("什麼是本益比？", &mut provider, &index, &store)
            .await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.title, "本益比");
        assert!(hits[0].score > 0.1);
    }

    #[tokio::test]
    async fn fallback_disabled_returns_empty() {
        let (dir, store) = store_with(vec![("本益比", "本益比 = 股價 ÷ 每股盈餘")]);
        let mut provider = hash_provider(64);
        let index = VectorIndex::new(VectorBackendKind::Flat, 64, dir.path());

        let gated = Retriever {
            fallback_to_simple: false,
            ..retriever()
        };
        let hits = gated
            .retrieve("什麼是本益比？", &mut provider, &index, &store)
            .await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn empty_query_returns_empty() {
        let (dir, store) = store_with(vec![("a", "b")]);
        let mut provider = hash_provider(64);
        let index = VectorIndex::new(VectorBackendKind::Flat, 64, dir.path());
        let hits = retriever().retrieve("   ", &mut provider, &index, &store).await;
        assert!(hits.is_empty());
    }
}
