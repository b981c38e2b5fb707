// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable knowledge-entry store.
//!
//! Pure data access: documents go in, documents come out by id or by
//! substring match. Ranking lives in the retriever. The whole collection is
//! re-serialized to `knowledge_base.json` on every mutating call, which is
//! acceptable at this corpus scale (hundreds to low thousands of entries).

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::Result;
use crate::persist::write_atomic;

/// Stop words excluded from derived keywords.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "的", "是", "在", "有", "和", "與", "或", "但", "而", "等", "可以", "能夠", "通常",
        "一般", "主要", "重要", "包括", "the", "is", "are", "a", "an", "of", "to", "and", "or",
        "in", "for", "with", "that", "this", "it", "on", "by",
    ]
    .into_iter()
    .collect()
});

/// A knowledge entry. Immutable once created except for administrative
/// re-indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier, generated as `doc_N` when absent on insert.
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Matching terms for the lexical tier; derived from title and content
    /// when absent on insert.
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default)]
    pub source: String,
    /// RFC 3339 insertion timestamp, set on insert when absent.
    #[serde(default)]
    pub timestamp: String,
}

/// Caller-supplied document with the auto-filled fields optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentInput {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub keywords: Option<BTreeSet<String>>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Document collection backed by a JSON journal.
pub struct DocumentStore {
    documents: Vec<Document>,
    by_id: HashMap<String, usize>,
    path: PathBuf,
}

impl DocumentStore {
    /// Open the store at the given journal path, loading any existing
    /// collection. A missing file starts an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let documents: Vec<Document> = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(_) => Vec::new(),
        };

        let by_id = documents
            .iter()
            .enumerate()
            .map(|(i, doc)| (doc.id.clone(), i))
            .collect();

        if !documents.is_empty() {
            info!("loaded {} knowledge entries", documents.len());
        }

        Ok(Self {
            documents,
            by_id,
            path,
        })
    }

    /// Normalize and append documents, then re-serialize the journal.
    /// Returns the assigned ids in input order.
    pub fn add(&mut self, inputs: Vec<DocumentInput>) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(inputs.len());
        for input in inputs {
            let doc = self.normalize(input);
            ids.push(doc.id.clone());
            self.by_id.insert(doc.id.clone(), self.documents.len());
            self.documents.push(doc);
        }
        self.save()?;
        Ok(ids)
    }

    /// Fill the auto-generated fields of a caller-supplied document.
    fn normalize(&self, input: DocumentInput) -> Document {
        let id = match input.id.filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => self.next_id(),
        };
        let keywords = match input.keywords {
            Some(keywords) if !keywords.is_empty() => keywords,
            _ => extract_keywords(&format!("{} {}", input.title, input.content)),
        };
        let timestamp = input
            .timestamp
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());

        Document {
            id,
            title: input.title,
            content: input.content,
            category: input.category,
            tags: input.tags,
            keywords,
            source: input.source,
            timestamp,
        }
    }

    /// First free `doc_N` id at or after the current collection size.
    fn next_id(&self) -> String {
        let mut n = self.documents.len();
        loop {
            let candidate = format!("doc_{n}");
            if !self.by_id.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.by_id.get(id).map(|&i| &self.documents[i])
    }

    /// Case-insensitive substring search over title and content, in
    /// insertion order.
    pub fn search_text(&self, query: &str, limit: usize) -> Vec<&Document> {
        let needle = query.to_lowercase();
        self.documents
            .iter()
            .filter(|doc| {
                doc.title.to_lowercase().contains(&needle)
                    || doc.content.to_lowercase().contains(&needle)
            })
            .take(limit)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Re-serialize the whole collection via temp-file + rename.
    fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.documents)?;
        write_atomic(&self.path, json.as_bytes())?;
        Ok(())
    }
}

/// Derive lexical keywords from text: alphanumeric runs of two or more
/// characters, lowercased, minus stop words.
pub fn extract_keywords(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1)
        .map(|w| w.to_lowercase())
        .filter(|w| !STOP_WORDS.contains(w.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn input(title: &str, content: &str) -> DocumentInput {
        DocumentInput {
            title: title.to_string(),
            content: content.to_string(),
            category: "test".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn add_assigns_id_timestamp_keywords() {
        let dir = tempdir().unwrap();
        let mut store = DocumentStore::open(dir.path().join("kb.json")).unwrap();

        let ids = store
            .add(vec![input("本益比", "本益比 = 股價 ÷ 每股盈餘")])
            .unwrap();
        assert_eq!(ids, vec!["doc_0"]);

        let doc = store.get("doc_0").unwrap();
        assert!(!doc.timestamp.is_empty());
        assert!(doc.keywords.contains("本益比"));
        assert!(doc.keywords.contains("股價"));
    }

    #[test]
    fn caller_fields_survive_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kb.json");
        {
            let mut store = DocumentStore::open(&path).unwrap();
            store
                .add(vec![DocumentInput {
                    id: Some("term_001".to_string()),
                    timestamp: Some("2024-01-01T00:00:00Z".to_string()),
                    keywords: Some(["pe"].into_iter().map(String::from).collect()),
                    ..input("PE", "price to earnings")
                }])
                .unwrap();
        }

        let store = DocumentStore::open(&path).unwrap();
        let doc = store.get("term_001").unwrap();
        assert_eq!(doc.timestamp, "2024-01-01T00:00:00Z");
        assert_eq!(doc.keywords.len(), 1);
    }

    #[test]
    fn search_text_substring_insertion_order() {
        let dir = tempdir().unwrap();
        let mut store = DocumentStore::open(dir.path().join("kb.json")).unwrap();
        store
            .add(vec![
                input("Alpha", "growth stocks"),
                input("Beta", "value STOCKS here"),
                input("Gamma", "bonds only"),
            ])
            .unwrap();

        let hits = store.search_text("stocks", 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Alpha");
        assert_eq!(hits[1].title, "Beta");

        assert_eq!(store.search_text("stocks", 1).len(), 1);
    }

    #[test]
    fn next_id_skips_taken_ids() {
        let dir = tempdir().unwrap();
        let mut store = DocumentStore::open(dir.path().join("kb.json")).unwrap();
        store
            .add(vec![DocumentInput {
                id: Some("doc_1".to_string()),
                ..input("a", "b")
            }])
            .unwrap();
        // Collection size is 1, so "doc_1" is the first candidate and is taken.
        let ids = store.add(vec![input("c", "d")]).unwrap();
        assert_eq!(ids, vec!["doc_2"]);
    }

    #[test]
    fn keywords_filter_stop_words_and_short_tokens() {
        let keywords = extract_keywords("the price of 台積電 is 高");
        assert!(keywords.contains("price"));
        assert!(keywords.contains("台積電"));
        assert!(!keywords.contains("the"));
        assert!(!keywords.contains("of"));
        assert!(!keywords.contains("高"));
    }
}
