// SPDX-License-Identifier: MIT OR Apache-2.0

//! finrag - Tiered retrieval-augmented answering for financial questions
//!
//! Every layer degrades gracefully: neural, hosted, or hash embeddings; a
//! flat inner-product index or a linear cosine scan; hosted or template
//! generation. The worst-case configuration still answers deterministically
//! from the knowledge base.

pub mod config;
pub mod embedding;
pub mod engine;
pub mod errors;
pub mod generator;
pub mod index;
pub mod persist;
pub mod retriever;
pub mod seed;
pub mod store;

pub use config::RagConfig;
pub use engine::{QueryResult, RagEngine, Statistics};
pub use errors::{RagError, Result};
pub use generator::{Method, SourceRef};
pub use retriever::ScoredDocument;
pub use store::{Document, DocumentInput, DocumentStore};
