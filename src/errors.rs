// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for the engine.
//!
//! None of these kinds is fatal to the process: backend failures descend one
//! fallback tier, corrupt persisted state is rebuilt from the document store,
//! and anything that reaches the engine facade is converted into an
//! error-method result instead of propagating.

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Debug, Error)]
pub enum RagError {
    /// An optional dependency is missing or mis-configured. Recovered by
    /// descending one fallback tier; never surfaced to callers.
    #[error("backend unavailable: {backend}")]
    BackendUnavailable { backend: String },

    /// A hosted backend call failed or timed out. Treated exactly like
    /// `BackendUnavailable`.
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),

    /// Persisted index state is unreadable or dimension-mismatched.
    /// Recovered by rebuilding from the document store.
    #[error("corrupt persisted state at {path}: {reason}")]
    DataCorruption { path: PathBuf, reason: String },

    /// Malformed caller input (empty query, invalid document). Handled by
    /// returning a well-formed low-confidence result.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RagError {
    pub fn backend_unavailable(backend: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend: backend.into(),
        }
    }

    pub fn corruption(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DataCorruption {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}
