// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text embedding backends and caching.

pub mod cache;
pub mod provider;

pub use cache::EmbeddingCache;
pub use provider::{l2_normalize, EmbeddingProvider, HashEmbedder, HostedEmbedder};
