// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory vector index with optional persistence.
//!
//! Two variants. `Flat` keeps one contiguous row-major matrix of normalized
//! vectors and scores by inner product; it persists as a binary vector file
//! plus a JSON mapping sidecar. `Scan` is the degraded fallback: per-entry
//! cosine over possibly unnormalized vectors, never persisted. Both are
//! exact; at this corpus scale a linear pass is fast enough.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::VectorBackendKind;
use crate::errors::{RagError, Result};
use crate::persist::write_atomic;

const VECTORS_FILE: &str = "index.vec";
const MAPPINGS_FILE: &str = "index_mappings.json";

/// Sidecar tying row handles back to document ids. The dimension tag guards
/// against loading vectors produced by a differently-sized backend.
#[derive(Serialize, Deserialize)]
struct Mappings {
    dimension: usize,
    doc_ids: Vec<String>,
}

/// Contiguous inner-product index.
struct FlatIndex {
    dimension: usize,
    /// Row-major, `doc_ids.len() * dimension` values.
    data: Vec<f32>,
    doc_ids: Vec<String>,
}

/// Per-entry cosine fallback.
struct ScanIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
    doc_ids: Vec<String>,
}

enum Variant {
    Flat(FlatIndex),
    Scan(ScanIndex),
}

/// Vector index over document embeddings.
pub struct VectorIndex {
    variant: Variant,
    dir: PathBuf,
}

impl VectorIndex {
    pub fn new(kind: VectorBackendKind, dimension: usize, dir: impl AsRef<Path>) -> Self {
        let variant = match kind {
            VectorBackendKind::Flat => Variant::Flat(FlatIndex {
                dimension,
                data: Vec::new(),
                doc_ids: Vec::new(),
            }),
            VectorBackendKind::Scan => Variant::Scan(ScanIndex {
                dimension,
                vectors: Vec::new(),
                doc_ids: Vec::new(),
            }),
        };
        Self {
            variant,
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dimension(&self) -> usize {
        match &self.variant {
            Variant::Flat(flat) => flat.dimension,
            Variant::Scan(scan) => scan.dimension,
        }
    }

    pub fn len(&self) -> usize {
        match &self.variant {
            Variant::Flat(flat) => flat.doc_ids.len(),
            Variant::Scan(scan) => scan.doc_ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this variant saves and loads its contents.
    pub fn is_persistent(&self) -> bool {
        matches!(self.variant, Variant::Flat(_))
    }

    /// Insert one vector under a document id.
    pub fn add(&mut self, doc_id: &str, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimension() {
            return Err(RagError::invalid_input(format!(
                "vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimension()
            )));
        }
        match &mut self.variant {
            Variant::Flat(flat) => {
                flat.data.extend_from_slice(&vector);
                flat.doc_ids.push(doc_id.to_string());
            }
            Variant::Scan(scan) => {
                scan.vectors.push(vector);
                scan.doc_ids.push(doc_id.to_string());
            }
        }
        Ok(())
    }

    /// Top `top_k` entries by score, higher first, ties in insertion order.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<(String, f32)> {
        let mut scored: Vec<(usize, f32)> = match &self.variant {
            Variant::Flat(flat) => flat
                .data
                .chunks_exact(flat.dimension.max(1))
                .map(|row| dot(row, query))
                .enumerate()
                .collect(),
            Variant::Scan(scan) => scan
                .vectors
                .iter()
                .map(|v| cosine_similarity(v, query))
                .enumerate()
                .collect(),
        };

        // Stable sort preserves insertion order among equal scores.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        let doc_ids = match &self.variant {
            Variant::Flat(flat) => &flat.doc_ids,
            Variant::Scan(scan) => &scan.doc_ids,
        };
        scored
            .into_iter()
            .map(|(i, score)| (doc_ids[i].clone(), score))
            .collect()
    }

    /// Drop all entries, keeping the configured variant and dimension.
    pub fn clear(&mut self) {
        match &mut self.variant {
            Variant::Flat(flat) => {
                flat.data.clear();
                flat.doc_ids.clear();
            }
            Variant::Scan(scan) => {
                scan.vectors.clear();
                scan.doc_ids.clear();
            }
        }
    }

    /// Persist both halves atomically. A no-op for the scan variant.
    pub fn save(&self) -> Result<()> {
        let Variant::Flat(flat) = &self.variant else {
            return Ok(());
        };

        let mut bytes =
            Vec::with_capacity(8 + flat.data.len() * std::mem::size_of::<f32>());
        bytes.extend_from_slice(&(flat.dimension as u32).to_le_bytes());
        bytes.extend_from_slice(&(flat.doc_ids.len() as u32).to_le_bytes());
        for value in &flat.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        write_atomic(&self.dir.join(VECTORS_FILE), &bytes)?;

        let mappings = Mappings {
            dimension: flat.dimension,
            doc_ids: flat.doc_ids.clone(),
        };
        let json = serde_json::to_string_pretty(&mappings)?;
        write_atomic(&self.dir.join(MAPPINGS_FILE), json.as_bytes())?;
        Ok(())
    }

    /// Restore from disk. Returns false when the files are missing, either
    /// half is unreadable, or the dimension tag does not match; the index is
    /// left empty in that case and the caller rebuilds from the store.
    pub fn load(&mut self) -> bool {
        let Variant::Flat(_) = &self.variant else {
            return false;
        };

        match self.try_load() {
            Ok(count) => {
                info!("loaded vector index with {count} entries");
                true
            }
            Err(e) => {
                if self.dir.join(VECTORS_FILE).exists() {
                    warn!("vector index unusable, rebuilding: {e}");
                }
                self.clear();
                false
            }
        }
    }

    fn try_load(&mut self) -> Result<usize> {
        let vectors_path = self.dir.join(VECTORS_FILE);
        let mappings_path = self.dir.join(MAPPINGS_FILE);

        let bytes = std::fs::read(&vectors_path)?;
        let mappings: Mappings = serde_json::from_str(&std::fs::read_to_string(&mappings_path)?)?;

        let Variant::Flat(flat) = &mut self.variant else {
            unreachable!("load is flat-only");
        };

        if bytes.len() < 8 {
            return Err(RagError::corruption(&vectors_path, "truncated header"));
        }
        let dimension = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let count = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;

        if dimension != flat.dimension || mappings.dimension != flat.dimension {
            return Err(RagError::corruption(
                &vectors_path,
                format!(
                    "dimension tag {dimension} does not match configured {}",
                    flat.dimension
                ),
            ));
        }
        let expected = 8 + count * dimension * std::mem::size_of::<f32>();
        if bytes.len() != expected || mappings.doc_ids.len() != count {
            return Err(RagError::corruption(
                &vectors_path,
                "vector data does not match its mapping sidecar",
            ));
        }

        flat.data = bytes[8..]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        flat.doc_ids = mappings.doc_ids;
        Ok(count)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity; zero for mismatched lengths or zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot_product = dot(a, b);
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot_product / (norm_a * norm_b)
}
