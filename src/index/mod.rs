//! Vector index over embedded chunks
//!
//! The index is built once from the embedded corpus and is read-only
//! afterwards. Two backends exist: an in-memory brute force index and a
//! LanceDB table.

pub mod memory;


use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::{Config, IndexBackendKind};
use crate::database::lancedb::LanceIndex;

pub use memory::MemoryIndex;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Cannot build an index from zero entries")]
    Empty,
    #[error("Vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Vector store error: {0}")]
    Store(String),
}

/// An embedded chunk to be stored in the index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub text: String,
    pub page: usize,
}

/// A retrieved chunk with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub text: String,
    pub page: usize,
    /// Insertion position of the chunk, used to break similarity ties
    pub position: u32,
    /// Cosine similarity, higher is closer
    pub score: f32,
}

/// Nearest neighbour search over a fixed set of vectors.
///
/// `search` returns at most `k` hits ordered by non-increasing score; equal
/// scores are ordered by insertion position so that results are stable and
/// `search(v, k)` is always a prefix of `search(v, k + 1)`.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn len(&self) -> usize;

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dimension(&self) -> usize;

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError>;
}

/// Where the index lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexBackend {
    Memory,
    LanceDb { path: PathBuf, namespace: String },
}

impl IndexBackend {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        match config.index.backend {
            IndexBackendKind::Memory => Self::Memory,
            IndexBackendKind::LanceDb => Self::LanceDb {
                path: config.vector_database_path(),
                namespace: config.index.namespace.clone(),
            },
        }
    }
}

/// Build an index holding `entries` in the given order
#[inline]
pub async fn build_index(
    backend: &IndexBackend,
    entries: Vec<IndexEntry>,
) -> Result<Arc<dyn VectorIndex>, IndexError> {
    if entries.is_empty() {
        return Err(IndexError::Empty);
    }

    let count = entries.len();
    let index: Arc<dyn VectorIndex> = match backend {
        IndexBackend::Memory => Arc::new(MemoryIndex::build(entries)?),
        IndexBackend::LanceDb { path, namespace } => {
            Arc::new(LanceIndex::build(path, namespace, entries).await?)
        }
    };

    info!("Built {:?} vector index with {} entries", backend, count);
    Ok(index)
}

/// Ordering used by every backend: score descending, then position ascending
pub(crate) fn rank(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| rank_order((a.score, a.position), (b.score, b.position)));
}

pub(crate) fn rank_order(a: (f32, u32), b: (f32, u32)) -> std::cmp::Ordering {
    b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1))
}

pub(crate) fn check_dimension(expected: usize, actual: usize) -> Result<(), IndexError> {
    if expected == actual {
        Ok(())
    } else {
        Err(IndexError::DimensionMismatch { expected, actual })
    }
}
