use async_trait::async_trait;
use tracing::debug;

use super::{IndexEntry, IndexError, SearchHit, VectorIndex, check_dimension, rank_order};

struct StoredEntry {
    unit: Vec<f32>,
    text: String,
    page: usize,
}

/// Exhaustive cosine similarity search over vectors held in memory
pub struct MemoryIndex {
    entries: Vec<StoredEntry>,
    dimension: usize,
}

impl std::fmt::Debug for MemoryIndex {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryIndex")
            .field("entries", &self.entries.len())
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl MemoryIndex {
    /// Build the index. All vectors must share one dimension.
    #[inline]
    pub fn build(entries: Vec<IndexEntry>) -> Result<Self, IndexError> {
        let dimension = entries.first().ok_or(IndexError::Empty)?.vector.len();

        let entries = entries
            .into_iter()
            .map(|entry| {
                check_dimension(dimension, entry.vector.len())?;
                Ok(StoredEntry {
                    unit: normalize(&entry.vector),
                    text: entry.text,
                    page: entry.page,
                })
            })
            .collect::<Result<Vec<_>, IndexError>>()?;

        debug!(
            "Built memory index with {} entries of dimension {}",
            entries.len(),
            dimension
        );

        Ok(Self { entries, dimension })
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    #[inline]
    fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        check_dimension(self.dimension, query.len())?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = normalize(query);
        let mut scored: Vec<(f32, u32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (dot(&query, &entry.unit), position as u32))
            .collect();

        scored.sort_by(|a, b| rank_order(*a, *b));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, position)| {
                let entry = &self.entries[position as usize];
                SearchHit {
                    text: entry.text.clone(),
                    page: entry.page,
                    position,
                    score,
                }
            })
            .collect())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Scale to unit length. The zero vector stays zero and so scores 0 against everything.
fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm = dot(vector, vector).sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return vec![0.0; vector.len()];
    }
    vector.iter().map(|x| x / norm).collect()
}
