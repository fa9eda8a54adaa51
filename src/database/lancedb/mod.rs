// LanceDB vector database module
// Stores embedded corpus chunks and answers nearest neighbour queries


pub mod vector_store;

pub use vector_store::LanceIndex;

use crate::index::IndexEntry;

/// One row of the chunk table
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    /// Row identifier, derived from the position
    pub id: String,
    pub vector: Vec<f32>,
    /// Insertion position of the chunk in the corpus
    pub position: u32,
    /// Source page number
    pub page: u32,
    /// The chunk text
    pub content: String,
}

impl ChunkRecord {
    #[inline]
    pub fn from_entry(position: u32, entry: IndexEntry) -> Self {
        Self {
            id: format!("chunk-{:06}", position),
            vector: entry.vector,
            position,
            page: u32::try_from(entry.page).unwrap_or(u32::MAX),
            content: entry.text,
        }
    }
}
