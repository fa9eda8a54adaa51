#[cfg(test)]
mod tests;

use super::ChunkRecord;
use crate::index::{IndexEntry, IndexError, SearchHit, VectorIndex, check_dimension, rank};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Vector index backed by a LanceDB table named after the index namespace
pub struct LanceIndex {
    connection: Connection,
    table: Table,
    table_name: String,
    dimension: usize,
    len: usize,
}

impl std::fmt::Debug for LanceIndex {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceIndex")
            .field("table_name", &self.table_name)
            .field("dimension", &self.dimension)
            .field("len", &self.len)
            .finish()
    }
}

fn store_error(context: &str, e: impl std::fmt::Display) -> IndexError {
    IndexError::Store(format!("{}: {}", context, e))
}

impl LanceIndex {
    /// Build the table from scratch, replacing whatever an earlier run left behind
    #[inline]
    pub async fn build(
        db_path: &Path,
        namespace: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<Self, IndexError> {
        let dimension = entries.first().ok_or(IndexError::Empty)?.vector.len();
        for entry in &entries {
            check_dimension(dimension, entry.vector.len())?;
        }

        let connection = Self::connect(db_path).await?;
        Self::drop_table_if_exists(&connection, namespace).await?;

        let table = connection
            .create_empty_table(namespace, create_schema(dimension))
            .execute()
            .await
            .map_err(|e| store_error("Failed to create table", e))?;

        let records: Vec<ChunkRecord> = entries
            .into_iter()
            .enumerate()
            .map(|(position, entry)| ChunkRecord::from_entry(position as u32, entry))
            .collect();

        let record_batch = create_record_batch(&records, dimension)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| store_error("Failed to insert chunks", e))?;

        let len = table
            .count_rows(None)
            .await
            .map_err(|e| store_error("Failed to count rows", e))?;

        info!(
            "Stored {} chunks of dimension {} in table {}",
            len, dimension, namespace
        );

        Ok(Self {
            connection,
            table,
            table_name: namespace.to_string(),
            dimension,
            len,
        })
    }

    #[inline]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Whether the backing table is still present and readable
    #[inline]
    pub async fn validate_integrity(&self) -> bool {
        let table_names = match self.connection.table_names().execute().await {
            Ok(names) => names,
            Err(e) => {
                error!("Failed to list tables during integrity check: {}", e);
                return false;
            }
        };

        if !table_names.contains(&self.table_name) {
            warn!("Table {} missing during integrity check", self.table_name);
            return false;
        }

        match self.table.count_rows(None).await {
            Ok(count) => {
                debug!("Integrity check passed, {} rows found", count);
                count == self.len
            }
            Err(e) => {
                error!("Failed to count rows during integrity check: {}", e);
                false
            }
        }
    }

    async fn connect(db_path: &Path) -> Result<Connection, IndexError> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path)
            .map_err(|e| store_error("Failed to create vector database directory", e))?;

        let uri = format!("file://{}", db_path.display());

        match lancedb::connect(&uri).execute().await {
            Ok(connection) => Ok(connection),
            Err(e) => {
                error!("Failed to connect to LanceDB: {}", e);

                let error_msg = e.to_string().to_lowercase();
                if error_msg.contains("corrupt")
                    || error_msg.contains("invalid")
                    || error_msg.contains("malformed")
                {
                    warn!("Database corruption detected, attempting recovery");
                    attempt_corruption_recovery(db_path)?;

                    lancedb::connect(&uri)
                        .execute()
                        .await
                        .map_err(|e| store_error("Failed to connect to LanceDB after recovery", e))
                } else {
                    Err(store_error("Failed to connect to LanceDB", e))
                }
            }
        }
    }

    async fn drop_table_if_exists(connection: &Connection, table_name: &str) -> Result<(), IndexError> {
        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| store_error("Failed to list tables for drop", e))?;

        if table_names.iter().any(|name| name == table_name) {
            info!("Dropping existing table {}", table_name);
            connection
                .drop_table(table_name)
                .await
                .map_err(|e| store_error("Failed to drop table", e))?;
        }

        Ok(())
    }

    /// Number of rows to request so that ties at the cut-off can be ordered by position
    fn fetch_limit(&self, k: usize) -> usize {
        k.saturating_mul(2).max(k + 1).min(self.len)
    }
}

#[async_trait]
impl VectorIndex for LanceIndex {
    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        check_dimension(self.dimension, query.len())?;
        if k == 0 || self.len == 0 {
            return Ok(Vec::new());
        }

        let limit = self.fetch_limit(k);
        debug!("Searching {} for {} of {} rows", self.table_name, limit, self.len);

        let mut results = self
            .table
            .vector_search(query)
            .map_err(|e| store_error("Failed to create vector search", e))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| store_error("Failed to execute search", e))?;

        let mut hits = Vec::with_capacity(limit);
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| store_error("Failed to read result stream", e))?
        {
            hits.extend(parse_search_batch(&batch)?);
        }

        rank(&mut hits);
        hits.truncate(k);
        debug!("Search returned {} hits", hits.len());
        Ok(hits)
    }
}

fn create_schema(vector_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                vector_dim as i32,
            ),
            false,
        ),
        Field::new("position", DataType::UInt32, false),
        Field::new("page", DataType::UInt32, false),
        Field::new("content", DataType::Utf8, false),
    ]))
}

fn create_record_batch(records: &[ChunkRecord], vector_dim: usize) -> Result<RecordBatch, IndexError> {
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    let positions: Vec<u32> = records.iter().map(|r| r.position).collect();
    let pages: Vec<u32> = records.iter().map(|r| r.page).collect();
    let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();

    let mut flat_values = Vec::with_capacity(records.len() * vector_dim);
    for record in records {
        flat_values.extend_from_slice(&record.vector);
    }
    let values_array = Float32Array::from(flat_values);
    let field = Arc::new(Field::new("item", DataType::Float32, true));
    let vector_array =
        FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
            .map_err(|e| store_error("Failed to create vector array", e))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(UInt32Array::from(positions)),
        Arc::new(UInt32Array::from(pages)),
        Arc::new(StringArray::from(contents)),
    ];

    RecordBatch::try_new(create_schema(vector_dim), arrays)
        .map_err(|e| store_error("Failed to create record batch", e))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, IndexError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| IndexError::Store(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| IndexError::Store(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array, IndexError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| IndexError::Store(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| IndexError::Store(format!("Invalid {} column type", name)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchHit>, IndexError> {
    let contents = string_column(batch, "content")?;
    let positions = u32_column(batch, "position")?;
    let pages = u32_column(batch, "page")?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| IndexError::Store("Missing _distance column".to_string()))?;

    Ok((0..batch.num_rows())
        .map(|row| {
            let distance = if distances.is_null(row) {
                1.0
            } else {
                distances.value(row)
            };

            SearchHit {
                text: contents.value(row).to_string(),
                page: pages.value(row) as usize,
                position: positions.value(row),
                // Cosine distance is 1 - similarity
                score: 1.0 - distance,
            }
        })
        .collect())
}

fn attempt_corruption_recovery(db_path: &Path) -> Result<(), IndexError> {
    warn!("Attempting database corruption recovery at {:?}", db_path);

    if db_path.exists() {
        let backup_path = db_path.with_extension("corrupted_backup");
        if let Err(e) = std::fs::rename(db_path, &backup_path) {
            error!("Failed to backup corrupted database: {}", e);
        } else {
            info!("Corrupted database backed up to {:?}", backup_path);
        }
    }

    if db_path.exists() {
        std::fs::remove_dir_all(db_path)
            .map_err(|e| store_error("Failed to remove corrupted database", e))?;
    }

    std::fs::create_dir_all(db_path)
        .map_err(|e| store_error("Failed to recreate vector database directory", e))?;

    info!("Database corruption recovery completed");
    Ok(())
}
