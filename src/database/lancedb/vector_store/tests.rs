use super::*;
use tempfile::TempDir;

fn entry(vector: Vec<f32>, text: &str, page: usize) -> IndexEntry {
    IndexEntry {
        vector,
        text: text.to_string(),
        page,
    }
}

fn sample_entries() -> Vec<IndexEntry> {
    vec![
        entry(vec![1.0, 0.0, 0.0, 0.0], "The capital is X", 1),
        entry(vec![0.0, 1.0, 0.0, 0.0], "Rivers flow north", 1),
        entry(vec![0.7, 0.7, 0.0, 0.0], "The capital sits on a river", 2),
        entry(vec![0.0, 0.0, 1.0, 0.0], "Taxes are uniform", 3),
        entry(vec![0.0, 0.0, 0.0, 1.0], "Congress meets yearly", 3),
    ]
}

#[tokio::test]
async fn build_stores_every_entry() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let index = LanceIndex::build(temp_dir.path(), "llamaprac", sample_entries())
        .await
        .expect("should build index");

    assert_eq!(index.len(), 5);
    assert_eq!(index.dimension(), 4);
    assert_eq!(index.table_name(), "llamaprac");
    assert!(index.validate_integrity().await);
}

#[tokio::test]
async fn exact_match_is_top_hit() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let index = LanceIndex::build(temp_dir.path(), "llamaprac", sample_entries())
        .await
        .expect("should build index");

    let hits = index
        .search(&[0.99, 0.01, 0.0, 0.0], 4)
        .await
        .expect("search should succeed");

    assert_eq!(hits.len(), 4);
    assert_eq!(hits[0].text, "The capital is X");
    assert_eq!(hits[0].page, 1);
    assert_eq!(hits[0].position, 0);
    assert_eq!(hits[1].text, "The capital sits on a river");
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn rebuilding_replaces_previous_contents() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    LanceIndex::build(temp_dir.path(), "llamaprac", sample_entries())
        .await
        .expect("should build first index");

    let index = LanceIndex::build(
        temp_dir.path(),
        "llamaprac",
        vec![entry(vec![1.0, 0.0, 0.0], "only chunk", 1)],
    )
    .await
    .expect("should rebuild with a different dimension");

    assert_eq!(index.len(), 1);
    let hits = index
        .search(&[1.0, 0.0, 0.0], 4)
        .await
        .expect("search should succeed");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "only chunk");
}

#[tokio::test]
async fn namespaces_are_separate_tables() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let first = LanceIndex::build(temp_dir.path(), "constitution", sample_entries())
        .await
        .expect("should build first index");
    let second = LanceIndex::build(
        temp_dir.path(),
        "statutes",
        vec![entry(vec![1.0, 0.0, 0.0, 0.0], "statute text", 1)],
    )
    .await
    .expect("should build second index");

    assert_eq!(first.len(), 5);
    assert_eq!(second.len(), 1);
    assert!(first.validate_integrity().await);
}

#[tokio::test]
async fn ties_are_ordered_by_position() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let entries = (0..6)
        .map(|i| entry(vec![0.0, 1.0, 0.0], &format!("duplicate {}", i), 1))
        .collect();
    let index = LanceIndex::build(temp_dir.path(), "ties", entries)
        .await
        .expect("should build index");

    let hits = index
        .search(&[0.0, 1.0, 0.0], 3)
        .await
        .expect("search should succeed");

    let positions: Vec<u32> = hits.iter().map(|h| h.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
}

#[tokio::test]
async fn k_larger_than_index_returns_everything() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let index = LanceIndex::build(temp_dir.path(), "llamaprac", sample_entries())
        .await
        .expect("should build index");

    let hits = index
        .search(&[0.0, 0.0, 1.0, 0.0], 50)
        .await
        .expect("search should succeed");
    assert_eq!(hits.len(), 5);

    let none = index
        .search(&[0.0, 0.0, 1.0, 0.0], 0)
        .await
        .expect("search should succeed");
    assert!(none.is_empty());
}

#[tokio::test]
async fn wrong_query_dimension_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let index = LanceIndex::build(temp_dir.path(), "llamaprac", sample_entries())
        .await
        .expect("should build index");

    let result = index.search(&[1.0, 0.0], 2).await;
    assert!(matches!(
        result,
        Err(IndexError::DimensionMismatch {
            expected: 4,
            actual: 2
        })
    ));
}

#[tokio::test]
async fn mixed_dimensions_are_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let entries = vec![
        entry(vec![1.0, 0.0], "two dims", 1),
        entry(vec![1.0, 0.0, 0.0], "three dims", 1),
    ];

    let result = LanceIndex::build(temp_dir.path(), "llamaprac", entries).await;
    assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
}

#[tokio::test]
async fn empty_build_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let result = LanceIndex::build(temp_dir.path(), "llamaprac", Vec::new()).await;
    assert!(matches!(result, Err(IndexError::Empty)));
}
