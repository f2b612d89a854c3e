//! In-memory vector index with exact cosine search.
//!
//! Embeddings are L2-normalised on insert so that search is a plain inner
//! product. Results are ordered by descending similarity; equal scores keep
//! insertion order. Brute force is fine at the tens-of-thousands scale this
//! index targets.

use std::cmp::Ordering;
use std::path::Path;

use super::embedder::Embedder;
use super::error::{RagError, RagResult};
use super::persist;
use super::types::{Passage, SearchResult};

/// Identifier persisted alongside every index.
pub const METRIC_COSINE: &str = "cosine";

/// Passages per embedder call during build/add.
const EMBED_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub entry_id: String,
    /// Unit-length embedding (or all zeros for a zero input vector)
    pub embedding: Vec<f32>,
    pub passage: Passage,
}

#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dimension: Option<usize>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// An empty index; the dimension is fixed by the first insert.
    pub fn new() -> Self {
        Self::default()
    }

    /// Embed every passage and build a complete index.
    pub async fn build(passages: Vec<Passage>, embedder: &dyn Embedder) -> RagResult<Self> {
        if passages.is_empty() {
            return Err(RagError::EmptyInput(
                "cannot build an index from zero passages".to_string(),
            ));
        }

        let entries = Self::embed_passages(passages, embedder, None).await?;
        let mut index = Self::new();
        index.extend(entries)?;
        tracing::info!(
            "Built index with {} passages (dimension {})",
            index.len(),
            index.dimension.unwrap_or(0)
        );
        Ok(index)
    }

    /// Embed and insert more passages. Nothing is inserted if any embedding fails.
    pub async fn add(&mut self, passages: Vec<Passage>, embedder: &dyn Embedder) -> RagResult<usize> {
        let entries = Self::embed_passages(passages, embedder, self.dimension).await?;
        let added = entries.len();
        self.extend(entries)?;
        Ok(added)
    }

    /// Compute entries for `passages` without touching any index.
    ///
    /// When `expected_dimension` is set, every vector must match it.
    pub async fn embed_passages(
        passages: Vec<Passage>,
        embedder: &dyn Embedder,
        expected_dimension: Option<usize>,
    ) -> RagResult<Vec<IndexEntry>> {
        let mut dimension = expected_dimension;
        let mut entries = Vec::with_capacity(passages.len());
        let total = passages.len();

        for batch in passages.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();
            let vectors = embedder.embed(&texts).await.map_err(RagError::Embedding)?;

            if vectors.len() != batch.len() {
                return Err(RagError::Embedding(anyhow::anyhow!(
                    "{} returned {} vectors for {} passages",
                    embedder.name(),
                    vectors.len(),
                    batch.len()
                )));
            }

            for (passage, vector) in batch.iter().zip(vectors) {
                if vector.is_empty() {
                    return Err(RagError::Embedding(anyhow::anyhow!(
                        "{} returned an empty vector",
                        embedder.name()
                    )));
                }
                let expected = *dimension.get_or_insert(vector.len());
                if vector.len() != expected {
                    return Err(RagError::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
                entries.push(IndexEntry {
                    entry_id: uuid::Uuid::new_v4().to_string(),
                    embedding: normalize(vector),
                    passage: passage.clone(),
                });
            }

            tracing::debug!("Embedded {}/{} passages", entries.len(), total);
        }

        Ok(entries)
    }

    /// Append pre-computed entries. All-or-nothing on dimension checks.
    pub fn extend(&mut self, entries: Vec<IndexEntry>) -> RagResult<()> {
        let Some(first) = entries.first() else {
            return Ok(());
        };

        let expected = self.dimension.unwrap_or(first.embedding.len());
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != expected) {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: bad.embedding.len(),
            });
        }

        self.dimension = Some(expected);
        self.entries.extend(entries);
        Ok(())
    }

    /// Embed `query_text` and return the `k` most similar passages.
    pub async fn search(
        &self,
        query_text: &str,
        k: usize,
        embedder: &dyn Embedder,
    ) -> RagResult<Vec<SearchResult>> {
        validate_k(k)?;
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query = embedder
            .embed_one(query_text)
            .await
            .map_err(RagError::Embedding)?;
        self.search_by_vector(&query, k)
    }

    pub fn search_by_vector(&self, query: &[f32], k: usize) -> RagResult<Vec<SearchResult>> {
        validate_k(k)?;
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let query = normalize(query.to_vec());
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (idx, dot(&query, &entry.embedding)))
            .collect();

        // Stable sort: ties stay in insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(idx, score)| SearchResult {
                passage: self.entries[idx].passage.clone(),
                score,
            })
            .collect())
    }

    pub async fn save(&self, path: &Path) -> RagResult<()> {
        persist::save(path, self.dimension, &self.entries).await
    }

    pub async fn load(path: &Path) -> RagResult<Self> {
        let stored = persist::load(path).await?;
        Ok(Self {
            dimension: stored.dimension,
            entries: stored.entries,
        })
    }

    pub fn exists(path: &Path) -> bool {
        persist::exists(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn metric(&self) -> &'static str {
        METRIC_COSINE
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

fn validate_k(k: usize) -> RagResult<()> {
    if k == 0 {
        return Err(RagError::InvalidArgument("k must be at least 1".to_string()));
    }
    Ok(())
}

fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in &mut vector {
            *x /= norm;
        }
    } else {
        vector.iter_mut().for_each(|x| *x = 0.0);
    }
    vector
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Looks each text up in a fixed table; unknown text maps to the zero vector.
    struct TableEmbedder {
        table: Vec<(&'static str, Vec<f32>)>,
        dimension: usize,
    }

    #[async_trait]
    impl Embedder for TableEmbedder {
        fn name(&self) -> &str {
            "table"
        }

        async fn embed(&self, inputs: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(inputs
                .iter()
                .map(|text| {
                    self.table
                        .iter()
                        .find(|(key, _)| *key == text.as_str())
                        .map(|(_, v)| v.clone())
                        .unwrap_or_else(|| vec![0.0; self.dimension])
                })
                .collect())
        }
    }

    fn embedder() -> TableEmbedder {
        TableEmbedder {
            table: vec![
                ("north", vec![1.0, 0.0, 0.0]),
                ("north-east", vec![1.0, 1.0, 0.0]),
                ("east", vec![0.0, 1.0, 0.0]),
                ("up", vec![0.0, 0.0, 1.0]),
                ("north again", vec![2.0, 0.0, 0.0]),
            ],
            dimension: 3,
        }
    }

    fn passage(text: &str) -> Passage {
        Passage::new(text, format!("{}.txt", text), ".txt", 0)
    }

    async fn compass_index() -> VectorIndex {
        let passages = ["north", "north-east", "east", "up"].map(passage).to_vec();
        VectorIndex::build(passages, &embedder()).await.unwrap()
    }

    #[tokio::test]
    async fn build_rejects_empty_input() {
        let err = VectorIndex::build(Vec::new(), &embedder()).await.unwrap_err();
        assert!(matches!(err, RagError::EmptyInput(_)));
    }

    #[tokio::test]
    async fn search_orders_by_descending_similarity() {
        let index = compass_index().await;
        let results = index.search("north", 4, &embedder()).await.unwrap();

        let texts: Vec<&str> = results.iter().map(|r| r.passage.text.as_str()).collect();
        assert_eq!(texts[0], "north");
        assert_eq!(texts[1], "north-east");
        assert!((results[0].score - 1.0).abs() < 1e-5);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn search_returns_at_most_k() {
        let index = compass_index().await;
        assert_eq!(index.search("north", 2, &embedder()).await.unwrap().len(), 2);
        assert_eq!(index.search("north", 10, &embedder()).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let index = compass_index().await;
        // "east" and "up" are both orthogonal to north.
        let results = index.search("north", 4, &embedder()).await.unwrap();
        assert_eq!(results[2].passage.text, "east");
        assert_eq!(results[3].passage.text, "up");
    }

    #[tokio::test]
    async fn search_is_deterministic() {
        let index = compass_index().await;
        let a = index.search("north-east", 3, &embedder()).await.unwrap();
        let b = index.search("north-east", 3, &embedder()).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn scale_does_not_change_scores() {
        let index = compass_index().await;
        let a = index.search("north", 1, &embedder()).await.unwrap();
        let b = index.search("north again", 1, &embedder()).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn zero_k_is_invalid() {
        let index = compass_index().await;
        let err = index.search("north", 0, &embedder()).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidArgument(_)));

        let err = VectorIndex::new().search("north", 0, &embedder()).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn empty_index_returns_no_results() {
        let index = VectorIndex::new();
        assert!(index.search("north", 3, &embedder()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn k_larger_than_index_does_not_pad() {
        let index = VectorIndex::build(vec![passage("north")], &embedder())
            .await
            .unwrap();
        let results = index.search("north-east", 3, &embedder()).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn add_rejects_other_dimension() {
        let mut index = compass_index().await;
        let wide = TableEmbedder {
            table: vec![],
            dimension: 5,
        };
        let err = index.add(vec![passage("wide")], &wide).await.unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 3,
                actual: 5
            }
        ));
        assert_eq!(index.len(), 4);
    }

    #[tokio::test]
    async fn add_extends_existing_index() {
        let mut index = compass_index().await;
        let added = index.add(vec![passage("north again")], &embedder()).await.unwrap();
        assert_eq!(added, 1);
        assert_eq!(index.len(), 5);
    }

    #[tokio::test]
    async fn query_with_wrong_dimension_is_rejected() {
        let index = compass_index().await;
        let err = index.search_by_vector(&[1.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn save_load_round_trip_preserves_results() {
        let tmp = tempfile::tempdir().unwrap();
        let index = compass_index().await;
        index.save(tmp.path()).await.unwrap();
        assert!(VectorIndex::exists(tmp.path()));

        let loaded = VectorIndex::load(tmp.path()).await.unwrap();
        assert_eq!(loaded.dimension(), Some(3));
        assert_eq!(loaded.len(), index.len());

        for query in ["north", "north-east", "up"] {
            let before = index.search(query, 4, &embedder()).await.unwrap();
            let after = loaded.search(query, 4, &embedder()).await.unwrap();
            assert_eq!(before, after, "query {query}");
        }
    }

    #[test]
    fn normalize_handles_zero_vector() {
        assert_eq!(normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
        let unit = normalize(vec![3.0, 4.0]);
        assert!((unit[0] - 0.6).abs() < 1e-6);
        assert!((unit[1] - 0.8).abs() < 1e-6);
    }
}
