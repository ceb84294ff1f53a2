//! Vector store: in-memory cosine collection with a durable JSON snapshot.
//!
//! The [`VectorStoreManager`] exclusively owns both the collection and its
//! on-disk snapshot; no other component mutates either directly.
//!
//! ## Write discipline
//!
//! `add_chunks` mutates the collection and then exports a full snapshot.
//! The two steps are not atomic, so a writer mutex serialises the whole
//! mutate-then-export sequence per collection — a required invariant, not an
//! optimisation: interleaved exports from two concurrent writers could
//! otherwise leave a half-written or out-of-date snapshot on disk. Queries
//! take the read lock only and may run concurrently with each other; they
//! observe a possibly-stale-but-consistent collection state.
//!
//! The snapshot itself is written to a temp file in the target directory and
//! renamed into place, so concurrent readers of the file never observe a
//! partial write.

use crate::embed::Embedder;
use crate::error::KbError;
use crate::types::{Chunk, QueryResult, VectorRecord};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// In-memory record collection with id-addressed upsert.
///
/// Insertion order is retained: query ties break toward earlier-inserted
/// records, and re-adding an id overwrites in place without reordering.
#[derive(Default)]
struct Collection {
    records: Vec<VectorRecord>,
    by_id: HashMap<String, usize>,
}

impl Collection {
    fn upsert(&mut self, record: VectorRecord) {
        match self.by_id.get(&record.id) {
            Some(&slot) => self.records[slot] = record,
            None => {
                self.by_id.insert(record.id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// Owns the embedding function, the collection, and snapshot persistence.
pub struct VectorStoreManager {
    embedder: Arc<dyn Embedder>,
    snapshot_path: PathBuf,
    collection: RwLock<Collection>,
    /// Serialises mutate+export sequences (single-writer discipline).
    writer: Mutex<()>,
}

impl VectorStoreManager {
    /// Open the store, loading an existing snapshot when present.
    pub async fn open(
        embedder: Arc<dyn Embedder>,
        snapshot_path: impl Into<PathBuf>,
    ) -> Result<Self, KbError> {
        let snapshot_path = snapshot_path.into();
        let mut collection = Collection::default();

        match tokio::fs::read(&snapshot_path).await {
            Ok(bytes) => {
                let records: Vec<VectorRecord> =
                    serde_json::from_slice(&bytes).map_err(|e| KbError::Internal(format!(
                        "corrupt snapshot '{}': {e}",
                        snapshot_path.display()
                    )))?;
                info!(
                    "Loaded snapshot '{}': {} records",
                    snapshot_path.display(),
                    records.len()
                );
                for record in records {
                    collection.upsert(record);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "No snapshot at '{}', starting empty",
                    snapshot_path.display()
                );
            }
            Err(e) => {
                return Err(KbError::Internal(format!(
                    "read snapshot '{}': {e}",
                    snapshot_path.display()
                )));
            }
        }

        Ok(Self {
            embedder,
            snapshot_path,
            collection: RwLock::new(collection),
            writer: Mutex::new(()),
        })
    }

    /// Number of records currently in the collection.
    pub async fn count(&self) -> usize {
        self.collection.read().await.len()
    }

    /// Embed `chunks`, upsert them into the collection, and export a fresh
    /// snapshot.
    ///
    /// Embedding failure is fatal to the call and leaves both the collection
    /// and the snapshot untouched. Snapshot export failure is fatal and
    /// surfaced; it is never silently retried here.
    pub async fn add_chunks(&self, chunks: &[Chunk]) -> Result<(), KbError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let contents: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed(&contents).await?;
        if embeddings.len() != chunks.len() {
            return Err(KbError::EmbeddingFailed {
                detail: format!(
                    "embedder returned {} vectors for {} chunks",
                    embeddings.len(),
                    chunks.len()
                ),
            });
        }

        // Single writer past this point: mutation and export must not
        // interleave with another add_chunks call.
        let _writer = self.writer.lock().await;

        {
            let mut collection = self.collection.write().await;
            for (chunk, embedding) in chunks.iter().zip(embeddings) {
                collection.upsert(VectorRecord {
                    id: chunk.id.clone(),
                    embedding,
                    content: chunk.content.clone(),
                    metadata: chunk.metadata.clone(),
                });
            }
        }

        self.export_snapshot().await?;
        debug!("Added {} chunks and exported snapshot", chunks.len());
        Ok(())
    }

    /// Rank the collection against `text`.
    ///
    /// `limit` is clamped to the collection size; only records with
    /// `similarity ≥ threshold` are returned, ordered by similarity
    /// descending. Ties break toward earlier insertion (a convention of this
    /// implementation, not a portable guarantee).
    pub async fn query(
        &self,
        text: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<QueryResult>, KbError> {
        let embeddings = self.embedder.embed(&[text.to_string()]).await?;
        let query_vector = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| KbError::EmbeddingFailed {
                detail: "embedder returned no vector for query".into(),
            })?;

        let collection = self.collection.read().await;
        let limit = limit.min(collection.len());

        let mut scored: Vec<(f32, &VectorRecord)> = collection
            .records
            .iter()
            .map(|record| (cosine_similarity(&query_vector, &record.embedding), record))
            .collect();

        // Stable sort keeps insertion order for equal scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let results = scored
            .into_iter()
            .filter(|(score, _)| *score >= threshold)
            .take(limit)
            .map(|(score, record)| QueryResult {
                id: record.id.clone(),
                similarity: score,
                content: record.content.clone(),
            })
            .collect();

        Ok(results)
    }

    /// Write the full collection to the snapshot path, temp-then-rename.
    async fn export_snapshot(&self) -> Result<(), KbError> {
        let json = {
            let collection = self.collection.read().await;
            serde_json::to_vec(&collection.records)
                .map_err(|e| KbError::Internal(format!("serialise snapshot: {e}")))?
        };

        let path = &self.snapshot_path;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    KbError::SnapshotWriteFailed {
                        path: path.clone(),
                        source: e,
                    }
                })?;
            }
        }

        let tmp_path = snapshot_tmp_path(path);
        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|e| KbError::SnapshotWriteFailed {
                path: path.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| KbError::SnapshotWriteFailed {
                path: path.clone(),
                source: e,
            })?;

        Ok(())
    }
}

/// Sibling temp path used for the atomic snapshot write.
fn snapshot_tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    name.push_str(".tmp");
    path.with_file_name(name)
}

/// Cosine similarity clamped to `[0, 1]`.
///
/// Raw cosine ranges over `[-1, 1]`; anti-aligned vectors are no better than
/// orthogonal ones for retrieval, so negatives clamp to zero and the
/// documented score contract holds for any embedding model.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkMetadata, ContentType};
    use async_trait::async_trait;

    /// Deterministic embedder: known texts map to fixed unit vectors, so
    /// cosine against the "query" axis is exactly the first component.
    struct StubEmbedder;

    fn vector_for(text: &str) -> Vec<f32> {
        match text {
            "query" => vec![1.0, 0.0, 0.0],
            "close match" => vec![0.95, (1.0f32 - 0.95 * 0.95).sqrt(), 0.0],
            "weak match" => vec![0.4, (1.0f32 - 0.4 * 0.4).sqrt(), 0.0],
            "orthogonal" => vec![0.0, 1.0, 0.0],
            _ => vec![0.0, 0.0, 1.0],
        }
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, KbError> {
            Ok(inputs.iter().map(|t| vector_for(t)).collect())
        }
    }

    fn chunk(content: &str) -> Chunk {
        Chunk {
            id: crate::pipeline::chunk::chunk_id(content),
            content: content.to_string(),
            metadata: ChunkMetadata {
                page: 0,
                total_pages: 1,
                source_path: "doc.pdf".to_string(),
                content_type: ContentType::Text,
            },
        }
    }

    async fn store_in(dir: &Path) -> VectorStoreManager {
        VectorStoreManager::open(Arc::new(StubEmbedder), dir.join("kb.json"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn threshold_keeps_only_close_matches() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;
        store
            .add_chunks(&[chunk("close match"), chunk("weak match")])
            .await
            .unwrap();

        let results = store.query("query", 10, 0.9).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "close match");
        assert!(results[0].similarity >= 0.9);
    }

    #[tokio::test]
    async fn all_results_meet_the_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;
        store
            .add_chunks(&[chunk("close match"), chunk("weak match"), chunk("orthogonal")])
            .await
            .unwrap();

        let results = store.query("query", 10, 0.3).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.similarity >= 0.3));
    }

    #[tokio::test]
    async fn limit_is_clamped_to_collection_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;
        let chunks: Vec<Chunk> = (0..5).map(|i| chunk(&format!("record {i}"))).collect();
        store.add_chunks(&chunks).await.unwrap();

        let results = store.query("query", 1000, 0.0).await.unwrap();
        assert_eq!(results.len(), 5);
    }

    #[tokio::test]
    async fn results_are_ranked_descending_with_insertion_ties() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;
        // Two equal-scored records ("record a"/"record b" share a vector)
        // around one strong match.
        store
            .add_chunks(&[chunk("record a"), chunk("close match"), chunk("record b")])
            .await
            .unwrap();

        let results = store.query("query", 10, 0.0).await.unwrap();
        assert_eq!(results[0].content, "close match");
        assert_eq!(results[1].content, "record a");
        assert_eq!(results[2].content, "record b");
    }

    #[tokio::test]
    async fn re_adding_the_same_content_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;
        store.add_chunks(&[chunk("close match")]).await.unwrap();
        store.add_chunks(&[chunk("close match")]).await.unwrap();

        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn snapshot_round_trips_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = store_in(dir.path()).await;
            store
                .add_chunks(&[chunk("close match"), chunk("weak match")])
                .await
                .unwrap();
        }

        let reopened = store_in(dir.path()).await;
        assert_eq!(reopened.count().await, 2);

        let results = reopened.query("query", 10, 0.9).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "close match");
    }

    #[tokio::test]
    async fn no_stray_temp_file_after_export() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;
        store.add_chunks(&[chunk("record")]).await.unwrap();

        assert!(dir.path().join("kb.json").exists());
        assert!(!dir.path().join("kb.json.tmp").exists());
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        // Anti-aligned clamps to zero rather than going negative.
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        // Zero vectors and mismatched dimensions are inert.
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
