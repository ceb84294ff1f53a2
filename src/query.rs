//! Query engine: input validation in front of the vector store.
//!
//! Deliberately thin. The store already clamps the limit and applies the
//! similarity threshold; this layer only rejects empty query text before any
//! embedding call is made, and returns store results unchanged — no
//! re-ranking.

use crate::error::KbError;
use crate::store::VectorStoreManager;
use crate::types::QueryResult;
use std::sync::Arc;
use tracing::debug;

/// Validates and forwards similarity queries.
pub struct QueryEngine {
    store: Arc<VectorStoreManager>,
}

impl QueryEngine {
    pub fn new(store: Arc<VectorStoreManager>) -> Self {
        Self { store }
    }

    /// Run a similarity query.
    ///
    /// Fails with a validation error on empty or whitespace-only text; a
    /// threshold of 0 returns everything with non-negative similarity.
    pub async fn search(
        &self,
        text: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<QueryResult>, KbError> {
        if text.trim().is_empty() {
            return Err(KbError::EmptyQuery);
        }

        let results = self.store.query(text, limit, threshold).await?;
        debug!(
            "Query returned {} results (limit {}, threshold {})",
            results.len(),
            limit,
            threshold
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::Embedder;
    use async_trait::async_trait;

    struct NoopEmbedder;

    #[async_trait]
    impl Embedder for NoopEmbedder {
        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, KbError> {
            Ok(inputs.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn empty_text_is_rejected_before_any_call() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStoreManager::open(
            std::sync::Arc::new(NoopEmbedder),
            dir.path().join("kb.json"),
        )
        .await
        .unwrap();
        let engine = QueryEngine::new(Arc::new(store));

        for text in ["", "   ", "\n\t"] {
            let err = engine.search(text, 5, 0.0).await.unwrap_err();
            assert!(matches!(err, KbError::EmptyQuery), "text: {text:?}");
        }
    }

    #[tokio::test]
    async fn empty_collection_yields_empty_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStoreManager::open(
            std::sync::Arc::new(NoopEmbedder),
            dir.path().join("kb.json"),
        )
        .await
        .unwrap();
        let engine = QueryEngine::new(Arc::new(store));

        let results = engine.search("anything", 5, 0.0).await.unwrap();
        assert!(results.is_empty());
    }
}
