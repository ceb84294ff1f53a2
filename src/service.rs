//! The knowledge service: upload, query, and list over injected parts.
//!
//! Every dependency — extractor, describer, registry, store — arrives
//! through the constructor. No global repository or engine-pool state: test
//! doubles slot in at each seam and initialisation order is explicit.
//!
//! ## Upload ordering
//!
//! Validation happens before any side effect. After validation the side
//! effects run in dependency order: raw file persisted, chunks embedded and
//! snapshot exported, registry entry written **last**. A failure at any step
//! leaves no registry entry, so a registered file is always fully
//! searchable. (The reverse order would allow a crash to leave a registered
//! file with no indexed content; indexed-but-unregistered content from the
//! chosen order is healed by re-upload, since chunk ids are
//! content-addressed and re-adding overwrites.)

use crate::config::KbConfig;
use crate::error::KbError;
use crate::pipeline::describe::{ImageDescriber, VisionDescriber};
use crate::pipeline::extract::{EnginePool, PageExtractor, PdfiumExtractor};
use crate::pipeline::{chunk, process};
use crate::query::QueryEngine;
use crate::registry::FileRegistry;
use crate::store::VectorStoreManager;
use crate::types::{FileRecord, QueryResult, UploadReceipt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Facade over the ingestion pipeline and the retrieval path.
pub struct KnowledgeService {
    config: KbConfig,
    extractor: Arc<dyn PageExtractor>,
    describer: Arc<dyn ImageDescriber>,
    registry: Arc<dyn FileRegistry>,
    store: Arc<VectorStoreManager>,
    query_engine: QueryEngine,
}

impl KnowledgeService {
    /// Assemble a service from explicit parts.
    pub fn new(
        config: KbConfig,
        extractor: Arc<dyn PageExtractor>,
        describer: Arc<dyn ImageDescriber>,
        registry: Arc<dyn FileRegistry>,
        store: Arc<VectorStoreManager>,
    ) -> Self {
        let query_engine = QueryEngine::new(Arc::clone(&store));
        Self {
            config,
            extractor,
            describer,
            registry,
            store,
            query_engine,
        }
    }

    /// Wire the production parts from configuration: pdfium extractor behind
    /// an engine pool, OpenAI-compatible describer and embedder, and a store
    /// loaded from the configured snapshot.
    pub async fn from_config(
        config: KbConfig,
        registry: Arc<dyn FileRegistry>,
    ) -> Result<Self, KbError> {
        let pool = Arc::new(EnginePool::new(
            config.engine_workers,
            config.engine_acquire_timeout,
        ));
        let extractor: Arc<dyn PageExtractor> =
            Arc::new(PdfiumExtractor::new(pool, config.storage_dir.clone()));
        let describer: Arc<dyn ImageDescriber> = Arc::new(VisionDescriber::from_config(&config)?);
        let embedder = Arc::new(crate::embed::OpenAiEmbedder::from_config(&config)?);
        let store = Arc::new(
            VectorStoreManager::open(embedder, config.snapshot_path.clone()).await?,
        );
        Ok(Self::new(config, extractor, describer, registry, store))
    }

    /// Ingest one PDF: persist it, extract and chunk its content, index the
    /// chunks, and register the file.
    ///
    /// All-or-nothing with respect to the registry: any failure after
    /// validation leaves no registry entry.
    pub async fn upload(&self, filename: &str, bytes: &[u8]) -> Result<UploadReceipt, KbError> {
        // Validation first, before any side effect.
        let extension_ok = Path::new(filename)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !extension_ok {
            return Err(KbError::NotAPdf {
                filename: filename.to_string(),
            });
        }
        if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
            let mut magic = [0u8; 4];
            magic[..bytes.len().min(4)].copy_from_slice(&bytes[..bytes.len().min(4)]);
            return Err(KbError::BadMagic {
                filename: filename.to_string(),
                magic,
            });
        }

        let dest = self.persist_upload(filename, bytes).await?;
        info!("Stored upload '{}' ({} bytes)", dest.display(), bytes.len());

        let document = self.extractor.open(&dest).await?;
        let pages = process::process_document(
            &self.extractor,
            &self.describer,
            &document,
            self.config.engine_workers,
        )
        .await?;

        let chunks = chunk::assemble_chunks(
            &pages,
            &dest.to_string_lossy(),
            self.config.chunk_size,
            self.config.chunk_overlap,
        )?;

        self.store.add_chunks(&chunks).await?;

        // Registry write is deliberately last: a registered file is always
        // fully searchable.
        let id = self.registry.save(&dest).await?;

        info!(
            "Ingested '{}': id {}, {} pages, {} chunks",
            dest.display(),
            id,
            document.page_count,
            chunks.len()
        );

        Ok(UploadReceipt {
            id,
            pages: document.page_count,
            chunks: chunks.len(),
        })
    }

    /// Similarity search over the indexed chunks.
    pub async fn query(
        &self,
        text: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<QueryResult>, KbError> {
        self.query_engine.search(text, limit, threshold).await
    }

    /// List registered files, optionally filtered by a comma-separated id
    /// list and optionally with their full re-extracted text.
    ///
    /// Content is read through, not cached: each request re-extracts the
    /// pages sequentially.
    pub async fn list(
        &self,
        id_filter: Option<&str>,
        with_content: bool,
    ) -> Result<Vec<FileRecord>, KbError> {
        let mut records = match id_filter {
            Some(filter) if !filter.trim().is_empty() => {
                let ids = parse_id_filter(filter);
                if ids.is_empty() {
                    // A filter was given but named no valid ids: nothing
                    // can match.
                    return Ok(Vec::new());
                }
                self.registry.list(&ids).await?
            }
            _ => self.registry.list(&[]).await?,
        };

        if with_content {
            for record in &mut records {
                record.content = Some(self.extract_full_text(&record.path).await?);
            }
        }

        Ok(records)
    }

    /// Write the uploaded bytes under the storage directory.
    async fn persist_upload(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, KbError> {
        // Only the final path component: an upload must not escape the
        // storage directory.
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "upload.pdf".into());

        tokio::fs::create_dir_all(&self.config.storage_dir)
            .await
            .map_err(|e| KbError::FileWriteFailed {
                path: self.config.storage_dir.clone(),
                source: e,
            })?;

        let dest = self.config.storage_dir.join(name);
        tokio::fs::write(&dest, bytes)
            .await
            .map_err(|e| KbError::FileWriteFailed {
                path: dest.clone(),
                source: e,
            })?;
        Ok(dest)
    }

    /// Sequentially rebuild the document text, page by page, appending any
    /// image description after its page's text.
    async fn extract_full_text(&self, path: &Path) -> Result<String, KbError> {
        let document = self.extractor.open(path).await?;

        let mut content = String::new();
        for page_index in 0..document.page_count {
            let page = self.extractor.extract_page(&document, page_index).await?;
            content.push_str(&page.text);

            if let Some(ref image_path) = page.image_path {
                match self.describer.describe(image_path).await {
                    Ok(description) => content.push_str(&description),
                    Err(e) => {
                        warn!(
                            "Page {} of '{}': image description failed during listing — {}",
                            page_index,
                            path.display(),
                            e
                        );
                    }
                }
            }
        }

        Ok(content)
    }
}

/// Parse a comma-separated id list, ignoring blanks and non-numeric entries.
fn parse_id_filter(filter: &str) -> Vec<u64> {
    filter
        .split(',')
        .filter_map(|part| part.trim().parse::<u64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_filter_parses_and_skips_junk() {
        assert_eq!(parse_id_filter("1,2,3"), vec![1, 2, 3]);
        assert_eq!(parse_id_filter(" 4 , 5 "), vec![4, 5]);
        assert_eq!(parse_id_filter("7,,x,8"), vec![7, 8]);
        assert!(parse_id_filter("").is_empty());
    }
}
