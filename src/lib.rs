//! # pdfrag
//!
//! Ingest PDF documents into a searchable vector index and serve similarity
//! queries against it.
//!
//! ## Why this crate?
//!
//! Retrieval pipelines live or die on their ingestion path: per-page
//! extraction has to run concurrently against a rendering engine with a
//! small, fixed worker pool, page ordering must survive unordered task
//! completion, identical content must deduplicate across documents, and the
//! on-disk snapshot must stay consistent with the in-memory index under
//! concurrent writes. This crate packages those contracts behind a small
//! service facade with every dependency injected at construction time.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF upload
//!  │
//!  ├─ 1. Validate  extension + %PDF magic, before any side effect
//!  ├─ 2. Persist   raw file into the storage directory
//!  ├─ 3. Extract   one task per page via pdfium (bounded engine pool,
//!  │               cancel-on-first-error, explicit page-order sort)
//!  ├─ 4. Describe  per-page extracted image → multimodal model (tolerant)
//!  ├─ 5. Chunk     sliding window, 500 chars / 100 overlap, SHA-256 ids
//!  ├─ 6. Index     embed chunks, upsert, export snapshot (single writer)
//!  └─ 7. Register  file id assigned last — registered ⇒ searchable
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfrag::{InMemoryRegistry, KbConfig, KnowledgeService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = KbConfig::builder()
//!         .storage_dir("data/files")
//!         .snapshot_path("data/kb.json")
//!         .build()?;
//!
//!     let registry = Arc::new(InMemoryRegistry::new());
//!     let service = KnowledgeService::from_config(config, registry).await?;
//!
//!     let bytes = std::fs::read("report.pdf")?;
//!     let receipt = service.upload("report.pdf", &bytes).await?;
//!     println!("file {}: {} chunks indexed", receipt.id, receipt.chunks);
//!
//!     for hit in service.query("quarterly revenue", 5, 0.3).await? {
//!         println!("{:.3}  {}", hit.similarity, hit.content);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfrag` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdfrag = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod embed;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod query;
pub mod registry;
pub mod service;
pub mod store;
pub mod types;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{KbConfig, KbConfigBuilder};
pub use embed::{Embedder, OpenAiEmbedder};
pub use error::{ErrorKind, KbError};
pub use pipeline::chunk::{assemble_chunks, chunk_id};
pub use pipeline::describe::{ImageDescriber, VisionDescriber};
pub use pipeline::extract::{Document, EnginePool, PageContent, PageExtractor, PdfiumExtractor};
pub use pipeline::process::process_document;
pub use query::QueryEngine;
pub use registry::{FileRegistry, InMemoryRegistry};
pub use service::KnowledgeService;
pub use store::VectorStoreManager;
pub use types::{
    Chunk, ChunkMetadata, ContentType, FileRecord, PageResult, QueryResult, UploadReceipt,
    VectorRecord,
};
