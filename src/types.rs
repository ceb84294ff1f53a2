//! Data model shared across the pipeline and the store.
//!
//! The pipeline owns [`PageResult`] and [`Chunk`] for the duration of one
//! upload; the vector store exclusively owns [`VectorRecord`]s. Everything
//! here is plain serialisable data — behaviour lives in the modules that
//! produce it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Extracted content of one page, before chunking.
///
/// Produced by the concurrent page processor, consumed by the chunk
/// assembler, discarded afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    /// Zero-based page index.
    pub page_index: usize,
    /// Page count of the source document.
    pub total_pages: usize,
    /// Extracted page text (may be empty for image-only pages).
    pub text: String,
    /// Description of the page's extracted image, when one was produced and
    /// the multimodal call succeeded.
    pub image_description: Option<String>,
}

impl PageResult {
    /// Whether this page contributed an image description.
    pub fn has_image(&self) -> bool {
        self.image_description.is_some()
    }
}

/// Which source span a chunk's first character came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
}

/// Metadata attached to every chunk and carried into the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Zero-based page the chunk starts on.
    pub page: usize,
    /// Page count of the source document.
    pub total_pages: usize,
    /// Path of the ingested file on durable storage.
    pub source_path: String,
    /// Whether the chunk starts inside page text or an image description.
    pub content_type: ContentType,
}

/// A bounded, overlapping span of extracted document text.
///
/// `id` is a digest of `content` alone: two chunks with byte-identical
/// content get the same id even across different source documents. This is
/// an intentional global dedup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// The persisted unit inside the vector collection, one-to-one with a chunk.
///
/// Never mutated in place; re-adding the same id overwrites the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// One ranked similarity match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: String,
    /// Cosine similarity clamped to `[0, 1]`; higher is closer.
    pub similarity: f32,
    pub content: String,
}

/// A registry row for one ingested file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: u64,
    pub path: PathBuf,
    /// Re-extracted full text, populated only by content-bearing listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Returned by a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Registry id assigned to the file.
    pub id: u64,
    /// Pages processed.
    pub pages: usize,
    /// Chunks added to the vector collection.
    pub chunks: usize,
}
