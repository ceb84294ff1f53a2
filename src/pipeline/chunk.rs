//! Chunk assembly: ordered page results → overlapping, content-addressed
//! chunks.
//!
//! Page texts and image descriptions are concatenated in page order into one
//! logical character stream, tagged per source span. A sliding window then
//! emits chunks of at most `chunk_size` characters, each sharing `overlap`
//! characters with its predecessor. Windows are character-based, so
//! multi-byte text never splits inside a code point.
//!
//! Chunk ids are a digest of the chunk text alone. Identical content gets an
//! identical id even across different source documents — re-ingesting shared
//! boilerplate overwrites rather than duplicates.

use crate::error::KbError;
use crate::types::{Chunk, ChunkMetadata, ContentType, PageResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Derive the content-addressed id for a chunk.
///
/// SHA-256 over the exact text, base64 URL-safe without padding: stable,
/// deterministic, and filesystem/URL-friendly.
pub fn chunk_id(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// One contiguous region of the concatenated stream.
struct Span {
    /// Character offset where the span starts.
    start: usize,
    page: usize,
    content_type: ContentType,
}

/// Split ordered page results into overlapping chunks.
///
/// `pages` must already be sorted by page index (the processor guarantees
/// this). Fails with a validation error when no page contributed any text or
/// image description.
pub fn assemble_chunks(
    pages: &[PageResult],
    source_path: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, KbError> {
    if overlap >= chunk_size {
        return Err(KbError::InvalidConfig(format!(
            "chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})"
        )));
    }

    let total_pages = pages.first().map_or(0, |p| p.total_pages);

    // Concatenate into one character stream, remembering where each
    // source span begins.
    let mut chars: Vec<char> = Vec::new();
    let mut spans: Vec<Span> = Vec::new();
    for page in pages {
        if !page.text.is_empty() {
            spans.push(Span {
                start: chars.len(),
                page: page.page_index,
                content_type: ContentType::Text,
            });
            chars.extend(page.text.chars());
        }
        if let Some(ref description) = page.image_description {
            if !description.is_empty() {
                spans.push(Span {
                    start: chars.len(),
                    page: page.page_index,
                    content_type: ContentType::Image,
                });
                chars.extend(description.chars());
            }
        }
    }

    if chars.is_empty() {
        return Err(KbError::EmptyDocument {
            path: PathBuf::from(source_path),
        });
    }

    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(chars.len());
        let content: String = chars[start..end].iter().collect();

        // The span owning the chunk's first character decides its tag.
        // The first span always starts at offset 0, so the search cannot
        // come up empty.
        let owner = spans
            .iter()
            .rev()
            .find(|s| s.start <= start)
            .unwrap_or(&spans[0]);

        chunks.push(Chunk {
            id: chunk_id(&content),
            content,
            metadata: ChunkMetadata {
                page: owner.page,
                total_pages,
                source_path: source_path.to_string(),
                content_type: owner.content_type,
            },
        });

        if end == chars.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}
