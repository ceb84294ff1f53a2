//! Error types for the pdfrag library.
//!
//! All failures surface as one [`KbError`], grouped into four categories the
//! ingestion pipeline treats differently:
//!
//! * **Validation** — bad input, rejected before any side effect.
//! * **Extraction** — the native rendering engine failed or could not be
//!   acquired; fatal to the whole upload (partial ingestion is never
//!   committed).
//! * **Upstream** — a remote model call failed. Fatal when it is the
//!   embedding call; recovered locally when it is the per-page image
//!   description (that page keeps only its text).
//! * **Persistence** — a snapshot export, raw-file write, or registry write
//!   failed. Always fatal, never retried by this layer.
//!
//! Callers that only care about the category can branch on
//! [`KbError::kind`] instead of matching every variant.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdfrag library.
#[derive(Debug, Error)]
pub enum KbError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The uploaded file does not carry a `.pdf` extension.
    #[error("'{filename}' is not a PDF file\nOnly .pdf uploads are accepted.")]
    NotAPdf { filename: String },

    /// The uploaded bytes do not start with the `%PDF` magic.
    #[error("'{filename}' does not look like a PDF (bad magic bytes: {magic:?})")]
    BadMagic { filename: String, magic: [u8; 4] },

    /// A query was submitted with empty or whitespace-only text.
    #[error("Query text is empty")]
    EmptyQuery,

    /// Extraction produced no text and no usable image description.
    #[error("Document '{path}' produced no extractable content")]
    EmptyDocument { path: PathBuf },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Extraction errors ─────────────────────────────────────────────────
    /// Acquiring an engine worker from the pool timed out.
    ///
    /// The pool is intentionally small (the native engine instances are
    /// heavyweight); a timeout here is reported, not retried.
    #[error("No rendering engine worker became available within {waited_ms}ms")]
    EngineUnavailable { waited_ms: u64 },

    /// The native engine could not open the document.
    #[error("Failed to open PDF '{path}': {detail}")]
    DocumentOpenFailed { path: PathBuf, detail: String },

    /// The native engine failed while extracting a single page.
    #[error("Extraction failed for page {page}: {detail}")]
    PageExtractionFailed { page: usize, detail: String },

    // ── Upstream errors ───────────────────────────────────────────────────
    /// The remote embedding call failed.
    #[error("Embedding request failed: {detail}")]
    EmbeddingFailed { detail: String },

    /// The remote multimodal model call failed.
    ///
    /// Recovered locally during ingestion: the page's image contribution is
    /// dropped and the text path continues.
    #[error("Image description request failed: {detail}")]
    ImageModelFailed { detail: String },

    // ── Persistence errors ────────────────────────────────────────────────
    /// Could not persist the uploaded file to the storage directory.
    #[error("Failed to write '{path}': {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not export the vector collection snapshot.
    #[error("Failed to export snapshot to '{path}': {source}")]
    SnapshotWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file registry rejected a write or read.
    #[error("Registry operation failed: {detail}")]
    RegistryFailed { detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a panicked blocking task).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The four-way failure taxonomy, plus a bucket for internal faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Extraction,
    Upstream,
    Persistence,
    Internal,
}

impl KbError {
    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KbError::NotAPdf { .. }
            | KbError::BadMagic { .. }
            | KbError::EmptyQuery
            | KbError::EmptyDocument { .. }
            | KbError::InvalidConfig(_) => ErrorKind::Validation,
            KbError::EngineUnavailable { .. }
            | KbError::DocumentOpenFailed { .. }
            | KbError::PageExtractionFailed { .. } => ErrorKind::Extraction,
            KbError::EmbeddingFailed { .. } | KbError::ImageModelFailed { .. } => {
                ErrorKind::Upstream
            }
            KbError::FileWriteFailed { .. }
            | KbError::SnapshotWriteFailed { .. }
            | KbError::RegistryFailed { .. } => ErrorKind::Persistence,
            KbError::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_kind() {
        let e = KbError::NotAPdf {
            filename: "notes.docx".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Validation);
        assert!(e.to_string().contains("notes.docx"));
    }

    #[test]
    fn extraction_kind_includes_pool_timeout() {
        let e = KbError::EngineUnavailable { waited_ms: 30_000 };
        assert_eq!(e.kind(), ErrorKind::Extraction);
        assert!(e.to_string().contains("30000ms"));
    }

    #[test]
    fn upstream_kind() {
        let e = KbError::EmbeddingFailed {
            detail: "HTTP 503".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Upstream);
    }

    #[test]
    fn persistence_kind() {
        let e = KbError::SnapshotWriteFailed {
            path: PathBuf::from("/data/kb.json"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(e.kind(), ErrorKind::Persistence);
        assert!(e.to_string().contains("/data/kb.json"));
    }

    #[test]
    fn page_extraction_display() {
        let e = KbError::PageExtractionFailed {
            page: 3,
            detail: "render glitch".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("page 3"), "got: {msg}");
        assert!(msg.contains("render glitch"));
    }
}
