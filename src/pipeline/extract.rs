//! Page extraction: per-page text and raster images via pdfium, behind a
//! bounded engine pool.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto a dedicated
//! thread pool, preventing the Tokio worker threads from stalling during
//! CPU-heavy extraction.
//!
//! ## Why a pool with a timeout?
//!
//! pdfium worker instances are heavyweight; the pool bounds how many page
//! tasks touch the engine at once. Page tasks beyond the pool size queue on
//! the semaphore. A task that cannot acquire a worker within the configured
//! timeout fails with [`KbError::EngineUnavailable`] — reported, never
//! retried at this layer.
//!
//! The pdfium document itself is opened and closed inside each blocking
//! call: release is structural on every exit path, success or error, rather
//! than deferred to a finaliser.

use crate::error::KbError;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// A validated handle to one openable document.
///
/// Owned by the upload (or listing) call that opened it; carries the page
/// count established at open time so per-page tasks can be bounded up front.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub page_count: usize,
}

/// Raw content extracted from a single page.
#[derive(Debug, Clone)]
pub struct PageContent {
    /// The page's text, in reading order as reported by the engine.
    pub text: String,
    /// Path of the page's extracted raster image, if one was found.
    pub image_path: Option<PathBuf>,
}

/// Extracts per-page content from a document.
///
/// The trait seam exists so the concurrent processor and the service can be
/// exercised with test doubles; production code uses [`PdfiumExtractor`].
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Open `path`, validating it and counting pages.
    async fn open(&self, path: &Path) -> Result<Document, KbError>;

    /// Extract text and at most one image from `page_index`.
    ///
    /// Preconditions: `document` was returned by [`PageExtractor::open`] and
    /// `page_index < document.page_count`. May write an extracted image file
    /// into the configured image directory.
    async fn extract_page(
        &self,
        document: &Document,
        page_index: usize,
    ) -> Result<PageContent, KbError>;
}

/// Bounded pool of native engine workers.
///
/// Wraps a semaphore sized to the engine's real concurrency; every blocking
/// pdfium call runs under one permit.
pub struct EnginePool {
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
}

impl EnginePool {
    pub fn new(workers: usize, acquire_timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            acquire_timeout,
        }
    }

    /// Run `op` on the blocking pool under an engine permit.
    ///
    /// Waits at most `acquire_timeout` for a permit; expiry maps to
    /// [`KbError::EngineUnavailable`].
    pub async fn run<T, F>(&self, op: F) -> Result<T, KbError>
    where
        F: FnOnce() -> Result<T, KbError> + Send + 'static,
        T: Send + 'static,
    {
        let permit = tokio::time::timeout(
            self.acquire_timeout,
            Arc::clone(&self.permits).acquire_owned(),
        )
        .await
        .map_err(|_| KbError::EngineUnavailable {
            waited_ms: self.acquire_timeout.as_millis() as u64,
        })?
        .map_err(|_| KbError::Internal("engine pool closed".into()))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            op()
        })
        .await
        .map_err(|e| KbError::Internal(format!("Extraction task panicked: {e}")))?
    }
}

/// pdfium-backed [`PageExtractor`].
pub struct PdfiumExtractor {
    pool: Arc<EnginePool>,
    image_dir: PathBuf,
}

impl PdfiumExtractor {
    /// Create an extractor writing page images into `image_dir`.
    pub fn new(pool: Arc<EnginePool>, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            image_dir: image_dir.into(),
        }
    }
}

#[async_trait]
impl PageExtractor for PdfiumExtractor {
    async fn open(&self, path: &Path) -> Result<Document, KbError> {
        let path = path.to_path_buf();
        let document = self
            .pool
            .run(move || {
                let pdfium = Pdfium::default();
                let doc = pdfium.load_pdf_from_file(&path, None).map_err(|e| {
                    KbError::DocumentOpenFailed {
                        path: path.clone(),
                        detail: format!("{e:?}"),
                    }
                })?;
                let page_count = doc.pages().len() as usize;
                Ok(Document { path, page_count })
            })
            .await?;

        info!(
            "Opened '{}': {} pages",
            document.path.display(),
            document.page_count
        );
        Ok(document)
    }

    async fn extract_page(
        &self,
        document: &Document,
        page_index: usize,
    ) -> Result<PageContent, KbError> {
        let path = document.path.clone();
        let image_dir = self.image_dir.clone();

        self.pool
            .run(move || extract_page_blocking(&path, page_index, &image_dir))
            .await
    }
}

/// Blocking implementation of single-page extraction.
fn extract_page_blocking(
    pdf_path: &Path,
    page_index: usize,
    image_dir: &Path,
) -> Result<PageContent, KbError> {
    let pdfium = Pdfium::default();

    let document =
        pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| KbError::DocumentOpenFailed {
                path: pdf_path.to_path_buf(),
                detail: format!("{e:?}"),
            })?;

    let page = document
        .pages()
        .get(page_index as u16)
        .map_err(|e| KbError::PageExtractionFailed {
            page: page_index,
            detail: format!("{e:?}"),
        })?;

    let text = page
        .text()
        .map_err(|e| KbError::PageExtractionFailed {
            page: page_index,
            detail: format!("{e:?}"),
        })?
        .all();

    let image_path = extract_first_image(&page, pdf_path, page_index, image_dir)?;

    debug!(
        "Extracted page {}: {} chars, image: {}",
        page_index,
        text.len(),
        image_path.is_some()
    );

    Ok(PageContent { text, image_path })
}

/// Write the page's first raster image object to `image_dir` as a PNG.
///
/// Pages without image objects return `Ok(None)`. An image object whose
/// pixel data cannot be decoded is skipped rather than failing the page:
/// the text path is the primary extraction product.
fn extract_first_image(
    page: &PdfPage,
    pdf_path: &Path,
    page_index: usize,
    image_dir: &Path,
) -> Result<Option<PathBuf>, KbError> {
    for object in page.objects().iter() {
        let Some(image_object) = object.as_image_object() else {
            continue;
        };
        let Ok(image) = image_object.get_raw_image() else {
            debug!("Skipping undecodable image object on page {}", page_index);
            continue;
        };

        let stem = pdf_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let out = image_dir.join(format!("{stem}_p{page_index}.png"));

        std::fs::create_dir_all(image_dir).map_err(|e| KbError::FileWriteFailed {
            path: image_dir.to_path_buf(),
            source: e,
        })?;
        image
            .save_with_format(&out, image::ImageFormat::Png)
            .map_err(|e| KbError::PageExtractionFailed {
                page: page_index,
                detail: format!("image write failed: {e}"),
            })?;

        debug!("Extracted image from page {} → {}", page_index, out.display());
        return Ok(Some(out));
    }

    Ok(None)
}
