//! Concurrent page processing: fan out one task per page, fan in ordered
//! results.
//!
//! ## Cancellation model
//!
//! Page futures are driven through `buffer_unordered` and collected with
//! `try_collect`: the first page error stops polling and drops the stream,
//! which drops every in-flight and not-yet-started future. Dropping a future
//! is cancellation in Rust, so cancel-on-first-error falls out of the
//! combinator choice — no task handles or kill signals to manage. Results
//! completed before the failure are discarded with the stream, never
//! partially persisted.
//!
//! ## Ordering
//!
//! Completion order is non-deterministic under concurrency. The emitted
//! sequence is sorted by page index after fan-in — an explicit step the
//! chunk assembler relies on, never an accident of scheduling.

use crate::error::KbError;
use crate::pipeline::describe::ImageDescriber;
use crate::pipeline::extract::{Document, PageExtractor};
use crate::types::PageResult;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// Extract every page of `document` concurrently.
///
/// `concurrency` bounds in-flight page tasks and should match the engine
/// pool size — oversubscribing the engine only queues tasks on its
/// semaphore.
///
/// A failed page extraction aborts the whole call. A failed image
/// description is tolerated: the page keeps its text and the failure is
/// logged.
pub async fn process_document(
    extractor: &Arc<dyn PageExtractor>,
    describer: &Arc<dyn ImageDescriber>,
    document: &Document,
    concurrency: usize,
) -> Result<Vec<PageResult>, KbError> {
    let total_pages = document.page_count;

    let mut pages: Vec<PageResult> = stream::iter((0..total_pages).map(|page_index| {
        let extractor = Arc::clone(extractor);
        let describer = Arc::clone(describer);
        async move {
            let content = extractor.extract_page(document, page_index).await?;

            let mut image_description = None;
            if let Some(ref image_path) = content.image_path {
                match describer.describe(image_path).await {
                    Ok(description) if !description.trim().is_empty() => {
                        image_description = Some(description);
                    }
                    Ok(_) => {
                        debug!("Page {}: empty image description, dropped", page_index);
                    }
                    Err(e) => {
                        warn!(
                            "Page {}: image description failed, keeping text only — {}",
                            page_index, e
                        );
                    }
                }
            }

            Ok::<_, KbError>(PageResult {
                page_index,
                total_pages,
                text: content.text,
                image_description,
            })
        }
    }))
    .buffer_unordered(concurrency.max(1))
    .try_collect()
    .await?;

    pages.sort_by_key(|p| p.page_index);

    debug!(
        "Processed {} pages ({} with image descriptions)",
        pages.len(),
        pages.iter().filter(|p| p.has_image()).count()
    );

    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extract::PageContent;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Extractor double: per-page text, optional per-page delay and a page
    /// that always fails.
    struct ScriptedExtractor {
        texts: Vec<&'static str>,
        image_pages: Vec<usize>,
        failing_page: Option<usize>,
        started: AtomicUsize,
    }

    impl ScriptedExtractor {
        fn new(texts: Vec<&'static str>) -> Self {
            Self {
                texts,
                image_pages: vec![],
                failing_page: None,
                started: AtomicUsize::new(0),
            }
        }

        fn document(&self) -> Document {
            Document {
                path: PathBuf::from("/tmp/doc.pdf"),
                page_count: self.texts.len(),
            }
        }
    }

    #[async_trait]
    impl PageExtractor for ScriptedExtractor {
        async fn open(&self, path: &Path) -> Result<Document, KbError> {
            Ok(Document {
                path: path.to_path_buf(),
                page_count: self.texts.len(),
            })
        }

        async fn extract_page(
            &self,
            _document: &Document,
            page_index: usize,
        ) -> Result<PageContent, KbError> {
            self.started.fetch_add(1, Ordering::SeqCst);

            // Later pages finish first so completion order inverts page order.
            let delay = 20 * (self.texts.len() - page_index) as u64;
            tokio::time::sleep(Duration::from_millis(delay)).await;

            if self.failing_page == Some(page_index) {
                return Err(KbError::PageExtractionFailed {
                    page: page_index,
                    detail: "scripted failure".into(),
                });
            }

            Ok(PageContent {
                text: self.texts[page_index].to_string(),
                image_path: self
                    .image_pages
                    .contains(&page_index)
                    .then(|| PathBuf::from(format!("/tmp/p{page_index}.png"))),
            })
        }
    }

    struct StaticDescriber {
        response: Result<&'static str, ()>,
    }

    #[async_trait]
    impl ImageDescriber for StaticDescriber {
        async fn describe(&self, _path: &Path) -> Result<String, KbError> {
            match self.response {
                Ok(s) => Ok(s.to_string()),
                Err(()) => Err(KbError::ImageModelFailed {
                    detail: "scripted failure".into(),
                }),
            }
        }
    }

    fn describer(response: Result<&'static str, ()>) -> Arc<dyn ImageDescriber> {
        Arc::new(StaticDescriber { response })
    }

    #[tokio::test]
    async fn results_are_page_ordered_despite_completion_order() {
        let extractor = Arc::new(ScriptedExtractor::new(vec!["p0", "p1", "p2", "p3"]));
        let document = extractor.document();
        let extractor: Arc<dyn PageExtractor> = extractor;

        let pages = process_document(&extractor, &describer(Ok("")), &document, 4)
            .await
            .unwrap();

        let indices: Vec<usize> = pages.iter().map(|p| p.page_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(pages[2].text, "p2");
        assert!(pages.iter().all(|p| p.total_pages == 4));
    }

    #[tokio::test]
    async fn first_page_error_aborts_the_batch() {
        let mut scripted = ScriptedExtractor::new(vec!["p0", "p1", "p2"]);
        scripted.failing_page = Some(1);
        let document = scripted.document();
        let extractor: Arc<dyn PageExtractor> = Arc::new(scripted);

        let err = process_document(&extractor, &describer(Ok("")), &document, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, KbError::PageExtractionFailed { page: 1, .. }));
    }

    #[tokio::test]
    async fn failure_cancels_not_yet_started_pages() {
        let mut scripted = ScriptedExtractor::new(vec!["p0", "p1", "p2"]);
        scripted.failing_page = Some(0);
        let document = scripted.document();
        let scripted = Arc::new(scripted);
        let extractor: Arc<dyn PageExtractor> = Arc::clone(&scripted) as _;

        // With concurrency 1 the stream is polled strictly in order; after
        // page 0 fails, pages 1 and 2 must never start.
        let result = process_document(&extractor, &describer(Ok("")), &document, 1).await;
        assert!(result.is_err());
        assert_eq!(scripted.started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn description_failure_keeps_the_text_path() {
        let mut scripted = ScriptedExtractor::new(vec!["p0", "p1"]);
        scripted.image_pages = vec![1];
        let document = scripted.document();
        let extractor: Arc<dyn PageExtractor> = Arc::new(scripted);

        let pages = process_document(&extractor, &describer(Err(())), &document, 2)
            .await
            .unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].text, "p1");
        assert!(pages[1].image_description.is_none());
    }

    #[tokio::test]
    async fn successful_description_is_attached() {
        let mut scripted = ScriptedExtractor::new(vec!["p0", "p1"]);
        scripted.image_pages = vec![0];
        let document = scripted.document();
        let extractor: Arc<dyn PageExtractor> = Arc::new(scripted);

        let pages = process_document(&extractor, &describer(Ok("a bar chart")), &document, 2)
            .await
            .unwrap();

        assert_eq!(pages[0].image_description.as_deref(), Some("a bar chart"));
        assert!(pages[1].image_description.is_none());
    }
}
