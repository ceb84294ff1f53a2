//! Pipeline stages for PDF ingestion.
//!
//! Each submodule implements exactly one transformation step. Keeping stages
//! separate makes each independently testable and lets us swap
//! implementations (e.g. a different rendering backend or vision model)
//! without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ extract ──▶ describe ──▶ process ──▶ chunk ──▶ store
//! (bytes)    (pdfium)    (vision VLM)  (fan-out/   (window   (embed +
//!                                      fan-in)     + digest)  snapshot)
//! ```
//!
//! 1. [`extract`]  — per-page text and image extraction against a bounded
//!    engine pool; runs in `spawn_blocking` because pdfium is not async-safe
//! 2. [`describe`] — the optional multimodal sub-call for pages that
//!    produced an image; the only tolerant failure path in the pipeline
//! 3. [`process`]  — concurrent fan-out of page tasks with
//!    cancel-on-first-error, followed by an explicit page-order sort
//! 4. [`chunk`]    — deterministic sliding-window chunking with
//!    content-addressed ids

pub mod chunk;
pub mod describe;
pub mod extract;
pub mod process;
