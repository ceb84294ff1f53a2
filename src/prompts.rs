//! Prompts for the multimodal image-description call.
//!
//! Centralising the prompt here keeps it a single source of truth and lets
//! unit tests inspect it without a live model call.

/// Default prompt sent alongside each extracted page image.
///
/// The two-task structure (transcribe, then describe) makes the response
/// useful as retrieval text: embedded figures often carry labels and axis
/// text that plain page-text extraction misses.
pub const IMAGE_ANALYSIS_PROMPT: &str = "\
The attachment above is an image extracted from a document page. Perform two tasks:
1. If the image contains any text, extract and return all visible text.
2. Describe in detail what the image shows.

Return the result in this format:
Image text: [all text in the image, or \"no text\" if none]
Image description: [a detailed description of the image content]";
