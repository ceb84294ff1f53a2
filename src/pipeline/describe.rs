//! Image description: send an extracted page image to a multimodal model.
//!
//! This is the pipeline's only tolerant failure path. Extraction of page
//! text is fatal when it fails; a failed description call merely drops that
//! page's image contribution, so the trait's error is recovered by the
//! processor, not propagated.
//!
//! Images travel as base64 data URIs inside the JSON request body — the
//! format every OpenAI-compatible vision endpoint accepts.

use crate::config::KbConfig;
use crate::error::KbError;
use crate::prompts::IMAGE_ANALYSIS_PROMPT;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tracing::debug;

/// Produces a text description of an extracted image.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    /// Describe the image at `path`. An empty return value is treated by the
    /// processor the same as no image.
    async fn describe(&self, path: &Path) -> Result<String, KbError>;
}

/// OpenAI-compatible chat-completions [`ImageDescriber`].
pub struct VisionDescriber {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl VisionDescriber {
    /// Build a describer from the shared configuration.
    pub fn from_config(config: &KbConfig) -> Result<Self, KbError> {
        let client = reqwest::Client::builder()
            .timeout(config.api_timeout)
            .build()
            .map_err(|e| KbError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            api_key: config.resolve_api_key(),
            model: config.vision_model.clone(),
            temperature: config.vision_temperature,
            max_tokens: config.vision_max_tokens,
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl ImageDescriber for VisionDescriber {
    async fn describe(&self, path: &Path) -> Result<String, KbError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| KbError::ImageModelFailed {
                detail: format!("read '{}': {e}", path.display()),
            })?;

        let data_uri = format!(
            "data:{};base64,{}",
            detect_mime(&bytes),
            STANDARD.encode(&bytes)
        );

        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "image_url", "image_url": { "url": data_uri } },
                    { "type": "text", "text": IMAGE_ANALYSIS_PROMPT },
                ],
            }],
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| KbError::ImageModelFailed {
            detail: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(KbError::ImageModelFailed {
                detail: format!("HTTP {status}: {detail}"),
            });
        }

        let parsed: ChatResponse =
            response.json().await.map_err(|e| KbError::ImageModelFailed {
                detail: format!("malformed response: {e}"),
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        debug!(
            "Described '{}' → {} chars",
            path.display(),
            content.len()
        );
        Ok(content)
    }
}

/// Sniff the image MIME type from magic bytes, defaulting to PNG.
///
/// Only the formats the extractor actually writes need recognising.
fn detect_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_png_magic() {
        assert_eq!(detect_mime(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A]), "image/png");
    }

    #[test]
    fn detects_jpeg_magic() {
        assert_eq!(detect_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
    }

    #[test]
    fn unknown_magic_falls_back_to_png() {
        assert_eq!(detect_mime(b"GIF89a"), "image/png");
    }
}
