//! Gemini (Google) synthesis backend.

use crate::backend::{SynthesisBackend, SynthesisRequest, SynthesizedImage};
use crate::error::{ArchiError, Result};
use crate::prompt::{self, Part};
use crate::types::{ImageFormat, UploadedImage};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Text model used for the preliminary style-DNA call.
const ANALYSIS_MODEL: &str = "gemini-2.5-flash";

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Gemini 2.5 Flash Image (fast, economical).
    FlashImage,
    /// Gemini 3 Pro Image (highest quality).
    #[default]
    ProImage,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlashImage => "gemini-2.5-flash-image",
            Self::ProImage => "gemini-3-pro-image-preview",
        }
    }
}

/// Builder for [`GeminiBackend`].
#[derive(Debug, Clone, Default)]
pub struct GeminiBackendBuilder {
    model: GeminiModel,
}

impl GeminiBackendBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the Gemini image model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Builds the backend.
    pub fn build(self) -> GeminiBackend {
        GeminiBackend {
            client: reqwest::Client::new(),
            model: self.model,
        }
    }
}

/// Gemini implementation of the synthesis boundary.
pub struct GeminiBackend {
    client: reqwest::Client,
    model: GeminiModel,
}

impl GeminiBackend {
    /// Creates a new `GeminiBackendBuilder`.
    pub fn builder() -> GeminiBackendBuilder {
        GeminiBackendBuilder::new()
    }

    async fn post(
        &self,
        credential: &str,
        model: &str,
        body: &GeminiRequest,
    ) -> Result<GeminiResponse> {
        let url = format!("{API_BASE}/{model}:generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", credential)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_remote_error(status.as_u16(), &text));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl SynthesisBackend for GeminiBackend {
    async fn synthesize(
        &self,
        credential: &str,
        request: &SynthesisRequest,
    ) -> Result<SynthesizedImage> {
        let body = GeminiRequest::for_synthesis(request);
        let response = self.post(credential, self.model.as_str(), &body).await?;

        let inline = response.into_inline_data()?;
        let data = base64::engine::general_purpose::STANDARD
            .decode(&inline.data)
            .map_err(|e| ArchiError::Decode(e.to_string()))?;
        let format = ImageFormat::from_mime_type(&inline.mime_type).unwrap_or_default();

        Ok(SynthesizedImage { data, format })
    }

    async fn analyze_style(&self, credential: &str, image: &UploadedImage) -> Result<String> {
        let body = GeminiRequest::for_analysis(image);
        let response = self.post(credential, ANALYSIS_MODEL, &body).await?;
        response.into_text()
    }
}

/// Maps a remote failure to a credential or transient error.
fn classify_remote_error(status: u16, text: &str) -> ArchiError {
    let message = if text.is_empty() {
        format!("HTTP {status}")
    } else {
        text.to_string()
    };

    if matches!(status, 401 | 402 | 403) {
        return ArchiError::Credential(message);
    }

    let lower = message.to_lowercase();
    if lower.contains("billing")
        || lower.contains("permission")
        || lower.contains("entitlement")
        || (lower.contains("consumer") && lower.contains("suspended"))
        || lower.contains("api key not valid")
    {
        return ArchiError::Credential(message);
    }

    ArchiError::Api { status, message }
}

// Wire types, camelCase per the Gemini REST surface.

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<GeminiImageConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiImageConfig {
    aspect_ratio: String,
    image_size: String,
}

impl GeminiRequest {
    fn wire_parts(parts: &[Part]) -> Vec<GeminiRequestPart> {
        parts
            .iter()
            .map(|part| match part {
                Part::Image { data, format } => GeminiRequestPart::InlineData {
                    inline_data: GeminiInlineData {
                        mime_type: format.mime_type().to_string(),
                        data: base64::engine::general_purpose::STANDARD.encode(data),
                    },
                },
                Part::Text { content } => GeminiRequestPart::Text {
                    text: content.clone(),
                },
            })
            .collect()
    }

    fn for_synthesis(request: &SynthesisRequest) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: Self::wire_parts(&request.parts),
            }],
            generation_config: Some(GeminiConfig {
                response_modalities: vec!["IMAGE".to_string()],
                image_config: Some(GeminiImageConfig {
                    aspect_ratio: request.aspect_ratio.as_str().to_string(),
                    image_size: request.image_size.as_str().to_string(),
                }),
                seed: request.seed,
            }),
        }
    }

    fn for_analysis(image: &UploadedImage) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiRequestPart::InlineData {
                        inline_data: GeminiInlineData {
                            mime_type: image.format.mime_type().to_string(),
                            data: base64::engine::general_purpose::STANDARD.encode(&image.data),
                        },
                    },
                    GeminiRequestPart::Text {
                        text: prompt::style_analysis_instruction().to_string(),
                    },
                ],
            }],
            generation_config: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl GeminiResponse {
    fn into_candidate(self) -> Result<GeminiCandidate> {
        if let Some(feedback) = &self.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                return Err(ArchiError::UnexpectedResponse(format!(
                    "prompt blocked: {reason}"
                )));
            }
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ArchiError::UnexpectedResponse("no candidates in response".into()))?;

        if let Some(reason) = &candidate.finish_reason {
            // STOP and MAX_TOKENS are normal terminations
            if !matches!(reason.as_str(), "STOP" | "MAX_TOKENS") {
                return Err(ArchiError::UnexpectedResponse(format!(
                    "generation stopped: {reason}"
                )));
            }
        }

        Ok(candidate)
    }

    fn into_inline_data(self) -> Result<InlineData> {
        let candidate = self.into_candidate()?;
        candidate
            .content
            .ok_or_else(|| ArchiError::UnexpectedResponse("no content in candidate".into()))?
            .parts
            .into_iter()
            .find_map(|p| p.inline_data)
            .ok_or_else(|| ArchiError::UnexpectedResponse("no image data in response".into()))
    }

    fn into_text(self) -> Result<String> {
        let candidate = self.into_candidate()?;
        candidate
            .content
            .ok_or_else(|| ArchiError::UnexpectedResponse("no content in candidate".into()))?
            .parts
            .into_iter()
            .find_map(|p| p.text.filter(|t| !t.is_empty()))
            .ok_or_else(|| ArchiError::UnexpectedResponse("no text in response".into()))
    }
}
