//! Synthesis backend boundary.
//!
//! The remote generative-image API is an opaque collaborator behind the
//! [`SynthesisBackend`] trait; test doubles implement it to simulate
//! responses and failures. The credential is an explicit argument so the
//! session owns resolution and backends stay stateless.

mod gemini;

pub use gemini::{GeminiBackend, GeminiBackendBuilder, GeminiModel};

use crate::error::Result;
use crate::prompt::Part;
use crate::ratio::AspectRatio;
use crate::types::{ImageFormat, ImageSize, UploadedImage};
use async_trait::async_trait;

/// A fully composed synthesis call.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    /// Ordered image/text parts, as built by the prompt composer.
    pub parts: Vec<Part>,
    /// Output aspect ratio, classified from the lineart dimensions.
    pub aspect_ratio: AspectRatio,
    /// Output resolution tier.
    pub image_size: ImageSize,
    /// Fixed random seed, when reproducibility is wanted.
    pub seed: Option<u64>,
}

/// The image unwrapped from a successful backend response.
#[derive(Debug, Clone)]
pub struct SynthesizedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Image format.
    pub format: ImageFormat,
}

/// Trait for remote synthesis collaborators.
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    /// Dispatches the main synthesis call and unwraps the returned image.
    async fn synthesize(
        &self,
        credential: &str,
        request: &SynthesisRequest,
    ) -> Result<SynthesizedImage>;

    /// Runs the preliminary style-DNA analysis call on a reference image.
    async fn analyze_style(&self, credential: &str, image: &UploadedImage) -> Result<String>;
}
