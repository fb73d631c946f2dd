//! Core types for the synthesis session.

use crate::error::{ArchiError, Result};
use crate::lineart;
use crate::ratio::AspectRatio;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::SystemTime;

/// Supported image formats for uploads and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Looks up a format by its MIME type.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(Self::Png),
            "image/jpeg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// The role an uploaded image plays in the synthesis prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageRole {
    /// User-supplied image whose color/material qualities are transferred.
    StyleReference,
    /// CAD-derived line drawing defining the fixed spatial layout.
    Lineart,
}

/// Render modes, selecting which images and prompt template are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderMode {
    /// Top-down plan rendering from lineart plus a style reference.
    #[default]
    Plan,
    /// Perspective/spatial rendering from lineart plus a style reference.
    Spatial,
    /// Single-image enhancement of an existing rendering.
    Enhance,
}

impl RenderMode {
    /// Returns true if this mode consumes a style-reference image.
    pub fn uses_style_reference(&self) -> bool {
        !matches!(self, Self::Enhance)
    }
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plan => write!(f, "plan"),
            Self::Spatial => write!(f, "spatial"),
            Self::Enhance => write!(f, "enhance"),
        }
    }
}

/// Output resolution tier accepted by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageSize {
    /// 1K output.
    #[default]
    #[serde(rename = "1K")]
    K1,
    /// 2K output.
    #[serde(rename = "2K")]
    K2,
    /// 4K output.
    #[serde(rename = "4K")]
    K4,
}

impl ImageSize {
    /// Returns the tier as the backend's string tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::K1 => "1K",
            Self::K2 => "2K",
            Self::K4 => "4K",
        }
    }
}

fn clamp_pct(value: i32) -> u8 {
    value.clamp(0, 100) as u8
}

/// Percentage sliders driving the prompt, mode-dependent.
///
/// Every value is clamped to [0, 100]; out-of-range inputs clamp rather
/// than error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SynthesisParameters {
    /// Plan/spatial modes: how strongly reference style is applied.
    Blend {
        /// Style infusion weight, 0-100.
        weight: u8,
    },
    /// Enhance mode sliders, each 0-100.
    Enhance {
        /// Material texture strength.
        texture: u8,
        /// Surface smoothing strength.
        smoothing: u8,
        /// Fine detail strength.
        detail: u8,
        /// Lighting adjustment strength.
        light: u8,
    },
}

impl SynthesisParameters {
    /// Returns the default sliders for the given mode (all midpoint).
    pub fn defaults_for(mode: RenderMode) -> Self {
        match mode {
            RenderMode::Plan | RenderMode::Spatial => Self::Blend { weight: 50 },
            RenderMode::Enhance => Self::Enhance {
                texture: 50,
                smoothing: 50,
                detail: 50,
                light: 50,
            },
        }
    }

    /// Builds blend parameters, clamping to [0, 100].
    pub fn blend(weight: i32) -> Self {
        Self::Blend {
            weight: clamp_pct(weight),
        }
    }

    /// Builds enhance parameters, clamping each value to [0, 100].
    pub fn enhance(texture: i32, smoothing: i32, detail: i32, light: i32) -> Self {
        Self::Enhance {
            texture: clamp_pct(texture),
            smoothing: clamp_pct(smoothing),
            detail: clamp_pct(detail),
            light: clamp_pct(light),
        }
    }

    /// Returns a copy with every value clamped to [0, 100].
    ///
    /// Variant fields are public, so a caller can build a literal that
    /// bypasses the clamping constructors; every write path normalizes
    /// through here.
    pub fn clamped(self) -> Self {
        match self {
            Self::Blend { weight } => Self::Blend {
                weight: weight.min(100),
            },
            Self::Enhance {
                texture,
                smoothing,
                detail,
                light,
            } => Self::Enhance {
                texture: texture.min(100),
                smoothing: smoothing.min(100),
                detail: detail.min(100),
                light: light.min(100),
            },
        }
    }

    /// Returns true if this parameter set belongs to the given mode.
    pub fn matches_mode(&self, mode: RenderMode) -> bool {
        match self {
            Self::Blend { .. } => mode.uses_style_reference(),
            Self::Enhance { .. } => mode == RenderMode::Enhance,
        }
    }
}

/// An image uploaded by the user for one synthesis session.
///
/// Lineart uploads are flattened onto a white background at construction;
/// the aspect ratio is classified once and cached here, never recomputed
/// per render.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Encoded image bytes (flattened PNG for lineart).
    pub data: Vec<u8>,
    /// Encoding of `data`.
    pub format: ImageFormat,
    /// The role this image plays in the prompt.
    pub role: ImageRole,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
    /// Classified output ratio for these dimensions.
    pub ratio: AspectRatio,
}

impl UploadedImage {
    /// Builds an uploaded image from raw file bytes.
    ///
    /// Decode failures return [`ArchiError::Decode`] and leave nothing
    /// behind; the caller must not proceed to dispatch.
    pub fn from_bytes(role: ImageRole, data: Vec<u8>) -> Result<Self> {
        let decoded =
            image::load_from_memory(&data).map_err(|e| ArchiError::Decode(e.to_string()))?;
        let (width, height) = (decoded.width(), decoded.height());

        let (data, format) = match role {
            ImageRole::Lineart => (lineart::flatten_to_white(&data)?, ImageFormat::Png),
            ImageRole::StyleReference => {
                let format = ImageFormat::from_magic_bytes(&data)
                    .ok_or_else(|| ArchiError::Decode("unrecognized image format".into()))?;
                (data, format)
            }
        };

        Ok(Self {
            data,
            format,
            role,
            width,
            height,
            ratio: AspectRatio::classify(width, height),
        })
    }
}

/// A successfully synthesized image.
#[derive(Debug, Clone)]
#[must_use = "render result should be displayed or saved"]
pub struct RenderResult {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Image format.
    pub format: ImageFormat,
    /// When the backend returned this image.
    pub generated_at: SystemTime,
}

impl RenderResult {
    /// Creates a result stamped with the current time.
    pub fn new(data: Vec<u8>, format: ImageFormat) -> Self {
        Self {
            data,
            format,
            generated_at: SystemTime::now(),
        }
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }

    /// Encodes the image data as base64.
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// Returns the image as a data URL for direct display.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            self.to_base64()
        )
    }
}
