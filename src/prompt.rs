//! Deterministic prompt composition.
//!
//! Builds the ordered parts list for a synthesis call. Composition is pure:
//! identical inputs always yield byte-identical parts. Each image part is
//! immediately followed by the text block describing it, and the lineart
//! image is always the first part; the main model grounds its output on
//! this ordering.

use crate::types::{ImageFormat, RenderMode, SynthesisParameters, UploadedImage};

/// One element of the synthesis payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// Inline image bytes with their encoding.
    Image {
        /// Encoded image bytes.
        data: Vec<u8>,
        /// Encoding of `data`.
        format: ImageFormat,
    },
    /// A text instruction block.
    Text {
        /// Instruction text.
        content: String,
    },
}

impl Part {
    fn image(img: &UploadedImage) -> Self {
        Self::Image {
            data: img.data.clone(),
            format: img.format,
        }
    }

    fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }
}

const GEOMETRY_CLAUSES: &str = "Do not alter the lineart geometry. \
    Fill color only within enclosed regions. \
    Do not invent objects absent from the lineart.";

/// The fixed instruction for the preliminary style-DNA extraction call.
pub fn style_analysis_instruction() -> &'static str {
    "Describe the dominant color palette, surface materials, and lighting \
     character of this image in two or three sentences. Be concrete and \
     visual; this description will guide an architectural rendering."
}

/// Composes the ordered parts list for a synthesis call.
///
/// `style` is consumed only in plan/spatial modes; `style_analysis` (the
/// optional style-DNA text from the preliminary call) is folded into the
/// style block when present and simply omitted when empty.
pub fn compose(
    mode: RenderMode,
    params: &SynthesisParameters,
    lineart: &UploadedImage,
    style: Option<&UploadedImage>,
    style_analysis: Option<&str>,
) -> Vec<Part> {
    let mut parts = Vec::new();

    parts.push(Part::image(lineart));
    match mode {
        RenderMode::Plan => {
            parts.push(Part::text(
                "The image above is a CAD line drawing of an architectural floor \
                 plan. It defines the fixed spatial layout.",
            ));
        }
        RenderMode::Spatial => {
            parts.push(Part::text(
                "The image above is a CAD line drawing of an architectural \
                 perspective view. It defines the fixed spatial layout.",
            ));
        }
        RenderMode::Enhance => {
            parts.push(Part::text(
                "The image above is an architectural rendering to be enhanced.",
            ));
        }
    }

    if mode.uses_style_reference() {
        if let Some(style) = style {
            parts.push(Part::image(style));
            let mut block = String::from(
                "The image above is the style reference. Transfer its color and \
                 material qualities onto the line drawing.",
            );
            if let Some(analysis) = style_analysis.filter(|a| !a.is_empty()) {
                block.push_str(" Style DNA: ");
                block.push_str(analysis);
            }
            parts.push(Part::text(block));
        }
    }

    parts.push(Part::text(instruction(mode, params)));
    parts
}

fn instruction(mode: RenderMode, params: &SynthesisParameters) -> String {
    // Slider values are emitted verbatim, never rounded or reformatted.
    match mode {
        RenderMode::Plan => {
            let weight = blend_weight(mode, params);
            format!(
                "Render the floor plan as a top-down architectural visualization \
                 with materials and colors from the style reference applied at \
                 {weight}% infusion strength. {GEOMETRY_CLAUSES}"
            )
        }
        RenderMode::Spatial => {
            let weight = blend_weight(mode, params);
            format!(
                "Render the line drawing as a photorealistic architectural \
                 spatial view with materials and colors from the style reference \
                 applied at {weight}% infusion strength. {GEOMETRY_CLAUSES}"
            )
        }
        RenderMode::Enhance => {
            let (texture, smoothing, detail, light) = enhance_values(params);
            format!(
                "Enhance the rendering without changing its content or camera. \
                 Material texture: {texture}%. Surface smoothing: {smoothing}%. \
                 Fine detail: {detail}%. Lighting adjustment: {light}%. \
                 {GEOMETRY_CLAUSES}"
            )
        }
    }
}

fn blend_weight(mode: RenderMode, params: &SynthesisParameters) -> u8 {
    match params {
        SynthesisParameters::Blend { weight } => *weight,
        // Mismatched parameter set for the mode; fall back to defaults.
        _ => match SynthesisParameters::defaults_for(mode) {
            SynthesisParameters::Blend { weight } => weight,
            _ => unreachable!("plan/spatial defaults are blend parameters"),
        },
    }
}

fn enhance_values(params: &SynthesisParameters) -> (u8, u8, u8, u8) {
    match params {
        SynthesisParameters::Enhance {
            texture,
            smoothing,
            detail,
            light,
        } => (*texture, *smoothing, *detail, *light),
        _ => (50, 50, 50, 50),
    }
}
