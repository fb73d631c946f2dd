//! Aspect-ratio tags and the dimension classifier.

use serde::{Deserialize, Serialize};

/// Output aspect ratios accepted by the synthesis backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 16:9 landscape (widescreen).
    #[serde(rename = "16:9")]
    Landscape,
    /// 4:3 standard landscape.
    #[serde(rename = "4:3")]
    Standard,
    /// 1:1 square.
    #[serde(rename = "1:1")]
    Square,
    /// 3:4 standard portrait.
    #[serde(rename = "3:4")]
    StandardPortrait,
    /// 9:16 portrait (tall).
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    /// Returns the aspect ratio as a string (e.g., "16:9").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landscape => "16:9",
            Self::Standard => "4:3",
            Self::Square => "1:1",
            Self::StandardPortrait => "3:4",
            Self::Portrait => "9:16",
        }
    }

    /// Classifies pixel dimensions into the nearest supported ratio.
    ///
    /// Pure and total for positive dimensions. Thresholds: 1.5 / 1.2 on the
    /// landscape side, 0.6 / 0.8 on the portrait side; everything between
    /// 0.8 and 1.2 is treated as square.
    pub fn classify(width: u32, height: u32) -> AspectRatio {
        let ratio = width as f64 / height as f64;
        if ratio > 1.5 {
            Self::Landscape
        } else if ratio > 1.2 {
            Self::Standard
        } else if ratio < 0.6 {
            Self::Portrait
        } else if ratio < 0.8 {
            Self::StandardPortrait
        } else {
            Self::Square
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
