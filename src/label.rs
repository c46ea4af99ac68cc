//! Physical label sizes and their page geometry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// PDF user space units per inch.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Printhead resolution assumed for ZPL coordinates (8 dots/mm).
pub const DOTS_PER_INCH: f32 = 203.0;

/// Supported label stock, width by height in inches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabelSize {
    #[serde(rename = "2x1")]
    TwoByOne,
    #[serde(rename = "2x4")]
    TwoByFour,
    #[serde(rename = "4x2")]
    FourByTwo,
    #[serde(rename = "4x6")]
    FourBySix,
}

impl LabelSize {
    pub const ALL: [LabelSize; 4] = [
        LabelSize::TwoByOne,
        LabelSize::TwoByFour,
        LabelSize::FourByTwo,
        LabelSize::FourBySix,
    ];

    /// Width and height in inches.
    pub fn inches(self) -> (f32, f32) {
        match self {
            LabelSize::TwoByOne => (2.0, 1.0),
            LabelSize::TwoByFour => (2.0, 4.0),
            LabelSize::FourByTwo => (4.0, 2.0),
            LabelSize::FourBySix => (4.0, 6.0),
        }
    }

    /// Page size in PDF points.
    pub fn page_points(self) -> (f32, f32) {
        let (w, h) = self.inches();
        (w * POINTS_PER_INCH, h * POINTS_PER_INCH)
    }

    /// Printable canvas in printer dots.
    pub fn canvas_dots(self) -> (u32, u32) {
        let (w, h) = self.inches();
        ((w * DOTS_PER_INCH).round() as u32, (h * DOTS_PER_INCH).round() as u32)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LabelSize::TwoByOne => "2x1",
            LabelSize::TwoByFour => "2x4",
            LabelSize::FourByTwo => "4x2",
            LabelSize::FourBySix => "4x6",
        }
    }
}

impl fmt::Display for LabelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown label size selector.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported label size '{0}', expected one of 2x1, 2x4, 4x2, 4x6")]
pub struct UnknownLabelSize(pub String);

impl FromStr for LabelSize {
    type Err = UnknownLabelSize;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let normalized = normalized.strip_suffix("in").unwrap_or(normalized.as_str());
        LabelSize::ALL
            .into_iter()
            .find(|size| size.as_str() == normalized)
            .ok_or_else(|| UnknownLabelSize(s.to_string()))
    }
}
