// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for docseg: region geometry, segmentation mode and skew
// estimates. Geometry is plain integer pixel coordinates so consumers can
// serialise it without touching any image type.

use serde::{Deserialize, Serialize};

use crate::error::{DocsegError, Result};

/// What a region predominantly contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Text,
    Image,
}

/// Axis-aligned rectangle in source-image pixel coordinates.
///
/// `x + width` and `y + height` are exclusive. A `RegionBox` built through
/// [`RegionBox::new`] always has positive area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub kind: RegionKind,
}

impl RegionBox {
    /// Create a region, rejecting zero-area rectangles.
    pub fn new(x: u32, y: u32, width: u32, height: u32, kind: RegionKind) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(DocsegError::DegenerateGeometry(format!(
                "region at ({x}, {y}) has zero area ({width}x{height})"
            )));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
            kind,
        })
    }

    /// A text region covering the whole page.
    pub fn full_page(width: u32, height: u32) -> Result<Self> {
        Self::new(0, 0, width, height, RegionKind::Text)
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True when the box has positive area and lies inside `[0,w) x [0,h)`.
    pub fn is_within(&self, image_width: u32, image_height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.right() <= image_width
            && self.bottom() <= image_height
    }

    /// Grow the box by `padding` on every side, clipped to the image.
    pub fn padded(&self, padding: u32, image_width: u32, image_height: u32) -> Self {
        let x = self.x.saturating_sub(padding);
        let y = self.y.saturating_sub(padding);
        let right = self.right().saturating_add(padding).min(image_width);
        let bottom = self.bottom().saturating_add(padding).min(image_height);
        Self {
            x,
            y,
            width: right.saturating_sub(x),
            height: bottom.saturating_sub(y),
            kind: self.kind,
        }
    }

    /// Whether the two boxes overlap or are separated by at most `gap` pixels
    /// on both axes.
    pub fn is_near(&self, other: &RegionBox, gap: u32) -> bool {
        let gap = gap as u64;
        let (ax0, ax1) = (self.x as u64, self.right() as u64);
        let (bx0, bx1) = (other.x as u64, other.right() as u64);
        let (ay0, ay1) = (self.y as u64, self.bottom() as u64);
        let (by0, by1) = (other.y as u64, other.bottom() as u64);

        ax0 <= bx1 + gap && bx0 <= ax1 + gap && ay0 <= by1 + gap && by0 <= ay1 + gap
    }

    /// Smallest box containing both. Keeps the kind of `self`.
    pub fn union(&self, other: &RegionBox) -> Self {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Self {
            x,
            y,
            width: right - x,
            height: bottom - y,
            kind: self.kind,
        }
    }

    /// Clip to the image, returning `None` when nothing remains.
    pub fn clamp_to(&self, image_width: u32, image_height: u32) -> Option<Self> {
        let right = self.right().min(image_width);
        let bottom = self.bottom().min(image_height);
        if self.x >= right || self.y >= bottom {
            return None;
        }
        Some(Self {
            x: self.x,
            y: self.y,
            width: right - self.x,
            height: bottom - self.y,
            kind: self.kind,
        })
    }
}

/// Segmentation strategy chosen for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationMode {
    /// Region-based decomposition into text and image boxes.
    Adaptive,
    /// The whole page is treated as a single text region.
    Simplified,
}

impl std::fmt::Display for SegmentationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentationMode::Adaptive => write!(f, "adaptive"),
            SegmentationMode::Simplified => write!(f, "simplified"),
        }
    }
}

/// Shannon entropy of the gray-level histogram, in bits (0..=8).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntropyScore(pub f64);

impl EntropyScore {
    pub fn bits(&self) -> f64 {
        self.0
    }
}

/// Density grid cell dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSize {
    pub width: u32,
    pub height: u32,
}

impl CellSize {
    pub fn square(side: u32) -> Self {
        Self {
            width: side,
            height: side,
        }
    }
}

impl Default for CellSize {
    fn default() -> Self {
        Self::square(32)
    }
}

/// How a skew angle was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkewMethod {
    /// Edge detection plus Hough line voting.
    #[serde(rename = "hough")]
    Hough,
    /// Horizontal projection-profile search (fallback estimator).
    #[serde(rename = "fallback")]
    ProjectionProfile,
    /// Nothing to measure (blank page, no edges); the angle is 0.0 by
    /// convention and must not be read as "confidently straight".
    #[serde(rename = "no_signal")]
    NoSignal,
}

impl std::fmt::Display for SkewMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkewMethod::Hough => write!(f, "hough"),
            SkewMethod::ProjectionProfile => write!(f, "fallback"),
            SkewMethod::NoSignal => write!(f, "no_signal"),
        }
    }
}

/// Largest skew magnitude an estimate may report, in degrees.
pub const MAX_SKEW_DEGREES: f64 = 45.0;

/// Estimated page rotation.
///
/// Positive angles mean text baselines descend to the right (image y axis
/// points down). Deskewing rotates by the negated angle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkewEstimate {
    pub angle_degrees: f64,
    pub method: SkewMethod,
    /// 0.0..=1.0, strategy specific.
    pub confidence: f64,
    /// Set when the requested strategy was unavailable and a fallback ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl SkewEstimate {
    /// Build an estimate, clamping the angle to [-45, 45] and the confidence
    /// to [0, 1]. Non-finite angles collapse to a no-signal estimate.
    pub fn new(angle_degrees: f64, method: SkewMethod, confidence: f64) -> Self {
        if !angle_degrees.is_finite() {
            return Self::no_signal();
        }
        Self {
            angle_degrees: angle_degrees.clamp(-MAX_SKEW_DEGREES, MAX_SKEW_DEGREES),
            method,
            confidence: if confidence.is_finite() {
                confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
            warning: None,
        }
    }

    pub fn no_signal() -> Self {
        Self {
            angle_degrees: 0.0,
            method: SkewMethod::NoSignal,
            confidence: 0.0,
            warning: None,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    /// False when the estimator found nothing to measure.
    pub fn has_signal(&self) -> bool {
        self.method != SkewMethod::NoSignal
    }
}
