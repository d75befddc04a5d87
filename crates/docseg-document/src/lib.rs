// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docseg-document: the segmentation engine.
//
// Decides per page whether to treat it as one whole-page region or split it
// into text and image regions, estimates skew, and renders overlays, a text
// mask and per-region crops for a downstream OCR stage.

pub mod analysis;
pub mod image;
pub mod skew;

// Re-export the primary entry points so callers can use `docseg_document::Segmenter` etc.
pub use analysis::{QualityReport, SegmentationResult, SegmentationSummary, Segmenter};
pub use self::image::{ImageProcessor, RasterImage};
pub use skew::{SkewEstimator, SkewStrategy, hough_available};
