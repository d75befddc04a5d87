// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page analysis: complexity, ink density, segmentation policy, region
// detection, rendering, quality assessment and the pipeline that ties them
// together.

pub mod complexity;
pub mod density;
pub mod pipeline;
pub mod policy;
pub mod quality;
pub mod regions;
pub mod render;

pub use density::{DensityGrid, DensitySummary};
pub use pipeline::Segmenter;
pub use quality::QualityReport;
pub use regions::RegionLayout;
pub use render::{EncodedArtifacts, Overlays, RegionCrop, SegmentationResult, SegmentationSummary};
