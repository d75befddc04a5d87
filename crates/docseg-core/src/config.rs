// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Segmentation configuration. Every heuristic threshold used by the engine is
// a named field here with a documented default; nothing is hard-coded at the
// call sites.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DocsegError, Result};
use crate::types::{CellSize, MAX_SKEW_DEGREES};

/// Top-level tunables passed into the segmentation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Density grid cell size in pixels (default 32x32).
    pub cell_size: CellSize,
    pub density: DensityConfig,
    pub policy: PolicyConfig,
    pub regions: RegionConfig,
    pub render: RenderConfig,
    pub skew: SkewConfig,
    /// Skew magnitudes at or below this many degrees are left uncorrected by
    /// deskew (default 0.5).
    pub deskew_min_angle: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            cell_size: CellSize::default(),
            density: DensityConfig::default(),
            policy: PolicyConfig::default(),
            regions: RegionConfig::default(),
            render: RenderConfig::default(),
            skew: SkewConfig::default(),
            deskew_min_angle: 0.5,
        }
    }
}

/// Binarisation and aggregate-statistic settings for the density grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityConfig {
    /// Gray level used when Otsu cannot split the histogram into two classes.
    /// Pixels strictly darker than this count as ink (default 128).
    pub fixed_threshold: u8,
    /// Percentile (0..=1) of cell densities above which a cell counts as
    /// heavy ink (default 0.9).
    pub heavy_ink_percentile: f64,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            fixed_threshold: 128,
            heavy_ink_percentile: 0.9,
        }
    }
}

/// Thresholds for the simplified/adaptive decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Pages with histogram entropy below this many bits are handled as a
    /// single region (default 0.1).
    pub entropy_cutoff: f64,
    /// Coefficient of variation (stdev / mean) of cell densities above which
    /// the layout is considered patchy and segmented (default 0.8).
    pub variation_cutoff: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            entropy_cutoff: 0.1,
            variation_cutoff: 0.8,
        }
    }
}

/// Region detection settings for adaptive mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// A cell is a text candidate when its ink density exceeds this fraction
    /// (default 0.05).
    pub text_density_threshold: f64,
    /// Regions smaller than this many square pixels are discarded
    /// (default 256).
    pub min_region_area: u64,
    /// Text boxes closer than this many pixels are merged; the same padding
    /// is reserved around text when deriving image regions (default 8).
    pub merge_padding: u32,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            text_density_threshold: 0.05,
            min_region_area: 256,
            merge_padding: 8,
        }
    }
}

/// Overlay appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Border thickness in pixels (default 3).
    pub border_thickness: u32,
    /// RGB colour of text-region borders (default green).
    pub text_color: [u8; 3],
    /// RGB colour of image-region borders on the combined overlay
    /// (default blue).
    pub image_color: [u8; 3],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            border_thickness: 3,
            text_color: [0, 255, 0],
            image_color: [0, 0, 255],
        }
    }
}

/// Which skew estimator the caller would like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkewMethodPreference {
    /// Hough when compiled in, projection profile otherwise.
    #[default]
    Auto,
    /// Hough; falls back with a warning when unavailable.
    Hough,
    /// Always use the projection-profile estimator.
    ProjectionProfile,
}

/// Skew estimation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkewConfig {
    pub method: SkewMethodPreference,
    /// Images are downscaled so their longer side is at most this many pixels
    /// before estimating (default 1000).
    pub max_dimension: u32,
    /// Gaussian blur sigma applied before edge detection (default 1.0).
    pub blur_sigma: f32,
    /// Canny hysteresis thresholds (defaults 50 / 150).
    pub canny_low: f32,
    pub canny_high: f32,
    /// Hough vote threshold as a fraction of the image diagonal
    /// (default 0.25).
    pub hough_vote_fraction: f64,
    /// Lower bound for the Hough vote threshold (default 40).
    pub hough_min_votes: u32,
    /// Non-maximum suppression radius in the Hough accumulator (default 8).
    pub hough_suppression_radius: u32,
    /// Lines whose baseline angle exceeds this magnitude are ignored
    /// (default 45).
    pub hough_search_range_degrees: f64,
    /// Projection-profile search covers [-range, range] degrees (default 25).
    pub projection_search_range_degrees: f64,
    /// Coarse trial step for the projection search (default 1.0).
    pub coarse_step_degrees: f64,
    /// Refinement step around the best coarse angle (default 0.1).
    pub fine_step_degrees: f64,
}

impl Default for SkewConfig {
    fn default() -> Self {
        Self {
            method: SkewMethodPreference::Auto,
            max_dimension: 1000,
            blur_sigma: 1.0,
            canny_low: 50.0,
            canny_high: 150.0,
            hough_vote_fraction: 0.25,
            hough_min_votes: 40,
            hough_suppression_radius: 8,
            hough_search_range_degrees: MAX_SKEW_DEGREES,
            projection_search_range_degrees: 25.0,
            coarse_step_degrees: 1.0,
            fine_step_degrees: 0.1,
        }
    }
}

impl SegmentationConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&data)
    }

    /// Write the config as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.cell_size.width == 0 || self.cell_size.height == 0 {
            return Err(invalid("cell_size must be non-zero on both axes"));
        }
        non_negative("policy.entropy_cutoff", self.policy.entropy_cutoff)?;
        non_negative("policy.variation_cutoff", self.policy.variation_cutoff)?;
        non_negative("deskew_min_angle", self.deskew_min_angle)?;
        unit_interval("density.heavy_ink_percentile", self.density.heavy_ink_percentile)?;
        unit_interval(
            "regions.text_density_threshold",
            self.regions.text_density_threshold,
        )?;
        if self.regions.text_density_threshold >= 1.0 {
            return Err(invalid(
                "regions.text_density_threshold must be below 1.0 or no cell can qualify",
            ));
        }

        let skew = &self.skew;
        if skew.max_dimension < 16 {
            return Err(invalid("skew.max_dimension must be at least 16"));
        }
        if !(skew.hough_vote_fraction.is_finite() && skew.hough_vote_fraction > 0.0) {
            return Err(invalid("skew.hough_vote_fraction must be positive"));
        }
        if !(skew.blur_sigma.is_finite() && skew.blur_sigma > 0.0) {
            return Err(invalid("skew.blur_sigma must be positive"));
        }
        if !(skew.canny_low.is_finite() && skew.canny_low <= skew.canny_high) {
            return Err(invalid("skew.canny_low must not exceed skew.canny_high"));
        }
        angle_range("skew.hough_search_range_degrees", skew.hough_search_range_degrees)?;
        angle_range(
            "skew.projection_search_range_degrees",
            skew.projection_search_range_degrees,
        )?;
        if !(skew.coarse_step_degrees.is_finite() && skew.coarse_step_degrees > 0.0) {
            return Err(invalid("skew.coarse_step_degrees must be positive"));
        }
        if !(skew.fine_step_degrees.is_finite()
            && skew.fine_step_degrees > 0.0
            && skew.fine_step_degrees <= skew.coarse_step_degrees)
        {
            return Err(invalid(
                "skew.fine_step_degrees must be positive and no larger than the coarse step",
            ));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> DocsegError {
    DocsegError::Config(msg.to_owned())
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(DocsegError::Config(format!(
            "{name} must be a finite non-negative number, got {value}"
        )))
    }
}

fn unit_interval(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(DocsegError::Config(format!(
            "{name} must lie in [0, 1], got {value}"
        )))
    }
}

fn angle_range(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value <= MAX_SKEW_DEGREES {
        Ok(())
    } else {
        Err(DocsegError::Config(format!(
            "{name} must lie in (0, {MAX_SKEW_DEGREES}], got {value}"
        )))
    }
}
