// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Skew estimation: pluggable strategies behind a single estimator.
//
// The Hough line-transform strategy is compiled in with the `hough` feature.
// Which strategy runs is settled once, when the estimator is built, from the
// configured preference and what this build supports.

#[cfg(feature = "hough")]
pub mod hough;
pub mod projection;

use docseg_core::config::{DensityConfig, SkewConfig, SkewMethodPreference};
use docseg_core::error::DocsegError;
use docseg_core::{SkewEstimate, SkewMethod, MAX_SKEW_DEGREES};
use image::GrayImage;
use tracing::{debug, instrument, warn};

use crate::image::{ImageProcessor, RasterImage};

#[cfg(feature = "hough")]
pub use hough::HoughStrategy;
pub use projection::ProjectionProfileStrategy;

/// A way of measuring page skew.
///
/// Implementations must return an angle in [-45, 45] degrees and tag it with
/// the method that produced it, using `SkewMethod::NoSignal` (angle 0.0)
/// when the page offers nothing to measure.
pub trait SkewStrategy: Send + Sync {
    /// Method tag reported for successful measurements.
    fn method(&self) -> SkewMethod;

    fn estimate(&self, image: &RasterImage) -> SkewEstimate;
}

/// Whether this build includes the Hough line-transform estimator.
pub const fn hough_available() -> bool {
    cfg!(feature = "hough")
}

/// Estimator with its strategy fixed at construction time.
pub struct SkewEstimator {
    strategy: Box<dyn SkewStrategy>,
    /// Attached to every estimate when the requested strategy was missing.
    warning: Option<String>,
}

impl SkewEstimator {
    /// Pick a strategy for `config`. Binarization for the projection
    /// profile uses `density.fixed_threshold` when Otsu cannot split a page.
    ///
    /// `Auto` prefers Hough when available. Asking for Hough in a build
    /// without it falls back to the projection profile and records an
    /// `UnsupportedEnvironment` warning on each estimate.
    pub fn new(config: &SkewConfig, density: &DensityConfig) -> Self {
        let fixed_threshold = density.fixed_threshold;
        let hough = match config.method {
            SkewMethodPreference::ProjectionProfile => None,
            SkewMethodPreference::Auto | SkewMethodPreference::Hough => {
                hough_strategy(config, fixed_threshold)
            }
        };

        if let Some(strategy) = hough {
            debug!("Using Hough skew estimator");
            return Self {
                strategy,
                warning: None,
            };
        }

        let warning = if config.method == SkewMethodPreference::Hough {
            let err = DocsegError::UnsupportedEnvironment(
                "Hough line transform not compiled in; using projection profile".into(),
            );
            warn!(%err, "Skew estimator degraded");
            Some(err.to_string())
        } else {
            None
        };
        debug!("Using projection-profile skew estimator");
        Self {
            strategy: Box::new(ProjectionProfileStrategy::new(config.clone(), fixed_threshold)),
            warning,
        }
    }

    /// Wrap a caller-supplied strategy.
    pub fn with_strategy(strategy: Box<dyn SkewStrategy>) -> Self {
        Self {
            strategy,
            warning: None,
        }
    }

    /// Method tag of the selected strategy.
    pub fn method(&self) -> SkewMethod {
        self.strategy.method()
    }

    /// Warning recorded when the preferred strategy was unavailable.
    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height(), method = %self.method()))]
    pub fn estimate(&self, image: &RasterImage) -> SkewEstimate {
        let estimate = self.strategy.estimate(image);
        debug!(
            angle = estimate.angle_degrees,
            method = %estimate.method,
            confidence = estimate.confidence,
            "Skew estimated"
        );
        match &self.warning {
            Some(warning) => estimate.with_warning(warning.clone()),
            None => estimate,
        }
    }
}

impl std::fmt::Debug for SkewEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkewEstimator")
            .field("method", &self.method())
            .field("warning", &self.warning)
            .finish()
    }
}

#[cfg(feature = "hough")]
fn hough_strategy(config: &SkewConfig, fixed_threshold: u8) -> Option<Box<dyn SkewStrategy>> {
    Some(Box::new(HoughStrategy::new(config.clone(), fixed_threshold)))
}

#[cfg(not(feature = "hough"))]
fn hough_strategy(_config: &SkewConfig, _fixed_threshold: u8) -> Option<Box<dyn SkewStrategy>> {
    None
}

// -- Shared helpers -----------------------------------------------------------

/// Grayscale working copy, downscaled so the longer side fits `max_dimension`.
/// Uniform scaling leaves angles unchanged.
pub(crate) fn working_gray(image: &RasterImage, max_dimension: u32) -> GrayImage {
    ImageProcessor::from_raster(image)
        .downscale(max_dimension)
        .into_dynamic()
        .to_luma8()
}

/// Fold any line angle into [-45, 45). Document lines are taken as
/// near-horizontal, so angles are reduced modulo 90 degrees.
pub(crate) fn fold_angle(degrees: f64) -> f64 {
    (degrees + MAX_SKEW_DEGREES).rem_euclid(90.0) - MAX_SKEW_DEGREES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_maps_into_symmetric_range() {
        assert_eq!(fold_angle(0.0), 0.0);
        assert_eq!(fold_angle(-90.0), 0.0);
        assert_eq!(fold_angle(90.0), 0.0);
        assert!((fold_angle(100.0) - 10.0).abs() < 1e-12);
        assert!((fold_angle(-100.0) + 10.0).abs() < 1e-12);
        assert!((fold_angle(50.0) + 40.0).abs() < 1e-12);
        assert_eq!(fold_angle(45.0), -45.0);
    }

    #[test]
    fn projection_preference_is_honoured() {
        let config = SkewConfig {
            method: SkewMethodPreference::ProjectionProfile,
            ..SkewConfig::default()
        };
        let estimator = SkewEstimator::new(&config, &DensityConfig::default());
        assert_eq!(estimator.method(), SkewMethod::ProjectionProfile);
        assert!(estimator.warning().is_none());
    }

    #[cfg(feature = "hough")]
    #[test]
    fn auto_prefers_hough_when_available() {
        let estimator = SkewEstimator::new(&SkewConfig::default(), &DensityConfig::default());
        assert_eq!(estimator.method(), SkewMethod::Hough);
    }

    #[cfg(not(feature = "hough"))]
    #[test]
    fn missing_hough_degrades_with_warning() {
        let config = SkewConfig {
            method: SkewMethodPreference::Hough,
            ..SkewConfig::default()
        };
        let estimator = SkewEstimator::new(&config, &DensityConfig::default());
        assert_eq!(estimator.method(), SkewMethod::ProjectionProfile);
        assert!(estimator.warning().unwrap().contains("unsupported environment"));

        let auto = SkewEstimator::new(&SkewConfig::default(), &DensityConfig::default());
        assert!(auto.warning().is_none());
    }

    struct Fixed(f64);

    impl SkewStrategy for Fixed {
        fn method(&self) -> SkewMethod {
            SkewMethod::Hough
        }

        fn estimate(&self, _image: &RasterImage) -> SkewEstimate {
            SkewEstimate::new(self.0, SkewMethod::Hough, 1.0)
        }
    }

    #[test]
    fn custom_strategy_output_is_clamped() {
        let estimator = SkewEstimator::with_strategy(Box::new(Fixed(80.0)));
        let image = RasterImage::from_gray(GrayImage::new(4, 4)).unwrap();
        assert_eq!(estimator.estimate(&image).angle_degrees, 45.0);
    }
}
