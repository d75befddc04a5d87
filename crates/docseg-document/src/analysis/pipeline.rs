// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Segmentation pipeline: runs one page through classification, density
// analysis, the mode decision, region detection and rendering, and attaches
// the skew estimate.

use docseg_core::config::SegmentationConfig;
use docseg_core::error::Result;
use docseg_core::{SegmentationMode, SkewEstimate};
use tracing::{debug, info, instrument};

use super::regions::{self, RegionLayout};
use super::render::{self, SegmentationResult};
use super::{complexity, density, policy};
use crate::image::{ImageProcessor, RasterImage};
use crate::skew::SkewEstimator;

/// Pipeline stages, in order. Every run passes through each one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loaded,
    Classified,
    DensityComputed,
    ModeDecided,
    RegionsDetected,
    WholePageRegion,
    Rendered,
    Done,
}

/// Configured segmentation engine. Holds no per-image state, so one value
/// can serve any number of pages, from any number of threads.
#[derive(Debug)]
pub struct Segmenter {
    config: SegmentationConfig,
    skew: SkewEstimator,
}

impl Segmenter {
    /// Validate `config` and pick the skew strategy.
    pub fn new(config: SegmentationConfig) -> Result<Self> {
        config.validate()?;
        let skew = SkewEstimator::new(&config.skew, &config.density);
        info!(skew_method = %skew.method(), "Segmenter ready");
        Ok(Self { config, skew })
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    pub fn skew_estimator(&self) -> &SkewEstimator {
        &self.skew
    }

    /// Segment one page and attach its skew estimate.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn segment(&self, image: &RasterImage) -> Result<SegmentationResult> {
        stage(Stage::Loaded);

        let entropy = complexity::classify(image)?;
        stage(Stage::Classified);

        let grid = density::analyze(image, self.config.cell_size, &self.config.density);
        stage(Stage::DensityComputed);

        let mode = policy::decide(entropy, &grid, &self.config.policy);
        stage(Stage::ModeDecided);

        let layout = match mode {
            SegmentationMode::Adaptive => {
                let layout = regions::detect(&grid, image.dimensions(), &self.config.regions)?;
                stage(Stage::RegionsDetected);
                layout
            }
            SegmentationMode::Simplified => {
                let layout = RegionLayout::whole_page(image.width(), image.height())?;
                stage(Stage::WholePageRegion);
                layout
            }
        };

        let mut result = render::render(image, &layout, mode, &self.config.render)?;
        stage(Stage::Rendered);

        result.entropy = Some(entropy);
        result.density = Some(grid.summary());
        result.skew = Some(self.skew.estimate(image));
        stage(Stage::Done);

        info!(
            %mode,
            regions = result.regions.len(),
            entropy = entropy.bits(),
            "Page segmented"
        );
        Ok(result)
    }

    /// Run only the skew estimator.
    pub fn estimate_skew(&self, image: &RasterImage) -> SkewEstimate {
        self.skew.estimate(image)
    }

    /// Estimate skew and rotate it out.
    ///
    /// Returns the corrected page with the estimate taken before rotation.
    /// Pages within `deskew_min_angle` come back as the same buffer.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn deskew(&self, image: &RasterImage) -> Result<(RasterImage, SkewEstimate)> {
        let estimate = self.skew.estimate(image);
        if !estimate.has_signal() || estimate.angle_degrees.abs() <= self.config.deskew_min_angle {
            debug!(angle = estimate.angle_degrees, "No deskew needed");
            return Ok((image.clone(), estimate));
        }
        let corrected = ImageProcessor::from_raster(image)
            .deskew(estimate.angle_degrees, self.config.deskew_min_angle)
            .into_raster()?;
        Ok((corrected, estimate))
    }
}

fn stage(stage: Stage) {
    debug!(?stage, "Pipeline stage reached");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use docseg_core::error::DocsegError;
    use image::{GrayImage, Luma};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    /// Counts WARN events seen while installed.
    #[derive(Clone, Default)]
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = SegmentationConfig::default();
        config.policy.variation_cutoff = -1.0;
        let err = Segmenter::new(config).unwrap_err();
        assert!(matches!(err, DocsegError::Config(_)));
    }

    #[test]
    fn uniform_page_is_simplified() {
        let segmenter = Segmenter::new(SegmentationConfig::default()).unwrap();
        let page = RasterImage::from_gray(GrayImage::from_pixel(64, 48, Luma([200u8]))).unwrap();
        let result = segmenter.segment(&page).unwrap();
        assert_eq!(result.mode, SegmentationMode::Simplified);
        assert_eq!(result.regions.len(), 1);
        assert_eq!(result.skew.unwrap().angle_degrees, 0.0);
        assert_eq!(result.entropy.unwrap().bits(), 0.0);
    }

    #[test]
    fn blank_page_is_not_rotated() {
        let segmenter = Segmenter::new(SegmentationConfig::default()).unwrap();
        let page = RasterImage::from_gray(GrayImage::from_pixel(30, 30, Luma([255u8]))).unwrap();
        let (corrected, estimate) = segmenter.deskew(&page).unwrap();
        assert!(corrected.shares_buffer_with(&page));
        assert!(!estimate.has_signal());
    }

    #[test]
    fn whole_page_fallback_warns_once() {
        // Half-inked cells in a sparse lattice: adaptive, but no cell clears 0.9.
        let gray = GrayImage::from_fn(256, 256, |x, y| {
            let (col, row) = (x / 32, y / 32);
            if col % 4 == 0 && row % 2 == 0 && y % 32 < 16 {
                Luma([0u8])
            } else {
                Luma([255u8])
            }
        });
        let page = RasterImage::from_gray(gray).unwrap();
        let mut config = SegmentationConfig::default();
        config.regions.text_density_threshold = 0.9;
        let segmenter = Segmenter::new(config).unwrap();

        let counter = WarnCounter::default();
        let subscriber = tracing_subscriber::registry().with(counter.clone());
        let result = tracing::subscriber::with_default(subscriber, || segmenter.segment(&page))
            .unwrap();

        assert!(result.whole_page_fallback);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}
