// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hough line-transform skew estimation (feature `hough`).
//
// Pipeline: downscale → Gaussian blur → Canny edges → Hough lines. Each line
// is converted to a baseline angle, folded into [-45, 45], and the dominant
// 1-degree bucket is refined by averaging the lines that fall inside it.

use std::collections::BTreeMap;

use docseg_core::config::SkewConfig;
use docseg_core::{SkewEstimate, SkewMethod};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};
use tracing::{debug, instrument};

use super::projection::ProjectionProfileStrategy;
use super::{SkewStrategy, fold_angle, working_gray};
use crate::image::RasterImage;

/// Lines within this many degrees of the dominant bucket are averaged.
const REFINE_WINDOW_DEGREES: f64 = 1.0;

pub struct HoughStrategy {
    config: SkewConfig,
    /// Used when edges exist but no line clears the vote threshold.
    fallback: ProjectionProfileStrategy,
}

impl HoughStrategy {
    /// `fixed_threshold` is handed to the projection fallback.
    pub fn new(config: SkewConfig, fixed_threshold: u8) -> Self {
        let fallback = ProjectionProfileStrategy::new(config.clone(), fixed_threshold);
        Self { config, fallback }
    }

    fn vote_threshold(&self, width: u32, height: u32) -> u32 {
        let diagonal = f64::from(width).hypot(f64::from(height));
        let scaled = (diagonal * self.config.hough_vote_fraction).round() as u32;
        scaled.max(self.config.hough_min_votes)
    }
}

impl SkewStrategy for HoughStrategy {
    fn method(&self) -> SkewMethod {
        SkewMethod::Hough
    }

    #[instrument(skip_all, name = "hough_skew")]
    fn estimate(&self, image: &RasterImage) -> SkewEstimate {
        let gray = working_gray(image, self.config.max_dimension);
        let blurred = gaussian_blur_f32(&gray, self.config.blur_sigma);
        let edges = canny(&blurred, self.config.canny_low, self.config.canny_high);

        let edge_pixels = edges.pixels().filter(|p| p.0[0] > 0).count();
        if edge_pixels == 0 {
            debug!("No edges found; page has no skew signal");
            return SkewEstimate::no_signal();
        }

        let vote_threshold = self.vote_threshold(gray.width(), gray.height());
        let options = LineDetectionOptions {
            vote_threshold,
            suppression_radius: self.config.hough_suppression_radius,
        };
        let lines = detect_lines(&edges, options);
        let angles = baseline_angles(&lines, self.config.hough_search_range_degrees);
        debug!(
            edge_pixels,
            lines = lines.len(),
            usable = angles.len(),
            vote_threshold,
            "Hough lines detected"
        );

        match dominant_angle(&angles) {
            Some((angle, confidence)) => SkewEstimate::new(angle, SkewMethod::Hough, confidence),
            None => {
                debug!("No usable Hough lines; falling back to projection profile");
                self.fallback.estimate(image)
            }
        }
    }
}

/// Baseline angle for each line, dropping those outside `range`.
///
/// A polar line at angle `phi` has its normal at `phi`, so its direction is
/// `phi - 90` degrees with the y axis pointing down.
fn baseline_angles(lines: &[PolarLine], range: f64) -> Vec<f64> {
    lines
        .iter()
        .map(|line| fold_angle(f64::from(line.angle_in_degrees) - 90.0))
        .filter(|angle| angle.abs() <= range)
        .collect()
}

/// Most populated 1-degree bucket, refined to the mean of the angles near it.
/// Ties go to the bucket closest to zero. Confidence is the share of lines
/// that agree with the winner.
fn dominant_angle(angles: &[f64]) -> Option<(f64, f64)> {
    if angles.is_empty() {
        return None;
    }

    let mut buckets: BTreeMap<i64, usize> = BTreeMap::new();
    for angle in angles {
        *buckets.entry(angle.round() as i64).or_default() += 1;
    }
    let (&bucket, _) = buckets
        .iter()
        .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| b.abs().cmp(&a.abs())))?;

    let centre = bucket as f64;
    let agreeing: Vec<f64> = angles
        .iter()
        .copied()
        .filter(|a| (a - centre).abs() <= REFINE_WINDOW_DEGREES)
        .collect();
    let mean = agreeing.iter().sum::<f64>() / agreeing.len() as f64;
    let confidence = agreeing.len() as f64 / angles.len() as f64;
    Some((mean, confidence))
}
