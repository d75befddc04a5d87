// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Projection-profile skew estimation.
//
// Ink pixels are projected onto the axis perpendicular to a trial baseline
// angle. When the trial matches the page skew, text lines collapse into
// sharp peaks and the profile variance is at its highest. A coarse sweep
// over the search range is refined with a fine sweep around the best angle.

use docseg_core::config::SkewConfig;
use docseg_core::{SkewEstimate, SkewMethod};
use tracing::{debug, instrument};

use super::{working_gray, SkewStrategy};
use crate::analysis::density::{binarize, INK};
use crate::image::RasterImage;

/// Upper bound on projected points; larger pages are sampled with a stride.
const MAX_POINTS: usize = 200_000;

/// Skew estimator that needs nothing beyond a binarized page.
#[derive(Debug, Clone)]
pub struct ProjectionProfileStrategy {
    config: SkewConfig,
    /// Ink cutoff used when Otsu cannot split the histogram.
    fixed_threshold: u8,
}

impl ProjectionProfileStrategy {
    /// `fixed_threshold` is the density grid's Otsu fallback, so both paths
    /// agree on what counts as ink.
    pub fn new(config: SkewConfig, fixed_threshold: u8) -> Self {
        Self {
            config,
            fixed_threshold,
        }
    }
}

impl SkewStrategy for ProjectionProfileStrategy {
    fn method(&self) -> SkewMethod {
        SkewMethod::ProjectionProfile
    }

    #[instrument(skip_all, name = "projection_skew")]
    fn estimate(&self, image: &RasterImage) -> SkewEstimate {
        let gray = working_gray(image, self.config.max_dimension);
        let binary = binarize(&gray, self.fixed_threshold);
        let total = u64::from(gray.width()) * u64::from(gray.height());
        if binary.ink_pixels == 0 || binary.ink_pixels == total {
            debug!(ink = binary.ink_pixels, total, "No usable ink for projection");
            return SkewEstimate::no_signal();
        }

        let points = ink_points(&binary.mask);
        let range = self.config.projection_search_range_degrees;
        let profile = Profile::new(gray.width(), gray.height(), range);

        let coarse = sweep(&profile, &points, 0.0, range, self.config.coarse_step_degrees, range);
        let fine = sweep(
            &profile,
            &points,
            coarse.angle,
            self.config.coarse_step_degrees,
            self.config.fine_step_degrees,
            range,
        );

        let confidence = if coarse.best_score > 0.0 {
            1.0 - coarse.mean_score / coarse.best_score
        } else {
            0.0
        };
        debug!(
            coarse = coarse.angle,
            fine = fine.angle,
            points = points.len(),
            confidence,
            "Projection profile sweep complete"
        );
        SkewEstimate::new(fine.angle, SkewMethod::ProjectionProfile, confidence)
    }
}

/// Coordinates of ink pixels, thinned to at most `MAX_POINTS`.
fn ink_points(mask: &image::GrayImage) -> Vec<(f64, f64)> {
    let ink = mask.pixels().filter(|p| p.0[0] == INK).count();
    let stride = ink.div_ceil(MAX_POINTS).max(1);
    mask.enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] == INK)
        .step_by(stride)
        .map(|(x, y, _)| (f64::from(x), f64::from(y)))
        .collect()
}

/// Fixed binning shared by every trial angle so scores stay comparable.
struct Profile {
    offset: f64,
    bins: usize,
}

impl Profile {
    /// Bins spanning every projection `y cos a - x sin a` of a `width` x
    /// `height` page for `|a| <= range_degrees`. That value lies in
    /// `[-width sin r, height + width sin r]`.
    fn new(width: u32, height: u32, range_degrees: f64) -> Self {
        let reach = (f64::from(width) * range_degrees.to_radians().sin().abs()).ceil() + 1.0;
        Self {
            offset: reach,
            bins: height as usize + 2 * reach as usize + 2,
        }
    }

    /// Sum of squared bin counts. Point count is fixed, so this ranks
    /// trials exactly as the profile variance does.
    fn score(&self, points: &[(f64, f64)], angle_degrees: f64) -> f64 {
        let (sin, cos) = angle_degrees.to_radians().sin_cos();
        let mut counts = vec![0u32; self.bins];
        for &(x, y) in points {
            let bin = (y * cos - x * sin + self.offset).round() as usize;
            debug_assert!(bin < self.bins, "trial angle {angle_degrees} outside the profile span");
            if let Some(count) = counts.get_mut(bin) {
                *count += 1;
            }
        }
        counts.iter().map(|&c| f64::from(c) * f64::from(c)).sum()
    }
}

struct Sweep {
    angle: f64,
    best_score: f64,
    mean_score: f64,
}

/// Score angles `center ± k * step` within `half_width`, restricted to
/// `[-limit, limit]`. Ties go to the angle closest to zero.
fn sweep(
    profile: &Profile,
    points: &[(f64, f64)],
    center: f64,
    half_width: f64,
    step: f64,
    limit: f64,
) -> Sweep {
    let steps = (half_width / step).round() as i64;
    let mut best = Sweep {
        angle: center,
        best_score: f64::NEG_INFINITY,
        mean_score: 0.0,
    };
    let mut total = 0.0;
    let mut trials = 0u32;

    for k in -steps..=steps {
        let angle = center + k as f64 * step;
        if angle.abs() > limit + 1e-9 {
            continue;
        }
        let score = profile.score(points, angle);
        total += score;
        trials += 1;
        let better = score > best.best_score * (1.0 + 1e-12)
            || (score >= best.best_score * (1.0 - 1e-12) && angle.abs() < best.angle.abs());
        if better {
            best.angle = angle;
            best.best_score = score;
        }
    }

    if trials > 0 {
        best.mean_score = total / f64::from(trials);
    } else {
        best.best_score = 0.0;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    /// Dark stripes whose baselines run at `degrees` (positive descends to the right).
    fn striped_page(degrees: f64) -> RasterImage {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let gray = GrayImage::from_fn(400, 400, |x, y| {
            let dx = f64::from(x) - 200.0;
            let dy = f64::from(y) - 200.0;
            let u = dx * cos + dy * sin;
            let v = -dx * sin + dy * cos;
            let on_stripe = (v + 150.0).rem_euclid(30.0) < 10.0;
            if u.abs() < 150.0 && v.abs() < 150.0 && on_stripe {
                Luma([0u8])
            } else {
                Luma([255u8])
            }
        });
        RasterImage::from_gray(gray).unwrap()
    }

    /// Stripes at `degrees` running edge to edge of a 600x400 page.
    fn full_bleed_stripes(degrees: f64) -> RasterImage {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let gray = GrayImage::from_fn(600, 400, |x, y| {
            let v = -f64::from(x) * sin + f64::from(y) * cos;
            if v.rem_euclid(30.0) < 10.0 { Luma([0u8]) } else { Luma([255u8]) }
        });
        RasterImage::from_gray(gray).unwrap()
    }

    fn strategy() -> ProjectionProfileStrategy {
        ProjectionProfileStrategy::new(SkewConfig::default(), 128)
    }

    #[test]
    fn level_stripes_measure_zero() {
        let estimate = strategy().estimate(&striped_page(0.0));
        assert_eq!(estimate.method, SkewMethod::ProjectionProfile);
        assert!(estimate.angle_degrees.abs() <= 0.5, "{estimate:?}");
    }

    #[test]
    fn tilted_stripes_are_measured() {
        for degrees in [4.0, -7.0, 12.0] {
            let estimate = strategy().estimate(&striped_page(degrees));
            assert!(
                (estimate.angle_degrees - degrees).abs() <= 1.0,
                "expected {degrees}, got {estimate:?}"
            );
            assert!(estimate.confidence > 0.0);
        }
    }

    #[test]
    fn full_bleed_stripes_are_measured() {
        for degrees in [0.0, 5.0, -10.0, 20.0] {
            let estimate = strategy().estimate(&full_bleed_stripes(degrees));
            assert_eq!(estimate.method, SkewMethod::ProjectionProfile);
            assert!(
                (estimate.angle_degrees - degrees).abs() <= 1.0,
                "expected {degrees}, got {estimate:?}"
            );
        }
    }

    #[test]
    fn profile_spans_page_corners_at_range_limits() {
        let profile = Profile::new(600, 400, 25.0);
        let corners = [(0.0, 0.0), (599.0, 0.0), (0.0, 399.0), (599.0, 399.0)];
        for angle in [-25.0, 25.0] {
            // Four points in four distinct bins score 4; any clamping would merge them.
            assert_eq!(profile.score(&corners, angle), 4.0, "angle {angle}");
        }
    }

    #[test]
    fn single_level_page_uses_configured_cutoff() {
        // Otsu cannot split one gray level, so the cutoff alone decides.
        // Under 150 the page is all ink, under 50 it has none.
        let page = RasterImage::from_gray(GrayImage::from_pixel(64, 64, Luma([100u8]))).unwrap();
        for cutoff in [150, 50] {
            let estimate = ProjectionProfileStrategy::new(SkewConfig::default(), cutoff).estimate(&page);
            assert_eq!(estimate.method, SkewMethod::NoSignal, "cutoff {cutoff}");
        }
    }

    #[test]
    fn blank_page_has_no_signal() {
        let blank = RasterImage::from_gray(GrayImage::from_pixel(64, 64, Luma([255u8]))).unwrap();
        let estimate = strategy().estimate(&blank);
        assert_eq!(estimate.method, SkewMethod::NoSignal);
        assert_eq!(estimate.angle_degrees, 0.0);
    }

    #[test]
    fn solid_black_page_has_no_signal() {
        let black = RasterImage::from_gray(GrayImage::from_pixel(64, 64, Luma([0u8]))).unwrap();
        assert_eq!(strategy().estimate(&black).method, SkewMethod::NoSignal);
    }

    #[test]
    fn sweep_prefers_zero_on_ties() {
        let profile = Profile::new(10, 10, 25.0);
        // A single point scores identically at every angle.
        let result = sweep(&profile, &[(0.0, 5.0)], 0.0, 5.0, 1.0, 25.0);
        assert_eq!(result.angle, 0.0);
    }
}
