// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page quality assessment: brightness, contrast, noise and sharpness, folded
// into a 0-100 score that downstream OCR callers use to decide on enhancement.

use docseg_core::SkewEstimate;
use image::GrayImage;
use imageproc::filter::{filter3x3, laplacian_filter};
use serde::Serialize;
use tracing::{debug, instrument};

use super::complexity::histogram;
use crate::image::RasterImage;

// -- Thresholds ---------------------------------------------------------------

const DARK_MEAN: f64 = 80.0;
const BRIGHT_MEAN: f64 = 180.0;
/// Gray values below this count as dark pixels.
const DARK_PIXEL: usize = 50;
/// Gray values at or above this count as bright pixels.
const BRIGHT_PIXEL: usize = 200;
/// Share of extreme pixels that turns dark into very dark, bright into
/// overexposed.
const EXTREME_SHARE: f64 = 0.3;

const HIGH_RMS: f64 = 60.0;
const HIGH_MICHELSON: f64 = 0.7;
const MEDIUM_RMS: f64 = 30.0;
const MEDIUM_MICHELSON: f64 = 0.4;

/// 8-neighbour high-pass kernel; its saturated response measures grain.
const NOISE_KERNEL: [i32; 9] = [-1, -1, -1, -1, 8, -1, -1, -1, -1];
const HIGH_NOISE_LAPLACIAN: f64 = 1000.0;
const HIGH_NOISE_RESPONSE: f64 = 50.0;
const MEDIUM_NOISE_LAPLACIAN: f64 = 500.0;
const MEDIUM_NOISE_RESPONSE: f64 = 20.0;

const SHARP_LAPLACIAN: f64 = 800.0;
const MODERATE_LAPLACIAN: f64 = 200.0;

const LOW_SKEW_DEGREES: f64 = 1.0;
const MEDIUM_SKEW_DEGREES: f64 = 5.0;

const BASE_SCORE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BrightnessLevel {
    VeryDark,
    Dark,
    Normal,
    Bright,
    Overexposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlurLevel {
    Sharp,
    Moderate,
    Blurry,
}

/// Gray-level summary of the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageStatistics {
    pub mean: f64,
    pub std: f64,
    pub min: u8,
    pub max: u8,
    /// Mean of the two middle values when the pixel count is even.
    pub median: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrightnessReport {
    pub level: BrightnessLevel,
    pub mean: f64,
    pub dark_ratio: f64,
    pub bright_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContrastReport {
    pub level: Level,
    /// Standard deviation of gray values.
    pub rms: f64,
    /// `(max - min) / (max + min)`.
    pub michelson: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoiseReport {
    pub level: Level,
    pub laplacian_variance: f64,
    /// Variance of the saturated 8-neighbour high-pass response.
    pub noise_variance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlurReport {
    pub level: BlurLevel,
    pub laplacian_variance: f64,
}

/// Quality measurements for one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub statistics: ImageStatistics,
    pub brightness: BrightnessReport,
    pub contrast: ContrastReport,
    pub noise: NoiseReport,
    pub blur: BlurReport,
    /// Present when a skew estimate was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skew_level: Option<Level>,
    /// 0 (unusable) to 100.
    pub score: f64,
}

/// Measure brightness, contrast, noise and sharpness. A skew estimate, when
/// given, lowers the score for strongly tilted pages.
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn assess(image: &RasterImage, skew: Option<&SkewEstimate>) -> QualityReport {
    let gray = image.to_gray();
    let hist = histogram(&gray);
    let total = u64::from(gray.width()) * u64::from(gray.height());

    let statistics = statistics(&hist, total);
    let brightness = assess_brightness(&hist, total);
    let contrast = assess_contrast(&hist, total);
    let laplacian_variance = laplacian_variance(&gray);
    let noise = assess_noise(&gray, laplacian_variance);
    let blur = assess_blur(laplacian_variance);
    let skew_level = skew.map(|s| skew_level(s.angle_degrees));

    let score = score(&brightness, &contrast, &noise, &blur, skew_level);
    debug!(
        score,
        brightness = ?brightness.level,
        contrast = ?contrast.level,
        noise = ?noise.level,
        blur = ?blur.level,
        "Quality assessed"
    );

    QualityReport {
        statistics,
        brightness,
        contrast,
        noise,
        blur,
        skew_level,
        score,
    }
}

fn mean_and_variance(hist: &[u64; 256], total: u64) -> (f64, f64) {
    let n = total as f64;
    let mean = hist
        .iter()
        .enumerate()
        .map(|(v, &c)| v as f64 * c as f64)
        .sum::<f64>()
        / n;
    let variance = hist
        .iter()
        .enumerate()
        .map(|(v, &c)| (v as f64 - mean).powi(2) * c as f64)
        .sum::<f64>()
        / n;
    (mean, variance)
}

fn statistics(hist: &[u64; 256], total: u64) -> ImageStatistics {
    let (mean, variance) = mean_and_variance(hist, total);
    let min = hist.iter().position(|&c| c > 0).unwrap_or(0) as u8;
    let max = hist.iter().rposition(|&c| c > 0).unwrap_or(0) as u8;
    let lower = nth_value(hist, total.saturating_sub(1) / 2);
    let upper = nth_value(hist, total / 2);
    ImageStatistics {
        mean,
        std: variance.sqrt(),
        min,
        max,
        median: (f64::from(lower) + f64::from(upper)) / 2.0,
    }
}

/// Gray value of the `n`th pixel (0-based) in sorted order.
fn nth_value(hist: &[u64; 256], n: u64) -> u8 {
    let mut seen = 0u64;
    for (value, &count) in hist.iter().enumerate() {
        seen += count;
        if seen > n {
            return value as u8;
        }
    }
    u8::MAX
}

fn assess_brightness(hist: &[u64; 256], total: u64) -> BrightnessReport {
    let (mean, _) = mean_and_variance(hist, total);
    let n = total as f64;
    let dark_ratio = hist[..DARK_PIXEL].iter().sum::<u64>() as f64 / n;
    let bright_ratio = hist[BRIGHT_PIXEL..].iter().sum::<u64>() as f64 / n;

    let level = if mean < DARK_MEAN {
        if dark_ratio > EXTREME_SHARE {
            BrightnessLevel::VeryDark
        } else {
            BrightnessLevel::Dark
        }
    } else if mean > BRIGHT_MEAN {
        if bright_ratio > EXTREME_SHARE {
            BrightnessLevel::Overexposed
        } else {
            BrightnessLevel::Bright
        }
    } else {
        BrightnessLevel::Normal
    };

    BrightnessReport {
        level,
        mean,
        dark_ratio,
        bright_ratio,
    }
}

fn assess_contrast(hist: &[u64; 256], total: u64) -> ContrastReport {
    let (_, variance) = mean_and_variance(hist, total);
    let rms = variance.sqrt();
    let min = hist.iter().position(|&c| c > 0).unwrap_or(0) as f64;
    let max = hist.iter().rposition(|&c| c > 0).unwrap_or(0) as f64;
    let michelson = if max + min > 0.0 {
        (max - min) / (max + min)
    } else {
        0.0
    };

    let level = if rms > HIGH_RMS && michelson > HIGH_MICHELSON {
        Level::High
    } else if rms > MEDIUM_RMS && michelson > MEDIUM_MICHELSON {
        Level::Medium
    } else {
        Level::Low
    };

    ContrastReport {
        level,
        rms,
        michelson,
    }
}

fn laplacian_variance(gray: &GrayImage) -> f64 {
    let laplacian = laplacian_filter(gray);
    let n = f64::from(laplacian.width()) * f64::from(laplacian.height());
    let mean = laplacian.pixels().map(|p| f64::from(p.0[0])).sum::<f64>() / n;
    laplacian
        .pixels()
        .map(|p| (f64::from(p.0[0]) - mean).powi(2))
        .sum::<f64>()
        / n
}

fn assess_noise(gray: &GrayImage, laplacian_variance: f64) -> NoiseReport {
    let response: GrayImage = filter3x3::<_, i32, u8>(gray, &NOISE_KERNEL);
    let n = f64::from(response.width()) * f64::from(response.height());
    let mean = response.pixels().map(|p| f64::from(p.0[0])).sum::<f64>() / n;
    let noise_variance = response
        .pixels()
        .map(|p| (f64::from(p.0[0]) - mean).powi(2))
        .sum::<f64>()
        / n;

    let level = if laplacian_variance > HIGH_NOISE_LAPLACIAN && noise_variance > HIGH_NOISE_RESPONSE {
        Level::High
    } else if laplacian_variance > MEDIUM_NOISE_LAPLACIAN && noise_variance > MEDIUM_NOISE_RESPONSE {
        Level::Medium
    } else {
        Level::Low
    };

    NoiseReport {
        level,
        laplacian_variance,
        noise_variance,
    }
}

fn assess_blur(laplacian_variance: f64) -> BlurReport {
    let level = if laplacian_variance > SHARP_LAPLACIAN {
        BlurLevel::Sharp
    } else if laplacian_variance > MODERATE_LAPLACIAN {
        BlurLevel::Moderate
    } else {
        BlurLevel::Blurry
    };

    BlurReport {
        level,
        laplacian_variance,
    }
}

fn skew_level(angle_degrees: f64) -> Level {
    let magnitude = angle_degrees.abs();
    if magnitude <= LOW_SKEW_DEGREES {
        Level::Low
    } else if magnitude <= MEDIUM_SKEW_DEGREES {
        Level::Medium
    } else {
        Level::High
    }
}

fn score(
    brightness: &BrightnessReport,
    contrast: &ContrastReport,
    noise: &NoiseReport,
    blur: &BlurReport,
    skew: Option<Level>,
) -> f64 {
    let contrast_points = match contrast.level {
        Level::High => 25.0,
        Level::Medium => 15.0,
        Level::Low => 0.0,
    };
    let brightness_points = match brightness.level {
        BrightnessLevel::Normal => 20.0,
        BrightnessLevel::Bright => 15.0,
        BrightnessLevel::Dark => 10.0,
        BrightnessLevel::Overexposed => 5.0,
        BrightnessLevel::VeryDark => 0.0,
    };
    let noise_points = match noise.level {
        Level::Low => 0.0,
        Level::Medium => -5.0,
        Level::High => -15.0,
    };
    let blur_points = match blur.level {
        BlurLevel::Sharp => 5.0,
        BlurLevel::Moderate => 0.0,
        BlurLevel::Blurry => -10.0,
    };
    let skew_points = match skew {
        Some(Level::Medium) => -2.0,
        Some(Level::High) => -5.0,
        _ => 0.0,
    };
    let total = BASE_SCORE
        + contrast_points
        + brightness_points
        + noise_points
        + blur_points
        + skew_points;
    total.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docseg_core::SkewMethod;
    use image::Luma;

    fn raster(gray: GrayImage) -> RasterImage {
        RasterImage::from_gray(gray).unwrap()
    }

    #[test]
    fn flat_gray_is_low_contrast_and_blurry() {
        let report = assess(&raster(GrayImage::from_pixel(40, 40, Luma([128u8]))), None);
        assert_eq!(report.brightness.level, BrightnessLevel::Normal);
        assert_eq!(report.contrast.level, Level::Low);
        assert_eq!(report.contrast.rms, 0.0);
        assert_eq!(report.blur.level, BlurLevel::Blurry);
        assert_eq!(report.blur.laplacian_variance, 0.0);
        assert_eq!(report.noise.level, Level::Low);
        assert_eq!(report.noise.noise_variance, 0.0);
        assert_eq!(report.score, 60.0);
        assert!(report.skew_level.is_none());
    }

    #[test]
    fn checkerboard_is_sharp_and_high_contrast() {
        let board = GrayImage::from_fn(40, 40, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 { Luma([0u8]) } else { Luma([255u8]) }
        });
        let report = assess(&raster(board), None);
        assert_eq!(report.contrast.level, Level::High);
        assert!((report.contrast.michelson - 1.0).abs() < 1e-12);
        assert_eq!(report.blur.level, BlurLevel::Sharp);
        assert_eq!(report.brightness.level, BrightnessLevel::Normal);
        // Hard 4 px edges everywhere read as heavy grain.
        assert_eq!(report.noise.level, Level::High);
        assert!(report.noise.noise_variance > HIGH_NOISE_RESPONSE);
        assert_eq!(report.score, 85.0);
    }

    #[test]
    fn brightness_extremes() {
        let black = assess(&raster(GrayImage::from_pixel(10, 10, Luma([10u8]))), None);
        assert_eq!(black.brightness.level, BrightnessLevel::VeryDark);
        let white = assess(&raster(GrayImage::from_pixel(10, 10, Luma([250u8]))), None);
        assert_eq!(white.brightness.level, BrightnessLevel::Overexposed);
        let dim = assess(&raster(GrayImage::from_pixel(10, 10, Luma([70u8]))), None);
        assert_eq!(dim.brightness.level, BrightnessLevel::Dark);
    }

    #[test]
    fn skew_lowers_score() {
        let page = raster(GrayImage::from_pixel(20, 20, Luma([128u8])));
        let tilted = SkewEstimate::new(12.0, SkewMethod::Hough, 1.0);
        let report = assess(&page, Some(&tilted));
        assert_eq!(report.skew_level, Some(Level::High));
        assert_eq!(report.score, 55.0);
    }

    #[test]
    fn statistics_summarise_gray_levels() {
        let half = GrayImage::from_fn(10, 10, |x, _| if x < 5 { Luma([20u8]) } else { Luma([220u8]) });
        let stats = assess(&raster(half), None).statistics;
        assert_eq!((stats.min, stats.max), (20, 220));
        assert_eq!(stats.mean, 120.0);
        assert_eq!(stats.std, 100.0);
        assert_eq!(stats.median, 120.0);

        let odd = GrayImage::from_fn(3, 1, |x, _| Luma([[5u8, 9, 200][x as usize]]));
        assert_eq!(assess(&raster(odd), None).statistics.median, 9.0);
    }

    #[test]
    fn grain_costs_more_than_sharpness_earns() {
        // Single-pixel salt on mid gray: sharp edges, strong high-pass response.
        let salted = GrayImage::from_fn(60, 60, |x, y| {
            if (x * 7 + y * 13) % 5 == 0 { Luma([255u8]) } else { Luma([110u8]) }
        });
        let report = assess(&raster(salted), None);
        assert_eq!(report.noise.level, Level::High);
        assert!(report.noise.laplacian_variance > HIGH_NOISE_LAPLACIAN);

        let expected = BASE_SCORE
            + match report.contrast.level {
                Level::High => 25.0,
                Level::Medium => 15.0,
                Level::Low => 0.0,
            }
            + match report.brightness.level {
                BrightnessLevel::Normal => 20.0,
                BrightnessLevel::Bright => 15.0,
                _ => unreachable!("{:?}", report.brightness.level),
            }
            + 5.0
            - 15.0;
        assert_eq!(report.blur.level, BlurLevel::Sharp);
        assert_eq!(report.score, expected);
    }
}
