// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Complexity classification: Shannon entropy of the gray-level histogram.
// Near-blank pages and flat illustrations score close to zero.

use docseg_core::error::{DocsegError, Result};
use docseg_core::EntropyScore;
use image::GrayImage;
use tracing::debug;

use crate::image::RasterImage;

/// Compute the histogram entropy of `image` in bits (0.0..=8.0).
pub fn classify(image: &RasterImage) -> Result<EntropyScore> {
    let gray = image.to_gray();
    let score = EntropyScore(gray_entropy(&gray)?);
    debug!(entropy = score.bits(), "Complexity classified");
    Ok(score)
}

/// Build the 256-bin intensity histogram of a grayscale image.
pub(crate) fn histogram(gray: &GrayImage) -> [u64; 256] {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }
    histogram
}

fn gray_entropy(gray: &GrayImage) -> Result<f64> {
    let total = gray.width() as u64 * gray.height() as u64;
    if total == 0 {
        return Err(DocsegError::InvalidImage(
            "cannot measure entropy of an empty image".into(),
        ));
    }

    let entropy = histogram(gray)
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total as f64;
            -p * p.log2()
        })
        .sum::<f64>();

    // Summation can leave a tiny negative residue for single-bin histograms.
    Ok(entropy.clamp(0.0, 8.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn raster(gray: GrayImage) -> RasterImage {
        RasterImage::from_gray(gray).unwrap()
    }

    #[test]
    fn uniform_field_has_zero_entropy() {
        let score = classify(&raster(GrayImage::from_pixel(64, 64, Luma([128u8])))).unwrap();
        assert_eq!(score.bits(), 0.0);
    }

    #[test]
    fn half_black_half_white_is_one_bit() {
        let gray = GrayImage::from_fn(64, 64, |x, _| Luma([if x < 32 { 0 } else { 255 }]));
        let score = classify(&raster(gray)).unwrap();
        assert!((score.bits() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn full_ramp_reaches_eight_bits() {
        let gray = GrayImage::from_fn(256, 4, |x, _| Luma([x as u8]));
        let score = classify(&raster(gray)).unwrap();
        assert!((score.bits() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn classification_is_deterministic() {
        let gray = GrayImage::from_fn(50, 70, |x, y| Luma([((x * 7 + y * 13) % 251) as u8]));
        let image = raster(gray);
        let a = classify(&image).unwrap();
        let b = classify(&image).unwrap();
        assert_eq!(a, b);
        assert!((0.0..=8.0).contains(&a.bits()));
    }
}
