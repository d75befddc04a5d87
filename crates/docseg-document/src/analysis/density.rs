// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Density analysis: binarisation and the grid of per-cell ink fractions the
// segmentation policy and region detector work from.

use docseg_core::config::DensityConfig;
use docseg_core::CellSize;
use image::{GrayImage, Luma};
use serde::Serialize;
use tracing::{debug, instrument};

use super::complexity::histogram;
use crate::image::RasterImage;

/// Mask value marking an ink pixel.
pub const INK: u8 = 255;

/// Where the binarisation threshold came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdSource {
    /// Otsu's method split the histogram into two classes.
    Otsu,
    /// The histogram had a single populated class; the configured fixed
    /// threshold was used.
    Fixed,
}

/// Ink/background classification of a grayscale image.
#[derive(Debug, Clone)]
pub struct Binarized {
    /// `INK` for ink pixels, 0 for background.
    pub mask: GrayImage,
    pub threshold: u8,
    pub source: ThresholdSource,
    pub ink_pixels: u64,
}

/// Classify each pixel as ink or background.
///
/// With an Otsu threshold `t`, pixels `<= t` (the dark class) are ink. When
/// Otsu cannot split the histogram, pixels strictly darker than
/// `fixed_threshold` are ink.
pub fn binarize(gray: &GrayImage, fixed_threshold: u8) -> Binarized {
    let (threshold, source) = match otsu_threshold(gray) {
        Some(t) => (t, ThresholdSource::Otsu),
        None => (fixed_threshold, ThresholdSource::Fixed),
    };
    let is_ink = |value: u8| match source {
        ThresholdSource::Otsu => value <= threshold,
        ThresholdSource::Fixed => value < threshold,
    };

    let mut ink_pixels = 0u64;
    let mask = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if is_ink(gray.get_pixel(x, y).0[0]) {
            ink_pixels += 1;
            Luma([INK])
        } else {
            Luma([0])
        }
    });

    Binarized {
        mask,
        threshold,
        source,
        ink_pixels,
    }
}

/// Per-cell ink fractions over a uniform grid, with aggregate statistics.
///
/// `rows = ceil(height / cell.height)` and `cols = ceil(width / cell.width)`;
/// edge cells are clipped to the image and their fraction is taken over the
/// clipped area. Every density lies in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityGrid {
    cell_size: CellSize,
    cols: u32,
    rows: u32,
    image_width: u32,
    image_height: u32,
    cells: Vec<f64>,
    mean: f64,
    variance: f64,
    heavy_threshold: f64,
    heavy_cells: usize,
    threshold: u8,
    threshold_source: ThresholdSource,
}

/// Serialisable digest of a grid for reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DensitySummary {
    pub cols: u32,
    pub rows: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    pub mean: f64,
    pub variance: f64,
    pub coefficient_of_variation: Option<f64>,
    pub heavy_cells: usize,
    pub threshold: u8,
    pub threshold_source: ThresholdSource,
}

impl DensityGrid {
    pub(crate) fn from_cells(
        image_width: u32,
        image_height: u32,
        cell_size: CellSize,
        cells: Vec<f64>,
        heavy_ink_percentile: f64,
        threshold: u8,
        threshold_source: ThresholdSource,
    ) -> Self {
        let cell_size = CellSize {
            width: cell_size.width.max(1),
            height: cell_size.height.max(1),
        };
        let cols = image_width.div_ceil(cell_size.width);
        let rows = image_height.div_ceil(cell_size.height);
        debug_assert_eq!(cells.len(), (cols * rows) as usize);

        let n = cells.len().max(1) as f64;
        let mean = cells.iter().sum::<f64>() / n;
        let variance = cells.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;

        let heavy_threshold = percentile(&cells, heavy_ink_percentile);
        let heavy_cells = cells
            .iter()
            .filter(|&&d| d > heavy_threshold && d > 0.0)
            .count();

        Self {
            cell_size,
            cols,
            rows,
            image_width,
            image_height,
            cells,
            mean,
            variance,
            heavy_threshold,
            heavy_cells,
            threshold,
            threshold_source,
        }
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cell_size(&self) -> CellSize {
        self.cell_size
    }

    pub fn image_dimensions(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    /// Row-major densities.
    pub fn cells(&self) -> &[f64] {
        &self.cells
    }

    /// Density of the cell at (`col`, `row`).
    pub fn get(&self, col: u32, row: u32) -> Option<f64> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.cells.get((row * self.cols + col) as usize).copied()
    }

    /// Pixel bounds `(x0, y0, x1, y1)` of a cell, exclusive and clipped.
    pub fn cell_bounds(&self, col: u32, row: u32) -> (u32, u32, u32, u32) {
        let x0 = col * self.cell_size.width;
        let y0 = row * self.cell_size.height;
        let x1 = (x0 + self.cell_size.width).min(self.image_width);
        let y1 = (y0 + self.cell_size.height).min(self.image_height);
        (x0, y0, x1, y1)
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance of the cell densities.
    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }

    /// `stdev / mean`, or `None` for a grid without ink.
    pub fn coefficient_of_variation(&self) -> Option<f64> {
        if self.mean <= f64::EPSILON {
            None
        } else {
            Some(self.std_dev() / self.mean)
        }
    }

    /// Density at the configured heavy-ink percentile.
    pub fn heavy_threshold(&self) -> f64 {
        self.heavy_threshold
    }

    /// Cells strictly above the heavy-ink percentile.
    pub fn heavy_cells(&self) -> usize {
        self.heavy_cells
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn threshold_source(&self) -> ThresholdSource {
        self.threshold_source
    }

    pub fn summary(&self) -> DensitySummary {
        DensitySummary {
            cols: self.cols,
            rows: self.rows,
            cell_width: self.cell_size.width,
            cell_height: self.cell_size.height,
            mean: self.mean,
            variance: self.variance,
            coefficient_of_variation: self.coefficient_of_variation(),
            heavy_cells: self.heavy_cells,
            threshold: self.threshold,
            threshold_source: self.threshold_source,
        }
    }
}

/// Build the density grid of `image`.
///
/// Deterministic: the same pixels and cell size always give the same grid.
#[instrument(skip_all, fields(width = image.width(), height = image.height(), cell_w = cell_size.width, cell_h = cell_size.height))]
pub fn analyze(image: &RasterImage, cell_size: CellSize, options: &DensityConfig) -> DensityGrid {
    let gray = image.to_gray();
    let binary = binarize(&gray, options.fixed_threshold);
    debug!(
        threshold = binary.threshold,
        source = ?binary.source,
        ink_pixels = binary.ink_pixels,
        "Image binarised"
    );

    let (width, height) = binary.mask.dimensions();
    let cell_w = cell_size.width.max(1);
    let cell_h = cell_size.height.max(1);
    let cols = width.div_ceil(cell_w);
    let rows = height.div_ceil(cell_h);

    let integral = compute_integral_mask(&binary.mask);
    let stride = (width + 1) as usize;

    let mut cells = Vec::with_capacity((cols * rows) as usize);
    for row in 0..rows {
        for col in 0..cols {
            let x0 = (col * cell_w) as usize;
            let y0 = (row * cell_h) as usize;
            let x1 = ((col + 1) * cell_w).min(width) as usize;
            let y1 = ((row + 1) * cell_h).min(height) as usize;

            // Summed-area table lookup: S = I[y1][x1] - I[y0][x1] - I[y1][x0] + I[y0][x0]
            let ink = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                - integral[y0 * stride + x1]
                - integral[y1 * stride + x0];
            let area = ((x1 - x0) * (y1 - y0)) as f64;
            cells.push(ink as f64 / area);
        }
    }

    let grid = DensityGrid::from_cells(
        width,
        height,
        CellSize {
            width: cell_w,
            height: cell_h,
        },
        cells,
        options.heavy_ink_percentile,
        binary.threshold,
        binary.source,
    );
    debug!(
        cols = grid.cols(),
        rows = grid.rows(),
        mean = grid.mean(),
        variance = grid.variance(),
        heavy_cells = grid.heavy_cells(),
        "Density grid computed"
    );
    grid
}

// -- Helpers ------------------------------------------------------------------

/// Summed-area table of ink pixels.
///
/// `table[y * (width+1) + x]` holds the number of ink pixels in the rectangle
/// [0, 0) to (x, y), exclusive on both axes, with a zero-padded border.
fn compute_integral_mask(mask: &GrayImage) -> Vec<u64> {
    let (w, h) = mask.dimensions();
    let stride = (w + 1) as usize;
    let mut table = vec![0u64; stride * (h + 1) as usize];

    for y in 0..h {
        let mut row_sum: u64 = 0;
        for x in 0..w {
            if mask.get_pixel(x, y).0[0] == INK {
                row_sum += 1;
            }
            let idx = (y + 1) as usize * stride + (x + 1) as usize;
            let above = y as usize * stride + (x + 1) as usize;
            table[idx] = row_sum + table[above];
        }
    }

    table
}

/// Compute the Otsu threshold for a grayscale image.
///
/// Finds the gray level that maximises the between-class variance of the dark
/// and light pixel groups. Returns `None` when only one class is populated.
fn otsu_threshold(gray: &GrayImage) -> Option<u8> {
    let histogram = histogram(gray);

    let total_pixels = gray.width() as u64 * gray.height() as u64;
    if total_pixels == 0 {
        return None;
    }

    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut sum_background: f64 = 0.0;
    let mut weight_background: u64 = 0;
    let mut max_variance: f64 = 0.0;
    let mut best_threshold: Option<u8> = None;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total_pixels - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;

        let between_variance = weight_background as f64
            * weight_foreground as f64
            * (mean_background - mean_foreground).powi(2);

        if between_variance > max_variance {
            max_variance = between_variance;
            best_threshold = Some(t as u8);
        }
    }

    best_threshold
}

/// Value at fraction `p` of the sorted densities (nearest rank).
fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = ((sorted.len() - 1) as f64 * p.clamp(0.0, 1.0)).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster(gray: GrayImage) -> RasterImage {
        RasterImage::from_gray(gray).unwrap()
    }

    fn options() -> DensityConfig {
        DensityConfig::default()
    }

    #[test]
    fn grid_dimensions_round_up() {
        let image = raster(GrayImage::from_pixel(100, 70, Luma([255u8])));
        let grid = analyze(&image, CellSize { width: 32, height: 16 }, &options());
        assert_eq!(grid.cols(), 4);
        assert_eq!(grid.rows(), 5);
        assert_eq!(grid.cells().len(), 20);
    }

    #[test]
    fn image_smaller_than_a_cell_is_one_cell() {
        let image = raster(GrayImage::from_pixel(10, 7, Luma([0u8])));
        let grid = analyze(&image, CellSize::square(32), &options());
        assert_eq!((grid.cols(), grid.rows()), (1, 1));
    }

    #[test]
    fn densities_measure_clipped_edge_cells() {
        // Left 40 columns black, rest white; 64x32 image in 32px cells.
        let gray = GrayImage::from_fn(64, 32, |x, _| Luma([if x < 40 { 0 } else { 255 }]));
        let grid = analyze(&raster(gray), CellSize::square(32), &options());
        assert_eq!(grid.threshold_source(), ThresholdSource::Otsu);
        assert_eq!(grid.get(0, 0), Some(1.0));
        assert_eq!(grid.get(1, 0), Some(8.0 / 32.0));
        assert!(grid.cells().iter().all(|d| (0.0..=1.0).contains(d)));
    }

    #[test]
    fn uniform_field_uses_fixed_threshold() {
        let gray = GrayImage::from_pixel(40, 40, Luma([200u8]));
        let binary = binarize(&gray, 128);
        assert_eq!(binary.source, ThresholdSource::Fixed);
        assert_eq!(binary.ink_pixels, 0);

        let dark = binarize(&GrayImage::from_pixel(40, 40, Luma([60u8])), 128);
        assert_eq!(dark.ink_pixels, 1600);
    }

    #[test]
    fn otsu_separates_two_levels() {
        let gray = GrayImage::from_fn(20, 20, |x, _| Luma([if x < 5 { 40 } else { 220 }]));
        let binary = binarize(&gray, 128);
        assert_eq!(binary.source, ThresholdSource::Otsu);
        assert!(binary.threshold >= 40 && binary.threshold < 220);
        assert_eq!(binary.ink_pixels, 100);
    }

    #[test]
    fn blank_grid_has_no_variation() {
        let grid = analyze(
            &raster(GrayImage::from_pixel(64, 64, Luma([255u8]))),
            CellSize::square(16),
            &options(),
        );
        assert_eq!(grid.mean(), 0.0);
        assert_eq!(grid.coefficient_of_variation(), None);
        assert_eq!(grid.heavy_cells(), 0);
    }

    #[test]
    fn heavy_cells_count_the_top_percentile() {
        let mut cells = vec![0.1; 9];
        cells.push(0.9);
        let grid = DensityGrid::from_cells(
            320,
            32,
            CellSize::square(32),
            cells,
            0.8,
            128,
            ThresholdSource::Fixed,
        );
        assert_eq!(grid.heavy_cells(), 1);
        assert!((grid.mean() - 0.18).abs() < 1e-12);
    }

    #[test]
    fn analysis_is_deterministic() {
        let gray = GrayImage::from_fn(90, 45, |x, y| Luma([((x * 31 + y * 17) % 256) as u8]));
        let image = raster(gray);
        let a = analyze(&image, CellSize::square(16), &options());
        let b = analyze(&image, CellSize::square(16), &options());
        assert_eq!(a, b);
    }
}
