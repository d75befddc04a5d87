// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Region detection for adaptive segmentation.
//
// ## Pipeline
//
// 1. Mark grid cells denser than `text_density_threshold` as text candidates
// 2. Label 4-connected components of the candidate mask
// 3. Map each component to a pixel-space bounding box (clipped to the image)
// 4. Drop boxes below `min_region_area`
// 5. Merge boxes that overlap or sit within `merge_padding` of each other,
//    repeating until nothing changes (capped at the initial box count)
// 6. Sort text boxes top-to-bottom, then left-to-right
// 7. Derive image regions from the page area not covered by padded text
//
// Image regions are an exact decomposition of the uncovered area: the page is
// cut into horizontal bands at every padded text edge, each band contributes
// its uncovered x-intervals, and vertically adjacent pieces spanning the same
// x-interval are coalesced. The pieces never overlap text and together cover
// the whole remainder, but they are not guaranteed to be maximal rectangles.

use std::collections::BTreeMap;

use docseg_core::config::RegionConfig;
use docseg_core::error::{DocsegError, Result};
use docseg_core::{RegionBox, RegionKind};
use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use tracing::{debug, instrument, warn};

use super::density::DensityGrid;

/// Text and image boxes detected on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionLayout {
    /// Text regions in `(y, x)` order.
    pub text: Vec<RegionBox>,
    /// Image regions in `(y, x)` order.
    pub image: Vec<RegionBox>,
    /// True when detection found nothing usable and the page became one
    /// text region.
    pub whole_page_fallback: bool,
    /// True when the merge loop hit its iteration cap.
    pub merge_capped: bool,
}

impl RegionLayout {
    /// A single text region spanning the page.
    pub fn whole_page(width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            text: vec![RegionBox::full_page(width, height)?],
            image: Vec::new(),
            whole_page_fallback: false,
            merge_capped: false,
        })
    }

    /// Text regions followed by image regions.
    pub fn all(&self) -> impl Iterator<Item = &RegionBox> {
        self.text.iter().chain(self.image.iter())
    }
}

/// Locate text and image regions from a density grid.
#[instrument(skip(grid, config), fields(cols = grid.cols(), rows = grid.rows()))]
pub fn detect(
    grid: &DensityGrid,
    image_size: (u32, u32),
    config: &RegionConfig,
) -> Result<RegionLayout> {
    let (width, height) = image_size;
    if width == 0 || height == 0 {
        return Err(DocsegError::InvalidImage(format!(
            "cannot detect regions on a {width}x{height} page"
        )));
    }

    // Step 1: candidate mask, one pixel per cell.
    let mut candidates = 0usize;
    let mask = GrayImage::from_fn(grid.cols(), grid.rows(), |col, row| {
        let dense = grid
            .get(col, row)
            .is_some_and(|d| d > config.text_density_threshold);
        if dense {
            candidates += 1;
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });

    if candidates == 0 {
        warn!("No text-candidate cells on an adaptive page; using the whole page");
        return whole_page_fallback(width, height);
    }

    // Step 2+3: connected components → pixel boxes.
    let boxes = component_boxes(grid, &mask, width, height);
    debug!(
        candidates,
        components = boxes.len(),
        "Connected components labelled"
    );

    // Step 4: noise filter.
    let boxes: Vec<RegionBox> = boxes
        .into_iter()
        .filter(|b| b.area() >= config.min_region_area)
        .collect();
    if boxes.is_empty() {
        warn!(
            min_area = config.min_region_area,
            "Every component fell below the minimum area; using the whole page"
        );
        return whole_page_fallback(width, height);
    }

    // Step 5+6: merge and order.
    // n boxes settle in at most n - 1 merges.
    let max_rounds = boxes.len();
    let (mut text, merge_capped) = merge_nearby(boxes, config.merge_padding, max_rounds);
    sort_reading_order(&mut text);

    // Step 7: complement.
    let image = complement_regions(&text, width, height, config);

    debug!(
        text_regions = text.len(),
        image_regions = image.len(),
        "Regions detected"
    );
    Ok(RegionLayout {
        text,
        image,
        whole_page_fallback: false,
        merge_capped,
    })
}

fn whole_page_fallback(width: u32, height: u32) -> Result<RegionLayout> {
    let mut layout = RegionLayout::whole_page(width, height)?;
    layout.whole_page_fallback = true;
    Ok(layout)
}

/// Bounding boxes of the 4-connected components in `mask`, in label order.
fn component_boxes(grid: &DensityGrid, mask: &GrayImage, width: u32, height: u32) -> Vec<RegionBox> {
    let labels = connected_components(mask, Connectivity::Four, Luma([0u8]));

    // label -> (min_col, min_row, max_col, max_row)
    let mut extents: BTreeMap<u32, (u32, u32, u32, u32)> = BTreeMap::new();
    for (col, row, label) in labels.enumerate_pixels() {
        let label = label.0[0];
        if label == 0 {
            continue;
        }
        extents
            .entry(label)
            .and_modify(|e| {
                e.0 = e.0.min(col);
                e.1 = e.1.min(row);
                e.2 = e.2.max(col);
                e.3 = e.3.max(row);
            })
            .or_insert((col, row, col, row));
    }

    let cell = grid.cell_size();
    extents
        .into_values()
        .filter_map(|(min_col, min_row, max_col, max_row)| {
            let x0 = min_col * cell.width;
            let y0 = min_row * cell.height;
            let x1 = ((max_col + 1) * cell.width).min(width);
            let y1 = ((max_row + 1) * cell.height).min(height);
            match RegionBox::new(
                x0,
                y0,
                x1.saturating_sub(x0),
                y1.saturating_sub(y0),
                RegionKind::Text,
            ) {
                Ok(region) => Some(region),
                Err(err) => {
                    warn!(%err, "Skipping component outside the page");
                    None
                }
            }
        })
        .collect()
}

/// Merge boxes that overlap or lie within `padding` pixels until no pair
/// qualifies, for at most `max_rounds` rounds. Each round merges one pair.
/// When pairs still qualify after the last round this is reported as
/// degenerate geometry, the current set is kept and the flag is set.
fn merge_nearby(
    mut boxes: Vec<RegionBox>,
    padding: u32,
    max_rounds: usize,
) -> (Vec<RegionBox>, bool) {
    for _ in 0..max_rounds {
        let Some((i, j)) = near_pair(&boxes, padding) else {
            return (boxes, false);
        };
        let other = boxes.swap_remove(j);
        boxes[i] = boxes[i].union(&other);
    }

    if near_pair(&boxes, padding).is_none() {
        return (boxes, false);
    }
    let err = DocsegError::DegenerateGeometry(format!(
        "region merge did not settle within {max_rounds} rounds"
    ));
    warn!(%err, remaining = boxes.len(), "Stopping region merge");
    (boxes, true)
}

/// First `(i, j)` with `i < j` whose boxes are within `padding`.
fn near_pair(boxes: &[RegionBox], padding: u32) -> Option<(usize, usize)> {
    (0..boxes.len()).find_map(|i| {
        ((i + 1)..boxes.len())
            .find(|&j| boxes[i].is_near(&boxes[j], padding))
            .map(|j| (i, j))
    })
}

fn sort_reading_order(boxes: &mut [RegionBox]) {
    boxes.sort_by_key(|b| (b.y, b.x));
}

/// Rectangles covering the page minus the padded union of `text`.
fn complement_regions(
    text: &[RegionBox],
    width: u32,
    height: u32,
    config: &RegionConfig,
) -> Vec<RegionBox> {
    let padded: Vec<RegionBox> = text
        .iter()
        .map(|b| b.padded(config.merge_padding, width, height))
        .collect();

    let mut cuts: Vec<u32> = vec![0, height];
    for b in &padded {
        cuts.push(b.y);
        cuts.push(b.bottom());
    }
    cuts.sort_unstable();
    cuts.dedup();

    // (x0, x1, y0, y1) pieces, extended downward while the x-interval repeats.
    let mut pieces: Vec<(u32, u32, u32, u32)> = Vec::new();
    for band in cuts.windows(2) {
        let (y0, y1) = (band[0], band[1]);
        if y0 >= y1 {
            continue;
        }

        let mut covered: Vec<(u32, u32)> = padded
            .iter()
            .filter(|b| b.y <= y0 && b.bottom() >= y1)
            .map(|b| (b.x, b.right()))
            .collect();
        covered.sort_unstable();

        let mut cursor = 0u32;
        let mut gaps = Vec::new();
        for (x0, x1) in covered {
            if x0 > cursor {
                gaps.push((cursor, x0));
            }
            cursor = cursor.max(x1);
        }
        if cursor < width {
            gaps.push((cursor, width));
        }

        for (gx0, gx1) in gaps {
            match pieces
                .iter_mut()
                .find(|p| p.0 == gx0 && p.1 == gx1 && p.3 == y0)
            {
                Some(piece) => piece.3 = y1,
                None => pieces.push((gx0, gx1, y0, y1)),
            }
        }
    }

    let mut regions: Vec<RegionBox> = pieces
        .into_iter()
        .filter_map(|(x0, x1, y0, y1)| RegionBox::new(x0, y0, x1 - x0, y1 - y0, RegionKind::Image).ok())
        .filter(|b| b.area() >= config.min_region_area)
        .collect();
    sort_reading_order(&mut regions);
    regions
}
