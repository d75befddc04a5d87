// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Region renderer: overlays, binary text mask and per-region crops.
//
// Every artifact is a fresh buffer; the source raster is only read.

use docseg_core::config::RenderConfig;
use docseg_core::error::Result;
use docseg_core::{EntropyScore, RegionBox, RegionKind, SegmentationMode, SkewEstimate};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::density::DensitySummary;
use super::regions::RegionLayout;
use crate::image::{ImageProcessor, RasterImage};

/// Inset of the single border drawn in simplified mode.
const SIMPLIFIED_INSET: u32 = 5;

/// JPEG quality for the visual overlays.
const OVERLAY_JPEG_QUALITY: u8 = 90;

/// Visual artifacts for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlays {
    /// Source with bordered text regions.
    pub text_regions: RasterImage,
    /// 255 inside text regions, 0 elsewhere.
    pub text_mask: RasterImage,
    /// Source with text regions in one colour and image regions in another.
    pub combined: RasterImage,
}

/// Sub-image cut from the source for one text region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCrop {
    pub region: RegionBox,
    pub image: RasterImage,
}

/// Everything the engine produces for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationResult {
    pub mode: SegmentationMode,
    /// Text regions in detection order, then image regions.
    pub regions: Vec<RegionBox>,
    pub text_crops: Vec<RegionCrop>,
    pub overlays: Overlays,
    /// The input raster; shares its pixel buffer with the caller's copy.
    pub original: RasterImage,
    pub whole_page_fallback: bool,
    /// Attached by the pipeline.
    pub entropy: Option<EntropyScore>,
    pub density: Option<DensitySummary>,
    pub skew: Option<SkewEstimate>,
}

/// Serializable view of a result: geometry and statistics, no pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentationSummary {
    pub mode: SegmentationMode,
    pub width: u32,
    pub height: u32,
    pub text_region_count: usize,
    pub image_region_count: usize,
    pub whole_page_fallback: bool,
    pub regions: Vec<RegionBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entropy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density: Option<DensitySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skew: Option<SkewEstimate>,
}

/// Encoded artifacts ready to be written out: JPEG for the visual
/// overlays, PNG for the mask and the crops.
#[derive(Debug, Clone)]
pub struct EncodedArtifacts {
    pub text_regions_jpeg: Vec<u8>,
    pub combined_jpeg: Vec<u8>,
    pub text_mask_png: Vec<u8>,
    pub crops_png: Vec<Vec<u8>>,
}

impl SegmentationResult {
    pub fn text_regions(&self) -> impl Iterator<Item = &RegionBox> {
        self.regions.iter().filter(|r| r.kind == RegionKind::Text)
    }

    pub fn image_regions(&self) -> impl Iterator<Item = &RegionBox> {
        self.regions.iter().filter(|r| r.kind == RegionKind::Image)
    }

    pub fn summary(&self) -> SegmentationSummary {
        SegmentationSummary {
            mode: self.mode,
            width: self.original.width(),
            height: self.original.height(),
            text_region_count: self.text_regions().count(),
            image_region_count: self.image_regions().count(),
            whole_page_fallback: self.whole_page_fallback,
            regions: self.regions.clone(),
            entropy: self.entropy.map(|e| e.bits()),
            density: self.density.clone(),
            skew: self.skew.clone(),
        }
    }

    #[instrument(skip(self), fields(crops = self.text_crops.len()))]
    pub fn encode_artifacts(&self) -> Result<EncodedArtifacts> {
        let jpeg = |raster: &RasterImage| {
            ImageProcessor::from_raster(raster).to_jpeg_bytes(OVERLAY_JPEG_QUALITY)
        };
        let png = |raster: &RasterImage| ImageProcessor::from_raster(raster).to_png_bytes();

        let crops_png = self
            .text_crops
            .iter()
            .map(|crop| png(&crop.image))
            .collect::<Result<Vec<_>>>()?;

        Ok(EncodedArtifacts {
            text_regions_jpeg: jpeg(&self.overlays.text_regions)?,
            combined_jpeg: jpeg(&self.overlays.combined)?,
            text_mask_png: png(&self.overlays.text_mask)?,
            crops_png,
        })
    }
}

/// Draw overlays and cut crops for `layout`.
///
/// In simplified mode the layout is replaced by one full-page text region,
/// the mask is fully set, and the bordered overlay gets a single inset frame.
#[instrument(skip_all, fields(mode = %mode, width = image.width(), height = image.height()))]
pub fn render(
    image: &RasterImage,
    layout: &RegionLayout,
    mode: SegmentationMode,
    config: &RenderConfig,
) -> Result<SegmentationResult> {
    let (width, height) = image.dimensions();
    let text_color = Rgb(config.text_color);
    let image_color = Rgb(config.image_color);

    let (text, image_regions, whole_page_fallback) = match mode {
        SegmentationMode::Simplified => (vec![RegionBox::full_page(width, height)?], Vec::new(), false),
        SegmentationMode::Adaptive => (
            layout.text.clone(),
            layout.image.clone(),
            layout.whole_page_fallback,
        ),
    };

    let source = image.to_rgb();
    let mut text_overlay = source.clone();
    let mut combined = source;
    let mut mask = GrayImage::new(width, height);

    match mode {
        SegmentationMode::Simplified => {
            if let Some(frame) = inset_frame(width, height) {
                draw_border(&mut text_overlay, &frame, config.border_thickness, text_color);
                draw_border(&mut combined, &frame, config.border_thickness, text_color);
            }
            mask.pixels_mut().for_each(|p| *p = Luma([255]));
        }
        SegmentationMode::Adaptive => {
            for region in &text {
                draw_border(&mut text_overlay, region, config.border_thickness, text_color);
                draw_border(&mut combined, region, config.border_thickness, text_color);
                draw_filled_rect_mut(&mut mask, to_rect(region), Luma([255]));
            }
            for region in &image_regions {
                draw_border(&mut combined, region, config.border_thickness, image_color);
            }
        }
    }

    let text_crops = crop_regions(image, &text);
    let regions: Vec<RegionBox> = text.into_iter().chain(image_regions).collect();
    debug!(
        regions = regions.len(),
        crops = text_crops.len(),
        "Overlays rendered"
    );

    Ok(SegmentationResult {
        mode,
        regions,
        text_crops,
        overlays: Overlays {
            text_regions: RasterImage::from_rgb(text_overlay)?,
            text_mask: RasterImage::from_gray(mask)?,
            combined: RasterImage::from_rgb(combined)?,
        },
        original: image.clone(),
        whole_page_fallback,
        entropy: None,
        density: None,
        skew: None,
    })
}

fn crop_regions(image: &RasterImage, regions: &[RegionBox]) -> Vec<RegionCrop> {
    regions
        .iter()
        .filter_map(|region| match image.crop(region) {
            Ok(cropped) => Some(RegionCrop {
                region: *region,
                image: cropped,
            }),
            Err(err) => {
                warn!(%err, ?region, "Skipping crop");
                None
            }
        })
        .collect()
}

/// Frame drawn around a simplified page, inset from the edges when the
/// page is large enough.
fn inset_frame(width: u32, height: u32) -> Option<RegionBox> {
    let inset = if width > 4 * SIMPLIFIED_INSET && height > 4 * SIMPLIFIED_INSET {
        SIMPLIFIED_INSET
    } else {
        0
    };
    RegionBox::new(
        inset,
        inset,
        width - 2 * inset,
        height - 2 * inset,
        RegionKind::Text,
    )
    .ok()
}

/// Hollow rectangle `thickness` pixels wide, growing inwards from `region`.
fn draw_border(canvas: &mut RgbImage, region: &RegionBox, thickness: u32, color: Rgb<u8>) {
    for t in 0..thickness {
        if region.width <= 2 * t || region.height <= 2 * t {
            break;
        }
        let rect = Rect::at((region.x + t) as i32, (region.y + t) as i32)
            .of_size(region.width - 2 * t, region.height - 2 * t);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

fn to_rect(region: &RegionBox) -> Rect {
    Rect::at(region.x as i32, region.y as i32).of_size(region.width, region.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
    const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

    fn page() -> RasterImage {
        RasterImage::from_gray(GrayImage::from_pixel(100, 80, Luma([255u8]))).unwrap()
    }

    fn layout() -> RegionLayout {
        RegionLayout {
            text: vec![RegionBox::new(10, 10, 30, 20, RegionKind::Text).unwrap()],
            image: vec![RegionBox::new(0, 50, 100, 30, RegionKind::Image).unwrap()],
            whole_page_fallback: false,
            merge_capped: false,
        }
    }

    #[test]
    fn adaptive_overlays_mark_regions() {
        let result = render(&page(), &layout(), SegmentationMode::Adaptive, &RenderConfig::default())
            .unwrap();

        let overlay = result.overlays.text_regions.to_rgb();
        assert_eq!(overlay.get_pixel(10, 10), &GREEN);
        assert_eq!(overlay.get_pixel(12, 15), &GREEN);
        // Inside the border, past the thickness.
        assert_eq!(overlay.get_pixel(20, 20), &Rgb([255, 255, 255]));
        // Image regions only appear on the combined overlay.
        assert_eq!(overlay.get_pixel(0, 50), &Rgb([255, 255, 255]));

        let combined = result.overlays.combined.to_rgb();
        assert_eq!(combined.get_pixel(10, 10), &GREEN);
        assert_eq!(combined.get_pixel(0, 50), &BLUE);

        let mask = result.overlays.text_mask.to_gray();
        assert_eq!(mask.get_pixel(25, 20), &Luma([255]));
        assert_eq!(mask.get_pixel(9, 9), &Luma([0]));
        assert_eq!(mask.get_pixel(39, 29), &Luma([255]));
        assert_eq!(mask.get_pixel(40, 30), &Luma([0]));
    }

    #[test]
    fn regions_list_text_then_image() {
        let result = render(&page(), &layout(), SegmentationMode::Adaptive, &RenderConfig::default())
            .unwrap();
        let kinds: Vec<_> = result.regions.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![RegionKind::Text, RegionKind::Image]);
        assert_eq!(result.text_crops.len(), 1);
        assert_eq!(result.text_crops[0].image.dimensions(), (30, 20));
    }

    #[test]
    fn simplified_covers_whole_page() {
        let result = render(&page(), &layout(), SegmentationMode::Simplified, &RenderConfig::default())
            .unwrap();
        assert_eq!(result.regions, vec![RegionBox::full_page(100, 80).unwrap()]);
        assert!(result.overlays.text_mask.to_gray().pixels().all(|p| p.0[0] == 255));
        assert_eq!(result.text_crops[0].image, page());

        let overlay = result.overlays.text_regions.to_rgb();
        assert_eq!(overlay.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(overlay.get_pixel(5, 5), &GREEN);
    }

    #[test]
    fn source_is_shared_not_copied() {
        let source = page();
        let result = render(&source, &layout(), SegmentationMode::Adaptive, &RenderConfig::default())
            .unwrap();
        assert!(result.original.shares_buffer_with(&source));
        assert!(source.to_gray().pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn summary_counts_and_encodes() {
        let result = render(&page(), &layout(), SegmentationMode::Adaptive, &RenderConfig::default())
            .unwrap();
        let summary = result.summary();
        assert_eq!(summary.text_region_count, 1);
        assert_eq!(summary.image_region_count, 1);
        assert_eq!((summary.width, summary.height), (100, 80));

        let artifacts = result.encode_artifacts().unwrap();
        assert_eq!(&artifacts.text_mask_png[1..4], b"PNG");
        assert_eq!(&artifacts.combined_jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(artifacts.crops_png.len(), 1);
    }

    #[test]
    fn thin_regions_get_partial_border() {
        let mut canvas = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
        let sliver = RegionBox::new(2, 2, 2, 6, RegionKind::Text).unwrap();
        draw_border(&mut canvas, &sliver, 5, GREEN);
        assert_eq!(canvas.get_pixel(2, 2), &GREEN);
        assert_eq!(canvas.get_pixel(3, 7), &GREEN);
        assert_eq!(canvas.get_pixel(4, 4), &Rgb([255, 255, 255]));
    }
}
