// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// RasterImage: the immutable pixel buffer every pipeline stage reads from.

use std::sync::Arc;

use docseg_core::error::{DocsegError, Result};
use docseg_core::RegionBox;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, LumaA, Rgb, RgbImage, Rgba};

/// Owned, read-only page image.
///
/// The buffer is normalised on construction to 8-bit gray or 8-bit RGB and
/// shared behind an `Arc`, so cloning a `RasterImage` never copies pixels.
/// Every transform returns a new buffer; nothing mutates a `RasterImage`
/// after it has been built.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pixels: Arc<DynamicImage>,
}

impl RasterImage {
    /// Validate and normalise a decoded image.
    ///
    /// Alpha is composited onto white, 16-bit and float layouts are reduced
    /// to 8 bits. Zero-sized images are rejected with `InvalidImage`.
    pub fn new(image: DynamicImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DocsegError::InvalidImage(format!(
                "image has zero size ({}x{})",
                image.width(),
                image.height()
            )));
        }

        let normalised = match image {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => image,
            DynamicImage::ImageLumaA8(gray_alpha) => {
                DynamicImage::ImageLuma8(flatten_luma_alpha(&gray_alpha))
            }
            DynamicImage::ImageRgba8(rgba) => DynamicImage::ImageRgb8(flatten_rgba(&rgba)),
            other => {
                let color = other.color();
                match (color.has_color(), color.has_alpha()) {
                    (_, true) => DynamicImage::ImageRgb8(flatten_rgba(&other.to_rgba8())),
                    (true, false) => DynamicImage::ImageRgb8(other.to_rgb8()),
                    (false, false) => DynamicImage::ImageLuma8(other.to_luma8()),
                }
            }
        };

        Ok(Self {
            pixels: Arc::new(normalised),
        })
    }

    pub fn from_gray(gray: GrayImage) -> Result<Self> {
        Self::new(DynamicImage::ImageLuma8(gray))
    }

    pub fn from_rgb(rgb: RgbImage) -> Result<Self> {
        Self::new(DynamicImage::ImageRgb8(rgb))
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// 1 for gray images, 3 for colour.
    pub fn channels(&self) -> u8 {
        match self.pixels.as_ref() {
            DynamicImage::ImageLuma8(_) => 1,
            _ => 3,
        }
    }

    /// Borrow the normalised buffer.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.pixels
    }

    /// True when both values share the same underlying buffer.
    pub fn shares_buffer_with(&self, other: &RasterImage) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    // -- Derived buffers ------------------------------------------------------

    /// A fresh 8-bit grayscale copy.
    pub fn to_gray(&self) -> GrayImage {
        self.pixels.to_luma8()
    }

    /// A fresh 8-bit RGB copy.
    pub fn to_rgb(&self) -> RgbImage {
        self.pixels.to_rgb8()
    }

    /// Slice out the pixels under `region` without any resampling.
    pub fn crop(&self, region: &RegionBox) -> Result<RasterImage> {
        if !region.is_within(self.width(), self.height()) {
            return Err(DocsegError::DegenerateGeometry(format!(
                "region {}x{} at ({}, {}) exceeds image {}x{}",
                region.width,
                region.height,
                region.x,
                region.y,
                self.width(),
                self.height()
            )));
        }
        let cropped = self
            .pixels
            .crop_imm(region.x, region.y, region.width, region.height);
        Ok(Self {
            pixels: Arc::new(cropped),
        })
    }
}

impl PartialEq for RasterImage {
    fn eq(&self, other: &Self) -> bool {
        self.shares_buffer_with(other) || *self.pixels == *other.pixels
    }
}

/// Composite an alpha channel onto a white background.
fn blend_on_white(channel: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((channel as u32 * a + 255 * (255 - a) + 127) / 255) as u8
}

fn flatten_rgba(rgba: &ImageBuffer<Rgba<u8>, Vec<u8>>) -> RgbImage {
    ImageBuffer::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        Rgb([blend_on_white(r, a), blend_on_white(g, a), blend_on_white(b, a)])
    })
}

fn flatten_luma_alpha(gray_alpha: &ImageBuffer<LumaA<u8>, Vec<u8>>) -> GrayImage {
    ImageBuffer::from_fn(gray_alpha.width(), gray_alpha.height(), |x, y| {
        let LumaA([l, a]) = *gray_alpha.get_pixel(x, y);
        Luma([blend_on_white(l, a)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use docseg_core::RegionKind;
    use image::RgbaImage;

    #[test]
    fn zero_sized_image_is_invalid() {
        let err = RasterImage::from_gray(GrayImage::new(0, 10)).unwrap_err();
        assert!(matches!(err, DocsegError::InvalidImage(_)));
    }

    #[test]
    fn transparent_pixels_become_white() {
        let rgba = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 0]));
        let raster = RasterImage::new(DynamicImage::ImageRgba8(rgba)).unwrap();
        assert_eq!(raster.channels(), 3);
        assert_eq!(raster.to_rgb().get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn opaque_pixels_keep_their_colour() {
        let rgba = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255]));
        let raster = RasterImage::new(DynamicImage::ImageRgba8(rgba)).unwrap();
        assert_eq!(raster.to_rgb().get_pixel(1, 1), &Rgb([10, 20, 30]));
    }

    #[test]
    fn clones_share_the_buffer() {
        let raster = RasterImage::from_gray(GrayImage::new(8, 8)).unwrap();
        let copy = raster.clone();
        assert!(copy.shares_buffer_with(&raster));
        assert_eq!(copy, raster);
    }

    #[test]
    fn crop_slices_exact_pixels() {
        let gray = GrayImage::from_fn(10, 10, |x, y| Luma([(x + 10 * y) as u8]));
        let raster = RasterImage::from_gray(gray).unwrap();
        let region = RegionBox::new(2, 3, 4, 5, RegionKind::Text).unwrap();
        let crop = raster.crop(&region).unwrap();
        assert_eq!(crop.dimensions(), (4, 5));
        assert_eq!(crop.to_gray().get_pixel(0, 0), &Luma([32]));
        assert_eq!(crop.to_gray().get_pixel(3, 4), &Luma([75]));
    }

    #[test]
    fn crop_outside_bounds_is_rejected() {
        let raster = RasterImage::from_gray(GrayImage::new(10, 10)).unwrap();
        let region = RegionBox::new(8, 8, 4, 4, RegionKind::Text).unwrap();
        assert!(raster.crop(&region).is_err());
    }
}
