// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: decoding, encoding, downscaling and canvas-expanding
// rotation. Operates on in-memory images using the `image` and `imageproc`
// crates and hands validated `RasterImage` values to the segmentation engine.

use docseg_core::error::{DocsegError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Pixel, Rgb};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use tracing::{debug, info, instrument};

use super::raster::RasterImage;

/// Image processing steps around the segmentation engine.
///
/// All operations are non-destructive: each method consumes `self` and returns a
/// new `ImageProcessor` wrapping the transformed image, enabling method chaining.
///
/// ```ignore
/// let page = ImageProcessor::open("scan.jpg")?
///     .deskew(2.5, 0.5)
///     .into_raster()?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let img = image::open(path.as_ref()).map_err(|err| {
            DocsegError::InvalidImage(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        info!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Create a processor from raw encoded bytes (JPEG, PNG, GIF, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data).map_err(|err| {
            DocsegError::InvalidImage(format!("failed to decode image: {}", err))
        })?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Start from a raster the engine already owns. Copies the pixels.
    pub fn from_raster(raster: &RasterImage) -> Self {
        Self {
            image: raster.as_dynamic().clone(),
        }
    }

    // -- Accessors ------------------------------------------------------------

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the underlying `DynamicImage`.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// Validate and convert into the engine's immutable raster type.
    pub fn into_raster(self) -> Result<RasterImage> {
        RasterImage::new(self.image)
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Shrink the image so its longer side is at most `max_dimension`,
    /// preserving aspect ratio. Images already small enough are untouched.
    pub fn downscale(self, max_dimension: u32) -> Self {
        let longest = self.image.width().max(self.image.height());
        if longest <= max_dimension || max_dimension == 0 {
            return self;
        }
        let resized = self
            .image
            .resize(max_dimension, max_dimension, FilterType::Triangle);
        debug!(
            from = longest,
            new_w = resized.width(),
            new_h = resized.height(),
            "Downscaled image"
        );
        Self { image: resized }
    }

    /// Rotate the image clockwise by `degrees` about its centre.
    ///
    /// The canvas grows to hold the whole rotated page and uncovered pixels
    /// are filled with white. Multiples of 90 degrees use lossless rotation.
    #[instrument(skip(self))]
    pub fn rotate(self, degrees: f32) -> Self {
        let normalised = degrees.rem_euclid(360.0);
        if normalised.abs() < 0.01 || (normalised - 360.0).abs() < 0.01 {
            return self;
        }
        if (normalised - 90.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate90(),
            };
        }
        if (normalised - 180.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate180(),
            };
        }
        if (normalised - 270.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate270(),
            };
        }

        let radians = degrees.to_radians();
        let rotated = match self.image {
            DynamicImage::ImageLuma8(gray) => {
                DynamicImage::ImageLuma8(rotate_expanded(&gray, radians, Luma([255u8])))
            }
            other => DynamicImage::ImageRgb8(rotate_expanded(
                &other.to_rgb8(),
                radians,
                Rgb([255u8, 255, 255]),
            )),
        };
        debug!(
            new_w = rotated.width(),
            new_h = rotated.height(),
            "General rotation applied"
        );
        Self { image: rotated }
    }

    /// Undo a measured skew of `angle_degrees`.
    ///
    /// Rotations of `min_angle` degrees or less are skipped; the image comes
    /// back unchanged.
    #[instrument(skip(self))]
    pub fn deskew(self, angle_degrees: f64, min_angle: f64) -> Self {
        if !angle_degrees.is_finite() || angle_degrees.abs() <= min_angle {
            debug!(angle_degrees, min_angle, "Skew below threshold; not rotating");
            return self;
        }
        info!(angle_degrees, "Applying deskew correction");
        self.rotate(-angle_degrees as f32)
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_to_format(&self.image, ImageFormat::Png)
    }

    /// Encode the current image as JPEG bytes with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
        rgb.write_with_encoder(encoder)
            .map_err(|err| DocsegError::ImageError(format!("JPEG encoding failed: {}", err)))?;
        Ok(buffer)
    }

    /// Write the image to a file. The format is inferred from the file extension.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        self.image.save(path.as_ref()).map_err(|err| {
            DocsegError::ImageError(format!(
                "failed to save image to {}: {}",
                path.as_ref().display(),
                err
            ))
        })
    }
}

/// Rotate onto a canvas large enough for the rotated bounds.
fn rotate_expanded<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    radians: f32,
    fill: P,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + Send + Sync,
{
    let (w, h) = image.dimensions();
    let (sin, cos) = radians.sin_cos();
    let new_w = (w as f32 * cos.abs() + h as f32 * sin.abs()).ceil().max(1.0) as u32;
    let new_h = (h as f32 * cos.abs() + w as f32 * sin.abs()).ceil().max(1.0) as u32;

    let mut canvas = ImageBuffer::from_pixel(new_w.max(w), new_h.max(h), fill);
    let offset_x = (canvas.width() - w) / 2;
    let offset_y = (canvas.height() - h) / 2;
    for (x, y, pixel) in image.enumerate_pixels() {
        canvas.put_pixel(x + offset_x, y + offset_y, *pixel);
    }

    rotate_about_center(&canvas, radians, Interpolation::Bilinear, fill)
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, format)
        .map_err(|err| DocsegError::ImageError(format!("image encoding failed: {}", err)))?;
    Ok(buffer)
}
