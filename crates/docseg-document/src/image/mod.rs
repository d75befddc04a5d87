// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module: the immutable raster type plus decode/encode, downscale and
// rotation helpers.

pub mod processor;
pub mod raster;

pub use processor::ImageProcessor;
pub use raster::RasterImage;
