// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-page processing and artifact export.
//
// For an input `scan.png` the output directory receives:
//   scan_text_regions.jpg   bordered text regions
//   scan_combined.jpg       text and image regions
//   scan_text_mask.png      binary text mask
//   scan_region_<n>.png     one crop per text region, n from 1
//   scan_report.json        geometry, skew, quality and provenance

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use docseg_document::analysis::quality;
use docseg_document::{ImageProcessor, QualityReport, SegmentationSummary, Segmenter};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

/// Everything written to `<stem>_report.json`.
#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    pub source: PathBuf,
    /// Hex SHA-256 of the source file bytes.
    pub source_sha256: String,
    pub processed_at: DateTime<Utc>,
    pub deskewed: bool,
    pub segmentation: SegmentationSummary,
    pub quality: QualityReport,
    /// File names written next to the report, report excluded.
    pub artifacts: Vec<String>,
}

/// Segment one image file and write its artifacts into `out_dir`.
#[instrument(skip(segmenter, path, out_dir), fields(path = %path.display()))]
pub fn process_file(
    segmenter: &Segmenter,
    path: &Path,
    out_dir: &Path,
    deskew: bool,
) -> Result<PageReport> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let source_sha256 = hex::encode(Sha256::digest(&bytes));

    let mut page = ImageProcessor::from_bytes(&bytes)?.into_raster()?;
    let mut deskewed = false;
    if deskew {
        let (corrected, estimate) = segmenter.deskew(&page)?;
        deskewed = !corrected.shares_buffer_with(&page);
        debug!(angle = estimate.angle_degrees, deskewed, "Deskew pass");
        page = corrected;
    }

    let result = segmenter.segment(&page)?;
    let quality = quality::assess(&page, result.skew.as_ref());
    let encoded = result.encode_artifacts()?;

    let stem = file_stem(path);
    let mut artifacts = Vec::with_capacity(3 + encoded.crops_png.len());
    let mut write = |name: String, data: &[u8]| -> Result<()> {
        let target = out_dir.join(&name);
        std::fs::write(&target, data)
            .with_context(|| format!("writing {}", target.display()))?;
        artifacts.push(name);
        Ok(())
    };

    write(format!("{stem}_text_regions.jpg"), &encoded.text_regions_jpeg)?;
    write(format!("{stem}_combined.jpg"), &encoded.combined_jpeg)?;
    write(format!("{stem}_text_mask.png"), &encoded.text_mask_png)?;
    for (index, crop) in encoded.crops_png.iter().enumerate() {
        write(format!("{stem}_region_{}.png", index + 1), crop)?;
    }

    let report = PageReport {
        source: path.to_path_buf(),
        source_sha256,
        processed_at: Utc::now(),
        deskewed,
        segmentation: result.summary(),
        quality,
        artifacts,
    };
    let report_path = out_dir.join(format!("{stem}_report.json"));
    std::fs::write(&report_path, serde_json::to_vec_pretty(&report)?)
        .with_context(|| format!("writing {}", report_path.display()))?;

    info!(
        mode = %report.segmentation.mode,
        regions = report.segmentation.regions.len(),
        score = report.quality.score,
        "Page exported"
    );
    Ok(report)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docseg_core::{SegmentationConfig, SegmentationMode};
    use image::{GrayImage, Luma};

    fn write_page(dir: &Path, name: &str, img: &GrayImage) -> PathBuf {
        let path = dir.join(name);
        img.save(&path).unwrap();
        path
    }

    fn two_blocks() -> GrayImage {
        GrayImage::from_fn(320, 240, |x, y| {
            let left = (32..96).contains(&x) && (32..96).contains(&y);
            let right = (192..288).contains(&x) && (128..192).contains(&y);
            if left || right { Luma([0u8]) } else { Luma([255u8]) }
        })
    }

    #[test]
    fn exports_every_artifact() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let path = write_page(input.path(), "scan.png", &two_blocks());
        let segmenter = Segmenter::new(SegmentationConfig::default()).unwrap();

        let report = process_file(&segmenter, &path, output.path(), false).unwrap();

        assert_eq!(report.segmentation.mode, SegmentationMode::Adaptive);
        assert_eq!(report.segmentation.text_region_count, 2);
        assert_eq!(
            &report.artifacts[..3],
            &[
                "scan_text_regions.jpg".to_owned(),
                "scan_combined.jpg".to_owned(),
                "scan_text_mask.png".to_owned(),
            ]
        );
        assert!(report.artifacts.contains(&"scan_region_1.png".to_owned()));
        assert!(report.artifacts.contains(&"scan_region_2.png".to_owned()));
        for name in &report.artifacts {
            assert!(output.path().join(name).is_file(), "{name} missing");
        }

        let json: serde_json::Value = serde_json::from_slice(
            &std::fs::read(output.path().join("scan_report.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(json["segmentation"]["text_region_count"], 2);
        assert_eq!(json["source_sha256"].as_str().unwrap().len(), 64);
        assert!(json["quality"]["score"].is_number());
        assert!(json["quality"]["noise"]["level"].is_string());
    }

    #[test]
    fn fingerprint_matches_source_bytes() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let path = write_page(input.path(), "blank.png", &GrayImage::from_pixel(64, 64, Luma([255u8])));
        let segmenter = Segmenter::new(SegmentationConfig::default()).unwrap();

        let report = process_file(&segmenter, &path, output.path(), true).unwrap();

        let expected = hex::encode(Sha256::digest(std::fs::read(&path).unwrap()));
        assert_eq!(report.source_sha256, expected);
        assert!(!report.deskewed);
        assert_eq!(report.segmentation.mode, SegmentationMode::Simplified);
    }

    #[test]
    fn unreadable_image_is_an_error() {
        let input = tempfile::tempdir().unwrap();
        let path = input.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        let segmenter = Segmenter::new(SegmentationConfig::default()).unwrap();

        assert!(process_file(&segmenter, &path, input.path(), false).is_err());
    }
}
