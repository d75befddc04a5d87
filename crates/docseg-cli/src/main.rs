// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docseg: segment document images ahead of OCR.
//
// Entry point. Initialises logging, loads the segmentation config, and runs
// every input image on the blocking pool, one task per image.

mod export;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use docseg_core::SegmentationConfig;
use docseg_document::{Segmenter, hough_available};
use tracing::{error, info, warn};

/// Segment scanned pages into text and image regions and export overlays,
/// masks, crops and a JSON report per page.
#[derive(Debug, Parser)]
#[command(name = "docseg", version)]
struct Cli {
    /// Input images (PNG, JPEG, TIFF, ...)
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Directory for exported artifacts
    #[arg(short, long, default_value = "docseg-out")]
    out_dir: PathBuf,

    /// JSON configuration file; missing fields take their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rotate out measured skew before segmenting
    #[arg(long)]
    deskew: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SegmentationConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SegmentationConfig::default(),
    };
    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    info!(
        images = cli.images.len(),
        out_dir = %cli.out_dir.display(),
        hough = hough_available(),
        "docseg starting"
    );

    let segmenter = Arc::new(Segmenter::new(config).context("invalid configuration")?);
    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating {}", cli.out_dir.display()))?;

    let handles: Vec<_> = cli
        .images
        .iter()
        .cloned()
        .map(|path| {
            let segmenter = Arc::clone(&segmenter);
            let out_dir = cli.out_dir.clone();
            let deskew = cli.deskew;
            let task = tokio::task::spawn_blocking({
                let path = path.clone();
                move || export::process_file(&segmenter, &path, &out_dir, deskew)
            });
            (path, task)
        })
        .collect();

    let mut failures = 0usize;
    for (path, task) in handles {
        match task.await {
            Ok(Ok(report)) => {
                println!(
                    "{}: {} mode, {} text / {} image regions, skew {:.2}°, quality {:.0}",
                    path.display(),
                    report.segmentation.mode,
                    report.segmentation.text_region_count,
                    report.segmentation.image_region_count,
                    report
                        .segmentation
                        .skew
                        .as_ref()
                        .map_or(0.0, |s| s.angle_degrees),
                    report.quality.score,
                );
                if let Some(warning) = report.segmentation.skew.and_then(|s| s.warning) {
                    warn!(path = %path.display(), %warning, "Skew estimate degraded");
                }
            }
            Ok(Err(err)) => {
                failures += 1;
                error!(path = %path.display(), error = %format!("{err:#}"), "Page failed");
            }
            Err(err) => {
                failures += 1;
                error!(path = %path.display(), %err, "Worker task failed");
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} images failed", cli.images.len());
    }
    info!("docseg finished");
    Ok(())
}
