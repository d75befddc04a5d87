// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Segmentation policy: decides whether a page is worth splitting into
// regions or is handled as a single whole-page region.

use docseg_core::config::PolicyConfig;
use docseg_core::{EntropyScore, SegmentationMode};
use tracing::debug;

use super::density::DensityGrid;

/// Choose between simplified and adaptive segmentation.
///
/// 1. Entropy below `entropy_cutoff` → simplified (nothing to separate).
/// 2. No ink at all → simplified.
/// 3. Coefficient of variation of cell densities above `variation_cutoff`
///    → adaptive (patchy, mixed layout); otherwise simplified.
pub fn decide(entropy: EntropyScore, grid: &DensityGrid, config: &PolicyConfig) -> SegmentationMode {
    if entropy.bits() < config.entropy_cutoff {
        debug!(
            entropy = entropy.bits(),
            cutoff = config.entropy_cutoff,
            "Low-complexity page; using simplified segmentation"
        );
        return SegmentationMode::Simplified;
    }

    let Some(variation) = grid.coefficient_of_variation() else {
        debug!("No ink detected; using simplified segmentation");
        return SegmentationMode::Simplified;
    };

    let mode = if variation > config.variation_cutoff {
        SegmentationMode::Adaptive
    } else {
        SegmentationMode::Simplified
    };
    debug!(
        variation,
        cutoff = config.variation_cutoff,
        heavy_cells = grid.heavy_cells(),
        %mode,
        "Segmentation mode decided"
    );
    mode
}
