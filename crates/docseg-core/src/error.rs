// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for docseg.

use thiserror::Error;

/// Top-level error type for all segmentation operations.
///
/// Only `InvalidImage` is fatal to a segmentation call. The other variants
/// are recovered inside the engine and surface as metadata on the result
/// (method tags, warnings, fallback flags).
#[derive(Debug, Error)]
pub enum DocsegError {
    // -- Input errors --
    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Degraded paths --
    #[error("unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DocsegError {
    /// Whether the caller must treat this error as a hard failure.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            DocsegError::UnsupportedEnvironment(_) | DocsegError::DegenerateGeometry(_)
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocsegError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_variants_are_not_fatal() {
        assert!(!DocsegError::UnsupportedEnvironment("no hough".into()).is_fatal());
        assert!(!DocsegError::DegenerateGeometry("zero area".into()).is_fatal());
        assert!(DocsegError::InvalidImage("0x0".into()).is_fatal());
    }

    #[test]
    fn display_includes_detail() {
        let err = DocsegError::InvalidImage("image has zero width".into());
        assert_eq!(err.to_string(), "invalid image: image has zero width");
    }
}
