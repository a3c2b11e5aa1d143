//! Unified error types for stemgrid
//!
//! Error strategy:
//! - Per-track errors (decode, analysis, tempo): recoverable, skip the track and continue
//! - External tool errors (demucs, drumsep, predictors): keep the analysis, drop stems
//! - Segmentation parameter errors: an upstream bug, surfaced loudly as a failure
//! - Output/config errors: fatal, abort the batch

use std::path::PathBuf;
use thiserror::Error;

/// Supported audio formats for helpful error messages
pub const SUPPORTED_FORMATS: &str = "MP3, WAV, FLAC, AIFF, M4A";

/// Top-level error type for stemgrid operations
#[derive(Debug, Error)]
pub enum StemgridError {
    // =========================================================================
    // Recoverable errors - skip track, continue batch
    // =========================================================================
    #[error("Failed to decode audio file '{path}': {reason}\n  Supported formats: {SUPPORTED_FORMATS}")]
    DecodeError { path: PathBuf, reason: String },

    #[error("Unsupported audio format for '{path}': {format}\n  Supported formats: {SUPPORTED_FORMATS}")]
    UnsupportedFormat { path: PathBuf, format: String },

    #[error("Analysis failed: {reason}")]
    AnalysisError { reason: String },

    #[error("Tempo detection failed: {reason}")]
    TempoDetectionError { reason: String },

    #[error("File not found: '{0}'\n  Tip: Check the path exists and is accessible")]
    FileNotFound(PathBuf),

    // =========================================================================
    // Invalid segmentation parameters - counted as a failure, never silent
    // =========================================================================
    #[error("Invalid segmentation parameters: {reason}")]
    SegmentationError { reason: String },

    // =========================================================================
    // External tool errors - continue without stems
    // =========================================================================
    #[error("{tool} is not available: {reason}\n  Tip: Install it or point stemgrid at it with the matching --*-cmd flag")]
    ToolUnavailable { tool: String, reason: String },

    #[error("{tool} failed: {reason}")]
    ExternalToolError { tool: String, reason: String },

    // =========================================================================
    // Fatal errors - abort entire batch
    // =========================================================================
    #[error("Cannot write output to '{path}': {reason}\n  Tip: Check write permissions for the output directory")]
    OutputError { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for stemgrid operations
pub type Result<T> = std::result::Result<T, StemgridError>;

impl StemgridError {
    /// Returns true if this error is recoverable (should skip track, continue batch)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StemgridError::DecodeError { .. }
                | StemgridError::UnsupportedFormat { .. }
                | StemgridError::AnalysisError { .. }
                | StemgridError::TempoDetectionError { .. }
                | StemgridError::FileNotFound(_)
        )
    }

    /// Returns true if this error comes from an external separation tool
    pub fn is_stem_error(&self) -> bool {
        matches!(
            self,
            StemgridError::ToolUnavailable { .. } | StemgridError::ExternalToolError { .. }
        )
    }

    /// Create an analysis error
    pub fn analysis(reason: impl Into<String>) -> Self {
        StemgridError::AnalysisError {
            reason: reason.into(),
        }
    }

    /// Create a segmentation parameter error
    pub fn segmentation(reason: impl Into<String>) -> Self {
        StemgridError::SegmentationError {
            reason: reason.into(),
        }
    }

    /// Create an external tool failure
    pub fn tool_failed(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        StemgridError::ExternalToolError {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Create an output error, checking for common issues
    pub fn output_error(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        let reason = match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!("Permission denied. Check that you have write access to {}", path.display())
            }
            std::io::ErrorKind::NotFound => {
                format!(
                    "Directory does not exist: {}",
                    path.parent().map(|p| p.display().to_string()).unwrap_or_default()
                )
            }
            _ => err.to_string(),
        };
        StemgridError::OutputError { path, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(StemgridError::analysis("empty").is_recoverable());
        assert!(StemgridError::TempoDetectionError {
            reason: "no periodicity".to_string()
        }
        .is_recoverable());
        assert!(!StemgridError::segmentation("bpm must be positive").is_recoverable());
        assert!(!StemgridError::ConfigError("bad".to_string()).is_recoverable());
    }

    #[test]
    fn test_stem_error_classification() {
        assert!(StemgridError::tool_failed("demucs", "exit status 1").is_stem_error());
        assert!(StemgridError::ToolUnavailable {
            tool: "drumsep".to_string(),
            reason: "not found".to_string()
        }
        .is_stem_error());
        assert!(!StemgridError::analysis("x").is_stem_error());
    }

    #[test]
    fn test_output_error_permission_message() {
        let err = StemgridError::output_error(
            "/root/out/x.wav",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(err.to_string().contains("Permission denied"));
    }
}
