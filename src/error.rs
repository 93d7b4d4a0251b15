use std::path::PathBuf;
use thiserror::Error;

/// Exit code used when a required tool is not installed
pub const EXIT_TOOL_MISSING: i32 = 2;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("{tool} executable not found; run `vidxport provision` to install it")]
    ToolMissing { tool: String },

    #[error("Stage {stage} failed with exit code {exit_code}")]
    StageFailed { stage: usize, exit_code: i32 },

    #[error("IO error while trying to {operation} {}: {source}", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("Could not extract {}: {reason}", .archive.display())]
    Extraction { archive: PathBuf, reason: String },

    #[error("Installation of {tool} was declined")]
    ConsentDeclined { tool: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ExportError {
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExportError::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Process exit code the CLI reports for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExportError::StageFailed { stage, .. } => 10 + *stage as i32,
            ExportError::ToolMissing { .. } => EXIT_TOOL_MISSING,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_carry_stage_index() {
        let err = ExportError::StageFailed { stage: 2, exit_code: 1 };
        assert_eq!(err.exit_code(), 12);
        assert_eq!(err.to_string(), "Stage 2 failed with exit code 1");

        let err = ExportError::ToolMissing { tool: "FFmpeg".to_string() };
        assert_eq!(err.exit_code(), 2);

        let err = ExportError::Config("bad".to_string());
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_io_error_names_operation_and_path() {
        let err = ExportError::io(
            "copy",
            "/tmp/missing.vp6",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.to_string(), "IO error while trying to copy /tmp/missing.vp6: gone");
    }
}
