//! Error Types
//!
//! A single error enum covers every run-global failure. Per-sample and
//! per-file problems (no metadata match, unknown extension) are logged as
//! warnings by the builder and never surface here.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SetupError>;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Malformed invocation. Reported together with the help text.
    #[error("{0}")]
    Usage(String),

    /// Template name or path could not be resolved to a document.
    #[error("Could not find template '{name}' locally or in standard templates: {reason}")]
    TemplateNotFound { name: String, reason: String },

    /// Template resolved but is not a usable configuration.
    #[error("Invalid template '{name}': {reason}")]
    InvalidTemplate { name: String, reason: String },

    /// Metadata file missing or malformed.
    #[error("Metadata error in '{path}': {reason}")]
    Metadata { path: PathBuf, reason: String },

    /// An input file given on the command line does not exist.
    #[error("Could not find input file: {}", .0.display())]
    MissingInput(PathBuf),

    /// A produced sample record breaks a structural invariant.
    #[error("Invalid sample '{description}': {reason}")]
    InvalidSample { description: String, reason: String },

    /// Installation defaults or arguments are inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An external program exited unsuccessfully.
    #[error("Command `{program}` failed ({status}): {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    /// An HTTP fetch failed.
    #[error("Failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl SetupError {
    /// Builds a [`SetupError::Command`] from a finished process.
    pub fn command(program: impl Into<String>, output: &std::process::Output) -> Self {
        Self::Command {
            program: program.into(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    /// Returns true for errors caused by how the tool was invoked.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_error_display_is_message() {
        let err = SetupError::Usage("swapped arguments".to_string());
        assert_eq!(err.to_string(), "swapped arguments");
        assert!(err.is_usage());
    }

    #[test]
    fn test_template_not_found_is_not_usage() {
        let err = SetupError::TemplateNotFound {
            name: "nope".to_string(),
            reason: "HTTP 404".to_string(),
        };
        assert!(!err.is_usage());
        assert!(err.to_string().contains("'nope'"));
    }

    #[test]
    fn test_io_error_converts() {
        fn fails() -> Result<()> {
            std::fs::read_to_string("/nonexistent/definitely/missing")?;
            Ok(())
        }
        assert!(matches!(fails(), Err(SetupError::Io(_))));
    }

    #[test]
    fn test_missing_input_names_path() {
        let err = SetupError::MissingInput(PathBuf::from("reads/s1_1.fq"));
        assert!(err.to_string().contains("reads/s1_1.fq"));
    }
}
