//! Sample Validation
//!
//! Checks the merged sample records before they are written:
//! - Every sample has at least one input file
//! - Input files of a sample share one type
//! - `algorithm` and `metadata` never share a key
//! - Duplicate descriptions are reported

use std::collections::HashSet;

use log::{info, warn};

use super::inputs::{classify, InputKind};
use super::model::SampleItem;
use crate::error::{Result, SetupError};

/// Problems that make a sample record unusable.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    NoFiles(String),
    MixedFileTypes { sample: String, kinds: Vec<String> },
    SharedKey { sample: String, key: String },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoFiles(sample) => write!(f, "Sample '{}' has no input files", sample),
            Self::MixedFileTypes { sample, kinds } => {
                write!(f, "Sample '{}' mixes input types: {}", sample, kinds.join(", "))
            }
            Self::SharedKey { sample, key } => {
                write!(f, "Sample '{}' has '{}' in both algorithm and metadata", sample, key)
            }
        }
    }
}

fn file_kind_label(file: &str) -> String {
    classify(file)
        .map(InputKind::as_str)
        .unwrap_or("unknown")
        .to_string()
}

/// Validates one sample record.
fn validate_item(item: &SampleItem) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if item.files.is_empty() {
        errors.push(ValidationError::NoFiles(item.description.clone()));
        return errors;
    }

    let mut kinds: Vec<String> = item.files.iter().map(|f| file_kind_label(f)).collect();
    kinds.dedup();
    if kinds.len() > 1 {
        errors.push(ValidationError::MixedFileTypes {
            sample: item.description.clone(),
            kinds,
        });
    }

    if let Some(key) = item.algorithm.keys().find(|k| item.metadata.contains_key(*k)) {
        errors.push(ValidationError::SharedKey {
            sample: item.description.clone(),
            key: key.clone(),
        });
    }

    errors
}

/// Validates all sample records.
///
/// Structural problems are errors; duplicate descriptions and an empty
/// result only produce warnings.
pub fn validate_items(items: &[SampleItem]) -> Result<()> {
    if items.is_empty() {
        warn!("No samples to write: check input file types and metadata");
        return Ok(());
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut all_errors = Vec::new();
    for item in items {
        if !seen.insert(item.description.as_str()) {
            warn!("Duplicate sample description: '{}'", item.description);
        }
        all_errors.extend(validate_item(item));
    }

    if let Some(first) = all_errors.first() {
        let messages: Vec<String> = all_errors.iter().map(|e| e.to_string()).collect();
        return Err(SetupError::InvalidSample {
            description: match first {
                ValidationError::NoFiles(s) => s.clone(),
                ValidationError::MixedFileTypes { sample, .. } => sample.clone(),
                ValidationError::SharedKey { sample, .. } => sample.clone(),
            },
            reason: messages.join("\n"),
        });
    }

    info!("Validated {} samples", items.len());
    Ok(())
}
