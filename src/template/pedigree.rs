//! Pedigree Expansion
//!
//! When a sample's metadata names a PED file (`ped` key), the sample's row
//! in that file fills in `sex`, `batch` and `phenotype`. Values already
//! present in the metadata are never overwritten.

use std::fs;

use log::{debug, warn};
use serde_yaml::Value;

use super::model::{scalar_to_string, Mapping};
use crate::error::Result;

/// Family identifiers that carry no batch information.
const IGNORED_FAMILIES: &[&str] = &["0", "-9", "undefined", "unknown", "."];

/// Phenotype labels accepted as written.
const KNOWN_PHENOTYPES: &[&str] = &["unaffected", "affected", "tumor", "normal"];

/// Expands pedigree information into sample metadata.
pub trait PedigreeReader {
    fn expand(&self, description: &str, metadata: Mapping) -> Result<Mapping>;
}

/// Reads tab-separated PED files from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct PedFileReader;

impl PedigreeReader for PedFileReader {
    fn expand(&self, description: &str, metadata: Mapping) -> Result<Mapping> {
        let Some(ped_file) = metadata.get("ped").and_then(scalar_to_string) else {
            return Ok(metadata);
        };

        let content = fs::read_to_string(&ped_file)?;
        let expanded = expand_from_ped(description, metadata, &content);
        Ok(expanded)
    }
}

fn ped_sex(code: &str) -> Option<&'static str> {
    match code.trim().parse::<i32>() {
        Ok(1) => Some("male"),
        Ok(2) => Some("female"),
        _ => None,
    }
}

fn ped_phenotype(code: &str) -> Option<String> {
    let code = code.trim();
    if KNOWN_PHENOTYPES.contains(&code) {
        return Some(code.to_string());
    }
    match code.parse::<i32>() {
        Ok(1) => Some("unaffected".to_string()),
        Ok(2) => Some("affected".to_string()),
        _ => None,
    }
}

fn ped_batch(family: &str) -> Option<String> {
    let family = family.trim();
    if family.is_empty() || IGNORED_FAMILIES.contains(&family) {
        None
    } else {
        Some(family.to_string())
    }
}

/// Applies the PED row for `description` to `metadata`.
///
/// Columns: family, individual, paternal, maternal, sex, phenotype.
pub fn expand_from_ped(description: &str, mut metadata: Mapping, ped_content: &str) -> Mapping {
    let row = ped_content
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .map(|line| line.split('\t').take(6).collect::<Vec<_>>())
        .find(|parts| parts.len() > 1 && parts[1].trim() == description);

    let Some(parts) = row else {
        warn!("Sample '{}' not found in pedigree file", description);
        return metadata;
    };

    let field = |i: usize| parts.get(i).copied().unwrap_or_default();
    let updates = [
        ("sex", ped_sex(field(4)).map(str::to_string)),
        ("batch", ped_batch(field(0))),
        ("phenotype", ped_phenotype(field(5))),
    ];

    for (key, value) in updates {
        if let Some(value) = value {
            if !metadata.contains_key(key) {
                debug!("Pedigree sets {}={} for '{}'", key, value, description);
                metadata.insert(key.to_string(), Value::from(value));
            }
        }
    }

    metadata
}
