//! Metadata Merge
//!
//! Matches each sample to a metadata row and routes the row's columns into
//! the sample record.
//!
//! # Lookup Precedence
//!
//! The first hit wins:
//! 1. The sample description
//! 2. Keys derived from the first input file (path, base name, stem)
//! 3. Keys derived from `vrn_file`
//! 4. The first glob rule matching every input file name
//!
//! # Column Routing
//!
//! | Column                                    | Destination  |
//! |-------------------------------------------|--------------|
//! | `description`, `genome_build`, `lane`,    | top level    |
//! | `vrn_file`, `files`, `analysis`           |              |
//! | registered algorithm parameter, or a key  | `algorithm`  |
//! | already in the item's `algorithm`         |              |
//! | anything else                             | `metadata`   |

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use serde_yaml::Value;

use super::metadata::{describe_value, is_empty_value, MetadataTable};
use super::model::{scalar_to_string, Mapping, SampleItem};
use super::pedigree::{PedFileReader, PedigreeReader};
use crate::error::Result;

/// Where a metadata column is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRoute {
    TopLevel,
    Algorithm,
    Metadata,
}

/// Columns that overwrite sample attributes directly.
pub const TOP_LEVEL_COLUMNS: &[&str] = &[
    "description",
    "genome_build",
    "lane",
    "vrn_file",
    "files",
    "analysis",
];

/// Columns whose comma-separated values are lists.
pub const LIST_COLUMNS: &[&str] = &[
    "batch",
    "tools_on",
    "tools_off",
    "exclude_regions",
    "svcaller",
    "variantcaller",
];

/// Registry of recognized pipeline algorithm parameter names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlgorithmKeys {
    keys: HashSet<String>,
}

impl AlgorithmKeys {
    /// Creates a registry from parameter names.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Loads a YAML list of parameter names.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let keys: Vec<String> = serde_yaml::from_str(&content)?;
        info!("Loaded {} algorithm keys from {}", keys.len(), path.display());
        Ok(Self::new(keys))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Classifies a column. Total: every column has exactly one destination.
pub fn route_column(column: &str, algorithm_keys: &AlgorithmKeys) -> ColumnRoute {
    if TOP_LEVEL_COLUMNS.contains(&column) {
        ColumnRoute::TopLevel
    } else if algorithm_keys.contains(column) {
        ColumnRoute::Algorithm
    } else {
        ColumnRoute::Metadata
    }
}

fn split_list(raw: &str, separator: char) -> Value {
    Value::Sequence(
        raw.split(separator)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Value::from)
            .collect(),
    )
}

/// Parses `k1:a;b::k2:c` into `{k1: [a, b], k2: [c]}`.
fn parse_nested(raw: &str) -> Option<Value> {
    let mut out = serde_yaml::Mapping::new();
    for part in raw.split("::").filter(|p| !p.trim().is_empty()) {
        let (key, values) = part.split_once(':')?;
        out.insert(Value::from(key.trim()), split_list(values, ';'));
    }
    Some(Value::Mapping(out))
}

/// Brings a metadata value into the shape the pipeline configuration expects.
///
/// - `::`-joined `key:values` pairs become a mapping of lists
/// - `;`-separated values become a list
/// - comma-separated values of list columns become a list
/// - everything else passes through unchanged
pub fn normalize_value(column: &str, value: Value) -> Value {
    let Value::String(raw) = &value else {
        return value;
    };

    if raw.contains("::") {
        match parse_nested(raw) {
            Some(nested) => return nested,
            None => {
                warn!("Column '{}': could not parse nested value '{}'", column, raw);
                return value;
            }
        }
    }

    if raw.contains(';') {
        return split_list(raw, ';');
    }

    if LIST_COLUMNS.contains(&column) && raw.contains(',') {
        return split_list(raw, ',');
    }

    value
}

/// Which lookup rule matched a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Description,
    FileKey,
    VrnKey,
    Glob,
}

/// Finds the metadata row for a sample, following lookup precedence.
pub fn find_metadata<'a>(
    item: &SampleItem,
    table: &'a MetadataTable,
) -> Option<(MatchSource, &'a Mapping)> {
    let exact = std::iter::once((MatchSource::Description, item.description.clone()))
        .chain(item.file_keys().into_iter().map(|k| (MatchSource::FileKey, k)))
        .chain(item.vrn_keys().into_iter().map(|k| (MatchSource::VrnKey, k)));

    for (source, key) in exact {
        if let Some(row) = table.get(&key) {
            debug!("Sample '{}' matched metadata key '{}'", item.description, key);
            return Some((source, row));
        }
    }

    table.find_glob_match(&item.file_names()).map(|(key, row)| {
        debug!("Sample '{}' matched metadata pattern '{}'", item.description, key);
        (MatchSource::Glob, row)
    })
}

fn set_top_level(item: &mut SampleItem, column: &str, value: &Value) {
    if column == "files" {
        item.files = match value {
            Value::Sequence(seq) => seq.iter().filter_map(scalar_to_string).collect(),
            other => match scalar_to_string(other) {
                Some(s) if s.contains(';') => s
                    .split(';')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect(),
                Some(s) => vec![s],
                None => return,
            },
        };
        return;
    }

    let Some(text) = scalar_to_string(value) else {
        warn!(
            "Sample '{}': ignoring non-scalar value for '{}'",
            item.description, column
        );
        return;
    };

    match column {
        "description" => item.description = text,
        "genome_build" => item.genome_build = Some(text),
        "lane" => item.lane = Some(text),
        "vrn_file" => item.vrn_file = Some(text),
        "analysis" => item.analysis = Some(text),
        _ => {}
    }
}

/// Writes every non-empty column of `row` into `item`.
///
/// Columns naming a parameter the template already sets in `algorithm`
/// override it there.
pub fn apply_row(item: &mut SampleItem, row: &Mapping, algorithm_keys: &AlgorithmKeys) {
    for (column, value) in row {
        if is_empty_value(value) {
            continue;
        }

        let route = match route_column(column, algorithm_keys) {
            ColumnRoute::Metadata if item.algorithm.contains_key(column) => ColumnRoute::Algorithm,
            route => route,
        };

        match route {
            ColumnRoute::TopLevel => set_top_level(item, column, value),
            ColumnRoute::Algorithm => {
                item.set_algorithm(column.clone(), normalize_value(column, value.clone()))
            }
            ColumnRoute::Metadata => {
                item.set_metadata(column.clone(), normalize_value(column, value.clone()))
            }
        }
        debug!(
            "Sample '{}': {} = {}",
            item.description,
            column,
            describe_value(value)
        );
    }
}

/// Merges metadata rows into sample records.
pub struct MetadataMerger<'a> {
    table: &'a MetadataTable,
    algorithm_keys: &'a AlgorithmKeys,
    pedigree: &'a dyn PedigreeReader,
    only_metadata: bool,
}

impl<'a> MetadataMerger<'a> {
    pub fn new(
        table: &'a MetadataTable,
        algorithm_keys: &'a AlgorithmKeys,
        pedigree: &'a dyn PedigreeReader,
        only_metadata: bool,
    ) -> Self {
        Self {
            table,
            algorithm_keys,
            pedigree,
            only_metadata,
        }
    }

    /// Merges metadata into one sample.
    ///
    /// Returns `Ok(None)` when the sample has no metadata and
    /// `only_metadata` is set.
    pub fn merge(&self, mut item: SampleItem) -> Result<Option<SampleItem>> {
        match find_metadata(&item, self.table) {
            Some((_, row)) => apply_row(&mut item, row, self.algorithm_keys),
            None if !self.table.is_empty() => {
                let action = if self.only_metadata {
                    "Dropped sample"
                } else {
                    "Added minimal sample information"
                };
                warn!(
                    "{}: metadata not found for {}, {:?}",
                    action,
                    item.description,
                    item.file_names()
                );
                if self.only_metadata {
                    return Ok(None);
                }
            }
            None => {}
        }

        if item.metadata.contains_key("ped") {
            let metadata = std::mem::take(&mut item.metadata);
            item.metadata = self.pedigree.expand(&item.description, metadata)?;
            item.algorithm.retain(|k, _| !item.metadata.contains_key(k));
        }

        Ok(Some(item))
    }

    /// Merges metadata into every sample, dropping unmatched ones when
    /// `only_metadata` is set.
    pub fn merge_all(&self, items: Vec<SampleItem>) -> Result<Vec<SampleItem>> {
        let mut merged = Vec::with_capacity(items.len());
        for item in items {
            if let Some(item) = self.merge(item)? {
                merged.push(item);
            }
        }
        Ok(merged)
    }
}

/// Merges metadata using the default pedigree reader and no registered
/// algorithm keys.
pub fn merge_metadata(
    item: SampleItem,
    table: &MetadataTable,
    only_metadata: bool,
) -> Result<Option<SampleItem>> {
    let keys = AlgorithmKeys::default();
    MetadataMerger::new(table, &keys, &PedFileReader, only_metadata).merge(item)
}
