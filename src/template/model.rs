//! Template Data Model
//!
//! Core data structures for templates and the per-sample records built
//! from them.
//!
//! # Example YAML Format
//!
//! ```yaml
//! details:
//!   - analysis: variant2
//!     genome_build: GRCh37
//!     algorithm:
//!       aligner: bwa
//!       variantcaller: gatk-haplotype
//! upload:
//!   dir: ../final
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use super::inputs::strip_known_extension;

/// Ordered key/value mapping used for `algorithm` and `metadata`.
pub type Mapping = BTreeMap<String, Value>;

/// One per-sample configuration record.
///
/// Derived from the template's first `details` entry and specialised for a
/// single discovered input (one BAM, one VCF, or one single/paired set of
/// reads).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SampleItem {
    /// Sample name, initially derived from the input file name
    #[serde(default)]
    pub description: String,

    /// Input files (one or two reads, or a single alignment/variant file)
    #[serde(deserialize_with = "single_or_vec", default)]
    pub files: Vec<String>,

    #[serde(
        deserialize_with = "optional_scalar",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub genome_build: Option<String>,

    #[serde(
        deserialize_with = "optional_scalar",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub lane: Option<String>,

    /// Variant calls for VCF inputs
    #[serde(
        deserialize_with = "optional_scalar",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub vrn_file: Option<String>,

    #[serde(
        deserialize_with = "optional_scalar",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub analysis: Option<String>,

    /// Pipeline algorithm parameters
    #[serde(default)]
    pub algorithm: Mapping,

    /// Free-form sample metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Mapping,

    /// Any other keys of the base item, preserved verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Deserializes either a single string or a list of strings into Vec<String>
fn single_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    match val {
        Value::Null => Ok(Vec::new()),
        Value::String(s) if s.is_empty() => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s]),
        Value::Sequence(seq) => seq
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s),
                _ => Err(de::Error::custom("Expected string in files list")),
            })
            .collect(),
        _ => Err(de::Error::custom("Expected string or list of strings")),
    }
}

/// Deserializes an optional scalar (string, number or bool) as a string.
fn optional_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    match val {
        Value::Null => Ok(None),
        other => scalar_to_string(&other)
            .map(Some)
            .ok_or_else(|| de::Error::custom("Expected a scalar value")),
    }
}

/// Renders a YAML scalar as a plain string.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl SampleItem {
    /// Copies `base` and specialises it for the given files.
    pub fn from_base(base: &SampleItem, files: Vec<String>, description: impl Into<String>) -> Self {
        let mut item = base.clone();
        item.files = files;
        item.description = description.into();
        item
    }

    /// Keys derived from the first input file: the path as given, its base
    /// name, and its base name without a recognized extension.
    pub fn file_keys(&self) -> Vec<String> {
        self.files.first().map(|f| path_keys(f)).unwrap_or_default()
    }

    /// Keys derived from `vrn_file`, in the same three forms as
    /// [`SampleItem::file_keys`].
    pub fn vrn_keys(&self) -> Vec<String> {
        self.vrn_file.as_deref().map(path_keys).unwrap_or_default()
    }

    /// Base names of all input files.
    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|f| base_name(f)).collect()
    }

    /// Writes an algorithm parameter, keeping `metadata` disjoint.
    pub fn set_algorithm(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.metadata.remove(&key);
        self.algorithm.insert(key, value);
    }

    /// Writes a metadata entry, keeping `algorithm` disjoint.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.algorithm.remove(&key);
        self.metadata.insert(key, value);
    }

    /// Returns the metadata entry as a string, if it is a scalar.
    pub fn metadata_str(&self, key: &str) -> Option<String> {
        self.metadata.get(key).and_then(scalar_to_string)
    }
}

/// Base name of a path, falling back to the input when it has none.
pub fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string()
}

fn path_keys(path: &str) -> Vec<String> {
    let name = base_name(path);
    let stem = strip_known_extension(&name);
    vec![path.to_string(), name, stem]
}

/// A prototype pipeline configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Template {
    /// Sample records; the first one is the base copied for every input
    pub details: Vec<SampleItem>,

    /// Remaining top-level keys (`upload`, `fc_name`, `resources`, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Template {
    /// Parses a template document.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Returns the prototype sample record.
    pub fn base_item(&self) -> Option<&SampleItem> {
        self.details.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"
details:
  - analysis: variant2
    genome_build: GRCh37
    lane: 1
    algorithm:
      aligner: bwa
      mark_duplicates: true
    resources:
      cores: 4
upload:
  dir: ../final
"#;

    #[test]
    fn test_template_parse() {
        let template = Template::from_yaml(TEMPLATE).unwrap();
        let base = template.base_item().unwrap();

        assert_eq!(base.analysis.as_deref(), Some("variant2"));
        assert_eq!(base.genome_build.as_deref(), Some("GRCh37"));
        assert_eq!(base.lane.as_deref(), Some("1"));
        assert_eq!(base.algorithm.len(), 2);
        assert!(base.files.is_empty());
        assert!(base.extra.contains_key("resources"));
        assert!(template.extra.contains_key("upload"));
    }

    #[test]
    fn test_template_without_details_fails() {
        assert!(Template::from_yaml("upload:\n  dir: final\n").is_err());
    }

    #[test]
    fn test_files_single_string() {
        let item: SampleItem = serde_yaml::from_str("description: s1\nfiles: s1.bam\n").unwrap();
        assert_eq!(item.files, vec!["s1.bam"]);
    }

    #[test]
    fn test_files_list() {
        let item: SampleItem =
            serde_yaml::from_str("description: s1\nfiles: [s1_1.fq, s1_2.fq]\n").unwrap();
        assert_eq!(item.files.len(), 2);
    }

    #[test]
    fn test_files_invalid_type() {
        let result: Result<SampleItem, _> = serde_yaml::from_str("files: {a: b}\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_from_base_copies_settings() {
        let template = Template::from_yaml(TEMPLATE).unwrap();
        let base = template.base_item().unwrap();
        let item = SampleItem::from_base(base, vec!["s1.bam".to_string()], "s1");

        assert_eq!(item.description, "s1");
        assert_eq!(item.files, vec!["s1.bam"]);
        assert_eq!(item.algorithm, base.algorithm);
        assert_eq!(item.extra, base.extra);
    }

    #[test]
    fn test_file_keys() {
        let item = SampleItem {
            files: vec!["/data/run1/s1_1.fastq.gz".to_string()],
            ..Default::default()
        };
        assert_eq!(
            item.file_keys(),
            vec!["/data/run1/s1_1.fastq.gz", "s1_1.fastq.gz", "s1_1"]
        );
    }

    #[test]
    fn test_vrn_keys_empty_without_vrn_file() {
        let item = SampleItem::default();
        assert!(item.vrn_keys().is_empty());
        assert!(item.file_keys().is_empty());
    }

    #[test]
    fn test_set_algorithm_and_metadata_stay_disjoint() {
        let mut item = SampleItem::default();
        item.set_metadata("batch", Value::from("b1"));
        item.set_algorithm("batch", Value::from("b2"));

        assert!(!item.metadata.contains_key("batch"));
        assert_eq!(item.algorithm.get("batch"), Some(&Value::from("b2")));

        item.set_metadata("batch", Value::from("b3"));
        assert!(!item.algorithm.contains_key("batch"));
    }

    #[test]
    fn test_empty_metadata_not_serialized() {
        let item = SampleItem {
            description: "s1".to_string(),
            files: vec!["s1.bam".to_string()],
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&item).unwrap();
        assert!(!yaml.contains("metadata"));
        assert!(yaml.contains("algorithm"));
    }
}
