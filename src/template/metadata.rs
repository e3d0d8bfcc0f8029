//! Project Metadata Table
//!
//! Loads the per-sample metadata CSV and answers lookups by row key.
//!
//! # CSV Format
//!
//! ```text
//! # comment lines start with '#'
//! samplename,description,batch,phenotype,sex
//! s1_1.fq.gz,NA12878,batch1,affected,female
//! s2*.fq.gz,NA12891,batch1;batch2,unaffected,male
//! ```
//!
//! The first column is the row key; keys containing glob characters
//! (`*`, `?`, `[`) are also usable as file-name patterns. Cells are kept as
//! trimmed strings; structured values are parsed when merged into samples.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use glob::Pattern;
use serde_yaml::Value;

use super::model::{scalar_to_string, Mapping};
use crate::error::{Result, SetupError};

#[derive(Debug, Clone)]
struct Row {
    key: String,
    columns: Mapping,
    pattern: Option<Pattern>,
}

/// Read-only table of sample metadata keyed by row key.
///
/// Rows keep file order so that glob fallbacks resolve to the first
/// matching rule.
#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    rows: Vec<Row>,
    index: HashMap<String, usize>,
}

/// Returns true if a key contains shell-style glob characters.
pub fn is_glob_pattern(key: &str) -> bool {
    key.contains(['*', '?', '['])
}

/// Converts a raw cell into a value.
pub fn parse_cell(raw: &str) -> Value {
    Value::from(raw.trim())
}

/// Returns true if a value carries no information.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Sequence(seq) => seq.is_empty(),
        Value::Mapping(map) => map.is_empty(),
        _ => false,
    }
}

impl MetadataTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a row. Duplicate keys are rejected.
    pub fn insert(&mut self, key: impl Into<String>, columns: Mapping) -> std::result::Result<(), String> {
        let key = key.into();
        if self.index.contains_key(&key) {
            return Err(format!("Duplicate entry in metadata file: {}", key));
        }

        let pattern = if is_glob_pattern(&key) {
            match Pattern::new(&key) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Metadata key '{}' is not a usable pattern: {}", key, e);
                    None
                }
            }
        } else {
            None
        };

        self.index.insert(key.clone(), self.rows.len());
        self.rows.push(Row { key, columns, pattern });
        Ok(())
    }

    /// Looks up a row by exact key. Rows without any column do not match.
    pub fn get(&self, key: &str) -> Option<&Mapping> {
        self.index
            .get(key)
            .map(|&i| &self.rows[i].columns)
            .filter(|columns| !columns.is_empty())
    }

    /// Row keys in file order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.key.as_str())
    }

    /// First glob rule matching a single file name.
    pub fn glob_key_for(&self, name: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|r| r.pattern.as_ref().is_some_and(|p| p.matches(name)))
            .map(|r| r.key.as_str())
    }

    /// Ranked glob fallback: the first rule, in file order, whose pattern
    /// matches every one of `names`.
    pub fn find_glob_match(&self, names: &[String]) -> Option<(&str, &Mapping)> {
        if names.is_empty() {
            return None;
        }

        self.rows
            .iter()
            .filter(|r| !r.columns.is_empty())
            .find(|r| {
                r.pattern
                    .as_ref()
                    .is_some_and(|p| names.iter().all(|n| p.matches(n)))
            })
            .map(|r| (r.key.as_str(), &r.columns))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Parses metadata CSV content.
    ///
    /// `source` is only used in error messages.
    pub fn from_reader<R: Read>(reader: R, source: &Path) -> Result<Self> {
        let metadata_error = |reason: String| SetupError::Metadata {
            path: source.to_path_buf(),
            reason,
        };

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = rdr.records();
        let header = loop {
            match records.next() {
                Some(record) => {
                    let record = record?;
                    if record.iter().any(|f| !f.is_empty()) {
                        break record;
                    }
                }
                None => return Err(metadata_error("no header row found".to_string())),
            }
        };

        let columns: Vec<String> = header.iter().skip(1).map(|h| h.to_string()).collect();
        debug!("Metadata columns: {:?}", columns);

        let mut table = Self::new();
        for record in records {
            let record = record?;
            let key = record.get(0).unwrap_or_default();
            if key.is_empty() {
                if record.iter().any(|f| !f.is_empty()) {
                    warn!("Skipping metadata row with empty sample key");
                }
                continue;
            }

            let row: Mapping = columns
                .iter()
                .enumerate()
                .filter(|(_, name)| !name.is_empty())
                .map(|(i, name)| (name.clone(), parse_cell(record.get(i + 1).unwrap_or_default())))
                .collect();

            table.insert(key, row).map_err(metadata_error)?;
        }

        Ok(table)
    }

    /// Loads a metadata CSV from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| SetupError::Metadata {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let table = Self::from_reader(file, path)?;
        info!("Loaded metadata for {} samples from {}", table.len(), path.display());
        Ok(table)
    }
}

/// Project name plus its metadata.
#[derive(Debug, Clone)]
pub struct ProjectMetadata {
    /// Name used for the output directory and configuration file
    pub project_name: String,
    /// Metadata rows (empty when only a project name was given)
    pub table: MetadataTable,
    /// CSV the metadata came from
    pub source: Option<PathBuf>,
}

/// Resolves the metadata argument.
///
/// An existing file is read as CSV and its stem names the project. A
/// non-existent argument ending in `.csv` is an error; anything else is
/// taken as a bare project name with no metadata.
pub fn project_and_metadata(arg: &str) -> Result<ProjectMetadata> {
    let path = Path::new(arg);

    if path.is_file() {
        let table = MetadataTable::load(path)?;
        let project_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(arg)
            .to_string();
        return Ok(ProjectMetadata {
            project_name,
            table,
            source: Some(path.to_path_buf()),
        });
    }

    if arg.to_lowercase().ends_with(".csv") {
        return Err(SetupError::Metadata {
            path: path.to_path_buf(),
            reason: "Did not find input metadata file".to_string(),
        });
    }

    info!("No metadata file found, using '{}' as project name", arg);
    Ok(ProjectMetadata {
        project_name: arg.to_string(),
        table: MetadataTable::new(),
        source: None,
    })
}

/// Renders a metadata value for log output.
pub fn describe_value(value: &Value) -> String {
    scalar_to_string(value).unwrap_or_else(|| format!("{:?}", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn row(pairs: &[(&str, &str)]) -> Mapping {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect()
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_glob_rules() {
        let mut table = MetadataTable::new();
        table.insert("s1*.fq", row(&[("batch", "b1")])).unwrap();
        table.insert("t?_1.fq", row(&[("batch", "b2")])).unwrap();
        table.insert("u[12]_*.fq", row(&[("batch", "b3")])).unwrap();
        table.insert("v[!12]_*.fq", row(&[("batch", "b4")])).unwrap();

        assert_eq!(table.glob_key_for("s1_1.fq"), Some("s1*.fq"));
        assert_eq!(table.glob_key_for("s2_1.fq"), None);
        assert_eq!(table.glob_key_for("t9_1.fq"), Some("t?_1.fq"));
        assert_eq!(table.glob_key_for("u2_1.fq"), Some("u[12]_*.fq"));
        assert_eq!(table.glob_key_for("v2_1.fq"), None);
        assert_eq!(table.glob_key_for("v3_1.fq"), Some("v[!12]_*.fq"));
    }

    #[test]
    fn test_glob_leading_bracket_in_class() {
        let mut table = MetadataTable::new();
        table.insert("s[]1].fq", row(&[("batch", "b1")])).unwrap();
        assert_eq!(table.glob_key_for("s1.fq"), Some("s[]1].fq"));
        assert_eq!(table.glob_key_for("s].fq"), Some("s[]1].fq"));
        assert_eq!(table.glob_key_for("s2.fq"), None);
    }

    #[test]
    fn test_unclosed_bracket_key_is_exact_only() {
        let mut table = MetadataTable::new();
        table.insert("s[1*", row(&[("batch", "b1")])).unwrap();
        assert_eq!(table.glob_key_for("s[1_x"), None);
        assert!(table.get("s[1*").is_some());
    }

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell(" hg38 "), Value::from("hg38"));
        assert_eq!(parse_cell("b1;b2"), Value::from("b1;b2"));
    }

    #[test]
    fn test_insert_duplicate() {
        let mut table = MetadataTable::new();
        table.insert("s1", row(&[("batch", "b1")])).unwrap();
        assert!(table.insert("s1", row(&[("batch", "b2")])).is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_get_ignores_columnless_rows() {
        let mut table = MetadataTable::new();
        table.insert("s1", Mapping::new()).unwrap();
        assert!(table.get("s1").is_none());
    }

    #[test]
    fn test_find_glob_match_first_rule_wins() {
        let mut table = MetadataTable::new();
        table.insert("plain", row(&[("batch", "b0")])).unwrap();
        table.insert("s1_*.fq", row(&[("batch", "b1")])).unwrap();
        table.insert("s*.fq", row(&[("batch", "b2")])).unwrap();

        let (key, _) = table.find_glob_match(&names(&["s1_1.fq", "s1_2.fq"])).unwrap();
        assert_eq!(key, "s1_*.fq");

        let (key, _) = table.find_glob_match(&names(&["s2_1.fq"])).unwrap();
        assert_eq!(key, "s*.fq");

        assert!(table.find_glob_match(&names(&["s1_1.fq", "other.fq"])).is_none());
        assert!(table.find_glob_match(&[]).is_none());
    }

    #[test]
    fn test_glob_key_for() {
        let mut table = MetadataTable::new();
        table.insert("lane*_s1.fq", row(&[("batch", "b1")])).unwrap();
        assert_eq!(table.glob_key_for("lane3_s1.fq"), Some("lane*_s1.fq"));
        assert_eq!(table.glob_key_for("lane3_s2.fq"), None);
    }

    #[test]
    fn test_from_reader() {
        let csv = "\
# exported from LIMS
samplename,description,batch,phenotype
s1_1.fq,NA12878,b1;b2,affected

s2.bam,NA12891,,unaffected
";
        let table = MetadataTable::from_reader(csv.as_bytes(), Path::new("project.csv")).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["s1_1.fq", "s2.bam"]);

        let s1 = table.get("s1_1.fq").unwrap();
        assert_eq!(s1.get("description"), Some(&Value::from("NA12878")));
        assert_eq!(s1.get("batch"), Some(&Value::from("b1;b2")));

        let s2 = table.get("s2.bam").unwrap();
        assert!(is_empty_value(s2.get("batch").unwrap()));
    }

    #[test]
    fn test_from_reader_short_rows() {
        let csv = "samplename,description,batch\ns1,NA1\n";
        let table = MetadataTable::from_reader(csv.as_bytes(), Path::new("p.csv")).unwrap();
        let s1 = table.get("s1").unwrap();
        assert_eq!(s1.get("batch"), Some(&Value::from("")));
    }

    #[test]
    fn test_from_reader_duplicate_key() {
        let csv = "samplename,batch\ns1,b1\ns1,b2\n";
        let result = MetadataTable::from_reader(csv.as_bytes(), Path::new("dup.csv"));
        assert!(matches!(result, Err(SetupError::Metadata { .. })));
    }

    #[test]
    fn test_from_reader_empty() {
        let result = MetadataTable::from_reader("# only a comment\n".as_bytes(), Path::new("e.csv"));
        assert!(result.is_err());
    }

    #[test]
    fn test_project_and_metadata_from_file() {
        let temp_dir = tempdir().unwrap();
        let csv_path = temp_dir.path().join("cancer_project.csv");
        std::fs::write(&csv_path, "samplename,batch\ns1,b1\n").unwrap();

        let project = project_and_metadata(csv_path.to_str().unwrap()).unwrap();
        assert_eq!(project.project_name, "cancer_project");
        assert_eq!(project.table.len(), 1);
        assert_eq!(project.source.as_deref(), Some(csv_path.as_path()));
    }

    #[test]
    fn test_project_and_metadata_missing_csv() {
        let result = project_and_metadata("/nonexistent/project.csv");
        assert!(matches!(result, Err(SetupError::Metadata { .. })));
    }

    #[test]
    fn test_project_and_metadata_bare_name() {
        let project = project_and_metadata("project1").unwrap();
        assert_eq!(project.project_name, "project1");
        assert!(project.table.is_empty());
        assert!(project.source.is_none());
    }
}
