//! Package Manifest
//!
//! Reads `packages-conda.yaml` style manifests:
//!
//! ```yaml
//! channels:
//!   - conda-forge
//!   - bioconda
//! bio_nextgen:
//!   alignment:
//!     - bwa
//!     - bowtie2
//!   python2:
//!     - "delly;env=python2"
//! ```
//!
//! Groups are visited in name order and nested mappings are flattened.
//! Each package may carry a target environment (`name;env=python2`).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::info;
use serde_yaml::Value;

use crate::error::{Result, SetupError};

/// Python pin used when creating an environment.
pub fn python_pin(env: Option<&str>) -> &'static str {
    match env {
        Some("python2") | Some("dv") | Some("samtools0") => "python=2",
        _ => "python=3.6",
    }
}

/// A package with its optional target environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub env: Option<String>,
}

impl PackageSpec {
    /// Parses `name[;env=<envname>]`. Unknown `key=value` options are ignored.
    pub fn parse(spec: &str) -> Self {
        let mut parts = spec.split(';');
        let name = parts.next().unwrap_or_default().trim().to_string();
        let env = parts
            .filter_map(|opt| opt.split_once('='))
            .find(|(k, _)| k.trim() == "env")
            .map(|(_, v)| v.trim().to_string());
        Self { name, env }
    }
}

/// Flattened package manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageManifest {
    /// Package specs in install order
    pub packages: Vec<String>,
    /// Package spec -> top-level group
    pub groups: BTreeMap<String, String>,
    /// Channels listed under `channels`
    pub channels: Vec<String>,
}

fn collect_group(
    group: &str,
    value: &Value,
    subs: &BTreeMap<String, Option<String>>,
    manifest: &mut PackageManifest,
) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::Sequence(items) => {
            let mut final_packages = Vec::new();
            for item in items {
                let Some(name) = item.as_str() else {
                    return Err(SetupError::Config(format!(
                        "Unexpected package entry in group '{}': {:?}",
                        group, item
                    )));
                };
                manifest.groups.insert(name.to_string(), group.to_string());
                match subs.get(name) {
                    Some(Some(replacement)) => final_packages.push(replacement.clone()),
                    Some(None) => {}
                    None => final_packages.push(name.to_string()),
                }
            }
            final_packages.sort();
            manifest.packages.extend(final_packages);
            Ok(())
        }
        Value::Mapping(nested) => {
            for inner in nested.values() {
                collect_group(group, inner, subs, manifest)?;
            }
            Ok(())
        }
        other => Err(SetupError::Config(format!(
            "Unexpected value in package group '{}': {:?}",
            group, other
        ))),
    }
}

impl PackageManifest {
    /// Parses manifest text, applying a substitution table (`null` drops a
    /// package). `to_install` restricts the groups read.
    pub fn from_yaml_str(
        text: &str,
        subs: &BTreeMap<String, Option<String>>,
        to_install: Option<&[String]>,
    ) -> Result<Self> {
        let data: BTreeMap<String, Value> = match serde_yaml::from_str::<Option<_>>(text)? {
            Some(data) => data,
            None => BTreeMap::new(),
        };

        let mut manifest = Self::default();
        if let Some(channels) = data.get("channels").and_then(Value::as_sequence) {
            manifest.channels = channels
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }

        for (group, value) in &data {
            if group == "channels" {
                continue;
            }
            if to_install.is_some_and(|wanted| !wanted.contains(group)) {
                continue;
            }
            collect_group(group, value, subs, &mut manifest)?;
        }

        Ok(manifest)
    }

    /// Loads a manifest and an optional substitution file.
    pub fn load(path: &Path, subs_path: Option<&Path>) -> Result<Self> {
        info!("Reading packages from {}", path.display());
        let text = fs::read_to_string(path)?;
        let subs = match subs_path {
            Some(p) => serde_yaml::from_str(&fs::read_to_string(p)?)?,
            None => BTreeMap::new(),
        };
        Self::from_yaml_str(&text, &subs, None)
    }

    /// Splits packages by target environment: the default environment
    /// first, then named environments in name order.
    pub fn split_by_env(&self) -> Vec<(Option<String>, Vec<String>)> {
        split_by_env(&self.packages)
    }
}

/// Groups package specs by their `env` option.
pub fn split_by_env(packages: &[String]) -> Vec<(Option<String>, Vec<String>)> {
    let mut by_env: BTreeMap<Option<String>, Vec<String>> = BTreeMap::new();
    by_env.insert(None, Vec::new());
    for spec in packages.iter().map(|p| PackageSpec::parse(p)) {
        by_env.entry(spec.env).or_default().push(spec.name);
    }
    by_env.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = "\
channels:
  - conda-forge
  - bioconda
bio_nextgen:
  alignment:
    - bwa
    - bowtie2
  variant:
    - gatk4
    - \"delly;env=python2\"
    - old-tool
annotation:
  - vep
  - \"dv-caller;env=dv\"
";

    fn subs() -> BTreeMap<String, Option<String>> {
        let mut subs = BTreeMap::new();
        subs.insert("gatk4".to_string(), Some("gatk4=4.1".to_string()));
        subs.insert("old-tool".to_string(), None);
        subs
    }

    #[test]
    fn test_package_spec_parse() {
        assert_eq!(
            PackageSpec::parse("delly;env=python2"),
            PackageSpec {
                name: "delly".to_string(),
                env: Some("python2".to_string())
            }
        );
        assert_eq!(PackageSpec::parse("bwa").env, None);
        assert_eq!(PackageSpec::parse("x;pin=1").env, None);
    }

    #[test]
    fn test_flatten_manifest() {
        let manifest = PackageManifest::from_yaml_str(MANIFEST, &subs(), None).unwrap();
        assert_eq!(manifest.channels, vec!["conda-forge", "bioconda"]);
        assert_eq!(
            manifest.packages,
            vec!["dv-caller;env=dv", "vep", "bowtie2", "bwa", "delly;env=python2", "gatk4=4.1"]
        );
        assert_eq!(manifest.groups.get("bwa").map(String::as_str), Some("bio_nextgen"));
        assert_eq!(manifest.groups.get("vep").map(String::as_str), Some("annotation"));
    }

    #[test]
    fn test_restrict_groups() {
        let wanted = vec!["annotation".to_string()];
        let manifest = PackageManifest::from_yaml_str(MANIFEST, &BTreeMap::new(), Some(&wanted)).unwrap();
        assert_eq!(manifest.packages, vec!["dv-caller;env=dv", "vep"]);
    }

    #[test]
    fn test_split_by_env() {
        let manifest = PackageManifest::from_yaml_str(MANIFEST, &subs(), None).unwrap();
        let split = manifest.split_by_env();
        assert_eq!(split[0].0, None);
        assert_eq!(split[0].1, vec!["vep", "bowtie2", "bwa", "gatk4=4.1"]);
        assert_eq!(split[1], (Some("dv".to_string()), vec!["dv-caller".to_string()]));
        assert_eq!(split[2], (Some("python2".to_string()), vec!["delly".to_string()]));
    }

    #[test]
    fn test_split_always_has_default_env() {
        let split = split_by_env(&["x;env=python3".to_string()]);
        assert_eq!(split[0], (None, vec![]));
    }

    #[test]
    fn test_empty_manifest() {
        let manifest = PackageManifest::from_yaml_str("", &BTreeMap::new(), None).unwrap();
        assert!(manifest.packages.is_empty());
    }

    #[test]
    fn test_invalid_group_value() {
        let err = PackageManifest::from_yaml_str("tools: 3\n", &BTreeMap::new(), None).unwrap_err();
        assert!(matches!(err, SetupError::Config(_)));
    }

    #[test]
    fn test_python_pin() {
        assert_eq!(python_pin(Some("python2")), "python=2");
        assert_eq!(python_pin(Some("python3")), "python=3.6");
        assert_eq!(python_pin(None), "python=3.6");
    }
}
