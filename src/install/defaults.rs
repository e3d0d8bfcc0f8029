//! Saved Install Defaults
//!
//! `<datadir>/config/install-params.yaml` remembers the options of earlier
//! upgrades so later runs can omit them.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::upgrade::{UpgradeArgs, UpgradeMode};
use crate::error::{Result, SetupError};

/// Data targets installed when none of them was requested.
pub const STANDARD_TARGETS: &[&str] = &["variation", "rnaseq", "smallrna"];

/// Legacy `toolplus` entries that map to data targets unchanged.
const TOOLPLUS_TARGETS: &[&str] = &["cadd", "dbnsfp", "dbscsnv", "kraken", "gnomad"];

/// Contents of `install-params.yaml`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct InstallDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooldir: Option<String>,
    #[serde(default)]
    pub genomes: Vec<String>,
    #[serde(default)]
    pub aligners: Vec<String>,
    #[serde(default)]
    pub datatarget: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub toolplus: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isolate: Option<bool>,
}

/// Location of the defaults file for a data directory.
pub fn install_config_path(datadir: &Path) -> PathBuf {
    datadir.join("config").join("install-params.yaml")
}

impl InstallDefaults {
    /// Loads saved defaults. A missing or empty file yields empty defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::metadata(path) {
            Ok(meta) if meta.len() > 0 => {}
            _ => {
                debug!("No saved install defaults at {}", path.display());
                return Ok(Self::default());
            }
        }
        let content = fs::read_to_string(path)?;
        let defaults: Option<Self> = serde_yaml::from_str(&content)?;
        Ok(defaults.unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yaml::to_string(self)?)?;
        info!("Saved install defaults to {}", path.display());
        Ok(())
    }

    /// Defaults to persist after an upgrade with `args`.
    pub fn updated_from(&self, args: &UpgradeArgs) -> Self {
        Self {
            tooldir: args
                .tooldir
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .or_else(|| self.tooldir.clone()),
            genomes: args.genomes.clone(),
            aligners: args.aligners.clone(),
            datatarget: args.datatarget.clone(),
            toolplus: self.toolplus.clone(),
            isolate: Some(args.isolate),
        }
    }
}

fn merge_missing(target: &mut Vec<String>, saved: &[String]) {
    for value in saved {
        if !target.contains(value) {
            target.push(value.clone());
        }
    }
}

/// Resolves data targets from the request, saved targets and legacy
/// `toolplus` entries.
fn datatarget_defaults(requested: &mut Vec<String>, defaults: &InstallDefaults) {
    let mut saved = defaults.datatarget.clone();
    for tool in &defaults.toolplus {
        let target = match tool.as_str() {
            "data" => Some("gemini"),
            t if TOOLPLUS_TARGETS.contains(&t) => Some(t),
            _ => None,
        };
        if let Some(target) = target {
            if !saved.iter().any(|s| s == target) {
                saved.push(target.to_string());
            }
        }
    }

    merge_missing(requested, &saved);

    if !requested.iter().any(|t| STANDARD_TARGETS.contains(&t.as_str())) {
        requested.extend(STANDARD_TARGETS.iter().map(|t| t.to_string()));
    }
}

/// Fills unset upgrade options from saved defaults.
pub fn apply_install_defaults(args: &mut UpgradeArgs, defaults: &InstallDefaults) -> Result<()> {
    if !args.genomes.is_empty() || !args.aligners.is_empty() || !args.datatarget.is_empty() {
        args.install_data = true;
    }

    let needs_tooldir = args.tools || args.upgrade == UpgradeMode::Development;
    if needs_tooldir && args.tooldir.is_none() {
        match &defaults.tooldir {
            Some(saved) => args.tooldir = Some(PathBuf::from(saved)),
            None if args.tools => {
                return Err(SetupError::Config(
                    "Default tool directory not yet saved in config defaults. \
                     Specify '--tooldir=/path/to/tools' to upgrade tools. \
                     After a successful upgrade, '--tools' will work for future upgrades."
                        .to_string(),
                ))
            }
            None => {}
        }
    }

    merge_missing(&mut args.aligners, &defaults.aligners);
    if args.genomes.is_empty() {
        merge_missing(&mut args.genomes, &defaults.genomes);
    }

    datatarget_defaults(&mut args.datatarget, defaults);

    if !args.isolate {
        if let Some(isolate) = defaults.isolate {
            args.isolate = isolate;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn saved() -> InstallDefaults {
        InstallDefaults {
            tooldir: Some("/opt/tools".to_string()),
            genomes: vec!["hg38".to_string()],
            aligners: vec!["bwa".to_string()],
            datatarget: vec!["vep".to_string()],
            toolplus: vec!["data".to_string(), "cadd".to_string(), "unknown".to_string()],
            isolate: Some(true),
        }
    }

    #[test]
    fn test_tools_uses_saved_tooldir() {
        let mut args = UpgradeArgs {
            tools: true,
            ..Default::default()
        };
        apply_install_defaults(&mut args, &saved()).unwrap();
        assert_eq!(args.tooldir, Some(PathBuf::from("/opt/tools")));
        assert!(args.isolate);
    }

    #[test]
    fn test_tools_without_saved_tooldir_fails() {
        let mut args = UpgradeArgs {
            tools: true,
            ..Default::default()
        };
        let err = apply_install_defaults(&mut args, &InstallDefaults::default()).unwrap_err();
        assert!(matches!(err, SetupError::Config(_)));
    }

    #[test]
    fn test_data_implied_by_genomes() {
        let mut args = UpgradeArgs {
            genomes: vec!["GRCh37".to_string()],
            ..Default::default()
        };
        apply_install_defaults(&mut args, &saved()).unwrap();
        assert!(args.install_data);
        assert_eq!(args.genomes, vec!["GRCh37"]);
        assert_eq!(args.aligners, vec!["bwa"]);
    }

    #[test]
    fn test_saved_genomes_merge_when_none_given() {
        let mut args = UpgradeArgs {
            aligners: vec!["star".to_string()],
            ..Default::default()
        };
        apply_install_defaults(&mut args, &saved()).unwrap();
        assert_eq!(args.genomes, vec!["hg38"]);
        assert_eq!(args.aligners, vec!["star", "bwa"]);
    }

    #[test]
    fn test_datatargets_with_toolplus() {
        let mut args = UpgradeArgs::default();
        apply_install_defaults(&mut args, &saved()).unwrap();
        assert_eq!(
            args.datatarget,
            vec!["vep", "gemini", "cadd", "variation", "rnaseq", "smallrna"]
        );
    }

    #[test]
    fn test_standard_target_present_skips_defaults() {
        let mut args = UpgradeArgs {
            datatarget: vec!["rnaseq".to_string()],
            ..Default::default()
        };
        apply_install_defaults(&mut args, &InstallDefaults::default()).unwrap();
        assert_eq!(args.datatarget, vec!["rnaseq"]);
    }

    #[test]
    fn test_load_missing_then_saved() {
        let temp_dir = tempdir().unwrap();
        let path = install_config_path(temp_dir.path());
        assert_eq!(InstallDefaults::load(&path).unwrap(), InstallDefaults::default());

        let defaults = saved();
        defaults.save(&path).unwrap();
        assert_eq!(InstallDefaults::load(&path).unwrap(), defaults);
    }

    #[test]
    fn test_updated_from_keeps_saved_tooldir() {
        let args = UpgradeArgs {
            genomes: vec!["mm10".to_string()],
            ..Default::default()
        };
        let updated = saved().updated_from(&args);
        assert_eq!(updated.tooldir.as_deref(), Some("/opt/tools"));
        assert_eq!(updated.genomes, vec!["mm10"]);
        assert_eq!(updated.isolate, Some(false));
    }
}
