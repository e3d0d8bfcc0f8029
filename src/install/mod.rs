//! Installation Module
//!
//! Bootstraps a fresh installation and upgrades an existing one.

pub mod bootstrap;
pub mod defaults;
pub mod upgrade;

use std::env;
use std::path::{Path, PathBuf};

pub use bootstrap::{bootstrap, clean_args, rewrite_system_config, InstallArgs};
pub use defaults::{apply_install_defaults, install_config_path, InstallDefaults};
pub use upgrade::{upgrade, UpgradeArgs, UpgradeMode};

/// Parses a command line path into an absolute one, expanding `~`.
pub fn absolute_path(value: &str) -> std::result::Result<PathBuf, String> {
    if value.is_empty() {
        return Err("path must not be empty".to_string());
    }

    let expanded = match value.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            let home = env::var("HOME").map_err(|_| "HOME is not set".to_string())?;
            PathBuf::from(format!("{}{}", home, rest))
        }
        _ => PathBuf::from(value),
    };

    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(expanded))
            .map_err(|e| e.to_string())
    }
}

/// Isolated conda installation inside a data directory.
pub fn anaconda_dir(datadir: &Path) -> PathBuf {
    datadir.join("anaconda")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_path() {
        assert_eq!(absolute_path("/data").unwrap(), PathBuf::from("/data"));
        let relative = absolute_path("data").unwrap();
        assert!(relative.is_absolute());
        assert!(relative.ends_with("data"));
        assert!(absolute_path("").is_err());
    }

    #[test]
    fn test_anaconda_dir() {
        assert_eq!(anaconda_dir(Path::new("/d")), PathBuf::from("/d/anaconda"));
    }
}
