//! Conda Client
//!
//! Thin wrapper around the `conda` and `mamba` command line tools.
//!
//! # Binary Resolution Priority
//!
//! 1. An explicit path
//! 2. `conda` next to the running executable
//! 3. `<datadir>/anaconda/bin/conda`
//! 4. System PATH

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use serde::Deserialize;

use super::packages::{python_pin, PackageManifest};
use super::shell::run_checked;
use crate::error::{Result, SetupError};

/// Channels every installation needs.
pub const REQUIRED_CHANNELS: &[&str] = &["bioconda", "conda-forge"];

/// Environments created on demand when the manifest targets them.
pub const MANAGED_ENVS: &[&str] = &["python3", "samtools0", "dv", "python2"];

/// Packages removed from the default environment before installing.
const PROBLEM_PACKAGES: &[&str] = &["r-tximport", "py2cairo"];

/// Package whose presence marks a finished initial base install.
const BASE_MARKER_PACKAGE: &str = "r-base";

fn which(program: &str) -> Option<PathBuf> {
    let output = Command::new("which").arg(program).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!path.is_empty()).then(|| PathBuf::from(path))
}

/// `conda` installed next to the running executable.
pub static LOCAL_CONDA: Lazy<Option<PathBuf>> = Lazy::new(|| {
    let exe = std::env::current_exe().ok()?;
    let local = exe.parent()?.join("conda");
    if local.exists() {
        info!("Using conda next to executable: {}", local.display());
        Some(local)
    } else {
        None
    }
});

/// `conda` found on the system PATH.
pub static PATH_CONDA: Lazy<Option<PathBuf>> = Lazy::new(|| {
    let found = which("conda");
    match &found {
        Some(path) => info!("Using system conda: {}", path.display()),
        None => debug!("conda not found on PATH"),
    }
    found
});

/// Resolves the conda binary.
pub fn conda_bin(explicit: Option<&Path>, datadir: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Some(path) = LOCAL_CONDA.as_ref() {
        return Ok(path.clone());
    }

    if let Some(datadir) = datadir {
        let bundled = datadir.join("anaconda").join("bin").join("conda");
        if bundled.exists() {
            return Ok(bundled);
        }
    }

    PATH_CONDA.clone().ok_or_else(|| {
        SetupError::Config("conda not found; install it or pass an explicit path".to_string())
    })
}

/// Returns `-c <channel>` arguments for wanted channels not yet configured.
///
/// `config_show` is the YAML printed by `conda config --show`.
pub fn missing_channels(config_show: &str, wanted: &[&str]) -> Vec<String> {
    let configured: Vec<String> = serde_yaml::from_str::<serde_yaml::Value>(config_show)
        .ok()
        .and_then(|v| v.get("channels").and_then(|c| c.as_sequence()).cloned())
        .unwrap_or_default()
        .iter()
        .filter_map(|c| c.as_str().map(str::to_string))
        .collect();

    wanted
        .iter()
        .filter(|c| {
            !configured
                .iter()
                .any(|orig| orig.ends_with(*c) || orig.ends_with(&format!("{}/", c)))
        })
        .flat_map(|c| ["-c".to_string(), c.to_string()])
        .collect()
}

/// One entry of `conda list --json`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InstalledPackage {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub channel: String,
}

#[derive(Debug, Deserialize)]
struct EnvInfo {
    envs: Vec<String>,
    conda_prefix: String,
}

/// Parses `conda list --json` output.
pub fn parse_installed(json: &str) -> Result<Vec<InstalledPackage>> {
    Ok(serde_json::from_str(json)?)
}

/// Parses `conda info --envs --json`, keeping environments under the
/// conda prefix.
pub fn parse_env_prefixes(json: &str) -> Result<Vec<String>> {
    let info: EnvInfo = serde_json::from_str(json)?;
    Ok(info
        .envs
        .into_iter()
        .filter(|e| e.starts_with(&info.conda_prefix))
        .collect())
}

/// Runs conda commands against one installation.
#[derive(Debug, Clone)]
pub struct CondaClient {
    conda: PathBuf,
    env: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
}

impl CondaClient {
    pub fn new(conda: impl Into<PathBuf>) -> Self {
        Self {
            conda: conda.into(),
            env: Vec::new(),
            current_dir: None,
        }
    }

    /// Sets an environment variable for every command.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Runs every command inside `dir`.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn conda_path(&self) -> &Path {
        &self.conda
    }

    /// `mamba` installed next to `conda`.
    pub fn mamba_path(&self) -> PathBuf {
        self.conda.with_file_name("mamba")
    }

    fn command(&self, program: &Path) -> Command {
        let mut cmd = Command::new(program);
        cmd.envs(self.env.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn run_program(&self, program: &Path, args: &[String]) -> Result<Output> {
        let label = format!("{} {}", program.display(), args.join(" "));
        run_checked(self.command(program).args(args), &label)
    }

    fn run(&self, args: &[String]) -> Result<Output> {
        self.run_program(&self.conda, args)
    }

    fn env_args(env: Option<&str>) -> Vec<String> {
        env.map(|e| vec!["-n".to_string(), e.to_string()])
            .unwrap_or_default()
    }

    /// Output of `conda config --show`.
    pub fn config_show(&self) -> Result<String> {
        let output = self.run(&["config".to_string(), "--show".to_string()])?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Channel arguments for [`REQUIRED_CHANNELS`] missing from the config.
    pub fn channel_args(&self) -> Result<Vec<String>> {
        Ok(missing_channels(&self.config_show()?, REQUIRED_CHANNELS))
    }

    /// Installs packages into `env` (the default environment when `None`).
    pub fn install(&self, packages: &[String], env: Option<&str>, channels: &[String]) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        info!(
            "Installing {} packages into {} environment",
            packages.len(),
            env.unwrap_or("default")
        );
        let mut args = vec!["install".to_string(), "-y".to_string()];
        args.extend(Self::env_args(env));
        args.extend(channels.iter().cloned());
        args.extend(packages.iter().cloned());
        self.run(&args)?;
        Ok(())
    }

    /// Installs with extra raw arguments (`--only-deps`, `--file`).
    pub fn install_args(&self, extra: &[String], channels: &[String]) -> Result<()> {
        let mut args = vec!["install".to_string(), "--yes".to_string()];
        args.extend(channels.iter().cloned());
        args.extend(extra.iter().cloned());
        self.run(&args)?;
        Ok(())
    }

    pub fn remove(&self, packages: &[String], channels: &[String]) -> Result<()> {
        let mut args = vec!["remove".to_string()];
        args.extend(channels.iter().cloned());
        args.push("-y".to_string());
        args.extend(packages.iter().cloned());
        self.run(&args)?;
        Ok(())
    }

    /// Creates a named environment pinned to `python`.
    pub fn create_env(&self, name: &str, python: &str) -> Result<()> {
        info!("Creating conda environment: {}", name);
        let args: Vec<String> = ["create", "--no-default", "-y", "--name", name, python, "nomkl"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        self.run(&args)?;
        Ok(())
    }

    pub fn list_packages(&self, env: Option<&str>) -> Result<Vec<InstalledPackage>> {
        let mut args = vec!["list".to_string(), "--json".to_string()];
        args.extend(Self::env_args(env));
        let output = self.run(&args)?;
        parse_installed(&String::from_utf8_lossy(&output.stdout))
    }

    /// Environment prefixes managed by this installation.
    pub fn env_prefixes(&self) -> Result<Vec<String>> {
        let args: Vec<String> = ["info", "--envs", "--json"].iter().map(|s| s.to_string()).collect();
        let output = self.run(&args)?;
        parse_env_prefixes(&String::from_utf8_lossy(&output.stdout))
    }

    /// Creates the managed environments the manifest targets.
    fn create_environments(&self, manifest: &PackageManifest) -> Result<()> {
        let wanted: Vec<String> = manifest
            .split_by_env()
            .into_iter()
            .filter_map(|(env, _)| env)
            .collect();

        let existing = self.env_prefixes()?;
        for env in MANAGED_ENVS.iter().filter(|e| wanted.iter().any(|w| w == *e)) {
            let suffix = format!("/{}", env);
            if existing.iter().any(|p| p.ends_with(&suffix)) {
                debug!("Environment '{}' already exists", env);
                continue;
            }
            self.create_env(env, python_pin(Some(env)))?;
        }
        Ok(())
    }

    /// Removes packages that moved out of the default environment.
    fn remove_migrated(&self, manifest: &PackageManifest, channels: &[String]) -> Result<()> {
        let mut problems: Vec<String> = PROBLEM_PACKAGES.iter().map(|s| s.to_string()).collect();
        for (env, packages) in manifest.split_by_env() {
            if env.is_some() {
                problems.extend(packages);
            }
        }

        info!("Checking for problematic or migrated packages in default environment");
        let installed: Vec<String> = self
            .list_packages(None)?
            .into_iter()
            .filter(|p| problems.contains(&p.name))
            .map(|p| p.name)
            .collect();

        if !installed.is_empty() {
            info!(
                "Found packages that moved from default environment: {}",
                installed.join(", ")
            );
            self.remove(&installed, channels)?;
        }
        Ok(())
    }

    /// Installs the default environment's packages, using mamba when the
    /// base install has not happened yet.
    fn initial_base_install(&self, packages: &[String], channels: &[String]) -> Result<()> {
        let installed: Vec<String> = self.list_packages(None)?.into_iter().map(|p| p.name).collect();
        if installed.iter().any(|p| p == BASE_MARKER_PACKAGE) {
            debug!("Base packages already present");
            return Ok(());
        }

        info!("Installing initial set of packages for default environment with mamba");
        let python = python_pin(None).to_string();
        if !installed.iter().any(|p| p == "mamba") {
            self.install(&[python.clone(), "mamba".to_string()], None, channels)?;
        }

        let mut sorted = packages.to_vec();
        sorted.sort();
        let mut args = vec!["install".to_string(), "-y".to_string()];
        args.extend(channels.iter().cloned());
        args.push(python);
        args.extend(sorted);

        if let Err(e) = self.run_program(&self.mamba_path(), &args) {
            warn!("mamba install failed, falling back to conda: {}", e);
        }
        Ok(())
    }

    /// Installs a package manifest into this conda installation.
    pub fn install_in(&self, manifest: &PackageManifest) -> Result<()> {
        let channels: Vec<String> = manifest
            .channels
            .iter()
            .flat_map(|c| ["-c".to_string(), c.clone()])
            .collect();

        self.create_environments(manifest)?;
        self.remove_migrated(manifest, &channels)?;

        for (env, packages) in manifest.split_by_env() {
            if env.is_none() {
                self.initial_base_install(&packages, &channels)?;
            }
            self.install(&packages, env.as_deref(), &channels)?;
        }
        Ok(())
    }
}
