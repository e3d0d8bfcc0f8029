//! Bootstrap Installer
//!
//! The `install` subcommand sets up a fresh installation:
//! 1. Creates the data directory
//! 2. Installs an isolated miniconda into `<datadir>/anaconda`
//! 3. Installs the pipeline's conda requirements
//! 4. Writes the system configuration
//! 5. Hands over to the installed pipeline's `upgrade`

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Local;
use clap::builder::PossibleValuesParser;
use clap::Args;
use log::{debug, info};

use super::upgrade::{SUPPORTED_GENOMES, SUPPORTED_INDEXES};
use super::{absolute_path, anaconda_dir};
use crate::environment::{run_checked, run_shell, wget, CondaClient, ScopedWorkDir};
use crate::error::Result;
use crate::fetch::fetch_text;

const REQUIREMENTS_URL: &str =
    "https://raw.githubusercontent.com/bcbio/bcbio-nextgen/master/requirements-conda.txt";
const SYSTEM_CONFIG_URL: &str =
    "https://raw.githubusercontent.com/bcbio/bcbio-nextgen/master/config/bcbio_system.yaml";
const MINICONDA_URL: &str = "https://repo.continuum.io/miniconda/Miniconda3-latest";

/// Installed pipeline entry point, relative to the anaconda directory.
const ENTRY_POINT: &str = "bin/bcbio_nextgen.py";

/// Flags accepted by `install` but not by `upgrade`.
const INSTALLER_ONLY_FLAGS: &[&str] = &["--minimize-disk", "--nodata"];

/// Resource programs whose `dir` entries are left alone.
const KEEP_DIR_PROGRAMS: &[&str] = &["log", "tmp"];

/// Options of the `install` subcommand.
#[derive(Debug, Clone, Args)]
pub struct InstallArgs {
    /// Directory to install genome data
    #[arg(value_parser = absolute_path)]
    pub datadir: PathBuf,

    /// Directory to install 3rd party software tools. Leave unspecified for no tools
    #[arg(long, value_parser = absolute_path)]
    pub tooldir: Option<PathBuf>,

    /// Genomes to download
    #[arg(long, value_parser = PossibleValuesParser::new(SUPPORTED_GENOMES))]
    pub genomes: Vec<String>,

    /// Aligner indexes to download
    #[arg(long, value_parser = PossibleValuesParser::new(SUPPORTED_INDEXES))]
    pub aligners: Vec<String>,

    /// Number of cores to use if local indexing is necessary
    #[arg(long, default_value_t = num_cpus::get())]
    pub cores: usize,

    /// Do not install data dependencies
    #[arg(long)]
    pub nodata: bool,

    /// Create an isolated installation without PATH updates
    #[arg(long)]
    pub isolate: bool,

    /// Remove intermediate files to reduce disk usage
    #[arg(long)]
    pub minimize_disk: bool,
}

/// Arguments forwarded to `upgrade`: the data directory positional,
/// installer-only flags and `--cores <n>` are removed, and `--data` is
/// added unless `--nodata` was given.
pub fn clean_args(argv: &[String], datadir: &Path) -> Vec<String> {
    let nodata = argv.iter().any(|a| a == "--nodata");
    let mut cleaned = Vec::new();
    let mut iter = argv.iter();

    while let Some(arg) = iter.next() {
        if arg == "--cores" {
            iter.next();
            continue;
        }
        if arg.starts_with("--cores=") || INSTALLER_ONLY_FLAGS.contains(&arg.as_str()) {
            continue;
        }
        if !arg.starts_with('-') && absolute_path(arg).is_ok_and(|p| p == datadir) {
            continue;
        }
        cleaned.push(arg.clone());
    }

    if !nodata {
        cleaned.push("--data".to_string());
    }
    cleaned
}

/// Rewrites the system configuration template.
///
/// In the `resources` section, `dir:` entries of programs other than
/// `log` and `tmp` point into `<tooldir>/share/java`. Top-level `galaxy`
/// lines are commented out.
pub fn rewrite_system_config(template: &str, tooldir: Option<&Path>) -> String {
    let java_dir = tooldir.map(|t| t.join("share").join("java"));
    let mut out = String::with_capacity(template.len());
    let mut in_resources = false;
    let mut program: Option<String> = None;

    for line in template.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        let trimmed = body.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            out.push_str(line);
            continue;
        }

        if !line.starts_with(' ') {
            in_resources = line.starts_with("resources");
            program = None;
            if line.starts_with("galaxy") {
                out.push_str("# ");
            }
            out.push_str(line);
            continue;
        }

        if in_resources && line.starts_with("  ") && !line[2..].starts_with(' ') {
            let name = trimmed.split(':').next().unwrap_or_default().trim();
            program = (!KEEP_DIR_PROGRAMS.contains(&name)).then(|| name.to_string());
            out.push_str(line);
            continue;
        }

        if trimmed.starts_with("dir:") {
            if let (Some(_), Some(java_dir)) = (program.take(), &java_dir) {
                let key = body.split(':').next().unwrap_or_default();
                let final_dir = Path::new(trimmed.split_whitespace().last().unwrap_or_default())
                    .file_name()
                    .map(|n| java_dir.join(n))
                    .unwrap_or_else(|| java_dir.clone());
                out.push_str(&format!("{}: {}\n", key, final_dir.display()));
                continue;
            }
        }

        out.push_str(line);
    }

    out
}

/// Backup name for an existing system configuration.
pub fn backup_path(path: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M");
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".bak{}", stamp));
    PathBuf::from(name)
}

/// Writes `<datadir>/galaxy/<config>` from `template`.
///
/// An existing file is kept when no tool directory is given and backed up
/// otherwise.
pub fn write_system_config_text(
    template: &str,
    file_name: &str,
    datadir: &Path,
    tooldir: Option<&Path>,
) -> Result<PathBuf> {
    let out_file = datadir.join("galaxy").join(file_name);
    if let Some(parent) = out_file.parent() {
        fs::create_dir_all(parent)?;
    }

    if out_file.exists() {
        if tooldir.is_none() {
            debug!("Keeping existing {}", out_file.display());
            return Ok(out_file);
        }
        let backup = backup_path(&out_file);
        info!("Backing up {} to {}", out_file.display(), backup.display());
        fs::copy(&out_file, &backup)?;
    }

    fs::write(&out_file, rewrite_system_config(template, tooldir))?;
    Ok(out_file)
}

fn write_system_config(datadir: &Path, tooldir: Option<&Path>) -> Result<PathBuf> {
    let file_name = SYSTEM_CONFIG_URL.rsplit('/').next().unwrap_or("bcbio_system.yaml");
    let out_file = datadir.join("galaxy").join(file_name);
    if out_file.exists() && tooldir.is_none() {
        return Ok(out_file);
    }
    let template = fetch_text(SYSTEM_CONFIG_URL)?;
    write_system_config_text(&template, file_name, datadir, tooldir)
}

fn miniconda_url() -> String {
    let platform = if cfg!(target_os = "macos") { "MacOSX" } else { "Linux" };
    format!("{}-{}-x86_64.sh", MINICONDA_URL, platform)
}

/// Installs miniconda into `<datadir>/anaconda` unless conda is present.
fn install_miniconda(datadir: &Path, work: &ScopedWorkDir) -> Result<PathBuf> {
    let anaconda = anaconda_dir(datadir);
    let conda = anaconda.join("bin").join("conda");
    if conda.exists() {
        info!("Using existing conda at {}", conda.display());
        return Ok(conda);
    }
    if anaconda.exists() {
        fs::remove_dir_all(&anaconda)?;
    }

    let url = miniconda_url();
    let installer = url.rsplit('/').next().unwrap_or("miniconda.sh").to_string();
    if !work.join(&installer).exists() {
        wget(&url, work.path())?;
    }
    run_shell(
        &format!("bash {} -b -p {}", installer, anaconda.display()),
        work.path(),
    )?;
    Ok(conda)
}

/// Installs the pipeline's conda requirements and returns its entry point.
fn install_conda_pkgs(conda: &Path, datadir: &Path, work: &ScopedWorkDir) -> Result<PathBuf> {
    let anaconda = anaconda_dir(datadir);
    let client = CondaClient::new(conda)
        .with_env("CONDA_PKGS_DIRS", anaconda.join("pkgs").to_string_lossy())
        .with_env("CONDA_ENVS_DIRS", anaconda.join("envs").to_string_lossy())
        .in_dir(work.path());

    let requirements = REQUIREMENTS_URL.rsplit('/').next().unwrap_or("requirements-conda.txt");
    if !work.join(requirements).exists() {
        wget(REQUIREMENTS_URL, work.path())?;
    }

    let channels = client.channel_args()?;
    client.install_args(&["--only-deps".to_string(), "bcbio-nextgen".to_string()], &channels)?;
    client.install_args(&["--file".to_string(), requirements.to_string()], &channels)?;
    Ok(anaconda.join(ENTRY_POINT))
}

/// Runs the `install` subcommand.
///
/// `argv` holds the arguments given after `install`; temporary files go
/// under `work_parent`.
pub fn bootstrap(args: &InstallArgs, argv: &[String], work_parent: &Path) -> Result<()> {
    fs::create_dir_all(&args.datadir)?;

    let entry_point = {
        let work = ScopedWorkDir::acquire(work_parent)?;
        info!("Installing isolated base python installation");
        let conda = install_miniconda(&args.datadir, &work)?;
        info!("Installing pipeline conda requirements");
        install_conda_pkgs(&conda, &args.datadir, &work)?
    };

    info!("Installing data and third party dependencies");
    let system_config = write_system_config(&args.datadir, args.tooldir.as_deref())?;
    debug!("System configuration at {}", system_config.display());

    let upgrade_args = clean_args(argv, &args.datadir);
    let mut cmd = Command::new(&entry_point);
    cmd.arg("upgrade").args(&upgrade_args).current_dir(work_parent);
    run_checked(
        &mut cmd,
        &format!("{} upgrade {}", entry_point.display(), upgrade_args.join(" ")),
    )?;
    Ok(())
}
