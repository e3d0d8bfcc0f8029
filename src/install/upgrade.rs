//! Upgrade Lifecycle
//!
//! The `upgrade` subcommand:
//! 1. Merges saved install defaults into the request
//! 2. Upgrades the pipeline code (`-u`)
//! 3. With a tool directory, links entry scripts and installs third-party
//!    tools from the tool recipe tarball
//! 4. With data requested, fetches genome resource files
//! 5. Saves the effective options as the new defaults

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::builder::PossibleValuesParser;
use clap::{Args, ValueEnum};
use log::{debug, info};
use serde::Serialize;

use super::defaults::{apply_install_defaults, install_config_path, InstallDefaults};
use super::{absolute_path, anaconda_dir};
use crate::environment::{conda_bin, run_shell, CondaClient, InstalledPackage, PackageManifest, ScopedWorkDir};
use crate::error::{Result, SetupError};
use crate::fetch::fetch_to_file;

pub const SUPPORTED_GENOMES: &[&str] = &[
    "GRCh37", "hg19", "hg38", "hg38-noalt", "mm10", "mm9", "rn6", "rn5", "canFam3", "dm3",
    "galGal4", "phix", "pseudomonas_aeruginosa_ucbpp_pa14", "sacCer3", "TAIR10", "WBcel235",
    "xenTro3", "GRCz10", "GRCz11", "Sscrofa11.1", "BDGP6",
];

pub const SUPPORTED_INDEXES: &[&str] = &[
    "bwa", "rtg", "hisat2", "bbmap", "bowtie", "bowtie2", "minimap2", "novoalign", "twobit",
    "snap", "star", "seq",
];

pub const DATA_TARGETS: &[&str] = &[
    "variation", "rnaseq", "smallrna", "gemini", "cadd", "vep", "dbnsfp", "dbscsnv",
    "battenberg", "kraken", "ericscript", "gnomad",
];

/// Pipeline scripts linked into `<tooldir>/bin`.
pub const ENTRY_SCRIPTS: &[&str] = &[
    "bcbio_nextgen.py",
    "bcbio_setup_genome.py",
    "bcbio_prepare_samples.py",
    "bcbio_fastq_umi_prep.py",
];

const TOOLS_RECIPE_URL: &str = "https://github.com/chapmanb/cloudbiolinux/archive/master.tar.gz";
const GITREPO_URL: &str = "https://github.com/bcbio/bcbio-nextgen.git";
const GENOME_RESOURCES_URL: &str =
    "https://raw.githubusercontent.com/bcbio/bcbio-nextgen/master/config/genomes";

/// Which version of the pipeline code to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum UpgradeMode {
    Stable,
    Development,
    System,
    Deps,
    #[default]
    Skip,
}

/// Options of the `upgrade` subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct UpgradeArgs {
    /// Directory to install 3rd party software tools. Leave unspecified for no tools
    #[arg(long, value_parser = absolute_path)]
    pub tooldir: Option<PathBuf>,

    /// Genomes to download
    #[arg(long, value_parser = PossibleValuesParser::new(SUPPORTED_GENOMES))]
    pub genomes: Vec<String>,

    /// Aligner indexes to download
    #[arg(long, value_parser = PossibleValuesParser::new(SUPPORTED_INDEXES))]
    pub aligners: Vec<String>,

    /// Upgrade data dependencies
    #[arg(long = "data")]
    pub install_data: bool,

    /// Code version to upgrade
    #[arg(short = 'u', long, value_enum, default_value_t = UpgradeMode::Skip)]
    pub upgrade: UpgradeMode,

    /// Upgrade tools using the previously saved install directory
    #[arg(long)]
    pub tools: bool,

    /// Data to install. Allows customization or install of extra data
    #[arg(long, value_parser = PossibleValuesParser::new(DATA_TARGETS))]
    pub datatarget: Vec<String>,

    /// Create an isolated installation without PATH updates
    #[arg(long)]
    pub isolate: bool,

    /// Also link the CWL wrapper scripts
    #[arg(long)]
    pub cwl: bool,

    /// Data directory of the installation (default: derived from the executable)
    #[arg(long, value_parser = absolute_path)]
    pub datadir: Option<PathBuf>,
}

/// Finds the data directory of the installation this executable lives in
/// (`<datadir>/anaconda/bin/<exe>`).
pub fn datadir_from_exe(exe: &Path) -> Option<PathBuf> {
    let exe = fs::canonicalize(exe).unwrap_or_else(|_| exe.to_path_buf());
    let anaconda = exe.parent()?.parent()?;
    if anaconda.file_name()? != "anaconda" {
        return None;
    }
    anaconda.parent().map(Path::to_path_buf)
}

fn resolve_datadir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(datadir) = explicit {
        return Ok(datadir.to_path_buf());
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| datadir_from_exe(&exe))
        .ok_or_else(|| {
            SetupError::Config("Could not determine the data directory; pass --datadir".to_string())
        })
}

/// Links `script` into `<tooldir>/bin`, replacing a dangling link.
///
/// The source is `<bin_dir>/<script>`, or the script inside the named
/// conda environment. `prefix` renames the link to `<prefix>_<script>`.
pub fn symlink_script(
    bin_dir: &Path,
    tooldir: &Path,
    script: &str,
    env_name: Option<&str>,
    prefix: Option<&str>,
) -> Result<PathBuf> {
    let source = match (env_name, bin_dir.parent()) {
        (Some(env), Some(root)) => root.join("envs").join(env).join("bin").join(script),
        _ => bin_dir.join(script),
    };

    let bindir = tooldir.join("bin");
    fs::create_dir_all(&bindir)?;

    let link_name = match prefix {
        Some(prefix) => format!("{}_{}", prefix, script),
        None => script.to_string(),
    };
    let dest = bindir.join(link_name);

    if !dest.exists() {
        if dest.symlink_metadata().is_ok() {
            debug!("Replacing dangling link {}", dest.display());
            fs::remove_file(&dest)?;
        }
        make_symlink(&source, &dest)?;
    }
    Ok(dest)
}

#[cfg(unix)]
fn make_symlink(source: &Path, dest: &Path) -> Result<()> {
    std::os::unix::fs::symlink(source, dest)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_symlink(source: &Path, dest: &Path) -> Result<()> {
    Err(SetupError::Config(format!(
        "Cannot link {} to {}: symlinks require a unix system",
        source.display(),
        dest.display()
    )))
}

fn link_entry_scripts(bin_dir: &Path, tooldir: &Path, cwl: bool) -> Result<()> {
    for script in ENTRY_SCRIPTS {
        symlink_script(bin_dir, tooldir, script, None, None)?;
    }
    if cwl {
        symlink_script(bin_dir, tooldir, "bcbio_vm.py", Some("bcbiovm"), None)?;
        symlink_script(bin_dir, tooldir, "python", Some("bcbiovm"), Some("bcbiovm"))?;
    }
    Ok(())
}

fn fetch_tools_recipe(work: &ScopedWorkDir) -> Result<PathBuf> {
    let base = work.join("cloudbiolinux");
    if !base.exists() {
        let script = format!(
            "wget --progress=dot:mega --no-check-certificate -O- {} | tar xz && \
             (mv cloudbiolinux-master cloudbiolinux || mv master cloudbiolinux)",
            TOOLS_RECIPE_URL
        );
        run_shell(&script, work.path())?;
    }
    Ok(base)
}

#[derive(Serialize)]
struct ManifestEntry<'a> {
    version: &'a str,
    channel: &'a str,
}

/// Rewrites the package manifest directory from the installed packages.
///
/// Files starting with `toolplus` are kept.
pub fn write_package_manifest(manifest_dir: &Path, installed: &[InstalledPackage]) -> Result<PathBuf> {
    info!("Creating manifest of installed packages in {}", manifest_dir.display());
    if manifest_dir.exists() {
        for entry in fs::read_dir(manifest_dir)? {
            let entry = entry?;
            if !entry.file_name().to_string_lossy().starts_with("toolplus") {
                fs::remove_file(entry.path())?;
            }
        }
    }
    fs::create_dir_all(manifest_dir)?;

    let entries: BTreeMap<&str, ManifestEntry> = installed
        .iter()
        .map(|p| {
            (
                p.name.as_str(),
                ManifestEntry {
                    version: &p.version,
                    channel: &p.channel,
                },
            )
        })
        .collect();

    let out = manifest_dir.join("conda-packages.yaml");
    fs::write(&out, serde_yaml::to_string(&entries)?)?;
    Ok(out)
}

fn upgrade_thirdparty_tools(client: &CondaClient, work: &ScopedWorkDir, datadir: &Path) -> Result<()> {
    let recipe = fetch_tools_recipe(work)?;
    let package_yaml = recipe
        .join("contrib")
        .join("flavor")
        .join("ngs_pipeline_minimal")
        .join("packages-conda.yaml");

    let manifest = PackageManifest::load(&package_yaml, None)?;
    client.install_in(&manifest)?;

    let installed = client.list_packages(None)?;
    write_package_manifest(&datadir.join("manifest"), &installed)?;
    Ok(())
}

fn upgrade_code(mode: UpgradeMode, client: &CondaClient, datadir: &Path) -> Result<()> {
    match mode {
        UpgradeMode::Skip | UpgradeMode::System => {
            debug!("Skipping pipeline code upgrade ({:?})", mode);
            Ok(())
        }
        UpgradeMode::Stable => {
            info!("Upgrading pipeline to latest stable release");
            client.install_args(&["bcbio-nextgen".to_string()], &client.channel_args()?)
        }
        UpgradeMode::Deps => {
            info!("Upgrading pipeline dependencies");
            client.install_args(
                &["--only-deps".to_string(), "bcbio-nextgen".to_string()],
                &client.channel_args()?,
            )
        }
        UpgradeMode::Development => {
            info!("Upgrading pipeline to latest development version");
            let pip = anaconda_dir(datadir).join("bin").join("pip");
            let script = format!(
                "{} install --upgrade --no-deps git+{}#egg=bcbio-nextgen",
                pip.display(),
                GITREPO_URL
            );
            run_shell(&script, datadir)?;
            Ok(())
        }
    }
}

/// Where a genome's resource file is cached.
pub fn genome_resources_path(datadir: &Path, genome: &str) -> PathBuf {
    datadir
        .join("genomes")
        .join(genome)
        .join(format!("{}-resources.yaml", genome))
}

/// Fetches resource files for `genomes`, skipping cached ones.
pub fn fetch_genome_resources(datadir: &Path, genomes: &[String]) -> Result<Vec<PathBuf>> {
    let mut fetched = Vec::new();
    for genome in genomes {
        let dest = genome_resources_path(datadir, genome);
        if dest.exists() {
            debug!("Using cached resources for {}", genome);
            continue;
        }
        let url = format!("{}/{}-resources.yaml", GENOME_RESOURCES_URL, genome);
        info!("Fetching resources for {}", genome);
        fetch_to_file(&url, &dest)?;
        fetched.push(dest);
    }
    Ok(fetched)
}

/// Runs the `upgrade` subcommand. Temporary files go under `work_parent`.
pub fn upgrade(mut args: UpgradeArgs, work_parent: &Path) -> Result<UpgradeArgs> {
    info!("Upgrading installation");
    let datadir = resolve_datadir(args.datadir.as_deref())?;
    let config_path = install_config_path(&datadir);
    let saved = InstallDefaults::load(&config_path)?;
    apply_install_defaults(&mut args, &saved)?;

    if args.upgrade != UpgradeMode::Skip || args.tooldir.is_some() {
        let client = CondaClient::new(conda_bin(None, Some(&datadir))?);
        upgrade_code(args.upgrade, &client, &datadir)?;

        if let Some(tooldir) = &args.tooldir {
            let work = ScopedWorkDir::acquire(work_parent)?;
            info!("Upgrading third party tools to latest versions");
            let bin_dir = anaconda_dir(&datadir).join("bin");
            link_entry_scripts(&bin_dir, tooldir, args.cwl)?;
            upgrade_thirdparty_tools(&client.clone().in_dir(work.path()), &work, &datadir)?;
            info!("Third party tools upgrade complete.");
        }
    }

    if args.install_data {
        info!(
            "Installing data targets {:?} with aligner indexes {:?}",
            args.datatarget, args.aligners
        );
        fetch_genome_resources(&datadir, &args.genomes)?;
    }

    saved.updated_from(&args).save(&config_path)?;
    info!("Upgrade completed successfully");
    Ok(args)
}
