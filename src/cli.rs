//! Command Line Interface
//!
//! ```bash
//! # Build a project configuration from a template and a metadata CSV
//! nextgen-setup template freebayes-variant project1.csv sample1.bam sample2_1.fq sample2_2.fq
//!
//! # Upgrade code, tools and data of an existing installation
//! nextgen-setup upgrade -u stable --tools --genomes hg38 --aligners bwa
//!
//! # Fresh installation
//! nextgen-setup install /data/bcbio --tooldir /data/bcbio/tools --genomes hg38
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::error::Result;
use crate::install::{InstallArgs, UpgradeArgs};
use crate::template::merge::AlgorithmKeys;
use crate::template::pairing::parse_separators;
use crate::template::TemplateOptions;

#[derive(Debug, Parser)]
#[command(name = "nextgen-setup", version, about = "Install and configure next-generation sequencing pipelines")]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory used for project output and temporary install files
    #[arg(long, global = true)]
    pub workdir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a project configuration from a template and sample metadata
    Template(TemplateArgs),
    /// Upgrade an existing installation
    Upgrade(UpgradeArgs),
    /// Install into a new data directory
    Install(InstallArgs),
}

#[derive(Debug, Clone, Args)]
pub struct TemplateArgs {
    /// Template name or path to a template YAML file
    pub template: String,

    /// CSV file with sample metadata. Its name is the project name
    pub metadata: String,

    /// Input BAM, fastq, fasta or VCF files
    pub inputs: Vec<String>,

    /// Only include samples found in the metadata file
    #[arg(long)]
    pub only_metadata: bool,

    /// Treat every fastq file as single end
    #[arg(long)]
    pub force_single: bool,

    /// Separators tried when pairing read files, in order
    #[arg(long, default_value = "R,_,-,.")]
    pub separators: String,

    /// YAML list of metadata columns routed into the algorithm section
    #[arg(long)]
    pub algorithm_keys: Option<PathBuf>,
}

impl TemplateArgs {
    pub fn to_options(&self) -> Result<TemplateOptions> {
        let mut options = TemplateOptions::new(&self.template, &self.metadata, self.inputs.clone());
        options.only_metadata = self.only_metadata;
        options.force_single = self.force_single;
        options.separators = parse_separators(&self.separators);
        if let Some(path) = &self.algorithm_keys {
            options.algorithm_keys = AlgorithmKeys::load(path)?;
        }
        Ok(options)
    }
}

/// Arguments given after `install`, without the global flags.
pub fn install_argv(argv: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut iter = argv.iter().skip_while(|a| a.as_str() != "install").skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => {}
            "--workdir" => {
                iter.next();
            }
            a if a.starts_with("--workdir=") => {}
            _ => out.push(arg.clone()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::UpgradeMode;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_template() {
        let cli = Cli::try_parse_from([
            "nextgen-setup", "template", "--force-single", "tpl.yaml", "project1.csv", "a.bam", "b_1.fq",
        ])
        .unwrap();
        let Commands::Template(args) = cli.command else {
            panic!("expected template command");
        };
        let options = args.to_options().unwrap();
        assert_eq!(options.template, "tpl.yaml");
        assert_eq!(options.metadata, "project1.csv");
        assert_eq!(options.inputs, strings(&["a.bam", "b_1.fq"]));
        assert!(options.force_single);
        assert!(!options.only_metadata);
        assert_eq!(options.separators, strings(&["R", "_", "-", "."]));
        assert!(options.algorithm_keys.is_empty());
    }

    #[test]
    fn test_parse_upgrade() {
        let cli = Cli::try_parse_from([
            "nextgen-setup", "--verbose", "upgrade", "-u", "development", "--genomes", "hg38", "--genomes", "mm10",
            "--data",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Upgrade(args) = cli.command else {
            panic!("expected upgrade command");
        };
        assert_eq!(args.upgrade, UpgradeMode::Development);
        assert_eq!(args.genomes, strings(&["hg38", "mm10"]));
        assert!(args.install_data);
    }

    #[test]
    fn test_upgrade_rejects_unknown_genome() {
        assert!(Cli::try_parse_from(["nextgen-setup", "upgrade", "--genomes", "hg99"]).is_err());
    }

    #[test]
    fn test_parse_install() {
        let cli = Cli::try_parse_from(["nextgen-setup", "install", "/data/bcbio", "--nodata", "--cores", "2"]).unwrap();
        let Commands::Install(args) = cli.command else {
            panic!("expected install command");
        };
        assert_eq!(args.datadir, PathBuf::from("/data/bcbio"));
        assert!(args.nodata);
        assert_eq!(args.cores, 2);
    }

    #[test]
    fn test_install_argv_strips_globals() {
        let argv = strings(&[
            "nextgen-setup", "--workdir", "/tmp", "install", "/data", "-v", "--workdir=/w", "--isolate",
        ]);
        assert_eq!(install_argv(&argv), strings(&["/data", "--isolate"]));
    }
}
