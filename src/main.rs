//! nextgen-setup CLI Entry Point
//!
//! # Usage
//!
//! ```bash
//! # Create a project configuration
//! nextgen-setup template freebayes-variant project1.csv *.bam
//!
//! # Only keep samples present in the metadata
//! nextgen-setup template --only-metadata tpl.yaml project1.csv reads/*.fq.gz
//!
//! # Upgrade tools and data
//! nextgen-setup upgrade --tools --data
//!
//! # Fresh installation
//! nextgen-setup install /data/bcbio --tooldir /data/bcbio/tools
//! ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use colored::Colorize;
use log::info;

use nextgen_setup::cli::{install_argv, Cli, Commands};
use nextgen_setup::error::SetupError;
use nextgen_setup::install::{bootstrap, upgrade};
use nextgen_setup::template::{
    setup_project, Collaborators, PedFileReader, SeparatorPairing, StandardTemplates,
};
use nextgen_setup::{APP_NAME, VERSION};

/// Exit code for malformed invocations.
const USAGE_EXIT: u8 = 2;

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    eprintln!();
    eprintln!("{} v{}", APP_NAME.bold(), VERSION);
    eprintln!("{}", "Pipeline installer and project bootstrapper".dimmed());
    eprintln!();
}

/// Resolves the directory used for output and temporary files.
fn working_directory(workdir: Option<PathBuf>) -> Result<PathBuf, SetupError> {
    let Some(dir) = workdir else {
        return Ok(env::current_dir()?);
    };

    if !dir.is_dir() {
        return Err(SetupError::Usage(format!(
            "Working directory does not exist: {}",
            dir.display()
        )));
    }
    info!("Working directory: {}", dir.display());
    Ok(dir)
}

/// Main application entry point.
fn run(cli: Cli) -> Result<(), SetupError> {
    let work_dir = working_directory(cli.workdir)?;

    match cli.command {
        Commands::Template(args) => {
            let options = args.to_options()?;
            let templates = StandardTemplates::default();
            let collaborators = Collaborators {
                templates: &templates,
                pairing: &SeparatorPairing,
                pedigree: &PedFileReader,
            };
            let layout = setup_project(&options, &work_dir, &collaborators)?;
            info!("{} samples written for project in {}", layout.samples, layout.project_dir.display());
        }
        Commands::Upgrade(args) => {
            upgrade(args, &work_dir)?;
        }
        Commands::Install(args) => {
            let argv: Vec<String> = env::args().collect();
            bootstrap(&args, &install_argv(&argv), &work_dir)?;
            info!("Installation complete in {}", args.datadir.display());
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    print_banner();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_usage() => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            eprintln!();
            let _ = Cli::command().print_help();
            ExitCode::from(USAGE_EXIT)
        }
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
