//! nextgen-setup - Pipeline Installer and Project Bootstrapper
//!
//! Installs a next-generation sequencing pipeline with its third-party tools
//! and reference data, and turns a template, a metadata CSV and a list of
//! input files into a ready-to-run project configuration.
//!
//! # Architecture
//!
//! - [`template`]: sample grouping, metadata merging and project layout
//! - [`environment`]: conda integration, package manifests and scoped work dirs
//! - [`install`]: bootstrap installer and upgrade lifecycle
//! - [`cli`]: command line definitions
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use nextgen_setup::template::{
//!     setup_project, Collaborators, PedFileReader, SeparatorPairing, StandardTemplates,
//!     TemplateOptions,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = TemplateOptions::new(
//!         "freebayes-variant",
//!         "project1.csv",
//!         vec!["sample1.bam".to_string(), "sample2_1.fq".to_string(), "sample2_2.fq".to_string()],
//!     );
//!     let templates = StandardTemplates::default();
//!     let collaborators = Collaborators {
//!         templates: &templates,
//!         pairing: &SeparatorPairing,
//!         pedigree: &PedFileReader,
//!     };
//!     let layout = setup_project(&options, Path::new("."), &collaborators)?;
//!     println!("{}", layout.config_file.display());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod environment;
pub mod error;
pub mod fetch;
pub mod install;
pub mod template;

// Re-export commonly used types
pub use error::{Result, SetupError};
pub use template::{build_sample_items, group_inputs_by_type, merge_metadata, SampleItem, Template};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "nextgen-setup";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_app_name() {
        assert_eq!(APP_NAME, "nextgen-setup");
    }

    #[test]
    fn test_module_exports_sample_item() {
        let base = SampleItem::default();
        let item = SampleItem::from_base(&base, vec!["s1.bam".to_string()], "sample1");
        assert_eq!(item.description, "sample1");
        assert_eq!(item.files, vec!["s1.bam"]);
    }

    #[test]
    fn test_version_format() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
        for part in parts {
            assert!(part.parse::<u32>().is_ok(), "Version components should be numeric");
        }
    }
}
