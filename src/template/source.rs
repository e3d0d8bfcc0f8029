//! Template Resolution
//!
//! A template argument is either a local YAML file or the name of a
//! standard template fetched from the pipeline's template store.

use std::fs;
use std::path::Path;

use log::info;

use super::model::Template;
use crate::error::{Result, SetupError};
use crate::fetch::fetch_text;

/// Standard template store.
pub const TEMPLATE_BASE_URL: &str =
    "https://raw.githubusercontent.com/bcbio/bcbio-nextgen/master/config/templates";

/// Templates shipped with the pipeline.
pub const BUILTIN_TEMPLATES: &[&str] = &[
    "freebayes-variant",
    "gatk-variant",
    "tumor-paired",
    "noalign-variant",
    "illumina-rnaseq",
    "illumina-chipseq",
];

/// A parsed template together with its original text.
#[derive(Debug, Clone)]
pub struct ResolvedTemplate {
    pub name: String,
    pub config: Template,
    pub raw: String,
}

/// Resolves a template identifier to a configuration document.
pub trait TemplateSource {
    fn resolve(&self, identifier: &str) -> Result<ResolvedTemplate>;
}

/// Rejects a metadata CSV given in place of the template.
pub fn check_not_csv(identifier: &str) -> Result<()> {
    if identifier.to_lowercase().ends_with(".csv") {
        return Err(SetupError::Usage(format!(
            "Expected YAML file for template and found CSV, are arguments switched? {}",
            identifier
        )));
    }
    Ok(())
}

fn parse_template(name: &str, raw: String) -> Result<ResolvedTemplate> {
    let config = Template::from_yaml(&raw).map_err(|e| SetupError::InvalidTemplate {
        name: name.to_string(),
        reason: e.to_string(),
    })?;

    if config.details.is_empty() {
        return Err(SetupError::InvalidTemplate {
            name: name.to_string(),
            reason: "'details' has no sample entries".to_string(),
        });
    }

    Ok(ResolvedTemplate {
        name: name.to_string(),
        config,
        raw,
    })
}

/// Reads local files, falling back to the remote template store.
#[derive(Debug, Clone)]
pub struct StandardTemplates {
    base_url: String,
}

impl Default for StandardTemplates {
    fn default() -> Self {
        Self::new(TEMPLATE_BASE_URL)
    }
}

impl StandardTemplates {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn url_for(&self, name: &str) -> String {
        format!("{}/{}.yaml", self.base_url.trim_end_matches('/'), name)
    }


    /// Resolves `identifier`, downloading remote templates with `fetch`.
    pub fn resolve_with<F>(&self, identifier: &str, fetch: F) -> Result<ResolvedTemplate>
    where
        F: FnOnce(&str) -> Result<String>,
    {
        let path = Path::new(identifier);
        if path.is_file() {
            check_not_csv(identifier)?;
            info!("Using template file {}", path.display());
            let raw = fs::read_to_string(path)?;
            return parse_template(identifier, raw);
        }

        let url = self.url_for(identifier);
        info!("Fetching template {}", url);
        let raw = fetch(&url).map_err(|e| SetupError::TemplateNotFound {
            name: identifier.to_string(),
            reason: format!("{} (standard templates: {})", e, BUILTIN_TEMPLATES.join(", ")),
        })?;
        parse_template(identifier, raw)
    }
}

impl TemplateSource for StandardTemplates {
    fn resolve(&self, identifier: &str) -> Result<ResolvedTemplate> {
        self.resolve_with(identifier, fetch_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TEMPLATE: &str = "details:\n  - analysis: variant2\n    genome_build: GRCh37\n";

    #[test]
    fn test_check_not_csv() {
        assert!(check_not_csv("project.CSV").unwrap_err().is_usage());
        assert!(check_not_csv("gatk-variant").is_ok());
    }

    #[test]
    fn test_resolve_local_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("custom.yaml");
        std::fs::write(&path, TEMPLATE).unwrap();

        let resolved = StandardTemplates::default()
            .resolve(path.to_str().unwrap())
            .unwrap();
        assert_eq!(resolved.raw, TEMPLATE);
        assert_eq!(
            resolved.config.base_item().unwrap().genome_build.as_deref(),
            Some("GRCh37")
        );
    }

    #[test]
    fn test_resolve_local_csv_is_usage_error() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("project.csv");
        std::fs::write(&path, "samplename,description\n").unwrap();

        let err = StandardTemplates::default()
            .resolve(path.to_str().unwrap())
            .unwrap_err();
        assert!(err.is_usage());
    }

    #[test]
    fn test_template_without_details() {
        let err = parse_template("empty", "details: []\n".to_string()).unwrap_err();
        assert!(matches!(err, SetupError::InvalidTemplate { .. }));
    }

    #[test]
    fn test_url_for() {
        let source = StandardTemplates::new("http://example.org/templates/");
        assert_eq!(
            source.url_for("gatk-variant"),
            "http://example.org/templates/gatk-variant.yaml"
        );
    }

    #[test]
    fn test_failed_fetch_is_template_not_found() {
        let source = StandardTemplates::new("http://example.org/templates");
        let err = source
            .resolve_with("no-such-template", |url| {
                Err(SetupError::Download {
                    url: url.to_string(),
                    reason: "HTTP 404 Not Found".to_string(),
                })
            })
            .unwrap_err();

        match err {
            SetupError::TemplateNotFound { name, reason } => {
                assert_eq!(name, "no-such-template");
                assert!(reason.contains("HTTP 404"));
                assert!(reason.contains("freebayes-variant"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_fetched_template_is_parsed() {
        let source = StandardTemplates::new("http://example.org/templates");
        let resolved = source
            .resolve_with("gatk-variant", |url| {
                assert_eq!(url, "http://example.org/templates/gatk-variant.yaml");
                Ok(TEMPLATE.to_string())
            })
            .unwrap();
        assert_eq!(resolved.name, "gatk-variant");
        assert_eq!(resolved.raw, TEMPLATE);
        assert_eq!(resolved.config.details.len(), 1);
    }
}
