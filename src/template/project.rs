//! Project Setup
//!
//! Runs the `template` workflow end to end and lays out the project:
//!
//! ```text
//! <project>/
//!   config/<project>.yaml            final configuration
//!   config/<project>-template.yaml   template text as resolved
//!   config/<metadata>.csv            copy of the metadata file
//!   work/
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;
use serde_yaml::Value;

use super::builder::SampleBuilder;
use super::inputs::group_inputs_by_type;
use super::merge::{AlgorithmKeys, MetadataMerger};
use super::metadata::{project_and_metadata, ProjectMetadata};
use super::model::SampleItem;
use super::pairing::{parse_separators, FilePairing, DEFAULT_SEPARATORS};
use super::pedigree::PedigreeReader;
use super::source::{check_not_csv, ResolvedTemplate, TemplateSource};
use super::validator::validate_items;
use crate::error::{Result, SetupError};

/// Options of the `template` workflow.
#[derive(Debug, Clone)]
pub struct TemplateOptions {
    pub template: String,
    pub metadata: String,
    pub inputs: Vec<String>,
    pub only_metadata: bool,
    pub force_single: bool,
    pub separators: Vec<String>,
    pub algorithm_keys: AlgorithmKeys,
}

impl TemplateOptions {
    pub fn new(template: impl Into<String>, metadata: impl Into<String>, inputs: Vec<String>) -> Self {
        Self {
            template: template.into(),
            metadata: metadata.into(),
            inputs,
            only_metadata: false,
            force_single: false,
            separators: parse_separators(&DEFAULT_SEPARATORS.join(",")),
            algorithm_keys: AlgorithmKeys::default(),
        }
    }
}

/// Collaborators used by [`setup_project`].
pub struct Collaborators<'a> {
    pub templates: &'a dyn TemplateSource,
    pub pairing: &'a dyn FilePairing,
    pub pedigree: &'a dyn PedigreeReader,
}

/// Paths written for a project.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub project_dir: PathBuf,
    pub config_file: PathBuf,
    pub template_file: PathBuf,
    pub work_dir: PathBuf,
    pub metadata_copy: Option<PathBuf>,
    pub samples: usize,
}

impl ProjectLayout {
    fn new(root: &Path, project_name: &str) -> Self {
        let project_dir = root.join(project_name);
        let config_dir = project_dir.join("config");
        Self {
            config_file: config_dir.join(format!("{}.yaml", project_name)),
            template_file: config_dir.join(format!("{}-template.yaml", project_name)),
            work_dir: project_dir.join("work"),
            project_dir,
            metadata_copy: None,
            samples: 0,
        }
    }

    pub fn config_dir(&self) -> PathBuf {
        self.project_dir.join("config")
    }
}

/// Final configuration document.
#[derive(Debug, Serialize)]
struct ProjectConfig<'a> {
    fc_name: &'a str,
    upload: BTreeMap<String, Value>,
    #[serde(flatten)]
    globals: BTreeMap<String, Value>,
    details: &'a [SampleItem],
}

/// Fails on the first input path that does not exist.
pub fn check_inputs_exist(inputs: &[String]) -> Result<()> {
    match inputs.iter().find(|f| !Path::new(f).exists()) {
        Some(missing) => Err(SetupError::MissingInput(PathBuf::from(missing))),
        None => Ok(()),
    }
}

/// Builds the merged, validated sample records for a set of inputs.
pub fn prepare_samples(
    template: &ResolvedTemplate,
    metadata: &ProjectMetadata,
    options: &TemplateOptions,
    pairing: &dyn FilePairing,
    pedigree: &dyn PedigreeReader,
) -> Result<Vec<SampleItem>> {
    let base = template
        .config
        .base_item()
        .ok_or_else(|| SetupError::InvalidTemplate {
            name: template.name.clone(),
            reason: "'details' has no sample entries".to_string(),
        })?;

    let builder = SampleBuilder::new(base, &metadata.table, &options.separators, options.force_single)
        .with_pairing(pairing);
    let merger = MetadataMerger::new(
        &metadata.table,
        &options.algorithm_keys,
        pedigree,
        options.only_metadata,
    );

    let groups = group_inputs_by_type(&options.inputs);
    let mut items = Vec::new();
    for (kind, files) in groups.iter() {
        let built = builder.build(kind, files);
        items.extend(merger.merge_all(built)?);
    }

    validate_items(&items)?;
    Ok(items)
}

fn write_project(
    layout: &mut ProjectLayout,
    project_name: &str,
    template: &ResolvedTemplate,
    metadata: &ProjectMetadata,
    items: &[SampleItem],
) -> Result<()> {
    fs::create_dir_all(&layout.work_dir)?;
    fs::create_dir_all(layout.config_dir())?;

    fs::write(&layout.template_file, &template.raw)?;
    debug!("Wrote template to {}", layout.template_file.display());

    if let Some(source) = &metadata.source {
        if let Some(name) = source.file_name() {
            let dest = layout.config_dir().join(name);
            if fs::canonicalize(source).ok() != fs::canonicalize(&dest).ok() {
                fs::copy(source, &dest)?;
            }
            layout.metadata_copy = Some(dest);
        }
    }

    let mut upload = BTreeMap::new();
    upload.insert("dir".to_string(), Value::from("../final"));

    let globals = template
        .config
        .extra
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "fc_name" | "upload" | "details"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let config = ProjectConfig {
        fc_name: project_name,
        upload,
        globals,
        details: items,
    };
    fs::write(&layout.config_file, serde_yaml::to_string(&config)?)?;
    layout.samples = items.len();
    Ok(())
}

/// Runs the `template` workflow, writing the project under `root`.
pub fn setup_project(
    options: &TemplateOptions,
    root: &Path,
    collaborators: &Collaborators<'_>,
) -> Result<ProjectLayout> {
    check_not_csv(&options.template)?;
    let template = collaborators.templates.resolve(&options.template)?;
    let metadata = project_and_metadata(&options.metadata)?;
    check_inputs_exist(&options.inputs)?;

    let items = prepare_samples(
        &template,
        &metadata,
        options,
        collaborators.pairing,
        collaborators.pedigree,
    )?;

    let mut layout = ProjectLayout::new(root, &metadata.project_name);
    write_project(&mut layout, &metadata.project_name, &template, &metadata, &items)?;

    info!(
        "Template configuration file created at: {}",
        layout.config_file.display()
    );
    info!("Edit to finalize custom options, then prepare full sample config with:");
    info!("  bcbio_nextgen.py -w template {}", layout.config_file.display());
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::model::Template;
    use crate::template::pairing::SeparatorPairing;
    use crate::template::pedigree::PedFileReader;
    use tempfile::tempdir;

    const TEMPLATE: &str = "\
details:
  - analysis: variant2
    genome_build: GRCh37
    algorithm:
      aligner: bwa
upload:
  dir: /elsewhere
resources:
  gatk:
    jvm_opts: [-Xms500m]
";

    struct FixedTemplate;

    impl TemplateSource for FixedTemplate {
        fn resolve(&self, identifier: &str) -> Result<ResolvedTemplate> {
            Ok(ResolvedTemplate {
                name: identifier.to_string(),
                config: Template::from_yaml(TEMPLATE)?,
                raw: TEMPLATE.to_string(),
            })
        }
    }

    fn collaborators() -> Collaborators<'static> {
        Collaborators {
            templates: &FixedTemplate,
            pairing: &SeparatorPairing,
            pedigree: &PedFileReader,
        }
    }

    #[test]
    fn test_csv_template_rejected_before_resolution() {
        let temp_dir = tempdir().unwrap();
        let options = TemplateOptions::new("project.csv", "project", vec![]);
        let err = setup_project(&options, temp_dir.path(), &collaborators()).unwrap_err();
        assert!(err.is_usage());
        assert!(!temp_dir.path().join("project").exists());
    }

    #[test]
    fn test_missing_input_aborts_before_output() {
        let temp_dir = tempdir().unwrap();
        let options = TemplateOptions::new("t", "proj", vec!["/nonexistent/s_1.fq".to_string()]);
        let err = setup_project(&options, temp_dir.path(), &collaborators()).unwrap_err();
        assert!(matches!(err, SetupError::MissingInput(_)));
        assert!(!temp_dir.path().join("proj").exists());
    }

    #[test]
    fn test_writes_project_layout() {
        let temp_dir = tempdir().unwrap();
        let data = temp_dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        let mut inputs = Vec::new();
        for name in ["s1.bam", "s2_1.fq", "s2_2.fq"] {
            let path = data.join(name);
            fs::write(&path, "").unwrap();
            inputs.push(path.to_string_lossy().into_owned());
        }

        let csv = temp_dir.path().join("run1.csv");
        fs::write(&csv, "samplename,description,batch\ns1.bam,tumor,b1\n").unwrap();

        let out = temp_dir.path().join("out");
        let options = TemplateOptions::new("t", csv.to_string_lossy(), inputs);
        let layout = setup_project(&options, &out, &collaborators()).unwrap();

        assert_eq!(layout.samples, 2);
        assert!(layout.work_dir.is_dir());
        assert_eq!(fs::read_to_string(&layout.template_file).unwrap(), TEMPLATE);
        assert!(out.join("run1/config/run1.csv").is_file());

        let written: Value =
            serde_yaml::from_str(&fs::read_to_string(&layout.config_file).unwrap()).unwrap();
        assert_eq!(written["fc_name"], Value::from("run1"));
        assert_eq!(written["upload"]["dir"], Value::from("../final"));
        assert!(written["resources"]["gatk"].is_mapping());

        let details = written["details"].as_sequence().unwrap();
        assert_eq!(details[0]["description"], Value::from("tumor"));
        assert_eq!(details[0]["metadata"]["batch"], Value::from("b1"));
        assert_eq!(details[1]["description"], Value::from("s2"));
        assert!(details[1].get("metadata").is_none());
        assert_eq!(details[1]["algorithm"]["aligner"], Value::from("bwa"));
    }
}
