//! Template Module
//!
//! Builds a pipeline configuration from a template, a metadata CSV and a
//! list of input files:
//! - `model`: template document and per-sample records
//! - `inputs`: classification of input files by extension
//! - `pairing`: single/paired read grouping
//! - `metadata`: CSV metadata table with glob rules
//! - `merge`: metadata lookup and column routing
//! - `pedigree`: PED file expansion
//! - `builder`: sample record construction
//! - `validator`: checks on the final records
//! - `source`: template resolution
//! - `project`: the `template` workflow and project layout

pub mod builder;
pub mod inputs;
pub mod merge;
pub mod metadata;
pub mod model;
pub mod pairing;
pub mod pedigree;
pub mod project;
pub mod source;
pub mod validator;

pub use builder::{build_sample_items, SampleBuilder};
pub use inputs::{group_inputs_by_type, ExtGroups, InputKind};
pub use merge::{merge_metadata, AlgorithmKeys, ColumnRoute, MetadataMerger};
pub use metadata::{project_and_metadata, MetadataTable, ProjectMetadata};
pub use model::{Mapping, SampleItem, Template};
pub use pairing::{FilePairing, SeparatorPairing};
pub use pedigree::{PedFileReader, PedigreeReader};
pub use project::{setup_project, Collaborators, ProjectLayout, TemplateOptions};
pub use source::{ResolvedTemplate, StandardTemplates, TemplateSource};
pub use validator::validate_items;
