//! Sample Item Construction
//!
//! Turns one group of same-typed input files into sample records copied
//! from the template's base item.

use log::{debug, info};

use super::inputs::{split_ext_plus, strip_known_extension, InputKind};
use super::metadata::MetadataTable;
use super::model::{base_name, SampleItem};
use super::pairing::{FilePairing, SeparatorPairing};

/// Trailing residue left on a shared prefix once read identifiers are cut.
const PREFIX_RESIDUE: &[&str] = &["_R", ".R", "-R", "_", "fastq", ".", "-"];

/// Strips separator residue from the end of a derived sample name.
pub fn rstrip_extra(name: &str) -> String {
    let mut out = name;
    loop {
        match PREFIX_RESIDUE.iter().find_map(|r| out.strip_suffix(r)) {
            Some(stripped) => out = stripped,
            None => return out.to_string(),
        }
    }
}

fn common_prefix(names: &[String]) -> String {
    let Some(first) = names.first() else {
        return String::new();
    };
    let mut prefix: Vec<char> = first.chars().collect();
    for name in &names[1..] {
        let shared = prefix
            .iter()
            .zip(name.chars())
            .take_while(|(a, b)| **a == *b)
            .count();
        prefix.truncate(shared);
    }
    prefix.into_iter().collect()
}

/// Derives a sample name from a set of read files.
///
/// Single files keep their stripped name; pairs use the shared prefix.
pub fn reads_description(files: &[String]) -> String {
    let names: Vec<String> = files
        .iter()
        .map(|f| strip_known_extension(&base_name(f)))
        .collect();
    let description = rstrip_extra(&common_prefix(&names));
    if description.is_empty() {
        names.first().cloned().unwrap_or_default()
    } else {
        description
    }
}

/// Builds sample items for one input type.
pub struct SampleBuilder<'a> {
    base: &'a SampleItem,
    table: &'a MetadataTable,
    pairing: &'a dyn FilePairing,
    separators: &'a [String],
    force_single: bool,
}

impl<'a> SampleBuilder<'a> {
    pub fn new(
        base: &'a SampleItem,
        table: &'a MetadataTable,
        separators: &'a [String],
        force_single: bool,
    ) -> Self {
        Self {
            base,
            table,
            pairing: &SeparatorPairing,
            separators,
            force_single,
        }
    }

    /// Replaces the default separator-based pairing.
    pub fn with_pairing(mut self, pairing: &'a dyn FilePairing) -> Self {
        self.pairing = pairing;
        self
    }

    pub fn build(&self, kind: InputKind, files: &[String]) -> Vec<SampleItem> {
        let items: Vec<SampleItem> = match kind {
            InputKind::Bam => files.iter().map(|f| self.alignment_item(f)).collect(),
            InputKind::Vcf => files.iter().map(|f| self.variant_item(f)).collect(),
            InputKind::Fastq | InputKind::Fasta => self.read_items(files),
        };
        info!("Built {} {} sample(s) from {} file(s)", items.len(), kind, files.len());
        items
    }

    fn alignment_item(&self, file: &str) -> SampleItem {
        let description = strip_known_extension(&base_name(file));
        SampleItem::from_base(self.base, vec![file.to_string()], description)
    }

    fn variant_item(&self, file: &str) -> SampleItem {
        let name = base_name(file);
        let description = split_ext_plus(&name).0.to_string();
        let mut item = SampleItem::from_base(self.base, vec![file.to_string()], description);
        item.vrn_file = Some(file.to_string());
        item
    }

    fn read_items(&self, files: &[String]) -> Vec<SampleItem> {
        let (globbed, rest): (Vec<String>, Vec<String>) = files
            .iter()
            .cloned()
            .partition(|f| self.table.glob_key_for(&base_name(f)).is_some());

        let mut items: Vec<SampleItem> = globbed
            .into_iter()
            .map(|f| {
                debug!("File '{}' matches a metadata pattern, keeping it unpaired", f);
                let description = strip_known_extension(&base_name(&f));
                SampleItem::from_base(self.base, vec![f], description)
            })
            .collect();

        for group in self.pairing.pair(&rest, self.separators, self.force_single) {
            let description = reads_description(&group);
            items.push(SampleItem::from_base(self.base, group, description));
        }

        items
    }
}

/// Builds sample items for `files` of type `kind` using separator pairing.
pub fn build_sample_items(
    kind: InputKind,
    files: &[String],
    base: &SampleItem,
    table: &MetadataTable,
    separators: &[String],
    force_single: bool,
) -> Vec<SampleItem> {
    SampleBuilder::new(base, table, separators, force_single).build(kind, files)
}
