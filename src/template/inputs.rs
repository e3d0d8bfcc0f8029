//! Input File Classification
//!
//! Sorts command-line inputs into extension groups:
//! - Extensions are compared lowercase
//! - Compression suffixes (`.gz`, `.bz2`, `.zip`) are read together with the
//!   extension before them
//! - Grouping is stable; files with unknown extensions are reported and dropped

use log::{debug, warn};

/// Recognized class of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InputKind {
    Bam,
    Fastq,
    Fasta,
    Vcf,
}

impl InputKind {
    /// True for the read families handled by pairing.
    pub fn is_reads(self) -> bool {
        matches!(self, Self::Fastq | Self::Fasta)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bam => "bam",
            Self::Fastq => "fastq",
            Self::Fasta => "fasta",
            Self::Vcf => "vcf",
        }
    }
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extension table, compression suffix excluded.
const KNOWN_EXTS: &[(&str, InputKind)] = &[
    (".bam", InputKind::Bam),
    (".cram", InputKind::Bam),
    (".fastq", InputKind::Fastq),
    (".fq", InputKind::Fastq),
    (".txt", InputKind::Fastq),
    (".fasta", InputKind::Fasta),
    (".fa", InputKind::Fasta),
    (".vcf", InputKind::Vcf),
];

const COMPRESSION_EXTS: &[&str] = &[".gz", ".bz2", ".zip"];

/// Splits the last extension off the file-name part of a path.
fn split_ext(path: &str) -> (&str, &str) {
    let name_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[name_start..].rfind('.') {
        Some(i) if i > 0 => path.split_at(name_start + i),
        _ => (path, ""),
    }
}

/// Splits off the extension, keeping a compression suffix together with the
/// extension before it (`s1.fastq.gz` -> `("s1", ".fastq.gz")`).
pub fn split_ext_plus(path: &str) -> (&str, String) {
    let (base, ext) = split_ext(path);
    if COMPRESSION_EXTS.contains(&ext.to_lowercase().as_str()) {
        let (inner_base, inner_ext) = split_ext(base);
        (inner_base, format!("{}{}", inner_ext, ext))
    } else {
        (base, ext.to_string())
    }
}

/// Classifies a path by extension.
pub fn classify(path: &str) -> Option<InputKind> {
    let (_, ext) = split_ext_plus(path);
    let lower = ext.to_lowercase();
    let ext = COMPRESSION_EXTS
        .iter()
        .find_map(|c| lower.strip_suffix(c))
        .unwrap_or(lower.as_str());

    KNOWN_EXTS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, kind)| *kind)
}

/// Removes a recognized extension (and compression suffix) from a name.
///
/// Names without a recognized extension are returned unchanged.
pub fn strip_known_extension(name: &str) -> String {
    if classify(name).is_some() {
        split_ext_plus(name).0.to_string()
    } else {
        name.to_string()
    }
}

/// Input files grouped by [`InputKind`], in order of first appearance.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExtGroups {
    groups: Vec<(InputKind, Vec<String>)>,
    unrecognized: Vec<String>,
}

impl ExtGroups {
    fn push(&mut self, kind: InputKind, file: String) {
        match self.groups.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, files)) => files.push(file),
            None => self.groups.push((kind, vec![file])),
        }
    }

    /// Iterates over groups in first-appearance order.
    pub fn iter(&self) -> impl Iterator<Item = (InputKind, &[String])> {
        self.groups.iter().map(|(k, f)| (*k, f.as_slice()))
    }

    /// Files of a single kind.
    pub fn get(&self, kind: InputKind) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, f)| f.as_slice())
    }

    /// Files skipped because their extension is unknown.
    pub fn unrecognized(&self) -> &[String] {
        &self.unrecognized
    }

    /// Number of recognized files.
    pub fn file_count(&self) -> usize {
        self.groups.iter().map(|(_, f)| f.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Groups input files by extension class.
///
/// Relative order within each class follows the input order. Files with an
/// unknown extension are excluded and reported in a single warning.
pub fn group_inputs_by_type(files: &[String]) -> ExtGroups {
    let mut groups = ExtGroups::default();

    for file in files {
        match classify(file) {
            Some(kind) => {
                debug!("Input '{}' classified as {}", file, kind);
                groups.push(kind, file.clone());
            }
            None => groups.unrecognized.push(file.clone()),
        }
    }

    if !groups.unrecognized.is_empty() {
        warn!(
            "Ignoring unexpected input file types: {:?}",
            groups.unrecognized
        );
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_split_ext_plus() {
        assert_eq!(split_ext_plus("s1.fastq.gz"), ("s1", ".fastq.gz".to_string()));
        assert_eq!(split_ext_plus("dir.v2/s1.bam"), ("dir.v2/s1", ".bam".to_string()));
        assert_eq!(split_ext_plus("noext"), ("noext", String::new()));
        assert_eq!(split_ext_plus("data/.hidden"), ("data/.hidden", String::new()));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("a.bam"), Some(InputKind::Bam));
        assert_eq!(classify("a.CRAM"), Some(InputKind::Bam));
        assert_eq!(classify("a_1.fq"), Some(InputKind::Fastq));
        assert_eq!(classify("a_1.FASTQ.GZ"), Some(InputKind::Fastq));
        assert_eq!(classify("a.fa.bz2"), Some(InputKind::Fasta));
        assert_eq!(classify("calls.vcf.gz"), Some(InputKind::Vcf));
        assert_eq!(classify("notes.doc"), None);
        assert_eq!(classify("archive.gz"), None);
    }

    #[test]
    fn test_strip_known_extension() {
        assert_eq!(strip_known_extension("s1_1.fq.gz"), "s1_1");
        assert_eq!(strip_known_extension("s1.bam"), "s1");
        assert_eq!(strip_known_extension("s1.unknown"), "s1.unknown");
    }

    #[test]
    fn test_group_inputs_stable_order() {
        let files = strings(&["b.bam", "x_1.fq", "a.bam", "calls.vcf", "x_2.fq"]);
        let groups = group_inputs_by_type(&files);

        let kinds: Vec<_> = groups.iter().map(|(k, _)| k).collect();
        assert_eq!(kinds, vec![InputKind::Bam, InputKind::Fastq, InputKind::Vcf]);
        assert_eq!(groups.get(InputKind::Bam).unwrap(), &["b.bam", "a.bam"]);
        assert_eq!(groups.get(InputKind::Fastq).unwrap(), &["x_1.fq", "x_2.fq"]);
        assert_eq!(groups.file_count(), 5);
    }

    #[test]
    fn test_group_inputs_drops_unrecognized() {
        let files = strings(&["a.bam", "readme.md", "sheet.xlsx"]);
        let groups = group_inputs_by_type(&files);

        assert_eq!(groups.file_count(), 1);
        assert_eq!(groups.unrecognized(), &["readme.md", "sheet.xlsx"]);
    }

    #[test]
    fn test_group_inputs_empty() {
        let groups = group_inputs_by_type(&[]);
        assert!(groups.is_empty());
        assert!(groups.unrecognized().is_empty());
    }
}
