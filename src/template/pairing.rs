//! Read File Pairing
//!
//! Groups sequence files into single-end or paired-end sets using file
//! naming conventions. Two files form a pair when:
//! 1. They live in the same directory
//! 2. Their file names have the same length and differ in exactly one character
//! 3. The differing characters are read identifiers (`1` and `2`)
//! 4. The text right before the difference ends with a separator token
//!
//! Separator order is precedence: when a file could pair with several
//! partners, the partner matched through the earliest separator wins.

use std::cmp::Reverse;
use std::path::Path;

use log::debug;

/// Characters identifying the read of a pair.
const READ_IDENTIFIERS: &[char] = &['1', '2'];

/// Default separator tokens, in precedence order.
pub const DEFAULT_SEPARATORS: &[&str] = &["R", "_", "-", "."];

/// Groups sequence files into single or paired read sets.
///
/// Implementations must be deterministic for a fixed file list and
/// separator order.
pub trait FilePairing {
    fn pair(&self, files: &[String], separators: &[String], force_single: bool) -> Vec<Vec<String>>;
}

/// Pairs files by separator-delimited read identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeparatorPairing;

impl FilePairing for SeparatorPairing {
    fn pair(&self, files: &[String], separators: &[String], force_single: bool) -> Vec<Vec<String>> {
        combine_pairs(files, separators, force_single)
    }
}

/// Parses a comma-separated separator list (`"R,_,-,."`).
pub fn parse_separators(spec: &str) -> Vec<String> {
    spec.split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// How two file names relate as a potential pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PairMatch {
    /// Index of the separator that matched
    separator_rank: usize,
    /// Character position of the read identifier
    position: usize,
    /// Whether the first file carries the lower identifier
    first_is_read1: bool,
}

fn split_dir(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => path.split_at(i + 1),
        None => ("", path),
    }
}

fn match_pair(a: &str, b: &str, separators: &[String]) -> Option<PairMatch> {
    let (dir_a, name_a) = split_dir(a);
    let (dir_b, name_b) = split_dir(b);
    if Path::new(dir_a) != Path::new(dir_b) {
        return None;
    }

    let chars_a: Vec<char> = name_a.chars().collect();
    let chars_b: Vec<char> = name_b.chars().collect();
    if chars_a.len() != chars_b.len() {
        return None;
    }

    let mut diffs = chars_a
        .iter()
        .zip(&chars_b)
        .enumerate()
        .filter(|(_, (x, y))| x != y);

    let (position, (&id_a, &id_b)) = diffs.next()?;
    if diffs.next().is_some() {
        return None;
    }
    if !READ_IDENTIFIERS.contains(&id_a) || !READ_IDENTIFIERS.contains(&id_b) {
        return None;
    }

    let prefix: String = chars_a[..position].iter().collect();
    let separator_rank = separators
        .iter()
        .position(|sep| !sep.is_empty() && prefix.ends_with(sep.as_str()))?;

    Some(PairMatch {
        separator_rank,
        position,
        first_is_read1: id_a < id_b,
    })
}

/// Groups files into single or paired sets.
///
/// Files are visited in input order. Each unused file takes the unused
/// partner with the best match: lowest separator rank first, then the
/// rightmost identifier position, then input order. With `force_single`
/// every file is returned on its own.
pub fn combine_pairs(files: &[String], separators: &[String], force_single: bool) -> Vec<Vec<String>> {
    let mut used = vec![false; files.len()];
    let mut groups = Vec::new();

    for i in 0..files.len() {
        if used[i] {
            continue;
        }
        used[i] = true;

        if force_single {
            groups.push(vec![files[i].clone()]);
            continue;
        }

        let best = (0..files.len())
            .filter(|&j| !used[j])
            .filter_map(|j| {
                match_pair(&files[i], &files[j], separators)
                    .map(|m| ((m.separator_rank, Reverse(m.position), j), m))
            })
            .min_by_key(|(rank, _)| *rank);

        match best {
            Some(((_, _, j), m)) => {
                used[j] = true;
                let pair = if m.first_is_read1 {
                    vec![files[i].clone(), files[j].clone()]
                } else {
                    vec![files[j].clone(), files[i].clone()]
                };
                debug!("Paired reads: {:?} (separator '{}')", pair, separators[m.separator_rank]);
                groups.push(pair);
            }
            None => groups.push(vec![files[i].clone()]),
        }
    }

    groups
}
