//! Gene identifier to KEGG orthology (KO) mapping.
//!
//! The reference annotation file (for example KEGG prokaryotes.dat) has one gene per line :
//! `gene_id \t annotation text`. The KO number is the first match of the code pattern
//! (K followed by 5 digits by default) in the annotation text.
//!
//! The index is built once, is immutable afterwards and is shared by reference between all
//! the threads processing diamond files.

use std::fmt;
use std::io::{self, BufRead};
use std::path::Path;

use fxhash::FxHashMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::FatalConfigError;
use crate::utils::files::open_text_reader;

lazy_static! {
    /// KEGG orthology numbers as found in annotation text, "KO:K00001" or "K00001"
    pub static ref KO_PATTERN: Regex = Regex::new(r"K\d{5}").unwrap();
}

const CODE_LEN: usize = 6;

/// A functional code : one ascii letter followed by 5 ascii digits (K00001 ...).
/// Stored inline so it is Copy and cheap to hash.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionalCode([u8; CODE_LEN]);

impl FunctionalCode {
    /// returns None if s is not exactly a letter followed by 5 digits
    pub fn parse(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != CODE_LEN
            || !bytes[0].is_ascii_alphabetic()
            || !bytes[1..].iter().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let mut code = [0u8; CODE_LEN];
        code.copy_from_slice(bytes);
        Some(FunctionalCode(code))
    } // end of parse

    /// extract first match of pattern in annotation text
    pub fn extract(annotation: &str, pattern: &Regex) -> Option<Self> {
        pattern
            .find_iter(annotation)
            .find_map(|m| FunctionalCode::parse(m.as_str()))
    }

    pub fn as_str(&self) -> &str {
        // only ascii bytes are accepted in parse
        std::str::from_utf8(&self.0).unwrap_or("")
    }
} // end of impl FunctionalCode

impl fmt::Display for FunctionalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for FunctionalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionalCode({})", self.as_str())
    }
}

impl Serialize for FunctionalCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FunctionalCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FunctionalCode::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid functional code {}", s)))
    }
}

//========================================================================================

/// Counters collected while parsing the reference file.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct IndexStats {
    pub nb_lines: usize,
    /// lines with less than 2 tab separated fields or not utf8
    pub nb_skipped: usize,
    /// lines without code in annotation
    pub nb_no_code: usize,
    /// identifiers seen more than once, the last line read wins
    pub nb_overwritten: usize,
}

/// gene identifier -> functional code
pub struct IdentifierIndex {
    gene_to_code: FxHashMap<String, FunctionalCode>,
    stats: IndexStats,
}

impl IdentifierIndex {
    /// builds index from reference file using KO_PATTERN.
    /// The file may be gzipped.
    pub fn build(path: &Path) -> Result<Self, FatalConfigError> {
        IdentifierIndex::build_with_pattern(path, &KO_PATTERN)
    }

    pub fn build_with_pattern(path: &Path, pattern: &Regex) -> Result<Self, FatalConfigError> {
        log::info!("parsing reference annotation file : {:?}", path);
        let to_fatal = |source: io::Error| FatalConfigError::ReferenceUnreadable {
            path: path.to_path_buf(),
            source,
        };
        let reader = open_text_reader(path).map_err(to_fatal)?;
        let index = IdentifierIndex::from_reader(reader, pattern).map_err(to_fatal)?;
        log::info!(
            "completed parsing : {} gene-KO mappings loaded, stats : {:?}",
            index.len(),
            index.stats
        );
        Ok(index)
    } // end of build_with_pattern

    /// as build but an index with no mapping is an error as no hit could ever be resolved.
    pub fn build_checked(path: &Path) -> Result<Self, FatalConfigError> {
        let index = IdentifierIndex::build(path)?;
        if index.is_empty() {
            log::error!("no gene-KO mapping found in {:?}", path);
            return Err(FatalConfigError::EmptyIndex {
                path: path.to_path_buf(),
            });
        }
        Ok(index)
    }

    /// streams reference lines from reader
    pub fn from_reader<R: BufRead>(mut reader: R, pattern: &Regex) -> io::Result<Self> {
        let mut gene_to_code = FxHashMap::<String, FunctionalCode>::default();
        let mut stats = IndexStats::default();
        let mut buf = Vec::<u8>::with_capacity(512);
        //
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            stats.nb_lines += 1;
            if stats.nb_lines % 1_000_000 == 0 {
                log::info!(
                    "processed {} lines, found {} gene-KO mappings",
                    stats.nb_lines,
                    gene_to_code.len()
                );
            }
            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line,
                Err(_) => {
                    stats.nb_skipped += 1;
                    continue;
                }
            };
            let mut fields = line.trim().split('\t');
            let (gene_id, annotation) = match (fields.next(), fields.next()) {
                (Some(gene_id), Some(annotation)) => (gene_id, annotation),
                _ => {
                    stats.nb_skipped += 1;
                    continue;
                }
            };
            match FunctionalCode::extract(annotation, pattern) {
                Some(code) => {
                    if gene_to_code.insert(gene_id.to_string(), code).is_some() {
                        stats.nb_overwritten += 1;
                    }
                }
                None => stats.nb_no_code += 1,
            }
        }
        if stats.nb_overwritten > 0 {
            log::warn!(
                "{} gene identifiers appear more than once in reference, last occurrence kept",
                stats.nb_overwritten
            );
        }
        //
        Ok(IdentifierIndex {
            gene_to_code,
            stats,
        })
    } // end of from_reader

    /// Resolve a diamond subject id.
    /// We keep what follows the last '|' (gnl|db|gene -> gene), look it up, and if absent we
    /// retry once with what precedes the first '.' (gene.2 -> gene). Nothing more is tried.
    pub fn resolve(&self, subject_id: &str) -> Option<FunctionalCode> {
        let gene_id = subject_id.rsplit('|').next().unwrap_or(subject_id);
        if let Some(code) = self.gene_to_code.get(gene_id) {
            return Some(*code);
        }
        let base = gene_id.split('.').next().unwrap_or(gene_id);
        if base.len() < gene_id.len() {
            return self.gene_to_code.get(base).copied();
        }
        None
    } // end of resolve

    pub fn len(&self) -> usize {
        self.gene_to_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gene_to_code.is_empty()
    }

    pub fn get_stats(&self) -> &IndexStats {
        &self.stats
    }
} // end of impl IdentifierIndex
