//! Extraction of KO hits from diamond blastx tabular output.
//!
//! Each data line is `qseqid \t sseqid \t ...`. The subject id is resolved to a KO number
//! through the [IdentifierIndex] and we count, for each query, the hits on each KO.
//! The file is streamed, only the running counts are kept in memory.

use std::io::{self, BufRead, Write};

use fxhash::FxHashMap;
use serde::Serialize;

use crate::aggregate::{aggregate, SampleHitTable};
use crate::error::SampleError;
use crate::index::{FunctionalCode, IdentifierIndex};
use crate::utils::files::{open_text_reader, SampleFile};

/// lines beginning with one of these are not data
pub const DEFAULT_HEADER_MARKERS: [&str; 2] = ["qseqid", "#"];

/// One resolved alignment hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitRecord<'a> {
    pub query_id: &'a str,
    pub code: FunctionalCode,
}

/// What a line of diamond output gives.
#[derive(Debug, PartialEq, Eq)]
pub enum LineOutcome<'a> {
    Header,
    /// less than 2 fields
    Malformed,
    Unresolved,
    Hit(HitRecord<'a>),
}

/// Counters for one file. Skipped and unresolved lines are expected and never an error.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    pub nb_lines: usize,
    /// header, comment, malformed or non utf8 lines
    pub nb_skipped: usize,
    /// subject without KO mapping
    pub nb_unresolved: usize,
    pub nb_resolved: usize,
}

//========================================================================================

/// (query id, KO) -> number of hits
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryHitCounts {
    counts: FxHashMap<String, FxHashMap<FunctionalCode, u64>>,
}

impl QueryHitCounts {
    pub fn new() -> Self {
        QueryHitCounts::default()
    }

    pub fn add(&mut self, hit: &HitRecord, nb: u64) {
        // we avoid allocating the query id when it is already there
        if let Some(by_code) = self.counts.get_mut(hit.query_id) {
            *by_code.entry(hit.code).or_insert(0) += nb;
        } else {
            let mut by_code = FxHashMap::default();
            by_code.insert(hit.code, nb);
            self.counts.insert(hit.query_id.to_string(), by_code);
        }
    }

    pub fn get(&self, query_id: &str, code: &FunctionalCode) -> u64 {
        self.counts
            .get(query_id)
            .and_then(|by_code| by_code.get(code))
            .copied()
            .unwrap_or(0)
    }

    /// number of distinct queries
    pub fn nb_queries(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// iterates over (query, code, count) in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, FunctionalCode, u64)> + '_ {
        self.counts.iter().flat_map(|(query, by_code)| {
            by_code
                .iter()
                .map(move |(code, nb)| (query.as_str(), *code, *nb))
        })
    }

    /// (query, code, count) sorted by query then code
    pub fn sorted_entries(&self) -> Vec<(&str, FunctionalCode, u64)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0).then(a.1.cmp(&b.1)));
        entries
    }

    /// dumps in the per query format : no header, `query \t code \t count`, sorted by query
    /// then code. Returns the number of lines written
    pub fn write_tsv<W: Write>(&self, out: &mut W) -> io::Result<usize> {
        let entries = self.sorted_entries();
        for (query, code, nb) in &entries {
            writeln!(out, "{}\t{}\t{}", query, code, nb)?;
        }
        Ok(entries.len())
    }
} // end of impl QueryHitCounts

//========================================================================================

/// Streams diamond files and resolves subjects through a shared index.
pub struct HitExtractor<'a> {
    index: &'a IdentifierIndex,
    header_markers: Vec<String>,
}

impl<'a> HitExtractor<'a> {
    pub fn new(index: &'a IdentifierIndex) -> Self {
        let header_markers = DEFAULT_HEADER_MARKERS.iter().map(|s| s.to_string()).collect();
        HitExtractor {
            index,
            header_markers,
        }
    }

    pub fn with_header_markers(index: &'a IdentifierIndex, header_markers: Vec<String>) -> Self {
        HitExtractor {
            index,
            header_markers,
        }
    }

    /// classify one line (without its line terminator)
    pub fn parse_line<'l>(&self, line: &'l str) -> LineOutcome<'l> {
        if self.header_markers.iter().any(|m| line.starts_with(m.as_str())) {
            return LineOutcome::Header;
        }
        let mut fields = line.trim().split('\t');
        let (query_id, subject_id) = match (fields.next(), fields.next()) {
            (Some(q), Some(s)) => (q, s),
            _ => return LineOutcome::Malformed,
        };
        match self.index.resolve(subject_id) {
            Some(code) => LineOutcome::Hit(HitRecord { query_id, code }),
            None => LineOutcome::Unresolved,
        }
    } // end of parse_line

    /// accumulates hits of reader into counts.
    pub fn extract_reader<R: BufRead>(
        &self,
        mut reader: R,
        counts: &mut QueryHitCounts,
        stats: &mut ExtractStats,
    ) -> io::Result<()> {
        let mut buf = Vec::<u8>::with_capacity(512);
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            stats.nb_lines += 1;
            if stats.nb_lines % 1_000_000 == 0 {
                log::debug!("processed {} lines", stats.nb_lines);
            }
            // a line that is not utf8 is skipped as any malformed line
            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line,
                Err(_) => {
                    stats.nb_skipped += 1;
                    continue;
                }
            };
            match self.parse_line(line.trim_end_matches(['\n', '\r'])) {
                LineOutcome::Hit(hit) => {
                    stats.nb_resolved += 1;
                    counts.add(&hit, 1);
                }
                LineOutcome::Unresolved => stats.nb_unresolved += 1,
                LineOutcome::Header | LineOutcome::Malformed => stats.nb_skipped += 1,
            }
        }
        Ok(())
    } // end of extract_reader

    /// per query counts of a sample file (plain or gzipped).
    /// A file we cannot open or read only fails this sample.
    pub fn extract_by_query(
        &self,
        sample: &SampleFile,
    ) -> Result<(QueryHitCounts, ExtractStats), SampleError> {
        log::debug!("processing diamond output : {:?}", sample.get_path());
        let to_sample_err = |source: io::Error| SampleError::Unreadable {
            sample: sample.get_sample_id().to_string(),
            path: sample.get_path().to_path_buf(),
            source,
        };
        let reader = open_text_reader(sample.get_path()).map_err(to_sample_err)?;
        let mut counts = QueryHitCounts::new();
        let mut stats = ExtractStats::default();
        self.extract_reader(reader, &mut counts, &mut stats)
            .map_err(to_sample_err)?;
        if stats.nb_lines == 0 {
            return Err(SampleError::Empty {
                sample: sample.get_sample_id().to_string(),
            });
        }
        log::info!(
            "sample {} : lines {}, skipped {}, without KO mapping {}, unique queries {}",
            sample.get_sample_id(),
            stats.nb_lines,
            stats.nb_skipped,
            stats.nb_unresolved,
            counts.nb_queries()
        );
        Ok((counts, stats))
    } // end of extract_by_query

    /// as [Self::extract_by_query] but an empty file gives empty counts with a warning, so that
    /// a per sample dump still exists for the later stages
    pub fn extract_by_query_allow_empty(
        &self,
        sample: &SampleFile,
    ) -> Result<(QueryHitCounts, ExtractStats), SampleError> {
        match self.extract_by_query(sample) {
            Err(SampleError::Empty { sample: sample_id }) => {
                log::warn!(
                    "sample {} : empty input file {:?}, dumping empty counts",
                    sample_id,
                    sample.get_path()
                );
                Ok((QueryHitCounts::new(), ExtractStats::default()))
            }
            res => res,
        }
    } // end of extract_by_query_allow_empty

    /// per KO totals of a sample file
    pub fn extract(
        &self,
        sample: &SampleFile,
    ) -> Result<(SampleHitTable, ExtractStats), SampleError> {
        let (counts, stats) = self.extract_by_query(sample)?;
        Ok((aggregate(&counts), stats))
    }
} // end of impl HitExtractor

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::KO_PATTERN;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn ko(s: &str) -> FunctionalCode {
        FunctionalCode::parse(s).unwrap()
    }

    fn test_index() -> IdentifierIndex {
        let reference = "geneA\tKO:K00001\ngeneB\tKO:K00002\ngeneC.1\tK00003\n";
        IdentifierIndex::from_reader(Cursor::new(reference), &KO_PATTERN).unwrap()
    }

    const DIAMOND: &str = "qseqid\tsseqid\tpident\n\
        # a comment\n\
        read1\tkegg|geneA\t99.0\t100\n\
        read1\tgeneA.3\t98.0\n\
        read1\tgeneB\n\
        read2\tgeneA\n\
        read2\tunknown_gene\n\
        lonely_field\n\
        read3\tgeneC.1\n";

    #[test]
    fn line_classification() {
        let index = test_index();
        let extractor = HitExtractor::new(&index);
        assert_eq!(extractor.parse_line("qseqid\tsseqid"), LineOutcome::Header);
        assert_eq!(extractor.parse_line("#comment"), LineOutcome::Header);
        assert_eq!(extractor.parse_line("only_one"), LineOutcome::Malformed);
        assert_eq!(extractor.parse_line("r\tnope"), LineOutcome::Unresolved);
        assert_eq!(
            extractor.parse_line("r\tdb|geneB.7\t1e-10"),
            LineOutcome::Hit(HitRecord {
                query_id: "r",
                code: ko("K00002")
            })
        );
    }

    #[test]
    fn counts_per_query_and_code() {
        let index = test_index();
        let extractor = HitExtractor::new(&index);
        let mut counts = QueryHitCounts::new();
        let mut stats = ExtractStats::default();
        extractor
            .extract_reader(Cursor::new(DIAMOND), &mut counts, &mut stats)
            .unwrap();
        assert_eq!(counts.get("read1", &ko("K00001")), 2);
        assert_eq!(counts.get("read1", &ko("K00002")), 1);
        assert_eq!(counts.get("read2", &ko("K00001")), 1);
        assert_eq!(counts.get("read3", &ko("K00003")), 1);
        assert_eq!(counts.nb_queries(), 3);
        assert_eq!(
            stats,
            ExtractStats {
                nb_lines: 9,
                nb_skipped: 3,
                nb_unresolved: 1,
                nb_resolved: 5
            }
        );
    }

    #[test]
    fn per_query_dump_is_sorted() {
        let index = test_index();
        let extractor = HitExtractor::new(&index);
        let mut counts = QueryHitCounts::new();
        let mut stats = ExtractStats::default();
        extractor
            .extract_reader(Cursor::new(DIAMOND), &mut counts, &mut stats)
            .unwrap();
        let mut out = Vec::<u8>::new();
        let nb = counts.write_tsv(&mut out).unwrap();
        assert_eq!(nb, 4);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "read1\tK00001\t2\nread1\tK00002\t1\nread2\tK00001\t1\nread3\tK00003\t1\n"
        );
    }

    #[test]
    fn unreadable_and_empty_files_are_sample_errors() {
        let index = test_index();
        let extractor = HitExtractor::new(&index);
        let missing = SampleFile::new(String::from("S1"), PathBuf::from("/nonexistent/S1.tsv"));
        assert!(matches!(
            extractor.extract(&missing),
            Err(SampleError::Unreadable { .. })
        ));
        //
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S2.tsv");
        std::fs::write(&path, "").unwrap();
        let empty = SampleFile::new(String::from("S2"), path);
        assert!(matches!(
            extractor.extract(&empty),
            Err(SampleError::Empty { .. })
        ));
    }

    #[test]
    fn non_utf8_line_is_skipped_not_fatal() {
        let index = test_index();
        let extractor = HitExtractor::new(&index);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S4.tsv");
        let mut bytes = b"r1\tgeneA\nr2\tgeneA\n".to_vec();
        bytes.extend_from_slice(b"r3\t\xff\xfe\n");
        bytes.extend_from_slice(b"r4\tgeneA\n");
        std::fs::write(&path, bytes).unwrap();
        let (table, stats) = extractor
            .extract(&SampleFile::new(String::from("S4"), path))
            .unwrap();
        assert_eq!(table.get(&ko("K00001")), 3);
        assert_eq!(stats.nb_lines, 4);
        assert_eq!(stats.nb_skipped, 1);
        assert_eq!(stats.nb_resolved, 3);
    }

    #[test]
    fn empty_file_can_give_empty_dumps() {
        let index = test_index();
        let extractor = HitExtractor::new(&index);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S5.tsv");
        std::fs::write(&path, "").unwrap();
        let sample = SampleFile::new(String::from("S5"), path);
        let (counts, stats) = extractor.extract_by_query_allow_empty(&sample).unwrap();
        assert!(counts.is_empty());
        assert_eq!(stats, ExtractStats::default());
        let mut out = Vec::<u8>::new();
        assert_eq!(counts.write_tsv(&mut out).unwrap(), 0);
        assert!(out.is_empty());
        let mut out = Vec::<u8>::new();
        crate::utils::tables::write_totals(&aggregate(&counts), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "functional_code\ttotal_hits\n");
        // an unreadable file stays an error
        let missing = SampleFile::new(String::from("S6"), dir.path().join("S6.tsv"));
        assert!(matches!(
            extractor.extract_by_query_allow_empty(&missing),
            Err(SampleError::Unreadable { .. })
        ));
    }

    #[test]
    fn extract_gives_per_code_totals() {
        let index = test_index();
        let extractor = HitExtractor::new(&index);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S3.tsv");
        std::fs::write(&path, DIAMOND).unwrap();
        let (table, stats) = extractor
            .extract(&SampleFile::new(String::from("S3"), path))
            .unwrap();
        assert_eq!(stats.nb_resolved, 5);
        assert_eq!(table.get(&ko("K00001")), 3);
        assert_eq!(table.get(&ko("K00002")), 1);
        assert_eq!(table.get(&ko("K00003")), 1);
        assert_eq!(table.len(), 3);
    }
}
