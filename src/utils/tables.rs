//! Intermediate tables exchanged between stages.
//!
//! - per sample KO totals : header `functional_code \t total_hits`, then `code \t count` sorted
//!   by code. Reading also accepts the per query format `query \t code \t count` (no header),
//!   summed on read.
//! - genome counts : a csv or tab separated table with a sample column and a genome count column.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::Path;

use serde::Serialize;

use crate::aggregate::SampleHitTable;
use crate::error::FatalConfigError;
use crate::genomecount::SampleGenomeCount;
use crate::index::FunctionalCode;
use crate::utils::files::open_text_reader;

pub const TOTALS_HEADER: [&str; 2] = ["functional_code", "total_hits"];

/// accepted names (after trim and lowercase) of the sample column of genome count tables
pub const SAMPLE_COLUMNS: [&str; 3] = ["run_accession", "sample_id", "sample"];
/// accepted names (after trim and lowercase) of the genome count column
pub const GENOME_COUNT_COLUMNS: [&str; 2] = ["num_genomes", "genome_count"];

/// Counters of a totals file read.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub nb_lines: usize,
    /// header, non utf8 line, bad code or count not convertible to a non negative integer
    pub nb_dropped: usize,
}

/// hit counts are integers, we also accept "12.0" as a float dump of an integer.
pub fn parse_count(field: &str) -> Option<u64> {
    let field = field.trim();
    if let Ok(nb) = field.parse::<u64>() {
        return Some(nb);
    }
    match field.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0. && v.fract() == 0. && v <= u64::MAX as f64 => {
            Some(v as u64)
        }
        _ => None,
    }
} // end of parse_count

/// reads a totals table (or a per query table) from reader.
pub fn read_totals<R: BufRead>(mut reader: R) -> io::Result<(SampleHitTable, TableStats)> {
    let mut table = SampleHitTable::new();
    let mut stats = TableStats::default();
    let mut buf = Vec::<u8>::with_capacity(64);
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        stats.nb_lines += 1;
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(_) => {
                stats.nb_dropped += 1;
                continue;
            }
        };
        let fields: Vec<&str> = line.trim().split('\t').collect();
        let (code, count) = match fields.len() {
            2 => (fields[0], fields[1]),
            n if n >= 3 => (fields[1], fields[2]),
            _ => {
                stats.nb_dropped += 1;
                continue;
            }
        };
        match (FunctionalCode::parse(code.trim()), parse_count(count)) {
            (Some(code), Some(nb)) => table.add(code, nb),
            _ => stats.nb_dropped += 1,
        }
    }
    Ok((table, stats))
} // end of read_totals

pub fn read_totals_file(path: &Path) -> io::Result<(SampleHitTable, TableStats)> {
    let reader = open_text_reader(path)?;
    let (table, stats) = read_totals(reader)?;
    log::debug!(
        "read {:?} : {} codes, {} lines dropped",
        path,
        table.len(),
        stats.nb_dropped
    );
    Ok((table, stats))
}

pub fn write_totals<W: Write>(table: &SampleHitTable, out: &mut W) -> io::Result<()> {
    writeln!(out, "{}\t{}", TOTALS_HEADER[0], TOTALS_HEADER[1])?;
    for (code, nb) in table.iter() {
        writeln!(out, "{}\t{}", code, nb)?;
    }
    Ok(())
}

//========================================================================================

fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => b',',
        _ => b'\t',
    }
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
}

/// genome count, None if cell is empty or not a positive finite number
fn parse_genome_count(field: &str) -> Option<f64> {
    match field.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0. => Some(v),
        _ => None,
    }
}

/// reads sample id -> genome count.
/// Column names are matched ignoring case and surrounding blanks. If a sample appears more
/// than once the first row is kept.
pub fn read_genome_counts(path: &Path) -> Result<BTreeMap<String, Option<f64>>, FatalConfigError> {
    let unreadable = |detail: String| FatalConfigError::MetadataUnreadable {
        path: path.to_path_buf(),
        detail,
    };
    let reader = open_text_reader(path).map_err(|e| unreadable(e.to_string()))?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_for(path))
        .flexible(true)
        .from_reader(reader);
    let headers = csv_reader
        .headers()
        .map_err(|e| unreadable(e.to_string()))?
        .clone();
    let (sample_col, count_col) = match (
        find_column(&headers, &SAMPLE_COLUMNS),
        find_column(&headers, &GENOME_COUNT_COLUMNS),
    ) {
        (Some(s), Some(c)) => (s, c),
        _ => {
            return Err(FatalConfigError::MetadataColumns {
                path: path.to_path_buf(),
            })
        }
    };
    //
    let mut counts = BTreeMap::<String, Option<f64>>::new();
    for record in csv_reader.records() {
        let record = record.map_err(|e| unreadable(e.to_string()))?;
        let sample = match record.get(sample_col).map(|s| s.trim()) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => continue,
        };
        let count = record.get(count_col).and_then(parse_genome_count);
        if counts.contains_key(&sample) {
            log::warn!("sample {} appears twice in {:?}, first row kept", sample, path);
            continue;
        }
        counts.insert(sample, count);
    }
    log::info!("read genome counts of {} samples from {:?}", counts.len(), path);
    Ok(counts)
} // end of read_genome_counts

/// dumps `run_accession \t num_genomes`, a missing count is an empty cell.
pub fn write_genome_counts<W: Write>(counts: &[SampleGenomeCount], out: W) -> csv::Result<()> {
    let mut sorted: Vec<&SampleGenomeCount> = counts.iter().collect();
    sorted.sort_by(|a, b| a.sample_id.cmp(&b.sample_id));
    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_writer(out);
    writer.write_record([SAMPLE_COLUMNS[0], GENOME_COUNT_COLUMNS[0]])?;
    for count in sorted {
        let value = count.genome_count.map(|v| v.to_string()).unwrap_or_default();
        writer.write_record([count.sample_id.as_str(), value.as_str()])?;
    }
    writer.flush()?;
    Ok(())
} // end of write_genome_counts
