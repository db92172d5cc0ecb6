//! Normalization of KO totals by genome counts and assembly of the feature table.
//!
//! The feature table has one row per KO seen in any sample and one column per sample.
//! It is dense : a KO absent from a sample gets 0. A sample without genome count keeps its
//! column, filled with 0, and a warning is returned for it.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use crate::aggregate::SampleHitTable;
use crate::error::{FatalConfigError, SampleError};
use crate::index::FunctionalCode;

/// header of the code column
pub const CODE_COLUMN: &str = "functional_code";

/// number of decimals of dumped values
pub const DEFAULT_PRECISION: usize = 6;

/// what the normalizer needs for one sample
#[derive(Debug, Clone)]
pub struct NormalizeInput {
    pub sample_id: String,
    pub totals: SampleHitTable,
    pub genome_count: Option<f64>,
}

impl NormalizeInput {
    pub fn new(sample_id: String, totals: SampleHitTable, genome_count: Option<f64>) -> Self {
        NormalizeInput {
            sample_id,
            totals,
            genome_count,
        }
    }
}

/// Dense codes x samples matrix. Rows and columns are sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    codes: Vec<FunctionalCode>,
    samples: Vec<String>,
    /// row major, codes.len() x samples.len()
    values: Vec<f64>,
}

impl FeatureMatrix {
    pub fn get_codes(&self) -> &[FunctionalCode] {
        &self.codes
    }

    pub fn get_samples(&self) -> &[String] {
        &self.samples
    }

    pub fn nb_rows(&self) -> usize {
        self.codes.len()
    }

    pub fn nb_columns(&self) -> usize {
        self.samples.len()
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let nb_col = self.samples.len();
        &self.values[i * nb_col..(i + 1) * nb_col]
    }

    /// value for (code, sample), None if code or sample is not in the matrix
    pub fn get(&self, code: &FunctionalCode, sample: &str) -> Option<f64> {
        let i = self.codes.binary_search(code).ok()?;
        let j = self
            .samples
            .binary_search_by(|s| s.as_str().cmp(sample))
            .ok()?;
        Some(self.values[i * self.samples.len() + j])
    }

    /// tab separated dump : header `functional_code` then sample ids, values with
    /// precision decimals
    pub fn write_tsv<W: Write>(&self, out: W, precision: usize) -> csv::Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(out);
        let mut header = Vec::<&str>::with_capacity(self.samples.len() + 1);
        header.push(CODE_COLUMN);
        header.extend(self.samples.iter().map(|s| s.as_str()));
        writer.write_record(&header)?;
        //
        let mut record = Vec::<String>::with_capacity(self.samples.len() + 1);
        for (i, code) in self.codes.iter().enumerate() {
            record.clear();
            record.push(code.to_string());
            record.extend(self.row(i).iter().map(|v| format!("{:.*}", precision, v)));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    } // end of write_tsv
} // end of impl FeatureMatrix

/// Normalized table and the samples whose column could not be normalized.
#[derive(Debug)]
pub struct NormalizeOutcome {
    pub matrix: FeatureMatrix,
    pub warnings: Vec<SampleError>,
}

/// divides each sample total by its genome count and assembles the dense matrix.
/// Fails only if a sample id is given twice.
pub fn normalize(samples: Vec<NormalizeInput>) -> Result<NormalizeOutcome, FatalConfigError> {
    let mut by_sample = BTreeMap::<String, NormalizeInput>::new();
    for input in samples {
        if by_sample.contains_key(&input.sample_id) {
            return Err(FatalConfigError::DuplicateSample {
                sample: input.sample_id,
            });
        }
        by_sample.insert(input.sample_id.clone(), input);
    }
    // row set is the union of codes of all samples, also of those we cannot normalize
    let codes: Vec<FunctionalCode> = by_sample
        .values()
        .flat_map(|input| input.totals.codes().copied())
        .collect::<BTreeSet<FunctionalCode>>()
        .into_iter()
        .collect();
    let sample_ids: Vec<String> = by_sample.keys().cloned().collect();
    let nb_col = sample_ids.len();
    //
    let mut values = vec![0f64; codes.len() * nb_col];
    let mut warnings = Vec::<SampleError>::new();
    for (j, input) in by_sample.values().enumerate() {
        let genome_count = match input.genome_count {
            Some(count) if count.is_finite() && count > 0. => count,
            _ => {
                log::warn!(
                    "no genome count for sample {}, its column is set to 0",
                    input.sample_id
                );
                warnings.push(SampleError::MissingGenomeCount {
                    sample: input.sample_id.clone(),
                });
                continue;
            }
        };
        for (code, nb) in input.totals.iter() {
            // codes is built from all totals so the search cannot fail
            if let Ok(i) = codes.binary_search(&code) {
                values[i * nb_col + j] = nb as f64 / genome_count;
            }
        }
    }
    log::info!(
        "feature table : {} KO x {} samples, {} samples without genome count",
        codes.len(),
        nb_col,
        warnings.len()
    );
    //
    Ok(NormalizeOutcome {
        matrix: FeatureMatrix {
            codes,
            samples: sample_ids,
            values,
        },
        warnings,
    })
} // end of normalize
