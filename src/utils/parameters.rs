//! structures related to processing parameters

use std::fs::OpenOptions;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::to_writer_pretty;

use crate::error::FatalConfigError;
use crate::hits::DEFAULT_HEADER_MARKERS;
use crate::normalize::DEFAULT_PRECISION;

/// suffix of per sample KO totals files, sample id is what precedes it
pub const SUMMED_SUFFIX: &str = "_kegg_hits_summed.tsv";

/// suffix of per query hits files
pub const PER_QUERY_SUFFIX: &str = "_kegg_hits.tsv";

/// default file name suffixes of diamond outputs. Plain .txt is left out as any note or
/// readme in an input directory would become a sample.
pub const DEFAULT_ALIGNMENT_SUFFIXES: [&str; 4] = [".tsv.gz", ".tsv", ".m8.gz", ".m8"];

/// default name of feature table when output is a directory
pub const DEFAULT_MATRIX_NAME: &str = "normalized_kegg_results.tsv";

/// Gathers parameters of a run. Dumped in json next to the output to keep track of how
/// a feature table was produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineParams {
    /// size of the worker pool
    nb_threads: usize,
    /// file name suffixes of diamond outputs, stripped to get sample id
    alignment_suffixes: Vec<String>,
    /// file name suffix of per sample totals
    summed_suffix: String,
    /// lines of diamond output beginning with one of these are skipped
    header_markers: Vec<String>,
    /// decimals in the feature table
    precision: usize,
} // end of PipelineParams

impl Default for PipelineParams {
    fn default() -> Self {
        PipelineParams {
            nb_threads: num_cpus::get(),
            alignment_suffixes: DEFAULT_ALIGNMENT_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            summed_suffix: SUMMED_SUFFIX.to_string(),
            header_markers: DEFAULT_HEADER_MARKERS.iter().map(|s| s.to_string()).collect(),
            precision: DEFAULT_PRECISION,
        }
    }
} // end of default for PipelineParams

impl PipelineParams {
    /// set number of threads, 0 means number of cpus
    pub fn with_threads(mut self, nb_threads: usize) -> Self {
        self.nb_threads = if nb_threads == 0 {
            num_cpus::get()
        } else {
            nb_threads
        };
        self
    }

    pub fn with_alignment_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.alignment_suffixes = suffixes;
        self
    }

    pub fn get_nb_threads(&self) -> usize {
        self.nb_threads
    }

    pub fn get_alignment_suffixes(&self) -> &[String] {
        &self.alignment_suffixes
    }

    pub fn get_summed_suffix(&self) -> &str {
        &self.summed_suffix
    }

    /// summed suffix as a list, as collect_sample_files wants it
    pub fn get_summed_suffixes(&self) -> Vec<String> {
        vec![self.summed_suffix.clone()]
    }

    pub fn get_header_markers(&self) -> &[String] {
        &self.header_markers
    }

    pub fn get_precision(&self) -> usize {
        self.precision
    }

    pub fn dump_json(&self, filepath: &Path) -> Result<(), FatalConfigError> {
        log::info!("dumping PipelineParams in json file : {:?}", filepath);
        let to_fatal = |source: io::Error| FatalConfigError::OutputUnwritable {
            path: filepath.to_path_buf(),
            source,
        };
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(filepath)
            .map_err(to_fatal)?;
        let mut writer = BufWriter::new(file);
        to_writer_pretty(&mut writer, &self).map_err(|e| to_fatal(io::Error::from(e)))?;
        writer.flush().map_err(to_fatal)?;
        Ok(())
    } // end of dump_json

    pub fn reload_json(filepath: &Path) -> io::Result<Self> {
        log::info!("reloading PipelineParams from {:?}", filepath);
        let file = OpenOptions::new().read(true).open(filepath)?;
        let params: PipelineParams = serde_json::from_reader(BufReader::new(file))?;
        Ok(params)
    }
} // end of impl PipelineParams

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_json_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parameters.json");
        let params = PipelineParams::default().with_threads(3);
        params.dump_json(&path).unwrap();
        let back = PipelineParams::reload_json(&path).unwrap();
        assert_eq!(back, params);
        assert_eq!(back.get_nb_threads(), 3);
        assert_eq!(back.get_precision(), 6);
    }

    #[test]
    fn default_suffixes_skip_text_notes() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["S1.tsv", "S2.m8.gz", "README.txt", "notes.txt.gz"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let params = PipelineParams::default();
        let found =
            crate::utils::files::collect_sample_files(dir.path(), params.get_alignment_suffixes())
                .unwrap();
        let ids: Vec<&str> = found.iter().map(|s| s.get_sample_id()).collect();
        assert_eq!(ids, vec!["S1", "S2"]);
        // other suffixes can still be asked for
        let params = params.with_alignment_suffixes(vec![String::from(".txt")]);
        let found =
            crate::utils::files::collect_sample_files(dir.path(), params.get_alignment_suffixes())
                .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_sample_id(), "README");
    }

    #[test]
    fn zero_threads_means_all_cpus() {
        let params = PipelineParams::default().with_threads(0);
        assert_eq!(params.get_nb_threads(), num_cpus::get());
    }
}
