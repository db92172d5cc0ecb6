//! Genome count estimation from single copy marker KOs.
//!
//! Each marker total is a noisy estimate of the number of genomes in the sample, the estimate
//! is the plain mean over the markers present. There is no outlier rejection, a marker with
//! a very divergent count moves the estimate.

use serde::Serialize;

use crate::aggregate::SampleHitTable;
use crate::error::SampleError;
use crate::markers::MarkerPanel;

/// estimated genome count of a sample, None if it could not be estimated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleGenomeCount {
    pub sample_id: String,
    pub genome_count: Option<f64>,
}

impl SampleGenomeCount {
    pub fn new(sample_id: String, genome_count: Option<f64>) -> Self {
        SampleGenomeCount {
            sample_id,
            genome_count,
        }
    }
}

/// mean of the totals of the panel codes present in totals.
/// Returns None when no marker is present or when all marker totals are 0.
pub fn mean_marker_hits(totals: &SampleHitTable, panel: &MarkerPanel) -> Option<f64> {
    let (nb_markers, sum) = totals
        .iter()
        .filter(|(code, _)| panel.contains(code))
        .fold((0usize, 0u64), |(n, s), (_, nb)| (n + 1, s + nb));
    if nb_markers == 0 || sum == 0 {
        return None;
    }
    Some(sum as f64 / nb_markers as f64)
} // end of mean_marker_hits

/// as [mean_marker_hits] with the missing case turned into a sample error
pub fn estimate(
    sample_id: &str,
    totals: &SampleHitTable,
    panel: &MarkerPanel,
) -> Result<f64, SampleError> {
    match mean_marker_hits(totals, panel) {
        Some(count) => {
            log::debug!("sample {} : estimated genome count {:.3}", sample_id, count);
            Ok(count)
        }
        None => {
            log::warn!("no matching single copy KO in sample {}", sample_id);
            Err(SampleError::NoMarkerOverlap {
                sample: sample_id.to_string(),
            })
        }
    }
} // end of estimate
