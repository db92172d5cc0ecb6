//! Parallel processing of samples and chaining of the stages.
//!
//! Each sample file is an independent task submitted to a fixed size rayon pool. A task
//! returns its table by value, the only shared data is the read only
//! [IdentifierIndex](crate::index::IdentifierIndex).
//! Genome count estimation and normalization start once all tasks are collected, so sample
//! order in the output never depends on task completion order.
//!
//! Progress is reported through a channel to an observer thread, tasks only send events.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crossbeam_channel::{Receiver, Sender};
use rayon::prelude::*;
use serde::Serialize;

use crate::aggregate::SampleHitTable;
use crate::error::{FatalConfigError, SampleError, SampleIssue};
use crate::genomecount::{estimate, SampleGenomeCount};
use crate::hits::{ExtractStats, HitExtractor};
use crate::markers::MarkerPanel;
use crate::normalize::{normalize, FeatureMatrix, NormalizeInput};
use crate::utils::files::{check_unique_samples, SampleFile};
use crate::utils::tables::read_totals_file;

/// messages sent by tasks to the progress observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Done { sample: String },
    Failed { sample: String },
}

/// A fixed size pool of workers running one task per sample.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    nb_threads: usize,
}

impl WorkerPool {
    pub fn new(nb_threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(nb_threads)
            .thread_name(|i| format!("kofeature-worker-{}", i))
            .build()?;
        // 0 lets rayon choose, so we ask the pool what it really started
        let nb_threads = pool.current_num_threads();
        log::info!("worker pool with {} threads", nb_threads);
        Ok(WorkerPool { pool, nb_threads })
    }

    pub fn get_nb_threads(&self) -> usize {
        self.nb_threads
    }

    /// runs task on each sample and returns (sample id, result) in the order of samples.
    /// A task failure is its own result, it never stops the other tasks.
    pub fn run<T, F>(
        &self,
        samples: &[SampleFile],
        task: F,
        progress: Option<&Sender<ProgressEvent>>,
    ) -> Vec<(String, Result<T, SampleError>)>
    where
        T: Send,
        F: Fn(&SampleFile) -> Result<T, SampleError> + Sync,
    {
        self.pool.install(|| {
            samples
                .par_iter()
                .map(|sample| {
                    let res = task(sample);
                    if let Some(sender) = progress {
                        let sample = sample.get_sample_id().to_string();
                        let event = match res {
                            Ok(_) => ProgressEvent::Done { sample },
                            Err(_) => ProgressEvent::Failed { sample },
                        };
                        // the observer may be gone, progress is not essential
                        let _ = sender.send(event);
                    }
                    (sample.get_sample_id().to_string(), res)
                })
                .collect()
        })
    } // end of run

    /// runs op inside the pool so that rayon parallel iterators in op use its threads
    pub fn install<R, OP>(&self, op: OP) -> R
    where
        R: Send,
        OP: FnOnce() -> R + Send,
    {
        self.pool.install(op)
    }
} // end of impl WorkerPool

fn observe_progress(receiver: Receiver<ProgressEvent>, nb_total: usize) -> (usize, usize) {
    let (mut nb_done, mut nb_failed) = (0usize, 0usize);
    let step = (nb_total / 10).max(1);
    for event in receiver.iter() {
        match &event {
            ProgressEvent::Done { sample } => {
                nb_done += 1;
                log::debug!("sample {} done", sample);
            }
            ProgressEvent::Failed { sample } => {
                nb_failed += 1;
                log::debug!("sample {} failed", sample);
            }
        }
        let nb_seen = nb_done + nb_failed;
        if nb_seen % step == 0 || nb_seen == nb_total {
            log::info!("nb samples processed : {} / {}", nb_seen, nb_total);
        }
    }
    (nb_done, nb_failed)
} // end of observe_progress

/// runs f with a sender whose events are logged by an observer thread.
pub fn with_progress<R, F>(nb_total: usize, f: F) -> R
where
    F: FnOnce(&Sender<ProgressEvent>) -> R,
{
    let (sender, receiver) = crossbeam_channel::unbounded::<ProgressEvent>();
    let res = crossbeam_utils::thread::scope(|scope| {
        let observer = scope.spawn(move |_| observe_progress(receiver, nb_total));
        let r = f(&sender);
        // closing the channel ends the observer loop
        drop(sender);
        if let Ok((nb_done, nb_failed)) = observer.join() {
            log::info!("samples done : {}, failed : {}", nb_done, nb_failed);
        }
        r
    });
    match res {
        Ok(r) => r,
        Err(e) => std::panic::resume_unwind(e),
    }
} // end of with_progress

//========================================================================================

/// Samples affected by recoverable errors. Only the first (root) cause is kept per sample.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunReport {
    pub nb_samples: usize,
    issues: BTreeMap<String, SampleIssue>,
}

impl RunReport {
    pub fn new(nb_samples: usize) -> Self {
        RunReport {
            nb_samples,
            issues: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, err: &SampleError) {
        self.issues
            .entry(err.get_sample().to_string())
            .or_insert_with(|| SampleIssue::from(err));
    }

    pub fn get_issue(&self, sample: &str) -> Option<&SampleIssue> {
        self.issues.get(sample)
    }

    /// affected samples sorted by id
    pub fn affected_samples(&self) -> Vec<&str> {
        self.issues.keys().map(|s| s.as_str()).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn log_summary(&self) {
        if self.is_clean() {
            log::info!("all {} samples processed without error", self.nb_samples);
            return;
        }
        log::warn!(
            "{} of {} samples are affected by errors, their columns are filled with 0 :",
            self.issues.len(),
            self.nb_samples
        );
        for issue in self.issues.values() {
            log::warn!("  {}", issue.message);
        }
    }

    pub fn dump_json(&self, filepath: &Path) -> Result<(), FatalConfigError> {
        let to_fatal = |source: std::io::Error| FatalConfigError::OutputUnwritable {
            path: filepath.to_path_buf(),
            source,
        };
        let mut writer = BufWriter::new(File::create(filepath).map_err(to_fatal)?);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| to_fatal(std::io::Error::from(e)))?;
        writer.flush().map_err(to_fatal)?;
        Ok(())
    }
} // end of impl RunReport

//========================================================================================

/// extraction and aggregation of all diamond files of samples.
pub fn extract_samples(
    pool: &WorkerPool,
    samples: &[SampleFile],
    extractor: &HitExtractor,
    progress: Option<&Sender<ProgressEvent>>,
) -> Vec<(String, Result<(SampleHitTable, ExtractStats), SampleError>)> {
    pool.run(samples, |sample| extractor.extract(sample), progress)
}

/// reads per sample totals files. An empty file is a sample error.
pub fn read_samples(
    pool: &WorkerPool,
    samples: &[SampleFile],
    progress: Option<&Sender<ProgressEvent>>,
) -> Vec<(String, Result<SampleHitTable, SampleError>)> {
    let task = |sample: &SampleFile| {
        let (table, stats) =
            read_totals_file(sample.get_path()).map_err(|source| SampleError::Unreadable {
                sample: sample.get_sample_id().to_string(),
                path: sample.get_path().to_path_buf(),
                source,
            })?;
        if stats.nb_lines == 0 {
            log::warn!("skipping empty file : {:?}", sample.get_path());
            return Err(SampleError::Empty {
                sample: sample.get_sample_id().to_string(),
            });
        }
        Ok(table)
    };
    pool.run(samples, task, progress)
} // end of read_samples

/// splits task results in tables (empty for failed samples) and records failures in report
pub fn collect_tables<T, F>(
    results: Vec<(String, Result<T, SampleError>)>,
    report: &mut RunReport,
    to_table: F,
) -> Vec<(String, SampleHitTable)>
where
    F: Fn(T) -> SampleHitTable,
{
    results
        .into_iter()
        .map(|(sample_id, res)| match res {
            Ok(t) => (sample_id, to_table(t)),
            Err(e) => {
                report.record(&e);
                (sample_id, SampleHitTable::new())
            }
        })
        .collect()
} // end of collect_tables

/// genome count of each sample. Samples already in report (failed extraction) are not estimated.
pub fn estimate_all(
    pool: &WorkerPool,
    tables: &[(String, SampleHitTable)],
    panel: &MarkerPanel,
    report: &mut RunReport,
) -> Vec<SampleGenomeCount> {
    let failed: &RunReport = report;
    let results: Vec<Option<Result<f64, SampleError>>> = pool.install(|| {
        tables
            .par_iter()
            .map(|(sample_id, table)| {
                if failed.get_issue(sample_id).is_some() {
                    None
                } else {
                    Some(estimate(sample_id, table, panel))
                }
            })
            .collect()
    });
    let mut counts = Vec::with_capacity(tables.len());
    for ((sample_id, _), res) in tables.iter().zip(results) {
        let count = match res {
            Some(Ok(count)) => Some(count),
            Some(Err(e)) => {
                report.record(&e);
                None
            }
            None => None,
        };
        counts.push(SampleGenomeCount::new(sample_id.clone(), count));
    }
    counts
} // end of estimate_all

/// normalizes tables with genome counts taken from a sample id -> count map.
/// A sample absent from the map has no genome count.
pub fn normalize_tables(
    tables: Vec<(String, SampleHitTable)>,
    genome_counts: &BTreeMap<String, Option<f64>>,
    report: &mut RunReport,
) -> Result<FeatureMatrix, FatalConfigError> {
    let inputs: Vec<NormalizeInput> = tables
        .into_iter()
        .map(|(sample_id, totals)| {
            let count = genome_counts.get(&sample_id).copied().flatten();
            NormalizeInput::new(sample_id, totals, count)
        })
        .collect();
    let outcome = normalize(inputs)?;
    for warning in &outcome.warnings {
        report.record(warning);
    }
    Ok(outcome.matrix)
} // end of normalize_tables

/// What a full run produces.
pub struct PipelineResult {
    pub tables: Vec<(String, SampleHitTable)>,
    pub genome_counts: Vec<SampleGenomeCount>,
    pub matrix: FeatureMatrix,
    pub report: RunReport,
}

/// diamond files -> KO totals -> genome counts -> feature table.
/// Two files with the same sample id are rejected before any extraction.
pub fn run_pipeline(
    pool: &WorkerPool,
    samples: &[SampleFile],
    extractor: &HitExtractor,
    panel: &MarkerPanel,
    progress: Option<&Sender<ProgressEvent>>,
) -> Result<PipelineResult, FatalConfigError> {
    check_unique_samples(samples)?;
    let mut report = RunReport::new(samples.len());
    //
    let results = extract_samples(pool, samples, extractor, progress);
    let tables = collect_tables(results, &mut report, |(table, _)| table);
    // barrier : all samples are collected
    let genome_counts = estimate_all(pool, &tables, panel, &mut report);
    let count_map: BTreeMap<String, Option<f64>> = genome_counts
        .iter()
        .map(|c| (c.sample_id.clone(), c.genome_count))
        .collect();
    let matrix = normalize_tables(tables.clone(), &count_map, &mut report)?;
    //
    Ok(PipelineResult {
        tables,
        genome_counts,
        matrix,
        report,
    })
} // end of run_pipeline
