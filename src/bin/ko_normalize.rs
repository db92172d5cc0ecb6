//! ko_normalize --input-dir [-d] dir --genome-counts [-g] counts.tsv --output [-o] out
//!              [--threads n] [--report report.json]
//!
//! Divides the KO totals of each `<sample>_kegg_hits_summed.tsv` file of dir by the genome
//! count of the sample and gathers them in one table : a row per KO, a column per sample
//! (sorted), 6 decimals. A KO absent from a sample is 0.
//!
//! The genome count table (csv or tab separated) needs a `run_accession` and a `num_genomes`
//! column, names are matched ignoring case and blanks. A sample without genome count keeps
//! a column of 0 and is listed at the end of the run.
//!
//! If out is a directory, the table is written in out/normalized_kegg_results.tsv

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::Context;
use clap::{value_parser, Arg, Command};
use cpu_time::ProcessTime;
use env_logger::Builder;

use kofeature::error::FatalConfigError;
use kofeature::pipeline::{
    collect_tables, normalize_tables, read_samples, with_progress, RunReport, WorkerPool,
};
use kofeature::utils::files::{check_unique_samples, collect_sample_files, resolve_output_path};
use kofeature::utils::parameters::{PipelineParams, DEFAULT_MATRIX_NAME};
use kofeature::utils::tables::read_genome_counts;

pub fn init_log() -> u64 {
    Builder::from_default_env().init();
    println!("\n ************** initializing logger *****************\n");
    1
}

fn main() -> anyhow::Result<()> {
    let _ = init_log();
    let start_t = chrono::Local::now();
    let cpu_start = ProcessTime::now();
    log::info!("ko_normalize begins at time:{:#?}", start_t);

    let matches = Command::new("ko_normalize")
        .arg_required_else_help(true)
        .about("Normalize KEGG hits by genome counts")
        .version("0.1.0")
        .arg(
            Arg::new("input_dir")
                .short('d')
                .long("input-dir")
                .help("directory containing _kegg_hits_summed.tsv files")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("genome_counts")
                .short('g')
                .long("genome-counts")
                .visible_alias("kegg-stats")
                .help("table with run_accession and num_genomes columns")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("output tsv file (or directory) for normalized results")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .help("number of threads, 0 for all cpus")
                .default_value("0")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("report")
                .long("report")
                .help("json dump of samples affected by errors")
                .required(false)
                .value_parser(value_parser!(PathBuf)),
        )
        .get_matches();

    let input_dir = matches.get_one::<PathBuf>("input_dir").unwrap();
    let counts_path = matches.get_one::<PathBuf>("genome_counts").unwrap();
    let output = resolve_output_path(
        matches.get_one::<PathBuf>("output").unwrap(),
        DEFAULT_MATRIX_NAME,
    );
    let nb_threads = *matches.get_one::<usize>("threads").unwrap();
    if !input_dir.is_dir() {
        anyhow::bail!("input directory does not exist: {:?}", input_dir);
    }
    if !counts_path.is_file() {
        anyhow::bail!("genome count file does not exist: {:?}", counts_path);
    }
    let params = PipelineParams::default().with_threads(nb_threads);

    let genome_counts = read_genome_counts(counts_path)?;
    let samples = collect_sample_files(input_dir, &params.get_summed_suffixes())
        .with_context(|| format!("cannot scan {:?}", input_dir))?;
    if samples.is_empty() {
        return Err(FatalConfigError::NoInputFiles {
            dir: input_dir.clone(),
            suffix: params.get_summed_suffix().to_string(),
        }
        .into());
    }
    check_unique_samples(&samples)?;

    let pool = WorkerPool::new(params.get_nb_threads())?;
    let results = with_progress(samples.len(), |sender| {
        read_samples(&pool, &samples, Some(sender))
    });
    let mut report = RunReport::new(samples.len());
    let tables = collect_tables(results, &mut report, |table| table);
    let matrix = normalize_tables(tables, &genome_counts, &mut report)?;

    let file = File::create(&output).with_context(|| format!("cannot create {:?}", output))?;
    matrix
        .write_tsv(BufWriter::new(file), params.get_precision())
        .with_context(|| format!("writing {:?}", output))?;
    report.log_summary();
    if let Some(report_path) = matches.get_one::<PathBuf>("report") {
        report.dump_json(report_path)?;
    }

    println!("\nnormalization complete! results saved to: {:?}", output);
    log::info!(
        "ko_normalize ends at time:{:#?}, cpu time(s) {}",
        chrono::Local::now(),
        cpu_start.elapsed().as_secs()
    );
    Ok(())
}
