//! ko_genomes --input-dir [-d] dir --output [-o] genome_counts.tsv [--markers file] [--threads n]
//!
//! For each `*_kegg_hits_summed.tsv` file of dir, estimates the number of genomes of the sample
//! as the mean count of single copy marker KOs. The output has columns
//! `run_accession \t num_genomes`, the count is empty when it cannot be estimated
//! (empty file, no marker KO).
//!
//! --markers : file with one marker KO per line, replacing the default prokaryotic panel.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::Context;
use clap::{value_parser, Arg, Command};
use cpu_time::ProcessTime;
use env_logger::Builder;

use kofeature::error::FatalConfigError;
use kofeature::markers::MarkerPanel;
use kofeature::pipeline::{
    collect_tables, estimate_all, read_samples, with_progress, RunReport, WorkerPool,
};
use kofeature::utils::files::{check_unique_samples, collect_sample_files};
use kofeature::utils::parameters::PipelineParams;
use kofeature::utils::tables::write_genome_counts;

pub fn init_log() -> u64 {
    Builder::from_default_env().init();
    println!("\n ************** initializing logger *****************\n");
    1
}

fn main() -> anyhow::Result<()> {
    let _ = init_log();
    let start_t = chrono::Local::now();
    let cpu_start = ProcessTime::now();
    log::info!("ko_genomes begins at time:{:#?}", start_t);

    let matches = Command::new("ko_genomes")
        .arg_required_else_help(true)
        .about("Estimate genome counts (mean single copy KO counts) from summed KEGG hits files")
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
            Arg::new("output")
                .short('o')
                .long("output")
                .help("output table (run_accession, num_genomes)")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("markers")
                .short('m')
                .long("markers")
                .help("file of single copy marker KOs, one per line")
                .required(false)
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
        .get_matches();

    let input_dir = matches.get_one::<PathBuf>("input_dir").unwrap();
    let output = matches.get_one::<PathBuf>("output").unwrap();
    let nb_threads = *matches.get_one::<usize>("threads").unwrap();
    if !input_dir.is_dir() {
        anyhow::bail!("input directory does not exist: {:?}", input_dir);
    }
    let params = PipelineParams::default().with_threads(nb_threads);

    let custom_panel = match matches.get_one::<PathBuf>("markers") {
        Some(path) => Some(MarkerPanel::from_file(path)?),
        None => None,
    };
    let panel = custom_panel.as_ref().unwrap_or_else(|| MarkerPanel::single_copy_kegg());
    log::info!("marker panel with {} KO", panel.len());

    let suffixes = params.get_summed_suffixes();
    let samples = collect_sample_files(input_dir, &suffixes)
        .with_context(|| format!("cannot scan {:?}", input_dir))?;
    if samples.is_empty() {
        return Err(FatalConfigError::NoInputFiles {
            dir: input_dir.clone(),
            suffix: params.get_summed_suffix().to_string(),
        }
        .into());
    }
    check_unique_samples(&samples)?;
    println!("found {} files to process", samples.len());

    let pool = WorkerPool::new(params.get_nb_threads())?;
    let results = with_progress(samples.len(), |sender| {
        read_samples(&pool, &samples, Some(sender))
    });
    let mut report = RunReport::new(samples.len());
    let tables = collect_tables(results, &mut report, |table| table);
    let counts = estimate_all(&pool, &tables, panel, &mut report);

    let file = File::create(output).with_context(|| format!("cannot create {:?}", output))?;
    write_genome_counts(&counts, BufWriter::new(file))
        .with_context(|| format!("writing {:?}", output))?;
    report.log_summary();

    println!("processed {} files, results saved to: {:?}", counts.len(), output);
    log::info!(
        "ko_genomes ends at time:{:#?}, cpu time(s) {}",
        chrono::Local::now(),
        cpu_start.elapsed().as_secs()
    );
    Ok(())
}
