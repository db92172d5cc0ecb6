//! ko_pipeline --input-dir [-d] dir --kegg [-k] prokaryotes.dat --output [-o] out [options]
//!
//! Runs the whole processing on all diamond blastx outputs of dir (files ending with
//! .tsv[.gz] or .m8[.gz], the sample id is the file name without this suffix) :
//! KO hit counting, genome count estimation from single copy KOs, normalization.
//! Two files giving the same sample id stop the run before any processing.
//!
//! - --suffix s : file name suffix of diamond outputs, may be repeated, replaces the defaults.
//! - --markers file : marker KOs, one per line, instead of the default prokaryotic panel.
//! - --threads n : size of the worker pool, 0 (default) for all cpus.
//! - --keep-summed dir : also dump per sample totals (`<sample>_kegg_hits_summed.tsv`) and
//!   the genome counts (`genome_counts.tsv`) in dir.
//! - --report file : json dump of the samples affected by errors.
//!
//! Processing parameters are dumped in `<out>.parameters.json`.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use cpu_time::ProcessTime;
use env_logger::Builder;

use kofeature::error::FatalConfigError;
use kofeature::hits::HitExtractor;
use kofeature::index::IdentifierIndex;
use kofeature::markers::MarkerPanel;
use kofeature::pipeline::{run_pipeline, with_progress, PipelineResult, WorkerPool};
use kofeature::utils::files::{check_unique_samples, collect_sample_files, resolve_output_path};
use kofeature::utils::parameters::{PipelineParams, DEFAULT_MATRIX_NAME};
use kofeature::utils::tables::{write_genome_counts, write_totals};

pub fn init_log() -> u64 {
    Builder::from_default_env().init();
    println!("\n ************** initializing logger *****************\n");
    1
}

// dumps intermediate tables of a run in dir
fn dump_intermediates(
    result: &PipelineResult,
    dir: &Path,
    params: &PipelineParams,
) -> anyhow::Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("cannot create directory {:?}", dir))?;
    for (sample_id, table) in &result.tables {
        let path = dir.join(format!("{}{}", sample_id, params.get_summed_suffix()));
        let file = File::create(&path).with_context(|| format!("cannot create {:?}", path))?;
        let mut writer = BufWriter::new(file);
        write_totals(table, &mut writer)
            .and_then(|_| writer.flush())
            .with_context(|| format!("writing {:?}", path))?;
    }
    let path = dir.join("genome_counts.tsv");
    let file = File::create(&path).with_context(|| format!("cannot create {:?}", path))?;
    write_genome_counts(&result.genome_counts, BufWriter::new(file))
        .with_context(|| format!("writing {:?}", path))?;
    log::info!("intermediate tables dumped in {:?}", dir);
    Ok(())
} // end of dump_intermediates

fn main() -> anyhow::Result<()> {
    let _ = init_log();
    let start_t = chrono::Local::now();
    let cpu_start = ProcessTime::now();
    log::info!("ko_pipeline begins at time:{:#?}", start_t);

    let matches = Command::new("ko_pipeline")
        .arg_required_else_help(true)
        .about("Normalized KEGG KO feature table from diamond blastx outputs")
        .version("0.1.0")
        .arg(
            Arg::new("input_dir")
                .short('d')
                .long("input-dir")
                .help("directory containing diamond outputs (tsv or tsv.gz)")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("kegg")
                .short('k')
                .long("kegg")
                .help("KEGG annotation file : gene_id <tab> annotation containing K#####")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("output tsv file (or directory) for the normalized table")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("suffix")
                .long("suffix")
                .help("suffix of diamond output files (repeatable), default .tsv[.gz] .m8[.gz]")
                .required(false)
                .action(ArgAction::Append)
                .value_parser(value_parser!(String)),
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
        .arg(
            Arg::new("keep_summed")
                .long("keep-summed")
                .help("directory where per sample KO totals and genome counts are dumped")
                .required(false)
                .value_parser(value_parser!(PathBuf)),
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
    let kegg = matches.get_one::<PathBuf>("kegg").unwrap();
    let output = resolve_output_path(
        matches.get_one::<PathBuf>("output").unwrap(),
        DEFAULT_MATRIX_NAME,
    );
    let nb_threads = *matches.get_one::<usize>("threads").unwrap();
    if !input_dir.is_dir() {
        anyhow::bail!("input directory does not exist: {:?}", input_dir);
    }
    let mut params = PipelineParams::default().with_threads(nb_threads);
    if let Some(suffixes) = matches.get_many::<String>("suffix") {
        params = params.with_alignment_suffixes(suffixes.cloned().collect());
    }

    // all configuration errors are raised before any sample is processed
    let custom_panel = match matches.get_one::<PathBuf>("markers") {
        Some(path) => Some(MarkerPanel::from_file(path)?),
        None => None,
    };
    let panel = custom_panel.as_ref().unwrap_or_else(|| MarkerPanel::single_copy_kegg());
    let samples = collect_sample_files(input_dir, params.get_alignment_suffixes())
        .with_context(|| format!("cannot scan {:?}", input_dir))?;
    if samples.is_empty() {
        return Err(FatalConfigError::NoInputFiles {
            dir: input_dir.clone(),
            suffix: params.get_alignment_suffixes().join("|"),
        }
        .into());
    }
    check_unique_samples(&samples)?;
    let index = IdentifierIndex::build_checked(kegg)?;
    let extractor = HitExtractor::with_header_markers(&index, params.get_header_markers().to_vec());

    let pool = WorkerPool::new(params.get_nb_threads())?;
    let result = with_progress(samples.len(), |sender| {
        run_pipeline(&pool, &samples, &extractor, panel, Some(sender))
    })?;

    let file = File::create(&output).with_context(|| format!("cannot create {:?}", output))?;
    result
        .matrix
        .write_tsv(BufWriter::new(file), params.get_precision())
        .with_context(|| format!("writing {:?}", output))?;
    let mut params_path = output.clone().into_os_string();
    params_path.push(".parameters.json");
    params.dump_json(Path::new(&params_path))?;
    if let Some(dir) = matches.get_one::<PathBuf>("keep_summed") {
        dump_intermediates(&result, dir, &params)?;
    }
    result.report.log_summary();
    if let Some(report_path) = matches.get_one::<PathBuf>("report") {
        result.report.dump_json(report_path)?;
    }

    println!(
        "\nfeature table of {} KO x {} samples saved to: {:?}",
        result.matrix.nb_rows(),
        result.matrix.nb_columns(),
        output
    );
    log::info!(
        "ko_pipeline ends at time:{:#?}, cpu time(s) {}",
        chrono::Local::now(),
        cpu_start.elapsed().as_secs()
    );
    Ok(())
}
