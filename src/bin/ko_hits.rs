//! ko_hits --input [-i] diamond.tsv[.gz] --kegg [-k] prokaryotes.dat --output [-o] out [--summed]
//!
//! Maps subject ids of a diamond blastx output to KEGG KO numbers and dumps, for each query,
//! the number of hits on each KO : `qseqid \t KO \t num_hits`, no header, sorted by query
//! then KO.
//!
//! --summed : dump instead the per KO totals of the file, with header
//! `functional_code \t total_hits`.
//!
//! An empty input file is not an error : the output is written empty (header only with --summed)
//! so that the sample keeps its column in the later stages.
//!
//! If output is a directory, the file is named `<sample>_kegg_hits.tsv` (or
//! `<sample>_kegg_hits_summed.tsv` with --summed), the sample id being the input file name
//! without its .tsv[.gz] or .m8[.gz] suffix.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use cpu_time::ProcessTime;
use env_logger::Builder;

use kofeature::aggregate::aggregate;
use kofeature::hits::HitExtractor;
use kofeature::index::IdentifierIndex;
use kofeature::utils::files::{sample_id_from_path, SampleFile};
use kofeature::utils::parameters::{PipelineParams, PER_QUERY_SUFFIX, SUMMED_SUFFIX};
use kofeature::utils::tables::write_totals;

pub fn init_log() -> u64 {
    Builder::from_default_env().init();
    println!("\n ************** initializing logger *****************\n");
    1
}

fn main() -> anyhow::Result<()> {
    let _ = init_log();
    let start_t = chrono::Local::now();
    let cpu_start = ProcessTime::now();
    log::info!("ko_hits begins at time:{:#?}", start_t);

    let matches = Command::new("ko_hits")
        .arg_required_else_help(true)
        .about("Extract KEGG KO hits from diamond blastx output")
        .version("0.1.0")
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .help("diamond blastx tabular output (tsv or tsv.gz)")
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
                .help("output file (qseqid, kegg_number, num_hits)")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("summed")
                .long("summed")
                .help("dump per KO totals instead of per query counts")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let input = matches.get_one::<PathBuf>("input").unwrap();
    let kegg = matches.get_one::<PathBuf>("kegg").unwrap();
    let output = matches.get_one::<PathBuf>("output").unwrap();
    let summed = matches.get_flag("summed");

    let index = IdentifierIndex::build_checked(kegg)?;

    let params = PipelineParams::default();
    let sample_id = sample_id_from_path(input, params.get_alignment_suffixes())
        .or_else(|| input.file_stem().and_then(|f| f.to_str()).map(String::from))
        .unwrap_or_else(|| String::from("input"));
    let output = if output.is_dir() {
        let suffix = if summed { SUMMED_SUFFIX } else { PER_QUERY_SUFFIX };
        output.join(format!("{}{}", sample_id, suffix))
    } else {
        output.clone()
    };
    let extractor = HitExtractor::new(&index);
    let sample = SampleFile::new(sample_id.clone(), input.clone());
    let (counts, stats) = extractor.extract_by_query_allow_empty(&sample)?;
    log::info!(
        "total lines : {}, skipped lines : {}, lines without KO mapping : {}",
        stats.nb_lines,
        stats.nb_skipped,
        stats.nb_unresolved
    );

    let mut writer = create_output(&output)?;
    let res = if summed {
        write_totals(&aggregate(&counts), &mut writer)
    } else {
        counts.write_tsv(&mut writer).map(|nb| {
            log::info!("wrote {} KEGG hits to output file", nb);
        })
    };
    res.and_then(|_| writer.flush())
        .with_context(|| format!("writing {:?}", output))?;
    println!("KEGG hits of sample {} saved to: {:?}", sample_id, output);

    log::info!(
        "ko_hits ends at time:{:#?}, cpu time(s) {}",
        chrono::Local::now(),
        cpu_start.elapsed().as_secs()
    );
    Ok(())
}

fn create_output(output: &Path) -> anyhow::Result<BufWriter<File>> {
    let file = File::create(output)
        .with_context(|| format!("cannot create output file {:?}", output))?;
    Ok(BufWriter::new(file))
}
