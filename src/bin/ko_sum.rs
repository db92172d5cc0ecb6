//! ko_sum --input [-i] hits.tsv --output [-o] sample_kegg_hits_summed.tsv
//!
//! Sums the per query hits file produced by ko_hits (`qseqid \t KO \t num_hits`, no header)
//! into per KO totals, dumped with header `functional_code \t total_hits`.
//! Lines whose count is not an integer are dropped.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{value_parser, Arg, Command};
use env_logger::Builder;

use kofeature::utils::tables::{read_totals_file, write_totals};

pub fn init_log() -> u64 {
    Builder::from_default_env().init();
    println!("\n ************** initializing logger *****************\n");
    1
}

fn main() -> anyhow::Result<()> {
    let _ = init_log();

    let matches = Command::new("ko_sum")
        .arg_required_else_help(true)
        .about("Sum KEGG hits from a per query KEGG hits file")
        .version("0.1.0")
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .help("per query KEGG hits file")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("output file for summed KEGG hits")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .get_matches();

    let input = matches.get_one::<PathBuf>("input").unwrap();
    let output = matches.get_one::<PathBuf>("output").unwrap();

    let (table, stats) =
        read_totals_file(input).with_context(|| format!("cannot read {:?}", input))?;
    if stats.nb_dropped > 0 {
        log::info!("{} lines dropped from {:?}", stats.nb_dropped, input);
    }

    let file = File::create(output).with_context(|| format!("cannot create {:?}", output))?;
    let mut writer = BufWriter::new(file);
    write_totals(&table, &mut writer)
        .and_then(|_| writer.flush())
        .with_context(|| format!("writing {:?}", output))?;
    println!("summed KEGG hits ({} KO) saved to {:?}", table.len(), output);
    Ok(())
}
