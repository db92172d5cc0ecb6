//! end to end runs through the library : diamond files -> feature table,
//! and summed files + genome count table -> feature table.

use std::fs;
use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use kofeature::hits::HitExtractor;
use kofeature::index::{FunctionalCode, IdentifierIndex};
use kofeature::markers::MarkerPanel;
use kofeature::pipeline::{
    collect_tables, normalize_tables, read_samples, run_pipeline, with_progress, RunReport,
    WorkerPool,
};
use kofeature::utils::files::collect_sample_files;
use kofeature::utils::parameters::{PipelineParams, SUMMED_SUFFIX};
use kofeature::utils::tables::read_genome_counts;

const REFERENCE: &str = "eco:b0001\tKO:K00001 thrA\n\
    eco:b0002\tKO:K00002 thrB\n\
    eco:b0003\tKO:K00003 thrC\n\
    eco:b0004\tno orthology\n";

fn ko(s: &str) -> FunctionalCode {
    FunctionalCode::parse(s).unwrap()
}

fn write_gz(path: &Path, content: &str) {
    let mut enc = GzEncoder::new(fs::File::create(path).unwrap(), Compression::default());
    enc.write_all(content.as_bytes()).unwrap();
    enc.finish().unwrap();
}

fn setup_diamond_dir(dir: &Path) {
    fs::write(dir.join("prokaryotes.dat"), REFERENCE).unwrap();
    let input = dir.join("input");
    fs::create_dir(&input).unwrap();
    write_gz(
        &input.join("SRR2.tsv.gz"),
        "qseqid\tsseqid\tpident\n\
         r1\tkegg|eco:b0001.1\t99.0\n\
         r1\teco:b0002\t90.0\n\
         r2\teco:b0001\t95.0\n\
         r3\teco:b0003\t91.0\n\
         r3\teco:b0004\t91.0\n\
         r4\tunknown|gene\t80.0\n",
    );
    fs::write(
        input.join("SRR1.tsv"),
        "r1\teco:b0001\nr2\teco:b0001\nr2\teco:b0003\n",
    )
    .unwrap();
    // a sample with hits but no marker
    fs::write(input.join("SRR3.tsv"), "r1\teco:b0003\n").unwrap();
}

fn run_once(dir: &Path, out_name: &str) -> (String, RunReport) {
    let params = PipelineParams::default().with_threads(2);
    let index = IdentifierIndex::build_checked(&dir.join("prokaryotes.dat")).unwrap();
    let extractor = HitExtractor::new(&index);
    let panel = MarkerPanel::new(vec![ko("K00001"), ko("K00002")]);
    let samples =
        collect_sample_files(&dir.join("input"), params.get_alignment_suffixes()).unwrap();
    let pool = WorkerPool::new(params.get_nb_threads()).unwrap();
    let result = with_progress(samples.len(), |sender| {
        run_pipeline(&pool, &samples, &extractor, &panel, Some(sender))
    })
    .unwrap();
    let out = dir.join(out_name);
    result
        .matrix
        .write_tsv(fs::File::create(&out).unwrap(), params.get_precision())
        .unwrap();
    (fs::read_to_string(&out).unwrap(), result.report)
}

#[test]
fn diamond_to_feature_table() {
    let dir = tempfile::tempdir().unwrap();
    setup_diamond_dir(dir.path());
    let (table, report) = run_once(dir.path(), "out.tsv");
    // SRR1 : K00001 2, K00003 1, markers mean over K00001 only = 2
    // SRR2 : K00001 2, K00002 1, K00003 1, markers mean (2 + 1) / 2 = 1.5
    // SRR3 : no marker, zero column
    assert_eq!(
        table,
        "functional_code\tSRR1\tSRR2\tSRR3\n\
         K00001\t1.000000\t1.333333\t0.000000\n\
         K00002\t0.000000\t0.666667\t0.000000\n\
         K00003\t0.500000\t0.666667\t0.000000\n"
    );
    assert_eq!(report.affected_samples(), vec!["SRR3"]);
}

#[test]
fn two_runs_give_identical_output() {
    let dir = tempfile::tempdir().unwrap();
    setup_diamond_dir(dir.path());
    let (first, _) = run_once(dir.path(), "out1.tsv");
    let (second, _) = run_once(dir.path(), "out2.tsv");
    assert_eq!(first.as_bytes(), second.as_bytes());
}

#[test]
fn summed_files_with_genome_count_table() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("summed");
    fs::create_dir(&input).unwrap();
    fs::write(
        input.join(format!("A{}", SUMMED_SUFFIX)),
        "functional_code\ttotal_hits\nK00001\t5\n",
    )
    .unwrap();
    fs::write(
        input.join(format!("B{}", SUMMED_SUFFIX)),
        "functional_code\ttotal_hits\nK00001\t2\nK00002\t4\n",
    )
    .unwrap();
    // C has an empty file, D is absent from the genome count table
    fs::write(input.join(format!("C{}", SUMMED_SUFFIX)), "").unwrap();
    fs::write(
        input.join(format!("D{}", SUMMED_SUFFIX)),
        "functional_code\ttotal_hits\nK00002\t3\n",
    )
    .unwrap();
    let counts_path = dir.path().join("kegg_stats.tsv");
    fs::write(
        &counts_path,
        "run_accession\tnum_genomes\nA\t5\nB\t2.0\nC\t1\n",
    )
    .unwrap();
    //
    let params = PipelineParams::default().with_threads(2);
    let genome_counts = read_genome_counts(&counts_path).unwrap();
    let samples = collect_sample_files(&input, &params.get_summed_suffixes()).unwrap();
    let pool = WorkerPool::new(params.get_nb_threads()).unwrap();
    let results = read_samples(&pool, &samples, None);
    let mut report = RunReport::new(samples.len());
    let tables = collect_tables(results, &mut report, |table| table);
    let matrix = normalize_tables(tables, &genome_counts, &mut report).unwrap();
    //
    let mut out = Vec::<u8>::new();
    matrix.write_tsv(&mut out, params.get_precision()).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "functional_code\tA\tB\tC\tD\n\
         K00001\t1.000000\t1.000000\t0.000000\t0.000000\n\
         K00002\t0.000000\t2.000000\t0.000000\t0.000000\n"
    );
    assert_eq!(report.affected_samples(), vec!["C", "D"]);
}
