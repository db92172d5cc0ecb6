//! ko_hits run as a command : an empty diamond output still gives a dump, so a staged
//! ko_hits -> ko_genomes -> ko_normalize run keeps the sample.

use std::fs;
use std::path::Path;
use std::process::Command;

const REFERENCE: &str = "eco:b0001\tKO:K00001 thrA\neco:b0002\tKO:K00002 thrB\n";

fn ko_hits(input: &Path, reference: &Path, output: &Path, summed: bool) -> std::process::Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ko_hits"));
    cmd.arg("-i").arg(input).arg("-k").arg(reference).arg("-o").arg(output);
    if summed {
        cmd.arg("--summed");
    }
    cmd.output().unwrap()
}

#[test]
fn empty_input_gives_header_only_totals() {
    let dir = tempfile::tempdir().unwrap();
    let reference = dir.path().join("prokaryotes.dat");
    fs::write(&reference, REFERENCE).unwrap();
    let input = dir.path().join("S1.tsv");
    fs::write(&input, "").unwrap();
    let out_dir = dir.path().join("out");
    fs::create_dir(&out_dir).unwrap();
    //
    let res = ko_hits(&input, &reference, &out_dir, true);
    assert!(res.status.success());
    let dumped = out_dir.join("S1_kegg_hits_summed.tsv");
    assert_eq!(
        fs::read_to_string(dumped).unwrap(),
        "functional_code\ttotal_hits\n"
    );
}

#[test]
fn empty_input_gives_empty_per_query_file() {
    let dir = tempfile::tempdir().unwrap();
    let reference = dir.path().join("prokaryotes.dat");
    fs::write(&reference, REFERENCE).unwrap();
    let input = dir.path().join("S1.tsv");
    fs::write(&input, "").unwrap();
    let out_dir = dir.path().join("out");
    fs::create_dir(&out_dir).unwrap();
    //
    let res = ko_hits(&input, &reference, &out_dir, false);
    assert!(res.status.success());
    assert_eq!(fs::read_to_string(out_dir.join("S1_kegg_hits.tsv")).unwrap(), "");
}

#[test]
fn missing_input_is_still_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let reference = dir.path().join("prokaryotes.dat");
    fs::write(&reference, REFERENCE).unwrap();
    let res = ko_hits(
        &dir.path().join("absent.tsv"),
        &reference,
        &dir.path().join("out.tsv"),
        false,
    );
    assert!(!res.status.success());
    assert!(!dir.path().join("out.tsv").exists());
}
