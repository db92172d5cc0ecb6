//! This file contains directory exploration, sample file selection and transparent
//! gzip opening of tabular files.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use crate::error::FatalConfigError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A sample file and the sample id derived from its name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SampleFile {
    /// derived from file name, see [sample_id_from_path]
    pub sample_id: String,
    pub path: PathBuf,
}

impl SampleFile {
    pub fn new(sample_id: String, path: PathBuf) -> Self {
        SampleFile { sample_id, path }
    }

    pub fn get_sample_id(&self) -> &str {
        &self.sample_id
    }

    pub fn get_path(&self) -> &Path {
        &self.path
    }
} // end of impl SampleFile

/// opens a text file for line reading, decompressing it if it begins with the gzip magic bytes.
/// Detection does not rely on the .gz extension.
pub fn open_text_reader(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(1024 * 1024, file);
    let is_gz = {
        let head = reader.fill_buf()?;
        head.len() >= 2 && head[..2] == GZIP_MAGIC
    };
    if is_gz {
        log::debug!("opening gzipped file {:?}", path);
        Ok(Box::new(BufReader::with_capacity(
            1024 * 1024,
            MultiGzDecoder::new(reader),
        )))
    } else {
        Ok(Box::new(reader))
    }
} // end of open_text_reader

/// returns the suffix of suffixes matching the file name, if any.
/// The longest matching suffix is chosen so that ".tsv.gz" wins over ".gz".
pub fn matching_suffix<'a>(filename: &str, suffixes: &'a [String]) -> Option<&'a str> {
    suffixes
        .iter()
        .filter(|s| filename.ends_with(s.as_str()) && filename.len() > s.len())
        .max_by_key(|s| s.len())
        .map(|s| s.as_str())
}

/// sample id is file name stripped of the matching suffix.
/// ERR123_kegg_hits_summed.tsv gives ERR123 with suffix _kegg_hits_summed.tsv
pub fn sample_id_from_path(path: &Path, suffixes: &[String]) -> Option<String> {
    let filename = path.file_name()?.to_str()?;
    let suffix = matching_suffix(filename, suffixes)?;
    Some(filename[..filename.len() - suffix.len()].to_string())
}

/// scan directory (not recursively) and returns files whose name ends with one of suffixes,
/// sorted by sample id so that any processing order derived from it is reproducible.
pub fn collect_sample_files(dir: &Path, suffixes: &[String]) -> io::Result<Vec<SampleFile>> {
    let mut samples = Vec::<SampleFile>::new();
    //
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        if let Some(sample_id) = sample_id_from_path(&path, suffixes) {
            log::trace!("selected file {:?}, sample id {}", path, sample_id);
            samples.push(SampleFile::new(sample_id, path));
        }
    }
    samples.sort();
    log::info!("found {} sample files in {:?}", samples.len(), dir);
    //
    Ok(samples)
} // end of collect_sample_files

/// fails if two files give the same sample id (A.tsv and A.tsv.gz for example).
/// samples must be sorted, as returned by [collect_sample_files].
pub fn check_unique_samples(samples: &[SampleFile]) -> Result<(), FatalConfigError> {
    for pair in samples.windows(2) {
        if pair[0].get_sample_id() == pair[1].get_sample_id() {
            log::error!(
                "files {:?} and {:?} have the same sample id",
                pair[0].get_path(),
                pair[1].get_path()
            );
            return Err(FatalConfigError::DuplicateSample {
                sample: pair[0].get_sample_id().to_string(),
            });
        }
    }
    Ok(())
} // end of check_unique_samples

/// if output is an existing directory, we write default_name in it
pub fn resolve_output_path(output: &Path, default_name: &str) -> PathBuf {
    if output.is_dir() {
        output.join(default_name)
    } else {
        output.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn suffixes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sample_id_strips_longest_suffix() {
        let sfx = suffixes(&[".gz", ".tsv.gz", "_kegg_hits_summed.tsv"]);
        assert_eq!(
            sample_id_from_path(Path::new("/data/SRR12.tsv.gz"), &sfx),
            Some(String::from("SRR12"))
        );
        assert_eq!(
            sample_id_from_path(Path::new("ERR9_kegg_hits_summed.tsv"), &sfx),
            Some(String::from("ERR9"))
        );
        assert_eq!(sample_id_from_path(Path::new("notes.txt"), &sfx), None);
        // a file named exactly as the suffix has no sample id
        assert_eq!(sample_id_from_path(Path::new(".tsv.gz"), &sfx), None);
    }

    #[test]
    fn reads_plain_and_gzipped_the_same() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("a.tsv");
        let gz = dir.path().join("b.tsv.whatever");
        fs::write(&plain, "q1\tg1\nq2\tg2\n").unwrap();
        let mut enc = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        enc.write_all(b"q1\tg1\nq2\tg2\n").unwrap();
        enc.finish().unwrap();
        //
        let lines_plain: Vec<String> = open_text_reader(&plain)
            .unwrap()
            .lines()
            .map(|l| l.unwrap())
            .collect();
        let lines_gz: Vec<String> = open_text_reader(&gz)
            .unwrap()
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines_plain, vec!["q1\tg1", "q2\tg2"]);
        assert_eq!(lines_plain, lines_gz);
    }

    #[test]
    fn collects_only_matching_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["S2.tsv", "S1.tsv", "readme.md"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("sub.tsv")).unwrap();
        let found = collect_sample_files(dir.path(), &suffixes(&[".tsv"])).unwrap();
        let ids: Vec<&str> = found.iter().map(|s| s.get_sample_id()).collect();
        assert_eq!(ids, vec!["S1", "S2"]);
        assert!(check_unique_samples(&found).is_ok());
    }

    #[test]
    fn same_sample_id_from_two_files_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["A.tsv", "A.tsv.gz", "B.tsv"] {
            fs::write(dir.path().join(name), "q1\tg1\n").unwrap();
        }
        let found = collect_sample_files(dir.path(), &suffixes(&[".tsv", ".tsv.gz"])).unwrap();
        assert_eq!(found.len(), 3);
        match check_unique_samples(&found) {
            Err(FatalConfigError::DuplicateSample { sample }) => assert_eq!(sample, "A"),
            other => panic!("expected duplicate sample A, got {:?}", other),
        }
    }
}
