//! Single copy marker KOs.
//!
//! These KEGG orthologies are expected to occur once per prokaryotic genome, so the number of
//! hits on each of them estimates the number of genomes in a sample.

use std::collections::BTreeSet;
use std::io::BufRead;
use std::path::Path;

use lazy_static::lazy_static;

use crate::error::FatalConfigError;
use crate::index::FunctionalCode;
use crate::utils::files::open_text_reader;

#[rustfmt::skip]
const SINGLE_COPY_KOS: [&str; 108] = [
    "K09748", "K03687", "K00962", "K02864", "K02994", "K02996", "K03438", "K02835",
    "K02836", "K02968", "K07042", "K11749", "K02879", "K02888", "K03110", "K03531",
    "K02834", "K11753", "K03550", "K03664", "K15429", "K09710", "K08316", "K03545",
    "K02357", "K03501", "K02939", "K02990", "K02520", "K03218", "K03703", "K07447",
    "K01937", "K01872", "K02313", "K03544", "K01870", "K01869", "K01874", "K01875",
    "K04485", "K03177", "K01883", "K03595", "K01892", "K01000", "K01887", "K01876",
    "K00604", "K01889", "K01890", "K02519", "K02838", "K02495", "K03723", "K06187",
    "K03702", "K03631", "K03551", "K03655", "K02338", "K02945", "K02528", "K03075",
    "K02601", "K01756", "K03106", "K03070", "K03073", "K03076", "K02988", "K02992",
    "K02887", "K02112", "K02890", "K02470", "K02469", "K02871", "K02876", "K02895",
    "K01924", "K01925", "K02340", "K02878", "K02863", "K02886", "K00088", "K02316",
    "K03596", "K06207", "K03625", "K02600", "K03553", "K03043", "K03040", "K03685",
    "K02860", "K03046", "K02343", "K04075", "K03979", "K00942", "K03977", "K02906",
    "K02948", "K25706", "K14742", "K02926",
];

lazy_static! {
    static ref DEFAULT_PANEL: MarkerPanel = MarkerPanel::new(
        SINGLE_COPY_KOS
            .iter()
            .filter_map(|s| FunctionalCode::parse(s))
    );
}

/// A fixed set of marker codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerPanel {
    codes: BTreeSet<FunctionalCode>,
}

impl MarkerPanel {
    pub fn new<I: IntoIterator<Item = FunctionalCode>>(codes: I) -> Self {
        MarkerPanel {
            codes: codes.into_iter().collect(),
        }
    }

    /// the prokaryotic single copy KO panel
    pub fn single_copy_kegg() -> &'static MarkerPanel {
        &DEFAULT_PANEL
    }

    /// one code per line, empty lines and lines beginning with '#' are ignored.
    /// Any other line must be a valid code.
    pub fn from_file(path: &Path) -> Result<Self, FatalConfigError> {
        let to_fatal = |detail: String| FatalConfigError::MarkerPanel {
            path: path.to_path_buf(),
            detail,
        };
        let reader = open_text_reader(path).map_err(|e| to_fatal(e.to_string()))?;
        let mut codes = BTreeSet::<FunctionalCode>::new();
        for (num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| to_fatal(e.to_string()))?;
            let field = line.trim();
            if field.is_empty() || field.starts_with('#') {
                continue;
            }
            match FunctionalCode::parse(field) {
                Some(code) => {
                    codes.insert(code);
                }
                None => {
                    return Err(to_fatal(format!(
                        "line {} : {} is not a functional code",
                        num + 1,
                        field
                    )))
                }
            }
        }
        if codes.is_empty() {
            return Err(to_fatal(String::from("no marker code")));
        }
        log::info!("loaded {} marker codes from {:?}", codes.len(), path);
        Ok(MarkerPanel { codes })
    } // end of from_file

    pub fn contains(&self, code: &FunctionalCode) -> bool {
        self.codes.contains(code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionalCode> + '_ {
        self.codes.iter()
    }
} // end of impl MarkerPanel

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_panel_is_complete() {
        let panel = MarkerPanel::single_copy_kegg();
        assert_eq!(panel.len(), SINGLE_COPY_KOS.len());
        assert!(panel.contains(&FunctionalCode::parse("K02945").unwrap()));
        assert!(!panel.contains(&FunctionalCode::parse("K00001").unwrap()));
    }

    #[test]
    fn panel_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markers.txt");
        std::fs::write(&path, "# ribosomal proteins\nK02945\n\n  K02946 \nK02945\n").unwrap();
        let panel = MarkerPanel::from_file(&path).unwrap();
        assert_eq!(panel.len(), 2);
        //
        std::fs::write(&path, "K02945\nnot_a_code\n").unwrap();
        assert!(matches!(
            MarkerPanel::from_file(&path),
            Err(FatalConfigError::MarkerPanel { .. })
        ));
    }
}
