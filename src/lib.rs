//! kofeature : from diamond blastx output against KEGG to a normalized KO feature table.
//!
//! The processing goes through 4 stages :
//! - [hits] : subject ids of diamond hits are mapped to KO numbers through an
//!   [index::IdentifierIndex] built from a KEGG annotation file, and hits are counted per
//!   query and KO.
//! - [aggregate] : counts are summed per KO in each sample.
//! - [genomecount] : the number of genomes in a sample is estimated as the mean count of single
//!   copy marker KOs ([markers]).
//! - [normalize] : KO counts are divided by the genome count and gathered in a dense
//!   KO x sample table.
//!
//! Samples are processed in parallel by [pipeline].

pub mod aggregate;
pub mod error;
pub mod genomecount;
pub mod hits;
pub mod index;
pub mod markers;
pub mod normalize;
pub mod pipeline;
pub mod utils;
