//! Sums per query hit counts into per KO totals for one sample.

use std::collections::BTreeMap;

use crate::hits::QueryHitCounts;
use crate::index::FunctionalCode;

/// KO -> total number of hits in one sample.
/// Ordered by KO so that dumps are reproducible.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SampleHitTable {
    totals: BTreeMap<FunctionalCode, u64>,
}

impl SampleHitTable {
    pub fn new() -> Self {
        SampleHitTable::default()
    }

    pub fn add(&mut self, code: FunctionalCode, nb: u64) {
        *self.totals.entry(code).or_insert(0) += nb;
    }

    /// 0 if code was never seen
    pub fn get(&self, code: &FunctionalCode) -> u64 {
        self.totals.get(code).copied().unwrap_or(0)
    }

    pub fn contains(&self, code: &FunctionalCode) -> bool {
        self.totals.contains_key(code)
    }

    /// adds counts of other into self.
    /// Integer addition so the result does not depend on how a sample was chunked nor in which
    /// order partial tables are merged.
    pub fn merge(&mut self, other: &SampleHitTable) {
        for (code, nb) in other.iter() {
            self.add(code, nb);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (FunctionalCode, u64)> + '_ {
        self.totals.iter().map(|(code, nb)| (*code, *nb))
    }

    pub fn codes(&self) -> impl Iterator<Item = &FunctionalCode> + '_ {
        self.totals.keys()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// sum over all codes
    pub fn total_hits(&self) -> u64 {
        self.totals.values().sum()
    }
} // end of impl SampleHitTable

impl FromIterator<(FunctionalCode, u64)> for SampleHitTable {
    fn from_iter<I: IntoIterator<Item = (FunctionalCode, u64)>>(iter: I) -> Self {
        let mut table = SampleHitTable::new();
        for (code, nb) in iter {
            table.add(code, nb);
        }
        table
    }
}

/// sums counts of all queries for each KO, dropping the query dimension.
pub fn aggregate(counts: &QueryHitCounts) -> SampleHitTable {
    counts.iter().map(|(_, code, nb)| (code, nb)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hits::HitRecord;

    fn ko(s: &str) -> FunctionalCode {
        FunctionalCode::parse(s).unwrap()
    }

    // (query, code) pairs as they would come out of a diamond file
    fn hits() -> Vec<(&'static str, &'static str)> {
        vec![
            ("q1", "K00001"),
            ("q1", "K00001"),
            ("q1", "K00002"),
            ("q2", "K00001"),
            ("q3", "K00003"),
            ("q3", "K00002"),
            ("q4", "K00001"),
            ("q2", "K00003"),
        ]
    }

    fn counts_of(hits: &[(&str, &str)]) -> QueryHitCounts {
        let mut counts = QueryHitCounts::new();
        for &(query_id, code) in hits {
            counts.add(
                &HitRecord {
                    query_id,
                    code: ko(code),
                },
                1,
            );
        }
        counts
    }

    #[test]
    fn sums_over_queries() {
        let table = aggregate(&counts_of(&hits()));
        assert_eq!(table.get(&ko("K00001")), 4);
        assert_eq!(table.get(&ko("K00002")), 2);
        assert_eq!(table.get(&ko("K00003")), 2);
        assert_eq!(table.get(&ko("K09999")), 0);
        assert_eq!(table.total_hits(), 8);
    }

    #[test]
    fn empty_input_gives_empty_table() {
        let table = aggregate(&QueryHitCounts::new());
        assert!(table.is_empty());
    }

    #[test]
    fn chunked_aggregation_equals_whole() {
        let all = hits();
        let whole = aggregate(&counts_of(&all));
        for split in 0..=all.len() {
            let (first, second) = all.split_at(split);
            let mut merged = aggregate(&counts_of(first));
            merged.merge(&aggregate(&counts_of(second)));
            assert_eq!(merged, whole, "split at {}", split);
            // merging in the other order gives the same table
            let mut reversed = aggregate(&counts_of(second));
            reversed.merge(&aggregate(&counts_of(first)));
            assert_eq!(reversed, whole);
        }
    }
}
