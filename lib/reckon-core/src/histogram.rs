use std::collections::{btree_map, BTreeMap};

use crate::Statistics;

/// A frequency table of observed sizes.
///
/// Keys are observed sizes (string lengths, collection cardinalities, element sizes) and values are the number of
/// times each size was observed. Entries are kept ordered by size.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FrequencyTable {
    counts: BTreeMap<i64, u64>,
}

impl FrequencyTable {
    /// Creates an empty `FrequencyTable`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a single observation of `size`.
    pub fn record(&mut self, size: i64) {
        self.record_n(size, 1);
    }

    /// Records `count` observations of `size`.
    pub fn record_n(&mut self, size: i64, count: u64) {
        *self.counts.entry(size).or_default() += count;
    }

    /// Returns the number of observations of `size`.
    pub fn get(&self, size: i64) -> u64 {
        self.counts.get(&size).copied().unwrap_or(0)
    }

    /// Returns the number of distinct sizes observed.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns `true` if nothing has been observed.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Returns an iterator over `(size, count)` pairs, in ascending order of size.
    pub fn iter(&self) -> impl Iterator<Item = (i64, u64)> + '_ {
        self.counts.iter().map(|(size, count)| (*size, *count))
    }

    /// Returns the total number of observations.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Merges `other` into this table.
    ///
    /// Counts for sizes present in both tables are summed, and sizes present in only one table are carried over
    /// unchanged. Merging is associative and commutative, but not idempotent: merging the same non-empty table twice
    /// counts its observations twice.
    pub fn merge(&mut self, other: &FrequencyTable) {
        for (size, count) in other.iter() {
            self.record_n(size, count);
        }
    }

    /// Computes descriptive statistics over the observed sizes, weighted by their counts.
    pub fn statistics(&self) -> Statistics {
        Statistics::compute(self)
    }

    /// Re-buckets every size to the smallest power of two greater than or equal to it.
    ///
    /// Sizes of one or less, including zero, map to one. Counts of sizes which map to the same power of two are
    /// summed.
    pub fn power_of_two(&self) -> FrequencyTable {
        self.iter().map(|(size, count)| (next_power_of_two(size), count)).collect()
    }

    /// Removes entries whose share of the total is at or below `threshold`, returning the total of the table as it was
    /// before any entries were removed.
    ///
    /// `threshold` is a fraction, so `0.01` removes entries that account for 1% of observations or less. This is meant
    /// to be applied to a copy at report time rather than to accumulated results.
    pub fn trim_and_sum(&mut self, threshold: f64) -> u64 {
        let total = self.total();
        if total == 0 {
            return 0;
        }

        let total_f = total as f64;
        self.counts.retain(|_, count| (*count as f64 / total_f) > threshold);
        total
    }
}

fn next_power_of_two(size: i64) -> i64 {
    if size <= 1 {
        return 1;
    }

    (size as u64)
        .checked_next_power_of_two()
        .and_then(|p| i64::try_from(p).ok())
        .unwrap_or(i64::MAX)
}

impl FromIterator<(i64, u64)> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = (i64, u64)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (size, count) in iter {
            table.record_n(size, count);
        }
        table
    }
}

impl<const N: usize> From<[(i64, u64); N]> for FrequencyTable {
    fn from(entries: [(i64, u64); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a FrequencyTable {
    type Item = (&'a i64, &'a u64);
    type IntoIter = btree_map::Iter<'a, i64, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.counts.iter()
    }
}

#[cfg(test)]
mod tests {
    use proptest::{collection::btree_map, prelude::*, proptest};

    use super::*;

    fn arb_table() -> impl Strategy<Value = FrequencyTable> {
        btree_map(-100i64..10_000, 1u64..1_000, 0..16).prop_map(|m| m.into_iter().collect())
    }

    fn merged(a: &FrequencyTable, b: &FrequencyTable) -> FrequencyTable {
        let mut out = a.clone();
        out.merge(b);
        out
    }

    #[test]
    fn record_and_total() {
        let mut table = FrequencyTable::new();
        assert!(table.is_empty());
        assert_eq!(table.total(), 0);

        table.record(3);
        table.record(3);
        table.record(17);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(3), 2);
        assert_eq!(table.get(17), 1);
        assert_eq!(table.get(4), 0);
        assert_eq!(table.total(), 3);
    }

    #[test]
    fn merge_carries_disjoint_sizes() {
        let mut a = FrequencyTable::from([(1, 2), (5, 1)]);
        let b = FrequencyTable::from([(5, 4), (9, 1)]);
        a.merge(&b);

        assert_eq!(a, FrequencyTable::from([(1, 2), (5, 5), (9, 1)]));
    }

    #[test]
    fn merge_is_not_idempotent() {
        let a = FrequencyTable::from([(1, 2), (5, 1)]);
        let b = FrequencyTable::from([(5, 4)]);

        let once = merged(&a, &b);
        let twice = merged(&once, &b);
        assert_ne!(once, twice);
        assert_eq!(twice.get(5), 9);

        // Merging an empty table is the only case where repeated merging changes nothing.
        let empty = FrequencyTable::new();
        let once = merged(&a, &empty);
        let twice = merged(&once, &empty);
        assert_eq!(once, a);
        assert_eq!(twice, a);
    }

    #[test]
    fn power_of_two() {
        let table = FrequencyTable::from([(3, 2), (4, 1)]);
        assert_eq!(table.power_of_two(), FrequencyTable::from([(4, 3)]));

        let table = FrequencyTable::from([(0, 1), (1, 2), (2, 3), (5, 1), (1000, 7)]);
        assert_eq!(
            table.power_of_two(),
            FrequencyTable::from([(1, 3), (2, 3), (8, 1), (1024, 7)])
        );

        let table = FrequencyTable::from([(-7, 1), (i64::MAX, 1)]);
        assert_eq!(table.power_of_two(), FrequencyTable::from([(1, 1), (i64::MAX, 1)]));
    }

    #[test]
    fn trim_and_sum_returns_original_total() {
        let mut table = FrequencyTable::from([(1, 1), (2, 50), (3, 49)]);
        assert_eq!(table.trim_and_sum(0.01), 100);
        assert_eq!(table, FrequencyTable::from([(2, 50), (3, 49)]));

        let mut empty = FrequencyTable::new();
        assert_eq!(empty.trim_and_sum(0.01), 0);
        assert!(empty.is_empty());
    }

    proptest! {
        #[test]
        fn property_test_merge_associative(a in arb_table(), b in arb_table(), c in arb_table()) {
            prop_assert_eq!(merged(&merged(&a, &b), &c), merged(&a, &merged(&b, &c)));
        }

        #[test]
        fn property_test_merge_commutative(a in arb_table(), b in arb_table()) {
            prop_assert_eq!(merged(&a, &b), merged(&b, &a));
        }

        #[test]
        fn property_test_merge_sums_totals(a in arb_table(), b in arb_table()) {
            prop_assert_eq!(merged(&a, &b).total(), a.total() + b.total());
        }

        #[test]
        fn property_test_power_of_two_preserves_total(a in arb_table()) {
            let p = a.power_of_two();
            prop_assert_eq!(p.total(), a.total());
            for (size, _) in p.iter() {
                prop_assert!(size >= 1 && (size as u64).is_power_of_two());
            }
        }
    }
}
