use std::collections::BTreeMap;

use crate::{BoundedSet, FrequencyTable, ValueType};

/// Maximum number of example keys retained per value type.
pub const MAX_EXAMPLE_KEYS: usize = 10;

/// Maximum number of example elements (collection members, hash fields) retained per value type.
pub const MAX_EXAMPLE_ELEMENTS: usize = 10;

/// Maximum number of example values (string values, hash values) retained per value type.
pub const MAX_EXAMPLE_VALUES: usize = 10;

/// Results for each bucket, keyed by bucket name.
pub type ResultsMap = BTreeMap<String, Results>;

/// What was learned about a single key.
///
/// Collections are characterized by their length and a single representative element, rather than by every element
/// they hold.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KeySample {
    /// A string value.
    String {
        /// The value.
        value: Vec<u8>,
    },

    /// A list, with its first element.
    List {
        /// Number of elements.
        length: u64,

        /// The element at index 0.
        element: Vec<u8>,
    },

    /// A set, with an arbitrary member.
    Set {
        /// Number of members.
        length: u64,

        /// A member chosen by the store.
        member: Vec<u8>,
    },

    /// A sorted set, with its lowest-ranked member.
    SortedSet {
        /// Number of members.
        length: u64,

        /// The member at rank 0.
        member: Vec<u8>,
    },

    /// A hash, with its first field and that field's value.
    Hash {
        /// Number of fields.
        length: u64,

        /// The first field name the store returned.
        field: Vec<u8>,

        /// The value of `field`.
        value: Vec<u8>,
    },
}

impl KeySample {
    /// Returns the value type this sample describes.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::String { .. } => ValueType::String,
            Self::List { .. } => ValueType::List,
            Self::Set { .. } => ValueType::Set,
            Self::SortedSet { .. } => ValueType::SortedSet,
            Self::Hash { .. } => ValueType::Hash,
        }
    }
}

/// Accumulated results for string values.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StringResults {
    /// Value lengths, in bytes.
    pub sizes: FrequencyTable,

    /// Example keys.
    pub keys: BoundedSet,

    /// Example values.
    pub values: BoundedSet,
}

impl Default for StringResults {
    fn default() -> Self {
        Self {
            sizes: FrequencyTable::new(),
            keys: BoundedSet::new(MAX_EXAMPLE_KEYS),
            values: BoundedSet::new(MAX_EXAMPLE_VALUES),
        }
    }
}

impl StringResults {
    fn observe(&mut self, key: &[u8], value: &[u8]) {
        self.sizes.record(len_of(value));
        self.keys.insert(&String::from_utf8_lossy(key));
        self.values.insert(&String::from_utf8_lossy(value));
    }

    fn merge(&mut self, other: &Self) {
        self.sizes.merge(&other.sizes);
        self.keys.union(&other.keys);
        self.values.union(&other.values);
    }

    fn trim_examples(&mut self) {
        self.keys.trim_to_cap();
        self.values.trim_to_cap();
    }
}

/// Accumulated results for lists, sets, and sorted sets.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CollectionResults {
    /// Collection lengths.
    pub sizes: FrequencyTable,

    /// Sizes of the representative elements, in bytes.
    pub element_sizes: FrequencyTable,

    /// Example keys.
    pub keys: BoundedSet,

    /// Example elements.
    pub elements: BoundedSet,
}

impl Default for CollectionResults {
    fn default() -> Self {
        Self {
            sizes: FrequencyTable::new(),
            element_sizes: FrequencyTable::new(),
            keys: BoundedSet::new(MAX_EXAMPLE_KEYS),
            elements: BoundedSet::new(MAX_EXAMPLE_ELEMENTS),
        }
    }
}

impl CollectionResults {
    fn observe(&mut self, key: &[u8], length: u64, element: &[u8]) {
        self.sizes.record(saturating_i64(length));
        self.element_sizes.record(len_of(element));
        self.keys.insert(&String::from_utf8_lossy(key));
        self.elements.insert(&String::from_utf8_lossy(element));
    }

    fn merge(&mut self, other: &Self) {
        self.sizes.merge(&other.sizes);
        self.element_sizes.merge(&other.element_sizes);
        self.keys.union(&other.keys);
        self.elements.union(&other.elements);
    }

    fn trim_examples(&mut self) {
        self.keys.trim_to_cap();
        self.elements.trim_to_cap();
    }
}

/// Accumulated results for hashes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HashResults {
    /// Number of fields per hash.
    pub sizes: FrequencyTable,

    /// Sizes of the representative field names, in bytes.
    pub field_sizes: FrequencyTable,

    /// Sizes of the representative field values, in bytes.
    pub value_sizes: FrequencyTable,

    /// Example keys.
    pub keys: BoundedSet,

    /// Example field names.
    pub fields: BoundedSet,

    /// Example field values.
    pub values: BoundedSet,
}

impl Default for HashResults {
    fn default() -> Self {
        Self {
            sizes: FrequencyTable::new(),
            field_sizes: FrequencyTable::new(),
            value_sizes: FrequencyTable::new(),
            keys: BoundedSet::new(MAX_EXAMPLE_KEYS),
            fields: BoundedSet::new(MAX_EXAMPLE_ELEMENTS),
            values: BoundedSet::new(MAX_EXAMPLE_VALUES),
        }
    }
}

impl HashResults {
    fn observe(&mut self, key: &[u8], length: u64, field: &[u8], value: &[u8]) {
        self.sizes.record(saturating_i64(length));
        self.field_sizes.record(len_of(field));
        self.value_sizes.record(len_of(value));
        self.keys.insert(&String::from_utf8_lossy(key));
        self.fields.insert(&String::from_utf8_lossy(field));
        self.values.insert(&String::from_utf8_lossy(value));
    }

    fn merge(&mut self, other: &Self) {
        self.sizes.merge(&other.sizes);
        self.field_sizes.merge(&other.field_sizes);
        self.value_sizes.merge(&other.value_sizes);
        self.keys.union(&other.keys);
        self.fields.union(&other.fields);
        self.values.union(&other.values);
    }

    fn trim_examples(&mut self) {
        self.keys.trim_to_cap();
        self.fields.trim_to_cap();
        self.values.trim_to_cap();
    }
}

/// Accumulated results for a single bucket.
///
/// Each value type gets its own frequency tables and example sets. A `Results` is owned by whichever task is
/// accumulating into its bucket; results from separate runs are only ever combined through [`merge`][Self::merge].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Results {
    key_count: u64,

    /// String results.
    pub strings: StringResults,

    /// List results.
    pub lists: CollectionResults,

    /// Set results.
    pub sets: CollectionResults,

    /// Sorted set results.
    pub sorted_sets: CollectionResults,

    /// Hash results.
    pub hashes: HashResults,
}

impl Results {
    /// Creates an empty `Results`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of keys folded into these results.
    pub fn key_count(&self) -> u64 {
        self.key_count
    }

    /// Folds a single key into these results.
    pub fn observe(&mut self, key: &[u8], sample: &KeySample) {
        self.key_count += 1;

        match sample {
            KeySample::String { value } => self.strings.observe(key, value),
            KeySample::List { length, element } => self.lists.observe(key, *length, element),
            KeySample::Set { length, member } => self.sets.observe(key, *length, member),
            KeySample::SortedSet { length, member } => self.sorted_sets.observe(key, *length, member),
            KeySample::Hash { length, field, value } => self.hashes.observe(key, *length, field, value),
        }
    }

    /// Merges `other` into these results.
    ///
    /// Frequency tables are summed entry by entry and example sets are unioned. Example sets are not trimmed back to
    /// their capacity, so merged results can hold more examples than a single run would; see
    /// [`trim_examples`][Self::trim_examples].
    pub fn merge(&mut self, other: &Results) {
        self.key_count += other.key_count;
        self.strings.merge(&other.strings);
        self.lists.merge(&other.lists);
        self.sets.merge(&other.sets);
        self.sorted_sets.merge(&other.sorted_sets);
        self.hashes.merge(&other.hashes);
    }

    /// Trims every example set back to its capacity.
    pub fn trim_examples(&mut self) {
        self.strings.trim_examples();
        self.lists.trim_examples();
        self.sets.trim_examples();
        self.sorted_sets.trim_examples();
        self.hashes.trim_examples();
    }
}

/// Merges every bucket in `other` into `totals`, inserting buckets that `totals` does not have yet.
pub fn merge_results_map(totals: &mut ResultsMap, other: ResultsMap) {
    for (bucket, results) in other {
        match totals.get_mut(&bucket) {
            Some(existing) => existing.merge(&results),
            None => {
                totals.insert(bucket, results);
            }
        }
    }
}

fn len_of(data: &[u8]) -> i64 {
    saturating_i64(data.len() as u64)
}

fn saturating_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use proptest::{collection::vec, prelude::*, proptest};

    use super::*;

    fn string(value: &str) -> KeySample {
        KeySample::String {
            value: value.as_bytes().to_vec(),
        }
    }

    fn arb_sample() -> impl Strategy<Value = (Vec<u8>, KeySample)> {
        let key = "[a-z]{1,6}".prop_map(String::into_bytes);
        let data = "[a-z]{0,12}".prop_map(String::into_bytes);
        let sample = prop_oneof![
            data.clone().prop_map(|value| KeySample::String { value }),
            (0u64..500, data.clone()).prop_map(|(length, element)| KeySample::List { length, element }),
            (0u64..500, data.clone()).prop_map(|(length, member)| KeySample::Set { length, member }),
            (0u64..500, data.clone()).prop_map(|(length, member)| KeySample::SortedSet { length, member }),
            (0u64..500, data.clone(), data).prop_map(|(length, field, value)| KeySample::Hash {
                length,
                field,
                value
            }),
        ];
        (key, sample)
    }

    fn arb_results() -> impl Strategy<Value = Results> {
        vec(arb_sample(), 0..40).prop_map(|samples| {
            let mut results = Results::new();
            for (key, sample) in &samples {
                results.observe(key, sample);
            }
            results
        })
    }

    fn merged(a: &Results, b: &Results) -> Results {
        let mut out = a.clone();
        out.merge(b);
        out
    }

    #[test]
    fn observe_each_type() {
        let mut results = Results::new();
        results.observe(b"greeting", &string("hello"));
        results.observe(
            b"queue",
            &KeySample::List {
                length: 12,
                element: b"job-1".to_vec(),
            },
        );
        results.observe(
            b"tags",
            &KeySample::Set {
                length: 3,
                member: b"red".to_vec(),
            },
        );
        results.observe(
            b"leaderboard",
            &KeySample::SortedSet {
                length: 100,
                member: b"alice".to_vec(),
            },
        );
        results.observe(
            b"user:1",
            &KeySample::Hash {
                length: 4,
                field: b"email".to_vec(),
                value: b"a@example.com".to_vec(),
            },
        );

        assert_eq!(results.key_count(), 5);

        assert_eq!(results.strings.sizes, FrequencyTable::from([(5, 1)]));
        assert!(results.strings.keys.contains("greeting"));
        assert!(results.strings.values.contains("hello"));

        assert_eq!(results.lists.sizes, FrequencyTable::from([(12, 1)]));
        assert_eq!(results.lists.element_sizes, FrequencyTable::from([(5, 1)]));
        assert!(results.lists.elements.contains("job-1"));

        assert_eq!(results.sets.sizes, FrequencyTable::from([(3, 1)]));
        assert_eq!(results.sorted_sets.sizes, FrequencyTable::from([(100, 1)]));
        assert!(results.sorted_sets.keys.contains("leaderboard"));

        assert_eq!(results.hashes.sizes, FrequencyTable::from([(4, 1)]));
        assert_eq!(results.hashes.field_sizes, FrequencyTable::from([(5, 1)]));
        assert_eq!(results.hashes.value_sizes, FrequencyTable::from([(13, 1)]));
        assert!(results.hashes.fields.contains("email"));
        assert!(results.hashes.values.contains("a@example.com"));
    }

    #[test]
    fn examples_are_capped_at_ingestion() {
        let mut results = Results::new();
        for i in 0..50 {
            results.observe(format!("key-{}", i).as_bytes(), &string(&format!("value-{}", i)));
        }

        assert_eq!(results.key_count(), 50);
        assert_eq!(results.strings.sizes.total(), 50);
        assert_eq!(results.strings.keys.len(), MAX_EXAMPLE_KEYS);
        assert_eq!(results.strings.values.len(), MAX_EXAMPLE_VALUES);
        assert!(results.strings.keys.contains("key-0"));
        assert!(!results.strings.keys.contains("key-10"));
    }

    #[test]
    fn merge_defers_trimming() {
        let mut a = Results::new();
        let mut b = Results::new();
        for i in 0..10 {
            a.observe(format!("a-{}", i).as_bytes(), &string("x"));
            b.observe(format!("b-{}", i).as_bytes(), &string("y"));
        }

        a.merge(&b);
        assert_eq!(a.key_count(), 20);
        assert_eq!(a.strings.sizes, FrequencyTable::from([(1, 20)]));
        assert_eq!(a.strings.keys.len(), 20);
        assert_eq!(a.strings.values.len(), 2);

        a.trim_examples();
        assert_eq!(a.strings.keys.len(), MAX_EXAMPLE_KEYS);
        assert_eq!(a.strings.sizes, FrequencyTable::from([(1, 20)]));
    }

    #[test]
    fn merge_is_not_idempotent() {
        let mut a = Results::new();
        a.observe(b"k", &string("v"));
        let mut b = Results::new();
        b.observe(b"j", &string("vv"));

        let once = merged(&a, &b);
        let twice = merged(&once, &b);
        assert_ne!(once, twice);
        assert_eq!(twice.key_count(), 3);

        assert_eq!(merged(&merged(&a, &Results::new()), &Results::new()), a);
    }

    #[test]
    fn merge_results_map_inserts_and_merges() {
        let mut totals = ResultsMap::new();

        let mut first = ResultsMap::new();
        first.entry("any-key".to_string()).or_default().observe(b"a", &string("1"));
        merge_results_map(&mut totals, first);

        let mut second = ResultsMap::new();
        second.entry("any-key".to_string()).or_default().observe(b"b", &string("22"));
        second.entry("other".to_string()).or_default().observe(b"c", &string("333"));
        merge_results_map(&mut totals, second);

        assert_eq!(totals.len(), 2);
        assert_eq!(totals["any-key"].key_count(), 2);
        assert_eq!(totals["other"].key_count(), 1);
    }

    #[test]
    fn key_sample_value_type() {
        assert_eq!(string("x").value_type(), ValueType::String);
        assert_eq!(
            KeySample::Hash {
                length: 1,
                field: Vec::new(),
                value: Vec::new()
            }
            .value_type(),
            ValueType::Hash
        );
    }

    proptest! {
        #[test]
        fn property_test_merge_associative(a in arb_results(), b in arb_results(), c in arb_results()) {
            prop_assert_eq!(merged(&merged(&a, &b), &c), merged(&a, &merged(&b, &c)));
        }

        #[test]
        fn property_test_merge_commutative(a in arb_results(), b in arb_results()) {
            prop_assert_eq!(merged(&a, &b), merged(&b, &a));
        }
    }
}
