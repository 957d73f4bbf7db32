use crate::ValueType;

/// Bucket name used by [`AnyKey`].
pub const ANY_KEY_BUCKET: &str = "any-key";

/// A bucketing policy.
///
/// An aggregator maps an observed key, and the type of its value, to zero or more bucket names. Results are accumulated
/// separately for every bucket, and a single key is folded into every bucket it is mapped to. Returning no buckets
/// discards the key.
///
/// Aggregators must be deterministic and free of side effects: the engine calls them once per observation, from
/// whichever task happens to be processing that observation.
///
/// Any function or closure with the signature `Fn(&[u8], ValueType) -> Vec<String>` is an aggregator.
pub trait Aggregator: Send + Sync {
    /// Returns the buckets that `key` belongs to.
    fn groups(&self, key: &[u8], value_type: ValueType) -> Vec<String>;
}

impl<F> Aggregator for F
where
    F: Fn(&[u8], ValueType) -> Vec<String> + Send + Sync,
{
    fn groups(&self, key: &[u8], value_type: ValueType) -> Vec<String> {
        self(key, value_type)
    }
}

/// Places every key into a single bucket named `any-key`.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnyKey;

impl Aggregator for AnyKey {
    fn groups(&self, _key: &[u8], _value_type: ValueType) -> Vec<String> {
        vec![ANY_KEY_BUCKET.to_string()]
    }
}

/// Buckets keys by the type of their value, using the store's name for the type (`string`, `zset`, and so on).
#[derive(Clone, Copy, Debug, Default)]
pub struct ByValueType;

impl Aggregator for ByValueType {
    fn groups(&self, _key: &[u8], value_type: ValueType) -> Vec<String> {
        vec![value_type.as_str().to_string()]
    }
}

/// Buckets keys by namespace: the portion of the key before the first occurrence of a separator.
///
/// Keys which do not contain the separator are discarded.
#[derive(Clone, Copy, Debug)]
pub struct ByNamespace {
    separator: u8,
}

impl ByNamespace {
    /// Creates a new `ByNamespace` splitting on the given separator byte.
    pub const fn new(separator: u8) -> Self {
        Self { separator }
    }
}

impl Default for ByNamespace {
    fn default() -> Self {
        Self::new(b':')
    }
}

impl Aggregator for ByNamespace {
    fn groups(&self, key: &[u8], _value_type: ValueType) -> Vec<String> {
        match key.iter().position(|b| *b == self.separator) {
            Some(idx) => vec![String::from_utf8_lossy(&key[..idx]).into_owned()],
            None => Vec::new(),
        }
    }
}

/// Buckets keys by their first character.
///
/// Empty keys are discarded.
#[derive(Clone, Copy, Debug, Default)]
pub struct ByFirstLetter;

impl Aggregator for ByFirstLetter {
    fn groups(&self, key: &[u8], _value_type: ValueType) -> Vec<String> {
        String::from_utf8_lossy(key)
            .chars()
            .next()
            .map(|c| vec![c.to_string()])
            .unwrap_or_default()
    }
}

/// Combines several aggregators, placing a key into every bucket any of them returns.
///
/// Buckets are returned in the order of the aggregators, and duplicate bucket names are removed so that a key is never
/// counted twice in the same bucket.
#[derive(Default)]
pub struct Fanout {
    aggregators: Vec<Box<dyn Aggregator>>,
}

impl Fanout {
    /// Creates an empty `Fanout`, which discards every key until an aggregator is added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an aggregator.
    pub fn with<A: Aggregator + 'static>(mut self, aggregator: A) -> Self {
        self.aggregators.push(Box::new(aggregator));
        self
    }
}

impl Aggregator for Fanout {
    fn groups(&self, key: &[u8], value_type: ValueType) -> Vec<String> {
        let mut groups = Vec::new();
        for group in self.aggregators.iter().flat_map(|a| a.groups(key, value_type)) {
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        groups
    }
}
