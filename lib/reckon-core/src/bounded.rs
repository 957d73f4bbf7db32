use foldhash::quality::RandomState;
use indexmap::IndexSet;

/// A set of distinct example values with a soft capacity.
///
/// Values are kept in the order they were first inserted. The capacity is enforced when observing new values
/// ([`insert`][Self::insert]) but not when combining sets ([`union`][Self::union]), so a merged set may temporarily hold
/// more values than its capacity. Callers that need the capacity to hold strictly, such as report rendering, call
/// [`trim_to_cap`][Self::trim_to_cap] first.
#[derive(Clone, Debug)]
pub struct BoundedSet {
    items: IndexSet<String, RandomState>,
    cap: usize,
}

impl BoundedSet {
    /// Creates an empty `BoundedSet` with the given capacity.
    pub fn new(cap: usize) -> Self {
        Self {
            items: IndexSet::with_hasher(RandomState::default()),
            cap,
        }
    }

    /// Returns the capacity of the set.
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Returns the number of values in the set.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the set holds no values.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns `true` if the set holds more values than its capacity.
    pub fn is_over_cap(&self) -> bool {
        self.items.len() > self.cap
    }

    /// Returns `true` if the set contains `value`.
    pub fn contains(&self, value: &str) -> bool {
        self.items.contains(value)
    }

    /// Returns an iterator over the values, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.items.iter().map(String::as_str)
    }

    /// Inserts `value` if the set is below its capacity.
    ///
    /// Returns `true` if the value was inserted. Once the set is full, later values are ignored even if they have not
    /// been seen before.
    pub fn insert(&mut self, value: &str) -> bool {
        if self.items.len() >= self.cap || self.items.contains(value) {
            return false;
        }

        self.items.insert(value.to_string())
    }

    /// Adds every value in `other` to this set, without enforcing the capacity.
    pub fn union(&mut self, other: &BoundedSet) {
        self.items.extend(other.items.iter().cloned());
    }

    /// Drops values beyond the capacity, keeping the earliest inserted ones.
    pub fn trim_to_cap(&mut self) {
        self.items.truncate(self.cap);
    }
}

impl PartialEq for BoundedSet {
    fn eq(&self, other: &Self) -> bool {
        self.cap == other.cap && self.items == other.items
    }
}

impl Eq for BoundedSet {}
