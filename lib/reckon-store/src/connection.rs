use async_trait::async_trait;
use reckon_core::StoreAddress;

use crate::{parse_keyspace_key_count, StoreError};

/// Length of a list, set, or sorted set, along with one representative element.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CollectionSummary {
    /// Number of elements in the collection.
    pub length: u64,

    /// A single element of the collection, if it still has any.
    pub representative: Option<Vec<u8>>,
}

/// Field count of a hash, along with its first field and that field's value.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HashSummary {
    /// Number of fields in the hash.
    pub length: u64,

    /// The first field name and its value, if the hash still has any fields.
    pub first_field: Option<(Vec<u8>, Vec<u8>)>,
}

/// A connection to a single store instance.
///
/// Each method maps to the minimal set of requests needed to answer it, and fails with [`StoreError`] if any of those
/// requests fail. Connections are used by one task at a time.
#[async_trait]
pub trait StoreConnection: Send {
    /// Checks that the connection is still usable.
    async fn ping(&mut self) -> Result<(), StoreError>;

    /// Returns the raw keyspace section of the store's `INFO` reply.
    async fn keyspace_info(&mut self) -> Result<String, StoreError>;

    /// Returns a random key, or `None` if the store is empty.
    async fn random_key(&mut self) -> Result<Option<Vec<u8>>, StoreError>;

    /// Returns the type name the store reports for `key`.
    async fn key_type(&mut self, key: &[u8]) -> Result<String, StoreError>;

    /// Fetches one page of keys matching `pattern`, starting at `cursor`.
    ///
    /// Returns the cursor to resume from and the page of keys. A returned cursor of `0` means the enumeration has
    /// completed a full pass.
    async fn scan(&mut self, cursor: u64, pattern: &str) -> Result<(u64, Vec<Vec<u8>>), StoreError>;

    /// Returns the value of the string at `key`, or `None` if the key no longer exists.
    async fn string_value(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Returns the length and first element of the list at `key`.
    async fn list_summary(&mut self, key: &[u8]) -> Result<CollectionSummary, StoreError>;

    /// Returns the cardinality and an arbitrary member of the set at `key`.
    async fn set_summary(&mut self, key: &[u8]) -> Result<CollectionSummary, StoreError>;

    /// Returns the cardinality and lowest-ranked member of the sorted set at `key`.
    async fn sorted_set_summary(&mut self, key: &[u8]) -> Result<CollectionSummary, StoreError>;

    /// Returns the field count, first field, and first field's value of the hash at `key`.
    async fn hash_summary(&mut self, key: &[u8]) -> Result<HashSummary, StoreError>;

    /// Returns the number of keys in the store, according to its keyspace info.
    ///
    /// A store with no databases listed in its keyspace info is reported as having zero keys.
    async fn key_count(&mut self) -> Result<u64, StoreError> {
        let info = self.keyspace_info().await?;
        Ok(parse_keyspace_key_count(&info).unwrap_or(0))
    }
}

/// Creates connections to a single store instance.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Type of connection produced.
    type Connection: StoreConnection + 'static;

    /// Returns the address of the store this connector connects to.
    fn address(&self) -> &StoreAddress;

    /// Opens a new connection.
    ///
    /// # Errors
    ///
    /// If the store cannot be reached, an error is returned.
    async fn connect(&self) -> Result<Self::Connection, StoreError>;
}
