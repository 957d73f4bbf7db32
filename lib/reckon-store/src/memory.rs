//! An in-process store, for tests.
//!
//! [`MemoryStore`] answers the same questions as a real store, but from a map held in memory. It also keeps count of
//! the connections and commands it has served, can be told to fail specific commands, and can be made unreachable.
use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use anyhow::anyhow;
use async_trait::async_trait;
use glob::Pattern;
use rand::{rngs::StdRng, Rng as _, SeedableRng as _};
use reckon_core::StoreAddress;

use crate::{CollectionSummary, Connector, HashSummary, StoreConnection, StoreError};

const DEFAULT_SCAN_PAGE_SIZE: usize = 10;

/// A value held by a [`MemoryStore`].
#[derive(Clone, Debug)]
pub enum MemoryValue {
    /// A string.
    String(Vec<u8>),

    /// A list, in index order.
    List(Vec<Vec<u8>>),

    /// A set.
    Set(BTreeSet<Vec<u8>>),

    /// A sorted set, with members in rank order.
    SortedSet(Vec<Vec<u8>>),

    /// A hash, with fields in the order they were added.
    Hash(Vec<(Vec<u8>, Vec<u8>)>),

    /// A key that reports the given type name, but holds no data.
    ///
    /// Behaves like a key that was removed right after its type was read, or like a key of a type that is not
    /// otherwise modeled.
    Phantom(String),
}

impl MemoryValue {
    /// Creates a string value.
    pub fn string(value: &str) -> Self {
        Self::String(value.as_bytes().to_vec())
    }

    /// Creates a list value.
    pub fn list(elements: &[&str]) -> Self {
        Self::List(elements.iter().map(|e| e.as_bytes().to_vec()).collect())
    }

    /// Creates a set value.
    pub fn set(members: &[&str]) -> Self {
        Self::Set(members.iter().map(|m| m.as_bytes().to_vec()).collect())
    }

    /// Creates a sorted set value, with members given in rank order.
    pub fn sorted_set(members: &[&str]) -> Self {
        Self::SortedSet(members.iter().map(|m| m.as_bytes().to_vec()).collect())
    }

    /// Creates a hash value.
    pub fn hash(fields: &[(&str, &str)]) -> Self {
        Self::Hash(
            fields
                .iter()
                .map(|(f, v)| (f.as_bytes().to_vec(), v.as_bytes().to_vec()))
                .collect(),
        )
    }

    fn type_name(&self) -> &str {
        match self {
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::SortedSet(_) => "zset",
            Self::Hash(_) => "hash",
            Self::Phantom(type_name) => type_name,
        }
    }
}

struct State {
    keys: BTreeMap<Vec<u8>, MemoryValue>,
    rng: StdRng,
    scan_page_size: usize,
    unreachable: bool,
    failing: HashSet<&'static str>,
    connects: u64,
    commands: HashMap<&'static str, u64>,
}

impl State {
    fn record(&mut self, commands: &[&'static str]) -> Result<(), StoreError> {
        for &command in commands {
            *self.commands.entry(command).or_default() += 1;
            if self.failing.contains(&command) {
                return Err(StoreError::Command {
                    command,
                    source: anyhow!("injected failure"),
                });
            }
        }
        Ok(())
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn wrong_type(command: &'static str) -> StoreError {
    StoreError::Command {
        command,
        source: anyhow!("WRONGTYPE Operation against a key holding the wrong kind of value"),
    }
}

/// An in-process store.
///
/// Cloning a `MemoryStore` yields a handle to the same underlying data.
#[derive(Clone)]
pub struct MemoryStore {
    address: StoreAddress,
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Creates an empty `MemoryStore` at the default address.
    pub fn new() -> Self {
        Self::with_address(StoreAddress::default())
    }

    /// Creates an empty `MemoryStore` that reports the given address.
    pub fn with_address(address: StoreAddress) -> Self {
        Self {
            address,
            state: Arc::new(Mutex::new(State {
                keys: BTreeMap::new(),
                rng: StdRng::seed_from_u64(0),
                scan_page_size: DEFAULT_SCAN_PAGE_SIZE,
                unreachable: false,
                failing: HashSet::new(),
                connects: 0,
                commands: HashMap::new(),
            })),
        }
    }

    /// Sets `key` to `value`, replacing any existing value.
    pub fn insert<K: Into<Vec<u8>>>(&self, key: K, value: MemoryValue) {
        lock(&self.state).keys.insert(key.into(), value);
    }

    /// Removes `key`.
    pub fn remove(&self, key: &[u8]) {
        lock(&self.state).keys.remove(key);
    }

    /// Returns the number of keys in the store.
    pub fn len(&self) -> usize {
        lock(&self.state).keys.len()
    }

    /// Returns `true` if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sets how many keys a single `SCAN` page covers before pattern matching is applied.
    pub fn set_scan_page_size(&self, page_size: usize) {
        lock(&self.state).scan_page_size = page_size.max(1);
    }

    /// Makes the store refuse new connections and fail liveness checks.
    pub fn set_unreachable(&self, unreachable: bool) {
        lock(&self.state).unreachable = unreachable;
    }

    /// Makes every subsequent `command` fail.
    pub fn fail_command(&self, command: &'static str) {
        lock(&self.state).failing.insert(command);
    }

    /// Returns the number of connection attempts made, including failed ones.
    pub fn connect_count(&self) -> u64 {
        lock(&self.state).connects
    }

    /// Returns the number of times `command` was issued.
    pub fn command_count(&self, command: &str) -> u64 {
        lock(&self.state).commands.get(command).copied().unwrap_or(0)
    }

    /// Returns the total number of commands issued.
    pub fn request_count(&self) -> u64 {
        lock(&self.state).commands.values().sum()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MemoryStore {
    type Connection = MemoryConnection;

    fn address(&self) -> &StoreAddress {
        &self.address
    }

    async fn connect(&self) -> Result<Self::Connection, StoreError> {
        let mut state = lock(&self.state);
        state.connects += 1;
        if state.unreachable {
            return Err(StoreError::Connect {
                address: self.address.clone(),
                source: anyhow!("connection refused"),
            });
        }

        Ok(MemoryConnection {
            state: Arc::clone(&self.state),
        })
    }
}

/// A connection to a [`MemoryStore`].
pub struct MemoryConnection {
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn ping(&mut self) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        state.record(&["PING"])?;
        if state.unreachable {
            return Err(StoreError::Command {
                command: "PING",
                source: anyhow!("connection reset"),
            });
        }
        Ok(())
    }

    async fn keyspace_info(&mut self) -> Result<String, StoreError> {
        let mut state = lock(&self.state);
        state.record(&["INFO"])?;

        let mut info = String::from("# Keyspace\r\n");
        if !state.keys.is_empty() {
            info.push_str(&format!("db0:keys={},expires=0,avg_ttl=0\r\n", state.keys.len()));
        }
        Ok(info)
    }

    async fn random_key(&mut self) -> Result<Option<Vec<u8>>, StoreError> {
        let mut guard = lock(&self.state);
        guard.record(&["RANDOMKEY"])?;

        let state = &mut *guard;
        if state.keys.is_empty() {
            return Ok(None);
        }
        let index = state.rng.random_range(0..state.keys.len());
        Ok(state.keys.keys().nth(index).cloned())
    }

    async fn key_type(&mut self, key: &[u8]) -> Result<String, StoreError> {
        let mut state = lock(&self.state);
        state.record(&["TYPE"])?;

        Ok(state
            .keys
            .get(key)
            .map_or("none", MemoryValue::type_name)
            .to_string())
    }

    async fn scan(&mut self, cursor: u64, pattern: &str) -> Result<(u64, Vec<Vec<u8>>), StoreError> {
        let mut state = lock(&self.state);
        state.record(&["SCAN"])?;

        let pattern = Pattern::new(pattern).map_err(|e| StoreError::Command {
            command: "SCAN",
            source: e.into(),
        })?;

        let start = usize::try_from(cursor).unwrap_or(usize::MAX);
        let page = state
            .keys
            .keys()
            .skip(start)
            .take(state.scan_page_size)
            .cloned()
            .collect::<Vec<_>>();

        let end = start.saturating_add(page.len());
        let next_cursor = if end >= state.keys.len() { 0 } else { end as u64 };
        let matched = page
            .into_iter()
            .filter(|key| pattern.matches(&String::from_utf8_lossy(key)))
            .collect();

        Ok((next_cursor, matched))
    }

    async fn string_value(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let mut state = lock(&self.state);
        state.record(&["GET"])?;

        match state.keys.get(key) {
            Some(MemoryValue::String(value)) => Ok(Some(value.clone())),
            None | Some(MemoryValue::Phantom(_)) => Ok(None),
            Some(_) => Err(wrong_type("GET")),
        }
    }

    async fn list_summary(&mut self, key: &[u8]) -> Result<CollectionSummary, StoreError> {
        let mut state = lock(&self.state);
        state.record(&["LLEN", "LRANGE"])?;

        match state.keys.get(key) {
            Some(MemoryValue::List(elements)) => Ok(CollectionSummary {
                length: elements.len() as u64,
                representative: elements.first().cloned(),
            }),
            None | Some(MemoryValue::Phantom(_)) => Ok(CollectionSummary::default()),
            Some(_) => Err(wrong_type("LLEN")),
        }
    }

    async fn set_summary(&mut self, key: &[u8]) -> Result<CollectionSummary, StoreError> {
        let mut state = lock(&self.state);
        state.record(&["SCARD", "SRANDMEMBER"])?;

        match state.keys.get(key) {
            Some(MemoryValue::Set(members)) => Ok(CollectionSummary {
                length: members.len() as u64,
                representative: members.iter().next().cloned(),
            }),
            None | Some(MemoryValue::Phantom(_)) => Ok(CollectionSummary::default()),
            Some(_) => Err(wrong_type("SCARD")),
        }
    }

    async fn sorted_set_summary(&mut self, key: &[u8]) -> Result<CollectionSummary, StoreError> {
        let mut state = lock(&self.state);
        state.record(&["ZCARD", "ZRANGE"])?;

        match state.keys.get(key) {
            Some(MemoryValue::SortedSet(members)) => Ok(CollectionSummary {
                length: members.len() as u64,
                representative: members.first().cloned(),
            }),
            None | Some(MemoryValue::Phantom(_)) => Ok(CollectionSummary::default()),
            Some(_) => Err(wrong_type("ZCARD")),
        }
    }

    async fn hash_summary(&mut self, key: &[u8]) -> Result<HashSummary, StoreError> {
        let mut state = lock(&self.state);
        state.record(&["HLEN", "HKEYS"])?;

        let first_field = match state.keys.get(key) {
            Some(MemoryValue::Hash(fields)) => fields.first().cloned().map(|entry| (fields.len() as u64, entry)),
            None | Some(MemoryValue::Phantom(_)) => None,
            Some(_) => return Err(wrong_type("HLEN")),
        };

        match first_field {
            Some((length, entry)) => {
                state.record(&["HGET"])?;
                Ok(HashSummary {
                    length,
                    first_field: Some(entry),
                })
            }
            None => Ok(HashSummary::default()),
        }
    }
}
