//! Store client plumbing for keyspace sampling.
//!
//! The sampling engine talks to a store through the [`StoreConnection`] trait, and obtains connections through a
//! [`ConnectionPool`] wrapping a [`Connector`]. A Redis-protocol backend is provided by [`RedisConnector`]; with the
//! `test-util` feature enabled, an in-process [`memory::MemoryStore`] is available as well.
#![deny(missing_docs)]

mod connection;
pub use self::connection::{CollectionSummary, Connector, HashSummary, StoreConnection};

mod error;
pub use self::error::{GenericError, StoreError};

mod info;
pub use self::info::parse_keyspace_key_count;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

mod pool;
pub use self::pool::{ConnectionPool, PoolConfig, PooledConnection};

mod redis_store;
pub use self::redis_store::{RedisConnection, RedisConnector};
