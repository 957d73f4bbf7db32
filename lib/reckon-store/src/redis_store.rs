use async_trait::async_trait;
use reckon_core::StoreAddress;
use redis::{aio::MultiplexedConnection, Client, RedisResult};
use snafu::ResultExt as _;

use crate::{
    error::{Command, Connect, UnexpectedReply},
    CollectionSummary, Connector, GenericError, HashSummary, StoreConnection, StoreError,
};

trait CommandResultExt<T> {
    fn for_command(self, command: &'static str) -> Result<T, StoreError>;
}

impl<T> CommandResultExt<T> for RedisResult<T> {
    fn for_command(self, command: &'static str) -> Result<T, StoreError> {
        self.map_err(GenericError::from).context(Command { command })
    }
}

/// Connects to a store that speaks the Redis protocol.
pub struct RedisConnector {
    address: StoreAddress,
    client: Client,
}

impl RedisConnector {
    /// Creates a new `RedisConnector` for the given address.
    ///
    /// No connection is made until [`Connector::connect`] is called.
    ///
    /// # Errors
    ///
    /// If the address cannot be turned into a valid connection URL, an error is returned.
    pub fn new(address: StoreAddress) -> Result<Self, StoreError> {
        let client = Client::open(format!("redis://{}/", address))
            .map_err(GenericError::from)
            .context(Connect {
                address: address.clone(),
            })?;

        Ok(Self { address, client })
    }
}

#[async_trait]
impl Connector for RedisConnector {
    type Connection = RedisConnection;

    fn address(&self) -> &StoreAddress {
        &self.address
    }

    async fn connect(&self) -> Result<Self::Connection, StoreError> {
        let connection = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(GenericError::from)
            .context(Connect {
                address: self.address.clone(),
            })?;

        Ok(RedisConnection { connection })
    }
}

/// A connection to a store that speaks the Redis protocol.
pub struct RedisConnection {
    connection: MultiplexedConnection,
}

#[async_trait]
impl StoreConnection for RedisConnection {
    async fn ping(&mut self) -> Result<(), StoreError> {
        let reply: String = redis::cmd("PING")
            .query_async(&mut self.connection)
            .await
            .for_command("PING")?;

        if reply != "PONG" {
            return UnexpectedReply {
                command: "PING",
                reason: format!("expected PONG, got '{}'", reply),
            }
            .fail();
        }

        Ok(())
    }

    async fn keyspace_info(&mut self) -> Result<String, StoreError> {
        redis::cmd("INFO")
            .arg("keyspace")
            .query_async(&mut self.connection)
            .await
            .for_command("INFO")
    }

    async fn random_key(&mut self) -> Result<Option<Vec<u8>>, StoreError> {
        redis::cmd("RANDOMKEY")
            .query_async(&mut self.connection)
            .await
            .for_command("RANDOMKEY")
    }

    async fn key_type(&mut self, key: &[u8]) -> Result<String, StoreError> {
        redis::cmd("TYPE")
            .arg(key)
            .query_async(&mut self.connection)
            .await
            .for_command("TYPE")
    }

    async fn scan(&mut self, cursor: u64, pattern: &str) -> Result<(u64, Vec<Vec<u8>>), StoreError> {
        redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .query_async(&mut self.connection)
            .await
            .for_command("SCAN")
    }

    async fn string_value(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut self.connection)
            .await
            .for_command("GET")
    }

    async fn list_summary(&mut self, key: &[u8]) -> Result<CollectionSummary, StoreError> {
        let (length, head): (u64, Vec<Vec<u8>>) = redis::pipe()
            .cmd("LLEN")
            .arg(key)
            .cmd("LRANGE")
            .arg(key)
            .arg(0)
            .arg(0)
            .query_async(&mut self.connection)
            .await
            .for_command("LLEN/LRANGE")?;

        Ok(CollectionSummary {
            length,
            representative: head.into_iter().next(),
        })
    }

    async fn set_summary(&mut self, key: &[u8]) -> Result<CollectionSummary, StoreError> {
        let (length, representative): (u64, Option<Vec<u8>>) = redis::pipe()
            .cmd("SCARD")
            .arg(key)
            .cmd("SRANDMEMBER")
            .arg(key)
            .query_async(&mut self.connection)
            .await
            .for_command("SCARD/SRANDMEMBER")?;

        Ok(CollectionSummary { length, representative })
    }

    async fn sorted_set_summary(&mut self, key: &[u8]) -> Result<CollectionSummary, StoreError> {
        let (length, lowest): (u64, Vec<Vec<u8>>) = redis::pipe()
            .cmd("ZCARD")
            .arg(key)
            .cmd("ZRANGE")
            .arg(key)
            .arg(0)
            .arg(0)
            .query_async(&mut self.connection)
            .await
            .for_command("ZCARD/ZRANGE")?;

        Ok(CollectionSummary {
            length,
            representative: lowest.into_iter().next(),
        })
    }

    async fn hash_summary(&mut self, key: &[u8]) -> Result<HashSummary, StoreError> {
        let (length, fields): (u64, Vec<Vec<u8>>) = redis::pipe()
            .cmd("HLEN")
            .arg(key)
            .cmd("HKEYS")
            .arg(key)
            .query_async(&mut self.connection)
            .await
            .for_command("HLEN/HKEYS")?;

        let Some(field) = fields.into_iter().next() else {
            return Ok(HashSummary {
                length,
                first_field: None,
            });
        };

        let value: Option<Vec<u8>> = redis::cmd("HGET")
            .arg(key)
            .arg(&field)
            .query_async(&mut self.connection)
            .await
            .for_command("HGET")?;

        Ok(HashSummary {
            length,
            first_field: value.map(|value| (field, value)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_keeps_address() {
        let address = StoreAddress::new("127.0.0.1", 6380).unwrap();
        let connector = RedisConnector::new(address.clone()).unwrap();
        assert_eq!(connector.address(), &address);
    }

    #[test]
    fn connector_accepts_ipv6_address() {
        let address: StoreAddress = "[::1]:6379".parse().unwrap();
        assert!(RedisConnector::new(address).is_ok());
    }
}
