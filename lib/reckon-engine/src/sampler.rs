use reckon_core::{Aggregator, KeySample, ResultsMap, ValueType};
use reckon_store::StoreConnection;
use tracing::debug;

use crate::{error::Protocol, Observation, RunError};

/// Issues the follow-up requests needed to characterize `key`.
///
/// Returns `None` if the key disappeared between its type being read and the follow-up requests.
async fn sample_key<S>(connection: &mut S, key: &[u8], value_type: ValueType) -> Result<Option<KeySample>, RunError>
where
    S: StoreConnection + ?Sized,
{
    let sample = match value_type {
        ValueType::String => connection
            .string_value(key)
            .await?
            .map(|value| KeySample::String { value }),
        ValueType::List => {
            let summary = connection.list_summary(key).await?;
            summary.representative.map(|element| KeySample::List {
                length: summary.length,
                element,
            })
        }
        ValueType::Set => {
            let summary = connection.set_summary(key).await?;
            summary.representative.map(|member| KeySample::Set {
                length: summary.length,
                member,
            })
        }
        ValueType::SortedSet => {
            let summary = connection.sorted_set_summary(key).await?;
            summary.representative.map(|member| KeySample::SortedSet {
                length: summary.length,
                member,
            })
        }
        ValueType::Hash => {
            let summary = connection.hash_summary(key).await?;
            summary.first_field.map(|(field, value)| KeySample::Hash {
                length: summary.length,
                field,
                value,
            })
        }
        ValueType::Unknown => return unknown_type(key),
    };

    Ok(sample)
}

fn unknown_type<T>(key: &[u8]) -> Result<T, RunError> {
    Protocol {
        reason: format!("store reported an unrecognized type for key '{}'", String::from_utf8_lossy(key)),
    }
    .fail()
}

/// Folds observations into per-bucket results.
pub(crate) struct Sampler<'a> {
    aggregator: &'a dyn Aggregator,
    results: ResultsMap,
    examined: u64,
    vanished: u64,
}

impl<'a> Sampler<'a> {
    pub(crate) fn new(aggregator: &'a dyn Aggregator) -> Self {
        Self {
            aggregator,
            results: ResultsMap::new(),
            examined: 0,
            vanished: 0,
        }
    }

    /// Number of observations examined so far, including ones that were discarded or had vanished.
    pub(crate) fn examined(&self) -> u64 {
        self.examined
    }

    pub(crate) fn vanished(&self) -> u64 {
        self.vanished
    }

    pub(crate) fn into_results(self) -> ResultsMap {
        self.results
    }

    /// Characterizes the observed key and folds it into every bucket the aggregator assigns it to.
    ///
    /// No follow-up requests are made for keys the aggregator assigns to no bucket.
    pub(crate) async fn observe<S>(&mut self, connection: &mut S, observation: Observation) -> Result<(), RunError>
    where
        S: StoreConnection + ?Sized,
    {
        let Observation { key, value_type } = observation;
        if value_type == ValueType::Unknown {
            return unknown_type(&key);
        }
        self.examined += 1;

        let buckets = self.aggregator.groups(&key, value_type);
        if buckets.is_empty() {
            return Ok(());
        }

        match sample_key(connection, &key, value_type).await? {
            Some(sample) => {
                for bucket in buckets {
                    self.results.entry(bucket).or_default().observe(&key, &sample);
                }
            }
            None => {
                debug!(key = %String::from_utf8_lossy(&key), %value_type, "Key vanished before it could be sampled.");
                self.vanished += 1;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reckon_core::{AnyKey, ByValueType, Fanout, ANY_KEY_BUCKET};
    use reckon_store::{
        memory::{MemoryConnection, MemoryStore, MemoryValue},
        Connector as _,
    };

    use super::*;

    fn observation(key: &str, value_type: ValueType) -> Observation {
        Observation {
            key: key.as_bytes().to_vec(),
            value_type,
        }
    }

    async fn connect(store: &MemoryStore) -> MemoryConnection {
        store.connect().await.unwrap()
    }

    #[tokio::test]
    async fn samples_each_type() {
        let store = MemoryStore::new();
        store.insert("s", MemoryValue::string("hello"));
        store.insert("l", MemoryValue::list(&["first", "second"]));
        store.insert("t", MemoryValue::set(&["x", "y", "z"]));
        store.insert("z", MemoryValue::sorted_set(&["lowest"]));
        store.insert("h", MemoryValue::hash(&[("name", "alice"), ("age", "42")]));
        let mut conn = connect(&store).await;

        assert_eq!(
            sample_key(&mut conn, b"s", ValueType::String).await.unwrap(),
            Some(KeySample::String {
                value: b"hello".to_vec()
            })
        );
        assert_eq!(
            sample_key(&mut conn, b"l", ValueType::List).await.unwrap(),
            Some(KeySample::List {
                length: 2,
                element: b"first".to_vec()
            })
        );
        assert_eq!(
            sample_key(&mut conn, b"t", ValueType::Set).await.unwrap(),
            Some(KeySample::Set {
                length: 3,
                member: b"x".to_vec()
            })
        );
        assert_eq!(
            sample_key(&mut conn, b"z", ValueType::SortedSet).await.unwrap(),
            Some(KeySample::SortedSet {
                length: 1,
                member: b"lowest".to_vec()
            })
        );
        assert_eq!(
            sample_key(&mut conn, b"h", ValueType::Hash).await.unwrap(),
            Some(KeySample::Hash {
                length: 2,
                field: b"name".to_vec(),
                value: b"alice".to_vec()
            })
        );
    }

    #[tokio::test]
    async fn unknown_type_is_a_protocol_error() {
        let store = MemoryStore::new();
        let mut conn = connect(&store).await;
        let mut sampler = Sampler::new(&AnyKey);

        let result = sampler.observe(&mut conn, observation("stream", ValueType::Unknown)).await;
        assert!(matches!(result, Err(RunError::Protocol { .. })));
        assert_eq!(store.request_count(), 0);
    }

    #[tokio::test]
    async fn follow_up_failure_is_a_store_operation_error() {
        let store = MemoryStore::new();
        store.insert("s", MemoryValue::string("v"));
        store.fail_command("GET");
        let mut conn = connect(&store).await;
        let mut sampler = Sampler::new(&AnyKey);

        let result = sampler.observe(&mut conn, observation("s", ValueType::String)).await;
        assert!(matches!(result, Err(RunError::StoreOperation { .. })));
    }

    #[tokio::test]
    async fn vanished_key_is_examined_but_not_bucketed() {
        let store = MemoryStore::new();
        store.insert("gone", MemoryValue::Phantom("hash".to_string()));
        let mut conn = connect(&store).await;
        let mut sampler = Sampler::new(&AnyKey);

        sampler
            .observe(&mut conn, observation("gone", ValueType::Hash))
            .await
            .unwrap();
        assert_eq!(sampler.examined(), 1);
        assert_eq!(sampler.vanished(), 1);
        assert!(sampler.into_results().is_empty());
    }

    #[tokio::test]
    async fn discarded_keys_issue_no_follow_ups() {
        let store = MemoryStore::new();
        store.insert("s", MemoryValue::string("v"));
        let mut conn = connect(&store).await;
        let discard_all = |_: &[u8], _: ValueType| -> Vec<String> { Vec::new() };
        let mut sampler = Sampler::new(&discard_all);

        sampler.observe(&mut conn, observation("s", ValueType::String)).await.unwrap();
        assert_eq!(sampler.examined(), 1);
        assert_eq!(store.request_count(), 0);
        assert!(sampler.into_results().is_empty());
    }

    #[tokio::test]
    async fn fans_out_to_every_bucket() {
        let store = MemoryStore::new();
        store.insert("s", MemoryValue::string("value"));
        store.insert("l", MemoryValue::list(&["e"]));
        let mut conn = connect(&store).await;
        let aggregator = Fanout::new().with(AnyKey).with(ByValueType);
        let mut sampler = Sampler::new(&aggregator);

        sampler.observe(&mut conn, observation("s", ValueType::String)).await.unwrap();
        sampler.observe(&mut conn, observation("l", ValueType::List)).await.unwrap();

        let results = sampler.into_results();
        assert_eq!(results.len(), 3);
        assert_eq!(results[ANY_KEY_BUCKET].key_count(), 2);
        assert_eq!(results["string"].key_count(), 1);
        assert_eq!(results["list"].key_count(), 1);
        assert_eq!(results["list"].lists.sizes.get(1), 1);
        assert_eq!(store.command_count("GET"), 1);
    }

    #[tokio::test]
    async fn shared_aggregator() {
        let store = MemoryStore::new();
        store.insert("s", MemoryValue::string("v"));
        let mut conn = connect(&store).await;
        let aggregator: Arc<dyn Aggregator> = Arc::new(AnyKey);
        let mut sampler = Sampler::new(aggregator.as_ref());

        sampler.observe(&mut conn, observation("s", ValueType::String)).await.unwrap();
        assert_eq!(sampler.into_results()[ANY_KEY_BUCKET].key_count(), 1);
    }
}
