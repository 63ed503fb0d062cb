//! Backend traits implemented by the Redis and in-memory engines.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::StoreResult;
use crate::topology::NodeAddr;

/// One page of an incremental hash scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor to pass to the next call; `0` once the scan is complete.
    pub cursor: u64,
    pub entries: Vec<(String, String)>,
}

/// Commands of the text-valued key-value engine, issued against one node.
///
/// Implementations report every failure; deciding which failures are soft
/// is left to [`StoreClient`](crate::StoreClient).
#[async_trait]
pub trait KvStore: Send + Sync {
    /// `GET key`
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// `SET key value [EX seconds]`
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> StoreResult<()>;

    /// `DEL key`, returning the number of keys removed.
    async fn delete(&self, key: &str) -> StoreResult<u64>;

    /// `EXPIRE key seconds`, returning `false` when the key does not exist.
    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<bool>;

    /// `TTL key`: `-2` for a missing key, `-1` for a key without expiry.
    async fn ttl(&self, key: &str) -> StoreResult<i64>;

    /// `HGET key field`
    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// `HSET key field value`
    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;

    /// `HDEL key field [field ...]`, returning the number of fields removed.
    async fn hdel(&self, key: &str, fields: &[String]) -> StoreResult<u64>;

    /// `HGETALL key`
    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// `HMSET key field value [field value ...]`
    async fn hmset(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()>;

    /// `HSCAN key cursor MATCH pattern [COUNT count]`
    async fn hscan(
        &self,
        key: &str,
        cursor: u64,
        pattern: &str,
        count: Option<usize>,
    ) -> StoreResult<ScanPage>;

    /// `INFO replication`, returned verbatim.
    async fn info(&self) -> StoreResult<String>;

    /// Human-readable node identifier for logs.
    fn describe(&self) -> String;
}

/// Opens handles to other nodes of the cluster, typically the master.
#[async_trait]
pub trait NodeConnector: Send + Sync {
    async fn connect(&self, addr: &NodeAddr) -> StoreResult<Arc<dyn KvStore>>;
}
