//! Cluster-aware store client.
//!
//! ## Read/write routing
//!
//! | command | node |
//! |---------|------|
//! | `GET`, `TTL`, `HGET`, `HGETALL`, `HSCAN` | local node |
//! | `SET`, `DEL`, `EXPIRE`, `HSET`, `HMSET`, `HDEL` | current master |
//!
//! The master is resolved from the local node's `INFO replication`. When the
//! local node is itself the master, writes stay local; otherwise a handle to
//! the master is acquired for the single command and released afterwards.
//!
//! ## Failure handling
//!
//! Reads never fail: errors are logged and reported as a miss. Writes are
//! logged and reported as `None`/`false`; callers decide whether that is fatal.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{KvStore, NodeConnector, ScanPage};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::redis_store::{RedisConnector, RedisStore};
use crate::topology::{NodeAddr, NodeRole, TopologyCache};

struct Inner {
    local: Arc<dyn KvStore>,
    connector: Arc<dyn NodeConnector>,
    topology: TopologyCache,
}

/// Handle to the shared session store. Cheap to clone.
#[derive(Clone)]
pub struct StoreClient {
    inner: Arc<Inner>,
}

/// Node a write is sent to, held for the duration of one command.
enum WriteTarget {
    Local(Arc<dyn KvStore>),
    Master {
        addr: NodeAddr,
        store: Arc<dyn KvStore>,
    },
}

impl WriteTarget {
    fn store(&self) -> Arc<dyn KvStore> {
        match self {
            Self::Local(store) | Self::Master { store, .. } => Arc::clone(store),
        }
    }
}

impl fmt::Display for WriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(store) => write!(f, "{}", store.describe()),
            Self::Master { addr, .. } => write!(f, "master {addr}"),
        }
    }
}

impl StoreClient {
    /// Assembles a client from a local node and a way to reach other nodes.
    pub fn new(
        local: Arc<dyn KvStore>,
        connector: Arc<dyn NodeConnector>,
        topology_refresh: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                local,
                connector,
                topology: TopologyCache::new(topology_refresh),
            }),
        }
    }

    /// Connects to the local Redis node described by `config`.
    ///
    /// Unlike every other operation this one fails hard: a store that cannot
    /// be reached at construction time makes the current request unusable.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let local = RedisStore::local(config)?;
        tracing::info!(node = %local.describe(), database = config.database, "connecting to session store");

        let info = local.info().await?;
        let role = crate::topology::parse_replication_info(&info)?;
        tracing::info!(role = %role, "connected to session store");

        Ok(Self::new(
            Arc::new(local),
            Arc::new(RedisConnector::new(config.clone())),
            config.topology_refresh(),
        ))
    }

    /// Resolves the role of the local node.
    pub async fn node_role(&self) -> StoreResult<NodeRole> {
        self.inner.topology.role(self.inner.local.as_ref()).await
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// `GET key`
    pub async fn get(&self, key: &str) -> Option<String> {
        soft_read("GET", key, self.inner.local.get(key).await).flatten()
    }

    /// `TTL key`
    pub async fn ttl(&self, key: &str) -> Option<i64> {
        soft_read("TTL", key, self.inner.local.ttl(key).await)
    }

    /// `HGET key field`
    pub async fn hash_get(&self, key: &str, field: &str) -> Option<String> {
        soft_read("HGET", key, self.inner.local.hget(key, field).await).flatten()
    }

    /// `HGETALL key`; empty when the key is missing or unreadable.
    pub async fn hash_get_all(&self, key: &str) -> HashMap<String, String> {
        soft_read("HGETALL", key, self.inner.local.hgetall(key).await).unwrap_or_default()
    }

    /// One `HSCAN` step.
    pub async fn hash_scan(
        &self,
        key: &str,
        cursor: u64,
        pattern: &str,
        count: Option<usize>,
    ) -> Option<ScanPage> {
        soft_read(
            "HSCAN",
            key,
            self.inner.local.hscan(key, cursor, pattern, count).await,
        )
    }

    // ---------------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------------

    /// `SET key value [EX ttl]`
    pub async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> bool {
        self.write("SET", key, |store| async move {
            store.set(key, value, ttl_secs).await
        })
        .await
        .is_some()
    }

    /// `DEL key`, returning the number of keys removed.
    pub async fn delete(&self, key: &str) -> Option<u64> {
        self.write("DEL", key, |store| async move { store.delete(key).await })
            .await
    }

    /// `EXPIRE key seconds`; `false` if the key is missing or the write failed.
    pub async fn expire(&self, key: &str, ttl_secs: u64) -> bool {
        self.write("EXPIRE", key, |store| async move {
            store.expire(key, ttl_secs).await
        })
        .await
        .unwrap_or(false)
    }

    /// `HSET key field value`
    pub async fn hash_set(&self, key: &str, field: &str, value: &str) -> bool {
        self.write("HSET", key, |store| async move {
            store.hset(key, field, value).await
        })
        .await
        .is_some()
    }

    /// `HMSET key field value ...`
    pub async fn hash_multi_set(&self, key: &str, fields: &[(String, String)]) -> bool {
        self.write("HMSET", key, |store| async move {
            store.hmset(key, fields).await
        })
        .await
        .is_some()
    }

    /// `HDEL key field ...`, returning the number of fields removed.
    pub async fn hash_delete(&self, key: &str, fields: &[String]) -> Option<u64> {
        self.write("HDEL", key, |store| async move {
            store.hdel(key, fields).await
        })
        .await
    }

    async fn write_target(&self) -> StoreResult<WriteTarget> {
        match self.node_role().await? {
            NodeRole::Master => Ok(WriteTarget::Local(Arc::clone(&self.inner.local))),
            NodeRole::Replica { master: Some(addr) } => {
                let store = self.inner.connector.connect(&addr).await?;
                Ok(WriteTarget::Master { addr, store })
            }
            NodeRole::Replica { master: None } => Err(StoreError::topology(
                "local node is a replica without a known master",
            )),
        }
    }

    /// Runs one write command on the current master.
    async fn write<T, F, Fut>(&self, op: &'static str, key: &str, command: F) -> Option<T>
    where
        F: FnOnce(Arc<dyn KvStore>) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let target = match self.write_target().await {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(op, key = %key, error = %e, "cannot resolve store master");
                self.inner.topology.invalidate();
                return None;
            }
        };

        match command(target.store()).await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(
                    op,
                    key = %key,
                    node = %target,
                    category = %e.category(),
                    error = %e,
                    "store write failed"
                );
                self.inner.topology.invalidate();
                None
            }
        }
    }
}

fn soft_read<T>(op: &'static str, key: &str, result: StoreResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) if e.is_response() => {
            tracing::debug!(op, key = %key, error = %e, "store read treated as miss");
            None
        }
        Err(e) => {
            tracing::warn!(op, key = %key, error = %e, "store read failed");
            None
        }
    }
}
