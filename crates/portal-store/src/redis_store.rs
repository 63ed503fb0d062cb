//! Redis backend built on a `deadpool-redis` pool per node.

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::{Pool, Runtime};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{KvStore, NodeConnector, ScanPage};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::topology::NodeAddr;

/// One Redis node reached through a connection pool.
///
/// Each command checks a connection out of the pool and returns it when the
/// command completes or fails.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    name: String,
}

impl RedisStore {
    /// Creates a pool for `url`. No connection is opened yet.
    pub fn from_url(
        url: &str,
        name: impl Into<String>,
        pool_size: usize,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let mut redis_config = deadpool_redis::Config::from_url(url);
        let mut pool_config = deadpool_redis::PoolConfig::new(pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config.create_pool(Some(Runtime::Tokio1))?;
        Ok(Self {
            pool,
            name: name.into(),
        })
    }

    /// Creates the pool for the local node described by `config`.
    pub fn local(config: &StoreConfig) -> StoreResult<Self> {
        Self::from_url(
            &config.connection_url(),
            config.endpoint(),
            config.pool_size,
            config.timeout(),
        )
    }

    async fn conn(&self) -> StoreResult<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        match ttl_secs {
            Some(secs) => conn.set_ex::<_, _, ()>(key, value, secs).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.del(key).await?)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let secs = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        Ok(conn.expire(key, secs).await?)
    }

    async fn ttl(&self, key: &str) -> StoreResult<i64> {
        let mut conn = self.conn().await?;
        Ok(conn.ttl(key).await?)
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.hget(key, field).await?)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        conn.hset::<_, _, _, ()>(key, field, value).await?;
        Ok(())
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> StoreResult<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        Ok(conn.hdel(key, fields).await?)
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut conn = self.conn().await?;
        Ok(conn.hgetall(key).await?)
    }

    async fn hmset(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        conn.hset_multiple::<_, _, _, ()>(key, fields).await?;
        Ok(())
    }

    async fn hscan(
        &self,
        key: &str,
        cursor: u64,
        pattern: &str,
        count: Option<usize>,
    ) -> StoreResult<ScanPage> {
        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("HSCAN");
        cmd.arg(key).arg(cursor).arg("MATCH").arg(pattern);
        if let Some(count) = count {
            cmd.arg("COUNT").arg(count);
        }
        let (cursor, entries): (u64, Vec<(String, String)>) = cmd.query_async(&mut conn).await?;
        Ok(ScanPage { cursor, entries })
    }

    async fn info(&self) -> StoreResult<String> {
        let mut conn = self.conn().await?;
        let info: String = redis::cmd("INFO")
            .arg("replication")
            .query_async(&mut conn)
            .await?;
        Ok(info)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// Opens pools to remote nodes, keeping one pool per address.
pub struct RedisConnector {
    config: StoreConfig,
    pools: DashMap<NodeAddr, RedisStore>,
}

impl RedisConnector {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            pools: DashMap::new(),
        }
    }
}

#[async_trait]
impl NodeConnector for RedisConnector {
    async fn connect(&self, addr: &NodeAddr) -> StoreResult<Arc<dyn KvStore>> {
        if let Some(store) = self.pools.get(addr) {
            return Ok(Arc::new(store.clone()));
        }

        tracing::info!(node = %addr, "opening pool to store master");
        let store = RedisStore::from_url(
            &self.config.node_url(addr),
            addr.to_string(),
            self.config.pool_size,
            self.config.timeout(),
        )
        .map_err(|e| StoreError::connection(format!("master {addr}: {e}")))?;
        self.pools.insert(addr.clone(), store.clone());
        Ok(Arc::new(store))
    }
}
