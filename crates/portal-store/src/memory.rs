//! In-memory engine with the command semantics of the Redis backend.
//!
//! Used by single-node deployments without a store daemon and by tests. A
//! [`MemoryCluster`] wires several nodes together so replica-to-master write
//! redirection can be exercised without a network.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::backend::{KvStore, NodeConnector, ScanPage};
use crate::client::StoreClient;
use crate::error::{StoreError, StoreResult};
use crate::topology::{NodeAddr, NodeRole};

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

/// Default number of hash fields examined per `HSCAN` call, as in Redis.
pub const DEFAULT_SCAN_PAGE: usize = 10;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(BTreeMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

/// A single in-memory node.
pub struct MemoryStore {
    name: String,
    data: DashMap<String, Entry>,
    role: ArcSwap<NodeRole>,
    available: AtomicBool,
    scan_page: usize,
}

impl MemoryStore {
    /// Creates a standalone master node.
    pub fn new() -> Self {
        Self::named("memory")
    }

    /// Creates a master node with a name used in logs.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: DashMap::new(),
            role: ArcSwap::from_pointee(NodeRole::Master),
            available: AtomicBool::new(true),
            scan_page: DEFAULT_SCAN_PAGE,
        }
    }

    /// Sets how many fields one `HSCAN` call examines when no `COUNT` is given.
    #[must_use]
    pub fn with_scan_page(mut self, page: usize) -> Self {
        self.scan_page = page.max(1);
        self
    }

    /// Changes the role this node reports through `INFO`.
    pub fn set_role(&self, role: NodeRole) {
        self.role.store(Arc::new(role));
    }

    /// Simulates the node going down (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns the live keys held by this node.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .data
            .iter()
            .filter(|e| !e.value().is_expired())
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Returns `true` if `key` is present and not expired.
    pub fn contains_key(&self, key: &str) -> bool {
        self.purge_if_expired(key);
        self.data.contains_key(key)
    }

    /// Builds a client whose writes stay on this node.
    pub fn client(self: &Arc<Self>) -> StoreClient {
        StoreClient::new(
            Arc::clone(self) as Arc<dyn KvStore>,
            Arc::new(MemoryCluster::new()),
            Duration::ZERO,
        )
    }

    fn check(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::unavailable(self.name.clone()))
        }
    }

    fn purge_if_expired(&self, key: &str) {
        let expired = self.data.get(key).is_some_and(|e| e.is_expired());
        if expired {
            self.data.remove(key);
        }
    }

    fn with_hash<T>(
        &self,
        key: &str,
        f: impl FnOnce(&BTreeMap<String, String>) -> T,
    ) -> StoreResult<Option<T>> {
        self.purge_if_expired(key);
        match self.data.get(key) {
            None => Ok(None),
            Some(entry) => match &entry.value {
                Value::Hash(map) => Ok(Some(f(map))),
                Value::Str(_) => Err(StoreError::response(WRONGTYPE)),
            },
        }
    }

    fn with_hash_mut<T>(
        &self,
        key: &str,
        create: bool,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> T,
    ) -> StoreResult<Option<T>> {
        self.purge_if_expired(key);
        if create {
            self.data.entry(key.to_string()).or_insert_with(|| Entry {
                value: Value::Hash(BTreeMap::new()),
                expires_at: None,
            });
        }
        let Some(mut entry) = self.data.get_mut(key) else {
            return Ok(None);
        };
        let (result, now_empty) = match &mut entry.value {
            Value::Hash(map) => {
                let result = f(map);
                (result, map.is_empty())
            }
            Value::Str(_) => return Err(StoreError::response(WRONGTYPE)),
        };
        drop(entry);
        if now_empty {
            self.data.remove(key);
        }
        Ok(Some(result))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check()?;
        self.purge_if_expired(key);
        match self.data.get(key) {
            None => Ok(None),
            Some(entry) => match &entry.value {
                Value::Str(s) => Ok(Some(s.clone())),
                Value::Hash(_) => Err(StoreError::response(WRONGTYPE)),
            },
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> StoreResult<()> {
        self.check()?;
        let expires_at = ttl_secs.map(|secs| Instant::now() + Duration::from_secs(secs));
        self.data.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<u64> {
        self.check()?;
        self.purge_if_expired(key);
        Ok(u64::from(self.data.remove(key).is_some()))
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<bool> {
        self.check()?;
        self.purge_if_expired(key);
        match self.data.get_mut(key) {
            Some(mut entry) => {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl_secs));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> StoreResult<i64> {
        self.check()?;
        self.purge_if_expired(key);
        Ok(match self.data.get(key) {
            None => -2,
            Some(entry) => match entry.expires_at {
                None => -1,
                Some(at) => {
                    let remaining = at.saturating_duration_since(Instant::now());
                    i64::try_from((remaining.as_millis() + 500) / 1000).unwrap_or(i64::MAX)
                }
            },
        })
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.check()?;
        Ok(self.with_hash(key, |map| map.get(field).cloned())?.flatten())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        self.check()?;
        self.with_hash_mut(key, true, |map| {
            map.insert(field.to_string(), value.to_string());
        })?;
        Ok(())
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> StoreResult<u64> {
        self.check()?;
        let removed = self.with_hash_mut(key, false, |map| {
            fields.iter().filter(|f| map.remove(f.as_str()).is_some()).count() as u64
        })?;
        Ok(removed.unwrap_or(0))
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.check()?;
        Ok(self
            .with_hash(key, |map| {
                map.iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<HashMap<_, _>>()
            })?
            .unwrap_or_default())
    }

    async fn hmset(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        self.check()?;
        if fields.is_empty() {
            return Ok(());
        }
        self.with_hash_mut(key, true, |map| {
            for (field, value) in fields {
                map.insert(field.clone(), value.clone());
            }
        })?;
        Ok(())
    }

    async fn hscan(
        &self,
        key: &str,
        cursor: u64,
        pattern: &str,
        count: Option<usize>,
    ) -> StoreResult<ScanPage> {
        self.check()?;
        let page = count.unwrap_or(self.scan_page).max(1);
        let start = usize::try_from(cursor).unwrap_or(usize::MAX);
        let scanned = self.with_hash(key, |map| {
            let total = map.len();
            let entries = map
                .iter()
                .skip(start)
                .take(page)
                .filter(|(field, _)| glob_match(pattern, field))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Vec<_>>();
            let next = start.saturating_add(page);
            let cursor = if next >= total { 0 } else { next as u64 };
            ScanPage { cursor, entries }
        })?;
        Ok(scanned.unwrap_or_default())
    }

    async fn info(&self) -> StoreResult<String> {
        self.check()?;
        Ok(self.role.load().to_info())
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// Address book of in-memory nodes, used as the [`NodeConnector`] of
/// clients attached to one of them.
#[derive(Default)]
pub struct MemoryCluster {
    nodes: DashMap<NodeAddr, Arc<MemoryStore>>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `store` under `addr`.
    pub fn add(&self, addr: NodeAddr, store: Arc<MemoryStore>) {
        self.nodes.insert(addr, store);
    }

    /// Builds a client attached to `local`, resolving masters through this cluster.
    pub fn client(self: &Arc<Self>, local: Arc<MemoryStore>, refresh: Duration) -> StoreClient {
        StoreClient::new(
            local as Arc<dyn KvStore>,
            Arc::clone(self) as Arc<dyn NodeConnector>,
            refresh,
        )
    }
}

#[async_trait]
impl NodeConnector for MemoryCluster {
    async fn connect(&self, addr: &NodeAddr) -> StoreResult<Arc<dyn KvStore>> {
        self.nodes
            .get(addr)
            .map(|node| Arc::clone(node.value()) as Arc<dyn KvStore>)
            .ok_or_else(|| StoreError::connection(format!("no route to {addr}")))
    }
}

/// Glob matching with the `*`, `?` and `[...]` forms accepted by `MATCH`.
///
/// An unterminated `[` and a trailing `\` match themselves literally.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    glob_at(&p, &t)
}

fn glob_at(p: &[char], t: &[char]) -> bool {
    match p.first() {
        None => t.is_empty(),
        Some('*') => (0..=t.len()).any(|i| glob_at(&p[1..], &t[i..])),
        Some('?') => !t.is_empty() && glob_at(&p[1..], &t[1..]),
        Some('[') => {
            let Some(close) = p.iter().position(|&c| c == ']') else {
                return !t.is_empty() && t[0] == '[' && glob_at(&p[1..], &t[1..]);
            };
            let Some(&c) = t.first() else {
                return false;
            };
            let class = &p[1..close];
            let (negate, class) = match class.first() {
                Some('^') => (true, &class[1..]),
                _ => (false, class),
            };
            let mut matched = false;
            let mut i = 0;
            while i < class.len() {
                if i + 2 < class.len() && class[i + 1] == '-' {
                    if class[i] <= c && c <= class[i + 2] {
                        matched = true;
                    }
                    i += 3;
                } else {
                    if class[i] == c {
                        matched = true;
                    }
                    i += 1;
                }
            }
            matched != negate && glob_at(&p[close + 1..], &t[1..])
        }
        Some('\\') if p.len() > 1 => !t.is_empty() && t[0] == p[1] && glob_at(&p[2..], &t[1..]),
        Some(&c) => !t.is_empty() && t[0] == c && glob_at(&p[1..], &t[1..]),
    }
}
