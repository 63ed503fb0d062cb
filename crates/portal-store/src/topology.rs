//! Replication topology: which node accepts writes.
//!
//! Every node of the cluster answers `INFO replication`. A master reports
//! `role:master`; a replica reports `role:slave` together with `master_host`
//! and `master_port`. Writes issued on a replica are redirected to that master.

use arc_swap::ArcSwapOption;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::backend::KvStore;
use crate::error::{StoreError, StoreResult};

/// Network address of a store node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddr {
    pub host: String,
    pub port: u16,
}

impl NodeAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Role of the node a client is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRole {
    /// Accepts writes.
    Master,
    /// Read-only copy of `master`. The address is absent while the replica
    /// has not been told who its master is.
    Replica { master: Option<NodeAddr> },
}

impl NodeRole {
    #[must_use]
    pub fn is_master(&self) -> bool {
        matches!(self, Self::Master)
    }

    /// Renders the role the way `INFO replication` reports it.
    #[must_use]
    pub fn to_info(&self) -> String {
        match self {
            Self::Master => "# Replication\r\nrole:master\r\nconnected_slaves:0\r\n".to_string(),
            Self::Replica { master: Some(addr) } => format!(
                "# Replication\r\nrole:slave\r\nmaster_host:{}\r\nmaster_port:{}\r\nmaster_link_status:up\r\n",
                addr.host, addr.port
            ),
            Self::Replica { master: None } => "# Replication\r\nrole:slave\r\n".to_string(),
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master => write!(f, "master"),
            Self::Replica { master: Some(addr) } => write!(f, "replica of {addr}"),
            Self::Replica { master: None } => write!(f, "replica (no master)"),
        }
    }
}

/// Parses the text of `INFO replication` (or a full `INFO`).
pub fn parse_replication_info(info: &str) -> StoreResult<NodeRole> {
    let mut role = None;
    let mut host = None;
    let mut port = None;

    for line in info.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        match name {
            "role" => role = Some(value.to_string()),
            "master_host" => host = Some(value.to_string()),
            "master_port" => {
                port = Some(value.parse::<u16>().map_err(|e| {
                    StoreError::topology(format!("invalid master_port '{value}': {e}"))
                })?)
            }
            _ => {}
        }
    }

    match role.as_deref() {
        Some(r) if r.contains("master") => Ok(NodeRole::Master),
        Some(_) => {
            let master = match (host, port) {
                (Some(host), Some(port)) => Some(NodeAddr::new(host, port)),
                _ => None,
            };
            Ok(NodeRole::Replica { master })
        }
        None => Err(StoreError::topology("INFO reply carries no role")),
    }
}

struct CachedRole {
    role: NodeRole,
    fetched_at: Instant,
}

/// Last known role of the local node, refreshed after `refresh` elapses.
pub struct TopologyCache {
    current: ArcSwapOption<CachedRole>,
    refresh: Duration,
}

impl TopologyCache {
    pub fn new(refresh: Duration) -> Self {
        Self {
            current: ArcSwapOption::empty(),
            refresh,
        }
    }

    /// Returns the role of `local`, querying it when the cached value is stale.
    pub async fn role(&self, local: &dyn KvStore) -> StoreResult<NodeRole> {
        if let Some(cached) = self.current.load_full() {
            if cached.fetched_at.elapsed() < self.refresh {
                return Ok(cached.role.clone());
            }
        }

        let info = local.info().await?;
        let role = parse_replication_info(&info)?;
        tracing::debug!(role = %role, "resolved store topology");
        self.current.store(Some(Arc::new(CachedRole {
            role: role.clone(),
            fetched_at: Instant::now(),
        })));
        Ok(role)
    }

    /// Forgets the cached role so the next write re-resolves the master.
    pub fn invalidate(&self) {
        self.current.store(None);
    }
}
