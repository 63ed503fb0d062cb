//! Store connection configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::topology::NodeAddr;

/// Connection parameters for the local store node.
///
/// The local node is reached through a unix socket when `socket_path` is set
/// and non-empty, otherwise over TCP. Writes on a replica are redirected to the master
/// announced by the local node, reusing `database` and `password`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Unix socket of the local node. Takes precedence over `host`/`port`;
    /// an empty string selects TCP.
    #[serde(default = "default_socket_path")]
    pub socket_path: Option<String>,
    /// TCP host of the local node when no socket is configured.
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port of the local node when no socket is configured.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database index.
    #[serde(default)]
    pub database: i64,
    /// Password (optional).
    #[serde(default)]
    pub password: Option<String>,
    /// Connection pool size per node.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Pool wait/create timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// How long a resolved node role stays valid. `0` re-resolves on every write.
    #[serde(default = "default_topology_refresh_ms")]
    pub topology_refresh_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            host: default_host(),
            port: default_port(),
            database: 0,
            password: None,
            pool_size: default_pool_size(),
            timeout_ms: default_timeout_ms(),
            topology_refresh_ms: default_topology_refresh_ms(),
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the unix socket path.
    #[must_use]
    pub fn socket_path(mut self, path: impl Into<String>) -> Self {
        self.socket_path = Some(path.into());
        self
    }

    /// Connects over TCP instead of the unix socket.
    #[must_use]
    pub fn tcp(mut self, host: impl Into<String>, port: u16) -> Self {
        self.socket_path = None;
        self.host = host.into();
        self.port = port;
        self
    }

    /// Sets the database index.
    #[must_use]
    pub const fn database(mut self, database: i64) -> Self {
        self.database = database;
        self
    }

    /// Sets the password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the topology refresh interval.
    #[must_use]
    pub const fn topology_refresh_ms(mut self, ms: u64) -> Self {
        self.topology_refresh_ms = ms;
        self
    }

    /// The unix socket to use, if any.
    #[must_use]
    pub fn unix_socket(&self) -> Option<&str> {
        self.socket_path.as_deref().filter(|p| !p.is_empty())
    }

    /// Where the local node is reached, without credentials.
    #[must_use]
    pub fn endpoint(&self) -> String {
        match self.unix_socket() {
            Some(path) => format!("unix:{path}"),
            None => format!("{}:{}", self.host, self.port),
        }
    }

    /// Builds the URL of the local node.
    #[must_use]
    pub fn connection_url(&self) -> String {
        match self.unix_socket() {
            Some(path) => {
                let mut url = format!("redis+unix://{path}?db={}", self.database);
                if let Some(password) = &self.password {
                    url.push_str(&format!("&pass={password}"));
                }
                url
            }
            None => self.tcp_url(&self.host, self.port),
        }
    }

    /// Builds the URL of a remote node, e.g. the master a replica points to.
    #[must_use]
    pub fn node_url(&self, addr: &NodeAddr) -> String {
        self.tcp_url(&addr.host, addr.port)
    }

    /// Pool timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Topology refresh interval as a `Duration`.
    #[must_use]
    pub fn topology_refresh(&self) -> Duration {
        Duration::from_millis(self.topology_refresh_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.unix_socket().is_none() && self.host.is_empty() {
            return Err("store.host is required when store.socket_path is unset".into());
        }
        if self.pool_size == 0 {
            return Err("store.pool_size must be > 0".into());
        }
        if self.database < 0 {
            return Err("store.database must be >= 0".into());
        }
        Ok(())
    }

    fn tcp_url(&self, host: &str, port: u16) -> String {
        let auth = self
            .password
            .as_ref()
            .map(|p| format!(":{p}@"))
            .unwrap_or_default();
        format!("redis://{auth}{host}:{port}/{db}", db = self.database)
    }
}

fn default_socket_path() -> Option<String> {
    Some("/var/sockets/redis/redis.sock".to_string())
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    6379
}

const fn default_pool_size() -> usize {
    8
}

const fn default_timeout_ms() -> u64 {
    2000
}

const fn default_topology_refresh_ms() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_local_socket() {
        let config = StoreConfig::default();
        assert_eq!(
            config.connection_url(),
            "redis+unix:///var/sockets/redis/redis.sock?db=0"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn tcp_and_master_urls() {
        let config = StoreConfig::new()
            .tcp("10.0.0.1", 6380)
            .database(2)
            .password("secret");
        assert_eq!(config.connection_url(), "redis://:secret@10.0.0.1:6380/2");

        let master = NodeAddr::new("10.0.0.9", 6379);
        assert_eq!(config.node_url(&master), "redis://:secret@10.0.0.9:6379/2");
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = StoreConfig::default();
        config.pool_size = 0;
        assert!(config.validate().is_err());

        let config = StoreConfig::default().tcp("", 6379);
        assert!(config.validate().is_err());

        let config = StoreConfig::default().database(-1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_socket_path_selects_tcp() {
        let config = StoreConfig::default().socket_path("");
        assert_eq!(config.unix_socket(), None);
        assert_eq!(config.connection_url(), "redis://127.0.0.1:6379/0");
        assert_eq!(config.endpoint(), "127.0.0.1:6379");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"database": 1}"#).unwrap();
        assert_eq!(config.database, 1);
        assert_eq!(config.port, 6379);
        assert_eq!(config.topology_refresh(), Duration::from_secs(1));
    }
}
