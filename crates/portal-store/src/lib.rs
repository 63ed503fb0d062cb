//! # portal-store
//!
//! Cluster-aware client for the key-value store that holds portal sessions.
//!
//! Every node of the cluster runs a replica of the store. Reads are served by
//! the local node; writes are routed to whichever node is currently master.
//!
//! ## Backends
//!
//! - [`RedisStore`]: `deadpool-redis` pool over the local unix socket or TCP
//! - [`MemoryStore`]: in-process engine with the same command semantics
//!
//! ## Example
//!
//! ```ignore
//! use portal_store::{StoreClient, StoreConfig};
//!
//! let client = StoreClient::connect(&StoreConfig::default()).await?;
//! client.hash_set("portal_key", "login_7", "alice").await;
//! let login = client.hash_get("portal_key", "login_7").await;
//! ```

pub mod backend;
pub mod client;
pub mod config;
mod error;
pub mod memory;
pub mod redis_store;
pub mod topology;

pub use backend::{KvStore, NodeConnector, ScanPage};
pub use client::StoreClient;
pub use config::StoreConfig;
pub use error::{ErrorCategory, StoreError, StoreResult};
pub use memory::{MemoryCluster, MemoryStore};
pub use redis_store::{RedisConnector, RedisStore};
pub use topology::{NodeAddr, NodeRole, TopologyCache, parse_replication_info};
