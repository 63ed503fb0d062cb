//! # portal-session
//!
//! Session records of the SSO portal, stored as hashes in the shared
//! key-value store.
//!
//! ## Session kinds
//!
//! - [`AppSession`]: one browser on one protected application, created by the
//!   proxy and flipped to authenticated by the portal
//! - [`PortalSession`]: the per-browser aggregate of authentications across
//!   applications and backends
//! - [`Oauth2Session`] / [`OpenIdSession`]: short-lived records bridging
//!   OAuth2 and OpenID Connect flows
//!
//! All of them sit on [`SessionRecord`], a snapshot of one hash that is written
//! back in a single batch and whose TTL only ever grows.
//!
//! ## Example
//!
//! ```ignore
//! use portal_session::{Authentication, SessionManager, SessionSettings};
//! use portal_store::StoreConfig;
//!
//! let sessions = SessionManager::connect(&StoreConfig::default(), SessionSettings::default()).await?;
//! let mut portal = sessions.portal(None).await;
//! portal
//!     .register_authentication(
//!         &Authentication {
//!             app_id: "42",
//!             app_name: "intranet",
//!             backend_id: "7",
//!             backend_name: "ldap",
//!             db_auth_required: false,
//!             username: "alice",
//!             password: None,
//!             oauth2_token: None,
//!             user_infos: &serde_json::json!({}),
//!         },
//!         Some(900),
//!     )
//!     .await?;
//! ```

pub mod app;
pub mod config;
pub mod credentials;
mod error;
pub mod fields;
pub mod flag;
pub mod manager;
pub mod oauth2;
pub mod openid;
pub mod portal;
pub mod record;

pub use app::AppSession;
pub use config::SessionSettings;
pub use credentials::{AUTOLOGON_PURPOSE, CredentialCipher, CredentialLabels, CredentialScope};
pub use error::{SessionError, SessionResult};
pub use fields::{AppField, PortalField, marker_key};
pub use manager::SessionManager;
pub use oauth2::{Oauth2Grant, Oauth2Session};
pub use openid::OpenIdSession;
pub use portal::{AuthBackends, Authentication, PortalSession, generate_key};
pub use record::SessionRecord;
