//! Portal session: everything one browser has done on the portal.
//!
//! One hash per portal cookie records which applications the user may reach,
//! which backends authenticated them, pending second factors, captchas and
//! autologon secrets. See [`PortalField`] for the field grammar.
//!
//! Each application flag `<app_id>` is mirrored by a marker key
//! `<portal_key>_<app_id>` holding the same value. The proxy checks the
//! marker on every request instead of loading the whole hash, so the two
//! must never disagree and [`PortalSession::destroy`] must remove every
//! marker along with the hash.
//!
//! ## Application states
//!
//! ```text
//! absent/0 ──register_authentication / register_sso──▶ 1
//!     │                                                ▲
//!     └──(second factor pending)──▶ 0 ──register_doubleauthentication
//!
//! 1/0 ──deauthenticate / deauthenticate_app──▶ 0, marker deleted
//! ```

use rand::Rng;
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use portal_store::StoreClient;

use crate::config::SessionSettings;
use crate::credentials::{AUTOLOGON_PURPOSE, CredentialCipher, CredentialLabels, CredentialScope};
use crate::error::{SessionError, SessionResult};
use crate::fields::{PortalField, marker_key};
use crate::flag;
use crate::record::SessionRecord;

/// Length of generated portal keys.
pub const PORTAL_KEY_LEN: usize = 64;

/// Alphabet of captcha secrets.
pub const CAPTCHA_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of captcha secrets.
pub const CAPTCHA_LEN: usize = 6;

/// Generates a fresh portal key from the OS random source.
#[must_use]
pub fn generate_key() -> String {
    Alphanumeric.sample_string(&mut OsRng, PORTAL_KEY_LEN)
}

fn generate_captcha() -> String {
    let mut rng = OsRng;
    (0..CAPTCHA_LEN)
        .map(|_| CAPTCHA_ALPHABET[rng.gen_range(0..CAPTCHA_ALPHABET.len())] as char)
        .collect()
}

/// Result of a successful primary authentication.
#[derive(Debug, Clone, Copy)]
pub struct Authentication<'a> {
    pub app_id: &'a str,
    pub app_name: &'a str,
    pub backend_id: &'a str,
    pub backend_name: &'a str,
    /// A database-backed step still has to run before the app is granted.
    pub db_auth_required: bool,
    pub username: &'a str,
    /// Plain password, kept encrypted for autologon when present.
    pub password: Option<&'a str>,
    pub oauth2_token: Option<&'a str>,
    /// Attributes returned by the identity provider.
    pub user_infos: &'a Value,
}

/// Applications and the backend that authenticated each one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthBackends {
    /// `app_id -> backend_id`, from the `backend_<app_id>` fields.
    pub backends: BTreeMap<String, String>,
    /// `false` when the scan stopped at the page limit or on a read failure;
    /// `backends` is then a subset.
    pub complete: bool,
}

pub struct PortalSession {
    record: SessionRecord,
    settings: Arc<SessionSettings>,
    credentials: Option<Arc<dyn CredentialCipher>>,
}

impl PortalSession {
    /// Opens the portal session for `cookie`, or starts a new one under a
    /// generated key when the browser presented none.
    pub async fn open(
        store: StoreClient,
        settings: Arc<SessionSettings>,
        credentials: Option<Arc<dyn CredentialCipher>>,
        cookie: Option<&str>,
    ) -> Self {
        let key = match cookie {
            Some(c) if !c.is_empty() => c.to_string(),
            _ => generate_key(),
        };
        Self {
            record: SessionRecord::load(store, key).await,
            settings,
            credentials,
        }
    }

    /// Opens the portal session stored under `cookie`, failing with
    /// `NotFound` when it is absent or expired.
    pub async fn open_existing(
        store: StoreClient,
        settings: Arc<SessionSettings>,
        credentials: Option<Arc<dyn CredentialCipher>>,
        cookie: &str,
    ) -> SessionResult<Self> {
        if cookie.is_empty() {
            return Err(SessionError::not_found("portal", cookie));
        }
        let session = Self::open(store, settings, credentials, Some(cookie)).await;
        if session.record.is_empty() {
            return Err(SessionError::not_found("portal", cookie));
        }
        Ok(session)
    }

    pub fn key(&self) -> &str {
        self.record.key()
    }

    fn store(&self) -> &StoreClient {
        self.record.store()
    }

    /// In-memory value of `field`, as loaded or last set.
    pub fn field(&self, field: &PortalField) -> Option<&str> {
        self.record.get(&field.name())
    }

    /// `true` iff the hash currently holds at least one field.
    pub async fn exists(&self) -> bool {
        !self.store().hash_get_all(self.key()).await.is_empty()
    }

    /// Full hash as currently stored.
    pub async fn data(&self) -> HashMap<String, String> {
        self.store().hash_get_all(self.key()).await
    }

    pub async fn reload(&mut self) {
        self.record.reload().await;
    }

    // ---------------------------------------------------------------------
    // Field-level accessors
    // ---------------------------------------------------------------------

    async fn read(&self, field: &PortalField) -> Option<String> {
        self.store().hash_get(self.key(), &field.name()).await
    }

    async fn write_now(
        &mut self,
        operation: &'static str,
        field: PortalField,
        value: &str,
    ) -> SessionResult<()> {
        let name = field.name();
        self.record.set(name.clone(), value);
        if self.store().hash_set(self.key(), &name, value).await {
            Ok(())
        } else {
            Err(SessionError::write_failure(operation, self.key()))
        }
    }

    /// Pending OTP challenge key.
    pub async fn otp_key(&self) -> Option<String> {
        self.read(&PortalField::Otp).await
    }

    pub async fn set_otp_info(&mut self, otp_info: &str) -> SessionResult<()> {
        self.write_now("otp", PortalField::Otp, otp_info).await
    }

    pub async fn login(&self, backend_id: &str) -> Option<String> {
        self.read(&PortalField::login(backend_id)).await
    }

    /// Backend that authenticated `workflow_id`.
    pub async fn auth_backend(&self, workflow_id: &str) -> Option<String> {
        self.read(&PortalField::app_backend(workflow_id)).await
    }

    /// Checks the marker key, as the proxy does.
    pub async fn authenticated_app(&self, workflow_id: &str) -> bool {
        let marker = self
            .store()
            .get(&marker_key(self.key(), workflow_id))
            .await;
        flag::decode(marker.as_deref())
    }

    pub async fn authenticated_backend(&self, backend_id: &str) -> bool {
        flag::decode(self.read(&PortalField::auth_backend(backend_id)).await.as_deref())
    }

    pub async fn is_double_authenticated(&self, otp_backend_id: &str) -> bool {
        let field = PortalField::DoubleAuthenticated(otp_backend_id.to_string());
        flag::decode(self.read(&field).await.as_deref())
    }

    pub async fn oauth2_token(&self, backend_id: &str) -> Option<String> {
        self.read(&PortalField::oauth2_token(backend_id)).await
    }

    pub async fn set_oauth2_token(&mut self, backend_id: &str, token: &str) -> SessionResult<()> {
        self.write_now("oauth2 token", PortalField::oauth2_token(backend_id), token)
            .await
    }

    /// Identity-provider attributes for `backend_id`; `{}` when absent.
    pub async fn user_infos(&self, backend_id: &str) -> Value {
        let raw = self
            .read(&PortalField::UserInfos(backend_id.to_string()))
            .await;
        match raw.as_deref().map(serde_json::from_str::<Value>) {
            Some(Ok(value)) => value,
            Some(Err(e)) => {
                tracing::warn!(key = %self.key(), backend_id, error = %e, "unreadable user infos");
                Value::Object(Map::new())
            }
            None => Value::Object(Map::new()),
        }
    }

    /// Writes the attributes immediately; batched commits skip this field.
    pub async fn set_user_infos(&mut self, backend_id: &str, infos: &Value) -> SessionResult<()> {
        let encoded = if infos.is_null() {
            "{}".to_string()
        } else {
            serde_json::to_string(infos)?
        };
        self.write_now(
            "user infos",
            PortalField::UserInfos(backend_id.to_string()),
            &encoded,
        )
        .await
    }

    /// Deletes one field from the store and from the snapshot.
    pub async fn delete_field(&mut self, field: &PortalField) -> SessionResult<()> {
        let name = field.name();
        self.record.forget(&name);
        match self.store().hash_delete(self.key(), &[name]).await {
            Some(_) => Ok(()),
            None => Err(SessionError::write_failure("field deletion", self.key())),
        }
    }

    // ---------------------------------------------------------------------
    // Captcha and OTP bookkeeping
    // ---------------------------------------------------------------------

    pub async fn retrieve_captcha(&self, workflow_id: &str) -> Option<String> {
        self.read(&PortalField::Captcha(workflow_id.to_string()))
            .await
    }

    /// Issues a new captcha secret for `workflow_id` and returns it for display.
    pub async fn register_captcha(&mut self, workflow_id: &str) -> SessionResult<String> {
        let secret = generate_captcha();
        self.write_now(
            "captcha",
            PortalField::Captcha(workflow_id.to_string()),
            &secret,
        )
        .await?;
        Ok(secret)
    }

    /// Increments the retry counter of `otp_repo_id` and returns the new value.
    /// Enforcing a maximum is up to the caller.
    pub async fn increment_otp_retries(&mut self, otp_repo_id: &str) -> SessionResult<u32> {
        let field = PortalField::OtpRetries(otp_repo_id.to_string());
        let current: u32 = self
            .read(&field)
            .await
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let next = current.saturating_add(1);
        self.write_now("otp retries", field, &next.to_string())
            .await?;
        Ok(next)
    }

    // ---------------------------------------------------------------------
    // Autologon secrets
    // ---------------------------------------------------------------------

    fn cipher(&self) -> SessionResult<&Arc<dyn CredentialCipher>> {
        self.credentials
            .as_ref()
            .ok_or_else(|| SessionError::Credential("no credential cipher configured".into()))
    }

    /// Decrypts the autologon password stored for `backend_id`.
    pub async fn autologon_password(
        &self,
        app_id: &str,
        backend_id: &str,
        username: &str,
    ) -> SessionResult<Option<String>> {
        let Some(token) = self
            .read(&PortalField::Password(backend_id.to_string()))
            .await
        else {
            return Ok(None);
        };
        let scope = CredentialScope {
            app_id,
            backend_id,
            username,
            purpose: AUTOLOGON_PURPOSE,
        };
        self.cipher()?
            .decrypt(&token, &scope)
            .await
            .map(Some)
            .map_err(SessionError::Credential)
    }

    /// Encrypts `password` into the snapshot; persisted by the next commit.
    pub async fn set_autologon_password(
        &mut self,
        app_id: &str,
        app_name: &str,
        backend_id: &str,
        backend_name: &str,
        username: &str,
        password: &str,
    ) -> SessionResult<()> {
        let scope = CredentialScope {
            app_id,
            backend_id,
            username,
            purpose: AUTOLOGON_PURPOSE,
        };
        let labels = CredentialLabels {
            app_name,
            backend_name,
        };
        let token = self
            .cipher()?
            .encrypt(&scope, &labels, password)
            .await
            .map_err(SessionError::Credential)?;
        self.record
            .set(PortalField::Password(backend_id.to_string()).name(), token);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // State transitions
    // ---------------------------------------------------------------------

    /// Writes the marker key of `app_id` with its own TTL.
    async fn write_marker(&self, app_id: &str, granted: bool, timeout: u64) -> bool {
        self.store()
            .set(
                &marker_key(self.key(), app_id),
                flag::encode(granted),
                Some(timeout),
            )
            .await
    }

    async fn commit(&mut self, operation: &'static str, timeout: u64) -> SessionResult<()> {
        if self.record.commit(timeout).await {
            Ok(())
        } else {
            tracing::error!(key = %self.key(), operation, "unable to write portal session");
            Err(SessionError::write_failure(operation, self.key()))
        }
    }

    /// Binds a primary authentication to the session.
    ///
    /// The application is granted unless `db_auth_required`, in which case
    /// it stays pending. The backend is marked authenticated either way.
    pub async fn register_authentication(
        &mut self,
        auth: &Authentication<'_>,
        timeout: Option<u64>,
    ) -> SessionResult<&str> {
        let timeout = self.settings.timeout_or_default(timeout);
        let granted = !auth.db_auth_required;

        self.record
            .set(PortalField::app(auth.app_id).name(), flag::encode(granted));
        self.record.set(
            PortalField::auth_backend(auth.backend_id).name(),
            flag::encode(true),
        );
        self.record
            .set(PortalField::app_backend(auth.app_id).name(), auth.backend_id);
        self.record
            .set(PortalField::login(auth.backend_id).name(), auth.username);
        if let Some(token) = auth.oauth2_token {
            self.record
                .set(PortalField::oauth2_token(auth.backend_id).name(), token);
        }
        self.record.set(
            PortalField::AppIdOf(auth.backend_id.to_string()).name(),
            auth.app_id,
        );

        self.set_user_infos(auth.backend_id, auth.user_infos)
            .await?;

        if !self.write_marker(auth.app_id, granted, timeout).await {
            return Err(SessionError::write_failure("authentication marker", self.key()));
        }

        if let Some(password) = auth.password {
            self.set_autologon_password(
                auth.app_id,
                auth.app_name,
                auth.backend_id,
                auth.backend_name,
                auth.username,
                password,
            )
            .await?;
        }

        self.commit("authentication", timeout).await?;
        tracing::info!(
            key = %self.key(),
            app_id = auth.app_id,
            backend_id = auth.backend_id,
            pending = auth.db_auth_required,
            "registered authentication"
        );
        Ok(self.key())
    }

    /// Completes a pending second factor for `app_id`.
    ///
    /// Each field is written on its own so the steps already taken survive a
    /// failure of a later one.
    pub async fn register_doubleauthentication(
        &mut self,
        app_id: &str,
        otp_backend_id: &str,
    ) -> SessionResult<()> {
        let backend_field = PortalField::app_backend(app_id).name();
        let cached = self.record.get(&backend_field).map(str::to_string);
        let backend_id = match cached {
            Some(b) => b,
            None => self
                .store()
                .hash_get(self.key(), &backend_field)
                .await
                .ok_or_else(|| SessionError::missing_field(self.key(), backend_field.clone()))?,
        };

        let granted = flag::encode(true);
        self.write_now("double authentication", PortalField::app(app_id), granted)
            .await?;
        self.write_now(
            "double authentication",
            PortalField::auth_backend(&backend_id),
            granted,
        )
        .await?;
        self.write_now(
            "double authentication",
            PortalField::DoubleAuthenticated(otp_backend_id.to_string()),
            granted,
        )
        .await?;

        let remaining = self.store().ttl(self.key()).await.unwrap_or(-2);
        let timeout = if remaining > 0 {
            remaining as u64
        } else {
            self.settings.default_timeout
        };
        if !self.write_marker(app_id, true, timeout).await {
            return Err(SessionError::write_failure("authentication marker", self.key()));
        }

        tracing::info!(key = %self.key(), app_id, otp_backend_id, "second factor completed");
        Ok(())
    }

    /// Extends an existing authentication on `backend_id` to `app_id`.
    ///
    /// The application is granted when no OTP backend guards it, or when the
    /// guarding one is already satisfied. Otherwise it stays pending.
    pub async fn register_sso(
        &mut self,
        backend_id: &str,
        app_id: &str,
        otp_repo_id: Option<&str>,
        username: &str,
        oauth2_token: Option<&str>,
        timeout: Option<u64>,
    ) -> SessionResult<&str> {
        let timeout = self.settings.timeout_or_default(timeout);
        let otp_satisfied = match otp_repo_id {
            None => true,
            Some(otp) => self.is_double_authenticated(otp).await,
        };

        let app_field = PortalField::app(app_id).name();
        if otp_satisfied {
            self.record.set(app_field.clone(), flag::encode(true));
        } else if self.record.get(&app_field).is_none() {
            self.record.set(app_field.clone(), flag::encode(false));
        }
        let granted = flag::decode(self.record.get(&app_field));

        self.record
            .set(PortalField::auth_backend(backend_id).name(), flag::encode(true));
        self.record
            .set(PortalField::app_backend(app_id).name(), backend_id);
        self.record.set(PortalField::login(backend_id).name(), username);
        if let Some(token) = oauth2_token {
            self.record
                .set(PortalField::oauth2_token(backend_id).name(), token);
        }

        if !self.write_marker(app_id, granted, timeout).await {
            return Err(SessionError::write_failure("sso marker", self.key()));
        }
        self.commit("sso", timeout).await?;
        tracing::info!(key = %self.key(), app_id, backend_id, granted, "registered sso");
        Ok(self.key())
    }

    /// Revokes the authentication on `backend_id` along with `workflow_id`
    /// and every other application bound to that backend.
    ///
    /// Marker keys are deleted first. If any deletion fails the session is
    /// left untouched and a write failure is returned.
    pub async fn deauthenticate(
        &mut self,
        workflow_id: &str,
        backend_id: &str,
        timeout: Option<u64>,
    ) -> SessionResult<()> {
        let timeout = self.settings.timeout_or_default(timeout);

        let mut apps = self.apps_bound_to(backend_id).await;
        if !apps.iter().any(|app_id| app_id == workflow_id) {
            apps.push(workflow_id.to_string());
        }
        for app_id in &apps {
            self.revoke_marker(app_id).await?;
        }

        self.record.remove(&PortalField::LegacyOtpRetries.name());
        for app_id in &apps {
            self.record
                .set(PortalField::app(app_id).name(), flag::encode(false));
            self.record.remove(&PortalField::app_backend(app_id).name());
        }
        self.record
            .set(PortalField::auth_backend(backend_id).name(), flag::encode(false));
        self.record.remove(&PortalField::login(backend_id).name());
        self.record
            .remove(&PortalField::oauth2_token(backend_id).name());
        self.record
            .remove(&PortalField::AppIdOf(backend_id.to_string()).name());

        self.commit("deauthentication", timeout).await?;
        tracing::info!(
            key = %self.key(),
            workflow_id,
            backend_id,
            apps = apps.len(),
            "deauthenticated"
        );
        Ok(())
    }

    /// Revokes access to one application, keeping backend authentications.
    pub async fn deauthenticate_app(&mut self, app_id: &str, timeout: Option<u64>) -> SessionResult<()> {
        let timeout = self.settings.timeout_or_default(timeout);
        self.revoke_marker(app_id).await?;

        self.record
            .set(PortalField::app(app_id).name(), flag::encode(false));
        self.record
            .remove(&PortalField::app_backend(app_id).name());
        self.record
            .remove(&PortalField::AppUrl(app_id.to_string()).name());

        self.commit("app deauthentication", timeout).await
    }

    /// Applications whose `backend_<app_id>` field names `backend_id`, in the
    /// snapshot or in the stored hash.
    async fn apps_bound_to(&self, backend_id: &str) -> Vec<String> {
        let stored = self.store().hash_get_all(self.key()).await;
        let mut apps: Vec<String> = self
            .record
            .fields()
            .iter()
            .chain(stored.iter())
            .filter(|(_, value)| value.as_str() == backend_id)
            .filter_map(|(name, _)| match PortalField::parse(name) {
                PortalField::AppBackend(app_id) => Some(app_id),
                _ => None,
            })
            .collect();
        apps.sort();
        apps.dedup();
        apps
    }

    async fn revoke_marker(&self, app_id: &str) -> SessionResult<()> {
        if self.delete_marker(app_id).await {
            Ok(())
        } else {
            tracing::error!(key = %self.key(), app_id, "unable to delete authentication marker");
            Err(SessionError::write_failure("authentication marker", self.key()))
        }
    }

    async fn delete_marker(&self, suffix: &str) -> bool {
        let marker = marker_key(self.key(), suffix);
        tracing::debug!(key = %marker, "deleting session marker");
        self.store().delete(&marker).await.is_some()
    }

    /// Lists `backend_<app_id>` fields with an incremental scan.
    ///
    /// At most `max_scan_pages` round trips are made; a session with more
    /// fields than that returns a partial result flagged `complete: false`.
    pub async fn auth_backends(&self) -> AuthBackends {
        let pattern = format!("{}*", PortalField::app_backend("").name());
        let page_size = self.settings.scan_page_size;
        let mut result = AuthBackends::default();
        let mut cursor = 0;

        for _ in 0..self.settings.max_scan_pages {
            let Some(page) = self
                .store()
                .hash_scan(self.key(), cursor, &pattern, page_size)
                .await
            else {
                return result;
            };
            for (name, backend) in page.entries {
                if let PortalField::AppBackend(app_id) = PortalField::parse(&name) {
                    result.backends.insert(app_id, backend);
                }
            }
            cursor = page.cursor;
            if cursor == 0 {
                result.complete = true;
                return result;
            }
        }

        tracing::warn!(
            key = %self.key(),
            pages = self.settings.max_scan_pages,
            found = result.backends.len(),
            "backend scan stopped at page limit"
        );
        result
    }

    /// Deletes the session and every marker key derived from its fields.
    ///
    /// Markers are derived from application flags (`<app_id>`) and proxy
    /// portal flags (`portal_<x>`), whatever their value, from both the
    /// snapshot and the currently stored hash. The snapshot is cleared
    /// afterwards so a later commit cannot bring the old fields back.
    /// Returns `false` if any deletion failed.
    pub async fn destroy(&mut self) -> bool {
        let mut names: Vec<String> = self.record.fields().keys().cloned().collect();
        names.extend(self.store().hash_get_all(self.key()).await.into_keys());
        names.sort();
        names.dedup();

        let mut ok = true;
        for name in &names {
            if let Some(suffix) = PortalField::parse(name).marker_suffix() {
                ok &= self.delete_marker(&suffix).await;
            }
        }
        ok &= self.store().delete(self.key()).await.is_some();
        self.record.clear();

        if ok {
            tracing::info!(key = %self.key(), "portal session destroyed");
        } else {
            tracing::warn!(key = %self.key(), "portal session could not be fully destroyed");
        }
        ok
    }
}

impl std::fmt::Debug for PortalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalSession")
            .field("record", &self.record)
            .field("credentials", &self.credentials.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_store::{KvStore, MemoryStore};
    use serde_json::json;

    fn open_args() -> (Arc<MemoryStore>, StoreClient, Arc<SessionSettings>) {
        let memory = Arc::new(MemoryStore::new());
        let client = memory.client();
        (memory, client, Arc::new(SessionSettings::default()))
    }

    #[test]
    fn generated_keys_are_alphanumeric() {
        let key = generate_key();
        assert_eq!(key.len(), PORTAL_KEY_LEN);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(key, generate_key());
    }

    #[test]
    fn captcha_alphabet() {
        let captcha = generate_captcha();
        assert_eq!(captcha.len(), CAPTCHA_LEN);
        assert!(captcha.bytes().all(|b| CAPTCHA_ALPHABET.contains(&b)));
    }

    #[tokio::test]
    async fn empty_cookie_starts_new_session() {
        let (_, client, settings) = open_args();
        let session = PortalSession::open(client, settings, None, Some("")).await;
        assert_eq!(session.key().len(), PORTAL_KEY_LEN);
        assert!(!session.exists().await);
    }

    #[tokio::test]
    async fn captcha_round_trip() {
        let (_, client, settings) = open_args();
        let mut session = PortalSession::open(client, settings, None, Some("p1")).await;
        let secret = session.register_captcha("wf1").await.unwrap();
        assert_eq!(session.retrieve_captcha("wf1").await, Some(secret));
        assert_eq!(session.retrieve_captcha("wf2").await, None);
    }

    #[tokio::test]
    async fn otp_retries_increment_from_zero() {
        let (memory, client, settings) = open_args();
        let mut session = PortalSession::open(client, settings, None, Some("p2")).await;
        assert_eq!(session.increment_otp_retries("otp1").await.unwrap(), 1);
        assert_eq!(session.increment_otp_retries("otp1").await.unwrap(), 2);
        assert_eq!(session.increment_otp_retries("otp2").await.unwrap(), 1);
        assert_eq!(
            memory.hget("p2", "otp_retries_otp1").await.unwrap().as_deref(),
            Some("2")
        );
    }

    #[tokio::test]
    async fn user_infos_default_and_round_trip() {
        let (memory, client, settings) = open_args();
        let mut session = PortalSession::open(client, settings, None, Some("p3")).await;
        assert_eq!(session.user_infos("7").await, json!({}));

        session
            .set_user_infos("7", &json!({"mail": "alice@example.org", "groups": ["a", "b"]}))
            .await
            .unwrap();
        assert_eq!(
            session.user_infos("7").await,
            json!({"groups": ["a", "b"], "mail": "alice@example.org"})
        );

        memory.hset("p3", "user_infos_8", "not json").await.unwrap();
        assert_eq!(session.user_infos("8").await, json!({}));

        session.set_user_infos("9", &Value::Null).await.unwrap();
        assert_eq!(
            memory.hget("p3", "user_infos_9").await.unwrap().as_deref(),
            Some("{}")
        );
    }

    #[tokio::test]
    async fn otp_info_and_oauth2_token() {
        let (_, client, settings) = open_args();
        let mut session = PortalSession::open(client, settings, None, Some("p4")).await;
        session.set_otp_info("challenge-1").await.unwrap();
        assert_eq!(session.otp_key().await.as_deref(), Some("challenge-1"));

        session.set_oauth2_token("7", "tok").await.unwrap();
        assert_eq!(session.oauth2_token("7").await.as_deref(), Some("tok"));

        session
            .delete_field(&PortalField::oauth2_token("7"))
            .await
            .unwrap();
        assert_eq!(session.oauth2_token("7").await, None);
        assert_eq!(session.field(&PortalField::oauth2_token("7")), None);
    }

    #[tokio::test]
    async fn autologon_requires_cipher() {
        let (memory, client, settings) = open_args();
        memory.hset("p5", "password_7", "opaque").await.unwrap();
        let session = PortalSession::open(client, settings, None, Some("p5")).await;
        let err = session
            .autologon_password("42", "7", "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Credential(_)));
        assert_eq!(
            session.autologon_password("42", "8", "alice").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn double_authentication_without_backend_is_rejected() {
        let (_, client, settings) = open_args();
        let mut session = PortalSession::open(client, settings, None, Some("p6")).await;
        let err = session
            .register_doubleauthentication("42", "otp1")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::MissingField { .. }));
    }
}
