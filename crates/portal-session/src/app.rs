//! Application session: one browser on one backend application.
//!
//! The proxy creates the hash with `authenticated=0` under the application
//! cookie and redirects to the portal. Once the user logs in, the portal flips
//! it to `authenticated=1`; from then on the proxy lets requests through
//! without consulting the portal.

use sha2::{Digest, Sha256};
use std::sync::Arc;

use portal_store::StoreClient;

use crate::config::SessionSettings;
use crate::error::{SessionError, SessionResult};
use crate::fields::AppField;
use crate::flag;
use crate::record::SessionRecord;

#[derive(Debug, Clone)]
pub struct AppSession {
    record: SessionRecord,
    settings: Arc<SessionSettings>,
}

impl AppSession {
    /// Opens the session stored under the application cookie.
    ///
    /// The hash must carry a canonical `authenticated` flag. A missing,
    /// expired or half-written record is deleted and reported as `NotFound`.
    pub async fn open(
        store: StoreClient,
        settings: Arc<SessionSettings>,
        cookie: &str,
    ) -> SessionResult<Self> {
        if cookie.is_empty() {
            return Err(SessionError::not_found("app", cookie));
        }

        let record = SessionRecord::load(store.clone(), cookie).await;
        let valid = record
            .get(AppField::Authenticated.as_str())
            .is_some_and(flag::is_canonical);
        if !valid {
            tracing::info!(key = %cookie, "discarding invalid application session");
            store.delete(cookie).await;
            return Err(SessionError::not_found("app", cookie));
        }

        Ok(Self { record, settings })
    }

    pub fn key(&self) -> &str {
        self.record.key()
    }

    pub fn login(&self) -> Option<&str> {
        self.record.get(AppField::Login.as_str())
    }

    pub fn application_id(&self) -> Option<&str> {
        self.record.get(AppField::ApplicationId.as_str())
    }

    pub fn headers(&self) -> Option<&str> {
        self.record.get(AppField::Headers.as_str())
    }

    pub fn krb5_ccname(&self) -> Option<&str> {
        self.record.get(AppField::Krb5CcName.as_str())
    }

    pub fn krb5_service(&self) -> Option<&str> {
        self.record.get(AppField::Krb5Service.as_str())
    }

    /// Reads the current flag from the store, not from the snapshot.
    pub async fn is_authenticated(&self) -> bool {
        let value = self
            .record
            .store()
            .hash_get(self.key(), AppField::Authenticated.as_str())
            .await;
        flag::decode(value.as_deref())
    }

    /// Current OTP retry count, if one was recorded.
    pub async fn otp_retries(&self) -> Option<u32> {
        self.record
            .store()
            .hash_get(self.key(), AppField::OtpRetries.as_str())
            .await
            .and_then(|v| v.parse().ok())
    }

    /// Clears `authenticated` and the OTP retry counter, field by field.
    pub async fn deauthenticate(&mut self) -> SessionResult<()> {
        let key = self.key().to_string();
        let store = self.record.store().clone();

        let cleared = flag::encode(false);
        self.record.set(AppField::Authenticated.as_str(), cleared);
        if !store
            .hash_set(&key, AppField::Authenticated.as_str(), cleared)
            .await
        {
            return Err(SessionError::write_failure("app deauthentication", key));
        }

        self.record.forget(AppField::OtpRetries.as_str());
        if store
            .hash_delete(&key, &[AppField::OtpRetries.as_str().to_string()])
            .await
            .is_none()
        {
            return Err(SessionError::write_failure("app deauthentication", key));
        }
        Ok(())
    }

    /// Stores the header-injection text the proxy adds to upstream requests.
    pub async fn set_headers(&mut self, headers: &str) -> SessionResult<()> {
        self.record.set(AppField::Headers.as_str(), headers);
        if self
            .record
            .store()
            .hash_set(self.key(), AppField::Headers.as_str(), headers)
            .await
        {
            Ok(())
        } else {
            Err(SessionError::write_failure("headers", self.key()))
        }
    }

    /// Records the Kerberos cache and service principal the proxy delegates with.
    pub async fn set_kerberos_info(
        &mut self,
        username: &str,
        service: &str,
        backend_id: &str,
    ) -> SessionResult<()> {
        let ccname = krb5_ccname(&self.settings.krb5_cache_dir, backend_id, username);
        self.record.set(AppField::Login.as_str(), username);
        self.record.set(AppField::Krb5CcName.as_str(), ccname);
        self.record
            .set(AppField::Krb5Service.as_str(), format!("HTTP@{service}"));

        let fields: Vec<(String, String)> = self
            .record
            .fields()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if self.record.store().hash_multi_set(self.key(), &fields).await {
            Ok(())
        } else {
            Err(SessionError::write_failure("kerberos info", self.key()))
        }
    }

    /// Marks the session authenticated for `username` on `app_id`.
    pub async fn register_authentication(
        &mut self,
        app_id: &str,
        username: &str,
        timeout: u64,
    ) -> SessionResult<&str> {
        self.record
            .set(AppField::Authenticated.as_str(), flag::encode(true));
        self.record.set(AppField::Login.as_str(), username);
        self.record.set(AppField::ApplicationId.as_str(), app_id);
        self.record.set(AppField::OtpRetries.as_str(), "0");

        if !self.record.commit(timeout).await {
            tracing::error!(key = %self.key(), app_id, "unable to register application authentication");
            return Err(SessionError::write_failure(
                "app authentication",
                self.key(),
            ));
        }
        tracing::debug!(key = %self.key(), app_id, "application session authenticated");
        Ok(self.key())
    }

    /// Deletes the session key.
    pub async fn destroy(&self) -> bool {
        self.record.store().delete(self.key()).await.is_some()
    }
}

/// `FILE:<dir>/krb5cc_<sha256(backend_id + username)>`
fn krb5_ccname(dir: &str, backend_id: &str, username: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(backend_id.as_bytes());
    hasher.update(username.as_bytes());
    format!(
        "FILE:{}/krb5cc_{}",
        dir.trim_end_matches('/'),
        hex::encode(hasher.finalize())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_store::{KvStore, MemoryStore};

    async fn proxy_created(memory: &MemoryStore, cookie: &str) {
        memory
            .hmset(cookie, &[("authenticated".into(), "0".into())])
            .await
            .unwrap();
    }

    fn settings() -> Arc<SessionSettings> {
        Arc::new(SessionSettings::default())
    }

    #[tokio::test]
    async fn missing_session_is_not_found_and_purged() {
        let memory = Arc::new(MemoryStore::new());
        memory
            .hmset("stale", &[("login".into(), "bob".into())])
            .await
            .unwrap();

        let err = AppSession::open(memory.client(), settings(), "stale")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!memory.contains_key("stale"));

        let err = AppSession::open(memory.client(), settings(), "nothing")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn register_authentication_flips_flag() {
        let memory = Arc::new(MemoryStore::new());
        proxy_created(&memory, "cookie1").await;

        let mut session = AppSession::open(memory.client(), settings(), "cookie1")
            .await
            .unwrap();
        assert!(!session.is_authenticated().await);

        let key = session
            .register_authentication("42", "alice", 900)
            .await
            .unwrap()
            .to_string();
        assert_eq!(key, "cookie1");
        assert!(session.is_authenticated().await);
        assert_eq!(session.otp_retries().await, Some(0));
        assert_eq!(memory.ttl("cookie1").await.unwrap(), 900);

        let reopened = AppSession::open(memory.client(), settings(), "cookie1")
            .await
            .unwrap();
        assert_eq!(reopened.login(), Some("alice"));
        assert_eq!(reopened.application_id(), Some("42"));
    }

    #[tokio::test]
    async fn register_authentication_fails_loudly() {
        let memory = Arc::new(MemoryStore::new());
        proxy_created(&memory, "cookie2").await;
        let mut session = AppSession::open(memory.client(), settings(), "cookie2")
            .await
            .unwrap();

        memory.set_available(false);
        let err = session
            .register_authentication("42", "alice", 900)
            .await
            .unwrap_err();
        assert!(err.is_write_failure());
    }

    #[tokio::test]
    async fn deauthenticate_clears_flag_and_retries() {
        let memory = Arc::new(MemoryStore::new());
        proxy_created(&memory, "cookie3").await;
        let mut session = AppSession::open(memory.client(), settings(), "cookie3")
            .await
            .unwrap();
        session
            .register_authentication("42", "alice", 900)
            .await
            .unwrap();

        session.deauthenticate().await.unwrap();
        assert!(!session.is_authenticated().await);
        assert_eq!(session.otp_retries().await, None);
        assert_eq!(
            memory.hget("cookie3", "authenticated").await.unwrap().as_deref(),
            Some("0")
        );
    }

    #[tokio::test]
    async fn headers_and_kerberos_info() {
        let memory = Arc::new(MemoryStore::new());
        proxy_created(&memory, "cookie4").await;
        let mut session = AppSession::open(memory.client(), settings(), "cookie4")
            .await
            .unwrap();

        session.set_headers("X-User:alice\r\n").await.unwrap();
        session
            .set_kerberos_info("alice", "intranet.example.org", "7")
            .await
            .unwrap();

        let stored = memory.hgetall("cookie4").await.unwrap();
        assert_eq!(stored["headers"], "X-User:alice\r\n");
        assert_eq!(stored["login"], "alice");
        assert_eq!(stored["krb5service"], "HTTP@intranet.example.org");
        assert_eq!(
            stored["krb5ccname"],
            krb5_ccname("/tmp", "7", "alice")
        );
    }

    #[test]
    fn ccname_is_deterministic_and_scoped() {
        let a = krb5_ccname("/tmp/", "7", "alice");
        assert!(a.starts_with("FILE:/tmp/krb5cc_"));
        assert_eq!(a.len(), "FILE:/tmp/krb5cc_".len() + 64);
        assert_eq!(a, krb5_ccname("/tmp", "7", "alice"));
        assert_ne!(a, krb5_ccname("/tmp", "8", "alice"));
    }

    #[tokio::test]
    async fn destroy_removes_key() {
        let memory = Arc::new(MemoryStore::new());
        proxy_created(&memory, "cookie5").await;
        let session = AppSession::open(memory.client(), settings(), "cookie5")
            .await
            .unwrap();
        assert!(session.destroy().await);
        assert!(!memory.contains_key("cookie5"));
    }
}
