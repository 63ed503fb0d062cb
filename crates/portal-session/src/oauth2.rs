//! OAuth2 session: one record per issued access token.
//!
//! Keyed by the token itself. `scope` is a JSON object in the store and a
//! [`Map`] everywhere else; it is encoded only when the record is committed.

use serde_json::{Map, Value};

use portal_store::StoreClient;

use crate::error::{SessionError, SessionResult};
use crate::fields::oauth2::{REPO, SCOPE, TOKEN_TTL};
use crate::record::SessionRecord;

/// Typed view of an OAuth2 session hash.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Oauth2Grant {
    pub token_ttl: Option<u64>,
    pub scope: Map<String, Value>,
    /// Identity provider that issued the token.
    pub repo: Option<String>,
}

impl Oauth2Grant {
    fn from_record(record: &SessionRecord) -> Self {
        let scope = match record.get(SCOPE).map(serde_json::from_str::<Map<String, Value>>) {
            Some(Ok(scope)) => scope,
            Some(Err(e)) => {
                tracing::warn!(key = %record.key(), error = %e, "unreadable oauth2 scope, starting empty");
                Map::new()
            }
            None => Map::new(),
        };
        Self {
            token_ttl: record.get(TOKEN_TTL).and_then(|v| v.parse().ok()),
            scope,
            repo: record.get(REPO).map(str::to_string),
        }
    }

    /// Folds a new authorization into the grant.
    ///
    /// Values already present are kept; `scope` entries are merged, with
    /// `scope_data` winning on conflicting keys.
    pub fn merge(&mut self, repo_id: &str, scope_data: Map<String, Value>, timeout: u64) {
        if self.token_ttl.is_none_or(|ttl| ttl == 0) {
            self.token_ttl = Some(timeout);
        }
        if self.repo.as_deref().is_none_or(str::is_empty) {
            self.repo = Some(repo_id.to_string());
        }
        self.scope.extend(scope_data);
    }
}

#[derive(Debug, Clone)]
pub struct Oauth2Session {
    record: SessionRecord,
    grant: Oauth2Grant,
}

impl Oauth2Session {
    pub async fn open(store: StoreClient, token: &str) -> Self {
        let record = SessionRecord::load(store, token).await;
        let grant = Oauth2Grant::from_record(&record);
        Self { record, grant }
    }

    pub fn key(&self) -> &str {
        self.record.key()
    }

    pub fn grant(&self) -> &Oauth2Grant {
        &self.grant
    }

    /// `true` when the token was found in the store.
    pub fn exists(&self) -> bool {
        !self.record.is_empty()
    }

    /// Records that the token was issued by `repo_id` for `scope_data`.
    pub async fn register_authentication(
        &mut self,
        repo_id: &str,
        scope_data: Map<String, Value>,
        timeout: u64,
    ) -> SessionResult<&str> {
        self.grant.merge(repo_id, scope_data, timeout);
        self.commit(timeout).await?;
        tracing::debug!(key = %self.key(), repo_id, "oauth2 token registered");
        Ok(self.key())
    }

    async fn commit(&mut self, timeout: u64) -> SessionResult<()> {
        let scope = serde_json::to_string(&self.grant.scope)?;
        self.record.set(SCOPE, scope);
        if let Some(ttl) = self.grant.token_ttl {
            self.record.set(TOKEN_TTL, ttl.to_string());
        }
        if let Some(repo) = &self.grant.repo {
            self.record.set(REPO, repo.clone());
        }

        if self.record.commit(timeout).await {
            Ok(())
        } else {
            tracing::error!(key = %self.key(), "unable to write oauth2 session");
            Err(SessionError::write_failure("oauth2 registration", self.key()))
        }
    }

    pub async fn destroy(&self) -> bool {
        self.record.store().delete(self.key()).await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_store::{KvStore, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    fn scope(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[tokio::test]
    async fn first_registration_initializes_grant() {
        let memory = Arc::new(MemoryStore::new());
        let mut session = Oauth2Session::open(memory.client(), "tok1").await;
        assert!(!session.exists());

        session
            .register_authentication("5", scope(json!({"a": 1})), 3600)
            .await
            .unwrap();

        let stored = memory.hgetall("tok1").await.unwrap();
        assert_eq!(stored["token_ttl"], "3600");
        assert_eq!(stored["repo"], "5");
        assert_eq!(
            serde_json::from_str::<Value>(&stored["scope"]).unwrap(),
            json!({"a": 1})
        );
        // The in-memory scope stays structured after commit.
        assert_eq!(session.grant().scope, scope(json!({"a": 1})));
    }

    #[tokio::test]
    async fn later_registrations_merge_scope() {
        let memory = Arc::new(MemoryStore::new());
        let mut first = Oauth2Session::open(memory.client(), "tok2").await;
        first
            .register_authentication("5", scope(json!({"a": 1, "c": "x"})), 3600)
            .await
            .unwrap();

        let mut second = Oauth2Session::open(memory.client(), "tok2").await;
        assert!(second.exists());
        second
            .register_authentication("9", scope(json!({"b": 2, "c": "y"})), 60)
            .await
            .unwrap();

        let reopened = Oauth2Session::open(memory.client(), "tok2").await;
        let grant = reopened.grant();
        assert_eq!(grant.scope, scope(json!({"a": 1, "b": 2, "c": "y"})));
        assert_eq!(grant.repo.as_deref(), Some("5"));
        assert_eq!(grant.token_ttl, Some(3600));
    }

    #[tokio::test]
    async fn corrupt_scope_starts_empty() {
        let memory = Arc::new(MemoryStore::new());
        memory.hset("tok3", "scope", "{not json").await.unwrap();
        let session = Oauth2Session::open(memory.client(), "tok3").await;
        assert!(session.grant().scope.is_empty());
    }

    #[tokio::test]
    async fn write_failure_is_reported() {
        let memory = Arc::new(MemoryStore::new());
        let mut session = Oauth2Session::open(memory.client(), "tok4").await;
        memory.set_available(false);
        let err = session
            .register_authentication("5", Map::new(), 60)
            .await
            .unwrap_err();
        assert!(err.is_write_failure());
    }
}
