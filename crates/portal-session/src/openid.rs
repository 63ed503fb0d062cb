//! OpenID Connect bridging record.
//!
//! Carries the authorization result across the single redirect that hands
//! it back to the relying party, then expires.

use std::collections::HashMap;
use std::sync::Arc;

use portal_store::StoreClient;

use crate::config::SessionSettings;
use crate::error::{SessionError, SessionResult};
use crate::fields::ACCESS_TOKEN;
use crate::record::SessionRecord;

#[derive(Debug, Clone)]
pub struct OpenIdSession {
    record: SessionRecord,
    settings: Arc<SessionSettings>,
}

impl OpenIdSession {
    pub async fn open(store: StoreClient, settings: Arc<SessionSettings>, code: &str) -> Self {
        Self {
            record: SessionRecord::load(store, code).await,
            settings,
        }
    }

    pub fn key(&self) -> &str {
        self.record.key()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.record.get(ACCESS_TOKEN)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.record.get(field)
    }

    /// Replaces every field with `fields` plus `access_token`, and commits
    /// with the short `openid_ttl`.
    pub async fn register(
        &mut self,
        oauth2_token: &str,
        fields: HashMap<String, String>,
    ) -> SessionResult<&str> {
        let mut fields = fields;
        fields.insert(ACCESS_TOKEN.to_string(), oauth2_token.to_string());
        self.record.replace(fields);

        if !self.record.commit(self.settings.openid_ttl).await {
            tracing::error!(key = %self.key(), "unable to write openid session");
            return Err(SessionError::write_failure("openid registration", self.key()));
        }
        Ok(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_store::{KvStore, MemoryStore};

    #[tokio::test]
    async fn register_replaces_fields_with_short_ttl() {
        let memory = Arc::new(MemoryStore::new());
        memory.hset("code1", "stale", "x").await.unwrap();
        let settings = Arc::new(SessionSettings::default());

        let mut session = OpenIdSession::open(memory.client(), settings, "code1").await;
        let extra = HashMap::from([("nonce".to_string(), "n-1".to_string())]);
        session.register("tok", extra).await.unwrap();

        let stored = memory.hgetall("code1").await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored["access_token"], "tok");
        assert_eq!(stored["nonce"], "n-1");
        assert_eq!(memory.ttl("code1").await.unwrap(), 30);
        assert_eq!(session.access_token(), Some("tok"));
    }
}
