//! Base session record: one store hash plus its TTL.
//!
//! A record snapshots the hash when it is loaded. `get`/`set`/`remove` only
//! touch the snapshot; [`SessionRecord::commit`] writes it back in one batch.
//! Two records loaded from the same key do not see each other's changes, and
//! the later commit wins for every field both hold.

use std::collections::{HashMap, HashSet};

use portal_store::StoreClient;

use crate::fields::USER_INFOS_PREFIX;

#[derive(Clone)]
pub struct SessionRecord {
    store: StoreClient,
    key: String,
    fields: HashMap<String, String>,
    removed: HashSet<String>,
}

impl SessionRecord {
    /// Loads the hash stored under `key`. A missing key yields an empty record.
    pub async fn load(store: StoreClient, key: impl Into<String>) -> Self {
        let key = key.into();
        let fields = store.hash_get_all(&key).await;
        Self {
            store,
            key,
            fields,
            removed: HashSet::new(),
        }
    }

    /// Loads the hash, then applies `overrides`. `None` values leave the
    /// loaded field untouched.
    pub async fn load_with<I, K>(store: StoreClient, key: impl Into<String>, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        let mut record = Self::load(store, key).await;
        for (field, value) in overrides {
            if let Some(value) = value {
                record.set(field, value);
            }
        }
        record
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn store(&self) -> &StoreClient {
        &self.store
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let field = field.into();
        self.removed.remove(&field);
        self.fields.insert(field, value.into());
    }

    /// Drops `field` from the snapshot; the next commit deletes it from the store.
    pub fn remove(&mut self, field: &str) -> Option<String> {
        let previous = self.fields.remove(field);
        self.removed.insert(field.to_string());
        previous
    }

    /// Drops `field` from the snapshot only, for fields already deleted in the store.
    pub(crate) fn forget(&mut self, field: &str) -> Option<String> {
        self.removed.remove(field);
        self.fields.remove(field)
    }

    /// Empties the snapshot after the stored hash was deleted.
    pub(crate) fn clear(&mut self) {
        self.fields.clear();
        self.removed.clear();
    }

    /// Replaces the whole snapshot; fields not in `fields` are deleted on commit.
    pub fn replace(&mut self, fields: HashMap<String, String>) {
        for name in self.fields.keys() {
            if !fields.contains_key(name) {
                self.removed.insert(name.clone());
            }
        }
        for name in fields.keys() {
            self.removed.remove(name);
        }
        self.fields = fields;
    }

    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Re-reads the hash, discarding uncommitted changes.
    pub async fn reload(&mut self) {
        self.fields = self.store.hash_get_all(&self.key).await;
        self.removed.clear();
    }

    /// Writes the snapshot back and extends the TTL to `timeout` seconds.
    ///
    /// `user_infos_*` fields are skipped; they are written on their own when
    /// set. The TTL is only ever raised: a key that already lives longer than
    /// `timeout` keeps its TTL. Returns `false` if any step failed.
    pub async fn commit(&mut self, timeout: u64) -> bool {
        let batch: Vec<(String, String)> = self
            .fields
            .iter()
            .filter(|(name, _)| !name.starts_with(USER_INFOS_PREFIX))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        if !batch.is_empty() && !self.store.hash_multi_set(&self.key, &batch).await {
            tracing::warn!(key = %self.key, fields = batch.len(), "session commit failed");
            return false;
        }

        if !self.removed.is_empty() {
            let removed: Vec<String> = self.removed.iter().cloned().collect();
            if self.store.hash_delete(&self.key, &removed).await.is_none() {
                tracing::warn!(key = %self.key, fields = removed.len(), "session field removal failed");
                return false;
            }
            self.removed.clear();
        }

        if self.fields.is_empty() {
            // Nothing left to keep alive.
            return true;
        }

        let current = self.store.ttl(&self.key).await.unwrap_or(-2);
        if current >= 0 && current as u64 >= timeout {
            return true;
        }
        let extended = self.store.expire(&self.key, timeout).await;
        if !extended {
            tracing::warn!(key = %self.key, timeout, "session TTL extension failed");
        }
        extended
    }
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("key", &self.key)
            .field("fields", &self.fields.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_store::{KvStore, MemoryStore};
    use std::sync::Arc;

    fn store() -> (Arc<MemoryStore>, StoreClient) {
        let memory = Arc::new(MemoryStore::new());
        let client = memory.client();
        (memory, client)
    }

    #[tokio::test]
    async fn commit_then_reload_round_trips() {
        let (_, client) = store();
        let mut record = SessionRecord::load(client.clone(), "r1").await;
        assert!(record.is_empty());
        record.set("login_7", "alice");
        record.set("42", "1");
        assert!(record.commit(900).await);

        let reloaded = SessionRecord::load(client, "r1").await;
        assert_eq!(reloaded.get("login_7"), Some("alice"));
        assert_eq!(reloaded.get("42"), Some("1"));
    }

    #[tokio::test]
    async fn ttl_is_never_shortened() {
        let (memory, client) = store();
        let mut record = SessionRecord::load(client, "r2").await;
        record.set("a", "1");

        assert!(record.commit(600).await);
        assert_eq!(memory.ttl("r2").await.unwrap(), 600);

        assert!(record.commit(300).await);
        assert_eq!(memory.ttl("r2").await.unwrap(), 600);

        assert!(record.commit(900).await);
        assert_eq!(memory.ttl("r2").await.unwrap(), 900);
    }

    #[tokio::test]
    async fn user_infos_are_not_batched() {
        let (memory, client) = store();
        let mut record = SessionRecord::load(client, "r3").await;
        record.set("login_7", "alice");
        record.set("user_infos_7", "{\"mail\":\"a@b\"}");
        assert!(record.commit(60).await);

        assert_eq!(memory.hget("r3", "user_infos_7").await.unwrap(), None);
        assert_eq!(
            memory.hget("r3", "login_7").await.unwrap().as_deref(),
            Some("alice")
        );
    }

    #[tokio::test]
    async fn removed_fields_are_deleted_on_commit() {
        let (memory, client) = store();
        memory
            .hmset("r4", &[("a".into(), "1".into()), ("b".into(), "2".into())])
            .await
            .unwrap();

        let mut record = SessionRecord::load(client, "r4").await;
        assert_eq!(record.remove("a").as_deref(), Some("1"));
        assert!(record.commit(60).await);
        assert_eq!(memory.hget("r4", "a").await.unwrap(), None);
        assert_eq!(memory.hget("r4", "b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn overrides_replace_only_non_null_values() {
        let (memory, client) = store();
        memory
            .hmset("r5", &[("a".into(), "old".into()), ("b".into(), "keep".into())])
            .await
            .unwrap();

        let record = SessionRecord::load_with(
            client,
            "r5",
            [("a", Some("new".to_string())), ("b", None)],
        )
        .await;
        assert_eq!(record.get("a"), Some("new"));
        assert_eq!(record.get("b"), Some("keep"));
    }

    #[tokio::test]
    async fn snapshot_ignores_later_external_writes_until_reload() {
        let (memory, client) = store();
        let mut record = SessionRecord::load(client, "r6").await;
        memory.hset("r6", "x", "1").await.unwrap();
        assert_eq!(record.get("x"), None);
        record.reload().await;
        assert_eq!(record.get("x"), Some("1"));
    }

    #[tokio::test]
    async fn commit_reports_store_failure() {
        let (memory, client) = store();
        let mut record = SessionRecord::load(client, "r7").await;
        record.set("a", "1");
        memory.set_available(false);
        assert!(!record.commit(60).await);
    }

    #[tokio::test]
    async fn replace_schedules_stale_fields_for_deletion() {
        let (memory, client) = store();
        memory
            .hmset("r8", &[("old".into(), "1".into())])
            .await
            .unwrap();
        let mut record = SessionRecord::load(client, "r8").await;
        let mut fresh = HashMap::new();
        fresh.insert("new".to_string(), "2".to_string());
        record.replace(fresh);
        assert!(record.commit(30).await);

        let stored = memory.hgetall("r8").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored.get("new").map(String::as_str), Some("2"));
    }
}
