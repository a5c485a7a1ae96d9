//! The credential store seam and its bundled backends.
//!
//! The trait exposes per-record operations only. Mutations go through
//! [`CredentialStore::update`], which a conforming backend must apply as an
//! atomic read-modify-write on that one record, so concurrent callers cannot
//! lose updates (two failed-attempt increments racing, for example).

use crate::error::{AuthError, Result};
use crate::store::record::{DeliveryMethod, UserRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// A mutation applied atomically to a single record.
pub type RecordMutation = Box<dyn FnOnce(&mut UserRecord) + Send>;

/// Durable mapping from username to credential record.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch a record by username.
    async fn get(&self, username: &str) -> Result<Option<UserRecord>>;

    /// Write a record, replacing any existing one with the same username.
    async fn put(&self, record: UserRecord) -> Result<()>;

    /// Remove a record. Returns whether it existed.
    async fn delete(&self, username: &str) -> Result<bool>;

    /// Create a record, failing with [`AuthError::Conflict`] if the username
    /// is already taken.
    async fn insert(&self, record: UserRecord) -> Result<()>;

    /// Apply `mutation` to the named record atomically, returning the
    /// updated record, or `None` if no such record exists.
    async fn update(&self, username: &str, mutation: RecordMutation) -> Result<Option<UserRecord>>;

    /// Find the unique record whose contact for `method` equals `contact`.
    ///
    /// Fails with [`AuthError::Conflict`] if more than one record binds the
    /// value; registration enforces uniqueness, so this only fires on stores
    /// populated before that rule existed.
    async fn find_by_contact(
        &self,
        method: DeliveryMethod,
        contact: &str,
    ) -> Result<Option<UserRecord>>;

    /// Whether any record already binds `contact` for `method`.
    async fn contact_in_use(&self, method: DeliveryMethod, contact: &str) -> Result<bool> {
        match self.find_by_contact(method, contact).await {
            Ok(found) => Ok(found.is_some()),
            Err(AuthError::Conflict(_)) => Ok(true),
            Err(e) => Err(e),
        }
    }
}

fn find_in_map(
    records: &HashMap<String, UserRecord>,
    method: DeliveryMethod,
    contact: &str,
) -> Result<Option<UserRecord>> {
    let mut matches = records
        .values()
        .filter(|record| record.contact(method) == Some(contact));

    let first = matches.next().cloned();
    if first.is_some() && matches.next().is_some() {
        return Err(AuthError::conflict(format!(
            "{method} contact is bound to more than one account"
        )));
    }
    Ok(first)
}

/// In-memory credential store.
///
/// The primary backend for tests and examples; every mutation runs under a
/// single write lock, so per-record updates are trivially atomic.
#[derive(Default, Clone)]
pub struct MemoryCredentialStore {
    records: Arc<RwLock<HashMap<String, UserRecord>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().expect("credential store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, username: &str) -> Result<Option<UserRecord>> {
        let records = self.records.read().expect("credential store lock poisoned");
        Ok(records.get(username).cloned())
    }

    async fn put(&self, record: UserRecord) -> Result<()> {
        let mut records = self.records.write().expect("credential store lock poisoned");
        records.insert(record.username.clone(), record);
        Ok(())
    }

    async fn delete(&self, username: &str) -> Result<bool> {
        let mut records = self.records.write().expect("credential store lock poisoned");
        Ok(records.remove(username).is_some())
    }

    async fn insert(&self, record: UserRecord) -> Result<()> {
        let mut records = self.records.write().expect("credential store lock poisoned");
        if records.contains_key(&record.username) {
            return Err(AuthError::conflict("username already exists"));
        }
        records.insert(record.username.clone(), record);
        Ok(())
    }

    async fn update(
        &self,
        username: &str,
        mutation: RecordMutation,
    ) -> Result<Option<UserRecord>> {
        let mut records = self.records.write().expect("credential store lock poisoned");
        match records.get_mut(username) {
            Some(record) => {
                mutation(record);
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn find_by_contact(
        &self,
        method: DeliveryMethod,
        contact: &str,
    ) -> Result<Option<UserRecord>> {
        let records = self.records.read().expect("credential store lock poisoned");
        find_in_map(&records, method, contact)
    }
}

/// File-backed credential store persisting the whole map as pretty JSON.
///
/// Suitable for single-process deployments. A tokio mutex serializes every
/// load-modify-save cycle, so record updates cannot interleave; anything
/// multi-process needs a transactional backend behind the same trait.
pub struct JsonFileStore {
    path: PathBuf,
    guard: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: tokio::sync::Mutex::new(()),
        }
    }

    /// A missing file reads as an empty store; corrupt JSON is an error
    /// rather than silent data loss.
    async fn load(&self) -> Result<HashMap<String, UserRecord>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(AuthError::internal(format!(
                    "failed to read credential store {}: {e}",
                    self.path.display()
                )))
            }
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            AuthError::internal(format!(
                "credential store {} is not valid JSON: {e}",
                self.path.display()
            ))
        })
    }

    async fn save(&self, records: &HashMap<String, UserRecord>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(records)
            .map_err(|e| AuthError::internal(format!("failed to serialize credential store: {e}")))?;
        tokio::fs::write(&self.path, bytes).await.map_err(|e| {
            AuthError::internal(format!(
                "failed to write credential store {}: {e}",
                self.path.display()
            ))
        })
    }
}

#[async_trait]
impl CredentialStore for JsonFileStore {
    async fn get(&self, username: &str) -> Result<Option<UserRecord>> {
        let _guard = self.guard.lock().await;
        Ok(self.load().await?.remove(username))
    }

    async fn put(&self, record: UserRecord) -> Result<()> {
        let _guard = self.guard.lock().await;
        let mut records = self.load().await?;
        records.insert(record.username.clone(), record);
        self.save(&records).await
    }

    async fn delete(&self, username: &str) -> Result<bool> {
        let _guard = self.guard.lock().await;
        let mut records = self.load().await?;
        let existed = records.remove(username).is_some();
        if existed {
            self.save(&records).await?;
        }
        Ok(existed)
    }

    async fn insert(&self, record: UserRecord) -> Result<()> {
        let _guard = self.guard.lock().await;
        let mut records = self.load().await?;
        if records.contains_key(&record.username) {
            return Err(AuthError::conflict("username already exists"));
        }
        records.insert(record.username.clone(), record);
        self.save(&records).await
    }

    async fn update(
        &self,
        username: &str,
        mutation: RecordMutation,
    ) -> Result<Option<UserRecord>> {
        let _guard = self.guard.lock().await;
        let mut records = self.load().await?;
        match records.get_mut(username) {
            Some(record) => {
                mutation(record);
                let updated = record.clone();
                self.save(&records).await?;
                Ok(Some(updated))
            }
            None => Ok(None),
        }
    }

    async fn find_by_contact(
        &self,
        method: DeliveryMethod,
        contact: &str,
    ) -> Result<Option<UserRecord>> {
        let _guard = self.guard.lock().await;
        let records = self.load().await?;
        find_in_map(&records, method, contact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(username: &str, email: Option<&str>, phone: Option<&str>) -> UserRecord {
        UserRecord {
            username: username.into(),
            password_hash: "digest".into(),
            encrypted_totp_secret: "ciphertext".into(),
            email: email.map(Into::into),
            phone: phone.map(Into::into),
            recovery_codes: vec![],
            failed_attempts: 0,
            locked_until: None,
            verification_codes: HashMap::new(),
            last_totp_step: None,
        }
    }

    #[tokio::test]
    async fn test_memory_insert_then_get() {
        let store = MemoryCredentialStore::new();
        store.insert(record("alice", None, None)).await.unwrap();

        let fetched = store.get("alice").await.unwrap().unwrap();
        assert_eq!(fetched.username, "alice");
        assert!(store.get("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_insert_duplicate_conflicts() {
        let store = MemoryCredentialStore::new();
        store.insert(record("alice", None, None)).await.unwrap();

        let err = store.insert(record("alice", None, None)).await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_update_returns_new_state() {
        let store = MemoryCredentialStore::new();
        store.insert(record("alice", None, None)).await.unwrap();

        let updated = store
            .update("alice", Box::new(|rec| rec.failed_attempts += 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.failed_attempts, 1);

        let missing = store
            .update("ghost", Box::new(|rec| rec.failed_attempts += 1))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_memory_find_by_contact() {
        let store = MemoryCredentialStore::new();
        store
            .insert(record("alice", Some("alice@example.com"), None))
            .await
            .unwrap();
        store
            .insert(record("bob", None, Some("+15550001111")))
            .await
            .unwrap();

        let found = store
            .find_by_contact(DeliveryMethod::Email, "alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.username, "alice");

        let found = store
            .find_by_contact(DeliveryMethod::Sms, "+15550001111")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.username, "bob");

        assert!(store
            .find_by_contact(DeliveryMethod::Email, "nobody@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_memory_ambiguous_contact_conflicts() {
        let store = MemoryCredentialStore::new();
        store
            .insert(record("alice", Some("shared@example.com"), None))
            .await
            .unwrap();
        store
            .insert(record("bob", Some("shared@example.com"), None))
            .await
            .unwrap();

        let err = store
            .find_by_contact(DeliveryMethod::Email, "shared@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));

        assert!(store
            .contact_in_use(DeliveryMethod::Email, "shared@example.com")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_json_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");

        {
            let store = JsonFileStore::new(&path);
            store
                .insert(record("alice", Some("alice@example.com"), None))
                .await
                .unwrap();
            store
                .update("alice", Box::new(|rec| rec.failed_attempts = 3))
                .await
                .unwrap();
        }

        let reopened = JsonFileStore::new(&path);
        let fetched = reopened.get("alice").await.unwrap().unwrap();
        assert_eq!(fetched.failed_attempts, 3);
        assert_eq!(fetched.email.as_deref(), Some("alice@example.com"));
    }

    #[tokio::test]
    async fn test_json_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert!(store.get("alice").await.unwrap().is_none());
        assert!(!store.delete("alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_json_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let store = JsonFileStore::new(&path);
        let err = store.get("alice").await.unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
    }
}
