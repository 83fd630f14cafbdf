mod file;
mod ids;
mod memory;

pub use file::FileStore;
pub use ids::{ generate_u64, parse_stored, ConversationId, UserId };
pub use memory::MemoryStore;

use async_trait::async_trait;
use log::{ info, warn };
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;
use thiserror::Error;

pub const USER_ID_KEY: &str = "userId";
pub const CONVERSATION_ID_KEY: &str = "conversationId";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Identity storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Identity storage is corrupt: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Identity storage unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Issues and remembers the anonymous user and conversation ids.
///
/// Ids are read from a durable [`KeyValueStore`]. When that store fails the
/// identity store switches to process-local memory for the rest of its life,
/// so callers always get a usable id.
pub struct IdentityStore {
    durable: Arc<dyn KeyValueStore>,
    fallback: MemoryStore,
    degraded: AtomicBool,
}

impl IdentityStore {
    pub fn new(durable: Arc<dyn KeyValueStore>) -> Self {
        Self {
            durable,
            fallback: MemoryStore::new(),
            degraded: AtomicBool::new(false),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub async fn get_or_create_user_id(&self) -> UserId {
        let raw = self.get_or_create(USER_ID_KEY).await;
        UserId::from_raw(raw).unwrap_or_else(UserId::generate)
    }

    pub async fn get_or_create_conversation_id(&self) -> ConversationId {
        let raw = self.get_or_create(CONVERSATION_ID_KEY).await;
        ConversationId::from_raw(raw).unwrap_or_else(ConversationId::generate)
    }

    /// Replaces the stored conversation id with a fresh one.
    pub async fn reset_conversation_id(&self) -> ConversationId {
        let id = ConversationId::generate();
        self.store(CONVERSATION_ID_KEY, id.get()).await;
        info!("Started new conversation {}", id);
        id
    }

    async fn get_or_create(&self, key: &str) -> u64 {
        if let Some(existing) = self.load(key).await {
            return existing;
        }
        let id = generate_u64();
        self.store(key, id).await;
        info!("Generated new {}", key);
        id
    }

    async fn load(&self, key: &str) -> Option<u64> {
        let stored = if self.is_degraded() {
            self.fallback.get(key).await.ok().flatten()
        } else {
            match self.durable.get(key).await {
                Ok(value) => value,
                Err(e) => {
                    self.degrade(key, &e);
                    None
                }
            }
        };

        let raw = stored?;
        match parse_stored(&raw) {
            Some(id) => {
                // keep a copy so the id survives a later switch to memory
                let _ = self.fallback.put(key, &raw).await;
                Some(id)
            }
            None => {
                warn!("Discarding malformed stored {}: {:?}", key, raw);
                None
            }
        }
    }

    async fn store(&self, key: &str, id: u64) {
        let value = id.to_string();
        if !self.is_degraded() {
            if let Err(e) = self.durable.put(key, &value).await {
                self.degrade(key, &e);
            }
        }
        // memory writes cannot fail
        let _ = self.fallback.put(key, &value).await;
    }

    fn degrade(&self, key: &str, error: &StorageError) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            warn!(
                "Identity storage failed while accessing '{}': {}. Ids will only live for this session.",
                key,
                error
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct BrokenStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Unavailable("storage disabled".to_string()))
        }

        async fn put(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Unavailable("storage disabled".to_string()))
        }
    }

    #[tokio::test]
    async fn ids_are_idempotent() {
        let store = IdentityStore::in_memory();
        let user = store.get_or_create_user_id().await;
        assert_eq!(store.get_or_create_user_id().await, user);

        let conversation = store.get_or_create_conversation_id().await;
        assert_eq!(store.get_or_create_conversation_id().await, conversation);
        assert!(!store.is_degraded());
    }

    #[tokio::test]
    async fn valid_stored_ids_are_reused() {
        let durable = Arc::new(MemoryStore::with_entries([(USER_ID_KEY, "111"), (CONVERSATION_ID_KEY, "9")]));
        let store = IdentityStore::new(durable);
        assert_eq!(store.get_or_create_user_id().await.get(), 111);
        assert_eq!(store.get_or_create_conversation_id().await.get(), 9);
    }

    #[tokio::test]
    async fn malformed_stored_ids_are_replaced_and_persisted() {
        for bad in ["", "0", "NaN"] {
            let durable = Arc::new(MemoryStore::with_entries([(USER_ID_KEY, bad), (CONVERSATION_ID_KEY, bad)]));
            let store = IdentityStore::new(durable.clone());

            let user = store.get_or_create_user_id().await;
            let conversation = store.get_or_create_conversation_id().await;

            let persisted_user = durable.get(USER_ID_KEY).await.unwrap().unwrap();
            let persisted_conversation = durable.get(CONVERSATION_ID_KEY).await.unwrap().unwrap();
            assert_eq!(persisted_user, user.to_string());
            assert_eq!(persisted_conversation, conversation.to_string());
            assert_ne!(user.get(), 0);
        }
    }

    #[tokio::test]
    async fn user_and_conversation_keys_are_independent() {
        let durable = Arc::new(MemoryStore::with_entries([(USER_ID_KEY, "5")]));
        let store = IdentityStore::new(durable.clone());

        let conversation = store.get_or_create_conversation_id().await;
        assert_eq!(store.get_or_create_user_id().await.get(), 5);
        assert_eq!(
            durable.get(CONVERSATION_ID_KEY).await.unwrap(),
            Some(conversation.to_string())
        );
    }

    struct ReadOnlyStore {
        entries: MemoryStore,
    }

    #[async_trait]
    impl KeyValueStore for ReadOnlyStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.entries.get(key).await
        }

        async fn put(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("read-only".to_string()))
        }
    }

    #[tokio::test]
    async fn stored_user_id_survives_a_failed_write() {
        let durable = Arc::new(ReadOnlyStore {
            entries: MemoryStore::with_entries([(USER_ID_KEY, "111"), (CONVERSATION_ID_KEY, "0")]),
        });
        let store = IdentityStore::new(durable);

        let first = store.get_or_create_user_id().await;
        let conversation = store.get_or_create_conversation_id().await;
        assert!(store.is_degraded());

        assert_eq!(first.get(), 111);
        assert_eq!(store.get_or_create_user_id().await, first);
        assert_eq!(store.get_or_create_conversation_id().await, conversation);
    }

    #[tokio::test]
    async fn generated_id_survives_a_later_degrade() {
        let durable = Arc::new(MemoryStore::new());
        let store = IdentityStore::new(durable.clone());
        let user = store.get_or_create_user_id().await;

        // a failed write elsewhere flips the store to memory
        store.degrade(CONVERSATION_ID_KEY, &StorageError::Unavailable("disk full".to_string()));
        assert_eq!(store.get_or_create_user_id().await, user);
    }

    #[tokio::test]
    async fn numeric_file_values_are_not_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");
        std::fs::write(&path, r#"{"userId": 111, "conversationId": false}"#).unwrap();
        let store = IdentityStore::new(Arc::new(FileStore::new(&path)));

        assert_eq!(store.get_or_create_user_id().await.get(), 111);
        let conversation = store.get_or_create_conversation_id().await;
        assert!(!store.is_degraded());

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get(CONVERSATION_ID_KEY).await.unwrap(), Some(conversation.to_string()));
    }

    #[tokio::test]
    async fn broken_storage_degrades_to_memory() {
        let broken = Arc::new(BrokenStore { calls: AtomicUsize::new(0) });
        let store = IdentityStore::new(broken.clone());

        let user = store.get_or_create_user_id().await;
        assert!(store.is_degraded());
        assert_eq!(store.get_or_create_user_id().await, user);

        // once degraded the durable store is left alone
        let calls = broken.calls.load(Ordering::SeqCst);
        let _ = store.get_or_create_conversation_id().await;
        assert_eq!(broken.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn reset_replaces_conversation_but_not_user() {
        let durable = Arc::new(MemoryStore::new());
        let store = IdentityStore::new(durable.clone());
        let user = store.get_or_create_user_id().await;
        let before = store.get_or_create_conversation_id().await;

        let after = store.reset_conversation_id().await;
        assert_ne!(before, after);
        assert_eq!(store.get_or_create_conversation_id().await, after);
        assert_eq!(store.get_or_create_user_id().await, user);
    }
}
