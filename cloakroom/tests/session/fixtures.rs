use std::{borrow::Cow, collections::HashMap, sync::Arc};

use cloakroom::{
    store::{
        errors::{LoadError, SaveError, StoreUnavailable},
        SessionRecord, SessionRecordRef, SessionStorageBackend,
    },
    SessionId, SessionStore,
};
use cloakroom_memory_store::InMemorySessionStore;
use tokio::sync::Mutex;

/// An empty in-memory session store.
pub fn store() -> SessionStore {
    let backend = InMemorySessionStore::default();
    SessionStore::new(backend)
}

/// An empty in-memory session store, with a mechanism to inspect
/// what calls were made to it.
pub fn spy_store() -> (SessionStore, CallTracker) {
    let backend = InMemorySessionStore::default();
    let spy_backend = SpyBackend::new(backend);
    let call_tracker = spy_backend.call_tracker();
    (SessionStore::new(spy_backend), call_tracker)
}

/// A store whose backend fails every operation, standing in for an
/// unreachable external system.
pub fn unreachable_store() -> SessionStore {
    SessionStore::new(UnreachableBackend)
}

/// A helper to set up a pre-existing session record.
pub struct SessionFixture {
    pub id: SessionId,
    pub state: HashMap<String, serde_json::Value>,
}

impl Default for SessionFixture {
    fn default() -> Self {
        Self {
            id: SessionId::random(),
            state: HashMap::new(),
        }
    }
}

impl SessionFixture {
    /// Seed the store with this record and return the id to present on the
    /// simulated follow-up request.
    pub async fn setup(&self, store: &SessionStore) -> SessionId {
        store
            .save(
                &self.id,
                SessionRecordRef {
                    state: Cow::Owned(self.state.clone()),
                },
            )
            .await
            .expect("Failed to seed the session fixture");
        self.id
    }
}

/// A wrapper that keeps track of which methods have been called
/// on the underlying session storage backend.
#[derive(Debug)]
pub struct SpyBackend<B> {
    backend: B,
    call_tracker: CallTracker,
}

impl<B> SpyBackend<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            call_tracker: Default::default(),
        }
    }

    pub fn call_tracker(&self) -> CallTracker {
        self.call_tracker.clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CallTracker(Arc<Mutex<Vec<String>>>);

impl CallTracker {
    pub async fn assert_store_was_untouched(&self) {
        let oplog = self.0.lock().await;
        assert!(
            oplog.is_empty(),
            "The store was supposed to be untouched, but at least one method has been called on it. Operation log:\n  - {}",
            oplog.join("\n  - ")
        )
    }

    pub async fn operation_log(&self) -> Vec<String> {
        self.0.lock().await.clone()
    }

    async fn push_operation(&self, op: impl Into<String>) {
        self.0.lock().await.push(op.into());
    }
}

#[async_trait::async_trait]
impl<B: SessionStorageBackend> SessionStorageBackend for SpyBackend<B> {
    async fn exists(&self, id: &SessionId) -> Result<bool, StoreUnavailable> {
        self.call_tracker
            .push_operation(format!("exists {}", id.inner()))
            .await;
        self.backend.exists(id).await
    }

    async fn load(&self, id: &SessionId) -> Result<SessionRecord, LoadError> {
        self.call_tracker
            .push_operation(format!("load {}", id.inner()))
            .await;
        self.backend.load(id).await
    }

    async fn save(&self, id: &SessionId, record: SessionRecordRef<'_>) -> Result<(), SaveError> {
        self.call_tracker
            .push_operation(format!("save {}", id.inner()))
            .await;
        self.backend.save(id, record).await
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreUnavailable> {
        self.call_tracker
            .push_operation(format!("delete {}", id.inner()))
            .await;
        self.backend.delete(id).await
    }

    async fn size(&self) -> Result<usize, StoreUnavailable> {
        self.call_tracker.push_operation("size").await;
        self.backend.size().await
    }
}

/// A backend that fails every operation.
#[derive(Debug)]
pub struct UnreachableBackend;

impl UnreachableBackend {
    fn down() -> StoreUnavailable {
        StoreUnavailable::new(anyhow::anyhow!("the session store is down"))
    }
}

#[async_trait::async_trait]
impl SessionStorageBackend for UnreachableBackend {
    async fn exists(&self, _id: &SessionId) -> Result<bool, StoreUnavailable> {
        Err(Self::down())
    }

    async fn load(&self, _id: &SessionId) -> Result<SessionRecord, LoadError> {
        Err(Self::down().into())
    }

    async fn save(&self, _id: &SessionId, _record: SessionRecordRef<'_>) -> Result<(), SaveError> {
        Err(Self::down().into())
    }

    async fn delete(&self, _id: &SessionId) -> Result<(), StoreUnavailable> {
        Err(Self::down())
    }

    async fn size(&self) -> Result<usize, StoreUnavailable> {
        Err(Self::down())
    }
}
