//! An in-memory session store for `cloakroom`, geared towards testing and local development.
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;

use cloakroom::{
    store::{
        errors::{LoadError, SaveError, StoreUnavailable},
        SessionRecord, SessionRecordRef, SessionStorageBackend,
    },
    SessionId,
};

type State = HashMap<String, serde_json::Value>;

#[derive(Clone)]
/// An in-memory session store.
///
/// # Limitations
///
/// This store won't persist data between server restarts.
/// It also won't synchronize data between multiple server instances.
/// It is primarily intended for testing and local development.
pub struct InMemorySessionStore(Arc<Mutex<HashMap<SessionId, State>>>);

impl std::fmt::Debug for InMemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySessionStore")
            .finish_non_exhaustive()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStore {
    /// Creates a new (empty) in-memory session store.
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(HashMap::new())))
    }
}

#[async_trait::async_trait]
impl SessionStorageBackend for InMemorySessionStore {
    /// Check whether a session record exists for the provided ID.
    #[tracing::instrument(name = "Check existence of server-side session record", level = tracing::Level::TRACE, skip_all)]
    async fn exists(&self, id: &SessionId) -> Result<bool, StoreUnavailable> {
        let guard = self.0.lock().await;
        Ok(guard.contains_key(id))
    }

    /// Loads the session record associated with the provided ID.
    ///
    /// Unknown IDs yield an empty record, not an error.
    #[tracing::instrument(name = "Load server-side session record", level = tracing::Level::TRACE, skip_all)]
    async fn load(&self, id: &SessionId) -> Result<SessionRecord, LoadError> {
        let guard = self.0.lock().await;
        let record = match guard.get(id) {
            Some(state) => SessionRecord {
                state: state.clone(),
            },
            None => SessionRecord::empty(),
        };
        Ok(record)
    }

    /// Saves a session record in the store under the provided ID,
    /// replacing any previous record wholesale.
    #[tracing::instrument(name = "Save server-side session record", level = tracing::Level::TRACE, skip_all)]
    async fn save(&self, id: &SessionId, record: SessionRecordRef<'_>) -> Result<(), SaveError> {
        let mut guard = self.0.lock().await;
        guard.insert(*id, record.state.into_owned());
        Ok(())
    }

    /// Deletes the session record associated with the provided ID.
    ///
    /// Deleting an ID with no associated record is a no-op.
    #[tracing::instrument(name = "Delete server-side session record", level = tracing::Level::TRACE, skip_all)]
    async fn delete(&self, id: &SessionId) -> Result<(), StoreUnavailable> {
        let mut guard = self.0.lock().await;
        guard.remove(id);
        Ok(())
    }

    /// The number of session records currently held by the store.
    #[tracing::instrument(name = "Count server-side session records", level = tracing::Level::TRACE, skip_all)]
    async fn size(&self) -> Result<usize, StoreUnavailable> {
        let guard = self.0.lock().await;
        Ok(guard.len())
    }
}
