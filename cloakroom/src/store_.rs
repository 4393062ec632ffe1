use crate::SessionId;
use errors::{LoadError, SaveError, StoreUnavailable};
use serde_json::Value;
use std::{borrow::Cow, collections::HashMap, sync::Arc};

/// Where server-side session records are stored.
///
/// It is a thin wrapper
/// [around your chosen storage backend implementation][`SessionStorageBackend`],
/// removing the need to specify the concrete type of the storage backend
/// everywhere in your code.
///
/// Cloning a `SessionStore` is cheap: all clones point at the same backend.
#[derive(Debug, Clone)]
pub struct SessionStore(Arc<dyn SessionStorageBackend>);

impl SessionStore {
    /// Creates a new session store using the provided backend.
    pub fn new<Backend>(backend: Backend) -> Self
    where
        Backend: SessionStorageBackend + 'static,
    {
        Self(Arc::new(backend))
    }

    /// Check whether a session record exists for the provided ID.
    ///
    /// This is the only operation that distinguishes "no record" from
    /// "a record with no entries": [`load`](Self::load) returns an empty
    /// record in both cases.
    pub async fn exists(&self, id: &SessionId) -> Result<bool, StoreUnavailable> {
        self.0.exists(id).await
    }

    /// Loads the session record associated with the provided ID.
    ///
    /// If no record exists for the given ID, an empty record is returned:
    /// presenting an unknown ID is a normal occurrence, not a failure.
    pub async fn load(&self, id: &SessionId) -> Result<SessionRecord, LoadError> {
        self.0.load(id).await
    }

    /// Saves a session record in the store under the provided ID.
    ///
    /// Any record previously stored under the same ID is replaced wholesale.
    pub async fn save(&self, id: &SessionId, record: SessionRecordRef<'_>) -> Result<(), SaveError> {
        self.0.save(id, record).await
    }

    /// Deletes the session record associated with the provided ID.
    ///
    /// Deleting an ID with no associated record is a no-op.
    pub async fn delete(&self, id: &SessionId) -> Result<(), StoreUnavailable> {
        self.0.delete(id).await
    }

    /// The number of session records currently held by the store.
    pub async fn size(&self) -> Result<usize, StoreUnavailable> {
        self.0.size().await
    }
}

#[async_trait::async_trait]
/// The interface of a session storage backend.
///
/// The in-process reference implementation lives in the
/// `cloakroom_memory_store` crate; durable backends (a database, an external
/// cache) implement the same five operations.
///
/// # Concurrency
///
/// All operations must be safe to invoke from concurrent request-handling
/// tasks. A [`save`](Self::save) must be atomic with respect to other
/// operations on the same ID: when two requests race on one ID, the store
/// ends up holding one of the two records in full, never an interleaving.
/// Last writer wins; no merge semantics are required.
pub trait SessionStorageBackend: std::fmt::Debug + Send + Sync {
    /// Check whether a session record exists for the provided ID.
    async fn exists(&self, id: &SessionId) -> Result<bool, StoreUnavailable>;

    /// Loads the session record associated with the provided ID.
    ///
    /// Unknown IDs yield an empty record, not an error.
    async fn load(&self, id: &SessionId) -> Result<SessionRecord, LoadError>;

    /// Saves a session record in the store under the provided ID,
    /// replacing any previous record wholesale.
    async fn save(&self, id: &SessionId, record: SessionRecordRef<'_>) -> Result<(), SaveError>;

    /// Deletes the session record associated with the provided ID.
    ///
    /// Deleting an ID with no associated record is a no-op.
    async fn delete(&self, id: &SessionId) -> Result<(), StoreUnavailable>;

    /// The number of session records currently held by the store.
    async fn size(&self) -> Result<usize, StoreUnavailable>;
}

/// A server-side session record that's going to be stored in the
/// chosen storage backend.
#[derive(Debug)]
pub struct SessionRecordRef<'session> {
    /// The set of key-value pairs attached to a session.
    pub state: Cow<'session, HashMap<String, Value>>,
}

/// A server-side session record that was retrieved from the
/// chosen storage backend.
#[derive(Debug)]
pub struct SessionRecord {
    /// The set of key-value pairs attached to a session.
    pub state: HashMap<String, Value>,
}

impl SessionRecord {
    /// A record with no entries.
    ///
    /// This is what [`SessionStorageBackend::load`] returns for an ID the
    /// store has never seen.
    pub fn empty() -> Self {
        Self {
            state: HashMap::new(),
        }
    }
}

/// Errors that can occur when interacting with a session storage backend.
pub mod errors {
    #[non_exhaustive]
    #[derive(Debug, thiserror::Error)]
    /// The error returned by [`SessionStorageBackend::load`][super::SessionStorageBackend::load].
    pub enum LoadError {
        #[error("Failed to deserialize the session state.")]
        /// Failed to deserialize the session state.
        DeserializationError(#[from] serde_json::Error),
        /// The backend could not be reached or refused to serve the request.
        #[error(transparent)]
        Unavailable(#[from] StoreUnavailable),
    }

    #[non_exhaustive]
    #[derive(Debug, thiserror::Error)]
    /// The error returned by [`SessionStorageBackend::save`][super::SessionStorageBackend::save].
    pub enum SaveError {
        #[error("Failed to serialize the session state.")]
        /// Failed to serialize the session state.
        SerializationError(#[from] serde_json::Error),
        /// The backend could not be reached or refused to serve the request.
        #[error(transparent)]
        Unavailable(#[from] StoreUnavailable),
    }

    #[derive(Debug, thiserror::Error)]
    #[error("The session store could not be reached or refused to serve the request.")]
    /// The storage backend failed to carry out the requested operation.
    ///
    /// The in-memory reference backend never returns this; adapters backed
    /// by I/O use it to surface their failure mode. The middleware reacts by
    /// failing the request rather than carrying on with a phantom session.
    pub struct StoreUnavailable(#[source] pub anyhow::Error);

    impl StoreUnavailable {
        /// Wrap an arbitrary backend failure.
        pub fn new(source: impl Into<anyhow::Error>) -> Self {
            Self(source.into())
        }
    }
}
