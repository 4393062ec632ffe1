use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use biscotti::ResponseCookie;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::codec;
use crate::store_::SessionRecordRef;
use crate::SessionConfig;
use crate::SessionId;
use crate::SessionStore;
use errors::{FinalizeError, LoadSessionError, ValueDeserializationError, ValueSerializationError};

/// The current HTTP session.
///
/// A `Session` is created by [`SessionMiddleware`](crate::SessionMiddleware)
/// for every incoming request and attached to the request extensions, where
/// the wrapped application can retrieve it via [`Session::extract`].
///
/// Cloning a `Session` is cheap: all clones refer to the same underlying
/// state. This is what allows the middleware to observe, at commit time,
/// the mutations performed by the application during request handling.
#[derive(Clone)]
pub struct Session {
    store: SessionStore,
    config: Arc<SessionConfig>,
    inner: Arc<Mutex<SessionInner>>,
}

#[derive(Debug)]
struct SessionInner {
    id: SessionId,
    /// `true` if the session was created while handling the current request,
    /// either because the client presented no session cookie or because the
    /// presented id was unknown to the store.
    fresh: bool,
    state: HashMap<String, Value>,
    options: SessionOptions,
}

#[derive(Debug, Clone)]
/// Per-request directives that steer what happens to the session once the
/// wrapped application has produced its response.
///
/// A fresh set of options is built for every request, pre-populated from
/// [`SessionConfig`](crate::SessionConfig); the application mutates them
/// through the corresponding [`Session`] methods. They are acted upon
/// exactly once, at commit time, and then discarded.
pub struct SessionOptions {
    invalidate: bool,
    cycle_id: bool,
    defer_cookie: bool,
    expire_after: Option<Duration>,
}

impl SessionOptions {
    fn from_config(config: &SessionConfig) -> Self {
        Self {
            invalidate: false,
            cycle_id: false,
            defer_cookie: false,
            expire_after: config.expire_after,
        }
    }

    /// `true` if the session record will be deleted at the end of the request.
    pub fn is_invalidated(&self) -> bool {
        self.invalidate
    }

    /// `true` if the session id will be rotated at the end of the request.
    pub fn will_cycle_id(&self) -> bool {
        self.cycle_id
    }

    /// `true` if no `Set-Cookie` header will be issued for this response.
    pub fn is_cookie_deferred(&self) -> bool {
        self.defer_cookie
    }

    /// The expiry window that will be applied to the session cookie, if any.
    pub fn expire_after(&self) -> Option<Duration> {
        self.expire_after
    }
}

impl Session {
    /// Resolve the session for an incoming request.
    ///
    /// If `candidate` is a session id known to the store, this is a
    /// continuation of that session and its record is loaded. In every
    /// other case (no cookie, an unparsable cookie, an id the store has
    /// never seen or has since dropped) a brand-new session is started
    /// under a freshly generated id.
    pub async fn load(
        store: &SessionStore,
        config: &SessionConfig,
        candidate: Option<SessionId>,
    ) -> Result<Self, LoadSessionError> {
        let (id, fresh, state) = match candidate {
            Some(id) if store.exists(&id).await? => {
                let record = store.load(&id).await?;
                (id, false, record.state)
            }
            Some(_) => {
                tracing::debug!(
                    "The presented session id is unknown to the store, starting a new session."
                );
                (SessionId::random(), true, HashMap::new())
            }
            None => (SessionId::random(), true, HashMap::new()),
        };
        Ok(Self {
            store: store.clone(),
            config: Arc::new(config.clone()),
            inner: Arc::new(Mutex::new(SessionInner {
                id,
                fresh,
                state,
                options: SessionOptions::from_config(config),
            })),
        })
    }

    /// Retrieve the session that [`SessionMiddleware`](crate::SessionMiddleware)
    /// attached to the incoming request.
    ///
    /// Returns `None` if the request did not travel through the middleware.
    pub fn extract<B>(request: &http::Request<B>) -> Option<Self> {
        request.extensions().get::<Self>().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The id backing this request.
    ///
    /// If the id is rotated via [`cycle_id`](Self::cycle_id), the new id is
    /// only allocated at commit time: during request handling this keeps
    /// returning the id the session was loaded under.
    pub fn id(&self) -> SessionId {
        self.lock().id
    }

    /// `true` if the session was created while handling the current request
    /// rather than resumed from a previous one.
    pub fn is_fresh(&self) -> bool {
        self.lock().fresh
    }

    /// A snapshot of the per-request directives accumulated so far.
    pub fn options(&self) -> SessionOptions {
        self.lock().options.clone()
    }

    /// Get the value associated with `key`.
    ///
    /// If the value is not found, `None` is returned.
    /// If the value is found, but it cannot be deserialized into the expected
    /// type, an error is returned.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ValueDeserializationError> {
        self.get_raw(key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ValueDeserializationError {
                key: key.to_owned(),
                source: e,
            })
    }

    /// Get the raw JSON value associated with `key`.
    pub fn get_raw(&self, key: &str) -> Option<Value> {
        self.lock().state.get(key).cloned()
    }

    /// Set a value for the given key.
    ///
    /// If the key already exists, the value is updated and the old raw value
    /// is returned. If the value cannot be serialized, an error is returned.
    pub fn insert<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: T,
    ) -> Result<Option<Value>, ValueSerializationError> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|e| ValueSerializationError {
            key: key.clone(),
            source: e,
        })?;
        Ok(self.insert_raw(key, value))
    }

    /// Set a raw JSON value for the given key.
    ///
    /// If the key already exists, the old value is returned.
    pub fn insert_raw(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.lock().state.insert(key.into(), value)
    }

    /// Remove the value associated with `key`.
    ///
    /// If the key exists, the removed value is returned.
    /// If the removed value cannot be deserialized into the expected type,
    /// an error is returned.
    pub fn remove<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, ValueDeserializationError> {
        self.remove_raw(key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ValueDeserializationError {
                key: key.to_owned(),
                source: e,
            })
    }

    /// Remove the value associated with `key`, returning the raw removed
    /// value if the key existed.
    pub fn remove_raw(&self, key: &str) -> Option<Value> {
        self.lock().state.remove(key)
    }

    /// Remove all key-value pairs from the session.
    ///
    /// An existing session that ends up empty is still persisted: an empty
    /// record is distinct from no record at all. Use
    /// [`invalidate`](Self::invalidate) to delete the record altogether.
    pub fn clear(&self) {
        self.lock().state.clear();
    }

    /// `true` if the session holds no key-value pairs.
    pub fn is_empty(&self) -> bool {
        self.lock().state.is_empty()
    }

    /// The number of key-value pairs held by the session.
    pub fn len(&self) -> usize {
        self.lock().state.len()
    }

    /// Delete the session at the end of the request.
    ///
    /// The record is removed from the store and no session cookie is issued.
    /// The in-memory state remains usable until the request completes; the
    /// directive only takes effect at commit time.
    pub fn invalidate(&self) {
        self.lock().options.invalidate = true;
    }

    /// Rotate the session id at the end of the request.
    ///
    /// The record stored under the old id is deleted, the (unchanged) session
    /// state is stored under a freshly generated id, and a cookie carrying
    /// the new id is issued. Useful against session fixation attacks.
    pub fn cycle_id(&self) {
        self.lock().options.cycle_id = true;
    }

    /// Suppress the `Set-Cookie` header for this response, even if the
    /// session was created or its id rotated during this request.
    ///
    /// The session record is still committed to the store.
    pub fn defer_cookie(&self) {
        self.lock().options.defer_cookie = true;
    }

    /// Override the expiry window applied to the session cookie for this
    /// response.
    ///
    /// `Some(window)` issues a persistent cookie expiring `window` from now
    /// and forces a `Set-Cookie` on every response, so that the client-side
    /// deadline keeps sliding. `None` reverts to a session-scoped cookie.
    pub fn set_expire_after(&self, expire_after: Option<Duration>) {
        self.lock().options.expire_after = expire_after;
    }

    /// The expiry window currently in effect for this request, be it the
    /// configured default or a per-request override.
    pub fn expire_after(&self) -> Option<Duration> {
        self.lock().options.expire_after
    }

    /// Commit the session: sync the (possibly mutated) state back to the
    /// store, honoring the per-request directives, and decide whether a
    /// session cookie must be attached to the outgoing response.
    ///
    /// Invoked by [`SessionMiddleware`](crate::SessionMiddleware) after the
    /// wrapped application has produced its response.
    pub async fn finalize(&self) -> Result<Option<ResponseCookie<'static>>, FinalizeError> {
        // Snapshot under the lock; the application is done with the session
        // by the time the middleware calls us.
        let (mut id, fresh, state, options) = {
            let inner = self.lock();
            (inner.id, inner.fresh, inner.state.clone(), inner.options.clone())
        };

        if options.invalidate {
            self.store.delete(&id).await?;
            tracing::debug!("Session invalidated, no cookie issued.");
            return Ok(None);
        }

        let mut renewed = false;
        if options.cycle_id {
            self.store.delete(&id).await?;
            id = SessionId::random();
            renewed = true;
            self.lock().id = id;
        }

        // A session that was started by this request and never populated is
        // not worth a store record nor a cookie.
        if fresh && state.is_empty() {
            return Ok(None);
        }

        self.store
            .save(
                &id,
                SessionRecordRef {
                    state: Cow::Borrowed(&state),
                },
            )
            .await?;

        if !should_issue_cookie(fresh, renewed, &options) {
            return Ok(None);
        }
        Ok(Some(codec::encode(
            &self.config.cookie,
            id,
            options.expire_after,
        )))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The session id is sensitive, keep it out of logs.
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

/// The commit-time decision on whether to attach a `Set-Cookie` header.
///
/// | deferred | fresh | renewed | expiry window | outcome |
/// |----------|-------|---------|---------------|---------|
/// | yes      | –     | –       | –             | skip    |
/// | no       | yes   | –       | –             | issue   |
/// | no       | –     | yes     | –             | issue   |
/// | no       | no    | no      | set           | issue   |
/// | no       | no    | no      | unset         | skip    |
///
/// The last row is what keeps a continued session from re-receiving an
/// identical cookie on every response.
fn should_issue_cookie(fresh: bool, renewed: bool, options: &SessionOptions) -> bool {
    if options.defer_cookie {
        return false;
    }
    fresh || renewed || options.expire_after.is_some()
}

/// Errors that can occur when resolving or committing the session state.
pub mod errors {
    use crate::store::errors::{LoadError, SaveError, StoreUnavailable};

    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    /// The error returned by [`Session::load`][super::Session::load].
    pub enum LoadSessionError {
        #[error("Failed to check whether the presented session id is known to the store")]
        Exists(#[from] StoreUnavailable),
        #[error("Failed to load the session record from the store")]
        Load(#[from] LoadError),
    }

    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    /// The error returned by [`Session::finalize`][super::Session::finalize].
    pub enum FinalizeError {
        #[error("Failed to save the session record")]
        Save(#[from] SaveError),
        #[error("Failed to delete the session record")]
        Delete(#[from] StoreUnavailable),
    }

    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    #[error("Failed to deserialize the value associated with `{key}`")]
    /// The error returned by [`Session::get`][super::Session::get] and
    /// [`Session::remove`][super::Session::remove].
    pub struct ValueDeserializationError {
        /// The key of the value that we failed to deserialize.
        pub key: String,
        #[source]
        /// The underlying deserialization error.
        pub source: serde_json::Error,
    }

    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    #[error("Failed to serialize the value associated with `{key}`")]
    /// The error returned by [`Session::insert`][super::Session::insert].
    pub struct ValueSerializationError {
        /// The key of the value that we failed to serialize.
        pub key: String,
        #[source]
        /// The underlying serialization error.
        pub source: serde_json::Error,
    }
}
