use biscotti::{Processor, ProcessorConfig, RequestCookies, ResponseCookies};
use http::header::{HeaderValue, COOKIE, SET_COOKIE};
use http::{Request, Response, StatusCode};

use crate::codec;
use crate::config::InvalidSessionConfig;
use crate::session_::errors::{FinalizeError, LoadSessionError};
use crate::{Session, SessionConfig, SessionId, SessionStore};

/// A request handler: the interface between the session machinery and the
/// application (or the next middleware) it wraps.
///
/// It is implemented for any `async fn(Request<B>) -> Response<B>` and for
/// [`SessionMiddleware`] itself, so handlers compose.
#[async_trait::async_trait]
pub trait Handler<B>: Send + Sync {
    /// Process an incoming request and produce a response.
    async fn handle(&self, request: Request<B>) -> Response<B>;
}

#[async_trait::async_trait]
impl<B, F, Fut> Handler<B> for F
where
    B: Send + 'static,
    F: Fn(Request<B>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Response<B>> + Send,
{
    async fn handle(&self, request: Request<B>) -> Response<B> {
        (self)(request).await
    }
}

/// Attach a session to every request handled by the wrapped application.
///
/// On the way in, the middleware resolves the [`Session`] for the incoming
/// request (resuming it from the store when the session cookie carries a
/// known id, starting a fresh one otherwise) and attaches it to the request
/// extensions. On the way out, it commits the session back to the store and
/// decides whether a `Set-Cookie` header must be appended to the response.
///
/// The response produced by the wrapped application passes through verbatim
/// apart from that one header.
pub struct SessionMiddleware<H> {
    inner: H,
    store: SessionStore,
    config: SessionConfig,
    processor: Processor,
}

impl<H> std::fmt::Debug for SessionMiddleware<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMiddleware")
            .field("inner", &std::any::type_name::<H>())
            .field("store", &self.store)
            .field("config", &self.config)
            .field("processor", &self.processor)
            .finish()
    }
}

impl<H> SessionMiddleware<H> {
    /// Wrap a handler, committing sessions to the provided store.
    ///
    /// The configuration is validated eagerly: a malformed cookie name or a
    /// degenerate expiry window is reported here rather than on the first
    /// request that trips over it.
    pub fn new(
        inner: H,
        store: SessionStore,
        config: SessionConfig,
    ) -> Result<Self, InvalidSessionConfig> {
        config.validate()?;
        Ok(Self {
            inner,
            store,
            config,
            processor: ProcessorConfig::default().into(),
        })
    }

    /// The store this middleware commits sessions to.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// The configuration this middleware was built with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Process a request, propagating session-machinery failures to the
    /// caller instead of converting them into a response.
    ///
    /// A failure always means the backing store misbehaved (or its output
    /// could not be turned into a valid header): carrying on would hand the
    /// application a phantom session, so the request fails instead.
    pub async fn try_handle<B>(&self, mut request: Request<B>) -> Result<Response<B>, SessionError>
    where
        B: Send + 'static,
        H: Handler<B>,
    {
        let candidate = self.candidate_id(&request);
        let session = Session::load(&self.store, &self.config, candidate).await?;
        request.extensions_mut().insert(session.clone());

        let mut response = self.inner.handle(request).await;

        if let Some(cookie) = session.finalize().await? {
            let mut response_cookies = ResponseCookies::new();
            response_cookies.insert(cookie);
            for value in response_cookies.header_values(&self.processor) {
                let value = HeaderValue::from_str(&value)
                    .map_err(SessionError::InvalidCookieHeader)?;
                response.headers_mut().append(SET_COOKIE, value);
            }
        }
        Ok(response)
    }

    /// Extract the candidate session id from the `Cookie` header(s) of the
    /// incoming request.
    ///
    /// Anything short of a well-formed cookie carrying a parsable id (no
    /// header, an undecodable header, a malformed cookie string) degrades
    /// to "no session presented".
    fn candidate_id<B>(&self, request: &Request<B>) -> Option<SessionId> {
        let mut cookies = RequestCookies::new();
        for header in request.headers().get_all(COOKIE).into_iter() {
            let Ok(header) = header.to_str() else {
                tracing::warn!("The `Cookie` header is not printable ASCII, ignoring it.");
                continue;
            };
            if let Err(e) = cookies.extend_from_header(header, &self.processor) {
                tracing::warn!(
                    error.message = %e,
                    "Failed to parse the `Cookie` header, treating the request as session-less."
                );
                return None;
            }
        }
        codec::decode(&cookies, &self.config.cookie.name)
    }
}

#[async_trait::async_trait]
impl<B, H> Handler<B> for SessionMiddleware<H>
where
    B: Default + Send + 'static,
    H: Handler<B>,
{
    async fn handle(&self, request: Request<B>) -> Response<B> {
        match self.try_handle(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    error.message = %e,
                    error.details = ?e,
                    "Failed to process the session for the current request."
                );
                e.into_response()
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
/// The error returned by [`SessionMiddleware::try_handle`].
pub enum SessionError {
    #[error("Failed to initialize the session for the incoming request")]
    /// The session could not be resolved from the store.
    Load(#[from] LoadSessionError),
    #[error("Failed to commit the session at the end of the request")]
    /// The session could not be committed back to the store.
    Finalize(#[from] FinalizeError),
    #[error("The rendered session cookie is not a valid `Set-Cookie` header value")]
    /// The rendered cookie could not be attached to the response headers.
    InvalidCookieHeader(#[source] http::header::InvalidHeaderValue),
}

impl SessionError {
    /// Convert the error into a response.
    pub fn into_response<B: Default>(&self) -> Response<B> {
        let mut response = Response::new(B::default());
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    }
}
