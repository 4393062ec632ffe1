/*!
Cookie-backed HTTP sessions, as a middleware.

# Why do we need sessions?

HTTP is stateless: each request is processed on its own, with no memory of
the requests that came before it. That is not enough for most applications:
think of authentication, shopping carts, multi-step flows. **Sessions** let
the server attach state to the set of requests coming from the same client.

The mechanism is built on cookies: the server hands the client an opaque
**session id** via the `Set-Cookie` header; the client (e.g. the browser)
replays it on every subsequent request using the `Cookie` header. The id is
the *only* thing that travels over the wire; the session state itself lives
server-side, in a **session store**, keyed by that id.

# Anatomy of a request

[`SessionMiddleware`] wraps your application (anything implementing
[`Handler`]). For every incoming request it:

1. extracts the candidate session id from the `Cookie` header and resolves
   the [`Session`]: a continuation of an existing one if the id is known to
   the [`SessionStore`], a brand-new one otherwise;
2. attaches the session to the request extensions and invokes the wrapped
   application, which reads and writes the session's key-value state (and
   may steer the end-of-request behavior via [`Session::invalidate`],
   [`Session::cycle_id`], [`Session::defer_cookie`] and
   [`Session::set_expire_after`]);
3. commits the session back to the store and decides whether a `Set-Cookie`
   header must be attached to the response. A continued session whose id did
   not change is *not* re-announced to the client, unless an expiry window
   is in effect and the client-side deadline must keep sliding.

# Storage backends

The store is pluggable: implement
[`SessionStorageBackend`](store::SessionStorageBackend) to commit sessions
to your system of choice. The `cloakroom_memory_store` crate provides the
in-process reference implementation.

## References

Further reading on sessions:
- [RFC 6265](https://datatracker.ietf.org/doc/html/rfc6265);
- [OWASP's session management cheat-sheet](https://cheatsheetseries.owasp.org/cheatsheets/Session_Management_Cheat_Sheet.html).
*/
pub mod config;

mod codec;
mod id;
mod middleware;
mod session_;
mod store_;

pub use id::SessionId;
pub use middleware::{Handler, SessionError, SessionMiddleware};
pub use session_::{Session, SessionOptions};
pub use store_::SessionStore;

pub mod store {
    //! Types and traits related to [`SessionStore`][super::SessionStore].
    pub use crate::store_::errors;
    pub use crate::store_::{SessionRecord, SessionRecordRef, SessionStorageBackend};
}

pub mod errors {
    //! Errors raised while resolving, manipulating or committing a session.
    pub use crate::id::InvalidSessionId;
    pub use crate::session_::errors::{
        FinalizeError, LoadSessionError, ValueDeserializationError, ValueSerializationError,
    };
}

use std::time::Duration;

use config::{InvalidSessionConfig, SessionCookieConfig};

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
/// Configure how sessions are managed.
///
/// The default configuration follows
/// [OWASP's guidelines for secure session management](https://github.com/OWASP/ASVS/blob/67726f1976a759c58a82669d0dad3b16b9c04ecc/4.0/en/0x12-V3-Session-management.md).
pub struct SessionConfig {
    #[serde(default)]
    /// Configure the session cookie.
    pub cookie: SessionCookieConfig,
    /// The expiry window applied to the session cookie.
    ///
    /// When set, the cookie is persistent: its `Expires` attribute is
    /// stamped `expire_after` from now and refreshed on every response, so
    /// that the client-side deadline slides as long as the client keeps
    /// visiting. When unset (the default), the cookie lives for the
    /// duration of the browser session.
    ///
    /// This only shapes the *client-side* lifetime of the cookie. Records
    /// are never evicted from the store on this basis.
    #[serde(default, with = "humantime_serde")]
    pub expire_after: Option<Duration>,
}

impl SessionConfig {
    /// Check the configuration for values that can only ever misbehave.
    ///
    /// Invoked by [`SessionMiddleware::new`], so that a bad configuration
    /// surfaces at construction time rather than on a per-request basis.
    pub fn validate(&self) -> Result<(), InvalidSessionConfig> {
        let name = &self.cookie.name;
        if name.is_empty() {
            return Err(InvalidSessionConfig::EmptyCookieName);
        }
        if !name.chars().all(is_cookie_token_char) {
            return Err(InvalidSessionConfig::InvalidCookieName { name: name.clone() });
        }
        if self.expire_after == Some(Duration::ZERO) {
            return Err(InvalidSessionConfig::ZeroExpireAfter);
        }
        Ok(())
    }
}

/// Cookie names must be HTTP tokens (RFC 6265, via RFC 2616 §2.2).
fn is_cookie_token_char(c: char) -> bool {
    c.is_ascii()
        && !c.is_ascii_control()
        && !matches!(
            c,
            '(' | ')'
                | '<'
                | '>'
                | '@'
                | ','
                | ';'
                | ':'
                | '\\'
                | '"'
                | '/'
                | '['
                | ']'
                | '?'
                | '='
                | '{'
                | '}'
                | ' '
        )
}
