//! Parsing and rendering of the session cookie.
//!
//! The cookie value is the session ID, verbatim. Everything else the client
//! may send in the `Cookie` header is ignored; everything the server sends
//! back is derived from [`SessionCookieConfig`].
use std::time::Duration;

use biscotti::{Expiration, RequestCookies, ResponseCookie};
use time::OffsetDateTime;

use crate::{config::SessionCookieConfig, SessionId};

/// Extract the candidate session ID from the parsed request cookies.
///
/// A missing cookie, a cookie registered under a different name, or a value
/// that doesn't parse as a session ID all yield `None`: the request is then
/// treated as if no session cookie had been presented at all.
pub(crate) fn decode(cookies: &RequestCookies<'_>, cookie_name: &str) -> Option<SessionId> {
    let cookie = cookies.get(cookie_name)?;
    match cookie.value().parse::<SessionId>() {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(
                error.message = %e,
                "The value of the session cookie is not a valid session id, \
                starting a new session."
            );
            None
        }
    }
}

/// Render the outgoing session cookie.
///
/// Attributes are attached only when configured. An expiry window turns the
/// cookie into a persistent one by stamping an `Expires` attribute at
/// `now + expire_after`; without it, the cookie lives for the duration of
/// the browser session.
pub(crate) fn encode(
    config: &SessionCookieConfig,
    id: SessionId,
    expire_after: Option<Duration>,
) -> ResponseCookie<'static> {
    let mut cookie = ResponseCookie::new(config.name.clone(), id.to_string());
    if let Some(domain) = config.domain.as_deref() {
        cookie = cookie.set_domain(domain.to_owned());
    }
    if let Some(path) = config.path.as_deref() {
        cookie = cookie.set_path(path.to_owned());
    }
    if let Some(same_site) = config.same_site {
        cookie = cookie.set_same_site(same_site);
    }
    if config.secure {
        cookie = cookie.set_secure(true);
    }
    if config.http_only {
        cookie = cookie.set_http_only(true);
    }
    if let Some(expire_after) = expire_after {
        let deadline = OffsetDateTime::now_utc() + expire_after;
        cookie = cookie.set_expires(Expiration::DateTime(deadline));
    }
    cookie
}
