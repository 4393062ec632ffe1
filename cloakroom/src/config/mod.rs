//! Types related to [`SessionConfig`][crate::SessionConfig].
mod cookie;

pub use cookie::SessionCookieConfig;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
/// The error returned when a [`SessionConfig`][crate::SessionConfig] is rejected
/// at middleware construction time.
pub enum InvalidSessionConfig {
    #[error("The session cookie name cannot be empty")]
    /// The session cookie name is empty.
    EmptyCookieName,
    #[error("`{name}` cannot be used as a session cookie name: cookie names must be valid HTTP tokens")]
    /// The session cookie name contains characters that are not allowed in a cookie name.
    InvalidCookieName {
        /// The rejected cookie name.
        name: String,
    },
    #[error("`expire_after` must be strictly positive")]
    /// The configured expiry window is zero seconds.
    ZeroExpireAfter,
}
