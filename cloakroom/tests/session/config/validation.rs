//! Invalid configurations must be rejected eagerly, at construction time.
use std::time::Duration;

use cloakroom::{config::InvalidSessionConfig, SessionConfig, SessionMiddleware};
use http::{Request, Response};

use crate::fixtures::store;

#[test]
fn the_default_configuration_is_valid() {
    SessionConfig::default().validate().unwrap();
}

#[test]
fn an_empty_cookie_name_is_rejected() {
    let mut config = SessionConfig::default();
    config.cookie.name = String::new();
    let err = config.validate().unwrap_err();
    assert!(matches!(err, InvalidSessionConfig::EmptyCookieName));
}

#[test]
fn cookie_names_must_be_http_tokens() {
    for name in ["my cookie", "name;", "equals=sign", "sla/sh", "héllo"] {
        let mut config = SessionConfig::default();
        config.cookie.name = name.to_owned();
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, InvalidSessionConfig::InvalidCookieName { .. }),
            "`{name}` was accepted as a cookie name"
        );
    }
}

#[test]
fn a_zero_expiry_window_is_rejected() {
    let mut config = SessionConfig::default();
    config.expire_after = Some(Duration::ZERO);
    let err = config.validate().unwrap_err();
    assert!(matches!(err, InvalidSessionConfig::ZeroExpireAfter));
}

#[tokio::test]
async fn middleware_construction_fails_fast_on_a_bad_config() {
    async fn echo(_request: Request<String>) -> Response<String> {
        Response::new(String::new())
    }

    let mut config = SessionConfig::default();
    config.cookie.name = "not a token".into();

    let err = SessionMiddleware::new(echo, store(), config).unwrap_err();
    assert!(matches!(err, InvalidSessionConfig::InvalidCookieName { .. }));
}
