use biscotti::ResponseCookie;
use cloakroom::SessionId;
use http::header::SET_COOKIE;
use http::{Request, Response};

/// Parse the response cookie created by finalizing the session.
pub struct SetCookie {
    pub id: SessionId,
    pub cookie: ResponseCookie<'static>,
}

impl SetCookie {
    pub fn parse(cookie: ResponseCookie<'static>) -> Self {
        let id = cookie
            .value()
            .parse()
            .expect("The session cookie value is not a valid session id");
        Self { id, cookie }
    }
}

/// The raw `Set-Cookie` header attached to a response, if any.
pub fn set_cookie<B>(response: &Response<B>) -> Option<&str> {
    response
        .headers()
        .get(SET_COOKIE)
        .map(|value| value.to_str().expect("`Set-Cookie` is not printable ASCII"))
}

/// The `name=value` pair at the front of a `Set-Cookie` line, attributes
/// stripped: what the client would replay in its `Cookie` header.
pub fn cookie_pair(set_cookie: &str) -> &str {
    set_cookie
        .split(';')
        .next()
        .expect("`Set-Cookie` line is empty")
        .trim()
}

/// The session id carried by a `Set-Cookie` line.
pub fn cookie_id(set_cookie: &str) -> SessionId {
    let (_, value) = cookie_pair(set_cookie)
        .split_once('=')
        .expect("`Set-Cookie` line has no `name=value` pair");
    value
        .parse()
        .expect("The session cookie value is not a valid session id")
}

/// A GET request with no cookies attached.
pub fn request() -> Request<String> {
    Request::builder()
        .uri("/")
        .body(String::new())
        .expect("Failed to build the test request")
}

/// A GET request replaying the given `name=value` cookie pair.
pub fn request_with_cookie(pair: &str) -> Request<String> {
    Request::builder()
        .uri("/")
        .header(http::header::COOKIE, pair)
        .body(String::new())
        .expect("Failed to build the test request")
}
