//! WebSocket opening handshake validation.

use crate::handlers::{empty, text, ResponseBody};
use hyper::header::{
    HeaderMap, HeaderName, HeaderValue, CONNECTION, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY,
    SEC_WEBSOCKET_VERSION, UPGRADE,
};
use hyper::{Method, Request, Response, StatusCode};
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;

/// The only protocol version accepted
pub const WEBSOCKET_VERSION: &str = "13";

/// Reasons an upgrade request is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// `Connection` lacks the `upgrade` token
    NotUpgrade,
    /// `Upgrade` does not name `websocket`
    NotWebSocket,
    /// Method other than GET
    MethodNotGet,
    /// `Sec-WebSocket-Version` other than 13
    UnsupportedVersion,
    /// `Sec-WebSocket-Key` missing or empty
    MissingKey,
}

impl Rejection {
    fn message(&self) -> &'static str {
        match self {
            Rejection::NotUpgrade => "missing 'upgrade' token in Connection header",
            Rejection::NotWebSocket => "missing 'websocket' token in Upgrade header",
            Rejection::MethodNotGet => "upgrade request method is not GET",
            Rejection::UnsupportedVersion => "unsupported Sec-WebSocket-Version",
            Rejection::MissingKey => "missing Sec-WebSocket-Key header",
        }
    }

    /// Response sent back in place of the upgrade
    pub fn response(&self) -> Response<ResponseBody> {
        match self {
            Rejection::MethodNotGet => text(StatusCode::METHOD_NOT_ALLOWED, self.message()),
            Rejection::UnsupportedVersion => {
                let mut response = text(StatusCode::UPGRADE_REQUIRED, self.message());
                response.headers_mut().insert(
                    SEC_WEBSOCKET_VERSION,
                    HeaderValue::from_static(WEBSOCKET_VERSION),
                );
                response
            }
            _ => text(StatusCode::BAD_REQUEST, self.message()),
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Whether any comma-separated element of the header equals `token`
fn has_token(headers: &HeaderMap, name: HeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|element| element.trim().eq_ignore_ascii_case(token))
}

/// Check the handshake headers and return the client key.
///
/// `Origin` is deliberately not checked.
pub fn validate<B>(request: &Request<B>) -> Result<&HeaderValue, Rejection> {
    let headers = request.headers();

    if !has_token(headers, CONNECTION, "upgrade") {
        return Err(Rejection::NotUpgrade);
    }
    if !has_token(headers, UPGRADE, "websocket") {
        return Err(Rejection::NotWebSocket);
    }
    if request.method() != Method::GET {
        return Err(Rejection::MethodNotGet);
    }
    if headers
        .get(SEC_WEBSOCKET_VERSION)
        .map_or(true, |version| version != WEBSOCKET_VERSION)
    {
        return Err(Rejection::UnsupportedVersion);
    }

    match headers.get(SEC_WEBSOCKET_KEY) {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(Rejection::MissingKey),
    }
}

/// `101 Switching Protocols` answer for a validated key
pub fn accept_response(key: &HeaderValue) -> Result<Response<ResponseBody>, hyper::http::Error> {
    Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(UPGRADE, "websocket")
        .header(CONNECTION, "Upgrade")
        .header(SEC_WEBSOCKET_ACCEPT, derive_accept_key(key.as_bytes()))
        .body(empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

    fn upgrade_request() -> hyper::http::request::Builder {
        Request::get("/ping")
            .header("Host", "localhost")
            .header("Connection", "keep-alive, Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header("Origin", "https://anywhere.example")
    }

    #[test]
    fn test_valid_upgrade() {
        let request = upgrade_request()
            .header("Sec-WebSocket-Key", KEY)
            .body(())
            .unwrap();
        assert_eq!(validate(&request).unwrap(), KEY);
    }

    #[test]
    fn test_accept_key() {
        let response = accept_response(&HeaderValue::from_static(KEY)).unwrap();
        assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
        assert_eq!(
            response.headers()[SEC_WEBSOCKET_ACCEPT],
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
        assert_eq!(response.headers()[UPGRADE], "websocket");
    }

    #[test]
    fn test_plain_request_rejected() {
        let request = Request::get("/ping")
            .header("Host", "localhost")
            .body(())
            .unwrap();
        let rejection = validate(&request).unwrap_err();
        assert_eq!(rejection, Rejection::NotUpgrade);
        assert_eq!(rejection.response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_wrong_method_rejected() {
        let request = upgrade_request()
            .method(Method::POST)
            .header("Sec-WebSocket-Key", KEY)
            .body(())
            .unwrap();
        let rejection = validate(&request).unwrap_err();
        assert_eq!(rejection, Rejection::MethodNotGet);
        assert_eq!(
            rejection.response().status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[test]
    fn test_wrong_version_rejected() {
        let mut request = upgrade_request()
            .header("Sec-WebSocket-Key", KEY)
            .body(())
            .unwrap();
        request
            .headers_mut()
            .insert(SEC_WEBSOCKET_VERSION, HeaderValue::from_static("8"));

        let rejection = validate(&request).unwrap_err();
        assert_eq!(rejection, Rejection::UnsupportedVersion);

        let response = rejection.response();
        assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
        assert_eq!(response.headers()[SEC_WEBSOCKET_VERSION], "13");
    }

    #[test]
    fn test_missing_key_rejected() {
        let request = upgrade_request().body(()).unwrap();
        assert_eq!(validate(&request), Err(Rejection::MissingKey));
    }

    #[test]
    fn test_upgrade_token_must_be_websocket() {
        let mut request = upgrade_request()
            .header("Sec-WebSocket-Key", KEY)
            .body(())
            .unwrap();
        request
            .headers_mut()
            .insert(UPGRADE, HeaderValue::from_static("h2c"));
        assert_eq!(validate(&request), Err(Rejection::NotWebSocket));
    }
}
