//! Permissive CORS headers for the browser-facing routes.
//!
//! Browsers run the speed test from another origin, so `/download` and
//! `/upload` accept any origin, method and header. The `/ping` upgrade is
//! left without these headers.

use crate::handlers::{empty, ResponseBody};
use hyper::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN,
};
use hyper::{Response, StatusCode};

const ALLOW_ORIGIN: &str = "*";
const ALLOW_METHODS: &str = "*";
const ALLOW_HEADERS: &str = "*";

/// Add the CORS headers to a response
pub fn apply(headers: &mut HeaderMap) {
    headers.insert(
        ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(ALLOW_ORIGIN),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
}

/// Answer to an `OPTIONS` preflight. The router applies the CORS headers
/// like for any other response on these routes.
pub fn preflight() -> Response<ResponseBody> {
    let mut response = Response::new(empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}
