//! Request handlers, one per route.
//!
//! - `download`: streams random payload by byte count or duration
//! - `upload`: drains and discards the request body
//! - `ping`: WebSocket echo channel for round-trip timing
//!
//! Every handler answers with a [`ResponseBody`]; hyper picks the wire
//! framing from the body's size hint and the response headers.

pub mod download;
pub mod ping;
pub mod upload;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::header::{HeaderValue, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use hyper::{Response, StatusCode};
use std::convert::Infallible;

/// Body type shared by all responses
pub type ResponseBody = BoxBody<Bytes, Infallible>;

pub fn empty() -> ResponseBody {
    Empty::<Bytes>::new().boxed()
}

pub fn full(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into()).boxed()
}

/// Short plain-text response
pub fn text(status: StatusCode, body: &'static str) -> Response<ResponseBody> {
    let mut response = Response::new(full(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}

/// Response for paths outside the route table
pub fn not_found() -> Response<ResponseBody> {
    text(StatusCode::NOT_FOUND, "404 page not found")
}
