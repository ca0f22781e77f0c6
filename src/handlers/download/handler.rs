//! Download request handler.

use super::params::TransferParams;
use super::payload::{PayloadBody, TransferBuffer};
use crate::handlers::{empty, ResponseBody};
use http_body_util::BodyExt;
use hyper::header::{
    HeaderValue, CACHE_CONTROL, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, EXPIRES, PRAGMA,
};
use hyper::{Method, Request, Response, Version};
use tracing::trace;

/// Handle a download request.
///
/// The headers are committed before the first payload byte, so a failure
/// mid-stream is never reported to the client; the connection is simply
/// closed and the client sees a truncated body.
pub fn handle<B>(request: &Request<B>) -> Response<ResponseBody> {
    let params = TransferParams::from_query(request.uri().query());
    trace!(?params, "Download requested");

    let body = if request.method() == Method::HEAD {
        empty()
    } else {
        PayloadBody::new(params, TransferBuffer::new()).boxed()
    };

    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(EXPIRES, HeaderValue::from_static("0"));

    match params {
        TransferParams::ByteCount(size) => {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
        }
        // HTTP/1.0 has no chunked coding; the body ends at close
        TransferParams::Duration(_) if request.version() == Version::HTTP_10 => {
            headers.insert(CONNECTION, HeaderValue::from_static("close"));
        }
        // Unknown length, so HTTP/1.1 responses go out chunked
        TransferParams::Duration(_) => {}
    }

    response
}
