//! Upload sink.
//!
//! Reads the request body to the end and throws it away so the client can
//! time how long the transfer took. Nothing in the body is inspected.
//!
//! ```text
//! body fully read  -> 200 "OK"
//! read error/EOF   -> 500 "Failed to read body"
//! over the limit   -> 413 (only when `max_upload_size` is configured)
//! ```
//!
//! `Expect: 100-continue` is answered by hyper the first time the body is
//! polled, so a declared oversize body is refused before the client sends it.

use crate::handlers::{text, ResponseBody};
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::header::{HeaderValue, CONNECTION};
use hyper::{Request, Response, StatusCode};
use std::fmt::Display;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Handle an upload request
pub async fn handle<B>(request: Request<B>, limit: Option<u64>) -> Response<ResponseBody>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Display,
{
    let mut body = request.into_body();

    // The lower bound is the declared Content-Length, when there is one
    if let Some(limit) = limit {
        let declared = body.size_hint().lower();
        if declared > limit {
            warn!(length = declared, limit, "Upload exceeds limit");
            return closing(text(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large\n"));
        }
    }

    let start = Instant::now();
    let mut received: u64 = 0;

    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                if let Some(data) = frame.data_ref() {
                    received += data.len() as u64;
                }
                if limit.is_some_and(|limit| received > limit) {
                    warn!(received, "Upload exceeds limit");
                    return closing(text(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        "Request body too large\n",
                    ));
                }
            }
            Err(e) => {
                debug!(error = %e, bytes = received, "Upload body read failed");
                return closing(text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to read body\n",
                ));
            }
        }
    }

    debug!(
        bytes = received,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Upload drained"
    );
    text(StatusCode::OK, "OK")
}

/// The rest of the body is never read, so the connection can't be reused
fn closing(mut response: Response<ResponseBody>) -> Response<ResponseBody> {
    response
        .headers_mut()
        .insert(CONNECTION, HeaderValue::from_static("close"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use http_body_util::{Empty, Full, StreamBody};
    use hyper::body::Frame;
    use std::io;

    async fn body_text(response: Response<ResponseBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn chunks(
        items: Vec<Result<Vec<u8>, io::ErrorKind>>,
    ) -> StreamBody<impl futures_util::Stream<Item = Result<Frame<Bytes>, io::Error>> + Unpin> {
        StreamBody::new(stream::iter(items.into_iter().map(|item| {
            item.map(|data| Frame::data(Bytes::from(data)))
                .map_err(io::Error::from)
        })))
    }

    #[tokio::test]
    async fn test_drains_fixed_body() {
        let request = Request::post("/upload")
            .body(Full::new(Bytes::from(vec![0xABu8; 10_000])))
            .unwrap();

        let response = handle(request, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(CONNECTION).is_none());
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn test_empty_body_is_ok() {
        let request = Request::post("/upload").body(Empty::<Bytes>::new()).unwrap();

        let response = handle(request, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn test_drains_streamed_body() {
        let request = Request::post("/upload")
            .body(chunks(vec![
                Ok(b"abcd".to_vec()),
                Ok(Vec::new()),
                Ok(b"efgh".to_vec()),
            ]))
            .unwrap();

        let response = handle(request, None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_read_error_yields_500() {
        let request = Request::post("/upload")
            .body(chunks(vec![
                Ok(vec![0u8; 100]),
                Err(io::ErrorKind::ConnectionReset),
            ]))
            .unwrap();

        let response = handle(request, None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[CONNECTION], "close");

        let body = body_text(response).await;
        assert_eq!(body, "Failed to read body\n");
        assert_ne!(body, "OK");
    }

    #[tokio::test]
    async fn test_limit_rejects_declared_length() {
        let request = Request::post("/upload")
            .body(Full::new(Bytes::from(vec![0u8; 2048])))
            .unwrap();

        let response = handle(request, Some(1024)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.headers()[CONNECTION], "close");
    }

    #[tokio::test]
    async fn test_limit_applies_to_streamed_body() {
        let request = Request::post("/upload")
            .body(chunks(vec![
                Ok(vec![0u8; 600]),
                Ok(vec![0u8; 600]),
                Ok(vec![0u8; 600]),
            ]))
            .unwrap();

        let response = handle(request, Some(1024)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_limit_allows_exact_size() {
        let request = Request::post("/upload")
            .body(chunks(vec![Ok(vec![0u8; 512]), Ok(vec![0u8; 512])]))
            .unwrap();

        let response = handle(request, Some(1024)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
