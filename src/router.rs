//! Route table: request path to handler.

use crate::cors;
use crate::handlers::{self, download, ping, upload, ResponseBody};
use bytes::Bytes;
use hyper::body::Body;
use hyper::header::{HeaderValue, SERVER};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::fmt::Display;
use tracing::trace;

/// Value of the `Server` response header
pub const SERVER_NAME: &str = concat!("speedtest-engine/", env!("CARGO_PKG_VERSION"));

/// A routed endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Download,
    Upload,
    Ping,
    NotFound,
}

impl Route {
    /// Exact-match lookup on the request path
    pub fn resolve(path: &str) -> Route {
        match path {
            "/download" => Route::Download,
            "/upload" => Route::Upload,
            "/ping" => Route::Ping,
            _ => Route::NotFound,
        }
    }

    /// Whether responses on this route carry CORS headers
    pub fn cors(&self) -> bool {
        matches!(self, Route::Download | Route::Upload)
    }
}

/// Run the handler for one request
pub async fn dispatch<B>(
    request: Request<B>,
    max_upload_size: Option<u64>,
) -> Result<Response<ResponseBody>, Infallible>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Display,
{
    let route = Route::resolve(request.uri().path());
    trace!(method = %request.method(), path = request.uri().path(), ?route, "Request");

    let mut response = if route.cors() && request.method() == Method::OPTIONS {
        cors::preflight()
    } else {
        match route {
            Route::Download => download::handle(&request),
            Route::Upload => upload::handle(request, max_upload_size).await,
            Route::Ping => ping::handle(request),
            Route::NotFound => handlers::not_found(),
        }
    };

    let headers = response.headers_mut();
    if route.cors() {
        cors::apply(headers);
    }
    headers.insert(SERVER, HeaderValue::from_static(SERVER_NAME));

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::download::params::DEFAULT_DURATION;
    use http_body_util::{BodyExt, Empty, Full};
    use hyper::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_LENGTH};
    use hyper::StatusCode;
    use std::time::Duration;

    fn request(method: Method, uri: &str) -> Request<Empty<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Empty::new())
            .unwrap()
    }

    #[test]
    fn test_resolve() {
        assert_eq!(Route::resolve("/download"), Route::Download);
        assert_eq!(Route::resolve("/upload"), Route::Upload);
        assert_eq!(Route::resolve("/ping"), Route::Ping);
        assert_eq!(Route::resolve("/"), Route::NotFound);
        assert_eq!(Route::resolve("/download/"), Route::NotFound);
        assert_eq!(Route::resolve("/DOWNLOAD"), Route::NotFound);
    }

    #[test]
    fn test_cors_only_on_http_routes() {
        assert!(Route::Download.cors());
        assert!(Route::Upload.cors());
        assert!(!Route::Ping.cors());
        assert!(!Route::NotFound.cors());
    }

    #[tokio::test]
    async fn test_preflight_skips_handler() {
        let response = dispatch(request(Method::OPTIONS, "/upload"), Some(0))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()[SERVER], SERVER_NAME);
    }

    #[tokio::test]
    async fn test_upload_route() {
        let request = Request::put("/upload")
            .body(Full::new(Bytes::from_static(b"payload")))
            .unwrap();
        let response = dispatch(request, None).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_unknown_path_has_no_cors() {
        let response = dispatch(request(Method::GET, "/nope"), None)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert_eq!(response.headers()[SERVER], SERVER_NAME);
    }

    #[tokio::test]
    async fn test_ping_rejection_has_no_cors() {
        let response = dispatch(request(Method::GET, "/ping"), None)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_without_parameters_ends_at_default_deadline() {
        let response = dispatch(request(Method::GET, "/download"), None)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(response.headers().get(CONTENT_LENGTH).is_none());

        let start = tokio::time::Instant::now();
        let mut body = response.into_body();
        let mut bytes = 0u64;

        while let Some(frame) = body.frame().await {
            bytes += frame.unwrap().into_data().unwrap().len() as u64;
            tokio::time::advance(Duration::from_millis(250)).await;
        }

        assert_eq!(start.elapsed(), DEFAULT_DURATION);
        assert_eq!(bytes, 40 * 32 * 1024);
    }
}
