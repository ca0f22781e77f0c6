//! Echo channel handler.

use super::upgrade;
use crate::handlers::{text, ResponseBody};
use futures_util::{SinkExt, StreamExt};
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, trace, warn};

/// Totals for one echo session
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EchoStats {
    pub messages: u64,
    pub bytes: u64,
}

/// Answer the upgrade request and start the echo loop on its own task.
///
/// The returned response is either the `101` that hands the connection
/// over, or a rejection that leaves it in HTTP mode.
pub fn handle<B>(mut request: Request<B>) -> Response<ResponseBody> {
    let key = match upgrade::validate(&request) {
        Ok(key) => key.clone(),
        Err(rejection) => {
            warn!(reason = %rejection, "WebSocket upgrade failed");
            return rejection.response();
        }
    };

    let response = match upgrade::accept_response(&key) {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "Failed to build upgrade response");
            return text(StatusCode::INTERNAL_SERVER_ERROR, "upgrade failed\n");
        }
    };

    // Resolves once hyper has written the 101 and released the socket,
    // including any frames the client sent right behind the handshake
    let on_upgrade = hyper::upgrade::on(&mut request);

    tokio::spawn(async move {
        match on_upgrade.await {
            Ok(upgraded) => {
                let ws =
                    WebSocketStream::from_raw_socket(TokioIo::new(upgraded), Role::Server, None)
                        .await;
                trace!("Echo channel open");

                let stats = echo(ws).await;
                debug!(
                    messages = stats.messages,
                    bytes = stats.bytes,
                    "Echo channel closed"
                );
            }
            Err(e) => debug!(error = %e, "Upgrade did not complete"),
        }
    });

    response
}

/// Send every text or binary message straight back.
///
/// Control frames are answered by the WebSocket layer itself. The loop ends
/// on a close frame, end-of-stream, or the first read or write error.
pub async fn echo<S>(mut ws: WebSocketStream<S>) -> EchoStats
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stats = EchoStats::default();

    while let Some(message) = ws.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                trace!(error = %e, "Echo read ended");
                break;
            }
        };

        match message {
            Message::Text(_) | Message::Binary(_) => {
                let len = message.len() as u64;
                if let Err(e) = ws.send(message).await {
                    debug!(error = %e, "Echo write failed");
                    break;
                }
                stats.messages += 1;
                stats.bytes += len;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Flushes the close handshake if one is pending; the peer may be gone
    let _ = ws.close(None).await;
    stats
}
