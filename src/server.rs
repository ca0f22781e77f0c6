//! TCP server for the speed-test endpoints.
//!
//! Accepts connections and serves each one with hyper's HTTP/1.1 connection
//! driver, routing requests to the download, upload and ping handlers.
//! Keep-alive, pipelining, `100 Continue` and response framing are handled
//! by hyper.

use crate::config::Config;
use crate::router;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use socket2::{Domain, Protocol, Socket, Type};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, trace, warn};

/// Listen backlog
const LISTEN_BACKLOG: i32 = 1024;

/// Largest request head accepted; bigger heads get `431`
const MAX_HEAD_SIZE: usize = 64 * 1024;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Server instance
pub struct Server {
    config: Config,
    listener: TcpListener,
    connection_limit: Arc<Semaphore>,
}

impl Server {
    /// Bind the listening socket
    pub async fn bind(config: Config) -> io::Result<Self> {
        let addr = tokio::net::lookup_host(config.listen_addr())
            .await?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("no address for {}", config.listen_addr()),
                )
            })?;

        let listener = create_listener(addr)?;
        let connection_limit = Arc::new(Semaphore::new(config.max_connections));

        Ok(Server {
            config,
            listener,
            connection_limit,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until Ctrl-C
    pub async fn run(self) -> Result<(), BoxError> {
        self.run_until(shutdown_signal()).await
    }

    /// Accept connections until `shutdown` completes.
    ///
    /// Connections already in progress are left to finish on their own.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), BoxError>
    where
        F: Future<Output = ()>,
    {
        info!(address = %self.local_addr()?, "Server listening");
        tokio::pin!(shutdown);

        loop {
            // Wait for a connection slot
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = self.connection_limit.clone().acquire_owned() => permit?,
            };

            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "New connection");
                    if let Err(e) = stream.set_nodelay(true) {
                        trace!(%peer, error = %e, "Failed to set TCP_NODELAY");
                    }

                    let max_upload_size = self.config.max_upload_size;
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, max_upload_size).await {
                            if !e.is_incomplete_message() {
                                debug!(%peer, error = %e, "Connection error");
                            }
                        }
                        trace!(%peer, "Connection closed");
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }

        info!("Server shutting down");
        Ok(())
    }
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}

/// Create a TCP listener with SO_REUSEADDR.
fn create_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    TcpListener::from_std(socket.into())
}

/// Serve HTTP requests on one client connection until it closes.
///
/// Half-closed connections stay writable so a client that stops sending
/// mid-upload still gets its `500`.
async fn serve_connection<S>(stream: S, max_upload_size: Option<u64>) -> Result<(), hyper::Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = service_fn(move |request| router::dispatch(request, max_upload_size));

    http1::Builder::new()
        .keep_alive(true)
        .half_close(true)
        .max_buf_size(MAX_HEAD_SIZE)
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades()
        .await
}
