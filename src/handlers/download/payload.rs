//! Payload generation and the streaming response body.

use super::params::TransferParams;
use bytes::Bytes;
use hyper::body::{Body, Frame, SizeHint};
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::time::Instant;
use tracing::debug;

/// Size of the block written per frame
pub const TRANSFER_BUFFER_SIZE: usize = 32 * 1024;

/// Random block reused for every frame of one download.
///
/// Filled once from a fast non-cryptographic generator; the client throws
/// the bytes away, so they only need to be incompressible. Frames are
/// reference-counted views into the block, never copies.
#[derive(Clone)]
pub struct TransferBuffer {
    data: Bytes,
}

impl TransferBuffer {
    pub fn new() -> Self {
        let mut data = vec![0u8; TRANSFER_BUFFER_SIZE];
        SmallRng::from_entropy().fill_bytes(&mut data);
        TransferBuffer {
            data: Bytes::from(data),
        }
    }

    /// The first `len` bytes of the block
    fn frame(&self, len: usize) -> Bytes {
        self.data.slice(..len)
    }
}

#[derive(Debug, Clone, Copy)]
enum Limit {
    /// Payload bytes still to send
    Remaining(u64),
    /// Stop once this instant passes; `None` never expires
    Until(Option<Instant>),
}

/// Response body that yields the transfer buffer until its limit is hit.
///
/// Frames are produced on demand, so the connection's write side paces the
/// stream. When the client goes away the body is dropped mid-stream and the
/// transfer is logged as aborted.
pub struct PayloadBody {
    buffer: TransferBuffer,
    limit: Limit,
    sent: u64,
    started: Instant,
    finished: bool,
}

impl PayloadBody {
    /// Start a transfer. A duration's deadline is fixed here, before the
    /// first frame goes out.
    pub fn new(params: TransferParams, buffer: TransferBuffer) -> Self {
        let started = Instant::now();
        let limit = match params {
            TransferParams::ByteCount(size) => Limit::Remaining(size),
            TransferParams::Duration(duration) => Limit::Until(started.checked_add(duration)),
        };

        PayloadBody {
            buffer,
            limit,
            sent: 0,
            started,
            finished: false,
        }
    }
}

impl Body for PayloadBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        let len = match &mut this.limit {
            Limit::Remaining(0) => None,
            Limit::Remaining(remaining) => {
                let len = (*remaining).min(TRANSFER_BUFFER_SIZE as u64) as usize;
                *remaining -= len as u64;
                Some(len)
            }
            Limit::Until(deadline) => {
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    None
                } else {
                    Some(TRANSFER_BUFFER_SIZE)
                }
            }
        };

        match len {
            Some(len) => {
                this.sent += len as u64;
                Poll::Ready(Some(Ok(Frame::data(this.buffer.frame(len)))))
            }
            None => {
                this.finished = true;
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        matches!(self.limit, Limit::Remaining(0))
    }

    fn size_hint(&self) -> SizeHint {
        match self.limit {
            Limit::Remaining(remaining) => SizeHint::with_exact(remaining),
            Limit::Until(_) => SizeHint::default(),
        }
    }
}

impl Drop for PayloadBody {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        if self.finished || self.is_end_stream() {
            debug!(bytes = self.sent, elapsed_ms, "Download complete");
        } else {
            debug!(bytes = self.sent, elapsed_ms, "Download aborted");
        }
    }
}
