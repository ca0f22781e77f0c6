//! Download responder.
//!
//! Streams random bytes so the client can measure download throughput:
//! - `GET /download?size=<bytes>`: exactly that many bytes, then stop
//! - `GET /download?duration=<seconds>`: write until the deadline passes
//! - `GET /download`: same as `duration=10`
//!
//! ## Termination
//!
//! A positive `size` always wins over `duration`. Anything that does not
//! parse to a positive integer falls back to the next option silently.
//!
//! The payload is a single 32 KiB random block handed out frame after
//! frame; the server never sleeps between frames, so the transport's flow
//! control is the only pacing. A failed write (client gone) drops the body
//! and ends the stream at once.
//!
//! ## Framing
//!
//! ```text
//! size mode:       Content-Length: <size>
//! duration mode:   Transfer-Encoding: chunked   (HTTP/1.1)
//!                  close-delimited              (HTTP/1.0)
//! HEAD:            headers only
//! ```
//!
//! The framing itself is written by hyper from the headers and the body's
//! size hint.

pub mod handler;
pub mod params;
pub mod payload;

pub use handler::handle;
