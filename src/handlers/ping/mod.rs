//! Echo channel for round-trip-time measurement.
//!
//! `/ping` upgrades to a WebSocket and sends every data message back
//! unchanged, text as text and binary as binary. The client measures the
//! time between sending a message and receiving its echo.
//!
//! ## Lifecycle
//!
//! ```text
//! HTTP request --valid upgrade--> Open --close/read error/write error--> Closed
//!              --invalid-------->  rejection response, no channel
//! ```
//!
//! Any origin may connect. There is no idle timeout; the channel lives as
//! long as the client keeps it open.

pub mod handler;
pub mod upgrade;

pub use handler::handle;
