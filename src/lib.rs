//! A chunked, acknowledged link-layer protocol for carrying JSON-RPC 2.0
//! request/response pairs over a point-to-point serial line (UART, virtual
//! COM port, or USB CDC-ACM).
//!
//! A raw serial link has no message boundaries, no flow control above the
//! UART itself, and no guarantee that a single read returns a complete
//! logical unit. [`frame`] defines the on-wire frame format and a chunked
//! split/reassembly codec; [`link`] drives that codec over an open port
//! with per-chunk ACK waits and reopen-on-error recovery; [`rpc`] is the
//! thin JSON-RPC adapter on top, with [`RpcCaller`] on the calling side and
//! [`RpcResponder`] on the serving side.
//!
//! ```no_run
//! # fn example() -> kuda::Result<()> {
//! use kuda::LinkEndpointBuilder;
//!
//! let mut endpoint = LinkEndpointBuilder::new().with_serial("/dev/ttyUSB0").build()?;
//! endpoint.send(b"test")?;
//! let reply = endpoint.receive()?;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;
use thiserror::Error;

pub mod builder;
pub mod config;
pub mod frame;
pub mod link;
pub mod rpc;

pub use builder::LinkEndpointBuilder;
pub use config::LinkConfig;

#[cfg(feature = "sync")]
pub use link::LinkEndpoint;
pub use rpc::{Dispatcher, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ResponseSink};

#[cfg(feature = "sync")]
pub use rpc::{RpcCaller, RpcResponder};

#[cfg(feature = "async")]
pub use link::LinkEndpointAsync;

/// Errors surfaced by this crate.
///
/// Every fallible operation in `kuda` returns one of these kinds rather than
/// a raw `std::io::Error`, so a caller can match on *why* a round trip
/// failed instead of inspecting an `io::ErrorKind`.
#[derive(Error, Debug)]
pub enum Error {
    /// The serial port could not be acquired.
    #[error("could not open serial port {port:?}: {source}")]
    PortOpen {
        port: String,
        #[source]
        source: std::io::Error,
    },
    /// A port read returned an error (not a timeout).
    #[error("serial port read failed: {0}")]
    PortRead(#[source] std::io::Error),
    /// A port write returned an error.
    #[error("serial port write failed: {0}")]
    PortWrite(#[source] std::io::Error),
    /// No ACK frame arrived within `ack_timeout` after a chunk was written.
    #[error("no ACK received within {0:?}")]
    AckTimeout(Duration),
    /// Bytes began arriving but the frame did not complete within `ack_timeout`.
    #[error("frame did not complete within {0:?}")]
    PartialTimeout(Duration),
    /// The framer or JSON-RPC decoder rejected the received bytes.
    #[error("malformed frame or envelope: {0}")]
    ParseError(String),
    /// The remote JSON-RPC response carried a non-zero `error.code`.
    #[error("remote error {code}: {message}")]
    RemoteError { code: i64, message: String },
    /// A builder or config value failed validation before any I/O happened.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::ParseError(e.to_string())
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
