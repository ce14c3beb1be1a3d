//! Drives [`crate::frame`] over an open serial port: chunked send with
//! per-chunk ACK waits, a receive loop that ACKs every chunk, and
//! reopen-on-error recovery.

use std::io::ErrorKind;
use std::time::Duration;

use crate::{Error, Result};

#[cfg(feature = "sync")]
mod sync_link;
#[cfg(feature = "sync")]
pub use sync_link::LinkEndpoint;

#[cfg(feature = "async")]
mod async_link;
#[cfg(feature = "async")]
pub use async_link::LinkEndpointAsync;

#[cfg(all(test, feature = "sync"))]
pub(crate) mod test_support;

/// Default baud rate when none is configured.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default time to wait for an ACK, or for a frame in progress to complete.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(1);

/// Size of the scratch buffer used for a single `read` syscall. Independent
/// of `chunk_size` — it just bounds how much unparsed data can accumulate
/// between parse attempts.
const READ_SCRATCH_SIZE: usize = 4096;

/// Stand-in for "no timeout" (idle wait for the first byte of a new frame).
/// `serial2`/`serial2-tokio` take a concrete [`Duration`] rather than an
/// `Option`/sentinel, so unbounded waiting is represented as the largest
/// representable duration (see `DESIGN.md`, "Open Question decisions").
pub const INFINITE_READ_TIMEOUT: Duration = Duration::MAX;

/// Minimal synchronous serial-port surface [`LinkEndpoint`] needs. Satisfied
/// by `serial2::SerialPort`; a test double implements it over an in-memory
/// duplex pipe.
pub trait SerialLike: Sized {
    /// Opens the named port at the given baud rate.
    fn open(name: &str, baud_rate: u32) -> std::io::Result<Self>;
    /// Reads into `buf`. A timeout must be surfaced as an `Err` of kind
    /// `TimedOut` or `WouldBlock`, never as `Ok(0)` — `Ok(0)` is reserved
    /// for a genuine short read and is treated the same as a timeout by
    /// [`LinkEndpoint`].
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
    /// Writes the entirety of `buf` or fails.
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()>;
    /// Sets the timeout applied to the next call to [`SerialLike::read`].
    fn set_read_timeout(&mut self, timeout: Duration) -> std::io::Result<()>;
}

/// Classifies a raw I/O read result into the three outcomes `read_frame`
/// cares about: bytes were read, the read timed out (treated as `n == 0`),
/// or a genuine I/O failure occurred.
#[cfg(feature = "sync")]
fn classify_read(result: std::io::Result<usize>) -> Result<usize> {
    match result {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => Ok(0),
        Err(e) => Err(Error::PortRead(e)),
    }
}
