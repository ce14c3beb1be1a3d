//! In-memory duplex pipe standing in for the external serial-port
//! collaborator, used by this crate's own unit tests. The integration
//! tests under `tests/` carry an equivalent copy built only against the
//! public API (see `tests/support/mod.rs`), since they compile as a
//! separate crate.

use std::io::{Error, ErrorKind};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Duration;

use super::SerialLike;

pub struct DuplexPipe {
    tx: Sender<u8>,
    rx: Receiver<u8>,
    read_timeout: Duration,
}

impl DuplexPipe {
    /// Builds a connected pair: bytes written to one side are read from the other.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = channel();
        let (tx_b, rx_b) = channel();
        (
            DuplexPipe { tx: tx_a, rx: rx_b, read_timeout: Duration::MAX },
            DuplexPipe { tx: tx_b, rx: rx_a, read_timeout: Duration::MAX },
        )
    }
}

impl SerialLike for DuplexPipe {
    fn open(_name: &str, _baud_rate: u32) -> std::io::Result<Self> {
        Err(Error::new(ErrorKind::Unsupported, "DuplexPipe is only built via `pair()`"))
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let first = match self.rx.recv_timeout(self.read_timeout) {
            Ok(b) => b,
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                return Err(Error::new(ErrorKind::TimedOut, "read timed out"));
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                return Err(Error::new(ErrorKind::BrokenPipe, "peer dropped"));
            }
        };
        buf[0] = first;
        let mut n = 1;
        while n < buf.len() {
            match self.rx.try_recv() {
                Ok(b) => {
                    buf[n] = b;
                    n += 1;
                }
                Err(_) => break,
            }
        }
        Ok(n)
    }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        for &b in buf {
            self.tx
                .send(b)
                .map_err(|_| Error::new(ErrorKind::BrokenPipe, "peer dropped"))?;
        }
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> std::io::Result<()> {
        self.read_timeout = timeout;
        Ok(())
    }
}
