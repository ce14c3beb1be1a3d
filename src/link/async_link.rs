use bytes::{Buf, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use super::{DEFAULT_ACK_TIMEOUT, DEFAULT_BAUD_RATE, READ_SCRATCH_SIZE};
use crate::frame::{encode_frame, split, try_parse_frame, Frame, ParseOutcome, ACK_STATUS_OK};
use crate::{Error, Result};

/// Minimal async serial-port surface [`LinkEndpointAsync`] needs. Satisfied
/// by `serial2_tokio::SerialPort`. Unlike [`super::SerialLike`], timeouts
/// are not a method on the port itself — the endpoint wraps each read in
/// `tokio::time::timeout` instead, the idiomatic async equivalent.
pub trait AsyncSerialLike: Sized + Unpin {
    fn open(name: &str, baud_rate: u32) -> std::io::Result<Self>;
    fn read(&mut self, buf: &mut [u8]) -> impl std::future::Future<Output = std::io::Result<usize>> + Send;
    fn write_all(&mut self, buf: &[u8]) -> impl std::future::Future<Output = std::io::Result<()>> + Send;
}

impl AsyncSerialLike for serial2_tokio::SerialPort {
    fn open(name: &str, baud_rate: u32) -> std::io::Result<Self> {
        serial2_tokio::SerialPort::open(name, baud_rate)
    }

    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        AsyncReadExt::read(self, buf).await
    }

    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        AsyncWriteExt::write_all(self, buf).await
    }
}

/// Async twin of [`super::LinkEndpoint`]. Frames the same wire format with
/// the same timeout and reopen semantics; `set_read_timeout` is replaced
/// by wrapping each `read` in `tokio::time::timeout`.
#[derive(Debug)]
pub struct LinkEndpointAsync<P: AsyncSerialLike> {
    port_name: String,
    baud_rate: u32,
    chunk_size: usize,
    ack_timeout: Duration,
    port: Option<P>,
    rx_accum: BytesMut,
}

impl<P: AsyncSerialLike> LinkEndpointAsync<P> {
    pub fn new(port_name: impl Into<String>, baud_rate: u32, chunk_size: usize, ack_timeout: Duration) -> Self {
        LinkEndpointAsync {
            port_name: port_name.into(),
            baud_rate: if baud_rate == 0 { DEFAULT_BAUD_RATE } else { baud_rate },
            chunk_size,
            ack_timeout: if ack_timeout.is_zero() { DEFAULT_ACK_TIMEOUT } else { ack_timeout },
            port: None,
            rx_accum: BytesMut::new(),
        }
    }

    pub fn from_parts(port: P, chunk_size: usize, ack_timeout: Duration) -> Self {
        LinkEndpointAsync {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            chunk_size,
            ack_timeout: if ack_timeout.is_zero() {
                DEFAULT_ACK_TIMEOUT
            } else {
                ack_timeout
            },
            port: Some(port),
            rx_accum: BytesMut::new(),
        }
    }

    pub fn open(&mut self) -> Result<()> {
        let port = P::open(&self.port_name, self.baud_rate).map_err(|source| Error::PortOpen {
            port: self.port_name.clone(),
            source,
        })?;
        debug!(port = %self.port_name, baud = self.baud_rate, "opened async serial link");
        self.port = Some(port);
        self.rx_accum.clear();
        Ok(())
    }

    pub fn close(&mut self) {
        self.port = None;
    }

    pub fn reopen(&mut self) -> Result<()> {
        warn!(port = %self.port_name, "reopening async serial link after read error");
        self.close();
        self.open()
    }

    fn port_mut(&mut self) -> &mut P {
        self.port.as_mut().expect("LinkEndpointAsync used before open()")
    }

    /// Reads with a bounded timeout, translating a timed-out `tokio::time::timeout`
    /// and an `Err(TimedOut)`/`Err(WouldBlock)` read the same way `classify_read`
    /// does for the sync endpoint: as `Ok(0)`, never as an error.
    async fn read_bounded(&mut self, buf: &mut [u8], bound: Duration) -> Result<usize> {
        let result = tokio::time::timeout(bound, self.port_mut().read(buf)).await;
        match result {
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e))
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                Ok(0)
            }
            Ok(Err(e)) => {
                let orig = Error::PortRead(e);
                let _ = self.reopen();
                Err(orig)
            }
            Err(_elapsed) => Ok(0),
        }
    }

    async fn write_raw(&mut self, buf: &[u8]) -> Result<()> {
        match self.port_mut().write_all(buf).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let orig = Error::PortWrite(e);
                let _ = self.reopen();
                Err(orig)
            }
        }
    }

    /// Async twin of the sync endpoint's `read_frame`: unbounded idle wait
    /// for the first byte of a new frame, `ack_timeout` once a frame has
    /// begun. "Unbounded" here means no `tokio::time::timeout` wrapper at
    /// all rather than a `Duration::MAX` bound, since `tokio::time::timeout`
    /// treats an overlong duration as effectively-never-fires anyway and
    /// omitting it avoids the conversion entirely.
    async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let ParseOutcome::Ready { frame, consumed } = try_parse_frame(&self.rx_accum)? {
                self.rx_accum.advance(consumed);
                return Ok(frame);
            }

            let mut scratch = [0u8; READ_SCRATCH_SIZE];
            let n = if self.rx_accum.is_empty() {
                match self.port_mut().read(&mut scratch).await {
                    Ok(n) => n,
                    Err(e) => {
                        let orig = Error::PortRead(e);
                        let _ = self.reopen();
                        return Err(orig);
                    }
                }
            } else {
                self.read_bounded(&mut scratch, self.ack_timeout).await?
            };

            if n == 0 {
                if self.rx_accum.is_empty() {
                    continue;
                }
                self.rx_accum.clear();
                return Err(Error::PartialTimeout(self.ack_timeout));
            }
            self.rx_accum.extend_from_slice(&scratch[..n]);
        }
    }

    /// Async twin of the sync endpoint's `wait_ack`: bounded by
    /// `ack_timeout` from the first byte, no unbounded idle wait.
    async fn wait_ack(&mut self) -> Result<()> {
        loop {
            if let ParseOutcome::Ready { frame, consumed } = try_parse_frame(&self.rx_accum)? {
                self.rx_accum.advance(consumed);
                return Self::check_ack(frame);
            }
            let mut scratch = [0u8; READ_SCRATCH_SIZE];
            let n = self.read_bounded(&mut scratch, self.ack_timeout).await?;
            if n == 0 {
                self.rx_accum.clear();
                return Err(Error::AckTimeout(self.ack_timeout));
            }
            self.rx_accum.extend_from_slice(&scratch[..n]);
        }
    }

    /// Any ACK-shaped frame (`length == 1, next == false`) is accepted
    /// regardless of its status byte's value — the wire format reserves
    /// the byte for future use but no peer ever sends anything but zero,
    /// and a conforming responder accepts whatever value it receives.
    fn check_ack(frame: Frame) -> Result<()> {
        if !frame.is_ack_shaped() {
            return Err(Error::ParseError(format!(
                "expected an ACK frame, got next={} len={}",
                frame.next,
                frame.body.len()
            )));
        }
        Ok(())
    }

    pub async fn send(&mut self, payload: &[u8]) -> Result<usize> {
        for (next, body) in split(payload, self.chunk_size) {
            let wire = encode_frame(next, body);
            self.write_raw(&wire).await?;
            self.wait_ack().await?;
        }
        Ok(payload.len())
    }

    pub async fn receive(&mut self) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        loop {
            let frame = self.read_frame().await?;
            payload.extend_from_slice(&frame.body);

            let ack = encode_frame(false, &[ACK_STATUS_OK]);
            self.write_raw(&ack).await?;

            if !frame.next {
                return Ok(payload);
            }
        }
    }
}

impl<P: AsyncSerialLike> Drop for LinkEndpointAsync<P> {
    fn drop(&mut self) {
        self.close();
    }
}
