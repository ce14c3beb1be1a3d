use bytes::{Buf, BytesMut};
use std::time::Duration;
use tracing::{debug, warn};

use super::{classify_read, SerialLike, DEFAULT_ACK_TIMEOUT, DEFAULT_BAUD_RATE, INFINITE_READ_TIMEOUT, READ_SCRATCH_SIZE};
use crate::frame::{encode_frame, split, try_parse_frame, Frame, ParseOutcome, ACK_STATUS_OK};
use crate::{Error, Result};

#[cfg(feature = "sync")]
impl SerialLike for serial2::SerialPort {
    fn open(name: &str, baud_rate: u32) -> std::io::Result<Self> {
        serial2::SerialPort::open(name, baud_rate)
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        std::io::Read::read(self, buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        std::io::Write::write_all(self, buf)
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> std::io::Result<()> {
        serial2::SerialPort::set_read_timeout(self, timeout)
    }
}

/// A chunked, acknowledged, reconnecting link endpoint over a synchronous
/// serial port.
///
/// `send`/`receive` take `&mut self` and the type carries no `Clone`/`Sync`
/// impl, so the borrow checker enforces at compile time that one endpoint
/// can never have two operations in flight at once.
#[derive(Debug)]
pub struct LinkEndpoint<P: SerialLike> {
    port_name: String,
    baud_rate: u32,
    chunk_size: usize,
    ack_timeout: Duration,
    port: Option<P>,
    rx_accum: BytesMut,
}

impl<P: SerialLike> LinkEndpoint<P> {
    /// Creates a closed endpoint with the given configuration. Call
    /// [`LinkEndpoint::open`] before `send`/`receive`.
    pub fn new(port_name: impl Into<String>, baud_rate: u32, chunk_size: usize, ack_timeout: Duration) -> Self {
        LinkEndpoint {
            port_name: port_name.into(),
            baud_rate: if baud_rate == 0 { DEFAULT_BAUD_RATE } else { baud_rate },
            chunk_size,
            ack_timeout: if ack_timeout.is_zero() { DEFAULT_ACK_TIMEOUT } else { ack_timeout },
            port: None,
            rx_accum: BytesMut::new(),
        }
    }

    /// Acquires the port and resets internal state. Idempotent: calling
    /// `open` on an already-open endpoint reopens it.
    pub fn open(&mut self) -> Result<()> {
        let port = P::open(&self.port_name, self.baud_rate).map_err(|source| Error::PortOpen {
            port: self.port_name.clone(),
            source,
        })?;
        debug!(port = %self.port_name, baud = self.baud_rate, "opened serial link");
        self.port = Some(port);
        self.rx_accum.clear();
        Ok(())
    }

    /// Releases the port. Idempotent.
    pub fn close(&mut self) {
        self.port = None;
    }

    /// `close` followed by `open`. `rx_accum` is discarded — any in-flight
    /// frame is lost and the caller must retry the logical operation.
    pub fn reopen(&mut self) -> Result<()> {
        warn!(port = %self.port_name, "reopening serial link after read error");
        self.close();
        self.open()
    }

    /// Constructs an endpoint around an already-open port, bypassing
    /// `open()`. Useful for embedding a custom [`SerialLike`] transport
    /// (e.g. in tests) that does not go through `P::open`.
    pub fn from_parts(port: P, chunk_size: usize, ack_timeout: Duration) -> Self {
        LinkEndpoint {
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

    fn port_mut(&mut self) -> &mut P {
        self.port.as_mut().expect("LinkEndpoint used before open()")
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> Result<usize> {
        let result = self.port_mut().read(buf);
        match classify_read(result) {
            Ok(n) => Ok(n),
            Err(e) => {
                // Reopen once and surface the original error; never retry
                // the logical operation silently.
                let _ = self.reopen();
                Err(e)
            }
        }
    }

    fn write_raw(&mut self, buf: &[u8]) -> Result<()> {
        match self.port_mut().write_all(buf) {
            Ok(()) => Ok(()),
            Err(e) => {
                let orig = Error::PortWrite(e);
                let _ = self.reopen();
                Err(orig)
            }
        }
    }

    /// Obtains one frame: unbounded wait for the first byte of a new frame,
    /// `ack_timeout` inter-byte wait once a frame has begun.
    fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let ParseOutcome::Ready { frame, consumed } = try_parse_frame(&self.rx_accum)? {
                self.rx_accum.advance(consumed);
                return Ok(frame);
            }

            let timeout = if self.rx_accum.is_empty() {
                INFINITE_READ_TIMEOUT
            } else {
                self.ack_timeout
            };
            self.port_mut()
                .set_read_timeout(timeout)
                .map_err(Error::PortRead)?;

            let mut scratch = [0u8; READ_SCRATCH_SIZE];
            let n = self.read_raw(&mut scratch)?;

            if n == 0 {
                if self.rx_accum.is_empty() {
                    // Idle wait was unbounded; a spurious zero-length read
                    // (e.g. test double) just retries the wait.
                    continue;
                }
                self.rx_accum.clear();
                return Err(Error::PartialTimeout(self.ack_timeout));
            }

            self.rx_accum.extend_from_slice(&scratch[..n]);
        }
    }

    /// Waits for exactly one frame and asserts it is ACK-shaped
    /// (`length == 1, next == false`). Unlike [`LinkEndpoint::read_frame`],
    /// the read timeout here is `ack_timeout` from the very first byte —
    /// there is no unbounded idle wait, since silence after a chunk was
    /// just written means the peer is gone, not that no new payload has
    /// arrived yet.
    fn wait_ack(&mut self) -> Result<()> {
        loop {
            if let ParseOutcome::Ready { frame, consumed } = try_parse_frame(&self.rx_accum)? {
                self.rx_accum.advance(consumed);
                return Self::check_ack(frame);
            }

            self.port_mut()
                .set_read_timeout(self.ack_timeout)
                .map_err(Error::PortRead)?;

            let mut scratch = [0u8; READ_SCRATCH_SIZE];
            let n = self.read_raw(&mut scratch)?;
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

    /// Chunks `payload` and writes each chunk, waiting for an ACK after
    /// each one. Returns the number of payload bytes sent.
    pub fn send(&mut self, payload: &[u8]) -> Result<usize> {
        for (next, body) in split(payload, self.chunk_size) {
            let wire = encode_frame(next, body);
            self.write_raw(&wire)?;
            self.wait_ack()?;
        }
        Ok(payload.len())
    }

    /// Reassembles one logical payload, ACKing every chunk as it arrives.
    pub fn receive(&mut self) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        loop {
            let frame = self.read_frame()?;
            payload.extend_from_slice(&frame.body);

            let ack = encode_frame(false, &[ACK_STATUS_OK]);
            self.write_raw(&ack)?;

            if !frame.next {
                return Ok(payload);
            }
        }
    }
}

impl<P: SerialLike> Drop for LinkEndpoint<P> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::test_support::DuplexPipe;

    fn endpoint(pipe: DuplexPipe) -> LinkEndpoint<DuplexPipe> {
        LinkEndpoint::from_parts(pipe, 1024, Duration::from_millis(50))
    }

    #[test]
    fn send_then_receive_tiny_payload_s1() {
        let (local, remote) = DuplexPipe::pair();
        let mut sender = endpoint(local);
        let mut receiver = endpoint(remote);

        let send_thread = std::thread::spawn(move || sender.send(b"test").unwrap());
        let received = receiver.receive().unwrap();
        send_thread.join().unwrap();

        assert_eq!(received, b"test");
    }

    #[test]
    fn one_ack_per_chunk_s3() {
        let (local, remote) = DuplexPipe::pair();
        let mut sender = endpoint(local);
        let mut receiver = endpoint(remote);

        let payload = vec![0x41u8; 1025];
        let payload_clone = payload.clone();
        let send_thread = std::thread::spawn(move || sender.send(&payload_clone).unwrap());
        let received = receiver.receive().unwrap();
        send_thread.join().unwrap();

        assert_eq!(received, payload);
    }

    #[test]
    fn slow_drip_reassembles_identically_s4() {
        let (local, remote) = DuplexPipe::pair();
        let mut sender_pipe = local;
        let receiver_pipe = remote;

        let payload = b"0123456789".to_vec();
        let wire = encode_frame(false, &payload);
        let send_thread = std::thread::spawn(move || {
            for byte in wire {
                std::thread::sleep(Duration::from_millis(1));
                sender_pipe.write_all(&[byte]).unwrap();
            }
        });

        let mut receiver = endpoint(receiver_pipe);
        let received = receiver.receive().unwrap();
        send_thread.join().unwrap();

        assert_eq!(received, payload);
    }

    #[test]
    fn partial_frame_times_out_and_clears_accum() {
        let (mut local, remote) = DuplexPipe::pair();
        // Header says 10 bytes follow but only 2 ever arrive.
        local.write_all(&[0x00, 0x00, 0x00, 0x0A, 0x00, 0x01, 0x02]).unwrap();

        let mut receiver = endpoint(remote);
        let err = receiver.receive().unwrap_err();
        assert!(matches!(err, Error::PartialTimeout(_)));
        assert!(receiver.rx_accum.is_empty());
    }

    #[test]
    fn wait_ack_accepts_any_status_byte() {
        let (mut local, remote) = DuplexPipe::pair();
        local.write_all(&encode_frame(false, &[0x02])).unwrap();

        let mut sender = endpoint(remote);
        sender.wait_ack().unwrap();
    }

    #[test]
    fn wait_ack_rejects_wrong_shape() {
        let (mut local, remote) = DuplexPipe::pair();
        // next=true is not ACK-shaped regardless of body.
        local.write_all(&encode_frame(true, &[0x00])).unwrap();

        let mut sender = endpoint(remote);
        let err = sender.wait_ack().unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }
}
