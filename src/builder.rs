//! Type-state builder for [`crate::link`] endpoints, mirroring the
//! reference `BaseContextBuilder<T>` pattern: each connection kind gets
//! its own marker state so `build()` is only callable once enough
//! configuration has been supplied.

use std::marker::PhantomData;
use std::time::Duration;

use crate::link::LinkEndpoint;
use crate::{Error, Result};

#[cfg(feature = "async")]
use crate::link::LinkEndpointAsync;

const DEFAULT_BAUD: u32 = 115_200;
const DEFAULT_CHUNK_SIZE: usize = 1024;
const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(1);

/// Initial builder state: nothing configured yet.
pub struct Init;
/// Building a synchronous [`LinkEndpoint`].
pub struct Serial;
/// Building an asynchronous [`crate::link::LinkEndpointAsync`].
pub struct SerialAsync;

/// Type-state builder for a [`LinkEndpoint`] / `LinkEndpointAsync`.
pub struct LinkEndpointBuilder<T> {
    port_name: Option<String>,
    baud_rate: u32,
    chunk_size: usize,
    ack_timeout: Duration,
    _marker: PhantomData<T>,
}

impl Default for LinkEndpointBuilder<Init> {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkEndpointBuilder<Init> {
    pub fn new() -> Self {
        LinkEndpointBuilder {
            port_name: None,
            baud_rate: DEFAULT_BAUD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            _marker: PhantomData,
        }
    }

    /// Continues in the path to build a synchronous endpoint over `port_name`.
    pub fn with_serial(self, port_name: &str) -> LinkEndpointBuilder<Serial> {
        LinkEndpointBuilder {
            port_name: Some(port_name.into()),
            baud_rate: self.baud_rate,
            chunk_size: self.chunk_size,
            ack_timeout: self.ack_timeout,
            _marker: PhantomData,
        }
    }

    /// Continues in the path to build an asynchronous endpoint over `port_name`.
    #[cfg(feature = "async")]
    pub fn with_serial_async(self, port_name: &str) -> LinkEndpointBuilder<SerialAsync> {
        LinkEndpointBuilder {
            port_name: Some(port_name.into()),
            baud_rate: self.baud_rate,
            chunk_size: self.chunk_size,
            ack_timeout: self.ack_timeout,
            _marker: PhantomData,
        }
    }

    /// Populates every field from a [`crate::config::LinkConfig`] and
    /// continues to the synchronous path.
    pub fn with_config(self, config: &crate::config::LinkConfig) -> LinkEndpointBuilder<Serial> {
        self.with_serial(&config.port_name)
            .baud(config.baud_rate)
            .chunk_size(config.chunk_size)
            .ack_timeout(config.ack_timeout())
    }
}

impl LinkEndpointBuilder<Serial> {
    pub fn baud(mut self, baud: u32) -> Self {
        self.baud_rate = if baud == 0 { DEFAULT_BAUD } else { baud };
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = if chunk_size == 0 { DEFAULT_CHUNK_SIZE } else { chunk_size };
        self
    }

    pub fn ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = if ack_timeout.is_zero() { DEFAULT_ACK_TIMEOUT } else { ack_timeout };
        self
    }

    /// Validates configuration, opens the port and returns a ready
    /// [`LinkEndpoint`].
    #[cfg(feature = "sync")]
    pub fn build(self) -> Result<LinkEndpoint<serial2::SerialPort>> {
        let port_name = validate_port_name(self.port_name)?;
        let mut endpoint = LinkEndpoint::new(port_name, self.baud_rate, self.chunk_size, self.ack_timeout);
        endpoint.open()?;
        Ok(endpoint)
    }
}

impl LinkEndpointBuilder<SerialAsync> {
    pub fn baud(mut self, baud: u32) -> Self {
        self.baud_rate = if baud == 0 { DEFAULT_BAUD } else { baud };
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = if chunk_size == 0 { DEFAULT_CHUNK_SIZE } else { chunk_size };
        self
    }

    pub fn ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = if ack_timeout.is_zero() { DEFAULT_ACK_TIMEOUT } else { ack_timeout };
        self
    }

    /// Validates configuration, opens the port and returns a ready
    /// [`LinkEndpointAsync`](crate::link::LinkEndpointAsync).
    #[cfg(feature = "async")]
    pub fn build(self) -> Result<LinkEndpointAsync<serial2_tokio::SerialPort>> {
        let port_name = validate_port_name(self.port_name)?;
        let mut endpoint = LinkEndpointAsync::new(port_name, self.baud_rate, self.chunk_size, self.ack_timeout);
        endpoint.open()?;
        Ok(endpoint)
    }
}

fn validate_port_name(port_name: Option<String>) -> Result<String> {
    match port_name {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(Error::InvalidConfig("port_name must not be empty".to_string())),
    }
}
