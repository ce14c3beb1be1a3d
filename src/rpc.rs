//! JSON-RPC 2.0 request/response envelopes and the caller/responder roles
//! built on top of [`crate::link`]. `id` is always fixed at `0` since
//! there is no concurrency or correlation to track across one link.

use std::io;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::value::RawValue;
use tracing::warn;

use crate::builder::LinkEndpointBuilder;
use crate::{Error, Result};

const JSONRPC_VERSION: &str = "2.0";

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: i64,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: impl Serialize) -> Result<Self> {
        Ok(JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: 0,
            method: method.into(),
            params: serde_json::to_value(params)?,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// Response envelope. `result` is kept as a [`RawValue`] so a caller can
/// decode it into whatever type it wants without a double deserialize
/// round trip, matching the Go client's `*json.RawMessage` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Box<RawValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(result: impl Serialize) -> Result<Self> {
        Ok(JsonRpcResponse {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: 0,
            result: Some(RawValue::from_string(serde_json::to_string(&result)?)?),
            error: None,
        })
    }

    pub fn failure(code: i64, message: impl Into<String>) -> Self {
        JsonRpcResponse {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: 0,
            result: None,
            error: Some(JsonRpcError { code, message: message.into() }),
        }
    }

    /// Deserializes `result` into `R`, or fails with [`Error::RemoteError`]
    /// if the response carried a non-zero error code.
    pub fn into_result<R: DeserializeOwned>(self) -> Result<R> {
        if let Some(err) = self.error {
            if err.code != 0 {
                return Err(Error::RemoteError { code: err.code, message: err.message });
            }
        }
        let raw = self
            .result
            .ok_or_else(|| Error::ParseError("response carried no result".to_string()))?;
        Ok(serde_json::from_str(raw.get())?)
    }
}

/// Write-only destination a [`Dispatcher`] writes its reply into. Buffers
/// the bytes written and flushes them as a single `send` once the
/// responder loop is done with the dispatcher call.
#[derive(Debug, Default)]
pub struct ResponseSink {
    buf: Vec<u8>,
}

impl ResponseSink {
    fn new() -> Self {
        ResponseSink { buf: Vec::new() }
    }

    /// Convenience over the raw `Write` impl: encodes `response` and
    /// writes it in one call.
    pub fn respond(&mut self, response: &JsonRpcResponse) -> Result<()> {
        serde_json::to_writer(&mut *self, response)?;
        Ok(())
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl io::Write for ResponseSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Caller role: opens a [`crate::link::LinkEndpoint`] for the duration of
/// one call, sends a request, waits for the response.
#[cfg(feature = "sync")]
pub struct RpcCaller {
    port_name: String,
    baud_rate: u32,
    chunk_size: usize,
    ack_timeout: std::time::Duration,
}

#[cfg(feature = "sync")]
impl RpcCaller {
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        RpcCaller {
            port_name: port_name.into(),
            baud_rate,
            chunk_size: crate::frame::DEFAULT_CHUNK_SIZE,
            ack_timeout: crate::link::DEFAULT_ACK_TIMEOUT,
        }
    }

    pub fn from_config(config: &crate::config::LinkConfig) -> Self {
        RpcCaller {
            port_name: config.port_name.clone(),
            baud_rate: config.baud_rate,
            chunk_size: config.chunk_size,
            ack_timeout: config.ack_timeout(),
        }
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn ack_timeout(mut self, ack_timeout: std::time::Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    /// Issues one call and returns the raw response envelope. The caller
    /// decides whether `error.code != 0` is a fatal condition by using
    /// [`JsonRpcResponse::into_result`], or inspects `error`/`result`
    /// directly.
    pub fn call(&self, method: &str, params: impl Serialize) -> Result<JsonRpcResponse> {
        let request = JsonRpcRequest::new(method, params)?;
        let body = serde_json::to_vec(&request)?;

        let mut endpoint = LinkEndpointBuilder::new()
            .with_serial(&self.port_name)
            .baud(self.baud_rate)
            .chunk_size(self.chunk_size)
            .ack_timeout(self.ack_timeout)
            .build()?;

        endpoint.send(&body)?;
        let reply = endpoint.receive()?;
        endpoint.close();

        let response: JsonRpcResponse = serde_json::from_slice(&reply)?;
        if let Some(err) = &response.error {
            if err.code != 0 {
                return Err(Error::RemoteError { code: err.code, message: err.message.clone() });
            }
        }
        Ok(response)
    }

    /// Convenience wrapper decoding `result` into `R` in one step.
    pub fn call_into<R: DeserializeOwned>(&self, method: &str, params: impl Serialize) -> Result<R> {
        self.call(method, params)?.into_result()
    }
}

/// A single-method dispatch hook for [`RpcResponder`]. The blanket impl
/// below lets any `Fn(JsonRpcRequest, &mut ResponseSink)` closure serve as
/// a `Dispatcher` directly, the idiomatic shape for a small external hook.
pub trait Dispatcher {
    fn handle(&self, request: JsonRpcRequest, sink: &mut ResponseSink);
}

impl<F> Dispatcher for F
where
    F: Fn(JsonRpcRequest, &mut ResponseSink),
{
    fn handle(&self, request: JsonRpcRequest, sink: &mut ResponseSink) {
        self(request, sink)
    }
}

/// Responder role: loops `receive` → dispatch → `send` forever over one
/// long-lived endpoint. Terminates only on a fatal port error.
#[cfg(feature = "sync")]
pub struct RpcResponder<P: crate::link::SerialLike> {
    endpoint: crate::link::LinkEndpoint<P>,
}

#[cfg(feature = "sync")]
impl<P: crate::link::SerialLike> RpcResponder<P> {
    pub fn new(endpoint: crate::link::LinkEndpoint<P>) -> Self {
        RpcResponder { endpoint }
    }

    /// Serves requests until the underlying port fails irrecoverably.
    /// Dispatcher errors (malformed request) are logged and do not end the
    /// loop; only a propagated `PortRead`/`PortWrite`/`ParseError` from the
    /// link layer does.
    pub fn serve<D: Dispatcher>(&mut self, dispatcher: &D) -> Result<()> {
        loop {
            let payload = self.endpoint.receive()?;
            let mut sink = ResponseSink::new();

            match serde_json::from_slice::<JsonRpcRequest>(&payload) {
                Ok(request) => dispatcher.handle(request, &mut sink),
                Err(e) => {
                    warn!(error = %e, "dropping malformed JSON-RPC request");
                    sink.respond(&JsonRpcResponse::failure(-32700, format!("parse error: {e}")))?;
                }
            }

            self.endpoint.send(&sink.into_bytes())?;
        }
    }
}
