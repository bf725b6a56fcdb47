//! The seams between the execution core and the transport.
//!
//! The core never opens sockets or speaks HTTP/2 framing itself. A [`Connector`] hands out a
//! [`Connection`] per attempt; the connection exposes its negotiated version, a byte sink for
//! HTTP/1.x and, on HTTP/2, an [`Http2Handler`] that owns stream identifiers and frame output.

use async_trait::async_trait;
use bytes::Bytes;
use http::Version;
use micro_client_proto::protocol::{RequestHeader, SendError};
use tokio::io::AsyncWrite;

use crate::error::ClientError;
use crate::request::Request;
use crate::response::Response;

/// How the peer answered an `Expect: 100-continue` request head.
#[derive(Debug)]
pub enum ContinueOutcome {
    /// The peer wants the body
    Continue,
    /// The peer answered with a final response, the body must not be sent
    Final(Response),
}

#[async_trait]
pub trait Connection: Send {
    /// Identifies the connection in logs and errors
    fn id(&self) -> &str;

    fn version(&self) -> Version;

    /// Raw byte sink used for HTTP/1.x requests
    fn io(&mut self) -> &mut (dyn AsyncWrite + Send + Unpin);

    /// The HTTP/2 frame writer, `None` unless the connection negotiated HTTP/2
    fn h2_handler(&mut self) -> Option<&mut dyn Http2Handler>;

    async fn await_continue(&mut self, stream_id: Option<u32>) -> Result<ContinueOutcome, ClientError>;

    async fn response(&mut self, stream_id: Option<u32>) -> Result<Response, ClientError>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, request: &Request) -> Result<Box<dyn Connection>, ClientError>;
}

/// Stream bookkeeping and frame output of an HTTP/2 connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Http2Handler: Send {
    /// Allocates the next client stream identifier, `None` once the identifier space is used up.
    fn next_stream_id(&mut self) -> Option<u32>;

    /// Starts a graceful shutdown, advertising `last_stream_id` as the last processed stream.
    fn go_away(&mut self, last_stream_id: u32);

    async fn write_headers(&mut self, stream_id: u32, head: &RequestHeader, end_of_stream: bool)
    -> Result<(), SendError>;

    async fn write_data(&mut self, stream_id: u32, data: Bytes, end_of_stream: bool) -> Result<(), SendError>;
}
