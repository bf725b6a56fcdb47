//! Request framing building blocks for the asynchronous micro HTTP client
//!
//! This crate holds the wire-facing half of the client: everything needed to turn a finalized
//! request head and its payload into bytes on an HTTP/1.x connection, plus the bookkeeping an
//! HTTP/2 connection needs to hand out client stream identifiers. Request execution (redirects,
//! retries, header normalization) lives in `micro-client` and drives these types.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::{Method, Request};
//! use micro_client_proto::connection::MessageWriter;
//! use micro_client_proto::protocol::{Message, PayloadItem, PayloadSize, RequestHeader};
//!
//! # async fn run() -> Result<(), micro_client_proto::protocol::SendError> {
//! let head: RequestHeader = Request::builder()
//!     .method(Method::POST)
//!     .uri("/upload")
//!     .header(http::header::HOST, "127.0.0.1:8080")
//!     .body(())
//!     .unwrap()
//!     .into();
//!
//! let mut writer = MessageWriter::with_capacity(tokio::io::sink(), 8 * 1024);
//! writer.write(Message::<_, Bytes>::Header((head, PayloadSize::Length(5))))?;
//! writer.write(Message::Payload(PayloadItem::Chunk(Bytes::from_static(b"hello"))))?;
//! writer.flush().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: message, payload and request head types, stream identifiers and errors
//! - [`codec`]: the HTTP/1.x [`codec::RequestEncoder`]
//! - [`connection`]: the buffered [`connection::MessageWriter`]
//!
//! # Limitations
//!
//! - Only HTTP/1.0 and HTTP/1.1 request lines are produced; HTTP/2 framing and header compression
//!   belong to the connection implementation
//! - Response decoding is not part of this crate

pub mod codec;
pub mod connection;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
