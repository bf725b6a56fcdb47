//! HTTP/1.x request encoding
//!
//! [`RequestEncoder`] turns a stream of [`Message`](crate::protocol::Message)s into wire bytes:
//! first the request head, then payload items framed either by `Content-Length` or by chunked
//! transfer encoding.
//!
//! # Example
//!
//! ```no_run
//! use bytes::{Bytes, BytesMut};
//! use http::Request;
//! use micro_client_proto::codec::RequestEncoder;
//! use micro_client_proto::protocol::{Message, PayloadItem, PayloadSize, RequestHeader};
//! use tokio_util::codec::Encoder;
//!
//! let head: RequestHeader = Request::get("/").header("host", "localhost").body(()).unwrap().into();
//! let mut encoder = RequestEncoder::new();
//! let mut buffer = BytesMut::new();
//! encoder.encode(Message::<_, Bytes>::Header((head, PayloadSize::Chunked)), &mut buffer).unwrap();
//! let chunk = Message::<(RequestHeader, PayloadSize), _>::Payload(PayloadItem::Chunk(Bytes::from("hi")));
//! encoder.encode(chunk, &mut buffer).unwrap();
//! ```

mod body;
mod header;
mod request_encoder;

pub use request_encoder::RequestEncoder;
