//! Request payload framing
//!
//! - [`LengthEncoder`]: writes a body of a known `Content-Length`, refusing to overrun it
//! - [`ChunkedEncoder`]: `Transfer-Encoding: chunked` framing (RFC 9112 §7.1)
//! - [`PayloadEncoder`]: picks one of the above (or none) from a [`PayloadSize`](crate::protocol::PayloadSize)

mod chunked_encoder;
mod length_encoder;
mod payload_encoder;

pub use payload_encoder::PayloadEncoder;
