//! Request head serialization: the request line followed by the header fields.

mod header_encoder;

pub use header_encoder::HeaderEncoder;
