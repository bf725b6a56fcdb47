//! Writing encoded requests to a connection
//!
//! - [`MessageWriter`]: buffers encoded request parts and flushes them to any
//!   `tokio::io::AsyncWrite`

mod message_writer;

pub use message_writer::MessageWriter;
