//! Protocol types shared by the request encoder and the client core.
//!
//! - **Message Handling** ([`message`]): a request head or a payload chunk
//!   - [`Message`]: either the head or one payload item
//!   - [`PayloadItem`]: a data chunk or the end-of-body marker
//!   - [`PayloadSize`]: how the payload is framed on the wire
//!
//! - **Request Head** ([`request`]): [`RequestHeader`] wraps `http::Request<()>`
//!
//! - **Stream Identifiers** ([`stream_id`]): [`StreamIdAllocator`] hands out client-initiated
//!   HTTP/2 stream identifiers until the 31-bit space is used up
//!
//! - **Errors** ([`error`]): [`SendError`]

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;
pub use request::is_chunked_transfer;

mod stream_id;
pub use stream_id::LAST_PEER_STREAM_ID;
pub use stream_id::MAX_STREAM_ID;
pub use stream_id::StreamIdAllocator;

mod error;
pub use error::SendError;
