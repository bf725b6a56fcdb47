use bytes::{Buf, Bytes};

/// An outgoing HTTP message part: the request head or one payload item.
///
/// `T` is the head type (usually `(RequestHeader, PayloadSize)`), `Data` the chunk type.
pub enum Message<T, Data: Buf = Bytes> {
    /// The request head, written once before any payload
    Header(T),
    /// A chunk of request payload or the end-of-body marker
    Payload(PayloadItem<Data>),
}

/// One item of a request payload stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    /// A chunk of payload data
    Chunk(Data),
    /// Marks the end of the payload
    Eof,
}

/// How a request payload is framed on an HTTP/1.x connection.
///
/// - `Length`: a `Content-Length` body of exactly that many bytes
/// - `Chunked`: `Transfer-Encoding: chunked`, used when the length is unknown up front
/// - `Empty`: no body at all
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    Length(u64),
    Chunked,
    Empty,
}

impl PayloadSize {
    /// Maps an optional known length to the framing used for it.
    ///
    /// A known length of zero is `Empty`, an unknown length is `Chunked`.
    pub fn from_length(length: Option<u64>) -> Self {
        match length {
            Some(0) => PayloadSize::Empty,
            Some(n) => PayloadSize::Length(n),
            None => PayloadSize::Chunked,
        }
    }

    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }

    /// The exact number of body bytes, `None` for chunked payloads
    pub fn length(&self) -> Option<u64> {
        match self {
            PayloadSize::Length(n) => Some(*n),
            PayloadSize::Empty => Some(0),
            PayloadSize::Chunked => None,
        }
    }
}

impl<T, D: Buf> Message<T, D> {
    #[inline]
    pub fn is_payload(&self) -> bool {
        matches!(self, Message::Payload(_))
    }

    #[inline]
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }
}

impl<T> From<Bytes> for Message<T> {
    fn from(bytes: Bytes) -> Self {
        Self::Payload(PayloadItem::Chunk(bytes))
    }
}

impl<D: Buf> PayloadItem<D> {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }
}
