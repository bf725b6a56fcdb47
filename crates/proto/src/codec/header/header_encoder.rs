//! HTTP/1.x request head encoder
//!
//! Writes the request line and header fields, and makes the framing headers agree with the
//! [`PayloadSize`] the payload will be written with:
//!
//! - `Length(n)`: `Content-Length: n` unless the caller already set a length, any
//!   `Transfer-Encoding` is dropped
//! - `Chunked`: `chunked` appended as the final transfer coding, any `Content-Length` is dropped
//! - `Empty`: any `Transfer-Encoding` is dropped

use crate::ensure;
use crate::protocol::{PayloadSize, RequestHeader, SendError, is_chunked_transfer};

use bytes::{BufMut, BytesMut};

use http::{HeaderValue, Version, header};
use std::io;
use std::io::{ErrorKind, Write};
use tokio_util::codec::Encoder;
use tracing::error;

/// Initial buffer size reserved for the request head
const INIT_HEADER_SIZE: usize = 4 * 1024;

const CHUNKED: HeaderValue = HeaderValue::from_static("chunked");

/// Encoder for HTTP/1.x request heads.
#[derive(Debug)]
pub struct HeaderEncoder;

impl Encoder<(RequestHeader, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    /// Encodes the request line and headers into `dst`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - the HTTP version is neither HTTP/1.0 nor HTTP/1.1
    /// - an HTTP/1.0 request asks for chunked framing
    fn encode(&mut self, item: (RequestHeader, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut header, payload_size) = item;

        let version = match header.version() {
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_10 => "HTTP/1.0",
            v => {
                error!(http_version = ?v, "unsupported http version for request line");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        };

        ensure!(
            !(payload_size.is_chunked() && header.version() == Version::HTTP_10),
            SendError::invalid_head("chunked transfer encoding requires HTTP/1.1")
        );

        dst.reserve(INIT_HEADER_SIZE);
        write!(FastWrite(dst), "{} {} {}\r\n", header.method().as_str(), header.request_target(), version)?;

        let headers = header.headers_mut();
        match payload_size {
            PayloadSize::Length(n) => {
                headers.remove(header::TRANSFER_ENCODING);
                if !headers.contains_key(header::CONTENT_LENGTH) {
                    headers.insert(header::CONTENT_LENGTH, n.into());
                }
            }
            PayloadSize::Chunked => {
                headers.remove(header::CONTENT_LENGTH);
                if !is_chunked_transfer(headers) {
                    headers.append(header::TRANSFER_ENCODING, CHUNKED);
                }
            }
            PayloadSize::Empty => {
                headers.remove(header::TRANSFER_ENCODING);
            }
        }

        for (header_name, header_value) in header.headers() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// `io::Write` over a `BytesMut` that has already been reserved.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
