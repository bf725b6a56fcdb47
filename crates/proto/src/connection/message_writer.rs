use crate::codec::RequestEncoder;
use crate::protocol::{Message, PayloadSize, RequestHeader, SendError};
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Encoder;
use tracing::trace;

/// Buffers encoded request parts and writes them to `W` on [`flush`](MessageWriter::flush).
#[derive(Debug)]
pub struct MessageWriter<W> {
    writer: W,
    buffer: BytesMut,
    encoder: RequestEncoder,
}

impl<W> MessageWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn with_capacity(writer: W, buffer_size: usize) -> Self {
        Self { writer, buffer: BytesMut::with_capacity(buffer_size), encoder: RequestEncoder::new() }
    }

    /// A writer for a payload whose head was flushed by an earlier writer.
    pub fn awaiting_payload(writer: W, buffer_size: usize, size: PayloadSize) -> Self {
        Self { writer, buffer: BytesMut::with_capacity(buffer_size), encoder: RequestEncoder::awaiting_payload(size) }
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Bytes encoded but not flushed yet
    #[inline]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn is_payload_pending(&self) -> bool {
        self.encoder.is_payload_pending()
    }

    #[inline]
    pub fn write<D>(&mut self, item: Message<(RequestHeader, PayloadSize), D>) -> Result<(), SendError>
    where
        D: Buf,
    {
        self.encoder.encode(item, &mut self.buffer)
    }

    pub async fn flush(&mut self) -> Result<(), SendError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        trace!(size = self.buffer.len(), "flush request bytes");
        self.writer.write_all(self.buffer.as_ref()).await?;
        self.buffer.clear();
        Ok(self.writer.flush().await?)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
