use crate::codec::body::PayloadEncoder;
use crate::codec::header::HeaderEncoder;
use crate::protocol::{Message, PayloadSize, RequestHeader, SendError};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::error;

/// Encodes one request at a time: a head followed by its payload items.
///
/// A head may only be encoded once the previous request's payload reached its end, and payload
/// items are rejected while no head is pending.
#[derive(Debug)]
pub struct RequestEncoder {
    header_encoder: HeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
}

impl RequestEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// An encoder whose head was already written elsewhere, expecting a payload framed as `size`.
    ///
    /// Used to send a body held back until the peer answered `100 Continue`.
    pub fn awaiting_payload(size: PayloadSize) -> Self {
        let payload_encoder = PayloadEncoder::from(size);
        let payload_encoder = if payload_encoder.is_finish() { None } else { Some(payload_encoder) };
        Self { header_encoder: HeaderEncoder, payload_encoder }
    }

    /// Whether a head was written whose payload has not reached its end yet.
    pub fn is_payload_pending(&self) -> bool {
        self.payload_encoder.is_some()
    }
}

impl Default for RequestEncoder {
    fn default() -> Self {
        Self { header_encoder: HeaderEncoder, payload_encoder: None }
    }
}

impl<D: Buf> Encoder<Message<(RequestHeader, PayloadSize), D>> for RequestEncoder {
    type Error = SendError;

    fn encode(
        &mut self,
        item: Message<(RequestHeader, PayloadSize), D>,
        dst: &mut BytesMut,
    ) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive request head");
                    return Err(SendError::invalid_head("previous request payload is not finished"));
                }

                self.header_encoder.encode((head, payload_size), dst)?;

                let payload_encoder = PayloadEncoder::from(payload_size);
                if !payload_encoder.is_finish() {
                    self.payload_encoder = Some(payload_encoder);
                }
                Ok(())
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expect request head but receive payload item");
                    return Err(SendError::invalid_body("payload item without a pending request head"));
                };

                let result = payload_encoder.encode(payload_item, dst);
                if payload_encoder.is_finish() {
                    self.payload_encoder.take();
                }
                result
            }
        }
    }
}
