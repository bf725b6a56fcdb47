//! Serializes a finalized request onto a connection.
//!
//! [`RequestWriter`] completes the request head before anything is written:
//!
//! - `Host` from the target URI, without the port when it is the scheme's default
//! - `Content-Length` from the payload length unless already set; a `Transfer-Encoding` ending in
//!   `chunked` switches an HTTP/1.1 payload to chunked framing instead, any other is dropped
//! - `Content-Type` from the payload or the configured default, for non-empty payloads only
//! - `Expect: 100-continue` when the call holds the body back for the peer's go-ahead
//!
//! HTTP/2 connections get the head and body through their [`Http2Handler`](crate::Http2Handler)
//! on a freshly allocated stream; everything else is framed as HTTP/1.x text through a
//! [`MessageWriter`].

mod payload;

pub use payload::Payload;

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, EXPECT, HOST, TRANSFER_ENCODING};
use http::{HeaderValue, Uri, Version};
use micro_client_proto::connection::MessageWriter;
use micro_client_proto::protocol::{
    LAST_PEER_STREAM_ID, Message, PayloadItem, PayloadSize, RequestHeader, is_chunked_transfer,
};
use tokio::io::AsyncWrite;
use tracing::{trace, warn};

use crate::connection::{Connection, Http2Handler};
use crate::context::Context;
use crate::context::names::EXPECT_CONTINUE_ENABLED;
use crate::error::ClientError;
use crate::request::Request;

const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// What [`RequestWriter::write`] left to do.
#[derive(Debug)]
pub struct WriteProgress {
    stream_id: Option<u32>,
    deferred: Option<Payload>,
}

impl WriteProgress {
    /// The HTTP/2 stream the request went out on, `None` on HTTP/1.x
    pub fn stream_id(&self) -> Option<u32> {
        self.stream_id
    }

    /// Whether the body still waits for `100 Continue`
    pub fn is_deferred(&self) -> bool {
        self.deferred.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct RequestWriter {
    default_content_type: HeaderValue,
    buffer_size: usize,
}

impl Default for RequestWriter {
    fn default() -> Self {
        Self::new(HeaderValue::from_static("application/octet-stream"))
    }
}

impl RequestWriter {
    pub fn new(default_content_type: HeaderValue) -> Self {
        Self { default_content_type, buffer_size: DEFAULT_BUFFER_SIZE }
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Whether the body goes out together with the head, `false` while expect-continue is on.
    pub fn write_content_now(ctx: &Context) -> bool {
        !ctx.get_or(&EXPECT_CONTINUE_ENABLED, false)
    }

    /// Writes the head and, unless it is held back for `100 Continue`, the body.
    ///
    /// On HTTP/2 a stream is allocated before the body is opened. When the connection has no stream
    /// identifiers left it is told to go away and nothing is written.
    pub async fn write(
        &self,
        request: &Request,
        conn: &mut dyn Connection,
        ctx: &Context,
    ) -> Result<WriteProgress, ClientError> {
        let version = conn.version();
        let stream_id = if version == Version::HTTP_2 { Some(allocate_stream_id(conn)?) } else { None };

        let mut payload = Payload::open(request.body()).await?;
        if version == Version::HTTP_11 && is_chunked_transfer(request.headers()) {
            payload.frame_chunked();
        }
        let defer = !Self::write_content_now(ctx) && !payload.is_empty();
        let head = self.head(request, &payload, version, defer)?;
        trace!(
            connection = conn.id(),
            method = %head.method(),
            target = head.request_target(),
            ?version,
            defer,
            "write request"
        );

        match stream_id {
            Some(stream_id) => {
                let handler = h2_handler(conn)?;
                handler.write_headers(stream_id, &head, payload.is_empty()).await?;
                if !defer && !payload.is_empty() {
                    write_h2_payload(handler, stream_id, &mut payload).await?;
                }
            }
            None => {
                let mut writer = MessageWriter::with_capacity(conn.io(), self.buffer_size);
                writer.write(Message::<_, Bytes>::Header((head, payload.size())))?;
                if !defer {
                    write_h1_payload(&mut writer, &mut payload, self.buffer_size).await?;
                }
                writer.flush().await?;
            }
        }

        Ok(WriteProgress { stream_id, deferred: defer.then_some(payload) })
    }

    /// Writes a body held back by [`write`](RequestWriter::write); a no-op when nothing was deferred.
    pub async fn write_deferred(
        &self,
        conn: &mut dyn Connection,
        progress: &mut WriteProgress,
    ) -> Result<(), ClientError> {
        let Some(mut payload) = progress.deferred.take() else {
            return Ok(());
        };

        match progress.stream_id {
            Some(stream_id) => write_h2_payload(h2_handler(conn)?, stream_id, &mut payload).await,
            None => {
                let mut writer = MessageWriter::awaiting_payload(conn.io(), self.buffer_size, payload.size());
                write_h1_payload(&mut writer, &mut payload, self.buffer_size).await?;
                Ok(writer.flush().await?)
            }
        }
    }

    fn head(
        &self,
        request: &Request,
        payload: &Payload,
        version: Version,
        defer: bool,
    ) -> Result<RequestHeader, ClientError> {
        let uri = target_uri(request)?;
        let mut head: RequestHeader = http::Request::builder()
            .method(request.method().clone())
            .uri(uri)
            .version(version)
            .body(())
            .map_err(|e| ClientError::invalid_request(format!("failed to build request head: {e}")))?
            .into();
        let need_body = head.need_body();

        let headers = head.headers_mut();
        *headers = request.headers().clone();

        if !headers.contains_key(HOST) {
            headers.insert(HOST, compute_host(request.uri())?);
        }

        if version == Version::HTTP_2 || !payload.size().is_chunked() {
            headers.remove(TRANSFER_ENCODING);
        }

        if !headers.contains_key(CONTENT_LENGTH) {
            match payload.size() {
                PayloadSize::Length(length) => {
                    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
                }
                PayloadSize::Empty if need_body => {
                    headers.insert(CONTENT_LENGTH, HeaderValue::from(0u64));
                }
                _ => {}
            }
        }

        if !payload.is_empty() && !headers.contains_key(CONTENT_TYPE) {
            let content_type = payload.content_type().unwrap_or(&self.default_content_type).clone();
            headers.insert(CONTENT_TYPE, content_type);
        }

        if defer && !headers.contains_key(EXPECT) {
            headers.insert(EXPECT, HeaderValue::from_static("100-continue"));
        }

        Ok(head)
    }
}

/// `host[:port]` of `uri`, leaving out 80 for http and 443 for https.
fn compute_host(uri: &Uri) -> Result<HeaderValue, ClientError> {
    let Some(host) = uri.host() else {
        return Err(ClientError::invalid_request(format!("missing host in request uri: {uri}")));
    };

    let default_port = match uri.scheme_str() {
        Some("https") | Some("wss") => 443,
        _ => 80,
    };
    let value = match uri.port_u16() {
        Some(port) if port != default_port => format!("{host}:{port}"),
        _ => host.to_string(),
    };

    HeaderValue::try_from(value).map_err(|e| ClientError::invalid_request(format!("invalid host header: {e}")))
}

/// The request URI with the builder params appended to its query.
fn target_uri(request: &Request) -> Result<Uri, ClientError> {
    if request.params().is_empty() {
        return Ok(request.uri().clone());
    }

    let params = if request.options().uri_encode_enabled {
        serde_urlencoded::to_string(request.params())
            .map_err(|e| ClientError::invalid_request(format!("failed to encode params: {e}")))?
    } else {
        request.params().iter().map(|(name, value)| format!("{name}={value}")).collect::<Vec<_>>().join("&")
    };

    let mut parts = request.uri().clone().into_parts();
    let path_and_query = match &parts.path_and_query {
        Some(path_and_query) => match path_and_query.query() {
            Some(query) if !query.is_empty() => format!("{}?{query}&{params}", path_and_query.path()),
            _ => format!("{}?{params}", path_and_query.path()),
        },
        None => format!("/?{params}"),
    };
    parts.path_and_query = Some(
        path_and_query.parse().map_err(|e| ClientError::invalid_request(format!("invalid request params: {e}")))?,
    );

    Uri::from_parts(parts).map_err(|e| ClientError::invalid_request(format!("invalid request uri: {e}")))
}

fn h2_handler(conn: &mut dyn Connection) -> Result<&mut dyn Http2Handler, ClientError> {
    let connection = conn.id().to_string();
    conn.h2_handler().ok_or_else(|| ClientError::missing_http2_handler(connection))
}

fn allocate_stream_id(conn: &mut dyn Connection) -> Result<u32, ClientError> {
    let connection = conn.id().to_string();
    let handler = h2_handler(conn)?;

    match handler.next_stream_id() {
        Some(stream_id) => Ok(stream_id),
        None => {
            handler.go_away(LAST_PEER_STREAM_ID);
            warn!(%connection, last_stream_id = LAST_PEER_STREAM_ID, "stream ids exhausted, connection goes away");
            Err(ClientError::stream_id_exhausted(connection))
        }
    }
}

/// Sends the payload as DATA frames, the last one carrying END_STREAM.
async fn write_h2_payload(
    handler: &mut dyn Http2Handler,
    stream_id: u32,
    payload: &mut Payload,
) -> Result<(), ClientError> {
    let mut pending: Option<Bytes> = None;
    while let Some(chunk) = payload.next_chunk().await {
        if let Some(previous) = pending.replace(chunk?) {
            handler.write_data(stream_id, previous, false).await?;
        }
    }
    handler.write_data(stream_id, pending.unwrap_or_default(), true).await?;
    Ok(())
}

/// Streams the payload, flushing whenever `flush_threshold` bytes are buffered.
async fn write_h1_payload<W>(
    writer: &mut MessageWriter<W>,
    payload: &mut Payload,
    flush_threshold: usize,
) -> Result<(), ClientError>
where
    W: AsyncWrite + Unpin,
{
    if payload.is_empty() {
        return Ok(());
    }

    while let Some(chunk) = payload.next_chunk().await {
        let chunk = chunk?;
        trace!(size = chunk.len(), "write request chunk");
        writer.write(Message::<(RequestHeader, PayloadSize)>::Payload(PayloadItem::Chunk(chunk)))?;
        if writer.buffered() >= flush_threshold {
            writer.flush().await?;
        }
    }
    writer.write(Message::<(RequestHeader, PayloadSize), Bytes>::Payload(PayloadItem::Eof))?;
    Ok(())
}
