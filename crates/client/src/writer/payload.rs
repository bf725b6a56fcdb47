use std::collections::VecDeque;
use std::path::PathBuf;

use bytes::{BufMut, Bytes, BytesMut};
use futures::StreamExt;
use http::HeaderValue;
use http_body::Body as HttpBody;
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;
use micro_client_proto::protocol::PayloadSize;
use rand::Rng;
use rand::distr::Alphanumeric;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::body::{Multipart, RequestBody};
use crate::error::{BoxError, ClientError};

const BOUNDARY_LEN: usize = 32;

/// A request body opened for writing: its framing, its own content type if it has one, and the
/// source its chunks are read from.
pub struct Payload {
    size: PayloadSize,
    content_type: Option<HeaderValue>,
    source: Source,
}

enum Source {
    Full(Option<Bytes>),
    File(ReaderStream<File>),
    Parts(VecDeque<Part>),
    Body(UnsyncBoxBody<Bytes, BoxError>),
}

/// One segment of a multipart body: encoded part headers or a file streamed from disk.
enum Part {
    Bytes(Bytes),
    File(FilePart),
}

struct FilePart {
    path: PathBuf,
    length: u64,
    stream: ReaderStream<File>,
    scan: DelimiterScan,
}

impl Part {
    fn len(&self) -> u64 {
        match self {
            Part::Bytes(bytes) => bytes.len() as u64,
            Part::File(file) => file.length,
        }
    }
}

impl Payload {
    pub fn empty() -> Self {
        Self { size: PayloadSize::Empty, content_type: None, source: Source::Full(None) }
    }

    fn full(bytes: Bytes, content_type: Option<HeaderValue>) -> Self {
        if bytes.is_empty() {
            return Self { content_type, ..Self::empty() };
        }
        Self { size: PayloadSize::Length(bytes.len() as u64), content_type, source: Source::Full(Some(bytes)) }
    }

    /// Opens the body: files are opened and measured, chunked bodies taken, forms encoded.
    pub async fn open(body: &RequestBody) -> Result<Self, ClientError> {
        match body {
            RequestBody::Empty => Ok(Self::empty()),
            RequestBody::Bytes(bytes) => Ok(Self::full(bytes.clone(), None)),
            RequestBody::File(path) => {
                let file = File::open(path).await?;
                let length = file.metadata().await?.len();
                Ok(Self {
                    size: PayloadSize::from_length(Some(length)),
                    content_type: Some(HeaderValue::from_static("application/octet-stream")),
                    source: Source::File(ReaderStream::new(file)),
                })
            }
            RequestBody::Multipart(multipart) if multipart.is_form() => {
                let encoded = serde_urlencoded::to_string(multipart.attrs())
                    .map_err(|e| ClientError::invalid_request(format!("failed to encode form: {e}")))?;
                let content_type = HeaderValue::from_static("application/x-www-form-urlencoded");
                Ok(Self::full(Bytes::from(encoded), Some(content_type)))
            }
            RequestBody::Multipart(multipart) => {
                let boundary = pick_boundary(multipart, random_boundary);
                Self::multipart(multipart, &boundary).await
            }
            RequestBody::Chunked(chunked) => {
                let body = chunked.take().await?;
                let size = match body.size_hint().exact() {
                    Some(length) => PayloadSize::from_length(Some(length)),
                    None => PayloadSize::Chunked,
                };
                Ok(Self { size, content_type: None, source: Source::Body(body) })
            }
        }
    }

    /// Lays out a `multipart/form-data` body. File parts are opened and measured here and read
    /// only while the body is written.
    async fn multipart(multipart: &Multipart, boundary: &str) -> Result<Self, ClientError> {
        let delimiter = Bytes::from(format!("--{boundary}"));
        let mut parts = VecDeque::new();
        let mut buf = BytesMut::new();

        for (name, value) in multipart.attrs() {
            buf.put_slice(format!("--{boundary}\r\n").as_bytes());
            buf.put_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes());
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }

        for file in multipart.files() {
            let filename = match &file.filename {
                Some(filename) => filename.clone(),
                None => file.path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default(),
            };
            buf.put_slice(format!("--{boundary}\r\n").as_bytes());
            buf.put_slice(
                format!("Content-Disposition: form-data; name=\"{}\"; filename=\"{filename}\"\r\n", file.name)
                    .as_bytes(),
            );
            buf.put_slice(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
            parts.push_back(Part::Bytes(buf.split().freeze()));

            let handle = File::open(&file.path).await?;
            let length = handle.metadata().await?.len();
            parts.push_back(Part::File(FilePart {
                path: file.path.clone(),
                length,
                stream: ReaderStream::new(handle),
                scan: DelimiterScan::new(delimiter.clone()),
            }));
            buf.put_slice(b"\r\n");
        }

        buf.put_slice(format!("--{boundary}--\r\n").as_bytes());
        parts.push_back(Part::Bytes(buf.freeze()));

        let content_type = HeaderValue::try_from(format!("multipart/form-data; boundary={boundary}"))
            .map_err(|e| ClientError::invalid_request(format!("invalid multipart content type: {e}")))?;
        Ok(Self {
            size: PayloadSize::from_length(Some(parts.iter().map(Part::len).sum())),
            content_type: Some(content_type),
            source: Source::Parts(parts),
        })
    }

    /// Frames a payload of known length with chunked transfer coding.
    pub fn frame_chunked(&mut self) {
        if let PayloadSize::Length(_) = self.size {
            self.size = PayloadSize::Chunked;
        }
    }

    pub fn size(&self) -> PayloadSize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_empty()
    }

    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.content_type.as_ref()
    }

    /// The next data chunk, `None` once the body is drained. Trailers are skipped.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, ClientError>> {
        match &mut self.source {
            Source::Full(bytes) => bytes.take().map(Ok),
            Source::File(stream) => stream.next().await.map(|result| result.map_err(ClientError::from)),
            Source::Parts(parts) => loop {
                match parts.front_mut()? {
                    Part::Bytes(bytes) => {
                        let bytes = std::mem::take(bytes);
                        parts.pop_front();
                        if !bytes.is_empty() {
                            return Some(Ok(bytes));
                        }
                    }
                    Part::File(file) => match file.stream.next().await {
                        Some(Ok(chunk)) if file.scan.found_in(&chunk) => {
                            let reason = format!("multipart boundary found in {}", file.path.display());
                            return Some(Err(ClientError::invalid_request(reason)));
                        }
                        Some(chunk) => return Some(chunk.map_err(ClientError::from)),
                        None => {
                            parts.pop_front();
                        }
                    },
                }
            },
            Source::Body(body) => loop {
                match body.frame().await? {
                    Ok(frame) => match frame.into_data() {
                        Ok(data) if data.is_empty() => continue,
                        Ok(data) => return Some(Ok(data)),
                        Err(_trailers) => continue,
                    },
                    Err(e) => return Some(Err(ClientError::transport(e))),
                }
            },
        }
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payload").field("size", &self.size).field("content_type", &self.content_type).finish()
    }
}

fn random_boundary() -> String {
    let token: String = rand::rng().sample_iter(&Alphanumeric).take(BOUNDARY_LEN).map(char::from).collect();
    format!("MicroClientBoundary{token}")
}

/// Draws boundaries from `generate` until one appears in no attribute, field name or file name.
fn pick_boundary(multipart: &Multipart, mut generate: impl FnMut() -> String) -> String {
    loop {
        let boundary = generate();
        let attrs = multipart.attrs().iter().flat_map(|(name, value)| [name.as_str(), value.as_str()]);
        let files = multipart
            .files()
            .iter()
            .flat_map(|file| [file.name.as_str(), file.filename.as_deref().unwrap_or_default()]);
        let collides = attrs.chain(files).any(|text| text.contains(&boundary));
        if !collides {
            return boundary;
        }
    }
}

/// Watches streamed file content for the multipart delimiter, also across chunk edges.
struct DelimiterScan {
    delimiter: Bytes,
    tail: Vec<u8>,
}

impl DelimiterScan {
    fn new(delimiter: Bytes) -> Self {
        Self { delimiter, tail: Vec::new() }
    }

    fn found_in(&mut self, chunk: &[u8]) -> bool {
        let mut window = std::mem::take(&mut self.tail);
        window.extend_from_slice(chunk);
        let found = window.windows(self.delimiter.len()).any(|candidate| candidate == self.delimiter.as_ref());

        let keep = (self.delimiter.len() - 1).min(window.len());
        self.tail = window.split_off(window.len() - keep);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::ChunkedBody;
    use http_body_util::{Full, StreamBody};
    use http_body::Frame;
    use std::io::Write;

    async fn drain(payload: &mut Payload) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = payload.next_chunk().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    fn temp_file(name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("micro-client-{}-{name}", std::process::id()));
        std::fs::File::create(&path).unwrap().write_all(content).unwrap();
        path
    }

    #[tokio::test]
    async fn bytes_payload() {
        let mut payload = Payload::open(&RequestBody::from("hello")).await.unwrap();
        assert_eq!(payload.size(), PayloadSize::Length(5));
        assert!(payload.content_type().is_none());
        assert_eq!(drain(&mut payload).await, b"hello");

        let payload = Payload::open(&RequestBody::from("")).await.unwrap();
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn form_payload() {
        let form = Multipart::new().attr("name", "micro client").attr("lang", "rust&go");
        let mut payload = Payload::open(&RequestBody::from(form)).await.unwrap();

        assert_eq!(payload.content_type().unwrap(), "application/x-www-form-urlencoded");
        assert_eq!(drain(&mut payload).await, b"name=micro+client&lang=rust%26go");
    }

    #[tokio::test]
    async fn multipart_payload() {
        let path = temp_file("multipart.txt", b"file content");
        let form = Multipart::new().attr("kind", "report").file("upload", &path);
        let mut payload = Payload::open(&RequestBody::from(form)).await.unwrap();

        let content_type = payload.content_type().unwrap().to_str().unwrap().to_string();
        let boundary = content_type.strip_prefix("multipart/form-data; boundary=").unwrap().to_string();
        assert!(boundary.starts_with("MicroClientBoundary"));
        let text = String::from_utf8(drain(&mut payload).await).unwrap();

        let first_part = format!("--{boundary}\r\nContent-Disposition: form-data; name=\"kind\"\r\n\r\nreport\r\n");
        assert!(text.starts_with(&first_part));
        assert!(text.contains("name=\"upload\"; filename=\"micro-client-"));
        assert!(text.contains("Content-Type: application/octet-stream\r\n\r\nfile content\r\n"));
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
        assert_eq!(payload.size(), PayloadSize::Length(text.len() as u64));

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn multipart_file_is_streamed_from_disk() {
        let path = temp_file("streamed.txt", b"file content");
        let form = Multipart::new().file("upload", &path);
        let mut payload = Payload::multipart(&form, "fixed").await.unwrap();

        let mut chunks = Vec::new();
        while let Some(chunk) = payload.next_chunk().await {
            chunks.push(chunk.unwrap());
        }

        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].ends_with(b"Content-Type: application/octet-stream\r\n\r\n"));
        assert_eq!(chunks[1], "file content");
        assert_eq!(chunks[2], "\r\n--fixed--\r\n");
        let total: usize = chunks.iter().map(Bytes::len).sum();
        assert_eq!(payload.size(), PayloadSize::Length(total as u64));

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn multipart_file_containing_delimiter_fails() {
        let path = temp_file("clash.txt", b"line one\r\n--fixed\r\nline two");
        let form = Multipart::new().file("upload", &path);
        let mut payload = Payload::multipart(&form, "fixed").await.unwrap();

        let mut failure = None;
        while let Some(chunk) = payload.next_chunk().await {
            if let Err(e) = chunk {
                failure = Some(e);
                break;
            }
        }

        assert!(matches!(failure, Some(ClientError::InvalidRequest { reason }) if reason.contains("clash.txt")));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn delimiter_split_across_chunks_is_found() {
        let mut scan = DelimiterScan::new(Bytes::from_static(b"--fixed"));
        assert!(!scan.found_in(b"abc"));
        assert!(!scan.found_in(b"def--fi"));
        assert!(scan.found_in(b"xed tail"));

        let mut scan = DelimiterScan::new(Bytes::from_static(b"--fixed"));
        assert!(!scan.found_in(b"-"));
        assert!(!scan.found_in(b"-fix"));
        assert!(scan.found_in(b"ed"));
    }

    #[test]
    fn boundary_avoids_form_content() {
        let form = Multipart::new().attr("note", "see MicroClientBoundaryAAA").file("upload", "/tmp/x.bin");
        let mut candidates = vec!["MicroClientBoundaryBBB", "MicroClientBoundaryAAA"];

        let boundary = pick_boundary(&form, || candidates.pop().unwrap().to_string());

        assert_eq!(boundary, "MicroClientBoundaryBBB");
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn file_payload() {
        let path = temp_file("file.bin", b"0123456789");
        let mut payload = Payload::open(&RequestBody::File(path.clone())).await.unwrap();

        assert_eq!(payload.size(), PayloadSize::Length(10));
        assert_eq!(payload.content_type().unwrap(), "application/octet-stream");
        assert_eq!(drain(&mut payload).await, b"0123456789");

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn missing_file() {
        let result = Payload::open(&RequestBody::File("/definitely/not/here.bin".into())).await;
        assert!(matches!(result, Err(ClientError::Io { .. })));
    }

    #[tokio::test]
    async fn chunked_payload_of_unknown_length() {
        let frames: Vec<Result<Frame<Bytes>, std::io::Error>> = vec![
            Ok(Frame::data(Bytes::from_static(b"ab"))),
            Ok(Frame::data(Bytes::new())),
            Ok(Frame::data(Bytes::from_static(b"cd"))),
        ];
        let body = RequestBody::from(ChunkedBody::new(StreamBody::new(futures::stream::iter(frames))));

        let mut payload = Payload::open(&body).await.unwrap();
        assert_eq!(payload.size(), PayloadSize::Chunked);
        assert_eq!(drain(&mut payload).await, b"abcd");

        let result = Payload::open(&body).await;
        assert!(matches!(result, Err(ClientError::InvalidRequest { .. })));
    }

    #[tokio::test]
    async fn chunked_payload_of_known_length() {
        let body = RequestBody::from(ChunkedBody::new(Full::new(Bytes::from_static(b"xyz"))));
        let payload = Payload::open(&body).await.unwrap();
        assert_eq!(payload.size(), PayloadSize::Length(3));
    }

    #[test]
    fn random_boundaries_differ() {
        let (a, b) = (random_boundary(), random_boundary());
        assert_ne!(a, b);
        assert_eq!(a.len(), "MicroClientBoundary".len() + BOUNDARY_LEN);
        assert!(a.bytes().all(|byte| byte.is_ascii_alphanumeric()));
    }
}
