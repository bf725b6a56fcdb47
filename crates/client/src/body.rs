use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::Body as HttpBody;
use http_body::{Frame, SizeHint};
use http_body_util::combinators::UnsyncBoxBody;
use mime::Mime;
use tokio::sync::Mutex;

use crate::error::{BoxError, ClientError};

/// What a request sends after its head.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Bytes(Bytes),
    File(PathBuf),
    Multipart(Multipart),
    /// A streamed body of unknown length, readable only once
    Chunked(ChunkedBody),
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    /// Streamed bodies cannot be replayed, so redirects and retries leave them alone.
    pub fn is_chunked(&self) -> bool {
        matches!(self, RequestBody::Chunked(_))
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Bytes(bytes)
    }
}

impl From<String> for RequestBody {
    fn from(value: String) -> Self {
        RequestBody::Bytes(Bytes::from(value))
    }
}

impl From<&'static str> for RequestBody {
    fn from(value: &'static str) -> Self {
        RequestBody::Bytes(Bytes::from_static(value.as_bytes()))
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(value: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(value))
    }
}

impl From<Multipart> for RequestBody {
    fn from(multipart: Multipart) -> Self {
        RequestBody::Multipart(multipart)
    }
}

impl From<ChunkedBody> for RequestBody {
    fn from(body: ChunkedBody) -> Self {
        RequestBody::Chunked(body)
    }
}

/// A streaming request body that can be taken exactly once.
///
/// Clones share the same underlying stream; whichever clone takes it first gets it.
#[derive(Clone)]
pub struct ChunkedBody {
    inner: Arc<Mutex<Option<UnsyncBoxBody<Bytes, BoxError>>>>,
}

impl ChunkedBody {
    pub fn new<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        use http_body_util::BodyExt;
        let boxed = body.map_err(Into::into).boxed_unsync();
        Self { inner: Arc::new(Mutex::new(Some(boxed))) }
    }

    pub async fn can_consume(&self) -> bool {
        self.inner.lock().await.is_some()
    }

    pub(crate) async fn take(&self) -> Result<UnsyncBoxBody<Bytes, BoxError>, ClientError> {
        self.inner.lock().await.take().ok_or_else(|| ClientError::invalid_request("body has been consumed"))
    }
}

impl std::fmt::Debug for ChunkedBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedBody").finish_non_exhaustive()
    }
}

/// A form body: plain attributes plus optional file parts.
///
/// Without file parts it is sent as `application/x-www-form-urlencoded`, otherwise as
/// `multipart/form-data`.
#[derive(Debug, Clone, Default)]
pub struct Multipart {
    attrs: Vec<(String, String)>,
    files: Vec<MultipartFile>,
}

#[derive(Debug, Clone)]
pub struct MultipartFile {
    pub name: String,
    pub filename: Option<String>,
    pub path: PathBuf,
    pub content_type: Mime,
}

impl Multipart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        self.files.push(MultipartFile {
            name: name.into(),
            filename: None,
            path: path.as_ref().to_path_buf(),
            content_type: mime::APPLICATION_OCTET_STREAM,
        });
        self
    }

    pub fn file_part(mut self, file: MultipartFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    pub fn files(&self) -> &[MultipartFile] {
        &self.files
    }

    pub fn is_form(&self) -> bool {
        self.files.is_empty()
    }
}

/// The body handle of a [`Response`](crate::Response): a single buffered chunk or a stream
/// handed over by the connection.
pub struct ResponseBody {
    inner: Kind,
}

enum Kind {
    Once(Option<Bytes>),
    Stream(UnsyncBoxBody<Bytes, BoxError>),
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self { inner: Kind::Once(None) }
    }

    pub fn once(bytes: Bytes) -> Self {
        if bytes.is_empty() { Self::empty() } else { Self { inner: Kind::Once(Some(bytes)) } }
    }

    pub fn stream<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        use http_body_util::BodyExt;
        Self { inner: Kind::Stream(body.map_err(Into::into).boxed_unsync()) }
    }
}

impl Default for ResponseBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Kind::Once(bytes) => f.debug_tuple("ResponseBody::Once").field(bytes).finish(),
            Kind::Stream(_) => f.write_str("ResponseBody::Stream"),
        }
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        Self::once(bytes)
    }
}

impl From<&'static str> for ResponseBody {
    fn from(value: &'static str) -> Self {
        Self::once(Bytes::from_static(value.as_bytes()))
    }
}

impl HttpBody for ResponseBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match &mut self.get_mut().inner {
            Kind::Once(option_bytes) => Poll::Ready(option_bytes.take().map(|bytes| Ok(Frame::data(bytes)))),
            Kind::Stream(box_body) => Pin::new(box_body).poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Kind::Once(option_bytes) => option_bytes.is_none(),
            Kind::Stream(box_body) => box_body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Kind::Once(None) => SizeHint::with_exact(0),
            Kind::Once(Some(bytes)) => SizeHint::with_exact(bytes.len() as u64),
            Kind::Stream(box_body) => box_body.size_hint(),
        }
    }
}
