//! The head of an outgoing HTTP request.
//!
//! [`RequestHeader`] wraps `http::Request<()>`: everything but the body. The client core builds
//! one per attempt after header normalization and hands it to either the HTTP/1.x encoder or the
//! HTTP/2 handler of the connection.

use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version, header};

/// Represents the head of an outgoing HTTP request.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHeader {
    /// Consumes the header and returns the inner `Request<()>`.
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    /// Determines if a request with this method is expected to carry a body.
    ///
    /// Returns false for methods that usually go without one:
    /// - GET
    /// - HEAD
    /// - DELETE
    /// - OPTIONS
    /// - CONNECT
    /// - TRACE
    pub fn need_body(&self) -> bool {
        method_needs_body(self.method())
    }

    /// The request-target written on the HTTP/1.x request line.
    ///
    /// `CONNECT` uses the authority form, everything else the origin form (path and query),
    /// falling back to `/` when the URI has no path.
    pub fn request_target(&self) -> &str {
        let uri = self.uri();
        if self.method() == Method::CONNECT {
            if let Some(authority) = uri.authority() {
                return authority.as_str();
            }
        }

        match uri.path_and_query() {
            Some(path_and_query) if !path_and_query.as_str().is_empty() => path_and_query.as_str(),
            _ => "/",
        }
    }
}

/// Whether `chunked` is the final transfer coding named by `headers`.
///
/// Several `Transfer-Encoding` fields read as one comma separated list.
pub fn is_chunked_transfer(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::TRANSFER_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|coding| !coding.is_empty())
        .last()
        .is_some_and(|coding| coding.eq_ignore_ascii_case("chunked"))
}

/// Whether requests with `method` usually carry a body.
pub(crate) fn method_needs_body(method: &Method) -> bool {
    !matches!(
        *method,
        Method::GET | Method::HEAD | Method::DELETE | Method::OPTIONS | Method::CONNECT | Method::TRACE
    )
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}
