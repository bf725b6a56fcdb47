//! The outgoing request model.
//!
//! A [`Request`] is an immutable description of one logical call: method, target, query
//! parameters, headers, body and the per-request [`RequestOptions`]. Interceptors never mutate a
//! request in place; a redirect hop derives a new one and a retry re-sends a clone.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri};

use crate::body::RequestBody;
use crate::error::ClientError;
use crate::response::Response;

/// Receives the final outcome of a call once every hop and attempt is done.
pub trait CompletionHandler: Send + Sync {
    fn on_complete(&self, outcome: Result<&Response, &ClientError>);
}

impl<F> CompletionHandler for F
where
    F: Fn(Result<&Response, &ClientError>) + Send + Sync,
{
    fn on_complete(&self, outcome: Result<&Response, &ClientError>) {
        self(outcome)
    }
}

/// Per-request settings. `None` falls back to the client defaults.
#[derive(Clone)]
pub struct RequestOptions {
    pub read_timeout: Option<Duration>,
    pub uri_encode_enabled: bool,
    pub max_retries: Option<u32>,
    pub max_redirects: Option<u32>,
    pub expect_continue_enabled: Option<bool>,
    pub handler: Option<Arc<dyn CompletionHandler>>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            read_timeout: None,
            uri_encode_enabled: true,
            max_retries: None,
            max_redirects: None,
            expect_continue_enabled: None,
            handler: None,
        }
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("read_timeout", &self.read_timeout)
            .field("uri_encode_enabled", &self.uri_encode_enabled)
            .field("max_retries", &self.max_retries)
            .field("max_redirects", &self.max_redirects)
            .field("expect_continue_enabled", &self.expect_continue_enabled)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    params: Vec<(String, String)>,
    headers: HeaderMap,
    body: RequestBody,
    options: RequestOptions,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    pub fn get<U>(uri: U) -> RequestBuilder
    where
        U: TryInto<Uri>,
        U::Error: fmt::Display,
    {
        RequestBuilder::new().method(Method::GET).uri(uri)
    }

    pub fn post<U>(uri: U) -> RequestBuilder
    where
        U: TryInto<Uri>,
        U::Error: fmt::Display,
    {
        RequestBuilder::new().method(Method::POST).uri(uri)
    }

    pub fn put<U>(uri: U) -> RequestBuilder
    where
        U: TryInto<Uri>,
        U::Error: fmt::Display,
    {
        RequestBuilder::new().method(Method::PUT).uri(uri)
    }

    pub fn delete<U>(uri: U) -> RequestBuilder
    where
        U: TryInto<Uri>,
        U::Error: fmt::Display,
    {
        RequestBuilder::new().method(Method::DELETE).uri(uri)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// Starts a builder seeded with everything this request carries.
    pub fn to_builder(&self) -> RequestBuilder {
        RequestBuilder {
            inner: Ok(Parts {
                method: self.method.clone(),
                uri: self.uri.clone(),
                params: self.params.clone(),
                headers: self.headers.clone(),
                body: self.body.clone(),
                options: self.options.clone(),
            }),
        }
    }

    pub fn into_parts(self) -> Parts {
        Parts {
            method: self.method,
            uri: self.uri,
            params: self.params,
            headers: self.headers,
            body: self.body,
            options: self.options,
        }
    }

    pub fn from_parts(parts: Parts) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            params: parts.params,
            headers: parts.headers,
            body: parts.body,
            options: parts.options,
        }
    }
}

/// The owned pieces of a [`Request`], for deriving a new request from an old one.
#[derive(Debug, Clone)]
pub struct Parts {
    pub method: Method,
    pub uri: Uri,
    pub params: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub options: RequestOptions,
}

impl Default for Parts {
    fn default() -> Self {
        Self {
            method: Method::GET,
            uri: Uri::default(),
            params: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            options: RequestOptions::default(),
        }
    }
}

/// Builds a [`Request`]; the first invalid input is reported by [`build`](RequestBuilder::build).
#[derive(Debug)]
pub struct RequestBuilder {
    inner: Result<Parts, ClientError>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self { inner: Ok(Parts::default()) }
    }

    pub fn method(self, method: Method) -> Self {
        self.and_then(|mut parts| {
            parts.method = method;
            Ok(parts)
        })
    }

    pub fn uri<U>(self, uri: U) -> Self
    where
        U: TryInto<Uri>,
        U::Error: fmt::Display,
    {
        self.and_then(|mut parts| {
            parts.uri = uri.try_into().map_err(|e| ClientError::invalid_request(format!("invalid uri: {e}")))?;
            Ok(parts)
        })
    }

    /// Appends a query parameter; duplicates are kept in insertion order.
    pub fn param(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.and_then(|mut parts| {
            parts.params.push((name.into(), value.into()));
            Ok(parts)
        })
    }

    pub fn header<K, V>(self, name: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        K::Error: fmt::Display,
        V: TryInto<HeaderValue>,
        V::Error: fmt::Display,
    {
        self.and_then(|mut parts| {
            let name = name.try_into().map_err(|e| ClientError::invalid_request(format!("invalid header name: {e}")))?;
            let value =
                value.try_into().map_err(|e| ClientError::invalid_request(format!("invalid header value: {e}")))?;
            parts.headers.append(name, value);
            Ok(parts)
        })
    }

    pub fn body(self, body: impl Into<RequestBody>) -> Self {
        self.and_then(|mut parts| {
            parts.body = body.into();
            Ok(parts)
        })
    }

    pub fn read_timeout(self, timeout: Duration) -> Self {
        self.and_then(|mut parts| {
            parts.options.read_timeout = Some(timeout);
            Ok(parts)
        })
    }

    pub fn uri_encode_enabled(self, enabled: bool) -> Self {
        self.and_then(|mut parts| {
            parts.options.uri_encode_enabled = enabled;
            Ok(parts)
        })
    }

    pub fn max_retries(self, max_retries: u32) -> Self {
        self.and_then(|mut parts| {
            parts.options.max_retries = Some(max_retries);
            Ok(parts)
        })
    }

    pub fn max_redirects(self, max_redirects: u32) -> Self {
        self.and_then(|mut parts| {
            parts.options.max_redirects = Some(max_redirects);
            Ok(parts)
        })
    }

    pub fn expect_continue_enabled(self, enabled: bool) -> Self {
        self.and_then(|mut parts| {
            parts.options.expect_continue_enabled = Some(enabled);
            Ok(parts)
        })
    }

    pub fn handler<H>(self, handler: H) -> Self
    where
        H: CompletionHandler + 'static,
    {
        self.and_then(|mut parts| {
            parts.options.handler = Some(Arc::new(handler));
            Ok(parts)
        })
    }

    pub fn build(self) -> Result<Request, ClientError> {
        self.inner.map(Request::from_parts)
    }

    fn and_then<F>(self, func: F) -> Self
    where
        F: FnOnce(Parts) -> Result<Parts, ClientError>,
    {
        Self { inner: self.inner.and_then(func) }
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}
