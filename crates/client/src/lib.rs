//! The request execution core of an asynchronous micro HTTP client
//!
//! A request handed to [`Client::execute`] travels through an ordered chain of interceptors before
//! a terminal writes it onto a connection. The built-in interceptors follow redirects and retry
//! failed attempts; the [`RequestWriter`] completes the request head and dispatches it onto an
//! HTTP/1.x or HTTP/2 connection.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use micro_client::{Client, ClientError, Connection, Connector, Request};
//!
//! struct TcpConnector;
//!
//! #[async_trait::async_trait]
//! impl Connector for TcpConnector {
//!     async fn connect(&self, request: &Request) -> Result<Box<dyn Connection>, ClientError> {
//!         // open (or reuse) a connection to request.uri()
//!         # unimplemented!()
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::builder()
//!     .connector(TcpConnector)
//!     .max_redirects(5)
//!     .max_retries(2)
//!     .back_off(|attempt: u32| Duration::from_millis(100 * u64::from(attempt)))
//!     .build()?;
//!
//! let request = Request::get("http://127.0.0.1:8080/users").param("page", "1").build()?;
//! let response = client.execute(request).await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`context`]: the per-call attribute store and its well-known keys
//! - [`exec`]: [`Interceptor`], [`ExecChain`], the redirect and retry interceptors and the
//!   connecting [`Dispatcher`]
//! - [`writer`]: header normalization and protocol dispatch
//! - [`connection`]: the traits a transport implements
//!
//! # Limitations
//!
//! - Connection establishment, pooling and TLS are left to the [`Connector`]
//! - HTTP/2 framing and HPACK belong to the connection's [`Http2Handler`]

mod body;
mod client;
pub mod connection;
pub mod context;
mod error;
pub mod exec;
mod request;
mod response;
pub mod writer;

pub use body::{ChunkedBody, Multipart, MultipartFile, RequestBody, ResponseBody};
pub use client::{Client, ClientBuildError, ClientBuilder};
pub use connection::{Connection, Connector, ContinueOutcome, Http2Handler};
pub use context::{AttrKey, Context};
pub use error::{BoxError, ClientError, RedirectError, RetryError};
pub use exec::{
    BackOff, DefaultRetryPredicate, Dispatcher, ExecChain, ExponentialBackOff, FixedBackOff, Interceptor, Interceptors,
    InterceptorsBuilder, NoBackOff, RedirectInterceptor, RetryInterceptor, RetryPredicate, Terminal,
};
pub use request::{CompletionHandler, Parts, Request, RequestBuilder, RequestOptions};
pub use response::Response;
pub use writer::{Payload, RequestWriter, WriteProgress};
