use std::error::Error;
use std::io;
use std::time::Duration;

use micro_client_proto::protocol::SendError;
use thiserror::Error;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// The single failure a call to [`Client::execute`](crate::Client::execute) resolves with.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("no response received within {timeout:?}")]
    ReadTimeout { timeout: Duration },

    #[error("send error: {source}")]
    Send {
        #[from]
        source: SendError,
    },

    #[error("redirect error: {source}")]
    Redirect {
        #[from]
        source: RedirectError,
    },

    #[error("retry error: {source}")]
    Retry {
        #[from]
        source: RetryError,
    },

    #[error("no more streams can be created on connection: {connection}, and current connection will close gracefully")]
    StreamIdExhausted { connection: String },

    #[error("unable to detect http2 handler on connection: {connection}")]
    MissingHttp2Handler { connection: String },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("transport error: {source}")]
    Transport {
        #[source]
        source: BoxError,
    },
}

impl ClientError {
    pub fn connect<S: ToString>(target: S, source: io::Error) -> Self {
        Self::Connect { target: target.to_string(), source }
    }

    pub fn read_timeout(timeout: Duration) -> Self {
        Self::ReadTimeout { timeout }
    }

    pub fn stream_id_exhausted<S: ToString>(connection: S) -> Self {
        Self::StreamIdExhausted { connection: connection.to_string() }
    }

    pub fn missing_http2_handler<S: ToString>(connection: S) -> Self {
        Self::MissingHttp2Handler { connection: connection.to_string() }
    }

    pub fn invalid_request<S: ToString>(str: S) -> Self {
        Self::InvalidRequest { reason: str.to_string() }
    }

    pub fn transport<E: Into<BoxError>>(e: E) -> Self {
        Self::Transport { source: e.into() }
    }

    /// Whether this failure happened on the connection itself (reset, refused, timed out).
    ///
    /// Only these are worth another attempt; protocol-shape and limit errors would fail the
    /// same way again.
    pub fn is_transport(&self) -> bool {
        match self {
            ClientError::Io { .. } | ClientError::Connect { .. } | ClientError::ReadTimeout { .. } => true,
            ClientError::Send { source } => matches!(source, SendError::Io { .. }),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("failed to proceed request after max redirects: {max_redirects}")]
    Exhausted { max_redirects: u32 },

    #[error("redirect location is missing")]
    MissingLocation,

    #[error("invalid redirect location: {location}")]
    InvalidLocation {
        location: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("unexpected error while redirecting: {reason}")]
    Unexpected { reason: String },
}

impl RedirectError {
    pub fn invalid_location<S: ToString>(location: S) -> Self {
        Self::InvalidLocation { location: location.to_string(), source: None }
    }

    pub fn invalid_location_caused<S: ToString, E: Into<BoxError>>(location: S, source: E) -> Self {
        Self::InvalidLocation { location: location.to_string(), source: Some(source.into()) }
    }

    pub fn unexpected<S: ToString>(str: S) -> Self {
        Self::Unexpected { reason: str.to_string() }
    }
}

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("failed to proceed request after max retries: {max_retries}, last cause: {source}")]
    Exhausted {
        max_retries: u32,
        #[source]
        source: Box<ClientError>,
    },

    #[error("unexpected error while deciding to retry: {reason}")]
    Predicate { reason: String },
}

impl RetryError {
    pub fn exhausted(max_retries: u32, source: ClientError) -> Self {
        Self::Exhausted { max_retries, source: Box::new(source) }
    }

    pub fn predicate<S: ToString>(str: S) -> Self {
        Self::Predicate { reason: str.to_string() }
    }
}
