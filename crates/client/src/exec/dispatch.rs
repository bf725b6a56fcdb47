use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::connection::{ContinueOutcome, Connector};
use crate::context::Context;
use crate::error::ClientError;
use crate::exec::Terminal;
use crate::request::Request;
use crate::response::Response;
use crate::writer::RequestWriter;

/// The terminal of the chain: connects, writes and waits for the response.
pub struct Dispatcher {
    connector: Arc<dyn Connector>,
    writer: RequestWriter,
    read_timeout: Option<Duration>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("writer", &self.writer)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(connector: Arc<dyn Connector>, writer: RequestWriter) -> Self {
        Self { connector, writer, read_timeout: None }
    }

    /// Bounds the wait for a response when the request sets no timeout of its own.
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

#[async_trait]
impl Terminal for Dispatcher {
    async fn execute(&self, request: Request, ctx: &mut Context) -> Result<Response, ClientError> {
        let mut conn = self.connector.connect(&request).await?;
        let mut progress = self.writer.write(&request, conn.as_mut(), ctx).await?;
        let stream_id = progress.stream_id();

        if progress.is_deferred() {
            match conn.await_continue(stream_id).await? {
                ContinueOutcome::Continue => self.writer.write_deferred(conn.as_mut(), &mut progress).await?,
                ContinueOutcome::Final(response) => {
                    debug!(
                        connection = conn.id(),
                        status = response.status().as_u16(),
                        "request body rejected before sending"
                    );
                    return Ok(response);
                }
            }
        }

        match request.options().read_timeout.or(self.read_timeout) {
            Some(timeout) => tokio::time::timeout(timeout, conn.response(stream_id))
                .await
                .map_err(|_| ClientError::read_timeout(timeout))?,
            None => conn.response(stream_id).await,
        }
    }
}
