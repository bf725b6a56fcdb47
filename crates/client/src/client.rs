use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::HeaderValue;
use thiserror::Error;
use tracing::debug;

use crate::connection::Connector;
use crate::context::Context;
use crate::context::names::{EXPECT_CONTINUE_ENABLED, MAX_REDIRECTS, MAX_RETRIES};
use crate::error::ClientError;
use crate::exec::{
    BackOff, DefaultRetryPredicate, Dispatcher, Interceptor, Interceptors, NoBackOff, RedirectInterceptor,
    RetryInterceptor, RetryPredicate, Terminal,
};
use crate::request::Request;
use crate::response::Response;
use crate::writer::RequestWriter;

pub struct ClientBuilder {
    connector: Option<Arc<dyn Connector>>,
    terminal: Option<Arc<dyn Terminal>>,
    max_redirects: u32,
    max_retries: u32,
    expect_continue: bool,
    read_timeout: Option<Duration>,
    retry_predicate: Arc<dyn RetryPredicate>,
    back_off: Arc<dyn BackOff>,
    default_content_type: HeaderValue,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("max_redirects", &self.max_redirects)
            .field("max_retries", &self.max_retries)
            .field("expect_continue", &self.expect_continue)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    fn new() -> Self {
        Self {
            connector: None,
            terminal: None,
            max_redirects: 0,
            max_retries: 0,
            expect_continue: false,
            read_timeout: None,
            retry_predicate: Arc::new(DefaultRetryPredicate),
            back_off: Arc::new(NoBackOff),
            default_content_type: HeaderValue::from_static("application/octet-stream"),
            interceptors: vec![],
        }
    }

    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Replaces the connecting terminal, e.g. with one that serves requests in process.
    pub fn terminal(mut self, terminal: impl Terminal + 'static) -> Self {
        self.terminal = Some(Arc::new(terminal));
        self
    }

    pub fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn expect_continue(mut self, enabled: bool) -> Self {
        self.expect_continue = enabled;
        self
    }

    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = Some(read_timeout);
        self
    }

    pub fn retry_predicate(mut self, predicate: impl RetryPredicate + 'static) -> Self {
        self.retry_predicate = Arc::new(predicate);
        self
    }

    pub fn back_off(mut self, back_off: impl BackOff + 'static) -> Self {
        self.back_off = Arc::new(back_off);
        self
    }

    pub fn default_content_type(mut self, content_type: HeaderValue) -> Self {
        self.default_content_type = content_type;
        self
    }

    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn build(self) -> Result<Client, ClientBuildError> {
        let terminal: Arc<dyn Terminal> = match (self.terminal, self.connector) {
            (Some(terminal), _) => terminal,
            (None, Some(connector)) => Arc::new(
                Dispatcher::new(connector, RequestWriter::new(self.default_content_type))
                    .with_read_timeout(self.read_timeout),
            ),
            (None, None) => return Err(ClientBuildError::MissingConnector),
        };

        let interceptors = self
            .interceptors
            .into_iter()
            .fold(Interceptors::builder(), |builder, interceptor| builder.add_shared(interceptor))
            .add_first(RetryInterceptor::from_shared(self.retry_predicate, self.back_off))
            .add_first(RedirectInterceptor::new())
            .build();

        Ok(Client {
            interceptors,
            terminal,
            max_redirects: self.max_redirects,
            max_retries: self.max_retries,
            expect_continue: self.expect_continue,
        })
    }
}

#[derive(Error, Debug)]
pub enum ClientBuildError {
    #[error("connector or terminal must be set")]
    MissingConnector,
}

/// Entry point for executing requests.
///
/// Each call gets its own [`Context`], seeded with the redirect limit, the retry limit and the
/// expect-continue flag. Request options win over the client defaults.
#[derive(Clone)]
pub struct Client {
    interceptors: Interceptors,
    terminal: Arc<dyn Terminal>,
    max_redirects: u32,
    max_retries: u32,
    expect_continue: bool,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("interceptors", &self.interceptors)
            .field("max_redirects", &self.max_redirects)
            .field("max_retries", &self.max_retries)
            .field("expect_continue", &self.expect_continue)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub async fn execute(&self, request: Request) -> Result<Response, ClientError> {
        let mut ctx = Context::new();
        self.execute_in(request, &mut ctx).await
    }

    /// Executes with a caller-owned context.
    ///
    /// Limits already present in `ctx` are kept unless the request overrides them, and the
    /// counters the interceptors leave behind can be read once the call resolves.
    pub async fn execute_in(&self, request: Request, ctx: &mut Context) -> Result<Response, ClientError> {
        let options = request.options();
        seed(ctx, &MAX_REDIRECTS, options.max_redirects, self.max_redirects);
        seed(ctx, &MAX_RETRIES, options.max_retries, self.max_retries);
        seed(ctx, &EXPECT_CONTINUE_ENABLED, options.expect_continue_enabled, self.expect_continue);

        let handler = options.handler.clone();
        debug!(method = %request.method(), uri = %request.uri(), "execute request");
        let outcome = self.interceptors.execute(request, self.terminal.as_ref(), ctx).await;

        if let Some(handler) = handler {
            handler.on_complete(outcome.as_ref());
        }
        outcome
    }
}

fn seed<T>(ctx: &mut Context, key: &crate::context::AttrKey<T>, option: Option<T>, default: T)
where
    T: std::any::Any + Clone + Send + Sync,
{
    match option {
        Some(value) => {
            ctx.set(key, value);
        }
        None if !ctx.contains(key) => {
            ctx.set(key, default);
        }
        None => {}
    }
}
