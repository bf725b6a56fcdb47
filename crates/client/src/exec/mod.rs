//! The interceptor chain a request travels through before it reaches the wire.
//!
//! [`Interceptors`] holds the static, order-sorted list built once per client. Each call walks it
//! through an [`ExecChain`]: an interceptor receives the request plus the remainder of the chain and
//! decides whether, how often and with which request to call [`ExecChain::proceed`]. After the last
//! interceptor the chain hands the request to its [`Terminal`], normally the [`Dispatcher`].
//!
//! Built-in interceptors and their orders:
//!
//! - [`RedirectInterceptor`]: `-3000`
//! - [`RetryInterceptor`]: `-2000`
//!
//! Lower orders sit closer to the caller, so every retried attempt is itself subject to redirect
//! following.

mod dispatch;
mod redirect;
mod retry;

pub use dispatch::Dispatcher;
pub use redirect::RedirectInterceptor;
pub use retry::BackOff;
pub use retry::DefaultRetryPredicate;
pub use retry::ExponentialBackOff;
pub use retry::FixedBackOff;
pub use retry::NoBackOff;
pub use retry::RetryInterceptor;
pub use retry::RetryPredicate;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::ClientError;
use crate::request::Request;
use crate::response::Response;

#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn proceed(&self, request: Request, next: &mut ExecChain<'_>) -> Result<Response, ClientError>;

    /// Position in the chain; lower values run earlier.
    fn order(&self) -> i32 {
        0
    }
}

/// The end of the chain: turns a finalized request into a response.
#[async_trait]
pub trait Terminal: Send + Sync {
    async fn execute(&self, request: Request, ctx: &mut Context) -> Result<Response, ClientError>;
}

/// The remainder of the chain as seen by one interceptor.
pub struct ExecChain<'a> {
    interceptors: &'a [Arc<dyn Interceptor>],
    terminal: &'a dyn Terminal,
    ctx: &'a mut Context,
}

impl fmt::Debug for ExecChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecChain").field("remaining", &self.interceptors.len()).field("ctx", &self.ctx).finish()
    }
}

impl<'a> ExecChain<'a> {
    pub fn new(interceptors: &'a Interceptors, terminal: &'a dyn Terminal, ctx: &'a mut Context) -> Self {
        Self { interceptors: &interceptors.inner, terminal, ctx }
    }

    pub fn ctx(&self) -> &Context {
        &*self.ctx
    }

    pub fn ctx_mut(&mut self) -> &mut Context {
        &mut *self.ctx
    }

    /// Runs the next interceptor, or the terminal when none is left.
    ///
    /// Each call walks the remainder once; calling it again starts a fresh traversal of the same
    /// remainder, which is how redirect hops and retry attempts re-enter the chain.
    pub async fn proceed(&mut self, request: Request) -> Result<Response, ClientError> {
        match self.interceptors.split_first() {
            Some((current, rest)) => {
                let mut next = ExecChain { interceptors: rest, terminal: self.terminal, ctx: &mut *self.ctx };
                current.proceed(request, &mut next).await
            }
            None => self.terminal.execute(request, &mut *self.ctx).await,
        }
    }
}

/// An immutable, order-sorted list of interceptors.
#[derive(Clone, Default)]
pub struct Interceptors {
    inner: Vec<Arc<dyn Interceptor>>,
}

impl fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptors").field("orders", &self.orders()).finish()
    }
}

impl Interceptors {
    pub fn builder() -> InterceptorsBuilder {
        InterceptorsBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn orders(&self) -> Vec<i32> {
        self.inner.iter().map(|interceptor| interceptor.order()).collect()
    }

    /// Runs `request` through the whole chain with `ctx` as the call's context.
    pub async fn execute(
        &self,
        request: Request,
        terminal: &dyn Terminal,
        ctx: &mut Context,
    ) -> Result<Response, ClientError> {
        ExecChain::new(self, terminal, ctx).proceed(request).await
    }
}

pub struct InterceptorsBuilder {
    inner: Vec<Arc<dyn Interceptor>>,
}

impl fmt::Debug for InterceptorsBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorsBuilder").field("len", &self.inner.len()).finish()
    }
}

impl InterceptorsBuilder {
    fn new() -> Self {
        Self { inner: vec![] }
    }

    pub fn add_last<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.inner.push(Arc::new(interceptor));
        self
    }

    pub fn add_first<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.inner.insert(0, Arc::new(interceptor));
        self
    }

    pub fn add_shared(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.inner.push(interceptor);
        self
    }

    /// Sorts by [`Interceptor::order`]; interceptors with equal order keep their insertion order.
    pub fn build(mut self) -> Interceptors {
        self.inner.sort_by_key(|interceptor| interceptor.order());
        Interceptors { inner: self.inner }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use http::StatusCode;
    use http::header::LOCATION;

    use super::Terminal;
    use crate::body::ResponseBody;
    use crate::context::Context;
    use crate::error::ClientError;
    use crate::request::Request;
    use crate::response::Response;

    pub(crate) type Outcome = Result<Response, ClientError>;

    /// A terminal that replays scripted outcomes and records every request it receives.
    #[derive(Default)]
    pub(crate) struct ScriptedTerminal {
        outcomes: Mutex<VecDeque<Box<dyn Fn() -> Outcome + Send>>>,
        fallback: Option<Box<dyn Fn() -> Outcome + Send + Sync>>,
        requests: Mutex<Vec<Request>>,
    }

    impl ScriptedTerminal {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Every call past the scripted ones resolves with `outcome()`.
        pub(crate) fn always<F>(outcome: F) -> Self
        where
            F: Fn() -> Outcome + Send + Sync + 'static,
        {
            Self { fallback: Some(Box::new(outcome)), ..Self::default() }
        }

        pub(crate) fn then<F>(self, outcome: F) -> Self
        where
            F: Fn() -> Outcome + Send + 'static,
        {
            self.outcomes.lock().unwrap().push_back(Box::new(outcome));
            self
        }

        pub(crate) fn requests(&self) -> Vec<Request> {
            self.requests.lock().unwrap().clone()
        }

        pub(crate) fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Terminal for ScriptedTerminal {
        async fn execute(&self, request: Request, _ctx: &mut Context) -> Result<Response, ClientError> {
            self.requests.lock().unwrap().push(request);
            let scripted = self.outcomes.lock().unwrap().pop_front();
            match (scripted, &self.fallback) {
                (Some(outcome), _) => outcome(),
                (None, Some(fallback)) => fallback(),
                (None, None) => Ok(ok()),
            }
        }
    }

    pub(crate) fn ok() -> Response {
        response(StatusCode::OK)
    }

    pub(crate) fn response(status: StatusCode) -> Response {
        http::Response::builder().status(status).body(ResponseBody::empty()).unwrap()
    }

    pub(crate) fn redirect(status: u16, location: &str) -> Response {
        http::Response::builder().status(status).header(LOCATION, location).body(ResponseBody::empty()).unwrap()
    }

    pub(crate) fn reset() -> ClientError {
        ClientError::from(std::io::Error::from(std::io::ErrorKind::ConnectionReset))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::context::AttrKey;
    use http::StatusCode;

    const TRAIL: AttrKey<String> = AttrKey::new("trail");

    struct Mark {
        name: &'static str,
        order: i32,
    }

    #[async_trait]
    impl Interceptor for Mark {
        async fn proceed(&self, request: Request, next: &mut ExecChain<'_>) -> Result<Response, ClientError> {
            let mut trail = next.ctx().get_or(&TRAIL, String::new());
            trail.push_str(self.name);
            next.ctx_mut().reset(&TRAIL, trail);
            next.proceed(request).await
        }

        fn order(&self) -> i32 {
            self.order
        }
    }

    struct ShortCircuit;

    #[async_trait]
    impl Interceptor for ShortCircuit {
        async fn proceed(&self, _request: Request, _next: &mut ExecChain<'_>) -> Result<Response, ClientError> {
            Ok(response(StatusCode::NO_CONTENT))
        }
    }

    fn request() -> Request {
        Request::get("http://localhost/").build().unwrap()
    }

    #[tokio::test]
    async fn runs_in_order() {
        let interceptors = Interceptors::builder()
            .add_last(Mark { name: "c", order: 10 })
            .add_last(Mark { name: "a", order: -3000 })
            .add_last(Mark { name: "b1", order: 0 })
            .add_last(Mark { name: "b2", order: 0 })
            .build();
        assert_eq!(interceptors.orders(), vec![-3000, 0, 0, 10]);

        let terminal = ScriptedTerminal::new();
        let mut ctx = Context::new();
        let response = interceptors.execute(request(), &terminal, &mut ctx).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(ctx.get(&TRAIL).as_deref(), Some("ab1b2c"));
        assert_eq!(terminal.calls(), 1);
    }

    #[tokio::test]
    async fn add_first_wins_ties() {
        let interceptors = Interceptors::builder()
            .add_last(Mark { name: "x", order: 0 })
            .add_first(Mark { name: "y", order: 0 })
            .build();

        let terminal = ScriptedTerminal::new();
        let mut ctx = Context::new();
        interceptors.execute(request(), &terminal, &mut ctx).await.unwrap();
        assert_eq!(ctx.get(&TRAIL).as_deref(), Some("yx"));
    }

    #[tokio::test]
    async fn short_circuit_skips_terminal() {
        let interceptors =
            Interceptors::builder().add_last(ShortCircuit).add_last(Mark { name: "a", order: 0 }).build();

        let terminal = ScriptedTerminal::new();
        let mut ctx = Context::new();
        let response = interceptors.execute(request(), &terminal, &mut ctx).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(terminal.calls(), 0);
        assert!(!ctx.contains(&TRAIL));
    }

    #[tokio::test]
    async fn empty_chain_goes_straight_to_terminal() {
        let interceptors = Interceptors::builder().build();
        assert!(interceptors.is_empty());

        let terminal = ScriptedTerminal::new().then(|| Err(reset()));
        let mut ctx = Context::new();
        let result = interceptors.execute(request(), &terminal, &mut ctx).await;
        assert!(matches!(result, Err(ClientError::Io { .. })));
    }
}
