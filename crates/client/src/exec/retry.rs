use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::context::names::{MAX_RETRIES, RETRIED_COUNT};
use crate::error::{ClientError, RetryError};
use crate::exec::{ExecChain, Interceptor};
use crate::request::Request;
use crate::response::Response;

/// Decides whether one attempt's outcome is worth another attempt.
pub trait RetryPredicate: Send + Sync {
    fn should_retry(&self, request: &Request, outcome: Result<&Response, &ClientError>) -> bool;
}

impl<F> RetryPredicate for F
where
    F: Fn(&Request, Result<&Response, &ClientError>) -> bool + Send + Sync,
{
    fn should_retry(&self, request: &Request, outcome: Result<&Response, &ClientError>) -> bool {
        self(request, outcome)
    }
}

/// Retries transport failures only; every response is final.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRetryPredicate;

impl RetryPredicate for DefaultRetryPredicate {
    fn should_retry(&self, _request: &Request, outcome: Result<&Response, &ClientError>) -> bool {
        match outcome {
            Ok(_) => false,
            Err(e) => e.is_transport(),
        }
    }
}

/// Maps the 1-based retry attempt to the delay waited before it.
#[cfg_attr(test, mockall::automock)]
pub trait BackOff: Send + Sync {
    fn delay_for(&self, attempt: u32) -> Duration;
}

impl<F> BackOff for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn delay_for(&self, attempt: u32) -> Duration {
        self(attempt)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoBackOff;

impl BackOff for NoBackOff {
    fn delay_for(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedBackOff {
    delay: Duration,
}

impl FixedBackOff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl BackOff for FixedBackOff {
    fn delay_for(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// `base * 2^(attempt - 1)`, never more than `cap`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackOff {
    base: Duration,
    cap: Duration,
}

impl ExponentialBackOff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }
}

impl BackOff for ExponentialBackOff {
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base.checked_mul(factor).map_or(self.cap, |delay| delay.min(self.cap))
    }
}

/// Re-sends the request while the predicate asks for it, up to the call's `MAX_RETRIES`.
///
/// The attempt that follows `MAX_RETRIES` failed ones is still made; only an outcome the predicate
/// wants retried after that surfaces as exhaustion. `RETRIED_COUNT` holds the number of retries
/// performed so far and is re-set before every attempt.
#[derive(Clone)]
pub struct RetryInterceptor {
    predicate: Arc<dyn RetryPredicate>,
    back_off: Arc<dyn BackOff>,
}

impl std::fmt::Debug for RetryInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryInterceptor").finish_non_exhaustive()
    }
}

impl RetryInterceptor {
    pub const ORDER: i32 = -2000;

    pub fn new() -> Self {
        Self { predicate: Arc::new(DefaultRetryPredicate), back_off: Arc::new(NoBackOff) }
    }

    pub fn with_predicate<P: RetryPredicate + 'static>(mut self, predicate: P) -> Self {
        self.predicate = Arc::new(predicate);
        self
    }

    pub fn with_back_off<B: BackOff + 'static>(mut self, back_off: B) -> Self {
        self.back_off = Arc::new(back_off);
        self
    }

    pub(crate) fn from_shared(predicate: Arc<dyn RetryPredicate>, back_off: Arc<dyn BackOff>) -> Self {
        Self { predicate, back_off }
    }

    fn should_retry(&self, request: &Request, outcome: Result<&Response, &ClientError>) -> Result<bool, RetryError> {
        catch_unwind(AssertUnwindSafe(|| self.predicate.should_retry(request, outcome)))
            .map_err(|payload| RetryError::predicate(panic_message(payload.as_ref())))
    }
}

impl Default for RetryInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "retry predicate panicked".to_string()
    }
}

#[async_trait]
impl Interceptor for RetryInterceptor {
    async fn proceed(&self, request: Request, next: &mut ExecChain<'_>) -> Result<Response, ClientError> {
        let max_retries = next.ctx().get_or(&MAX_RETRIES, 0);
        if request.body().is_chunked() || max_retries < 1 {
            next.ctx_mut().remove(&RETRIED_COUNT);
            debug!(max_retries, chunked = request.body().is_chunked(), "retry disabled, proceed directly");
            return next.proceed(request).await;
        }

        let mut retried = 0;
        loop {
            next.ctx_mut().reset(&RETRIED_COUNT, retried);
            let outcome = next.proceed(request.clone()).await;

            if !self.should_retry(&request, outcome.as_ref())? {
                return outcome;
            }

            if retried >= max_retries {
                warn!(max_retries, uri = %request.uri(), "retries exhausted");
                return outcome.map_err(|e| RetryError::exhausted(max_retries, e).into());
            }

            retried += 1;
            let delay = self.back_off.delay_for(retried);
            match &outcome {
                Ok(response) => debug!(attempt = retried, ?delay, status = response.status().as_u16(), "retry request"),
                Err(e) => debug!(attempt = retried, ?delay, error = %e, "retry request"),
            }
            drop(outcome);

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::ChunkedBody;
    use crate::context::Context;
    use crate::error::RedirectError;
    use crate::exec::Interceptors;
    use crate::exec::test_support::*;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;
    use mockall::Sequence;
    use mockall::predicate::eq;
    use std::sync::Mutex;

    fn chain(interceptor: RetryInterceptor) -> Interceptors {
        Interceptors::builder().add_last(interceptor).build()
    }

    fn ctx_with(max_retries: u32) -> Context {
        let mut ctx = Context::new();
        ctx.set(&MAX_RETRIES, max_retries);
        ctx
    }

    fn get() -> Request {
        Request::get("http://127.0.0.1:8080/ping").build().unwrap()
    }

    #[tokio::test]
    async fn disabled_when_max_is_zero() {
        let terminal = ScriptedTerminal::always(|| Err(reset()));
        let mut ctx = ctx_with(0);
        ctx.set(&RETRIED_COUNT, 4);

        let result = chain(RetryInterceptor::new()).execute(get(), &terminal, &mut ctx).await;

        assert!(matches!(result, Err(ClientError::Io { .. })));
        assert_eq!(terminal.calls(), 1);
        assert!(!ctx.contains(&RETRIED_COUNT));
    }

    #[tokio::test]
    async fn disabled_for_chunked_body() {
        let terminal = ScriptedTerminal::always(|| Err(reset()));
        let mut ctx = ctx_with(3);
        let request = Request::post("http://127.0.0.1:8080/upload")
            .body(ChunkedBody::new(Full::new(Bytes::from_static(b"chunk"))))
            .build()
            .unwrap();

        let result = chain(RetryInterceptor::new()).execute(request, &terminal, &mut ctx).await;

        assert!(matches!(result, Err(ClientError::Io { .. })));
        assert_eq!(terminal.calls(), 1);
        assert!(!ctx.contains(&RETRIED_COUNT));
    }

    #[tokio::test]
    async fn always_failing_exhausts_after_max_plus_one_attempts() {
        let terminal = ScriptedTerminal::always(|| Err(reset()));
        let mut ctx = ctx_with(2);

        let result = chain(RetryInterceptor::new()).execute(get(), &terminal, &mut ctx).await;

        match result {
            Err(ClientError::Retry { source: RetryError::Exhausted { max_retries, source } }) => {
                assert_eq!(max_retries, 2);
                assert!(matches!(*source, ClientError::Io { .. }));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(terminal.calls(), 3);
        assert_eq!(ctx.get(&RETRIED_COUNT), Some(2));
    }

    #[tokio::test]
    async fn fail_once_then_succeed() {
        let terminal = ScriptedTerminal::new().then(|| Err(reset())).then(|| Ok(ok()));
        let mut ctx = ctx_with(2);

        let response = chain(RetryInterceptor::new()).execute(get(), &terminal, &mut ctx).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(terminal.calls(), 2);
        assert_eq!(ctx.get(&RETRIED_COUNT), Some(1));
    }

    #[tokio::test]
    async fn success_on_last_allowed_attempt() {
        let max_retries = 10;
        let mut terminal = ScriptedTerminal::new();
        for _ in 0..max_retries {
            terminal = terminal.then(|| Err(reset()));
        }
        let terminal = terminal.then(|| Ok(ok()));
        let mut ctx = ctx_with(max_retries);

        let response = chain(RetryInterceptor::new()).execute(get(), &terminal, &mut ctx).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(terminal.calls(), 11);
        assert_eq!(ctx.get(&RETRIED_COUNT), Some(max_retries));
    }

    #[tokio::test]
    async fn protocol_errors_are_not_retried() {
        let terminal = ScriptedTerminal::always(|| Err(RedirectError::MissingLocation.into()));
        let mut ctx = ctx_with(3);

        let result = chain(RetryInterceptor::new()).execute(get(), &terminal, &mut ctx).await;

        assert!(matches!(result, Err(ClientError::Redirect { .. })));
        assert_eq!(terminal.calls(), 1);
        assert_eq!(ctx.get(&RETRIED_COUNT), Some(0));
    }

    #[tokio::test]
    async fn predicate_can_retry_responses() {
        let terminal = ScriptedTerminal::always(|| Ok(response(StatusCode::SERVICE_UNAVAILABLE)));
        let mut ctx = ctx_with(2);
        let retry_server_errors = |_: &Request, outcome: Result<&Response, &ClientError>| {
            matches!(outcome, Ok(response) if response.status().is_server_error())
        };
        let interceptor = RetryInterceptor::new().with_predicate(retry_server_errors);

        let response = chain(interceptor).execute(get(), &terminal, &mut ctx).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(terminal.calls(), 3);
        assert_eq!(ctx.get(&RETRIED_COUNT), Some(2));
    }

    #[tokio::test]
    async fn panicking_predicate_resolves_with_error() {
        let terminal = ScriptedTerminal::always(|| Ok(ok()));
        let mut ctx = ctx_with(2);
        let broken = |_: &Request, _: Result<&Response, &ClientError>| -> bool { panic!("predicate is broken") };
        let interceptor = RetryInterceptor::new().with_predicate(broken);

        let result = chain(interceptor).execute(get(), &terminal, &mut ctx).await;

        match result {
            Err(ClientError::Retry { source: RetryError::Predicate { reason } }) => {
                assert_eq!(reason, "predicate is broken")
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(terminal.calls(), 1);
    }

    #[tokio::test]
    async fn back_off_receives_attempt_numbers() {
        let mut back_off = MockBackOff::new();
        let mut seq = Sequence::new();
        for attempt in 1..=3 {
            back_off
                .expect_delay_for()
                .with(eq(attempt))
                .times(1)
                .in_sequence(&mut seq)
                .return_const(Duration::ZERO);
        }

        let terminal = ScriptedTerminal::always(|| Err(reset()));
        let mut ctx = ctx_with(3);
        let interceptor = RetryInterceptor::new().with_back_off(back_off);

        let result = chain(interceptor).execute(get(), &terminal, &mut ctx).await;

        assert!(matches!(result, Err(ClientError::Retry { .. })));
        assert_eq!(terminal.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn back_off_delays_each_attempt() {
        let waited = Arc::new(Mutex::new(Vec::new()));
        let recorder = waited.clone();
        let back_off = move |attempt: u32| {
            let delay = Duration::from_millis(100 * u64::from(attempt));
            recorder.lock().unwrap().push(delay);
            delay
        };

        let terminal = ScriptedTerminal::new().then(|| Err(reset())).then(|| Err(reset())).then(|| Ok(ok()));
        let mut ctx = ctx_with(2);
        let interceptor = RetryInterceptor::new().with_back_off(back_off);

        let started = tokio::time::Instant::now();
        let response = chain(interceptor).execute(get(), &terminal, &mut ctx).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*waited.lock().unwrap(), vec![Duration::from_millis(100), Duration::from_millis(200)]);
        assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
        assert_eq!(ctx.get(&RETRIED_COUNT), Some(2));
    }

    #[test]
    fn back_off_strategies() {
        assert_eq!(NoBackOff.delay_for(3), Duration::ZERO);
        assert_eq!(FixedBackOff::new(Duration::from_millis(50)).delay_for(7), Duration::from_millis(50));

        let exponential = ExponentialBackOff::new(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(exponential.delay_for(1), Duration::from_millis(100));
        assert_eq!(exponential.delay_for(2), Duration::from_millis(200));
        assert_eq!(exponential.delay_for(3), Duration::from_millis(400));
        assert_eq!(exponential.delay_for(5), Duration::from_secs(1));
        assert_eq!(exponential.delay_for(64), Duration::from_secs(1));
    }

    #[test]
    fn default_predicate() {
        let request = get();
        let predicate = DefaultRetryPredicate;
        assert!(predicate.should_retry(&request, Err(&reset())));
        assert!(predicate.should_retry(&request, Err(&ClientError::read_timeout(Duration::from_secs(1)))));
        assert!(!predicate.should_retry(&request, Err(&ClientError::stream_id_exhausted("conn-1"))));
        assert!(!predicate.should_retry(&request, Ok(&response(StatusCode::BAD_GATEWAY))));
    }
}
