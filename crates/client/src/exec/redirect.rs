use async_trait::async_trait;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST, LOCATION, TRANSFER_ENCODING};
use http::{Method, StatusCode, Uri};
use tracing::debug;
use url::Url;

use crate::body::RequestBody;
use crate::context::names::{MAX_REDIRECTS, REDIRECTED_COUNT};
use crate::error::{ClientError, RedirectError};
use crate::exec::{ExecChain, Interceptor};
use crate::request::Request;
use crate::response::{Response, is_redirect_status};

/// Follows `Location` redirects up to the call's `MAX_REDIRECTS`.
///
/// Each hop derives a new request from the previous one:
///
/// | status        | method  | body    |
/// |---------------|---------|---------|
/// | 301, 302      | kept    | dropped |
/// | 303           | GET     | dropped |
/// | 307, 308      | GET     | kept    |
///
/// `Host`, `Content-Length`, `Transfer-Encoding` and `Content-Type` are always stripped from the
/// derived request and the derived request never retries.
#[derive(Debug, Default, Clone, Copy)]
pub struct RedirectInterceptor;

impl RedirectInterceptor {
    pub const ORDER: i32 = -3000;

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Interceptor for RedirectInterceptor {
    async fn proceed(&self, request: Request, next: &mut ExecChain<'_>) -> Result<Response, ClientError> {
        let max_redirects = next.ctx().get_or(&MAX_REDIRECTS, 0);
        if request.body().is_chunked() || max_redirects < 1 {
            next.ctx_mut().remove(&REDIRECTED_COUNT);
            debug!(max_redirects, chunked = request.body().is_chunked(), "redirect disabled, proceed directly");
            return next.proceed(request).await;
        }

        next.ctx_mut().remove(&REDIRECTED_COUNT);
        let mut request = request;
        loop {
            let response = next.proceed(request.clone()).await?;

            let redirected = next.ctx().get(&REDIRECTED_COUNT).map_or(0, |count| count + 1);
            next.ctx_mut().reset(&REDIRECTED_COUNT, redirected);

            if !should_redirect(&response) {
                return Ok(response);
            }

            if redirected >= max_redirects {
                debug!(redirected, max_redirects, "redirects exhausted");
                return Err(RedirectError::Exhausted { max_redirects }.into());
            }

            let location = location(&response)?;
            let target = detect_uri(&request, location)?;
            debug!(status = response.status().as_u16(), from = %request.uri(), to = %target, "follow redirect");
            request = new_request(&request, to_uri(target, location)?, response.status());
        }
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }
}

fn should_redirect(response: &Response) -> bool {
    response.headers().contains_key(LOCATION) && is_redirect_status(response.status())
}

fn switch_to_get(status: StatusCode) -> bool {
    matches!(status, StatusCode::SEE_OTHER | StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT)
}

fn clean_body(status: StatusCode) -> bool {
    matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER)
}

/// A path-only `Location` split into its parts.
#[derive(Debug, PartialEq, Eq)]
struct RelativeInfo<'a> {
    path: &'a str,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

impl<'a> RelativeInfo<'a> {
    /// The fragment is cut first, so a `?` inside the fragment stays part of it.
    fn parse(location: &'a str) -> Self {
        let (rest, fragment) = match location.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (location, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };
        Self { path, query, fragment }
    }
}

/// The non-empty `Location` header of `response`.
fn location(response: &Response) -> Result<&str, RedirectError> {
    let Some(value) = response.headers().get(LOCATION) else {
        return Err(RedirectError::MissingLocation);
    };
    let location = value
        .to_str()
        .map_err(|e| RedirectError::invalid_location_caused(String::from_utf8_lossy(value.as_bytes()), e))?;
    if location.is_empty() {
        return Err(RedirectError::MissingLocation);
    }
    Ok(location)
}

/// Resolves `location` against `request`. Only http and https targets are followed.
fn detect_uri(request: &Request, location: &str) -> Result<Url, RedirectError> {
    let url = if location.starts_with('/') {
        let origin = request.uri();
        let (Some(scheme), Some(authority)) = (origin.scheme_str(), origin.authority()) else {
            return Err(RedirectError::invalid_location(location));
        };

        let relative = RelativeInfo::parse(location);
        let mut url = Url::parse(&format!("{scheme}://{authority}"))
            .map_err(|e| RedirectError::invalid_location_caused(location, e))?;
        url.set_path(relative.path);
        url.set_query(relative.query);
        url.set_fragment(relative.fragment);
        url
    } else {
        Url::parse(location).map_err(|e| RedirectError::invalid_location_caused(location, e))?
    };

    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(RedirectError::invalid_location(location)),
    }
}

/// Converts a resolved target into a request URI; the fragment is never sent.
fn to_uri(mut url: Url, location: &str) -> Result<Uri, RedirectError> {
    url.set_fragment(None);
    url.as_str().parse::<Uri>().map_err(|e| RedirectError::invalid_location_caused(location, e))
}

fn new_request(original: &Request, uri: Uri, status: StatusCode) -> Request {
    let mut parts = original.clone().into_parts();

    parts.uri = uri;
    if switch_to_get(status) {
        parts.method = Method::GET;
    }
    if clean_body(status) {
        parts.body = RequestBody::Empty;
    }
    parts.options.max_retries = Some(0);

    for name in [HOST, CONTENT_LENGTH, TRANSFER_ENCODING, CONTENT_TYPE] {
        parts.headers.remove(name);
    }

    Request::from_parts(parts)
}
