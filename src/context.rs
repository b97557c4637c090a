//! The per-request carrier threaded through middleware and handlers.

use crate::params::Params;

use http::header::{self, HeaderName, HeaderValue};
use http::{Extensions, HeaderMap, Method, Request, Response, StatusCode, Uri, Version};
use serde::Serialize;
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Where a [`Context`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    /// Reset and waiting in a pool.
    #[default]
    Idle,
    /// Handed out for a new request.
    Acquired,
    /// The path is being resolved.
    Matching,
    /// A node was found and the method is being resolved.
    Dispatching,
    /// The middleware chain and handler are running.
    Running,
    /// The response is ready to be written.
    Complete,
}

/// A shared flag the connection task can flip to stop the chain early.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Marks the request as cancelled.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns `true` once [`cancel`](CancelToken::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The in-flight request and response, the matched path parameters, and a
/// typed map of values set by middleware for the layers below them.
///
/// A context serves one request at a time. Between requests it goes through
/// [`reset`](Context::reset), which clears every field but keeps allocated
/// buffers around for the next request.
#[derive(Debug, Default)]
pub struct Context {
    pub(crate) request: Request<Vec<u8>>,
    pub(crate) response: Response<Vec<u8>>,
    pub(crate) params: Params,
    pub(crate) route: Option<Arc<str>>,
    pub(crate) stage: Stage,
    values: Extensions,
    cancel: Option<CancelToken>,
    deadline: Option<Instant>,
}

impl Context {
    /// Creates an idle context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context already holding `request`.
    pub fn with_request(request: Request<Vec<u8>>) -> Self {
        let mut ctx = Self::new();
        ctx.load(request);
        ctx
    }

    /// Installs the request to be processed.
    ///
    /// A context that already carried a request is reset first.
    pub fn load(&mut self, request: Request<Vec<u8>>) {
        if self.stage != Stage::Idle {
            debug!("context reloaded at {:?}, resetting", self.stage);
            self.reset();
        }
        self.request = request;
        self.stage = Stage::Acquired;
    }

    /// Returns the current lifecycle stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn request(&self) -> &Request<Vec<u8>> {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request<Vec<u8>> {
        &mut self.request
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    /// The path component of the request URI.
    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    /// The raw query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.request.uri().query()
    }

    /// Returns the first decoded value for `key` in the query string.
    pub fn query_value(&self, key: &str) -> Option<Cow<'_, str>> {
        let query = self.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// Returns a request header as a string, if present and valid UTF-8.
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    /// Looks up a cookie sent with the request.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.request
            .headers()
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// The raw request body.
    pub fn body(&self) -> &[u8] {
        self.request.body()
    }

    /// The path parameters captured by the matched route.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Shorthand for `self.params().get(name)`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// The pattern of the route that matched, e.g. `/users/{id}`.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    /// Stores a value for inner middleware and the handler. The value's type
    /// is its key; storing a second value of the same type replaces the first.
    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.values.insert(value)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values.get::<T>()
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.values.get_mut::<T>()
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.values.remove::<T>()
    }

    /// Returns `true` if no user values are stored.
    pub fn values_is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn response(&self) -> &Response<Vec<u8>> {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response<Vec<u8>> {
        &mut self.response
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn set_status(&mut self, status: StatusCode) {
        *self.response.status_mut() = status;
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response.headers_mut().insert(name, value);
    }

    /// Appends bytes to the response body.
    pub fn write(&mut self, bytes: &[u8]) {
        self.response.body_mut().extend_from_slice(bytes);
    }

    /// Replaces the response with a plain-text body.
    pub fn text(&mut self, status: StatusCode, body: &str) {
        self.clear_response();
        self.set_status(status);
        self.set_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.write(body.as_bytes());
    }

    /// Replaces the response with `value` serialized as JSON.
    pub fn json<T: Serialize + ?Sized>(
        &mut self,
        status: StatusCode,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        self.clear_response();
        serde_json::to_writer(self.response.body_mut(), value)?;
        self.set_status(status);
        self.set_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(())
    }

    /// Replaces the response with a redirect to `location`.
    pub fn redirect(&mut self, status: StatusCode, location: &str) {
        self.clear_response();
        self.set_status(status);
        match HeaderValue::from_str(location) {
            Ok(value) => self.set_header(header::LOCATION, value),
            Err(_) => warn!("dropping invalid redirect location '{}'", location),
        }
    }

    /// Resets status, headers and body of the response.
    pub fn clear_response(&mut self) {
        *self.response.status_mut() = StatusCode::OK;
        self.response.headers_mut().clear();
        self.response.body_mut().clear();
    }

    /// Moves the response out, leaving an empty one behind.
    pub fn take_response(&mut self) -> Response<Vec<u8>> {
        std::mem::take(&mut self.response)
    }

    /// Returns the token used to cancel this request. Tokens handed out for
    /// a previous request have no effect after a reset.
    pub fn cancel_token(&mut self) -> CancelToken {
        self.cancel.get_or_insert_with(CancelToken::default).clone()
    }

    pub fn set_deadline(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` if the request was cancelled or its deadline passed.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Clears the request, response, params and user values so the context
    /// can serve another request.
    pub fn reset(&mut self) {
        *self.request.method_mut() = Method::GET;
        *self.request.uri_mut() = Uri::default();
        *self.request.version_mut() = Version::default();
        self.request.headers_mut().clear();
        self.request.extensions_mut().clear();
        self.request.body_mut().clear();

        self.clear_response();
        *self.response.version_mut() = Version::default();
        self.response.extensions_mut().clear();

        self.params.clear();
        self.values.clear();
        self.route = None;
        self.cancel = None;
        self.deadline = None;
        self.stage = Stage::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq)]
    struct UserId(u64);

    fn request(uri: &str) -> Request<Vec<u8>> {
        Request::builder()
            .uri(uri)
            .header(header::COOKIE, "session=abc123; theme=dark")
            .body(b"payload".to_vec())
            .unwrap()
    }

    #[test]
    fn exposes_request_data() {
        let ctx = Context::with_request(request("/search?q=rust+router&page=2"));

        assert_eq!(ctx.path(), "/search");
        assert_eq!(ctx.query(), Some("q=rust+router&page=2"));
        assert_eq!(ctx.query_value("q").as_deref(), Some("rust router"));
        assert_eq!(ctx.query_value("missing"), None);
        assert_eq!(ctx.cookie("theme"), Some("dark"));
        assert_eq!(ctx.cookie("session"), Some("abc123"));
        assert_eq!(ctx.cookie("other"), None);
        assert_eq!(ctx.body(), b"payload");
    }

    #[test]
    fn reset_clears_everything() {
        let mut ctx = Context::with_request(request("/a?b=c"));
        ctx.params.push("id".into(), "7");
        ctx.insert(UserId(1));
        ctx.text(StatusCode::CREATED, "made");
        ctx.set_deadline(Instant::now() + Duration::from_secs(60));

        ctx.reset();

        assert_eq!(ctx.stage(), Stage::Idle);
        assert_eq!(ctx.path(), "/");
        assert!(ctx.headers().is_empty());
        assert!(ctx.body().is_empty());
        assert!(ctx.params().is_empty());
        assert!(ctx.values_is_empty());
        assert_eq!(ctx.get::<UserId>(), None);
        assert_eq!(ctx.status(), StatusCode::OK);
        assert!(ctx.response().body().is_empty());
        assert_eq!(ctx.deadline(), None);
    }

    #[test]
    fn reload_resets_a_used_context() {
        let mut ctx = Context::with_request(request("/first"));
        ctx.params.push("id".into(), "7");
        ctx.insert(UserId(7));
        ctx.text(StatusCode::CREATED, "made");
        ctx.stage = Stage::Complete;

        ctx.load(request("/second"));

        assert_eq!(ctx.stage(), Stage::Acquired);
        assert_eq!(ctx.path(), "/second");
        assert_eq!(ctx.get::<UserId>(), None);
        assert!(ctx.params().is_empty());
        assert_eq!(ctx.status(), StatusCode::OK);
        assert!(ctx.response().body().is_empty());
    }

    #[test]
    fn stale_cancel_token_does_not_leak() {
        let mut ctx = Context::with_request(request("/"));
        let token = ctx.cancel_token();
        token.cancel();
        assert!(ctx.is_cancelled());

        ctx.reset();
        ctx.load(request("/"));
        token.cancel();
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn expired_deadline_cancels() {
        let mut ctx = Context::with_request(request("/"));
        ctx.set_deadline(Instant::now());
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn json_response() {
        let mut ctx = Context::new();
        ctx.json(StatusCode::OK, &serde_json::json!({ "ok": true }))
            .unwrap();
        assert_eq!(ctx.response().body(), br#"{"ok":true}"#);
        assert_eq!(
            ctx.response().headers()[header::CONTENT_TYPE],
            "application/json"
        );
    }
}
