//! Request lifecycle - one HTTP call and its state machine
//!
//! ```text
//! Created --prepare()--> Preparing --start()--> Active --success--> Finished
//!                                                  \--failure/timeout--> Failed
//! Created/Preparing --cancel()--> Cancelled
//! ```
//!
//! Every outcome, including preparation errors, is delivered through the
//! observer and the returned [`RequestOutcome`]; nothing escapes as a panic
//! or an early return.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lrsync_core::{classify_status, AuthorizationProvider};
use lrsync_domain::constants::{CONTENT_TYPE_JSON, HEADER_CONTENT_TYPE, HEADER_VERSION};
use lrsync_domain::{
    ClientConfig, HttpMethod, LrsError, RequestError, RequestErrorKind, RequestHeaders,
    RequestState, ResourceRequest,
};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use url::Url;

use super::observer::{RequestEvent, RequestObserver};
use super::response::ApiResponse;
use crate::errors::request_error_from_http;
use crate::http::HttpClient;

/// Settings shared by every request a client issues.
#[derive(Clone)]
pub struct RequestContext {
    http: HttpClient,
    base_url: Url,
    authorization: Arc<dyn AuthorizationProvider>,
    timeout: Duration,
    server_errors_are_failures: bool,
    nice_error_messages: bool,
    api_version: String,
}

impl RequestContext {
    pub fn new(
        config: &ClientConfig,
        http: HttpClient,
        authorization: Arc<dyn AuthorizationProvider>,
    ) -> Result<Self, LrsError> {
        Ok(Self {
            http,
            base_url: config.base_url()?,
            authorization,
            timeout: config.request_timeout(),
            server_errors_are_failures: config.server_errors_are_failures,
            nice_error_messages: config.nice_error_messages,
            api_version: config.api_version.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// New request in the Created state for `path` relative to the base URL.
    pub fn request(&self, method: HttpMethod, path: impl Into<String>) -> LrsRequest {
        LrsRequest {
            context: self.clone(),
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: Mutex::new(RequestHeaders::new()),
            state: Mutex::new(RequestState::Created),
            synchronous: false,
            tag: AtomicI64::new(0),
            timed_out: AtomicBool::new(false),
            started_at: Mutex::new(None),
            finished_at: Mutex::new(None),
            observer: None,
        }
    }

    /// New request executing a resource descriptor.
    pub fn resource(&self, resource: ResourceRequest) -> LrsRequest {
        let mut request = self.request(resource.method, resource.path).with_query(resource.query);
        request.body = resource.body;
        *request.headers.get_mut() = resource.headers;
        request
    }
}

/// How a request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    Finished(ApiResponse),
    Failed(RequestError),
    /// Cancelled before going active, or abandoned by the observer.
    Cancelled,
}

impl RequestOutcome {
    pub fn into_result(self) -> Result<ApiResponse, RequestError> {
        match self {
            Self::Finished(response) => Ok(response),
            Self::Failed(error) => Err(error),
            Self::Cancelled => Err(RequestError::invalid_argument("request was cancelled")),
        }
    }
}

/// Completion handle returned by [`LrsRequest::start`].
#[derive(Debug)]
pub enum RequestHandle {
    /// Synchronous requests complete before `start` returns.
    Ready(RequestOutcome),
    Spawned(JoinHandle<RequestOutcome>),
}

impl RequestHandle {
    pub async fn wait(self) -> RequestOutcome {
        match self {
            Self::Ready(outcome) => outcome,
            Self::Spawned(handle) => match handle.await {
                Ok(outcome) => outcome,
                Err(err) => RequestOutcome::Failed(RequestError::transport(format!(
                    "request task ended abnormally: {err}"
                ))),
            },
        }
    }
}

/// A single HTTP request with an explicit lifecycle.
pub struct LrsRequest {
    context: RequestContext,
    method: HttpMethod,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    headers: Mutex<RequestHeaders>,
    state: Mutex<RequestState>,
    synchronous: bool,
    tag: AtomicI64,
    timed_out: AtomicBool,
    started_at: Mutex<Option<Instant>>,
    finished_at: Mutex<Option<Instant>>,
    observer: Option<Arc<dyn RequestObserver>>,
}

impl LrsRequest {
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query.extend(query);
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(self, name: &str, value: impl Into<String>) -> Self {
        self.headers.lock().set(name, value);
        self
    }

    /// Run inline when started, without a `Started` event.
    pub fn synchronous(mut self, synchronous: bool) -> Self {
        self.synchronous = synchronous;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RequestObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_tag(self, tag: i64) -> Self {
        self.set_tag(tag);
        self
    }

    pub fn tag(&self) -> i64 {
        self.tag.load(Ordering::Relaxed)
    }

    pub fn set_tag(&self, tag: i64) {
        self.tag.store(tag, Ordering::Relaxed);
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> RequestState {
        *self.state.lock()
    }

    pub fn is_active(&self) -> bool {
        self.state() == RequestState::Active
    }

    pub fn is_synchronous(&self) -> bool {
        self.synchronous
    }

    pub fn did_time_out(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst)
    }

    pub fn headers(&self) -> RequestHeaders {
        self.headers.lock().clone()
    }

    /// Time spent active, up to completion or now. `None` before start.
    pub fn elapsed(&self) -> Option<Duration> {
        let started = (*self.started_at.lock())?;
        let end = (*self.finished_at.lock()).unwrap_or_else(Instant::now);
        Some(end.saturating_duration_since(started))
    }

    /// Absolute URL including the query string.
    pub fn url(&self) -> Result<Url, RequestError> {
        let mut url = self.context.base_url.join(&self.path).map_err(|err| {
            RequestError::invalid_argument(format!("invalid request path '{}': {err}", self.path))
        })?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }
        Ok(url)
    }

    /// Move to Preparing and decorate the headers.
    ///
    /// Calling it again while Preparing redoes the decoration; headers are
    /// replaced, never duplicated.
    pub fn prepare(&self) -> Result<(), RequestError> {
        {
            let mut state = self.state.lock();
            match *state {
                RequestState::Created => *state = RequestState::Preparing,
                RequestState::Preparing => {}
                other => {
                    return Err(RequestError::invalid_argument(format!(
                        "cannot prepare a request that is {other}"
                    )))
                }
            }
        }

        self.url()?;

        let mut headers = self.headers.lock();
        headers.set(HEADER_VERSION, self.context.api_version.as_str());
        if self.body.is_some() && !headers.contains(HEADER_CONTENT_TYPE) {
            headers.set(HEADER_CONTENT_TYPE, CONTENT_TYPE_JSON);
        }
        self.context.authorization.decorate(&mut headers);
        Ok(())
    }

    /// Cancel a request that has not gone active. Returns whether the
    /// request is now cancelled; active and finished requests are left
    /// alone.
    pub fn cancel(&self) -> bool {
        let cancelled = self.transition(RequestState::Cancelled);
        if cancelled {
            debug!(method = %self.method, path = %self.path, "Request cancelled");
        }
        cancelled
    }

    /// Start the request.
    ///
    /// Synchronous requests run to completion before this returns.
    /// Asynchronous ones are spawned and report through the observer.
    pub async fn start(self: &Arc<Self>) -> RequestHandle {
        if self.synchronous {
            RequestHandle::Ready(Arc::clone(self).run().await)
        } else {
            RequestHandle::Spawned(tokio::spawn(Arc::clone(self).run()))
        }
    }

    /// Drive the request through its lifecycle on the current task.
    #[instrument(skip(self), fields(method = %self.method, path = %self.path))]
    pub async fn run(self: Arc<Self>) -> RequestOutcome {
        match self.state() {
            RequestState::Created | RequestState::Preparing => {}
            RequestState::Cancelled => return RequestOutcome::Cancelled,
            other => {
                warn!(state = %other, "Request started twice");
                return RequestOutcome::Failed(RequestError::invalid_argument(format!(
                    "request already {other}"
                )));
            }
        }

        if let Err(error) = self.prepare() {
            if self.state() == RequestState::Cancelled {
                return RequestOutcome::Cancelled;
            }
            return self.complete(Err(error));
        }

        if let Some(observer) = &self.observer {
            if !observer.should_start(&self) {
                debug!("Request abandoned before start");
                self.transition(RequestState::Cancelled);
                return RequestOutcome::Cancelled;
            }
        }

        if !self.transition(RequestState::Active) {
            return RequestOutcome::Cancelled;
        }
        *self.started_at.lock() = Some(Instant::now());
        if !self.synchronous {
            self.emit(RequestEvent::Started);
        }

        let result = match tokio::time::timeout(self.context.timeout, self.send()).await {
            Ok(result) => result,
            Err(_) => {
                self.timed_out.store(true, Ordering::SeqCst);
                Err(RequestError::timed_out(format!(
                    "no response within {}s",
                    self.context.timeout.as_secs_f64()
                )))
            }
        };
        self.complete(result)
    }

    async fn send(&self) -> Result<ApiResponse, RequestError> {
        let url = self.url()?;
        let headers = self.headers();

        let mut builder = self.context.http.request(self.method, url);
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = &self.body {
            builder = builder.body(body.clone());
        }

        let response = self.context.http.send(builder).await?;
        let status = response.status().as_u16();
        let etag = header_value(response.headers(), reqwest::header::ETAG);
        let content_type = header_value(response.headers(), reqwest::header::CONTENT_TYPE);
        let body = response.bytes().await.map_err(|err| request_error_from_http(&err))?.to_vec();

        let response = ApiResponse { status, etag, content_type, body };
        match classify_status(
            status,
            &response.text(),
            self.context.server_errors_are_failures,
            self.context.nice_error_messages,
        ) {
            Some(error) => Err(error),
            None => Ok(response),
        }
    }

    /// Record the terminal state and emit its single event.
    fn complete(&self, result: Result<ApiResponse, RequestError>) -> RequestOutcome {
        let target =
            if result.is_ok() { RequestState::Finished } else { RequestState::Failed };
        if !self.transition(target) {
            debug!(state = %self.state(), "Ignoring late completion");
            return RequestOutcome::Cancelled;
        }
        *self.finished_at.lock() = Some(Instant::now());

        match result {
            Ok(response) => {
                debug!(status = response.status, "Request finished");
                self.emit(RequestEvent::Finished(&response));
                RequestOutcome::Finished(response)
            }
            Err(error) => {
                match error.kind {
                    RequestErrorKind::TimedOut | RequestErrorKind::TransportUnavailable => {
                        debug!(error = %error, "Request failed")
                    }
                    _ => warn!(error = %error, status = ?error.status, "Request failed"),
                }
                self.emit(RequestEvent::Failed(&error));
                RequestOutcome::Failed(error)
            }
        }
    }

    fn transition(&self, next: RequestState) -> bool {
        let mut state = self.state.lock();
        if state.can_transition_to(next) {
            *state = next;
            true
        } else {
            false
        }
    }

    fn emit(&self, event: RequestEvent<'_>) {
        if let Some(observer) = &self.observer {
            observer.on_request_event(self, event);
        }
    }
}

fn header_value(
    headers: &reqwest::header::HeaderMap,
    name: reqwest::header::HeaderName,
) -> Option<String> {
    headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_string)
}

impl std::fmt::Debug for LrsRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LrsRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("state", &self.state())
            .field("synchronous", &self.synchronous)
            .field("tag", &self.tag())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use lrsync_core::NoAuthorization;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::auth::BasicHttpAuthentication;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
        refuse: bool,
    }

    impl RequestObserver for Recorder {
        fn should_start(&self, _request: &LrsRequest) -> bool {
            !self.refuse
        }

        fn on_request_event(&self, _request: &LrsRequest, event: RequestEvent<'_>) {
            let name = match event {
                RequestEvent::Started => "started".to_string(),
                RequestEvent::Finished(response) => format!("finished:{}", response.status),
                RequestEvent::Failed(error) => format!("failed:{}", error.kind),
            };
            self.events.lock().push(name);
        }
    }

    fn context(server: &MockServer, config: impl FnOnce(ClientConfig) -> ClientConfig) -> RequestContext {
        let config = config(ClientConfig::new(format!("{}/xapi", server.uri())));
        RequestContext::new(&config, HttpClient::new().unwrap(), Arc::new(NoAuthorization)).unwrap()
    }

    #[tokio::test]
    async fn prepare_is_idempotent() {
        let server = MockServer::start().await;
        let config = ClientConfig::new(server.uri());
        let auth = Arc::new(BasicHttpAuthentication::new("user", "pass"));
        let context = RequestContext::new(&config, HttpClient::new().unwrap(), auth).unwrap();

        let request = context.request(HttpMethod::Post, "statements").with_body(b"[]".to_vec());
        request.prepare().unwrap();
        let first = request.headers();
        request.prepare().unwrap();

        assert_eq!(request.headers(), first);
        assert_eq!(first.len(), 3);
        assert_eq!(first.get("x-experience-api-version"), Some("1.0.0"));
        assert_eq!(request.state(), RequestState::Preparing);
    }

    #[tokio::test]
    async fn asynchronous_request_emits_started_then_finished() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/xapi/statements"))
            .and(header("X-Experience-API-Version", "1.0.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"statements":[]}"#))
            .expect(1)
            .mount(&server)
            .await;

        let recorder = Arc::new(Recorder::default());
        let request = Arc::new(
            context(&server, |c| c).request(HttpMethod::Get, "statements").with_observer(recorder.clone()),
        );

        let outcome = request.start().await.wait().await;
        assert!(matches!(outcome, RequestOutcome::Finished(ref r) if r.status == 200));
        assert_eq!(*recorder.events.lock(), vec!["started", "finished:200"]);
        assert_eq!(request.state(), RequestState::Finished);
        assert!(request.elapsed().is_some());
    }

    #[tokio::test]
    async fn synchronous_request_has_no_started_event() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(204)).mount(&server).await;

        let recorder = Arc::new(Recorder::default());
        let request = Arc::new(
            context(&server, |c| c)
                .request(HttpMethod::Get, "statements")
                .synchronous(true)
                .with_observer(recorder.clone()),
        );

        let handle = request.start().await;
        assert!(matches!(handle, RequestHandle::Ready(_)));
        assert_eq!(*recorder.events.lock(), vec!["finished:204"]);
    }

    #[tokio::test]
    async fn cancelled_request_emits_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let recorder = Arc::new(Recorder::default());
        let request = Arc::new(
            context(&server, |c| c).request(HttpMethod::Get, "statements").with_observer(recorder.clone()),
        );
        request.prepare().unwrap();
        assert!(request.cancel());

        let outcome = request.start().await.wait().await;
        assert_eq!(outcome, RequestOutcome::Cancelled);
        assert!(recorder.events.lock().is_empty());
        assert_eq!(request.state(), RequestState::Cancelled);
    }

    #[tokio::test]
    async fn observer_can_abandon_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let recorder = Arc::new(Recorder { refuse: true, ..Recorder::default() });
        let request = Arc::new(
            context(&server, |c| c).request(HttpMethod::Get, "statements").with_observer(recorder.clone()),
        );

        assert_eq!(request.clone().run().await, RequestOutcome::Cancelled);
        assert!(recorder.events.lock().is_empty());
    }

    #[tokio::test]
    async fn finished_request_cannot_be_cancelled() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

        let request = Arc::new(context(&server, |c| c).request(HttpMethod::Get, "statements"));
        request.clone().run().await;
        assert!(!request.cancel());
        assert_eq!(request.state(), RequestState::Finished);
    }

    #[tokio::test]
    async fn timeout_fails_once_as_timed_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let recorder = Arc::new(Recorder::default());
        let request = Arc::new(
            context(&server, |c| c.with_request_timeout(1))
                .request(HttpMethod::Get, "statements")
                .synchronous(true)
                .with_observer(recorder.clone()),
        );

        let outcome = request.clone().run().await;
        match outcome {
            RequestOutcome::Failed(err) => assert_eq!(err.kind, RequestErrorKind::TimedOut),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(request.did_time_out());
        assert_eq!(*recorder.events.lock(), vec!["failed:timed_out"]);
    }

    #[tokio::test]
    async fn error_statuses_follow_configuration() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(409).set_body_string("already exists"))
            .mount(&server)
            .await;

        let strict = Arc::new(context(&server, |c| c).request(HttpMethod::Put, "statements"));
        match strict.clone().run().await {
            RequestOutcome::Failed(err) => {
                assert_eq!(err.kind, RequestErrorKind::Conflict);
                assert_eq!(err.message, "already exists");
            }
            other => panic!("expected conflict, got {:?}", other),
        }

        let lenient = Arc::new(
            context(&server, |mut c| {
                c.server_errors_are_failures = false;
                c
            })
            .request(HttpMethod::Put, "statements"),
        );
        assert!(matches!(lenient.clone().run().await, RequestOutcome::Finished(ref r) if r.status == 409));
    }

    #[tokio::test]
    async fn preparation_errors_are_reported_as_failures() {
        let server = MockServer::start().await;
        let recorder = Arc::new(Recorder::default());
        let request = Arc::new(
            context(&server, |c| c)
                .request(HttpMethod::Get, "http://[::1")
                .with_observer(recorder.clone()),
        );

        let outcome = request.clone().run().await;
        assert!(matches!(outcome, RequestOutcome::Failed(ref e) if e.kind == RequestErrorKind::InvalidArgument));
        assert_eq!(*recorder.events.lock(), vec!["failed:invalid_argument"]);
        assert_eq!(request.state(), RequestState::Failed);
    }

    #[tokio::test]
    async fn tags_are_kept() {
        let server = MockServer::start().await;
        let request = context(&server, |c| c).request(HttpMethod::Get, "agents").with_tag(7);
        assert_eq!(request.tag(), 7);
        request.set_tag(8);
        assert_eq!(request.tag(), 8);
    }
}
