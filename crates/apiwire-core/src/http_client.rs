//! Transport capability: request/response envelopes and implementations.
//!
//! [`HttpTransport`] is the seam between the call pipeline and the network.
//! [`ReqwestTransport`] talks to real servers; [`StubTransport`] serves
//! canned responses for tests and offline runs.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::endpoint::HttpMethod;
use crate::error::ApiError;
use crate::session::{CachePolicy, SessionConfig};

const CONNECTIVITY_PAUSE: Duration = Duration::from_millis(250);

/// Transport-level request composed from an endpoint and a base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Raw bytes and status returned by a transport for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// `None` when the underlying exchange produced no HTTP status at all.
    pub status: Option<u16>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: Some(status),
            body: body.into(),
        }
    }

    pub fn ok_json(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, body)
    }

    pub fn without_status(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: None,
            body: body.into(),
        }
    }

    /// The status code, if it is a valid HTTP status (100-599).
    pub fn status_code(&self) -> Option<u16> {
        self.status.filter(|code| (100..=599).contains(code))
    }
}

/// Failure raised by a transport before a response could be produced.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Already classified; reaches the caller unchanged.
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("request timeout: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

impl TransportError {
    /// Normalizes into the call pipeline's error taxonomy.
    pub fn into_api_error(self) -> ApiError {
        match self {
            Self::Api(error) => error,
            Self::Timeout(_) | Self::Connect(_) | Self::Request(_) | Self::Body(_) => {
                ApiError::UnexpectedResponse
            }
        }
    }
}

pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<RawResponse, TransportError>> + Send + 'a>>;

/// "Send a request, receive raw bytes and a status."
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// call in flight.
pub trait HttpTransport: Send + Sync {
    fn execute<'a>(&'a self, request: HttpRequest) -> TransportFuture<'a>;
}

/// Production transport over `reqwest`.
///
/// Honors [`SessionConfig`]: timeouts, per-host connection limits,
/// connectivity waiting, and cache bypass. One semaphore is kept per
/// destination host for the transport's lifetime.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Arc<reqwest::Client>,
    config: SessionConfig,
    host_slots: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
}

impl ReqwestTransport {
    pub fn new(config: SessionConfig) -> Result<Self, TransportError> {
        let client = client_builder(&config)
            .build()
            .map_err(|e| TransportError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(client, config))
    }

    /// Transport for test harnesses; see [`SessionConfig::mocked_responses_only`].
    pub fn mocked_responses_only() -> Result<Self, TransportError> {
        Self::new(SessionConfig::mocked_responses_only())
    }

    /// Wraps a preconfigured client. Timeouts set on `client` take precedence
    /// over the ones in `config`.
    pub fn with_client(client: reqwest::Client, config: SessionConfig) -> Self {
        Self {
            client: Arc::new(client),
            config,
            host_slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn host_slot(&self, url: &Url) -> Arc<Semaphore> {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let key = match url.port_or_known_default() {
            Some(port) => format!("{host}:{port}"),
            None => host,
        };

        let mut slots = self
            .host_slots
            .lock()
            .expect("host slot table is not poisoned");
        slots
            .entry(key)
            .or_insert_with(|| Arc::new(Semaphore::new(self.config.max_connections_per_host.max(1))))
            .clone()
    }

    fn build(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        };

        let mut builder = self.client.request(method, request.url.clone());

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if self.config.cache_policy == CachePolicy::ReloadIgnoringCache
            && !request.headers.contains_key("cache-control")
        {
            builder = builder.header(reqwest::header::CACHE_CONTROL, "no-cache");
        }

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        builder
    }

    async fn send(&self, request: &HttpRequest) -> Result<reqwest::Response, TransportError> {
        let deadline = Instant::now() + self.config.resource_timeout;

        loop {
            match self.build(request).send().await {
                Ok(response) => return Ok(response),
                Err(error)
                    if error.is_connect()
                        && self.config.waits_for_connectivity
                        && Instant::now() + CONNECTIVITY_PAUSE < deadline =>
                {
                    tracing::debug!(
                        url = %request.url,
                        error = %error,
                        "destination unreachable; waiting for connectivity"
                    );
                    tokio::time::sleep(CONNECTIVITY_PAUSE).await;
                }
                Err(error) => return Err(classify(error)),
            }
        }
    }
}

impl HttpTransport for ReqwestTransport {
    fn execute<'a>(&'a self, request: HttpRequest) -> TransportFuture<'a> {
        Box::pin(async move {
            let _permit = self
                .host_slot(&request.url)
                .acquire_owned()
                .await
                .map_err(|e| TransportError::Request(format!("connection slot closed: {e}")))?;

            let response = self.send(&request).await?;
            let status = response.status().as_u16();
            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::Body(e.to_string()))?;

            Ok(RawResponse::new(status, body.to_vec()))
        })
    }
}

fn client_builder(config: &SessionConfig) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .connect_timeout(config.request_timeout)
        .read_timeout(config.request_timeout)
        .timeout(config.resource_timeout)
        .pool_max_idle_per_host(config.max_connections_per_host)
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Request(error.to_string())
    }
}

type StubHandler = Arc<dyn Fn(&HttpRequest) -> Result<RawResponse, TransportError> + Send + Sync>;

struct StubRoute {
    method: HttpMethod,
    path: String,
    handler: StubHandler,
}

/// In-memory transport serving canned responses.
///
/// Routes match on method and URL path suffix, so `"users/42"` serves
/// `https://any.host/v1/users/42`. Unmatched requests fail with
/// [`TransportError::Request`]. Every request is recorded.
#[derive(Default)]
pub struct StubTransport {
    routes: Vec<StubRoute>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl std::fmt::Debug for StubTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubTransport")
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, method: HttpMethod, path: &str, response: RawResponse) -> Self {
        self.with_handler(method, path, move |_| Ok(response.clone()))
    }

    pub fn with_handler<F>(mut self, method: HttpMethod, path: &str, handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<RawResponse, TransportError> + Send + Sync + 'static,
    {
        self.routes.push(StubRoute {
            method,
            path: path.trim_matches('/').to_owned(),
            handler: Arc::new(handler),
        });
        self
    }

    pub fn recorded_requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .clone()
    }

    fn route(&self, request: &HttpRequest) -> Option<&StubRoute> {
        let path = request.url.path().trim_end_matches('/');
        self.routes.iter().find(|route| {
            route.method == request.method
                && (path.trim_start_matches('/') == route.path
                    || path.ends_with(&format!("/{}", route.path)))
        })
    }
}

impl HttpTransport for StubTransport {
    fn execute<'a>(&'a self, request: HttpRequest) -> TransportFuture<'a> {
        let outcome = match self.route(&request) {
            Some(route) => (route.handler)(&request),
            None => Err(TransportError::Request(format!(
                "no stub registered for {} {}",
                request.method,
                request.url.path()
            ))),
        };

        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .push(request);

        Box::pin(async move { outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("valid url")
    }

    fn local_transport(config: SessionConfig) -> ReqwestTransport {
        let client = client_builder(&config)
            .no_proxy()
            .build()
            .expect("client builds");
        ReqwestTransport::with_client(client, config)
    }

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);
        port
    }

    /// Serves `{}` after `delay`, recording the peak number of requests in flight.
    async fn slow_server(delay: Duration) -> (u16, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&peak);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut chunk = [0_u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(read) => request.extend_from_slice(&chunk[..read]),
                        }
                    }

                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(delay).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);

                    let _ = socket
                        .write_all(
                            b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}",
                        )
                        .await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (port, observed)
    }

    #[test]
    fn status_code_rejects_values_outside_http_range() {
        assert_eq!(RawResponse::new(204, Vec::new()).status_code(), Some(204));
        assert_eq!(RawResponse::new(42, Vec::new()).status_code(), None);
        assert_eq!(RawResponse::new(1000, Vec::new()).status_code(), None);
        assert_eq!(RawResponse::without_status("x").status_code(), None);
    }

    #[test]
    fn transport_errors_normalize_to_unexpected_response() {
        assert!(matches!(
            TransportError::Timeout(String::from("slow")).into_api_error(),
            ApiError::UnexpectedResponse
        ));
        assert!(matches!(
            TransportError::Connect(String::from("refused")).into_api_error(),
            ApiError::UnexpectedResponse
        ));
        assert!(matches!(
            TransportError::Api(ApiError::HttpCode(503)).into_api_error(),
            ApiError::HttpCode(503)
        ));
    }

    #[tokio::test]
    async fn stub_matches_by_method_and_path_suffix() {
        let transport = StubTransport::new()
            .with_response(HttpMethod::Get, "users/42", RawResponse::ok_json(r#"{"id":42}"#))
            .with_response(HttpMethod::Delete, "users/42", RawResponse::new(204, Vec::new()));

        let response = transport
            .execute(HttpRequest::get(url("https://api.example.com/v1/users/42")))
            .await
            .expect("route is registered");
        assert_eq!(response.status, Some(200));

        let deleted = transport
            .execute(HttpRequest::new(
                HttpMethod::Delete,
                url("https://api.example.com/users/42"),
            ))
            .await
            .expect("route is registered");
        assert_eq!(deleted.status, Some(204));

        let error = transport
            .execute(HttpRequest::get(url("https://api.example.com/users/420")))
            .await
            .expect_err("suffix must match a whole segment");
        assert!(matches!(error, TransportError::Request(_)));

        assert_eq!(transport.recorded_requests().len(), 3);
    }

    #[test]
    fn host_slots_are_shared_per_destination() {
        let transport = ReqwestTransport::with_client(
            reqwest::Client::new(),
            SessionConfig::default().with_max_connections_per_host(2),
        );

        let a = transport.host_slot(&url("https://api.example.com/a"));
        let b = transport.host_slot(&url("https://API.example.com:443/b"));
        let other = transport.host_slot(&url("https://cdn.example.com/a"));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(a.available_permits(), 2);
    }

    #[test]
    fn cache_bypass_adds_no_cache_header() {
        let transport = ReqwestTransport::with_client(reqwest::Client::new(), SessionConfig::default());
        let built = transport
            .build(&HttpRequest::get(url("https://api.example.com/users")))
            .build()
            .expect("valid request");
        assert_eq!(
            built
                .headers()
                .get(reqwest::header::CACHE_CONTROL)
                .and_then(|value| value.to_str().ok()),
            Some("no-cache")
        );

        let transport = ReqwestTransport::with_client(
            reqwest::Client::new(),
            SessionConfig::default().with_cache_policy(CachePolicy::UseProtocolCachePolicy),
        );
        let built = transport
            .build(&HttpRequest::get(url("https://api.example.com/users")))
            .build()
            .expect("valid request");
        assert!(built.headers().get(reqwest::header::CACHE_CONTROL).is_none());
    }

    #[tokio::test]
    async fn unreachable_host_is_retried_until_resource_deadline() {
        let port = closed_port().await;
        let transport = local_transport(
            SessionConfig::default()
                .with_waits_for_connectivity(true)
                .with_resource_timeout(Duration::from_secs(1)),
        );

        let started = Instant::now();
        let error = transport
            .execute(HttpRequest::get(url(&format!("http://127.0.0.1:{port}/users"))))
            .await
            .expect_err("nothing listens on the port");

        assert!(matches!(error, TransportError::Connect(_)), "got {error:?}");
        let elapsed = started.elapsed();
        assert!(elapsed >= CONNECTIVITY_PAUSE * 2, "gave up after {elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "overran deadline: {elapsed:?}");
    }

    #[tokio::test]
    async fn mocked_session_fails_fast_on_unreachable_host() {
        let port = closed_port().await;
        let transport = local_transport(SessionConfig::mocked_responses_only());

        let started = Instant::now();
        let error = transport
            .execute(HttpRequest::get(url(&format!("http://127.0.0.1:{port}/users"))))
            .await
            .expect_err("nothing listens on the port");

        assert!(matches!(error, TransportError::Connect(_)), "got {error:?}");
        assert!(started.elapsed() < CONNECTIVITY_PAUSE);
        assert!(matches!(error.into_api_error(), ApiError::UnexpectedResponse));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn requests_per_host_are_bounded_by_connection_limit() {
        let (port, peak) = slow_server(Duration::from_millis(100)).await;
        let transport = local_transport(
            SessionConfig::mocked_responses_only().with_max_connections_per_host(2),
        );

        let handles: Vec<_> = (0..8)
            .map(|index| {
                let transport = transport.clone();
                let target = url(&format!("http://127.0.0.1:{port}/items/{index}"));
                tokio::spawn(async move { transport.execute(HttpRequest::get(target)).await })
            })
            .collect();

        for handle in handles {
            let response = handle
                .await
                .expect("task completes")
                .expect("server answers");
            assert_eq!(response.status_code(), Some(200));
            assert_eq!(response.body, b"{}");
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }
}
