//! Call executor: endpoint in, typed value or classified error out.
//!
//! # Pipeline
//!
//! | Step | Failure |
//! |------|---------|
//! | Compose request from endpoint + base URL | [`ApiError::InvalidUrl`] (or the endpoint's own error) |
//! | Send through the transport | [`ApiError::UnexpectedResponse`] unless already classified |
//! | Read status code | [`ApiError::UnexpectedResponse`] |
//! | Check status against the success policy | [`ApiError::HttpCode`] |
//! | Decode body into `T` | [`ApiError::Decoding`] |
//!
//! The status check runs before decoding, so an error body is never parsed
//! as the success type.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use apiwire_core::{BaseUrl, EndpointDescriptor, ReqwestTransport, SessionConfig, WebRepository};
//!
//! #[derive(serde::Deserialize)]
//! struct User { id: i64, name: String }
//!
//! let transport = Arc::new(ReqwestTransport::new(SessionConfig::default())?);
//! let users = WebRepository::new(BaseUrl::parse("https://api.example.com")?, transport);
//!
//! let user: User = users.call(&EndpointDescriptor::get("users/42")).await?;
//! ```

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::decode::{Decoder, JsonDecoder};
use crate::endpoint::{BaseUrl, Endpoint};
use crate::error::{ApiError, ApiResult};
use crate::http_client::HttpTransport;
use crate::success_policy::SuccessPolicy;

/// Executes [`Endpoint`]s against one base URL.
///
/// Holds no per-call state and is safe to share across tasks; clones share
/// the same transport.
#[derive(Clone)]
pub struct WebRepository<D = JsonDecoder> {
    base_url: BaseUrl,
    transport: Arc<dyn HttpTransport>,
    decoder: D,
    success_policy: SuccessPolicy,
}

impl<D> std::fmt::Debug for WebRepository<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebRepository")
            .field("base_url", &self.base_url)
            .field("success_policy", &self.success_policy)
            .finish_non_exhaustive()
    }
}

impl WebRepository<JsonDecoder> {
    pub fn new(base_url: BaseUrl, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            base_url,
            transport,
            decoder: JsonDecoder::default(),
            success_policy: SuccessPolicy::default(),
        }
    }
}

impl<D: Decoder> WebRepository<D> {
    pub fn with_decoder<E: Decoder>(self, decoder: E) -> WebRepository<E> {
        WebRepository {
            base_url: self.base_url,
            transport: self.transport,
            decoder,
            success_policy: self.success_policy,
        }
    }

    /// Policy used by [`call`](Self::call) and [`call_as_result`](Self::call_as_result).
    pub fn with_success_policy(mut self, success_policy: SuccessPolicy) -> Self {
        self.success_policy = success_policy;
        self
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    pub fn success_policy(&self) -> &SuccessPolicy {
        &self.success_policy
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Calls `endpoint` and decodes the body into `T`, for use with `?`.
    pub async fn call<T, E>(&self, endpoint: &E) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        E: Endpoint + ?Sized,
    {
        self.execute(endpoint, &self.success_policy).await
    }

    /// [`call`](Self::call) with an explicit success policy.
    pub async fn call_expecting<T, E>(
        &self,
        endpoint: &E,
        success_policy: &SuccessPolicy,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        E: Endpoint + ?Sized,
    {
        self.execute(endpoint, success_policy).await
    }

    /// Calls `endpoint` and hands the outcome back as a value.
    ///
    /// Classification is identical to [`call`](Self::call); failures are
    /// additionally logged with their error code.
    pub async fn call_as_result<T, E>(&self, endpoint: &E) -> ApiResult<T>
    where
        T: DeserializeOwned,
        E: Endpoint + ?Sized,
    {
        self.call_as_result_expecting(endpoint, &self.success_policy)
            .await
    }

    /// [`call_as_result`](Self::call_as_result) with an explicit success policy.
    pub async fn call_as_result_expecting<T, E>(
        &self,
        endpoint: &E,
        success_policy: &SuccessPolicy,
    ) -> ApiResult<T>
    where
        T: DeserializeOwned,
        E: Endpoint + ?Sized,
    {
        let outcome = self.execute(endpoint, success_policy).await;
        if let Err(error) = &outcome {
            tracing::warn!(
                code = error.code(),
                method = %endpoint.method(),
                path = endpoint.path(),
                "api call failed: {error}"
            );
        }
        outcome
    }

    async fn execute<T, E>(&self, endpoint: &E, success_policy: &SuccessPolicy) -> ApiResult<T>
    where
        T: DeserializeOwned,
        E: Endpoint + ?Sized,
    {
        let request = endpoint.request(&self.base_url)?;
        let method = request.method;
        let url = request.url.clone();

        let response = self.transport.execute(request).await.map_err(|error| {
            tracing::debug!(%method, %url, "transport failed: {error}");
            error.into_api_error()
        })?;

        let Some(status) = response.status_code() else {
            tracing::debug!(%method, %url, status = ?response.status, "response carried no usable status");
            return Err(ApiError::UnexpectedResponse);
        };

        tracing::debug!(%method, %url, status, bytes = response.body.len(), "response received");

        if !success_policy.contains(status) {
            return Err(ApiError::HttpCode(status));
        }

        self.decoder
            .decode::<T>(&response.body)
            .map_err(ApiError::Decoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{EndpointDescriptor, HttpMethod};
    use crate::error::DecodeError;
    use crate::http_client::{HttpRequest, RawResponse, TransportError, TransportFuture};
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: i64,
        name: String,
    }

    struct RecordingTransport {
        response: Mutex<Option<Result<RawResponse, TransportError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingTransport {
        fn replying(response: Result<RawResponse, TransportError>) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Some(response)),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn request_count(&self) -> usize {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .len()
        }
    }

    impl HttpTransport for RecordingTransport {
        fn execute<'a>(&'a self, request: HttpRequest) -> TransportFuture<'a> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self
                .response
                .lock()
                .expect("response slot should not be poisoned")
                .take()
                .unwrap_or_else(|| Err(TransportError::Request(String::from("already used"))));
            Box::pin(async move { response })
        }
    }

    #[derive(Default)]
    struct CountingDecoder {
        calls: AtomicUsize,
    }

    impl Decoder for CountingDecoder {
        fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, DecodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            JsonDecoder::new().decode(bytes)
        }
    }

    fn repository(transport: Arc<RecordingTransport>) -> WebRepository {
        WebRepository::new(
            BaseUrl::parse("https://api.example.com/").expect("valid base"),
            transport,
        )
    }

    #[tokio::test]
    async fn decodes_success_body() {
        let transport =
            RecordingTransport::replying(Ok(RawResponse::ok_json(r#"{"id":42,"name":"Ada"}"#)));
        let repo = repository(transport.clone());

        let user: User = repo
            .call(&EndpointDescriptor::get("users/42"))
            .await
            .expect("call should succeed");

        assert_eq!(user.name, "Ada");
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn non_success_status_skips_decoder() {
        let transport = RecordingTransport::replying(Ok(RawResponse::new(
            404,
            r#"{"error":"not found"}"#,
        )));
        let repo = repository(transport).with_decoder(CountingDecoder::default());

        let error = repo
            .call::<User, _>(&EndpointDescriptor::get("users/42"))
            .await
            .expect_err("404 is outside the default policy");

        assert!(matches!(error, ApiError::HttpCode(404)));
        assert_eq!(repo.decoder().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn explicit_policy_overrides_default() {
        let transport = RecordingTransport::replying(Ok(RawResponse::new(404, "null")));
        let repo = repository(transport);

        let user: Option<User> = repo
            .call_expecting(
                &EndpointDescriptor::get("users/42"),
                &SuccessPolicy::success().and_code(404),
            )
            .await
            .expect("404 accepted by explicit policy");

        assert!(user.is_none());
    }

    #[tokio::test]
    async fn classified_transport_error_passes_through() {
        let transport =
            RecordingTransport::replying(Err(TransportError::Api(ApiError::InvalidUrl)));
        let repo = repository(transport);

        let error = repo
            .call_as_result::<User, _>(&EndpointDescriptor::get("users/42"))
            .await
            .expect_err("transport rejected the request");
        assert!(matches!(error, ApiError::InvalidUrl));
    }

    #[tokio::test]
    async fn raw_transport_error_becomes_unexpected_response() {
        let transport =
            RecordingTransport::replying(Err(TransportError::Timeout(String::from("1s elapsed"))));
        let repo = repository(transport);

        let error = repo
            .call::<User, _>(&EndpointDescriptor::get("users/42"))
            .await
            .expect_err("timeout surfaces as failure");
        assert!(matches!(error, ApiError::UnexpectedResponse));
    }

    #[tokio::test]
    async fn endpoint_build_failure_never_reaches_transport() {
        let transport = RecordingTransport::replying(Ok(RawResponse::ok_json("{}")));
        let repo = repository(transport.clone());

        let error = repo
            .call::<serde_json::Value, _>(&EndpointDescriptor::new(
                HttpMethod::Get,
                "https://elsewhere.example.com/",
            ))
            .await
            .expect_err("path escapes the base");

        assert!(matches!(error, ApiError::InvalidUrl));
        assert_eq!(transport.request_count(), 0);
    }
}
