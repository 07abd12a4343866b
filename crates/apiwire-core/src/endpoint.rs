//! Declarative endpoint descriptions and request composition.
//!
//! An [`Endpoint`] says *what* to call: path, method, headers, body and query.
//! Combined with a [`BaseUrl`] it produces the transport-level
//! [`HttpRequest`] consumed by [`HttpTransport`](crate::HttpTransport).
//!
//! # Example
//!
//! ```rust
//! use apiwire_core::{BaseUrl, Endpoint, EndpointDescriptor};
//!
//! let base = BaseUrl::parse("https://api.example.com/v1").expect("valid base");
//! let endpoint = EndpointDescriptor::get("users/42").with_query("expand", "teams");
//!
//! let request = endpoint.request(&base).expect("valid request");
//! assert_eq!(request.url.as_str(), "https://api.example.com/v1/users/42?expand=teams");
//! ```

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use reqwest::Url;
use serde::Serialize;
use thiserror::Error;

use crate::error::ApiError;
use crate::http_client::HttpRequest;

/// HTTP verbs an endpoint may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl Display for HttpMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported HTTP method '{value}'")]
pub struct ParseMethodError {
    value: String,
}

impl FromStr for HttpMethod {
    type Err = ParseMethodError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(ParseMethodError {
                value: value.to_owned(),
            }),
        }
    }
}

/// Base URL that always terminates in a path separator.
///
/// Endpoint paths are resolved relative to it, so `https://host/v1` and
/// `https://host/v1/` behave the same.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(Url);

impl BaseUrl {
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ApiError::InvalidUrl);
        }

        let mut url = Url::parse(raw).map_err(|_| ApiError::InvalidUrl)?;
        if url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl);
        }

        if !url.path().ends_with('/') {
            let slashed = format!("{}/", url.path());
            url.set_path(&slashed);
        }
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Resolves `path` below this base. The result never leaves the base:
    /// a leading `/` is ignored, and absolute or `..` paths that would land
    /// elsewhere are rejected.
    pub fn join(&self, path: &str) -> Result<Url, ApiError> {
        let relative = path.trim_start_matches('/');
        let url = self.0.join(relative).map_err(|_| ApiError::InvalidUrl)?;
        if !url.as_str().starts_with(self.0.as_str()) {
            return Err(ApiError::InvalidUrl);
        }
        Ok(url)
    }
}

impl Display for BaseUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BaseUrl {
    type Err = ApiError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

/// Description of one logical API call.
///
/// Only [`path`](Endpoint::path) and [`method`](Endpoint::method) are
/// required. [`request`](Endpoint::request) has a default composition that
/// implementors may override; any [`ApiError`] it returns reaches the caller
/// unchanged.
pub trait Endpoint: Send + Sync {
    fn path(&self) -> &str;

    fn method(&self) -> HttpMethod;

    fn headers(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn body(&self) -> Option<Vec<u8>> {
        None
    }

    fn query_items(&self) -> Option<Vec<(String, String)>> {
        None
    }

    /// Builds the transport request for this endpoint below `base_url`.
    fn request(&self, base_url: &BaseUrl) -> Result<HttpRequest, ApiError> {
        let mut url = base_url.join(self.path())?;

        if let Some(items) = self.query_items() {
            if !items.is_empty() {
                let mut pairs = url.query_pairs_mut();
                for (name, value) in &items {
                    pairs.append_pair(name, value);
                }
            }
        }

        let mut request = HttpRequest::new(self.method(), url);
        for (name, value) in self.headers() {
            request = request.with_header(name, value);
        }
        if let Some(body) = self.body() {
            request = request.with_body(body);
        }

        Ok(request)
    }
}

/// Concrete, immutable [`Endpoint`] assembled with a builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    path: String,
    method: HttpMethod,
    headers: BTreeMap<String, String>,
    body: Option<Vec<u8>>,
    query_items: Option<Vec<(String, String)>>,
}

impl EndpointDescriptor {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            headers: BTreeMap::new(),
            body: None,
            query_items: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
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

    /// Serializes `payload` as the JSON body and sets `content-type`.
    pub fn with_json_body<B: Serialize>(self, payload: &B) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(payload)?;
        Ok(self
            .with_header("content-type", "application/json")
            .with_body(body))
    }

    /// Appends a query item. Order is preserved and duplicates are kept.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_items
            .get_or_insert_with(Vec::new)
            .push((name.into(), value.into()));
        self
    }
}

impl Endpoint for EndpointDescriptor {
    fn path(&self) -> &str {
        &self.path
    }

    fn method(&self) -> HttpMethod {
        self.method
    }

    fn headers(&self) -> BTreeMap<String, String> {
        self.headers.clone()
    }

    fn body(&self) -> Option<Vec<u8>> {
        self.body.clone()
    }

    fn query_items(&self) -> Option<Vec<(String, String)>> {
        self.query_items.clone()
    }
}
