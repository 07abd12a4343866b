//! # apiwire Core
//!
//! Declarative HTTP JSON calls and startup-time dependency wiring.
//!
//! ## Overview
//!
//! - **Endpoint descriptors** describe one API call (path, method, headers, body, query)
//! - **Transports** send a request and return raw bytes plus a status code
//! - **Decoders** turn the body into a typed value
//! - **Success policies** decide which status codes count as success
//! - **Web repositories** run the whole pipeline and classify every failure
//! - **Dependency registry** stores one instance per type for composition roots
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`decode`] | Decode capability and the JSON decoder |
//! | [`dependencies`] | Startup hook that runs the host's configurator once |
//! | [`endpoint`] | Endpoint trait, descriptor builder, base URL normalization |
//! | [`error`] | Closed error taxonomy of the call pipeline |
//! | [`http_client`] | Transport trait, reqwest and stub transports |
//! | [`registry`] | Type-keyed dependency registry |
//! | [`repository`] | Call executor |
//! | [`session`] | Transport session configuration |
//! | [`success_policy`] | Accepted status code sets |
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ Endpoint         │  path, method, headers, body, query
//! └────────┬─────────┘
//!          │ request(&BaseUrl)
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ WebRepository    │────▶│ HttpTransport    │
//! │ (call executor)  │     │ (reqwest/stub)   │
//! └────────┬─────────┘     └──────────────────┘
//!          │ status ∈ SuccessPolicy ?
//!          ▼
//! ┌──────────────────┐
//! │ Decoder          │──▶ T  or  ApiError
//! └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use apiwire_core::ApiError;
//!
//! fn describe(error: &ApiError) -> String {
//!     match error {
//!         ApiError::HttpCode(404) => String::from("not found"),
//!         ApiError::HttpCode(code) => format!("server answered {code}"),
//!         ApiError::Decoding(cause) => format!("unexpected body: {cause}"),
//!         ApiError::InvalidUrl | ApiError::UnexpectedResponse => error.to_string(),
//!     }
//! }
//! # assert_eq!(describe(&ApiError::HttpCode(404)), "not found");
//! ```

pub mod decode;
pub mod dependencies;
pub mod endpoint;
pub mod error;
pub mod http_client;
pub mod registry;
pub mod repository;
pub mod session;
pub mod success_policy;

pub use decode::{Decoder, JsonDecoder};
pub use dependencies::Dependencies;
pub use endpoint::{BaseUrl, Endpoint, EndpointDescriptor, HttpMethod, ParseMethodError};
pub use error::{ApiError, ApiResult, DecodeError};
pub use http_client::{
    HttpRequest, HttpTransport, RawResponse, ReqwestTransport, StubTransport, TransportError,
    TransportFuture,
};
pub use registry::DependencyRegistry;
pub use repository::WebRepository;
pub use session::{CachePolicy, ConfigError, SessionConfig};
pub use success_policy::{ParsePolicyError, SuccessPolicy};
