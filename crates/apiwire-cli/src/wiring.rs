//! Composition root: everything the binary resolves is registered here.

use std::sync::Arc;

use apiwire_core::{
    Dependencies, DependencyRegistry, HttpMethod, HttpTransport, RawResponse, ReqwestTransport,
    SessionConfig, StubTransport,
};

use crate::error::CliError;

const DEMO_USER: &str = r#"{"id":42,"name":"Ada"}"#;

/// Canned routes served in test mode.
pub fn demo_transport() -> StubTransport {
    StubTransport::new()
        .with_response(HttpMethod::Get, "users/42", RawResponse::ok_json(DEMO_USER))
        .with_response(
            HttpMethod::Get,
            "users/404",
            RawResponse::new(404, r#"{"error":"not found"}"#),
        )
        .with_response(HttpMethod::Get, "broken", RawResponse::ok_json("not json"))
}

/// Registers the session and transport for `test_mode` into `dependencies`.
///
/// Live mode reads [`SessionConfig::from_env`] and builds the reqwest client
/// up front, so configuration failures surface before anything is registered.
pub fn provide(dependencies: &Dependencies, test_mode: bool) -> Result<(), CliError> {
    let session = if test_mode {
        dependencies.session(true)
    } else {
        SessionConfig::from_env()?
    };

    let live: Option<Arc<dyn HttpTransport>> = if test_mode {
        None
    } else {
        Some(Arc::new(ReqwestTransport::new(session.clone())?))
    };

    dependencies.register_configurator(move |registry: &DependencyRegistry, test_mode| {
        registry.register(session);

        let transport = match live {
            Some(transport) if !test_mode => transport,
            _ => Arc::new(demo_transport()) as Arc<dyn HttpTransport>,
        };
        registry.register(transport);
    });
    dependencies.provide_dependencies(test_mode);

    Ok(())
}
