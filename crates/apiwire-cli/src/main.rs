mod cli;
mod error;
mod wiring;

use std::process::ExitCode;
use std::sync::Arc;

use apiwire_core::{
    BaseUrl, Dependencies, EndpointDescriptor, HttpTransport, SessionConfig, WebRepository,
};
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let dependencies = Dependencies::default();
    wiring::provide(&dependencies, cli.test_mode)?;

    let session: SessionConfig = dependencies.registry().resolve();
    let transport: Arc<dyn HttpTransport> = dependencies.registry().resolve();
    let repository = WebRepository::new(BaseUrl::parse(&cli.base_url)?, transport)
        .with_success_policy(cli.expect.clone());
    tracing::debug!(
        base_url = %repository.base_url(),
        success_policy = %repository.success_policy(),
        test_mode = cli.test_mode,
        request_timeout = ?session.request_timeout,
        resource_timeout = ?session.resource_timeout,
        waits_for_connectivity = session.waits_for_connectivity,
        "repository ready"
    );

    let endpoint = endpoint_from(&cli)?;
    let value: Value = repository.call(&endpoint).await?;

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    println!("{rendered}");

    Ok(())
}

fn endpoint_from(cli: &Cli) -> Result<EndpointDescriptor, CliError> {
    let mut endpoint = EndpointDescriptor::new(cli.method, cli.path.as_str());

    for (name, value) in &cli.headers {
        endpoint = endpoint.with_header(name.as_str(), value.as_str());
    }
    for (key, value) in &cli.query {
        endpoint = endpoint.with_query(key.as_str(), value.as_str());
    }
    if let Some(body) = &cli.body {
        let payload: Value = serde_json::from_str(body).map_err(CliError::Body)?;
        endpoint = endpoint.with_json_body(&payload)?;
    }

    Ok(endpoint)
}
