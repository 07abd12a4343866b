//! CLI argument definitions for apiwire.
//!
//! # Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--method` | `GET` | HTTP method |
//! | `--header` | - | `name:value`, repeatable |
//! | `--query` | - | `key=value`, repeatable, order preserved |
//! | `--body` | - | Raw request body (sent as JSON) |
//! | `--expect` | `200-299` | Success policy |
//! | `--test-mode` | `false` | Serve canned responses instead of the network |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--verbose` | `false` | Debug-level logs on stderr |
//!
//! # Examples
//!
//! ```bash
//! apiwire https://api.example.com users/42 --pretty
//! apiwire https://api.example.com users --query page=2 --expect 200-299,304
//! apiwire --test-mode https://api.example.com users/42
//! ```

use apiwire_core::{HttpMethod, SuccessPolicy};
use clap::Parser;

/// Call one JSON endpoint and print the decoded body.
#[derive(Debug, Parser)]
#[command(name = "apiwire", author, version, about = "Declarative HTTP JSON calls")]
pub struct Cli {
    /// Base URL; a trailing slash is added when missing.
    pub base_url: String,

    /// Endpoint path relative to the base URL.
    pub path: String,

    #[arg(long, short = 'X', default_value = "GET")]
    pub method: HttpMethod,

    /// Request header as `name:value`.
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Query item as `key=value`.
    #[arg(long = "query", short = 'q', value_parser = parse_query)]
    pub query: Vec<(String, String)>,

    /// Request body, sent with `content-type: application/json`.
    #[arg(long)]
    pub body: Option<String>,

    /// Accepted status codes, e.g. `200-299,304`.
    #[arg(long, default_value = "200-299")]
    pub expect: SuccessPolicy,

    /// Wire canned responses and a one-second session instead of the network.
    #[arg(long)]
    pub test_mode: bool,

    #[arg(long)]
    pub pretty: bool,

    #[arg(long, short = 'v')]
    pub verbose: bool,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_owned(), value.trim().to_owned()))
        }
        _ => Err(format!("expected name:value, got '{raw}'")),
    }
}

fn parse_query(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}
