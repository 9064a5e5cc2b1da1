//! # MOC Tracker
//!
//! The main binary for the Management-of-Change workflow engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based) over in-memory request sessions
//! - CLI interface over a single request document file
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  apps/moc (THE BINARY)                  │
//! │                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌────────────┐   │
//! │  │   CLI       │    │   HTTP API  │    │  moc.toml  │   │
//! │  │  (clap)     │    │   (axum)    │    │  (config)  │   │
//! │  └──────┬──────┘    └──────┬──────┘    └─────┬──────┘   │
//! │         │                  │                 │          │
//! │         └──────────────────┼─────────────────┘          │
//! │                            ▼                            │
//! │                    ┌───────────────┐                    │
//! │                    │   moc-core    │                    │
//! │                    │  (THE LOGIC)  │                    │
//! │                    └───────────────┘                    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Open a request from an intake file
//! moc init --id MOC-2024-017 --intake intake.toml
//!
//! # Walk the workflow
//! moc status
//! moc complete --stage initiation --task 0
//! moc complete --stage initiation --task 2 --payload '{"EngineerSelection":"p7"}'
//!
//! # Start the HTTP server
//! moc server --host 0.0.0.0 --port 8080
//! ```

use clap::Parser;
use moc::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // MOC_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("MOC_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "moc=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ███╗   ███╗ ██████╗  ██████╗
  ████╗ ████║██╔═══██╗██╔════╝
  ██╔████╔██║██║   ██║██║
  ██║╚██╔╝██║██║   ██║██║
  ██║ ╚═╝ ██║╚██████╔╝╚██████╗
  ╚═╝     ╚═╝ ╚═════╝  ╚═════╝

  Management of Change Tracker v{}

  Staged • Gated • Traceable
"#,
        env!("CARGO_PKG_VERSION")
    );
}
