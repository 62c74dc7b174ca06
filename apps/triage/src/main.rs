//! # triage - Dengue Triage Server and CLI
//!
//! The main binary for the dengue triage protocol engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for patient flows
//! - Deferred resolution of automatic steps
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      apps/triage (THE BINARY)                   │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐     │
//! │  │   CLI       │    │   HTTP API  │    │    Scheduler     │     │
//! │  │  (clap)     │    │   (axum)    │    │  (tokio tasks)   │     │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘     │
//! │         │                  │                    │               │
//! │         └──────────────────┼────────────────────┘               │
//! │                            ▼                                    │
//! │                    ┌───────────────┐                            │
//! │                    │  triage-core  │                            │
//! │                    │ (THE LOGIC)   │                            │
//! │                    └───────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! triage server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! triage intake p-17 --age 34 --gender F
//! triage advance p-17 0
//! triage observe p-17 hr=120 bp=90/60
//! triage show p-17
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use triage::cli;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // TRIAGE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("TRIAGE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_filter = if cli.verbose {
        "triage=debug,triage_core=debug,tower_http=debug"
    } else {
        "triage=info,triage_core=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    // Display startup banner
    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ████████╗██████╗ ██╗ █████╗  ██████╗ ███████╗
  ╚══██╔══╝██╔══██╗██║██╔══██╗██╔════╝ ██╔════╝
     ██║   ██████╔╝██║███████║██║  ███╗█████╗
     ██║   ██╔══██╗██║██╔══██║██║   ██║██╔══╝
     ██║   ██║  ██║██║██║  ██║╚██████╔╝███████╗
     ╚═╝   ╚═╝  ╚═╝╚═╝╚═╝  ╚═╝ ╚═════╝ ╚══════╝

  Dengue Triage Protocol v{}

  Severity groups A-D • Deferred lab routing
"#,
        env!("CARGO_PKG_VERSION")
    );
}
