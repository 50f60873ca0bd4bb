//! # EDG - Industrial Edge Gateway
//!
//! The main binary for the EDG gateway core.
//!
//! This application provides:
//! - Subject bus for readings and management requests
//! - HTTP bridge (axum-based publish / request / subscribe)
//! - CLI interface for registry inspection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       apps/edg (THE BINARY)                     │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐    │
//! │  │   CLI       │    │ HTTP bridge │    │   Subject bus    │    │
//! │  │  (clap)     │    │   (axum)    │    │   (broadcast)    │    │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘    │
//! │         │                  │                    │               │
//! │         └──────────────────┼────────────────────┘               │
//! │                            ▼                                    │
//! │                    ┌───────────────┐                            │
//! │                    │   edg-core    │                            │
//! │                    │ (THE REGISTRY)│                            │
//! │                    └───────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the gateway
//! edg server --host 0.0.0.0 --port 4280 --templates ./templates
//!
//! # Inspect the registry
//! edg status
//! edg assets
//! edg relations --asset <id> --direction outgoing
//! ```

use clap::Parser;
use edg::cli;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = cli::Cli::parse();

    if !cli.quiet {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Text logs by default, JSON lines with `EDG_LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("edg=info,edg_core=info,tower_http=info"));
    let json = std::env::var("EDG_LOG_FORMAT").is_ok_and(|format| format == "json");

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .init();
}

/// Print the EDG startup banner.
fn print_banner() {
    println!(
        r#"
  ███████╗██████╗  ██████╗
  ██╔════╝██╔══██╗██╔════╝
  █████╗  ██║  ██║██║  ███╗
  ██╔══╝  ██║  ██║██║   ██║
  ███████╗██████╔╝╚██████╔╝
  ╚══════╝╚═════╝  ╚═════╝

  Industrial Edge Gateway v{}

  Assets • Relations • Readings
"#,
        env!("CARGO_PKG_VERSION")
    );
}
