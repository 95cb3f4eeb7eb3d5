//! # Decis - Decision Framework Knowledge Base
//!
//! The main binary for the Decis knowledge engine.
//!
//! This application provides:
//! - CLI interface for querying and reshaping the knowledge base
//! - File I/O around the core's pure formats (JSON exchange, snapshots)
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │             apps/decis (THE BINARY)          │
//! │                                              │
//! │  ┌─────────────┐        ┌────────────────┐  │
//! │  │   CLI       │        │  File I/O      │  │
//! │  │  (clap)     │        │  (json/bin)    │  │
//! │  └──────┬──────┘        └───────┬────────┘  │
//! │         │                       │           │
//! │         └───────────┬───────────┘           │
//! │                     ▼                       │
//! │             ┌───────────────┐               │
//! │             │  decis-core   │               │
//! │             │  (THE LOGIC)  │               │
//! │             └───────────────┘               │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! decis stats
//! decis import -f engine.json
//! decis filter -d Monitoring -a answers.json
//! decis answers reorder -q 3 --order 2,1,0
//! ```

mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Initialize tracing — DECIS_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("DECIS_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "decis=info".into());

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
    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
