//! wpx - woo-porter command line tools.
//!
//! # Usage
//!
//! ```bash
//! # Create the admin panel's session table
//! wpx migrate
//!
//! # Export customers through a running admin panel, page by page
//! wpx export customers --base-url https://admin.example.com --output customers.csv
//! ```
//!
//! # Commands
//!
//! - `migrate` - Create the MySQL session table
//! - `export customers` - Batched Shopify customer CSV export

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

mod client;
mod commands;
mod driver;

#[derive(Parser)]
#[command(name = "wpx")]
#[command(author, version, about = "woo-porter CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the admin session table
    Migrate,
    /// Run an export against a running admin panel
    Export {
        #[command(subcommand)]
        target: ExportTarget,
    },
}

#[derive(Subcommand)]
enum ExportTarget {
    /// Shopify-compatible customer CSV, fetched in batches
    Customers {
        /// Admin panel base URL, including any path prefix (e.g. https://host/porter/)
        #[arg(long, env = "ADMIN_BASE_URL")]
        base_url: String,

        /// Access key with the export capability
        #[arg(long, env = "WPX_ACCESS_KEY", hide_env_values = true)]
        access_key: String,

        /// Output file (defaults to woocommerce-customers-YYYY-MM-DD.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pause between batch requests, in milliseconds
        #[arg(long, default_value_t = 1000)]
        delay_ms: u64,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wpx=info,woo_porter_cli=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::sessions().await?,
        Commands::Export { target } => match target {
            ExportTarget::Customers {
                base_url,
                access_key,
                output,
                delay_ms,
            } => {
                commands::export::customers(commands::export::CustomerExportArgs {
                    base_url,
                    access_key: access_key.into(),
                    output,
                    cooldown: Duration::from_millis(delay_ms),
                })
                .await?;
            }
        },
    }
    Ok(())
}
