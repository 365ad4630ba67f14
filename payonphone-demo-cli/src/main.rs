//! PayOnPhone Demo CLI
//!
//! Command-line terminal for exercising the reader session against the
//! simulated runtime and a real (or local) connection token backend.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod ui;

use commands::Context;

#[derive(Parser)]
#[command(name = "payonphone-demo")]
#[command(about = "PayOnPhone Demo CLI - readers and card payments", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Connection token backend
    #[arg(
        long,
        global = true,
        env = "PAYONPHONE_BACKEND_URL",
        default_value = "http://localhost:3000"
    )]
    backend_url: String,

    /// Location readers are registered to
    #[arg(
        long,
        global = true,
        env = "PAYONPHONE_LOCATION_ID",
        default_value = "tml_demo"
    )]
    location_id: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the backend is serving
    Health,

    /// Mint one connection token
    Token,

    /// Scan for (simulated) readers
    Discover {
        /// Use a local credential instead of the backend
        #[arg(long)]
        offline: bool,
    },

    /// Take a payment
    Charge {
        /// Amount in major units (e.g. 15.99)
        amount: String,

        /// Currency code (defaults to PAYONPHONE_CURRENCY or usd)
        #[arg(short, long)]
        currency: Option<String>,

        /// Serial number of the reader to use (defaults to the first found)
        #[arg(long)]
        serial: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Use a local credential instead of the backend
        #[arg(long)]
        offline: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("payonphone_demo_cli=debug,payonphone_lib=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("payonphone_demo_cli=info,payonphone_lib=warn")
            .init();
    }

    let ctx = Context {
        backend_url: cli.backend_url,
        location_id: cli.location_id,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Health => {
            commands::health::run(&ctx).await?;
        }
        Commands::Token => {
            commands::token::run(&ctx).await?;
        }
        Commands::Discover { offline } => {
            commands::discover::run(&ctx, offline).await?;
        }
        Commands::Charge {
            amount,
            currency,
            serial,
            yes,
            offline,
        } => {
            commands::charge::run(
                &ctx,
                &amount,
                currency.as_deref(),
                serial.as_deref(),
                yes,
                offline,
            )
            .await?;
        }
    }

    Ok(())
}
