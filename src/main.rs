use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use shelfcheck::aggregate::Aggregator;
use shelfcheck::config::Config;
use shelfcheck::rest;

#[derive(Parser)]
#[command(
    name = "shelfcheck",
    about = "Check which of a user's to-read books are on the shelf at the library",
    version
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline once for a user and print the results as JSON
    Check {
        /// Shelf service profile id
        user_id: String,
    },
    /// Serve the HTTP API
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8343")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("shelfcheck={default_level}").parse()?),
        )
        .init();

    let aggregator = Aggregator::new(Config::from_env());

    match cli.command {
        Commands::Check { user_id } => {
            let results = aggregator.aggregate(&user_id).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Serve { port } => {
            rest::start(port, Arc::new(aggregator)).await?;
        }
    }

    Ok(())
}
