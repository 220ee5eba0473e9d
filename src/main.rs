use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use verify_mind_engine::{monitoring, Config, Service};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one fetch -> decide -> attest pass and print the result
    Execute,
    /// Print the latest anchor price for btc, eth or bnb
    Price { symbol: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load local .env if present (no-op in prod/systemd envs)
    let _ = dotenvy::dotenv();

    monitoring::init_tracing();

    let args = Args::parse();
    let cfg = Config::from_env()?;
    info!(?cfg, "boot");

    let service = Service::from_config(&cfg)?;
    let out = match args.command.unwrap_or(Command::Execute) {
        Command::Execute => serde_json::to_string_pretty(&service.execute_strategy().await)?,
        Command::Price { symbol } => serde_json::to_string_pretty(&service.price(&symbol).await)?,
    };
    println!("{out}");

    Ok(())
}
