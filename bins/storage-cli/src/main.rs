mod cmd;
mod config;
mod error;

use clap::Parser;
use config::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let settings = match cli.connection.resolve() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Query(args) => cmd::query::run(&settings, args).await,
        Commands::Insert(args) => cmd::insert::run(&settings, args).await,
        Commands::Batch(args) => cmd::batch::run(&settings, args).await,
        Commands::PutBlob(args) => cmd::blob::run(&settings, args).await,
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
