//! Trazar CLI — infrastructure dependency resolution and routing planning.

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "trazar",
    version,
    about = "Infrastructure dependency resolution and routing planning — deterministic, BLAKE3-fingerprinted plans"
)]
struct Cli {
    #[command(subcommand)]
    command: trazar::cli::Commands,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = trazar::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
