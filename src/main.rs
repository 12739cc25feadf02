// Rolecast
// Main entry point

use anyhow::Result;
use clap::Parser;

use rolecast::cli::{self, Cli};
use rolecast::config::load_config;
use rolecast::logging::init_logging;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        for cause in e.chain().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Cli::parse();

    let config = load_config(args.config.as_deref())?
        .with_overrides(args.provider, args.model.clone());
    init_logging(&config.logging, args.verbose)?;

    cli::run(args, config).await
}
