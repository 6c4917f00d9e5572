//! Inbizio deploy tool - ship a versioned build to a remote host over SSH

use clap::Parser;

use inbizio_deploy::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    inbizio_deploy::logging::init(cli.verbose);
    if let Err(e) = cli.run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
