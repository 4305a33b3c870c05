//! mdq - command-line access to a maildir-style message queue
//!
//! Every command operates on one queue root, resolved from `--path`,
//! `MDQ_PATH`, the config file, or the current directory.

use clap::Parser;

mod commands;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.execute().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
