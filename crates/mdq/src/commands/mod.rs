//! CLI command dispatch and execution

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use maildir_queue_core::config::{ConfigOverrides, resolve_config};
use maildir_queue_core::{NotifierKind, Queue, QueueConfig, logging};
use std::path::PathBuf;

mod clear;
mod consume;
mod length;
mod pop;
mod produce;
mod push;
mod recover;

/// mdq - a brokerless filesystem message queue
#[derive(Parser, Debug)]
#[command(
    name = "mdq",
    version,
    about = "Push and pop JSON messages through a maildir-style queue directory",
    long_about = "Any number of producers and consumers share one queue directory; \
                  each message is delivered to exactly one consumer"
)]
pub struct Cli {
    /// Queue root directory (contains tmp/, new/, cur/)
    #[arg(long, global = true)]
    path: Option<PathBuf>,

    /// Config file (TOML, [queue] table)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// How arrivals are detected while waiting: watch or poll
    #[arg(long, global = true)]
    notifier: Option<NotifierKind>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Push one JSON message
    Push(push::PushArgs),

    /// Pop one message and print it
    Pop(pop::PopArgs),

    /// Print the number of available messages
    Length,

    /// Delete every message, including claimed and half-written ones
    Clear,

    /// Return abandoned claimed messages to the queue
    Recover,

    /// Pop messages continuously, printing one JSON value per line
    Consume(consume::ConsumeArgs),

    /// Push every JSON line read from stdin
    Produce,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        if self.verbose {
            logging::init_with_level(tracing::Level::DEBUG);
        } else {
            logging::init();
        }

        let overrides = ConfigOverrides {
            path: self.path,
            notifier: self.notifier,
            config_path: self.config,
            ..Default::default()
        };
        let config = resolve_config(&overrides)?;

        match self.command {
            Commands::Push(args) => push::execute(args, config).await,
            Commands::Pop(args) => pop::execute(args, config).await,
            Commands::Length => length::execute(config).await,
            Commands::Clear => clear::execute(config).await,
            Commands::Recover => recover::execute(config).await,
            Commands::Consume(args) => consume::execute(args, config).await,
            Commands::Produce => produce::execute(config).await,
        }
    }
}

/// Open the queue for commands that never wait on arrivals
async fn open_detached(config: QueueConfig) -> Result<Queue> {
    open(config.with_persistent(false)).await
}

async fn open(config: QueueConfig) -> Result<Queue> {
    let root = config.path.clone();
    Queue::open(config)
        .await
        .with_context(|| format!("Failed to open queue at {}", root.display()))
}
