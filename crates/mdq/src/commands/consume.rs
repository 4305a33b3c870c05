//! Consume command implementation

use anyhow::{Context, Result};
use clap::Args;
use maildir_queue_core::QueueConfig;
use serde_json::Value;
use std::io::Write;
use tracing::debug;

/// Pop messages continuously
#[derive(Args, Debug)]
pub struct ConsumeArgs {
    /// Stop after this many messages (default: run until killed)
    #[arg(long)]
    count: Option<usize>,
}

/// Execute the consume command
///
/// Each message is printed before it is committed, so a consumer killed
/// mid-write leaves the message in cur/ for `recover` instead of losing it.
pub async fn execute(args: ConsumeArgs, config: QueueConfig) -> Result<()> {
    let queue = super::open(config).await?;
    let mut stdout = std::io::stdout();
    let mut consumed = 0usize;

    while args.count.is_none_or(|count| consumed < count) {
        let tx = queue.tpop::<Value>().await?;
        writeln!(stdout, "{}", serde_json::to_string(tx.value())?)
            .and_then(|()| stdout.flush())
            .context("Failed to write message to stdout")?;
        debug!("Consumed {}", tx.name());
        tx.commit().await?;
        consumed += 1;
    }

    Ok(())
}
