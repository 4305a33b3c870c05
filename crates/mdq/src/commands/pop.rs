//! Pop command implementation

use anyhow::{Result, bail};
use clap::Args;
use maildir_queue_core::QueueConfig;
use serde_json::Value;
use std::time::Duration;

/// Pop one message
#[derive(Args, Debug)]
pub struct PopArgs {
    /// Give up after this many seconds (default: wait indefinitely)
    #[arg(long, conflicts_with = "no_wait")]
    timeout_secs: Option<u64>,

    /// Fail immediately when the queue is empty
    #[arg(long)]
    no_wait: bool,
}

/// Execute the pop command
pub async fn execute(args: PopArgs, config: QueueConfig) -> Result<()> {
    let value: Value = if args.no_wait {
        let queue = super::open_detached(config).await?;
        match queue.try_pop().await? {
            Some(value) => value,
            None => bail!("Queue is empty"),
        }
    } else {
        let queue = super::open(config).await?;
        match args.timeout_secs {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), queue.pop()).await {
                Ok(popped) => popped?,
                Err(_) => bail!("No message arrived within {secs}s"),
            },
            None => queue.pop().await?,
        }
    };

    println!("{}", serde_json::to_string(&value)?);
    Ok(())
}
