//! Push command implementation

use anyhow::{Context, Result, bail};
use clap::Args;
use maildir_queue_core::QueueConfig;
use serde_json::Value;
use tokio::io::AsyncReadExt;

/// Push one JSON message
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Message as a JSON document (or omit to use --stdin)
    message: Option<String>,

    /// Read the JSON document from stdin
    #[arg(long, conflicts_with = "message")]
    stdin: bool,
}

/// Execute the push command
pub async fn execute(args: PushArgs, config: QueueConfig) -> Result<()> {
    let text = match (args.message, args.stdin) {
        (Some(message), false) => message,
        (None, true) => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read message from stdin")?;
            buf
        }
        _ => bail!("Provide a JSON message argument or --stdin"),
    };

    let value: Value = serde_json::from_str(text.trim()).context("Message is not valid JSON")?;

    let queue = super::open_detached(config).await?;
    let name = queue.push(&value).await?;
    println!("{name}");
    Ok(())
}
