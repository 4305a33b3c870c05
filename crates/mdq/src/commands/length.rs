//! Length command implementation

use anyhow::Result;
use maildir_queue_core::QueueConfig;

/// Execute the length command
pub async fn execute(config: QueueConfig) -> Result<()> {
    let queue = super::open_detached(config).await?;
    println!("{}", queue.length().await?);
    Ok(())
}
