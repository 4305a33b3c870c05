//! Clear command implementation

use anyhow::Result;
use maildir_queue_core::QueueConfig;

/// Execute the clear command
pub async fn execute(config: QueueConfig) -> Result<()> {
    let queue = super::open_detached(config).await?;
    queue.clear().await?;
    println!("Cleared queue at {}", queue.maildir().root().display());
    Ok(())
}
