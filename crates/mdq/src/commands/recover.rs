//! Recover command implementation
//!
//! Claimed messages whose consumer died stay in cur/ forever. Run this only
//! when no consumer is active, otherwise in-flight work is handed out twice.

use anyhow::Result;
use maildir_queue_core::QueueConfig;

/// Execute the recover command
pub async fn execute(config: QueueConfig) -> Result<()> {
    let queue = super::open_detached(config).await?;
    let restored = queue.maildir().restore_all_claimed().await?;
    println!("Restored {restored} claimed messages");
    Ok(())
}
