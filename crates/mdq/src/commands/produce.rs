//! Produce command implementation

use anyhow::{Context, Result};
use maildir_queue_core::QueueConfig;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Execute the produce command
///
/// Reads newline-delimited JSON from stdin; blank lines are skipped. Stops at
/// the first invalid line, after pushing every line before it.
pub async fn execute(config: QueueConfig) -> Result<()> {
    let queue = super::open_detached(config).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pushed = 0usize;
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)
            .with_context(|| format!("Line {line_no} is not valid JSON"))?;
        queue.push(&value).await?;
        pushed += 1;
    }

    println!("Pushed {pushed} messages");
    Ok(())
}
