//! Maildir storage engine
//!
//! Owns the on-disk layout of a queue and every state transition of a message.
//! Each transition is exactly one filesystem primitive, so no operation needs
//! a lock that outlives a single call.
//!
//! # Directory Structure
//!
//! ```text
//! <root>/
//!   tmp/    - Staging: messages being written, never visible to consumers
//!   new/    - Available: fully written messages, claimable
//!   cur/    - Claimed: held by one consumer until commit or rollback
//! ```
//!
//! # Message Lifecycle
//!
//! 1. `enqueue()` writes the payload into tmp/ and renames it into new/
//! 2. `claim()` renames new/NAME to cur/NAME; exactly one concurrent caller wins
//! 3. `finalize()` deletes cur/NAME (commit)
//! 4. `restore()` renames cur/NAME back to new/NAME (rollback)

mod name;

pub use name::{NameGenerator, compare_names};

use crate::error::QueueError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Staging directory name
pub const TMP_DIR: &str = "tmp";
/// Available directory name
pub const NEW_DIR: &str = "new";
/// Claimed directory name
pub const CUR_DIR: &str = "cur";

/// Result of a claim attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The message was moved into cur/ and belongs to the caller
    Claimed,
    /// The message was no longer in new/ (claimed by someone else or removed)
    Unavailable,
}

/// A queue directory and its three lifecycle subdirectories
#[derive(Debug)]
pub struct Maildir {
    root: PathBuf,
    tmp: PathBuf,
    new: PathBuf,
    cur: PathBuf,
    names: NameGenerator,
}

impl Maildir {
    /// Create a handle for the queue rooted at `root`
    ///
    /// Does not touch the filesystem; call [`Maildir::create`] before use.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        let hostname = match hostname::get() {
            Ok(name) => name.to_string_lossy().into_owned(),
            Err(e) => {
                warn!("Failed to determine hostname, using 'localhost': {e}");
                "localhost".to_string()
            }
        };

        Self::with_hostname(root, &hostname)
    }

    /// Create a handle with an explicit host identity
    pub fn with_hostname(root: impl Into<PathBuf>, hostname: &str) -> Self {
        let root = root.into();
        Self {
            tmp: root.join(TMP_DIR),
            new: root.join(NEW_DIR),
            cur: root.join(CUR_DIR),
            root,
            names: NameGenerator::new(hostname),
        }
    }

    /// Queue root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Staging directory (tmp/)
    pub fn staging_dir(&self) -> &Path {
        &self.tmp
    }

    /// Available directory (new/)
    pub fn available_dir(&self) -> &Path {
        &self.new
    }

    /// Claimed directory (cur/)
    pub fn claimed_dir(&self) -> &Path {
        &self.cur
    }

    /// Ensure all three lifecycle directories exist
    ///
    /// Idempotent: existing directories and their contents are left alone.
    pub async fn create(&self) -> Result<(), QueueError> {
        for dir in [&self.tmp, &self.new, &self.cur] {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| QueueError::io("create", dir, e))?;
        }
        Ok(())
    }

    /// Write a new message and make it available
    ///
    /// The payload is fully written and synced in tmp/ before the rename into
    /// new/, so consumers never observe a partial message.
    ///
    /// # Returns
    ///
    /// The unique name of the new message
    pub async fn enqueue(&self, payload: &[u8]) -> Result<String, QueueError> {
        let name = self
            .names
            .next_name()
            .map_err(|e| QueueError::io("generate name", &self.tmp, e))?;
        let tmp_path = self.tmp.join(&name);
        let new_path = self.new.join(&name);

        if let Err(e) = stage(&tmp_path, payload).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&tmp_path, &new_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(QueueError::io("publish", new_path, e));
        }

        debug!("Enqueued {name} ({} bytes)", payload.len());
        Ok(name)
    }

    /// Names of all available messages, oldest first
    ///
    /// Order follows the timestamp and counter embedded in generated names;
    /// there is no other priority.
    pub async fn list_available(&self) -> Result<Vec<String>, QueueError> {
        let mut names = list_dir(&self.new, "list available").await?;
        names.sort_by(|a, b| compare_names(a, b));
        Ok(names)
    }

    /// Names of all claimed messages, oldest first
    pub async fn list_claimed(&self) -> Result<Vec<String>, QueueError> {
        let mut names = list_dir(&self.cur, "list claimed").await?;
        names.sort_by(|a, b| compare_names(a, b));
        Ok(names)
    }

    /// Number of available messages
    ///
    /// Counts exactly what `list_available()` offers: hidden and non-UTF-8
    /// entries in new/ are not messages. Messages in tmp/ and cur/ are not
    /// part of the queue length.
    pub async fn count(&self) -> Result<usize, QueueError> {
        Ok(list_dir(&self.new, "count").await?.len())
    }

    /// Try to take exclusive ownership of a message
    ///
    /// Losing the rename race is [`ClaimOutcome::Unavailable`], not an error.
    /// A missing cur/ also reports `NotFound` and is surfaced as
    /// [`QueueError::Io`], so a broken layout never looks like an empty queue.
    pub async fn claim(&self, name: &str) -> Result<ClaimOutcome, QueueError> {
        let new_path = self.new.join(name);
        let cur_path = self.cur.join(name);

        match fs::rename(&new_path, &cur_path).await {
            Ok(()) => Ok(ClaimOutcome::Claimed),
            Err(e) if e.kind() == ErrorKind::NotFound => match fs::try_exists(&self.cur).await {
                Ok(true) => Ok(ClaimOutcome::Unavailable),
                Ok(false) => Err(QueueError::io("claim", &self.cur, e)),
                Err(check) => Err(QueueError::io("claim", &self.cur, check)),
            },
            Err(e) => Err(QueueError::io("claim", new_path, e)),
        }
    }

    /// Read a message previously claimed by this caller
    ///
    /// On error the message stays in cur/; nothing is rolled back here.
    pub async fn read_claimed(self: &Arc<Self>, name: &str) -> Result<ClaimedMessage, QueueError> {
        let cur_path = self.cur.join(name);
        let payload = fs::read(&cur_path)
            .await
            .map_err(|e| QueueError::io("read", cur_path, e))?;

        Ok(ClaimedMessage {
            payload,
            claim: Claim {
                maildir: Arc::clone(self),
                name: name.to_string(),
            },
        })
    }

    /// Permanently delete a claimed message
    ///
    /// A message that is already gone counts as finalized.
    pub async fn finalize(&self, name: &str) -> Result<(), QueueError> {
        let cur_path = self.cur.join(name);
        match fs::remove_file(&cur_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Finalize of {name}: already removed");
                Ok(())
            }
            Err(e) => Err(QueueError::io("commit", cur_path, e)),
        }
    }

    /// Move a claimed message back to new/
    pub async fn restore(&self, name: &str) -> Result<(), QueueError> {
        let cur_path = self.cur.join(name);
        let new_path = self.new.join(name);
        fs::rename(&cur_path, &new_path)
            .await
            .map_err(|e| QueueError::io("rollback", cur_path, e))
    }

    /// Move every claimed message back to new/
    ///
    /// Recovery path for claims orphaned by consumers that died before
    /// committing. Only safe when no live consumer holds a claim.
    ///
    /// # Returns
    ///
    /// Number of messages restored
    pub async fn restore_all_claimed(&self) -> Result<usize, QueueError> {
        let mut restored = 0;
        for name in self.list_claimed().await? {
            match self.restore(&name).await {
                Ok(()) => restored += 1,
                Err(QueueError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                    debug!("Restore of {name}: finalized concurrently");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(restored)
    }

    /// Delete every file in tmp/, new/ and cur/
    ///
    /// Not atomic across the set. Every file is attempted; the first real
    /// error is returned afterwards. Files that disappear concurrently are
    /// ignored.
    pub async fn purge_all(&self) -> Result<(), QueueError> {
        let mut first_error = None;

        for dir in [&self.tmp, &self.new, &self.cur] {
            let mut entries = match fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    first_error.get_or_insert(QueueError::io("clear", dir, e));
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        first_error.get_or_insert(QueueError::io("clear", dir, e));
                        break;
                    }
                };

                let path = entry.path();
                match fs::remove_file(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!("Failed to remove {}: {e}", path.display());
                        first_error.get_or_insert(QueueError::io("clear", path, e));
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Payload of a claimed message with its release handle
#[derive(Debug)]
pub struct ClaimedMessage {
    /// Raw message content
    pub payload: Vec<u8>,
    /// Commit/rollback handle
    pub claim: Claim,
}

/// Ownership of one message in cur/
///
/// Dropping a `Claim` without resolving it leaves the message in cur/.
#[derive(Debug)]
#[must_use = "a claim left unresolved keeps the message in cur/"]
pub struct Claim {
    maildir: Arc<Maildir>,
    name: String,
}

impl Claim {
    /// Unique name of the claimed message
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delete the message; processing succeeded
    pub async fn commit(self) -> Result<(), QueueError> {
        self.maildir.finalize(&self.name).await
    }

    /// Return the message to new/ so it can be claimed again
    pub async fn rollback(self) -> Result<(), QueueError> {
        self.maildir.restore(&self.name).await
    }
}

/// Write and sync a file in tmp/
async fn stage(path: &Path, payload: &[u8]) -> Result<(), QueueError> {
    let mut file = fs::File::create(path)
        .await
        .map_err(|e| QueueError::io("stage", path, e))?;
    file.write_all(payload)
        .await
        .map_err(|e| QueueError::io("stage", path, e))?;
    file.sync_all()
        .await
        .map_err(|e| QueueError::io("stage", path, e))?;
    Ok(())
}

/// Visible entry names of a directory
///
/// Hidden entries and names that are not valid UTF-8 are skipped.
async fn list_dir(dir: &Path, op: &'static str) -> Result<Vec<String>, QueueError> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| QueueError::io(op, dir, e))?;

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| QueueError::io(op, dir, e))?
    {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Arc<Maildir>) {
        let temp_dir = TempDir::new().unwrap();
        let maildir = Arc::new(Maildir::with_hostname(temp_dir.path().join("queue"), "test-host"));
        maildir.create().await.unwrap();
        (temp_dir, maildir)
    }

    #[tokio::test]
    async fn test_create_makes_lifecycle_dirs() {
        let (temp_dir, maildir) = setup().await;
        let root = temp_dir.path().join("queue");

        assert!(root.join("tmp").is_dir());
        assert!(root.join("new").is_dir());
        assert!(root.join("cur").is_dir());
        assert_eq!(maildir.available_dir(), root.join("new"));
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let (_temp_dir, maildir) = setup().await;
        maildir.enqueue(b"keep me").await.unwrap();

        maildir.create().await.unwrap();
        assert_eq!(maildir.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_fails_under_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let maildir = Maildir::with_hostname(blocker.join("queue"), "test-host");
        let err = maildir.create().await.unwrap_err();
        assert!(matches!(err, QueueError::Io { op: "create", .. }));
    }

    #[tokio::test]
    async fn test_enqueue_publishes_complete_file() {
        let (_temp_dir, maildir) = setup().await;

        let name = maildir.enqueue(b"{\"hello\":\"world\"}").await.unwrap();

        let content = std::fs::read(maildir.available_dir().join(&name)).unwrap();
        assert_eq!(content, b"{\"hello\":\"world\"}");
        assert!(!maildir.staging_dir().join(&name).exists());
        assert_eq!(std::fs::read_dir(maildir.staging_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_list_available_in_push_order() {
        let (_temp_dir, maildir) = setup().await;
        let mut pushed = Vec::new();
        for i in 0..12 {
            pushed.push(maildir.enqueue(format!("{i}").as_bytes()).await.unwrap());
        }

        assert_eq!(maildir.list_available().await.unwrap(), pushed);
    }

    #[tokio::test]
    async fn test_list_available_skips_hidden_entries() {
        let (_temp_dir, maildir) = setup().await;
        std::fs::write(maildir.available_dir().join(".swap"), b"x").unwrap();
        maildir.enqueue(b"1").await.unwrap();

        assert_eq!(maildir.list_available().await.unwrap().len(), 1);
        assert_eq!(maildir.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_claim_moves_to_cur() {
        let (_temp_dir, maildir) = setup().await;
        let name = maildir.enqueue(b"payload").await.unwrap();

        assert_eq!(maildir.claim(&name).await.unwrap(), ClaimOutcome::Claimed);
        assert!(!maildir.available_dir().join(&name).exists());
        assert!(maildir.claimed_dir().join(&name).exists());
        assert_eq!(maildir.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_second_claim_is_unavailable() {
        let (_temp_dir, maildir) = setup().await;
        let name = maildir.enqueue(b"payload").await.unwrap();

        assert_eq!(maildir.claim(&name).await.unwrap(), ClaimOutcome::Claimed);
        assert_eq!(maildir.claim(&name).await.unwrap(), ClaimOutcome::Unavailable);
    }

    #[tokio::test]
    async fn test_claim_without_cur_dir_is_io_error() {
        let (_temp_dir, maildir) = setup().await;
        let name = maildir.enqueue(b"payload").await.unwrap();
        std::fs::remove_dir(maildir.claimed_dir()).unwrap();

        let err = maildir.claim(&name).await.unwrap_err();
        assert!(matches!(err, QueueError::Io { op: "claim", .. }));
        assert!(maildir.available_dir().join(&name).exists());
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let (_temp_dir, maildir) = setup().await;
        let name = maildir.enqueue(b"contended").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let maildir = Arc::clone(&maildir);
            let name = name.clone();
            handles.push(tokio::spawn(async move { maildir.claim(&name).await.unwrap() }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() == ClaimOutcome::Claimed {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_read_claimed_and_commit() {
        let (_temp_dir, maildir) = setup().await;
        let name = maildir.enqueue(b"payload").await.unwrap();
        maildir.claim(&name).await.unwrap();

        let message = maildir.read_claimed(&name).await.unwrap();
        assert_eq!(message.payload, b"payload");
        assert_eq!(message.claim.name(), name);

        message.claim.commit().await.unwrap();
        assert!(!maildir.claimed_dir().join(&name).exists());
        assert_eq!(maildir.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rollback_makes_message_available_again() {
        let (_temp_dir, maildir) = setup().await;
        let name = maildir.enqueue(b"payload").await.unwrap();
        maildir.claim(&name).await.unwrap();

        let message = maildir.read_claimed(&name).await.unwrap();
        message.claim.rollback().await.unwrap();

        assert_eq!(maildir.list_available().await.unwrap(), vec![name.clone()]);
        assert_eq!(maildir.claim(&name).await.unwrap(), ClaimOutcome::Claimed);
    }

    #[tokio::test]
    async fn test_read_claimed_missing_is_io_error() {
        let (_temp_dir, maildir) = setup().await;
        let err = maildir.read_claimed("1700000000000.0.1.1.nowhere").await.unwrap_err();
        assert!(matches!(err, QueueError::Io { op: "read", .. }));
    }

    #[tokio::test]
    async fn test_finalize_missing_is_ok() {
        let (_temp_dir, maildir) = setup().await;
        maildir.finalize("1700000000000.0.1.1.gone").await.unwrap();
    }

    #[tokio::test]
    async fn test_restore_all_claimed() {
        let (_temp_dir, maildir) = setup().await;
        for i in 0..3 {
            let name = maildir.enqueue(format!("{i}").as_bytes()).await.unwrap();
            maildir.claim(&name).await.unwrap();
        }
        assert_eq!(maildir.count().await.unwrap(), 0);
        assert_eq!(maildir.list_claimed().await.unwrap().len(), 3);

        assert_eq!(maildir.restore_all_claimed().await.unwrap(), 3);
        assert_eq!(maildir.count().await.unwrap(), 3);
        assert!(maildir.list_claimed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purge_all_clears_every_location() {
        let (_temp_dir, maildir) = setup().await;
        maildir.enqueue(b"available").await.unwrap();
        let claimed = maildir.enqueue(b"claimed").await.unwrap();
        maildir.claim(&claimed).await.unwrap();
        std::fs::write(maildir.staging_dir().join("half-written"), b"{").unwrap();

        maildir.purge_all().await.unwrap();

        for dir in [maildir.staging_dir(), maildir.available_dir(), maildir.claimed_dir()] {
            assert_eq!(std::fs::read_dir(dir).unwrap().count(), 0);
        }
        assert_eq!(maildir.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_all_reports_missing_directory() {
        let (_temp_dir, maildir) = setup().await;
        maildir.enqueue(b"x").await.unwrap();
        std::fs::remove_dir(maildir.claimed_dir()).unwrap();

        let err = maildir.purge_all().await.unwrap_err();
        assert!(matches!(err, QueueError::Io { op: "clear", .. }));
        // Other directories were still emptied
        assert_eq!(maildir.count().await.unwrap(), 0);
    }
}
