//! Unique message names
//!
//! Names follow the layout `{millis}.{counter}.{pid}.{rand_hi}{rand_lo}.{hostname}`.
//! No field alone is unique; together they avoid collisions between producers
//! without any shared state, including across restarts where the counter
//! starts again at zero.

use rand::RngCore;
use rand::rngs::OsRng;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Per-instance generator of unique message names
#[derive(Debug)]
pub struct NameGenerator {
    hostname: String,
    pid: u32,
    pushed: AtomicU64,
}

impl NameGenerator {
    /// Create a generator for the given host name
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: escape_hostname(hostname),
            pid: std::process::id(),
            pushed: AtomicU64::new(0),
        }
    }

    /// Generate the next name
    ///
    /// Fails only if the operating system random source is unavailable.
    pub fn next_name(&self) -> std::io::Result<String> {
        let time = chrono::Utc::now().timestamp_millis();
        let counter = self.pushed.fetch_add(1, AtomicOrdering::Relaxed);

        let mut random = [0u8; 8];
        OsRng.try_fill_bytes(&mut random)?;
        let hi = u32::from_be_bytes([random[0], random[1], random[2], random[3]]);
        let lo = u32::from_be_bytes([random[4], random[5], random[6], random[7]]);

        Ok(format!(
            "{time}.{counter}.{}.{hi}{lo}.{}",
            self.pid, self.hostname
        ))
    }

    /// Number of names handed out by this generator
    pub fn pushed(&self) -> u64 {
        self.pushed.load(AtomicOrdering::Relaxed)
    }
}

/// Escape characters that cannot appear in a single path component
///
/// Uses the maildir convention of octal escapes for `/` and `:`.
fn escape_hostname(hostname: &str) -> String {
    let mut escaped = String::with_capacity(hostname.len());
    for c in hostname.chars() {
        match c {
            '/' => escaped.push_str("\\057"),
            ':' => escaped.push_str("\\072"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Extract `(millis, counter)` from a generated name
fn order_key(name: &str) -> Option<(u64, u64)> {
    let mut fields = name.split('.');
    let millis = fields.next()?.parse().ok()?;
    let counter = fields.next()?.parse().ok()?;
    Some((millis, counter))
}

/// Delivery order for names in `new/`
///
/// Generated names sort by timestamp then counter; names written by other
/// tools sort after them, lexically.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    match (order_key(a), order_key(b)) {
        (Some(ka), Some(kb)) => ka.cmp(&kb).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
