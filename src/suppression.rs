//! Write-suppression tracker (C2, spec §4.2): remembers writes the sync
//! engine itself just made so the next poll of that client doesn't mistake
//! its own echo for a genuine user edit.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::domain::models::ClientName;

/// Keyed by `(book_id, client)`. TTL-bounded so a client that never gets
/// polled again doesn't leak memory forever.
pub struct SuppressionTracker {
    entries: DashMap<(String, ClientName), Instant>,
    ttl: Duration,
}

impl SuppressionTracker {
    pub fn new(ttl_seconds: u64) -> Self {
        SuppressionTracker {
            entries: DashMap::new(),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Record that the engine itself just wrote to `client` for `book_id`.
    pub fn record(&self, book_id: &str, client: ClientName) {
        self.entries
            .insert((book_id.to_string(), client), Instant::now());
    }

    /// True when the engine wrote to `client` for `book_id` within the TTL
    /// window — i.e. the next poll of that client is almost certainly our
    /// own echo, not a new user edit.
    pub fn is_own_write(&self, book_id: &str, client: ClientName) -> bool {
        let key = (book_id.to_string(), client);
        let Some(entry) = self.entries.get(&key) else {
            return false;
        };
        if entry.elapsed() > self.ttl {
            drop(entry);
            self.entries.remove(&key);
            return false;
        }
        true
    }

    /// Drop all entries past their TTL. Called periodically by the trigger
    /// layer's tick (C7) rather than on every lookup, to keep `is_own_write`
    /// cheap.
    pub fn evict_expired(&self) {
        self.entries.retain(|_, v| v.elapsed() <= self.ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_write_is_recognized_as_own() {
        let tracker = SuppressionTracker::new(60);
        tracker.record("book1", ClientName::Abs);
        assert!(tracker.is_own_write("book1", ClientName::Abs));
        assert!(tracker.is_own_write("book1", ClientName::Abs));
    }

    #[test]
    fn unrelated_client_is_not_suppressed() {
        let tracker = SuppressionTracker::new(60);
        tracker.record("book1", ClientName::Abs);
        assert!(!tracker.is_own_write("book1", ClientName::KoReaderSync));
    }

    #[test]
    fn expired_entries_are_not_suppressed() {
        let tracker = SuppressionTracker::new(0);
        tracker.record("book1", ClientName::Abs);
        std::thread::sleep(Duration::from_millis(5));
        assert!(!tracker.is_own_write("book1", ClientName::Abs));
    }
}
