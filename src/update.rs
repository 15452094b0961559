//! The version-check side channel.
//!
//! The engine never fetches release information itself. When the version
//! guard decides a check is due it fires [`UpdateChannel::request_check`]
//! and moves on; whatever sits behind the trait (an app-store poller, a
//! release-feed fetcher) eventually learns the installed software's age and
//! records [`StaleSince`](crate::store::StateKey::StaleSince) through the
//! shared state store. The next cycle picks the signal up from there.

use std::sync::Mutex;

use crate::clock::Timestamp;

/// Requests an out-of-band check of whether newer software exists.
pub trait UpdateChannel: Send + Sync {
    /// Ask for a version check. Fire-and-forget: any result arrives later
    /// through the state store, never through a return value.
    fn request_check(&self, now: Timestamp);
}

// ── NullChannel ─────────────────────────────────────────────────────────

/// Discards check requests. For deployments where version information is
/// maintained entirely by an external process.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullChannel;

impl UpdateChannel for NullChannel {
    fn request_check(&self, now: Timestamp) {
        tracing::debug!(at = %now, "version check requested, no channel configured");
    }
}

// ── VecChannel ──────────────────────────────────────────────────────────

/// Records check requests for assertions in tests.
#[derive(Debug, Default)]
pub struct VecChannel {
    requests: Mutex<Vec<Timestamp>>,
}

impl VecChannel {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Get all recorded request instants.
    pub fn requests(&self) -> Vec<Timestamp> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of recorded requests.
    pub fn len(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UpdateChannel for VecChannel {
    fn request_check(&self, now: Timestamp) {
        self.requests.lock().unwrap().push(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_channel_records_requests() {
        let channel = VecChannel::new();
        channel.request_check(Timestamp::from_millis(10));
        channel.request_check(Timestamp::from_millis(20));
        assert_eq!(
            channel.requests(),
            vec![Timestamp::from_millis(10), Timestamp::from_millis(20)]
        );
    }

    #[test]
    fn null_channel_is_silent() {
        NullChannel.request_check(Timestamp::from_millis(1));
    }
}
