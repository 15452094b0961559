//! Persisted engine state: the staleness signal and the debounce timestamps.
//!
//! Two adapters serve different deployments:
//!
//! - [`MemoryStateStore`] — concurrent hashmap (DashMap), lost on exit;
//!   for tests and ephemeral runs
//! - [`DurableStateStore`] — ACID transactions (redb); debounce state must
//!   survive restarts or every reboot would re-raise the staleness warning
//!
//! Absence is meaningful: `Ok(None)` says the event never happened.
//! Timestamp zero is a real instant (the epoch), never an "unset" sentinel.

pub mod durable;
pub mod mem;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::error::StoreError;

pub use durable::DurableStateStore;
pub use mem::MemoryStateStore;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Keys of the engine's persisted timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateKey {
    /// When the installed software first became outdated. Absent while the
    /// installation is current. Written by external collaborators (an
    /// update channel, the ops CLI); the engine only reads it.
    StaleSince,
    /// When the version guard last requested an update check.
    LastVersionCheck,
    /// When the version guard last raised a staleness warning.
    LastStaleWarning,
}

impl StateKey {
    /// Stable storage name for this key.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StaleSince => "stale_since",
            Self::LastVersionCheck => "last_version_check",
            Self::LastStaleWarning => "last_stale_warning",
        }
    }

    /// All keys, for inspection tooling.
    pub const fn all() -> [StateKey; 3] {
        [Self::StaleSince, Self::LastVersionCheck, Self::LastStaleWarning]
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyed access to the persisted timestamps.
///
/// Implementations are shared between the engine and the external
/// collaborators that maintain [`StateKey::StaleSince`], so they must be
/// callable from multiple threads. The engine itself serializes its own
/// read-then-write cycles; the store does not.
pub trait StateStore: Send + Sync {
    /// Read a timestamp. `Ok(None)` if the event never happened.
    fn get(&self, key: StateKey) -> StoreResult<Option<Timestamp>>;

    /// Record a timestamp, replacing any previous value.
    fn put(&self, key: StateKey, at: Timestamp) -> StoreResult<()>;

    /// Forget a timestamp. Returns whether it was present.
    fn remove(&self, key: StateKey) -> StoreResult<bool>;
}
