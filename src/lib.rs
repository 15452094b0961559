// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # doseguard
//!
//! Constraint aggregation engine for an automated insulin-dosing controller:
//! independent contributors tighten safety-critical dosing parameters toward
//! the most conservative value, with full provenance for every restriction.
//!
//! ## Architecture
//!
//! - **Constraints** (`constraint`): narrowing-only values — booleans go `true → false`,
//!   numeric ceilings only decrease, every tightening records who and why
//! - **Contributors** (`contributor`): the capability trait; shipped impls are the
//!   version-freshness guard (`freshness`) and caregiver therapy limits (`limits`)
//! - **Gates** (`gate`): pure grace-period and debounce arithmetic on explicit timestamps
//! - **Aggregation** (`checker`): one decision cycle runs every contributor in order
//! - **Seams** (`clock`, `store`, `notify`, `update`): time, persisted state,
//!   alert delivery, and version discovery live behind traits
//!
//! ## Library usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use doseguard::checker::ConstraintsChecker;
//! use doseguard::clock::{ManualClock, Timestamp};
//! use doseguard::freshness::{FreshnessPolicy, VersionGuard};
//! use doseguard::limits::{TherapyLimits, TherapySettings};
//! use doseguard::notify::VecSink;
//! use doseguard::store::MemoryStateStore;
//! use doseguard::update::VecChannel;
//!
//! let clock = ManualClock::at(Timestamp::from_millis(1_700_000_000_000));
//! let store = Arc::new(MemoryStateStore::new());
//! let guard = VersionGuard::new(
//!     FreshnessPolicy::default(),
//!     Arc::new(clock),
//!     store,
//!     Arc::new(VecSink::new()),
//!     Arc::new(VecChannel::new()),
//! )
//! .unwrap();
//!
//! let mut checker = ConstraintsChecker::new();
//! checker.register(Box::new(guard));
//! checker.register(Box::new(TherapyLimits::new(TherapySettings::default())));
//!
//! let limits = checker.evaluate();
//! assert!(limits.closed_loop_allowed.value());
//! assert_eq!(limits.max_iob.value(), 3.0);
//! ```

pub mod checker;
pub mod clock;
pub mod config;
pub mod constraint;
pub mod contributor;
pub mod error;
pub mod freshness;
pub mod gate;
pub mod limits;
pub mod notify;
pub mod store;
pub mod update;
