//! Time-gated policy: grace periods, debounce gates, and the freshness ladder.
//!
//! Two pure questions drive every time-based decision in the engine:
//!
//! - **Has a grace period elapsed?** — [`has_elapsed`]. An absent reference
//!   instant means the period never started, so the answer is no.
//! - **Is a periodic side effect due again?** — [`is_due`]. An absent
//!   last-fired instant means it never fired, so it is due immediately.
//!
//! [`GraceSchedule`] stacks three grace periods into the escalation ladder
//! the version guard walks, and [`FreshnessStage`] names its rungs. Both
//! comparisons are strict: at exactly `reference + period` nothing has
//! elapsed yet.

use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::Timestamp;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors specific to gate and schedule construction.
#[derive(Debug, Error, Diagnostic)]
pub enum GateError {
    #[error("{name} must be a positive duration")]
    #[diagnostic(
        code(doseguard::gate::zero_duration),
        help("Zero-length grace periods and intervals would fire their effect on every cycle.")
    )]
    ZeroDuration { name: &'static str },

    #[error(
        "grace ladder must strictly increase: warn {warn_after:?}, cap {cap_iob_after:?}, disable {disable_loop_after:?}"
    )]
    #[diagnostic(
        code(doseguard::gate::ladder_not_increasing),
        help(
            "Each rung escalates the previous one, so the schedule needs \
             warn_after < cap_iob_after < disable_loop_after."
        )
    )]
    LadderNotIncreasing {
        warn_after: Duration,
        cap_iob_after: Duration,
        disable_loop_after: Duration,
    },

    #[error("{name} of {value} {unit} is too large to represent")]
    #[diagnostic(
        code(doseguard::gate::duration_out_of_range),
        help("Durations are kept as whole seconds in 64 bits; use a smaller value.")
    )]
    DurationOutOfRange {
        name: &'static str,
        value: u64,
        unit: &'static str,
    },
}

/// Result type for gate operations.
pub type GateResult<T> = std::result::Result<T, GateError>;

// ---------------------------------------------------------------------------
// Pure gates
// ---------------------------------------------------------------------------

/// Whether `grace` has fully elapsed since `reference_since`, as of `now`.
///
/// `None` means the reference event never happened, so no grace period can
/// have elapsed. Strict comparison: false at exactly `reference + grace`.
pub fn has_elapsed(reference_since: Option<Timestamp>, grace: Duration, now: Timestamp) -> bool {
    match reference_since {
        Some(since) => now > since + grace,
        None => false,
    }
}

/// Whether a periodic side effect is due again, as of `now`.
///
/// `None` means it never fired, so it is due immediately. Strict
/// comparison: false at exactly `last_fired + interval`.
pub fn is_due(last_fired: Option<Timestamp>, interval: Duration, now: Timestamp) -> bool {
    match last_fired {
        Some(fired) => now > fired + interval,
        None => true,
    }
}

// ---------------------------------------------------------------------------
// Freshness ladder
// ---------------------------------------------------------------------------

/// Rungs of the staleness escalation ladder, least to most severe.
///
/// The derived ordering is load-bearing: effects for a rung also apply at
/// every rung above it (`stage >= Old` caps insulin-on-board even when the
/// stage is [`FreshnessStage::VeryOld`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FreshnessStage {
    /// No staleness signal, or still inside the first grace period.
    Fresh,
    /// Past the warning grace period: nag, but do not restrict.
    Warning,
    /// Past the cap grace period: max insulin-on-board drops to zero.
    Old,
    /// Past the disable grace period: closed-loop operation is withdrawn.
    VeryOld,
}

impl std::fmt::Display for FreshnessStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::Warning => write!(f, "warning"),
            Self::Old => write!(f, "old"),
            Self::VeryOld => write!(f, "very old"),
        }
    }
}

/// The escalation ladder: how long after a staleness signal each effect
/// kicks in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraceSchedule {
    /// Warnings begin once this much time has passed.
    pub warn_after: Duration,
    /// Max insulin-on-board is capped to zero past this point.
    pub cap_iob_after: Duration,
    /// Closed-loop operation is disallowed past this point.
    pub disable_loop_after: Duration,
}

impl GraceSchedule {
    /// Build a schedule from whole days, the usual configuration unit.
    ///
    /// Rejects day counts too large to hold as seconds, and any ladder
    /// [`validate`](Self::validate) refuses.
    pub fn from_days(warn: u64, cap: u64, disable: u64) -> GateResult<Self> {
        let schedule = Self {
            warn_after: checked_days("warn_after", warn)?,
            cap_iob_after: checked_days("cap_iob_after", cap)?,
            disable_loop_after: checked_days("disable_loop_after", disable)?,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Check that every rung is positive and strictly later than the
    /// previous one.
    pub fn validate(&self) -> GateResult<()> {
        if self.warn_after.is_zero() {
            return Err(GateError::ZeroDuration { name: "warn_after" });
        }
        if self.warn_after < self.cap_iob_after && self.cap_iob_after < self.disable_loop_after {
            Ok(())
        } else {
            Err(GateError::LadderNotIncreasing {
                warn_after: self.warn_after,
                cap_iob_after: self.cap_iob_after,
                disable_loop_after: self.disable_loop_after,
            })
        }
    }

    /// Stage of a staleness signal first seen at `stale_since`, as of `now`.
    ///
    /// Absent signal means [`FreshnessStage::Fresh`].
    pub fn stage(&self, stale_since: Option<Timestamp>, now: Timestamp) -> FreshnessStage {
        if has_elapsed(stale_since, self.disable_loop_after, now) {
            FreshnessStage::VeryOld
        } else if has_elapsed(stale_since, self.cap_iob_after, now) {
            FreshnessStage::Old
        } else if has_elapsed(stale_since, self.warn_after, now) {
            FreshnessStage::Warning
        } else {
            FreshnessStage::Fresh
        }
    }
}

impl Default for GraceSchedule {
    /// 30 / 60 / 90 days.
    fn default() -> Self {
        Self {
            warn_after: days(30),
            cap_iob_after: days(60),
            disable_loop_after: days(90),
        }
    }
}

/// Whole days as a [`Duration`], refusing counts whose seconds overflow.
pub fn checked_days(name: &'static str, count: u64) -> GateResult<Duration> {
    match count.checked_mul(86_400) {
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Err(GateError::DurationOutOfRange {
            name,
            value: count,
            unit: "days",
        }),
    }
}

/// Whole hours as a [`Duration`], refusing counts whose seconds overflow.
pub fn checked_hours(name: &'static str, count: u64) -> GateResult<Duration> {
    match count.checked_mul(3_600) {
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Err(GateError::DurationOutOfRange {
            name,
            value: count,
            unit: "hours",
        }),
    }
}

const fn days(n: u64) -> Duration {
    Duration::from_secs(n * 86_400)
}
