//! The version-freshness contributor.
//!
//! Running an outdated controller is a safety risk: dosing fixes and pump
//! compatibility updates never reach it. The guard escalates pressure as
//! the installed software ages — nag first, then cap insulin-on-board at
//! zero, finally withdraw closed-loop permission. The staleness signal
//! itself arrives from outside through the state store; this contributor
//! only walks the [`GraceSchedule`] ladder and runs the two debounce gates
//! that keep its side effects periodic instead of per-cycle.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, Timestamp};
use crate::constraint::Constraint;
use crate::contributor::{Contributor, ContributorId};
use crate::gate::{self, FreshnessStage, GateError, GateResult, GraceSchedule};
use crate::notify::{Alert, AlertKind, AlertSink, Severity};
use crate::store::{StateKey, StateStore};
use crate::update::UpdateChannel;

/// Identity recorded against every narrowing the guard makes.
pub const VERSION_GUARD: ContributorId = ContributorId::new("version-guard");

/// Reason attached when max insulin-on-board is capped.
pub const REASON_OLD: &str = "old version";
/// Reason attached when closed-loop permission is withdrawn.
pub const REASON_VERY_OLD: &str = "very old version";

const DAY: Duration = Duration::from_secs(86_400);

// ── Policy ──────────────────────────────────────────────────────────────

/// When the guard escalates, and how often its side effects may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessPolicy {
    /// The escalation ladder.
    pub schedule: GraceSchedule,
    /// Minimum spacing between update-check requests.
    pub check_every: Duration,
    /// Minimum spacing between staleness warnings.
    pub warn_every: Duration,
}

impl FreshnessPolicy {
    /// Check the ladder and both gate intervals.
    pub fn validate(&self) -> GateResult<()> {
        self.schedule.validate()?;
        if self.check_every.is_zero() {
            return Err(GateError::ZeroDuration {
                name: "check_every",
            });
        }
        if self.warn_every.is_zero() {
            return Err(GateError::ZeroDuration { name: "warn_every" });
        }
        Ok(())
    }
}

impl Default for FreshnessPolicy {
    /// 30/60/90-day ladder, one check and at most one warning per day.
    fn default() -> Self {
        Self {
            schedule: GraceSchedule::default(),
            check_every: DAY,
            warn_every: DAY,
        }
    }
}

// ── VersionGuard ────────────────────────────────────────────────────────

/// Contributor that restricts dosing as the installed software goes stale.
///
/// Owns the only write access to the two debounce keys
/// ([`StateKey::LastVersionCheck`], [`StateKey::LastStaleWarning`]); the
/// staleness signal itself is read-only from here.
pub struct VersionGuard {
    policy: FreshnessPolicy,
    clock: Arc<dyn Clock>,
    store: Arc<dyn StateStore>,
    alerts: Arc<dyn AlertSink>,
    updates: Arc<dyn UpdateChannel>,
}

impl VersionGuard {
    /// Build a guard. Fails if the policy is internally inconsistent.
    pub fn new(
        policy: FreshnessPolicy,
        clock: Arc<dyn Clock>,
        store: Arc<dyn StateStore>,
        alerts: Arc<dyn AlertSink>,
        updates: Arc<dyn UpdateChannel>,
    ) -> GateResult<Self> {
        policy.validate()?;
        Ok(Self {
            policy,
            clock,
            store,
            alerts,
            updates,
        })
    }

    /// The active policy.
    pub fn policy(&self) -> &FreshnessPolicy {
        &self.policy
    }

    /// Rung of the escalation ladder as of `now`.
    pub fn stage_at(&self, now: Timestamp) -> FreshnessStage {
        self.policy
            .schedule
            .stage(self.read_or_absent(StateKey::StaleSince), now)
    }

    /// Read a timestamp, degrading to "never happened" if the store fails.
    fn read_or_absent(&self, key: StateKey) -> Option<Timestamp> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "state read failed, treating as absent");
                None
            }
        }
    }

    /// Record a timestamp, logging and dropping the write if the store fails.
    fn write_or_log(&self, key: StateKey, at: Timestamp) {
        if let Err(e) = self.store.put(key, at) {
            tracing::warn!(key = %key, error = %e, "state write failed, dropping");
        }
    }

    /// Request an out-of-band version check, at most once per interval.
    ///
    /// Runs regardless of stage: staleness can only be discovered by
    /// checking.
    fn run_check_gate(&self, now: Timestamp) {
        let last = self.read_or_absent(StateKey::LastVersionCheck);
        if gate::is_due(last, self.policy.check_every, now) {
            self.write_or_log(StateKey::LastVersionCheck, now);
            self.updates.request_check(now);
            tracing::debug!(at = %now, "update check requested");
        }
    }

    /// Raise the staleness warning, at most once per interval, once the
    /// warning grace period has elapsed.
    fn run_warn_gate(&self, stale_since: Option<Timestamp>, now: Timestamp) {
        if !gate::has_elapsed(stale_since, self.policy.schedule.warn_after, now) {
            return;
        }
        let last = self.read_or_absent(StateKey::LastStaleWarning);
        if !gate::is_due(last, self.policy.warn_every, now) {
            return;
        }
        self.write_or_log(StateKey::LastStaleWarning, now);
        let alert = stale_alert(stale_since, now);
        self.alerts.raise(&alert);
        tracing::info!(at = %now, "staleness warning raised");
    }
}

impl Contributor for VersionGuard {
    fn id(&self) -> ContributorId {
        VERSION_GUARD
    }

    fn apply_closed_loop_allowed(&mut self, constraint: &mut Constraint<bool>) {
        let now = self.clock.now();
        // One staleness snapshot per evaluation, shared by the warn gate
        // and the narrowing decision.
        let stale_since = self.read_or_absent(StateKey::StaleSince);
        self.run_check_gate(now);
        self.run_warn_gate(stale_since, now);
        if self.policy.schedule.stage(stale_since, now) == FreshnessStage::VeryOld {
            constraint.narrow(false, REASON_VERY_OLD, self.id());
        }
    }

    fn apply_max_iob(&mut self, constraint: &mut Constraint<f64>) {
        let now = self.clock.now();
        if self.stage_at(now) >= FreshnessStage::Old {
            constraint.narrow(0.0, REASON_OLD, self.id());
        }
    }
}

impl std::fmt::Debug for VersionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionGuard")
            .field("policy", &self.policy)
            .finish()
    }
}

fn stale_alert(stale_since: Option<Timestamp>, now: Timestamp) -> Alert {
    // run_warn_gate only calls this once has_elapsed held, so stale_since
    // is present; the fallback is unreachable.
    let days = stale_since
        .map(|since| now.since(since).as_secs() / 86_400)
        .unwrap_or(0);
    Alert::new(
        AlertKind::StaleVersion,
        Severity::Normal,
        format!("new software version available for {days} days; update soon to keep automated dosing"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::StoreError;
    use crate::notify::VecSink;
    use crate::store::{MemoryStateStore, StoreResult};
    use crate::update::VecChannel;

    struct Fixture {
        guard: VersionGuard,
        clock: ManualClock,
        store: Arc<MemoryStateStore>,
        alerts: Arc<VecSink>,
        updates: Arc<VecChannel>,
    }

    fn fixture() -> Fixture {
        // Start well past the epoch so grace arithmetic has room.
        let clock = ManualClock::at(Timestamp::from_millis(1_000 * 86_400 * 1_000));
        let store = Arc::new(MemoryStateStore::new());
        let alerts = Arc::new(VecSink::new());
        let updates = Arc::new(VecChannel::new());
        let guard = VersionGuard::new(
            FreshnessPolicy::default(),
            Arc::new(clock.clone()),
            store.clone(),
            alerts.clone(),
            updates.clone(),
        )
        .unwrap();
        Fixture {
            guard,
            clock,
            store,
            alerts,
            updates,
        }
    }

    fn mark_stale(f: &Fixture, days_ago: u64) {
        let since = Timestamp::from_millis(
            f.clock.now().as_millis() - days_ago * 86_400 * 1_000,
        );
        f.store.put(StateKey::StaleSince, since).unwrap();
    }

    #[test]
    fn fresh_install_narrows_nothing() {
        let mut f = fixture();
        let mut allowed = Constraint::<bool>::unrestricted();
        let mut iob = Constraint::<f64>::unrestricted();

        f.guard.apply_closed_loop_allowed(&mut allowed);
        f.guard.apply_max_iob(&mut iob);

        assert!(allowed.value());
        assert!(allowed.provenance().is_empty());
        assert_eq!(iob.value(), f64::INFINITY);
        assert!(f.alerts.is_empty());
    }

    #[test]
    fn check_gate_fires_once_per_interval() {
        let mut f = fixture();
        let mut allowed = Constraint::<bool>::unrestricted();

        f.guard.apply_closed_loop_allowed(&mut allowed);
        assert_eq!(f.updates.len(), 1);
        assert_eq!(
            f.store.get(StateKey::LastVersionCheck).unwrap(),
            Some(f.clock.now())
        );

        // Same day: not due again.
        f.clock.advance(Duration::from_secs(3_600));
        f.guard.apply_closed_loop_allowed(&mut Constraint::unrestricted());
        assert_eq!(f.updates.len(), 1);

        // Past the interval: due again.
        f.clock.advance(Duration::from_secs(86_400));
        f.guard.apply_closed_loop_allowed(&mut Constraint::unrestricted());
        assert_eq!(f.updates.len(), 2);
    }

    #[test]
    fn warning_stage_raises_one_alert() {
        let mut f = fixture();
        mark_stale(&f, 35);

        let mut allowed = Constraint::<bool>::unrestricted();
        f.guard.apply_closed_loop_allowed(&mut allowed);

        assert!(allowed.value(), "warning stage must not restrict");
        assert_eq!(f.alerts.len(), 1);
        assert_eq!(
            f.store.get(StateKey::LastStaleWarning).unwrap(),
            Some(f.clock.now())
        );

        // Immediately after: debounced.
        f.guard.apply_closed_loop_allowed(&mut Constraint::unrestricted());
        assert_eq!(f.alerts.len(), 1);
    }

    #[test]
    fn warning_message_counts_days_since_stale() {
        let mut f = fixture();
        mark_stale(&f, 35);

        f.guard.apply_closed_loop_allowed(&mut Constraint::unrestricted());
        let alerts = f.alerts.alerts();
        assert!(
            alerts[0].message.contains("35 days"),
            "message = {}",
            alerts[0].message
        );
    }

    #[test]
    fn warning_repeats_after_interval() {
        let mut f = fixture();
        mark_stale(&f, 35);

        f.guard.apply_closed_loop_allowed(&mut Constraint::unrestricted());
        f.clock.advance(Duration::from_secs(86_400 + 1));
        f.guard.apply_closed_loop_allowed(&mut Constraint::unrestricted());
        assert_eq!(f.alerts.len(), 2);
    }

    #[test]
    fn warning_continues_past_old_stage() {
        let mut f = fixture();
        mark_stale(&f, 95);

        f.guard.apply_closed_loop_allowed(&mut Constraint::unrestricted());
        assert_eq!(f.alerts.len(), 1);
    }

    #[test]
    fn old_stage_caps_iob_only() {
        let mut f = fixture();
        mark_stale(&f, 65);

        let mut allowed = Constraint::<bool>::unrestricted();
        let mut iob = Constraint::<f64>::unrestricted();
        f.guard.apply_closed_loop_allowed(&mut allowed);
        f.guard.apply_max_iob(&mut iob);

        assert!(allowed.value(), "old stage leaves the loop running");
        assert_eq!(iob.value(), 0.0);
        assert_eq!(iob.reasons(), vec![REASON_OLD]);
        assert!(iob.narrowed_by(VERSION_GUARD));
    }

    #[test]
    fn very_old_stage_disables_loop_and_caps_iob() {
        let mut f = fixture();
        mark_stale(&f, 95);

        let mut allowed = Constraint::<bool>::unrestricted();
        let mut iob = Constraint::<f64>::unrestricted();
        f.guard.apply_closed_loop_allowed(&mut allowed);
        f.guard.apply_max_iob(&mut iob);

        assert!(!allowed.value());
        assert_eq!(allowed.reasons(), vec![REASON_VERY_OLD]);
        assert_eq!(iob.value(), 0.0);
        assert_eq!(iob.reasons(), vec![REASON_OLD]);
    }

    #[test]
    fn stage_at_walks_ladder() {
        let f = fixture();
        assert_eq!(f.guard.stage_at(f.clock.now()), FreshnessStage::Fresh);
        mark_stale(&f, 35);
        assert_eq!(f.guard.stage_at(f.clock.now()), FreshnessStage::Warning);
        mark_stale(&f, 65);
        assert_eq!(f.guard.stage_at(f.clock.now()), FreshnessStage::Old);
        mark_stale(&f, 95);
        assert_eq!(f.guard.stage_at(f.clock.now()), FreshnessStage::VeryOld);
    }

    #[test]
    fn zero_intervals_rejected() {
        let clock = ManualClock::default();
        let policy = FreshnessPolicy {
            check_every: Duration::ZERO,
            ..FreshnessPolicy::default()
        };
        let result = VersionGuard::new(
            policy,
            Arc::new(clock),
            Arc::new(MemoryStateStore::new()),
            Arc::new(VecSink::new()),
            Arc::new(VecChannel::new()),
        );
        assert!(result.is_err());
    }

    /// Store whose every operation fails, for degradation tests.
    struct BrokenStore;

    impl StateStore for BrokenStore {
        fn get(&self, _key: StateKey) -> StoreResult<Option<Timestamp>> {
            Err(StoreError::Redb {
                message: "simulated failure".into(),
            })
        }

        fn put(&self, _key: StateKey, _at: Timestamp) -> StoreResult<()> {
            Err(StoreError::Redb {
                message: "simulated failure".into(),
            })
        }

        fn remove(&self, _key: StateKey) -> StoreResult<bool> {
            Err(StoreError::Redb {
                message: "simulated failure".into(),
            })
        }
    }

    #[test]
    fn broken_store_degrades_to_fresh() {
        let clock = ManualClock::at(Timestamp::from_millis(86_400_000_000));
        let mut guard = VersionGuard::new(
            FreshnessPolicy::default(),
            Arc::new(clock),
            Arc::new(BrokenStore),
            Arc::new(VecSink::new()),
            Arc::new(VecChannel::new()),
        )
        .unwrap();

        let mut allowed = Constraint::<bool>::unrestricted();
        let mut iob = Constraint::<f64>::unrestricted();
        guard.apply_closed_loop_allowed(&mut allowed);
        guard.apply_max_iob(&mut iob);

        // Unreadable state never happened; nothing narrows, nothing panics.
        assert!(allowed.value());
        assert_eq!(iob.value(), f64::INFINITY);
    }
}
