//! Caregiver therapy limits.
//!
//! The simplest contributor: a master switch for automated dosing and a
//! hard ceiling on insulin-on-board, both set by whoever configures
//! therapy. The values arrive from configuration — external input — so a
//! malformed ceiling (NaN, negative) is rejected here with a log line
//! instead of ever shaping a dose.

use serde::{Deserialize, Serialize};

use crate::constraint::Constraint;
use crate::contributor::{Contributor, ContributorId};

/// Identity recorded against every narrowing these limits make.
pub const THERAPY_LIMITS: ContributorId = ContributorId::new("therapy-limits");

/// Reason attached when the master switch is off.
pub const REASON_LOOP_DISABLED: &str = "automated dosing disabled in therapy settings";
/// Reason attached when the ceiling applies.
pub const REASON_MAX_IOB: &str = "therapy max IOB";

/// Caregiver-set dosing limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TherapySettings {
    /// Whether fully automated dosing is enabled at all.
    pub automated_dosing: bool,
    /// Hard ceiling on insulin-on-board, in insulin units. `+∞` means no
    /// ceiling; NaN and negative values are malformed and never applied.
    pub max_iob_units: f64,
}

impl Default for TherapySettings {
    fn default() -> Self {
        Self {
            automated_dosing: true,
            max_iob_units: 3.0,
        }
    }
}

/// Contributor enforcing [`TherapySettings`].
#[derive(Debug, Clone)]
pub struct TherapyLimits {
    settings: TherapySettings,
}

impl TherapyLimits {
    pub fn new(settings: TherapySettings) -> Self {
        Self { settings }
    }

    /// The limits being enforced.
    pub fn settings(&self) -> &TherapySettings {
        &self.settings
    }
}

impl Contributor for TherapyLimits {
    fn id(&self) -> ContributorId {
        THERAPY_LIMITS
    }

    fn apply_closed_loop_allowed(&mut self, constraint: &mut Constraint<bool>) {
        if !self.settings.automated_dosing {
            constraint.narrow(false, REASON_LOOP_DISABLED, self.id());
        }
    }

    fn apply_max_iob(&mut self, constraint: &mut Constraint<f64>) {
        let ceiling = self.settings.max_iob_units;
        if ceiling.is_nan() || ceiling < 0.0 {
            tracing::warn!(ceiling, "malformed therapy max IOB, declining to narrow");
            return;
        }
        constraint.narrow(ceiling, REASON_MAX_IOB, self.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(settings: TherapySettings) -> TherapyLimits {
        TherapyLimits::new(settings)
    }

    #[test]
    fn switch_off_withdraws_loop() {
        let mut l = limits(TherapySettings {
            automated_dosing: false,
            ..TherapySettings::default()
        });
        let mut allowed = Constraint::<bool>::unrestricted();
        l.apply_closed_loop_allowed(&mut allowed);
        assert!(!allowed.value());
        assert_eq!(allowed.reasons(), vec![REASON_LOOP_DISABLED]);
    }

    #[test]
    fn switch_on_leaves_loop_alone() {
        let mut l = limits(TherapySettings::default());
        let mut allowed = Constraint::<bool>::unrestricted();
        l.apply_closed_loop_allowed(&mut allowed);
        assert!(allowed.value());
        assert!(!allowed.is_restricted());
    }

    #[test]
    fn ceiling_applies_with_reason() {
        let mut l = limits(TherapySettings::default());
        let mut iob = Constraint::<f64>::unrestricted();
        l.apply_max_iob(&mut iob);
        assert_eq!(iob.value(), 3.0);
        assert_eq!(iob.reasons(), vec![REASON_MAX_IOB]);
        assert!(iob.narrowed_by(THERAPY_LIMITS));
    }

    #[test]
    fn tighter_existing_cap_wins() {
        let mut l = limits(TherapySettings::default());
        let mut iob = Constraint::<f64>::unrestricted();
        iob.narrow(1.5, "pump hard limit", ContributorId::new("pump"));
        l.apply_max_iob(&mut iob);
        assert_eq!(iob.value(), 1.5);
        assert_eq!(iob.provenance().len(), 1);
    }

    #[test]
    fn nan_ceiling_declines_to_narrow() {
        let mut l = limits(TherapySettings {
            max_iob_units: f64::NAN,
            ..TherapySettings::default()
        });
        let mut iob = Constraint::<f64>::unrestricted();
        l.apply_max_iob(&mut iob);
        assert_eq!(iob.value(), f64::INFINITY);
        assert!(!iob.is_restricted());
    }

    #[test]
    fn negative_ceiling_declines_to_narrow() {
        let mut l = limits(TherapySettings {
            max_iob_units: -2.0,
            ..TherapySettings::default()
        });
        let mut iob = Constraint::<f64>::unrestricted();
        l.apply_max_iob(&mut iob);
        assert!(!iob.is_restricted());
    }

    #[test]
    fn infinite_ceiling_means_no_ceiling() {
        let mut l = limits(TherapySettings {
            max_iob_units: f64::INFINITY,
            ..TherapySettings::default()
        });
        let mut iob = Constraint::<f64>::unrestricted();
        l.apply_max_iob(&mut iob);
        assert_eq!(iob.value(), f64::INFINITY);
        assert!(!iob.is_restricted());
    }

    #[test]
    fn zero_ceiling_is_valid_and_total() {
        let mut l = limits(TherapySettings {
            max_iob_units: 0.0,
            ..TherapySettings::default()
        });
        let mut iob = Constraint::<f64>::unrestricted();
        l.apply_max_iob(&mut iob);
        assert_eq!(iob.value(), 0.0);
    }
}
