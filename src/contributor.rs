//! The contributor capability: components that tighten dosing constraints.
//!
//! A contributor is anything with an opinion about how conservative the
//! controller must be this cycle: the version-freshness guard, caregiver
//! therapy limits, a pump driver reporting degraded hardware. Each one
//! implements [`Contributor`] and overrides only the constraint kinds it
//! cares about; everything else defaults to "no opinion". Contributors are
//! constructed and registered explicitly at the composition root — there is
//! no global registry and no discovery.

use serde::Serialize;

use crate::constraint::Constraint;

/// Stable identity of a contributor, recorded against every narrowing it
/// makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ContributorId(&'static str);

impl ContributorId {
    /// Construct from a short stable name, e.g. `"version-guard"`.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The underlying name.
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for ContributorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// A component that may narrow dosing constraints.
///
/// Narrowing is commutative and idempotent, so implementations must be
/// correct under any invocation order relative to other contributors. Side
/// effects (alerts, store writes) stay inside the contributor's own
/// collaborators; the constraint argument is the only shared state, and it
/// only ever tightens.
pub trait Contributor: Send {
    /// Identity recorded in provenance.
    fn id(&self) -> ContributorId;

    /// Tighten whether fully automated dosing may run this cycle.
    fn apply_closed_loop_allowed(&mut self, _constraint: &mut Constraint<bool>) {}

    /// Tighten the maximum allowed insulin-on-board, in insulin units.
    fn apply_max_iob(&mut self, _constraint: &mut Constraint<f64>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Indifferent;

    impl Contributor for Indifferent {
        fn id(&self) -> ContributorId {
            ContributorId::new("indifferent")
        }
    }

    #[test]
    fn default_hooks_leave_constraints_untouched() {
        let mut contributor = Indifferent;
        let mut allowed = Constraint::<bool>::unrestricted();
        let mut iob = Constraint::<f64>::unrestricted();

        contributor.apply_closed_loop_allowed(&mut allowed);
        contributor.apply_max_iob(&mut iob);

        assert!(allowed.value());
        assert!(!allowed.is_restricted());
        assert_eq!(iob.value(), f64::INFINITY);
        assert!(!iob.is_restricted());
    }

    #[test]
    fn id_displays_as_name() {
        assert_eq!(ContributorId::new("version-guard").to_string(), "version-guard");
    }
}
