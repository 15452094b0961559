//! Narrowing-only constraint values with provenance.
//!
//! A [`Constraint<T>`] starts each dosing-decision cycle at its least
//! restrictive value and can only ever tighten: booleans go `true → false`,
//! numeric ceilings only decrease. Every accepted tightening appends a
//! [`Narrowing`] record naming the contributor and its reason, so the final
//! value carries its full justification chain. Resolution is "most
//! restrictive wins": no priorities, no overrides, no loosening.

use serde::Serialize;

use crate::contributor::ContributorId;

// ---------------------------------------------------------------------------
// Restrictable values
// ---------------------------------------------------------------------------

/// Value types that admit a "strictly more restrictive" ordering.
///
/// `bool` treats `false` as more restrictive than `true` (permission
/// withdrawn); `f64` treats a smaller ceiling as more restrictive. NaN is
/// not more restrictive than anything under strict `<`, so it can never
/// enter a constraint through [`Constraint::narrow`].
pub trait Restrictable: Copy + PartialEq + std::fmt::Debug {
    /// The value imposing no restriction at all.
    const UNRESTRICTED: Self;

    /// Whether `self` is strictly more restrictive than `current`.
    fn restricts(self, current: Self) -> bool;
}

impl Restrictable for bool {
    const UNRESTRICTED: Self = true;

    fn restricts(self, current: Self) -> bool {
        !self && current
    }
}

impl Restrictable for f64 {
    const UNRESTRICTED: Self = f64::INFINITY;

    fn restricts(self, current: Self) -> bool {
        self < current
    }
}

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// One accepted tightening step: who narrowed the value, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Narrowing {
    /// Human-readable justification, e.g. `"old version"`.
    pub reason: String,
    /// The contributor that imposed it.
    pub source: ContributorId,
}

impl std::fmt::Display for Narrowing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.reason, self.source)
    }
}

// ---------------------------------------------------------------------------
// Constraint
// ---------------------------------------------------------------------------

/// A dosing parameter restricted monotonically toward its safest value.
///
/// Created fresh at the start of a decision cycle, threaded by `&mut`
/// through every registered contributor, read once, then discarded.
/// Narrowing is commutative and idempotent, so the resolved value does not
/// depend on contributor order; only the provenance order reflects it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Constraint<T: Restrictable> {
    value: T,
    narrowings: Vec<Narrowing>,
}

impl<T: Restrictable> Constraint<T> {
    /// Start from a caller-chosen least restrictive value.
    pub fn new(initial: T) -> Self {
        Self {
            value: initial,
            narrowings: Vec::new(),
        }
    }

    /// Start from the type's least restrictive value (`true` / `+∞`).
    pub fn unrestricted() -> Self {
        Self::new(T::UNRESTRICTED)
    }

    /// Tighten to `candidate` if it is strictly more restrictive than the
    /// current value.
    ///
    /// A less or equally restrictive candidate leaves both the value and the
    /// provenance untouched. There is no loosening operation.
    pub fn narrow(&mut self, candidate: T, reason: impl Into<String>, source: ContributorId) {
        if candidate.restricts(self.value) {
            self.value = candidate;
            self.narrowings.push(Narrowing {
                reason: reason.into(),
                source,
            });
        }
    }

    /// The current resolved value.
    pub fn value(&self) -> T {
        self.value
    }

    /// Every accepted narrowing, oldest first.
    pub fn provenance(&self) -> &[Narrowing] {
        &self.narrowings
    }

    /// The justification strings, oldest first.
    pub fn reasons(&self) -> Vec<&str> {
        self.narrowings.iter().map(|n| n.reason.as_str()).collect()
    }

    /// Whether any contributor has narrowed this constraint.
    pub fn is_restricted(&self) -> bool {
        !self.narrowings.is_empty()
    }

    /// Whether `source` narrowed this constraint at least once.
    pub fn narrowed_by(&self, source: ContributorId) -> bool {
        self.narrowings.iter().any(|n| n.source == source)
    }
}

impl<T: Restrictable> Default for Constraint<T> {
    fn default() -> Self {
        Self::unrestricted()
    }
}

impl<T: Restrictable + std::fmt::Display> std::fmt::Display for Constraint<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.narrowings.is_empty() {
            write!(f, "{}", self.value)
        } else {
            let chain: Vec<String> = self.narrowings.iter().map(|n| n.to_string()).collect();
            write!(f, "{} ({})", self.value, chain.join("; "))
        }
    }
}
