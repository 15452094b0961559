//! The aggregator: one decision cycle over every registered contributor.
//!
//! Per cycle the checker builds a fresh unrestricted constraint for each
//! kind, threads it through every contributor in registration order, logs
//! the resolved value with its full provenance, and hands the result to
//! the dosing pipeline. Contributors are registered once, explicitly, at
//! the composition root — no discovery, no global list.

use serde::Serialize;

use crate::constraint::Constraint;
use crate::contributor::Contributor;

// ── DosingLimits ────────────────────────────────────────────────────────

/// The resolved output of one decision cycle.
#[derive(Debug, Clone, Serialize)]
pub struct DosingLimits {
    /// Whether fully automated dosing may run this cycle.
    pub closed_loop_allowed: Constraint<bool>,
    /// Ceiling on insulin-on-board, in insulin units.
    pub max_iob: Constraint<f64>,
}

// ── ConstraintsChecker ──────────────────────────────────────────────────

/// Runs every registered contributor against fresh constraints.
///
/// All evaluation methods take `&mut self`: a cycle reads and rewrites
/// debounce state, so two cycles must never interleave. Within one process
/// the borrow checker enforces that; callers sharing a checker across
/// threads put it behind a mutex.
pub struct ConstraintsChecker {
    contributors: Vec<Box<dyn Contributor>>,
}

impl ConstraintsChecker {
    /// Create a checker with no contributors.
    pub fn new() -> Self {
        Self {
            contributors: Vec::new(),
        }
    }

    /// Register a contributor.
    ///
    /// Registration order fixes the order of provenance entries within a
    /// cycle and nothing else: narrowing is commutative, so the resolved
    /// values are order-independent.
    pub fn register(&mut self, contributor: Box<dyn Contributor>) {
        tracing::debug!(contributor = %contributor.id(), "contributor registered");
        self.contributors.push(contributor);
    }

    /// Number of registered contributors.
    pub fn len(&self) -> usize {
        self.contributors.len()
    }

    /// Whether no contributors are registered.
    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }

    /// Resolve whether closed-loop dosing may run this cycle.
    pub fn closed_loop_allowed(&mut self) -> Constraint<bool> {
        let mut constraint = Constraint::unrestricted();
        for contributor in &mut self.contributors {
            contributor.apply_closed_loop_allowed(&mut constraint);
        }
        constraint
    }

    /// Resolve the insulin-on-board ceiling for this cycle.
    pub fn max_iob(&mut self) -> Constraint<f64> {
        let mut constraint = Constraint::unrestricted();
        for contributor in &mut self.contributors {
            contributor.apply_max_iob(&mut constraint);
        }
        constraint
    }

    /// Run one full decision cycle and log the outcome.
    pub fn evaluate(&mut self) -> DosingLimits {
        let closed_loop_allowed = self.closed_loop_allowed();
        let max_iob = self.max_iob();

        tracing::info!(
            closed_loop = closed_loop_allowed.value(),
            max_iob = max_iob.value(),
            contributors = self.contributors.len(),
            "dosing limits resolved"
        );
        for narrowing in closed_loop_allowed.provenance() {
            tracing::debug!(source = %narrowing.source, reason = %narrowing.reason, "closed-loop narrowed");
        }
        for narrowing in max_iob.provenance() {
            tracing::debug!(source = %narrowing.source, reason = %narrowing.reason, "max IOB narrowed");
        }

        DosingLimits {
            closed_loop_allowed,
            max_iob,
        }
    }
}

impl Default for ConstraintsChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConstraintsChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<&str> = self.contributors.iter().map(|c| c.id().as_str()).collect();
        f.debug_struct("ConstraintsChecker")
            .field("contributors", &ids)
            .finish()
    }
}
