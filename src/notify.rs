//! Outbound alerts: how contributors reach a human.
//!
//! A contributor that needs to warn someone holds an [`AlertSink`] handed
//! to it at construction — there is no event bus and no global notification
//! registry. The engine only decides *that* an alert is warranted; delivery
//! (pump screen, phone notification, follower app) lives outside and plugs
//! in behind the trait. Sinks can be swapped per deployment: structured
//! logs in production, an in-memory vec in tests.

use std::sync::Mutex;

use serde::Serialize;

// ── Alert types ─────────────────────────────────────────────────────────

/// How loudly an alert should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    /// Informational, no action needed.
    Info,
    /// Needs attention soon.
    Normal,
    /// Needs attention now.
    Urgent,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Normal => write!(f, "normal"),
            Self::Urgent => write!(f, "urgent"),
        }
    }
}

/// What an alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[non_exhaustive]
pub enum AlertKind {
    /// The installed software has been outdated past its warning grace period.
    StaleVersion,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StaleVersion => write!(f, "stale-version"),
        }
    }
}

/// One outbound alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
}

impl Alert {
    pub fn new(kind: AlertKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {}", self.kind, self.severity, self.message)
    }
}

// ── AlertSink trait ─────────────────────────────────────────────────────

/// A destination for outbound alerts.
pub trait AlertSink: Send + Sync {
    /// Surface a single alert. Fire-and-forget: failures are the sink's
    /// problem, never the caller's.
    fn raise(&self, alert: &Alert);
}

// ── TracingSink ─────────────────────────────────────────────────────────

/// Surfaces alerts as structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AlertSink for TracingSink {
    fn raise(&self, alert: &Alert) {
        match alert.severity {
            Severity::Info => tracing::info!(kind = %alert.kind, "{}", alert.message),
            Severity::Normal => tracing::warn!(kind = %alert.kind, "{}", alert.message),
            Severity::Urgent => tracing::error!(kind = %alert.kind, "{}", alert.message),
        }
    }
}

// ── VecSink ─────────────────────────────────────────────────────────────

/// Collects alerts into a `Vec<Alert>` for testing.
#[derive(Debug, Default)]
pub struct VecSink {
    alerts: Mutex<Vec<Alert>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self {
            alerts: Mutex::new(Vec::new()),
        }
    }

    /// Get all collected alerts.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    /// Number of collected alerts.
    pub fn len(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertSink for VecSink {
    fn raise(&self, alert: &Alert) {
        self.alerts.lock().unwrap().push(alert.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_sink_collects_alerts() {
        let sink = VecSink::new();
        sink.raise(&Alert::new(
            AlertKind::StaleVersion,
            Severity::Normal,
            "update available",
        ));
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.alerts()[0].severity, Severity::Normal);
    }

    #[test]
    fn alert_displays_kind_and_severity() {
        let alert = Alert::new(AlertKind::StaleVersion, Severity::Urgent, "update now");
        assert_eq!(alert.to_string(), "[stale-version:urgent] update now");
    }

    #[test]
    fn alert_serializes_to_json() {
        let alert = Alert::new(AlertKind::StaleVersion, Severity::Normal, "update available");
        let json = serde_json::to_string(&alert).unwrap();
        assert!(json.contains("StaleVersion"), "json = {json}");
        assert!(json.contains("update available"), "json = {json}");
    }

    #[test]
    fn severity_orders_by_loudness() {
        assert!(Severity::Info < Severity::Normal);
        assert!(Severity::Normal < Severity::Urgent);
    }
}
