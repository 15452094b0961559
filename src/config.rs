//! Deployment configuration.
//!
//! One TOML file holds everything an operator tunes: where durable state
//! lives, the freshness escalation ladder, and the caregiver therapy
//! limits. Every field has a default, so a missing or empty file is a
//! valid deployment. Parsing and validation are separate steps: [`load`]
//! only checks the TOML shape, while [`FreshnessConfig::to_policy`] and
//! [`TherapyConfig::to_settings`] reject values that are internally
//! inconsistent or out of range when the runtime objects are built.
//!
//! [`load`]: DoseguardConfig::load

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::freshness::FreshnessPolicy;
use crate::gate::{GateResult, GraceSchedule, checked_hours};
use crate::limits::TherapySettings;

// ── Error types ─────────────────────────────────────────────────────────

/// Errors from reading, parsing, or writing configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("cannot read config at {}: {source}", path.display())]
    #[diagnostic(
        code(doseguard::config::read),
        help("Check that the file exists and is readable, or run `doseguard init` to create one.")
    )]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config at {}: {message}", path.display())]
    #[diagnostic(
        code(doseguard::config::parse),
        help("The file is not valid TOML for this schema. Compare against `doseguard init` output.")
    )]
    Parse { path: PathBuf, message: String },

    #[error("cannot write config at {}: {message}", path.display())]
    #[diagnostic(code(doseguard::config::write))]
    Write { path: PathBuf, message: String },

    #[error("invalid therapy max IOB: {value}")]
    #[diagnostic(
        code(doseguard::config::invalid_max_iob),
        help("The ceiling must not be NaN or negative. Use `inf` for no ceiling.")
    )]
    InvalidMaxIob { value: f64 },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// ── Freshness section ───────────────────────────────────────────────────

/// The `[freshness]` section: escalation ladder and gate intervals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessConfig {
    /// Days after the staleness signal before warnings begin.
    #[serde(default = "default_warn_after_days")]
    pub warn_after_days: u64,
    /// Days before max insulin-on-board drops to zero.
    #[serde(default = "default_cap_iob_after_days")]
    pub cap_iob_after_days: u64,
    /// Days before closed-loop permission is withdrawn.
    #[serde(default = "default_disable_loop_after_days")]
    pub disable_loop_after_days: u64,
    /// Hours between update-check requests.
    #[serde(default = "default_check_every_hours")]
    pub check_every_hours: u64,
    /// Hours between staleness warnings.
    #[serde(default = "default_warn_every_hours")]
    pub warn_every_hours: u64,
}

fn default_warn_after_days() -> u64 {
    30
}

fn default_cap_iob_after_days() -> u64 {
    60
}

fn default_disable_loop_after_days() -> u64 {
    90
}

fn default_check_every_hours() -> u64 {
    24
}

fn default_warn_every_hours() -> u64 {
    24
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            warn_after_days: default_warn_after_days(),
            cap_iob_after_days: default_cap_iob_after_days(),
            disable_loop_after_days: default_disable_loop_after_days(),
            check_every_hours: default_check_every_hours(),
            warn_every_hours: default_warn_every_hours(),
        }
    }
}

impl FreshnessConfig {
    /// Convert to a validated runtime policy.
    pub fn to_policy(&self) -> GateResult<FreshnessPolicy> {
        let policy = FreshnessPolicy {
            schedule: GraceSchedule::from_days(
                self.warn_after_days,
                self.cap_iob_after_days,
                self.disable_loop_after_days,
            )?,
            check_every: checked_hours("check_every_hours", self.check_every_hours)?,
            warn_every: checked_hours("warn_every_hours", self.warn_every_hours)?,
        };
        policy.validate()?;
        Ok(policy)
    }
}

// ── Therapy section ─────────────────────────────────────────────────────

/// The `[therapy]` section: caregiver dosing limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TherapyConfig {
    /// Whether fully automated dosing is enabled at all.
    #[serde(default = "default_automated_dosing")]
    pub automated_dosing: bool,
    /// Hard ceiling on insulin-on-board, in insulin units.
    #[serde(default = "default_max_iob_units")]
    pub max_iob_units: f64,
}

fn default_automated_dosing() -> bool {
    true
}

fn default_max_iob_units() -> f64 {
    3.0
}

impl Default for TherapyConfig {
    fn default() -> Self {
        Self {
            automated_dosing: default_automated_dosing(),
            max_iob_units: default_max_iob_units(),
        }
    }
}

impl TherapyConfig {
    /// Convert to validated runtime settings.
    pub fn to_settings(&self) -> ConfigResult<TherapySettings> {
        if self.max_iob_units.is_nan() || self.max_iob_units < 0.0 {
            return Err(ConfigError::InvalidMaxIob {
                value: self.max_iob_units,
            });
        }
        Ok(TherapySettings {
            automated_dosing: self.automated_dosing,
            max_iob_units: self.max_iob_units,
        })
    }
}

// ── Top-level config ────────────────────────────────────────────────────

/// Complete deployment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DoseguardConfig {
    /// Directory for durable state. Absent means memory-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub freshness: FreshnessConfig,
    #[serde(default)]
    pub therapy: TherapyConfig,
}

impl DoseguardConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load from `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write as pretty TOML.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let raw = toml::to_string_pretty(self).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, raw).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}
