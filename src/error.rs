//! Rich diagnostic error types for the doseguard engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]`
//! derives, providing error codes, help text, and source chains. The
//! constraint algebra itself is total and has no error type: timestamps
//! that cannot be read degrade to "never happened", and malformed numeric
//! input is rejected by the owning contributor before it reaches a
//! constraint. Errors only surface in the store adapters, configuration,
//! and the CLI.

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::gate::GateError;

/// Top-level error type for the doseguard engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text, source chains) through to the
/// user.
#[derive(Debug, Error, Diagnostic)]
pub enum DoseguardError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias using the top-level error.
pub type DoseguardResult<T> = std::result::Result<T, DoseguardError>;

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(doseguard::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(doseguard::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             This may indicate corruption — try running with a fresh data directory."
        )
    )]
    Redb { message: String },
}
