//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Deploy errors ─────────────────────────────────────────────────────────────

/// Stage-labelled failures of a deploy or rollback run.
///
/// Every variant names the stage that failed; the underlying cause is kept
/// as the error source so `{:#}` prints the whole chain.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Invalid version '{0}': must match ^[A-Za-z0-9][A-Za-z0-9._+-]{{0,63}}$")]
    InvalidVersion(String),

    #[error("Error connecting to the server: both password and SSH key authentication failed")]
    Authentication {
        #[source]
        source: anyhow::Error,
    },

    #[error("Error connecting to the server")]
    Connection {
        #[source]
        source: anyhow::Error,
    },

    #[error("Error zipping the build folder")]
    Archive {
        #[source]
        source: anyhow::Error,
    },

    #[error("Error removing old deploy in {dir}")]
    Cleanup {
        dir: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("The deploy file in path {path} does not exist")]
    MissingArchive { path: String },

    #[error("Error uploading the build folder")]
    Upload {
        #[source]
        source: anyhow::Error,
    },

    #[error("Error unzipping the build folder")]
    Extract {
        #[source]
        source: anyhow::Error,
    },
}

impl DeployError {
    /// Short machine-readable code used by `--json` error output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidVersion(_) => "INVALID_VERSION",
            Self::Authentication { .. } => "AUTHENTICATION_FAILED",
            Self::Connection { .. } => "CONNECTION_FAILED",
            Self::Archive { .. } => "ARCHIVE_FAILED",
            Self::Cleanup { .. } => "CLEANUP_FAILED",
            Self::MissingArchive { .. } => "ARCHIVE_MISSING",
            Self::Upload { .. } => "UPLOAD_FAILED",
            Self::Extract { .. } => "EXTRACT_FAILED",
        }
    }
}

// ── Connect errors ────────────────────────────────────────────────────────────

/// Outcome of a single connection attempt.
///
/// Only `Authentication` makes the caller try the next auth method.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("authentication rejected: {0}")]
    Authentication(String),

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors raised while building the configuration set at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting(s): {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("Invalid value for {key}: {value}\n\n{reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}
