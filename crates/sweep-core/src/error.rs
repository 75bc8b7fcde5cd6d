use std::fmt;

use crate::lock::LockError;
use crate::store::StoreError;

/// Machine-readable error codes for operator and automation decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    StoreOpenFailed,
    StoreQueryFailed,
    StoreDeleteFailed,
    LockIoFailed,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::StoreOpenFailed => "E3001",
            Self::StoreQueryFailed => "E3002",
            Self::StoreDeleteFailed => "E3003",
            Self::LockIoFailed => "E5001",
            Self::LockContention => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Sweep workspace not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::StoreOpenFailed => "Record store could not be opened",
            Self::StoreQueryFailed => "Duplicate scan failed",
            Self::StoreDeleteFailed => "Bulk delete failed",
            Self::LockIoFailed => "Lock file write failed",
            Self::LockContention => "Cleanup already running",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `sweep init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix .sweep/config.toml or the flag value and retry."),
            Self::StoreOpenFailed => Some("Check the [store] path in .sweep/config.toml."),
            Self::StoreQueryFailed | Self::StoreDeleteFailed => {
                Some("Retry the cleanup; groups already cleaned stay cleaned.")
            }
            Self::LockIoFailed => Some("Check disk space and write permissions on .sweep/locks."),
            Self::LockContention => {
                Some("Retry after the other `sweep cleanup` process releases its lock.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Any failure that aborts a cleanup run.
///
/// Deletions committed before the failure are kept; the run is safe to retry.
#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

impl CleanupError {
    /// Machine-readable code associated with this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Store(err) => err.code(),
            Self::Lock(err) => err.code(),
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}
