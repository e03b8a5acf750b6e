use anyhow::Error;
use thiserror::Error;

/// Exit code for every run that ends in an error rather than a classification.
///
/// Distinct from the outcome codes 0-3 reported by a completed audit.
pub const EXIT_CODE_FATAL: i32 = 4;

/// Application-level error types for s3audit-rs.
///
/// Recoverable conditions (a failed listing page, an ambiguous stat, a single
/// failed delete) never surface as an `AuditError`; they are logged and
/// reported inside the audit result. Everything here aborts the run.
#[derive(Error, Debug, PartialEq)]
pub enum AuditError {
    /// The object store rejected the session or could not be reached.
    #[error("object store error: {0}")]
    Store(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Operation cancelled by user")]
    Cancelled,

    /// Another run holds the advisory lock.
    #[error("another audit run holds the lock file: {0}")]
    LockHeld(String),
}

impl AuditError {
    pub fn exit_code(&self) -> i32 {
        EXIT_CODE_FATAL
    }
}

/// Check if an anyhow::Error wraps a cancellation error.
pub fn is_cancelled_error(e: &Error) -> bool {
    if let Some(err) = e.downcast_ref::<AuditError>() {
        return *err == AuditError::Cancelled;
    }
    false
}

/// Extract the exit code from an anyhow::Error.
pub fn exit_code_from_error(e: &Error) -> i32 {
    if let Some(err) = e.downcast_ref::<AuditError>() {
        return err.exit_code();
    }
    EXIT_CODE_FATAL
}
