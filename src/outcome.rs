use std::fmt;

/// The single exit condition of a completed audit.
///
/// The discriminant is the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum AuditOutcome {
    Ok = 0,
    MissingLocal = 1,
    ExceedsTolerance = 2,
    LocalDirMissing = 3,
}

impl AuditOutcome {
    pub fn exit_code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AuditOutcome::Ok => "ok",
            AuditOutcome::MissingLocal => "missing local files",
            AuditOutcome::ExceedsTolerance => "remote exceeds local beyond tolerance",
            AuditOutcome::LocalDirMissing => "local directory missing",
        };
        f.write_str(label)
    }
}

/// Accumulated findings of one audit task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Findings {
    Reconciliation {
        local_dir_present: bool,
        missing_count: usize,
        diff: i128,
        tolerance: u64,
    },
    Duplicates {
        reclaimable_bytes: u64,
    },
    SizeReport {
        total_bytes: u64,
    },
}

/// Map complete findings to their outcome.
///
/// Precedence for a reconciliation: an absent local directory, then any
/// missing file, then the size comparison. A remote side at or below the
/// local size is always `Ok`.
///
/// ```
/// use s3audit_rs::outcome::{classify, AuditOutcome, Findings};
///
/// let findings = Findings::Reconciliation {
///     local_dir_present: true,
///     missing_count: 0,
///     diff: 6000,
///     tolerance: 5000,
/// };
/// assert_eq!(classify(&findings), AuditOutcome::ExceedsTolerance);
/// ```
pub fn classify(findings: &Findings) -> AuditOutcome {
    match *findings {
        Findings::Reconciliation {
            local_dir_present: false,
            ..
        } => AuditOutcome::LocalDirMissing,
        Findings::Reconciliation {
            missing_count, ..
        } if missing_count > 0 => AuditOutcome::MissingLocal,
        Findings::Reconciliation { diff, tolerance, .. } => {
            if diff > tolerance as i128 {
                AuditOutcome::ExceedsTolerance
            } else {
                AuditOutcome::Ok
            }
        }
        Findings::Duplicates { .. } | Findings::SizeReport { .. } => AuditOutcome::Ok,
    }
}
