//! Human-readable rendering of audit reports.

use std::fmt;

use byte_unit::{Byte, UnitType};

use crate::aggregator::SizeReport;
use crate::duplicates::DuplicateReport;
use crate::outcome::AuditOutcome;
use crate::reconciler::ReconciliationReport;

/// Binary-prefix form of a byte count with one decimal and no space,
/// e.g. `1.5KiB`. Plain bytes keep the decimal too.
///
/// ```
/// use s3audit_rs::report::human_bytes;
///
/// assert_eq!(human_bytes(1536), "1.5KiB");
/// assert_eq!(human_bytes(0), "0.0B");
/// ```
pub fn human_bytes(bytes: u64) -> String {
    let adjusted = Byte::from_u64(bytes).get_appropriate_unit(UnitType::Binary);
    // The AdjustedByte Display drops the precision for plain bytes.
    format!("{:.1}{}", adjusted.get_value(), adjusted.get_unit())
}

/// [`human_bytes`] for a signed difference.
pub fn human_signed_bytes(bytes: i128) -> String {
    let magnitude = u64::try_from(bytes.unsigned_abs()).unwrap_or(u64::MAX);
    if bytes < 0 {
        format!("-{}", human_bytes(magnitude))
    } else {
        human_bytes(magnitude)
    }
}

impl fmt::Display for SizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            for (path, size) in &section.buckets {
                writeln!(f, "{path} size is {size} == {}", human_bytes(*size))?;
            }
            if self.sections.len() > 1 {
                writeln!(
                    f,
                    "Prefix {} size is {} == {}",
                    section.prefix,
                    section.total_bytes,
                    human_bytes(section.total_bytes)
                )?;
            }
            if section.failed_pages > 0 {
                writeln!(
                    f,
                    "Warning: {} listing page(s) failed under {}, totals are incomplete",
                    section.failed_pages, section.prefix
                )?;
            }
        }
        write!(
            f,
            "Total size is {} == {}",
            self.grand_total,
            human_bytes(self.grand_total)
        )
    }
}

impl fmt::Display for DuplicateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pair in self.deletable() {
            writeln!(
                f,
                "Duplicate {} of {} : {}",
                pair.nested.object,
                pair.source.object,
                pair.reclaimable_bytes()
            )?;
        }
        for response in self.delete_failures() {
            writeln!(
                f,
                "Failed to delete {}/{} after {} attempts: {}",
                response.container,
                response.object,
                response.attempts,
                response.error.as_deref().unwrap_or("unknown error")
            )?;
        }
        for pair in self.not_duplicates() {
            writeln!(
                f,
                "Not a duplicate: {} differs from {}",
                pair.nested.object, pair.source.object
            )?;
        }
        for name in &self.ambiguous {
            writeln!(f, "Multiple entries with name {name}, skipped")?;
        }

        let verb = if self.erase {
            "Deleted"
        } else {
            "Would have deleted"
        };
        write!(
            f,
            "{verb} {} == {} ({} of {} objects checked are duplicates)",
            self.reclaimable_bytes,
            human_bytes(self.reclaimable_bytes),
            self.deletable().count(),
            self.objects_checked
        )
    }
}

impl fmt::Display for ReconciliationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (path, size) in &self.remote_buckets {
            writeln!(f, "Size of {path} is {size} == {}", human_bytes(*size))?;
        }
        if let Some(segments_container) = &self.segments_container {
            writeln!(
                f,
                "Segments in {segments_container} add {} == {}",
                self.segments_size,
                human_bytes(self.segments_size)
            )?;
        }

        let sizes = &self.outcome;
        writeln!(
            f,
            "Remote size is {} == {}",
            sizes.remote_size,
            human_bytes(sizes.remote_size)
        )?;

        match sizes.outcome {
            AuditOutcome::LocalDirMissing => {
                writeln!(f, "Local directory {} does not exist", self.local_dir.display())?;
            }
            _ => {
                writeln!(
                    f,
                    "Local size is {} == {}",
                    sizes.local_size,
                    human_bytes(sizes.local_size)
                )?;
                writeln!(
                    f,
                    "Difference is {} == {} (tolerance {} == {})",
                    sizes.diff,
                    human_signed_bytes(sizes.diff),
                    self.tolerance,
                    human_bytes(self.tolerance)
                )?;
            }
        }

        if !self.missing_names.is_empty() {
            writeln!(f, "Missing locally, fetch these keys:")?;
            for name in &self.missing_names {
                writeln!(f, "  {name}")?;
            }
            if self.missing_bound_reached {
                writeln!(
                    f,
                    "  (stopped after {} names)",
                    self.missing_names.len()
                )?;
            }
        }
        if self.failed_pages > 0 {
            writeln!(
                f,
                "Warning: {} listing page(s) failed, remote size is incomplete",
                self.failed_pages
            )?;
        }

        write!(
            f,
            "Result: {} (exit code {})",
            sizes.outcome,
            sizes.outcome.exit_code()
        )
    }
}
