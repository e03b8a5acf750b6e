// Progress indicator for the audit.
//
// Reads AuditStatistics from the diagnostics channel and keeps a single
// indicatif line up to date until the channel closes.

use std::io;
use std::io::Write;

use async_channel::Receiver;
use indicatif::{HumanBytes, HumanCount, HumanDuration, ProgressBar, ProgressStyle};
use s3audit_rs::types::AuditStatistics;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

/// Totals returned by [`show_indicator`] after the channel closes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndicatorSummary {
    pub pages_listed: u64,
    pub pages_failed: u64,
    pub objects_listed: u64,
    pub bytes_listed: u64,
    pub duplicates_found: u64,
    pub duplicate_bytes: u64,
    pub not_duplicates: u64,
    pub ambiguous: u64,
    pub deleted: u64,
    pub delete_errors: u64,
    pub missing_local: u64,
}

impl IndicatorSummary {
    fn record(&mut self, stats: AuditStatistics) {
        match stats {
            AuditStatistics::PageListed { objects, bytes, .. } => {
                self.pages_listed += 1;
                self.objects_listed += objects;
                self.bytes_listed += bytes;
            }
            AuditStatistics::PageFailed { .. } => self.pages_failed += 1,
            AuditStatistics::DuplicateFound { bytes, .. } => {
                self.duplicates_found += 1;
                self.duplicate_bytes += bytes;
            }
            AuditStatistics::NotDuplicate { .. } => self.not_duplicates += 1,
            AuditStatistics::StatAmbiguous { .. } => self.ambiguous += 1,
            AuditStatistics::DeleteComplete { .. } => self.deleted += 1,
            AuditStatistics::DeleteError { .. } => self.delete_errors += 1,
            AuditStatistics::MissingLocal { .. } => self.missing_local += 1,
        }
    }

    fn message(&self) -> String {
        let mut message = format!(
            "listed {} objects ({}) in {} pages",
            HumanCount(self.objects_listed),
            HumanBytes(self.bytes_listed),
            self.pages_listed,
        );
        if self.pages_failed > 0 {
            message.push_str(&format!(", {} pages failed", self.pages_failed));
        }
        if self.duplicates_found > 0 || self.not_duplicates > 0 {
            message.push_str(&format!(
                ",  duplicates {} ({}), deleted {}, delete errors {}",
                self.duplicates_found,
                HumanBytes(self.duplicate_bytes),
                self.deleted,
                self.delete_errors,
            ));
        }
        if self.missing_local > 0 {
            message.push_str(&format!(",  missing locally {}", self.missing_local));
        }
        message
    }
}

/// How often (in seconds) to refresh the progress display.
const REFRESH_INTERVAL: f32 = 1.0;

/// Spawn a task that consumes `stats_receiver` until it is closed.
///
/// `show_progress` enables the live line and `show_result` the final
/// statistics line. The totals are always logged at info level.
pub fn show_indicator(
    stats_receiver: Receiver<AuditStatistics>,
    show_progress: bool,
    show_result: bool,
) -> JoinHandle<IndicatorSummary> {
    let progress_text = ProgressBar::new(0);
    if let Ok(progress_style) = ProgressStyle::with_template("{wide_msg}") {
        progress_text.set_style(progress_style);
    }

    tokio::spawn(async move {
        let start_time = Instant::now();
        let mut summary = IndicatorSummary::default();

        loop {
            let period = Instant::now();
            loop {
                while let Ok(stats) = stats_receiver.try_recv() {
                    summary.record(stats);
                }

                if REFRESH_INTERVAL < period.elapsed().as_secs_f32() {
                    break;
                }

                if stats_receiver.is_closed() {
                    // Drain anything sent just before the close.
                    while let Ok(stats) = stats_receiver.try_recv() {
                        summary.record(stats);
                    }

                    let elapsed = start_time.elapsed();
                    info!(
                        message = "audit statistics",
                        pages_listed = summary.pages_listed,
                        pages_failed = summary.pages_failed,
                        objects_listed = summary.objects_listed,
                        bytes_listed = summary.bytes_listed,
                        duplicates = summary.duplicates_found,
                        deleted = summary.deleted,
                        delete_errors = summary.delete_errors,
                        missing_local = summary.missing_local,
                        duration_sec = elapsed.as_secs_f64(),
                    );

                    if show_result {
                        if let Ok(result_style) = ProgressStyle::with_template("{msg}") {
                            progress_text.set_style(result_style);
                        }
                        progress_text.finish_with_message(format!(
                            "{},  duration {}",
                            summary.message(),
                            HumanDuration(elapsed),
                        ));

                        println!();
                        let _ = io::stdout().flush();
                    } else {
                        progress_text.finish_and_clear();
                    }

                    return summary;
                }

                tokio::time::sleep(std::time::Duration::from_secs_f32(0.05)).await;
            }

            if show_progress {
                progress_text.set_message(summary.message());
            }
        }
    })
}
