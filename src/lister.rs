use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::stage::Stage;
use crate::types::{AuditStatistics, ListingPage};

/// Walks the listing of one container/prefix, one page at a time.
///
/// Pages are requested strictly in sequence, each with the continuation
/// marker of the page before it. Every consumer (aggregation, duplicate
/// detection, reconciliation) drives its own lister:
///
/// ```text
/// ObjectStore → ObjectLister → {PrefixAggregator | DuplicateDetector | SizeReconciler}
/// ```
///
/// A failed page is logged, flagged as a warning and still returned so the
/// caller can count it; it carries no entries. The walk ends when a page
/// has no `next_marker`. Cancellation is checked before every request.
pub struct ObjectLister {
    stage: Stage,
    container: String,
    prefix: String,
    marker: Option<String>,
    finished: bool,
    pages_failed: u64,
}

impl ObjectLister {
    pub fn new(stage: Stage, container: &str, prefix: &str) -> Self {
        Self {
            stage,
            container: container.to_string(),
            prefix: prefix.to_string(),
            marker: None,
            finished: false,
            pages_failed: 0,
        }
    }

    /// Fetch the next page, or `None` once the listing is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<ListingPage>> {
        if self.finished {
            return Ok(None);
        }
        self.stage.check_cancelled()?;

        let marker = self.marker.take();
        let page = self
            .stage
            .target
            .list_page(
                &self.container,
                &self.prefix,
                marker.clone(),
                self.stage.config.max_keys,
            )
            .await
            .with_context(|| {
                format!(
                    "listing s3://{}/{} failed.",
                    self.container, self.prefix
                )
            })?;

        if page.success {
            debug!(
                container = self.container,
                prefix = self.prefix,
                objects = page.items.len(),
                "listing page received."
            );
            self.stage
                .send_stats(AuditStatistics::PageListed {
                    container: self.container.clone(),
                    objects: page.items.len() as u64,
                    bytes: page.total_bytes(),
                })
                .await;
        } else {
            self.pages_failed += 1;
            let error = page.error.clone().unwrap_or_default();
            warn!(
                container = self.container,
                prefix = self.prefix,
                error = error,
                "listing page failed, its entries are skipped."
            );
            self.stage.set_warning();
            self.stage
                .send_stats(AuditStatistics::PageFailed {
                    container: self.container.clone(),
                    error,
                })
                .await;
        }

        // A store that hands back the marker it was given would loop forever.
        self.marker = page.next_marker.clone().filter(|next| Some(next) != marker.as_ref());
        self.finished = self.marker.is_none();

        Ok(Some(page))
    }

    pub fn pages_failed(&self) -> u64 {
        self.pages_failed
    }
}
