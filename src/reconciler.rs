use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::aggregator::{AggregateBucket, PrefixAggregator};
use crate::config::ReconcileConfig;
use crate::lister::ObjectLister;
use crate::local;
use crate::outcome::{AuditOutcome, Findings, classify};
use crate::stage::Stage;
use crate::types::AuditStatistics;

/// Sizes and classification of one reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationOutcome {
    pub outcome: AuditOutcome,
    pub remote_size: u64,
    pub local_size: u64,
    /// `remote_size - local_size`.
    pub diff: i128,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationReport {
    pub container: String,
    pub prefix: String,
    pub local_dir: PathBuf,
    pub tolerance: u64,
    pub outcome: ReconciliationOutcome,
    /// Names absent locally, in listing order, at most `max_missing_names`.
    pub missing_names: Vec<String>,
    /// Presence checks stopped because the bound was reached.
    pub missing_bound_reached: bool,
    /// Remote bytes of the main container bucketed by `depth`.
    pub remote_buckets: AggregateBucket,
    pub segments_container: Option<String>,
    pub segments_size: u64,
    pub failed_pages: u64,
}

/// Compares the remote inventory under a prefix with its local mirror.
pub struct SizeReconciler {
    stage: Stage,
    reconcile_config: ReconcileConfig,
}

impl SizeReconciler {
    pub fn new(stage: Stage, reconcile_config: ReconcileConfig) -> Self {
        Self {
            stage,
            reconcile_config,
        }
    }

    pub async fn reconcile(&self, container: &str) -> Result<ReconciliationReport> {
        let reconcile_config = &self.reconcile_config;
        let prefix = reconcile_config.prefix.as_str();
        let local_root = reconcile_config.local_path.as_path();
        let local_dir = local::mirror_path(local_root, prefix);
        let local_dir_present = local_dir.exists();
        let bound = reconcile_config.max_missing_names.max(1);

        if !local_dir_present {
            warn!(
                local_dir = %local_dir.display(),
                "local directory does not exist, presence checks skipped."
            );
        }

        let mut aggregator = PrefixAggregator::new(reconcile_config.depth);
        let mut missing_names = Vec::new();
        let mut failed_pages = 0;

        let mut lister = ObjectLister::new(self.stage.clone(), container, prefix);
        while let Some(page) = lister.next_page().await? {
            if !page.success {
                continue;
            }
            for entry in &page.items {
                aggregator.add(entry);

                if !local_dir_present || missing_names.len() >= bound {
                    continue;
                }
                if !local::is_mirrored(local_root, &entry.name) {
                    debug!(
                        key = entry.name,
                        local_path = %local::mirror_path(local_root, &entry.name).display(),
                        "file does not exist locally."
                    );
                    self.stage
                        .send_stats(AuditStatistics::MissingLocal {
                            key: entry.name.clone(),
                        })
                        .await;
                    missing_names.push(entry.name.clone());
                }
            }
        }
        failed_pages += lister.pages_failed();

        let mut segments_container = None;
        let mut segments_size = 0;
        if reconcile_config.include_segments {
            let name = reconcile_config.segments_container_for(container);
            let mut lister = ObjectLister::new(self.stage.clone(), &name, prefix);
            while let Some(page) = lister.next_page().await? {
                if page.success {
                    segments_size += page.total_bytes();
                }
            }
            failed_pages += lister.pages_failed();
            debug!(container = name, size = segments_size, "segments size totalled.");
            segments_container = Some(name);
        }

        let remote_size = aggregator.total() + segments_size;
        let local_size = if local_dir_present {
            local::tree_size(&local_dir)?
        } else {
            0
        };
        let diff = remote_size as i128 - local_size as i128;
        let missing_bound_reached = missing_names.len() >= bound;

        if !missing_names.is_empty() {
            self.stage.set_warning();
        }

        let outcome = classify(&Findings::Reconciliation {
            local_dir_present,
            missing_count: missing_names.len(),
            diff,
            tolerance: reconcile_config.tolerance,
        });

        info!(
            container = container,
            prefix = prefix,
            remote_size = remote_size,
            local_size = local_size,
            diff = diff as i64,
            missing = missing_names.len(),
            outcome = %outcome,
            "reconciliation completed."
        );

        Ok(ReconciliationReport {
            container: container.to_string(),
            prefix: prefix.to_string(),
            local_dir,
            tolerance: reconcile_config.tolerance,
            outcome: ReconciliationOutcome {
                outcome,
                remote_size,
                local_size,
                diff,
            },
            missing_names,
            missing_bound_reached,
            remote_buckets: aggregator.into_buckets(),
            segments_container,
            segments_size,
            failed_pages,
        })
    }
}
