//! Audit run orchestrator.
//!
//! Builds the store and the diagnostics channel, then drives the configured
//! task to completion as one sequential future:
//!
//! ```text
//! ObjectStore → ObjectLister → {PrefixAggregator | DuplicateDetector | SizeReconciler} → OutcomeClassifier
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, anyhow};
use async_channel::{Receiver, Sender};
use tracing::{debug, error, info};

use crate::aggregator::{self, SizeReport};
use crate::config::{AuditTask, Config};
use crate::duplicates::{DuplicateDetector, DuplicateReport};
use crate::outcome::{AuditOutcome, Findings, classify};
use crate::reconciler::{ReconciliationReport, SizeReconciler};
use crate::stage::Stage;
use crate::storage::{self, Storage};
use crate::types::AuditStatistics;
use crate::types::error::{AuditError, is_cancelled_error};
use crate::types::token::PipelineCancellationToken;

/// The typed result of a completed audit.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditReport {
    SizeReport(SizeReport),
    Duplicates(DuplicateReport),
    Reconciliation(ReconciliationReport),
}

impl AuditReport {
    pub fn findings(&self) -> Findings {
        match self {
            AuditReport::SizeReport(report) => Findings::SizeReport {
                total_bytes: report.grand_total,
            },
            AuditReport::Duplicates(report) => Findings::Duplicates {
                reclaimable_bytes: report.reclaimable_bytes,
            },
            AuditReport::Reconciliation(report) => Findings::Reconciliation {
                local_dir_present: report.outcome.outcome != AuditOutcome::LocalDirMissing,
                missing_count: report.missing_names.len(),
                diff: report.outcome.diff,
                tolerance: report.tolerance,
            },
        }
    }

    pub fn outcome(&self) -> AuditOutcome {
        match self {
            AuditReport::Reconciliation(report) => report.outcome.outcome,
            other => classify(&other.findings()),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.outcome().exit_code()
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditReport::SizeReport(report) => report.fmt(f),
            AuditReport::Duplicates(report) => report.fmt(f),
            AuditReport::Reconciliation(report) => report.fmt(f),
        }
    }
}

/// Runs one audit task against one container.
///
/// ## Usage
///
/// ```no_run
/// # async fn example() -> anyhow::Result<()> {
/// use s3audit_rs::config::{AuditTask, DuplicateCheckConfig};
/// use s3audit_rs::{AuditPipeline, Config, create_pipeline_cancellation_token};
///
/// let mut config = Config::for_container("backups");
/// config.task = AuditTask::DuplicateCheck(DuplicateCheckConfig::default());
///
/// let mut pipeline = AuditPipeline::new(config, create_pipeline_cancellation_token()).await;
/// pipeline.close_stats_sender();
/// let report = pipeline.run().await?;
/// println!("{report}");
/// std::process::exit(report.exit_code());
/// # }
/// ```
pub struct AuditPipeline {
    config: Config,
    target: Storage,
    cancellation_token: PipelineCancellationToken,
    stats_receiver: Receiver<AuditStatistics>,
    has_warning: Arc<AtomicBool>,
    ready: bool,
}

impl AuditPipeline {
    /// Create a pipeline backed by the S3 store described in `config`.
    pub async fn new(config: Config, cancellation_token: PipelineCancellationToken) -> Self {
        let (stats_sender, stats_receiver) = async_channel::unbounded();

        let target =
            storage::create_storage(config.clone(), cancellation_token.clone(), stats_sender)
                .await;

        Self::from_parts(config, target, cancellation_token, stats_receiver)
    }

    /// Create a pipeline over a caller-supplied store.
    ///
    /// `make_storage` receives the sending side of the diagnostics channel,
    /// which the store must hand back from `get_stats_sender`.
    pub fn with_storage<F>(
        config: Config,
        cancellation_token: PipelineCancellationToken,
        make_storage: F,
    ) -> Self
    where
        F: FnOnce(Sender<AuditStatistics>) -> Storage,
    {
        let (stats_sender, stats_receiver) = async_channel::unbounded();
        let target = make_storage(stats_sender);

        Self::from_parts(config, target, cancellation_token, stats_receiver)
    }

    fn from_parts(
        config: Config,
        target: Storage,
        cancellation_token: PipelineCancellationToken,
        stats_receiver: Receiver<AuditStatistics>,
    ) -> Self {
        Self {
            config,
            target,
            cancellation_token,
            stats_receiver,
            has_warning: Arc::new(AtomicBool::new(false)),
            ready: true,
        }
    }

    /// Run the configured task to completion.
    ///
    /// Recoverable conditions are part of the report. Any `Err` is fatal:
    /// store authentication/transport failures, local I/O errors, invalid
    /// configuration and cancellation ([`AuditError::Cancelled`]).
    pub async fn run(&mut self) -> Result<AuditReport> {
        assert!(self.ready, "AuditPipeline::run() called more than once");
        self.ready = false;

        let result = self.execute().await;
        self.shutdown();

        match &result {
            Ok(report) => {
                info!(
                    container = self.config.container,
                    task = self.config.task.name(),
                    outcome = %report.outcome(),
                    "audit completed."
                );
            }
            Err(e) if is_cancelled_error(e) => {
                info!(container = self.config.container, "audit cancelled.");
            }
            Err(e) => {
                error!(
                    container = self.config.container,
                    task = self.config.task.name(),
                    "audit failed: {:#}",
                    e
                );
            }
        }

        result
    }

    pub fn has_warning(&self) -> bool {
        self.has_warning.load(Ordering::SeqCst)
    }

    /// Get the stats receiver for progress reporting.
    pub fn get_stats_receiver(&self) -> Receiver<AuditStatistics> {
        self.stats_receiver.clone()
    }

    /// Close the stats sender to signal the progress reporter to finish.
    ///
    /// Call this before `run()` if nothing consumes the statistics.
    pub fn close_stats_sender(&self) {
        self.target.get_stats_sender().close();
    }

    async fn execute(&self) -> Result<AuditReport> {
        validate_config(&self.config)?;

        let stage = Stage::new(
            self.config.clone(),
            self.target.clone(),
            self.cancellation_token.clone(),
            self.has_warning.clone(),
        );
        let container = self.config.container.as_str();
        debug!(container = container, task = self.config.task.name(), "audit started.");

        let report = match &self.config.task {
            AuditTask::SizeReport(size_config) => {
                AuditReport::SizeReport(aggregator::report_sizes(&stage, size_config).await?)
            }
            AuditTask::DuplicateCheck(duplicate_config) => AuditReport::Duplicates(
                DuplicateDetector::new(stage, duplicate_config)
                    .detect(container, duplicate_config.prefix.as_deref())
                    .await?,
            ),
            AuditTask::Reconcile(reconcile_config) => AuditReport::Reconciliation(
                SizeReconciler::new(stage, reconcile_config.clone())
                    .reconcile(container)
                    .await?,
            ),
        };

        Ok(report)
    }

    fn shutdown(&self) {
        self.close_stats_sender();
    }
}

fn validate_config(config: &Config) -> Result<()> {
    let invalid = |message: &str| Err(anyhow!(AuditError::InvalidConfig(message.to_string())));

    if config.container.is_empty() {
        return invalid("container must not be empty");
    }
    if !(1..=1000).contains(&config.max_keys) {
        return invalid("max keys must be between 1 and 1000");
    }
    match &config.task {
        AuditTask::SizeReport(size_config) => {
            if size_config.prefixes.is_empty() {
                return invalid("at least one prefix is required");
            }
            if size_config.depth == 0 {
                return invalid("depth must be at least 1");
            }
        }
        AuditTask::Reconcile(reconcile_config) => {
            if reconcile_config.depth == 0 {
                return invalid("depth must be at least 1");
            }
            if reconcile_config.local_path.as_os_str().is_empty() {
                return invalid("local path must not be empty");
            }
        }
        AuditTask::DuplicateCheck(_) => {}
    }
    Ok(())
}
