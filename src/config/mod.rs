pub mod args;

use std::path::PathBuf;

use crate::types::{ClientConfigLocation, S3Credentials};

/// Default aggregation depth: one path segment.
pub const DEFAULT_DEPTH: usize = 1;

/// Default remote-vs-local tolerance in bytes.
///
/// A fixed threshold. It does not scale with the number of objects.
pub const DEFAULT_TOLERANCE_BYTES: u64 = 5000;

/// Default cap on the number of missing object names collected.
pub const DEFAULT_MAX_MISSING_NAMES: usize = 20;

/// Suffix of the container holding multipart segments of a container.
pub const SEGMENTS_CONTAINER_SUFFIX: &str = "_segments";

/// Main configuration for an audit run.
///
/// # Quick Start
///
/// ```
/// use s3audit_rs::Config;
/// use s3audit_rs::config::{AuditTask, SizeReportConfig};
///
/// let mut config = Config::for_container("backups");
/// config.task = AuditTask::SizeReport(SizeReportConfig {
///     prefixes: vec!["PROD/".to_string()],
///     depth: 2,
/// });
/// assert_eq!(config.max_keys, 1000);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub container: String,
    pub task: AuditTask,
    pub show_no_progress: bool,
    pub target_client_config: Option<ClientConfig>,
    pub force_retry_config: ForceRetryConfig,
    pub tracing_config: Option<TracingConfig>,
    pub max_keys: i32,
    pub lock_file: Option<PathBuf>,
}

impl Config {
    /// Create a `Config` for the given container with a whole-container size
    /// report as its task. Replace `task` to run another audit.
    pub fn for_container(container: &str) -> Self {
        Config {
            container: container.to_string(),
            ..Config::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            container: String::new(),
            task: AuditTask::SizeReport(SizeReportConfig {
                prefixes: vec![String::new()],
                depth: DEFAULT_DEPTH,
            }),
            show_no_progress: false,
            target_client_config: None,
            force_retry_config: ForceRetryConfig::default(),
            tracing_config: None,
            max_keys: 1000,
            lock_file: None,
        }
    }
}

/// The audit a run performs.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditTask {
    SizeReport(SizeReportConfig),
    DuplicateCheck(DuplicateCheckConfig),
    Reconcile(ReconcileConfig),
}

impl AuditTask {
    pub fn name(&self) -> &'static str {
        match self {
            AuditTask::SizeReport(_) => "size",
            AuditTask::DuplicateCheck(_) => "duplicates",
            AuditTask::Reconcile(_) => "reconcile",
        }
    }
}

/// Bytes stored under each prefix, bucketed by `depth` path segments.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeReportConfig {
    pub prefixes: Vec<String>,
    pub depth: usize,
}

/// Search for objects duplicated under `<name>/<basename>`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DuplicateCheckConfig {
    pub prefix: Option<String>,
    /// Issue real deletes. When false the run only reports.
    pub erase: bool,
}

/// Compare the remote inventory under `prefix` with a local mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileConfig {
    pub prefix: String,
    pub local_path: PathBuf,
    pub depth: usize,
    pub tolerance: u64,
    pub max_missing_names: usize,
    pub include_segments: bool,
    /// Overrides `<container>_segments`.
    pub segments_container: Option<String>,
}

impl ReconcileConfig {
    pub fn new(prefix: &str, local_path: impl Into<PathBuf>) -> Self {
        ReconcileConfig {
            prefix: prefix.to_string(),
            local_path: local_path.into(),
            depth: DEFAULT_DEPTH,
            tolerance: DEFAULT_TOLERANCE_BYTES,
            max_missing_names: DEFAULT_MAX_MISSING_NAMES,
            include_segments: true,
            segments_container: None,
        }
    }

    pub fn segments_container_for(&self, container: &str) -> String {
        self.segments_container
            .clone()
            .unwrap_or_else(|| format!("{container}{SEGMENTS_CONTAINER_SUFFIX}"))
    }
}

impl Default for ForceRetryConfig {
    fn default() -> Self {
        ForceRetryConfig {
            force_retry_count: 0,
            force_retry_interval_milliseconds: 1000,
        }
    }
}

/// Object store client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_config_location: ClientConfigLocation,
    pub credential: S3Credentials,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub retry_config: RetryConfig,
    pub cli_timeout_config: CLITimeoutConfig,
}

impl Default for ClientConfig {
    /// Credentials, region and endpoint all from the environment.
    fn default() -> Self {
        ClientConfig {
            client_config_location: ClientConfigLocation::default(),
            credential: S3Credentials::FromEnvironment,
            region: None,
            endpoint_url: None,
            force_path_style: false,
            retry_config: RetryConfig::default(),
            cli_timeout_config: CLITimeoutConfig::default(),
        }
    }
}

/// SDK-level retry configuration with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub aws_max_attempts: u32,
    pub initial_backoff_milliseconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            aws_max_attempts: 10,
            initial_backoff_milliseconds: 100,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CLITimeoutConfig {
    pub operation_timeout_milliseconds: Option<u64>,
    pub operation_attempt_timeout_milliseconds: Option<u64>,
    pub connect_timeout_milliseconds: Option<u64>,
    pub read_timeout_milliseconds: Option<u64>,
}

/// Tracing (logging) configuration.
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub aws_sdk_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}

/// Application-level retries on top of the SDK's own retries.
///
/// Applied to listing pages and deletes; a page that still fails afterwards
/// is reported as a failed page.
#[derive(Debug, Clone, Copy)]
pub struct ForceRetryConfig {
    pub force_retry_count: u32,
    pub force_retry_interval_milliseconds: u64,
}
