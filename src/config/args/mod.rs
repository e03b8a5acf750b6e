use crate::config::{
    AuditTask, CLITimeoutConfig, ClientConfig, Config, DEFAULT_DEPTH, DEFAULT_MAX_MISSING_NAMES,
    DuplicateCheckConfig, ForceRetryConfig, ReconcileConfig, RetryConfig, SizeReportConfig,
    TracingConfig,
};
use crate::types::{AccessKeys, ClientConfigLocation, S3Credentials};
use clap::builder::NonEmptyStringValueParser;
use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::ffi::OsString;
use std::path::PathBuf;

pub mod value_parser;


use value_parser::human_bytes::{check_human_bytes, parse_human_bytes};

// ---------------------------------------------------------------------------
// Default constants
// ---------------------------------------------------------------------------

const DEFAULT_AWS_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_FORCE_RETRY_COUNT: u32 = 5;
const DEFAULT_FORCE_RETRY_INTERVAL_MILLISECONDS: u64 = 1000;
const DEFAULT_INITIAL_BACKOFF_MILLISECONDS: u64 = 100;
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_AWS_SDK_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;
const DEFAULT_FORCE_PATH_STYLE: bool = false;
const DEFAULT_SHOW_NO_PROGRESS: bool = false;
const DEFAULT_MAX_KEYS: i32 = 1000;
const DEFAULT_TOLERANCE: &str = "5000";
const DEFAULT_ERASE: bool = false;
const DEFAULT_NO_SEGMENTS: bool = false;

// ---------------------------------------------------------------------------
// Error messages
// ---------------------------------------------------------------------------

const ERROR_MESSAGE_COMMAND_REQUIRED: &str =
    "A subcommand is required: size, duplicates or reconcile.";
const ERROR_MESSAGE_MAX_KEYS_OUT_OF_RANGE: &str = "Max keys must be between 1 and 1000.";
const ERROR_MESSAGE_SECRET_KEY_REQUIRED: &str =
    "--secret-key is required when --access-key is given.";
const ERROR_MESSAGE_EMPTY_LOCAL_PATH: &str = "Local path must not be empty.";

// ---------------------------------------------------------------------------
// CLIArgs (clap-derived argument struct)
// ---------------------------------------------------------------------------

/// s3audit - Inventory audit for S3-compatible object storage.
///
/// Finds duplicated objects, reports stored bytes by prefix, and checks a
/// local mirror against the remote inventory.
///
/// Example:
///   s3audit size --container backups --prefix PROD/TEST --depth 2
///   s3audit duplicates --container backups --prefix PROD/ --erase
///   s3audit reconcile --container backups --prefix PROD/TEST --local-path /srv/mirror
#[derive(Parser, Clone, Debug)]
#[command(name = "s3audit", version, about, long_about = None)]
pub struct CLIArgs {
    #[command(subcommand)]
    pub command: Option<AuditCommand>,

    // -----------------------------------------------------------------------
    // General options
    // -----------------------------------------------------------------------
    /// Don't show the progress indicator.
    #[arg(long, env, global = true, default_value_t = DEFAULT_SHOW_NO_PROGRESS, help_heading = "General")]
    pub show_no_progress: bool,

    /// Advisory lock file held for the whole run. Default: <tmp>/s3audit.lock.
    #[arg(long, env, global = true, help_heading = "General")]
    pub lock_file: Option<PathBuf>,

    // -----------------------------------------------------------------------
    // Logging options
    // -----------------------------------------------------------------------
    /// Verbosity level. -q (quiet), default (normal), -v, -vv, -vvv.
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Output logs in JSON format.
    #[arg(long, env, global = true, default_value_t = DEFAULT_JSON_TRACING, help_heading = "Logging")]
    pub json_tracing: bool,

    /// Enable AWS SDK tracing.
    #[arg(long, env, global = true, default_value_t = DEFAULT_AWS_SDK_TRACING, help_heading = "Logging")]
    pub aws_sdk_tracing: bool,

    /// Enable tracing span events.
    #[arg(long, env, global = true, default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Logging")]
    pub span_events_tracing: bool,

    /// Disable colored output in logs.
    #[arg(long, env, global = true, default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Logging")]
    pub disable_color_tracing: bool,

    // -----------------------------------------------------------------------
    // Retry options
    // -----------------------------------------------------------------------
    /// Maximum retry attempts for AWS SDK operations. Default: 10.
    #[arg(long, env, global = true, default_value_t = DEFAULT_AWS_MAX_ATTEMPTS, help_heading = "Retry")]
    pub aws_max_attempts: u32,

    /// Initial backoff in milliseconds for retries. Default: 100.
    #[arg(long, env, global = true, default_value_t = DEFAULT_INITIAL_BACKOFF_MILLISECONDS, help_heading = "Retry")]
    pub initial_backoff_milliseconds: u64,

    /// Application-level retries of a listing page or delete (after SDK retries). Default: 5.
    #[arg(long, env, global = true, default_value_t = DEFAULT_FORCE_RETRY_COUNT, help_heading = "Retry")]
    pub force_retry_count: u32,

    /// Interval in ms between force retries. Default: 1000.
    #[arg(long, env, global = true, default_value_t = DEFAULT_FORCE_RETRY_INTERVAL_MILLISECONDS, help_heading = "Retry")]
    pub force_retry_interval_milliseconds: u64,

    // -----------------------------------------------------------------------
    // Timeout options
    // -----------------------------------------------------------------------
    /// Overall operation timeout in milliseconds.
    #[arg(long, env, global = true, help_heading = "Timeout")]
    pub operation_timeout_milliseconds: Option<u64>,

    /// Per-attempt operation timeout in milliseconds.
    #[arg(long, env, global = true, help_heading = "Timeout")]
    pub operation_attempt_timeout_milliseconds: Option<u64>,

    /// Connection timeout in milliseconds.
    #[arg(long, env, global = true, help_heading = "Timeout")]
    pub connect_timeout_milliseconds: Option<u64>,

    /// Read timeout in milliseconds.
    #[arg(long, env, global = true, help_heading = "Timeout")]
    pub read_timeout_milliseconds: Option<u64>,

    // -----------------------------------------------------------------------
    // Store session options (passed through to the SDK unchanged)
    // -----------------------------------------------------------------------
    /// AWS config file path.
    #[arg(long, env, global = true, help_heading = "Store")]
    pub aws_config_file: Option<PathBuf>,

    /// AWS shared credentials file path.
    #[arg(long, env, global = true, help_heading = "Store")]
    pub aws_shared_credentials_file: Option<PathBuf>,

    /// Profile name. If not set, credentials come from the environment.
    #[arg(long, env, global = true, value_parser = NonEmptyStringValueParser::new(), help_heading = "Store")]
    pub profile: Option<String>,

    /// Access key ID.
    #[arg(long, env, global = true, conflicts_with = "profile", value_parser = NonEmptyStringValueParser::new(), help_heading = "Store")]
    pub access_key: Option<String>,

    /// Secret access key.
    #[arg(long, env, global = true, value_parser = NonEmptyStringValueParser::new(), help_heading = "Store")]
    pub secret_key: Option<String>,

    /// Session token.
    #[arg(long, env, global = true, value_parser = NonEmptyStringValueParser::new(), help_heading = "Store")]
    pub session_token: Option<String>,

    /// Region of the object store.
    #[arg(long, env, global = true, value_parser = NonEmptyStringValueParser::new(), help_heading = "Store")]
    pub region: Option<String>,

    /// Custom S3-compatible endpoint URL.
    #[arg(long, env, global = true, value_parser = value_parser::url::check_scheme, help_heading = "Store")]
    pub endpoint_url: Option<String>,

    /// Force path-style access (required by most S3-compatible services).
    #[arg(long, env, global = true, default_value_t = DEFAULT_FORCE_PATH_STYLE, help_heading = "Store")]
    pub force_path_style: bool,

    // -----------------------------------------------------------------------
    // Advanced options
    // -----------------------------------------------------------------------
    /// Max keys per listing request. Default: 1000.
    #[arg(long, env, global = true, default_value_t = DEFAULT_MAX_KEYS, help_heading = "Advanced")]
    pub max_keys: i32,

    /// Generate shell completions.
    #[arg(long, env, help_heading = "Advanced")]
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum AuditCommand {
    /// Print remote data size by depth for one or more prefixes.
    Size(SizeArgs),
    /// Find objects duplicated under `<name>/<basename>` and optionally delete them.
    Duplicates(DuplicatesArgs),
    /// Check a local mirror against the remote inventory.
    ///
    /// Exit code 0: mirror complete, 1: files missing locally,
    /// 2: remote exceeds local by more than the tolerance,
    /// 3: local directory absent.
    Reconcile(ReconcileArgs),
}

#[derive(Args, Clone, Debug)]
pub struct SizeArgs {
    /// Container (bucket) to inspect.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new())]
    pub container: String,

    /// Path to look at, without leading '/'. Repeat for several prefixes.
    #[arg(long, required = true)]
    pub prefix: Vec<String>,

    /// Number of path segments to group sizes by.
    #[arg(long, default_value_t = DEFAULT_DEPTH as u16, value_parser = clap::value_parser!(u16).range(1..))]
    pub depth: u16,
}

#[derive(Args, Clone, Debug)]
pub struct DuplicatesArgs {
    /// Container (bucket) to inspect.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new())]
    pub container: String,

    /// Path to look at, without leading '/'. Whole container when omitted.
    #[arg(long)]
    pub prefix: Option<String>,

    /// Perform the delete. Without it duplicates are only reported.
    #[arg(long, default_value_t = DEFAULT_ERASE)]
    pub erase: bool,
}

#[derive(Args, Clone, Debug)]
pub struct ReconcileArgs {
    /// Container (bucket) to inspect.
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new())]
    pub container: String,

    /// Path to compare, without leading '/'.
    #[arg(long)]
    pub prefix: String,

    /// Local directory the container was downloaded to.
    #[arg(long)]
    pub local_path: PathBuf,

    /// Number of path segments to group remote sizes by.
    #[arg(long, default_value_t = DEFAULT_DEPTH as u16, value_parser = clap::value_parser!(u16).range(1..))]
    pub depth: u16,

    /// Allowed remote-over-local excess.
    #[arg(
        long,
        default_value = DEFAULT_TOLERANCE,
        value_parser = check_human_bytes,
        long_help = r#"Allowed amount by which the remote size may exceed the local size.
Allow suffixes: KB, KiB, MB, MiB, GB, GiB"#
    )]
    pub tolerance: String,

    /// Maximum number of missing object names to report.
    #[arg(long, default_value_t = DEFAULT_MAX_MISSING_NAMES)]
    pub max_missing_names: usize,

    /// Skip the `<container>_segments` size pass.
    #[arg(long, default_value_t = DEFAULT_NO_SEGMENTS)]
    pub no_segments: bool,

    /// Name of the segments container. Default: <container>_segments.
    #[arg(long, conflicts_with = "no_segments", value_parser = NonEmptyStringValueParser::new())]
    pub segments_container: Option<String>,
}

// ---------------------------------------------------------------------------
// parse_from_args (public API)
// ---------------------------------------------------------------------------

/// Parse command-line arguments into a `CLIArgs` struct.
///
/// # Example
///
/// ```
/// use s3audit_rs::config::args::parse_from_args;
///
/// let args = vec!["s3audit", "duplicates", "--container", "backups", "--erase"];
/// let cli_args = parse_from_args(args).unwrap();
/// assert!(cli_args.command.is_some());
/// ```
pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

/// Parse arguments and build a Config in one step.
pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    Config::try_from(cli_args)
}

// ---------------------------------------------------------------------------
// Validation and Config conversion
// ---------------------------------------------------------------------------

impl CLIArgs {
    fn validate(&self) -> Result<(), String> {
        if !(1..=1000).contains(&self.max_keys) {
            return Err(ERROR_MESSAGE_MAX_KEYS_OUT_OF_RANGE.to_string());
        }
        if self.access_key.is_some() && self.secret_key.is_none() {
            return Err(ERROR_MESSAGE_SECRET_KEY_REQUIRED.to_string());
        }
        Ok(())
    }

    fn build_client_config(&self) -> Option<ClientConfig> {
        let credential = if let Some(ref profile) = self.profile {
            S3Credentials::Profile(profile.clone())
        } else if let Some(ref access_key) = self.access_key {
            S3Credentials::Credentials {
                access_keys: AccessKeys {
                    access_key: access_key.clone(),
                    secret_access_key: self.secret_key.clone().unwrap_or_default(),
                    session_token: self.session_token.clone(),
                },
            }
        } else {
            S3Credentials::FromEnvironment
        };

        Some(ClientConfig {
            client_config_location: ClientConfigLocation {
                aws_config_file: self.aws_config_file.clone(),
                aws_shared_credentials_file: self.aws_shared_credentials_file.clone(),
            },
            credential,
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
            force_path_style: self.force_path_style,
            retry_config: RetryConfig {
                aws_max_attempts: self.aws_max_attempts,
                initial_backoff_milliseconds: self.initial_backoff_milliseconds,
            },
            cli_timeout_config: CLITimeoutConfig {
                operation_timeout_milliseconds: self.operation_timeout_milliseconds,
                operation_attempt_timeout_milliseconds: self.operation_attempt_timeout_milliseconds,
                connect_timeout_milliseconds: self.connect_timeout_milliseconds,
                read_timeout_milliseconds: self.read_timeout_milliseconds,
            },
        })
    }

    fn build_tracing_config(&self) -> Option<TracingConfig> {
        let log_level = self.verbosity.log_level()?;

        Some(TracingConfig {
            tracing_level: log_level,
            json_tracing: self.json_tracing,
            aws_sdk_tracing: self.aws_sdk_tracing,
            span_events_tracing: self.span_events_tracing,
            disable_color_tracing: self.disable_color_tracing,
        })
    }
}

impl AuditCommand {
    fn into_container_and_task(self) -> Result<(String, AuditTask), String> {
        match self {
            AuditCommand::Size(args) => Ok((
                args.container,
                AuditTask::SizeReport(SizeReportConfig {
                    prefixes: args.prefix,
                    depth: args.depth as usize,
                }),
            )),
            AuditCommand::Duplicates(args) => Ok((
                args.container,
                AuditTask::DuplicateCheck(DuplicateCheckConfig {
                    prefix: args.prefix.filter(|p| !p.is_empty()),
                    erase: args.erase,
                }),
            )),
            AuditCommand::Reconcile(args) => {
                if args.local_path.as_os_str().is_empty() {
                    return Err(ERROR_MESSAGE_EMPTY_LOCAL_PATH.to_string());
                }
                let tolerance = parse_human_bytes(&args.tolerance)
                    .map_err(|e| format!("Invalid tolerance: {e}"))?;
                Ok((
                    args.container,
                    AuditTask::Reconcile(ReconcileConfig {
                        prefix: args.prefix,
                        local_path: args.local_path,
                        depth: args.depth as usize,
                        tolerance,
                        max_missing_names: args.max_missing_names,
                        include_segments: !args.no_segments,
                        segments_container: args.segments_container,
                    }),
                ))
            }
        }
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(args: CLIArgs) -> Result<Self, Self::Error> {
        args.validate()?;

        let target_client_config = args.build_client_config();
        let tracing_config = args.build_tracing_config();

        let command = args
            .command
            .clone()
            .ok_or_else(|| ERROR_MESSAGE_COMMAND_REQUIRED.to_string())?;
        let (container, task) = command.into_container_and_task()?;

        Ok(Config {
            container,
            task,
            show_no_progress: args.show_no_progress,
            target_client_config,
            force_retry_config: ForceRetryConfig {
                force_retry_count: args.force_retry_count,
                force_retry_interval_milliseconds: args.force_retry_interval_milliseconds,
            },
            tracing_config,
            max_keys: args.max_keys,
            lock_file: args.lock_file,
        })
    }
}
