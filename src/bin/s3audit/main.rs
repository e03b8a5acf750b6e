use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tracing::{debug, error, trace};

use s3audit_rs::config::Config;
use s3audit_rs::{
    AuditPipeline, CLIArgs, EXIT_CODE_FATAL, create_pipeline_cancellation_token,
    exit_code_from_error, is_cancelled_error,
};

mod ctrl_c_handler;
pub mod indicator;
mod lock;
mod tracing_init;
pub mod ui_config;

/// s3audit - audits an S3-compatible container for duplicates, sizes and
/// mirror completeness.
///
/// This binary is a thin wrapper over the s3audit-rs library. The exit code
/// is the audit outcome (0-3), or 4 when the run fails.
#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() -> ExitCode {
    let args = match CLIArgs::try_parse() {
        Ok(args) => args,
        Err(e) => return exit_with_clap_error(e),
    };

    if let Some(shell) = args.auto_complete_shell {
        generate(
            shell,
            &mut CLIArgs::command(),
            "s3audit",
            &mut std::io::stdout(),
        );

        return ExitCode::SUCCESS;
    }

    let config = match Config::try_from(args) {
        Ok(config) => config,
        Err(error_message) => {
            return exit_with_clap_error(clap::Error::raw(
                clap::error::ErrorKind::ValueValidation,
                format!("{error_message}\n"),
            ));
        }
    };

    start_tracing_if_necessary(&config);

    trace!("config = {:?}", config);

    match run(config).await {
        Ok(code) => to_exit_code(code),
        Err(e) => {
            if is_cancelled_error(&e) {
                debug!("audit cancelled by user.");
            }
            eprintln!("s3audit failed: {e:#}");
            to_exit_code(exit_code_from_error(&e))
        }
    }
}

/// Help and version requests exit as clap decides; usage errors are fatal.
#[cfg_attr(coverage_nightly, coverage(off))]
fn exit_with_clap_error(e: clap::Error) -> ExitCode {
    if !e.use_stderr() {
        e.exit();
    }
    let _ = e.print();
    to_exit_code(EXIT_CODE_FATAL)
}

fn to_exit_code(code: i32) -> ExitCode {
    ExitCode::from(exit_byte(code))
}

fn exit_byte(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(u8::MAX)
}

fn start_tracing_if_necessary(config: &Config) -> bool {
    let Some(tracing_config) = &config.tracing_config else {
        return false;
    };

    tracing_init::init_tracing(tracing_config);
    true
}

/// Runs the audit under the run lock and prints the report.
///
/// Returns the outcome's exit code. The lock guard is dropped on every
/// path out of this function.
async fn run(config: Config) -> Result<i32> {
    let _run_lock = lock::RunLock::acquire(&lock::lock_path(&config))?;

    let cancellation_token = create_pipeline_cancellation_token();
    ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

    let start_time = tokio::time::Instant::now();
    debug!("audit pipeline start.");

    let mut pipeline = AuditPipeline::new(config.clone(), cancellation_token.clone()).await;
    let indicator_join_handle = indicator::show_indicator(
        pipeline.get_stats_receiver(),
        ui_config::is_progress_indicator_needed(&config),
        ui_config::is_show_result_needed(&config),
    );

    let result = pipeline.run().await;
    indicator_join_handle.await?;
    // Stops the Ctrl-C watcher.
    cancellation_token.cancel();

    let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if !is_cancelled_error(&e) {
                error!(duration_sec = duration_sec, "s3audit failed.");
            }
            return Err(e);
        }
    };

    println!("{report}");

    debug!(
        duration_sec = duration_sec,
        has_warning = pipeline.has_warning(),
        "s3audit has been completed."
    );

    Ok(report.exit_code())
}
