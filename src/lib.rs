/*!
# Overview
s3audit-rs audits the contents of an S3-compatible object storage container.

## Features
- **Duplicate detection**: finds objects re-uploaded under `<name>/<basename>`
  with identical metadata, reports the reclaimable bytes and optionally
  deletes the nested copies
- **Size report**: bytes stored per prefix, bucketed by path depth
- **Mirror reconciliation**: checks a local download of a prefix against the
  remote inventory (including the `<container>_segments` container) and
  classifies the result into an exit code
- **Library-First**: the `s3audit` CLI is a thin wrapper over this crate

## As a Library

```toml
[dependencies]
s3audit-rs = "0.1"
tokio = { version = "1", features = ["full"] }
```

```no_run
use s3audit_rs::config::args::parse_from_args;
use s3audit_rs::{AuditPipeline, Config, create_pipeline_cancellation_token};

#[tokio::main]
async fn main() {
    let args = vec![
        "s3audit",
        "reconcile",
        "--container",
        "backups",
        "--prefix",
        "PROD/TEST",
        "--local-path",
        "/srv/mirror",
    ];

    let parsed_args = parse_from_args(args).unwrap();
    let config = Config::try_from(parsed_args).unwrap();
    let cancellation_token = create_pipeline_cancellation_token();
    let mut pipeline = AuditPipeline::new(config, cancellation_token).await;
    pipeline.close_stats_sender();

    match pipeline.run().await {
        Ok(report) => {
            println!("{report}");
            std::process::exit(report.exit_code());
        }
        Err(e) => {
            eprintln!("{e:?}");
            std::process::exit(s3audit_rs::exit_code_from_error(&e));
        }
    }
}
```
*/

#![allow(clippy::collapsible_if)]

pub mod aggregator;
pub mod config;
pub mod duplicates;
pub mod lister;
pub mod local;
pub mod outcome;
pub mod pipeline;
pub mod reconciler;
pub mod report;
pub mod stage;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;


pub use config::Config;
pub use config::args::{CLIArgs, build_config_from_args, parse_from_args};
pub use outcome::AuditOutcome;
pub use pipeline::{AuditPipeline, AuditReport};
pub use storage::{Storage, StorageTrait};
pub use types::error::{AuditError, EXIT_CODE_FATAL, exit_code_from_error, is_cancelled_error};
pub use types::token::{PipelineCancellationToken, create_pipeline_cancellation_token};
pub use types::{
    AuditStatistics, DeleteResponse, DeleteResponseDetails, ListingPage, ObjectEntry,
    ObjectHeaders, StatResult,
};
