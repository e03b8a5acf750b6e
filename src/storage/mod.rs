use anyhow::Result;
use async_channel::Sender;
use async_trait::async_trait;
use dyn_clone::DynClone;

use crate::config::Config;
use crate::types::token::PipelineCancellationToken;
use crate::types::{AuditStatistics, DeleteResponse, ListingPage, StatResult};

pub mod s3;

/// Type alias for a boxed Storage trait object.
pub type Storage = Box<dyn StorageTrait + Send + Sync>;

/// The object store seen by the audit engine.
///
/// Listing is pull-based: the caller asks for one page at a time and passes
/// back the `next_marker` of the previous page. A page-level store failure
/// is returned as `Ok(ListingPage { success: false, .. })`; `Err` is reserved
/// for conditions that end the run (authentication, transport, cancellation).
///
/// `stat` and `delete` take a batch of names and return one result per
/// name the store reports on. Callers must not assume exactly one result per
/// name.
#[async_trait]
pub trait StorageTrait: DynClone {
    /// Fetch the page of `container` that follows `marker`, restricted to
    /// names starting with `prefix` (empty prefix = whole container).
    async fn list_page(
        &self,
        container: &str,
        prefix: &str,
        marker: Option<String>,
        max_keys: i32,
    ) -> Result<ListingPage>;

    /// Look up the metadata of each name.
    ///
    /// A missing object yields an unsuccessful `StatResult`, not an error.
    async fn stat(&self, container: &str, names: &[String]) -> Result<Vec<StatResult>>;

    /// Delete each name. Per-object failures are reported in the responses.
    async fn delete(&self, container: &str, names: &[String]) -> Result<Vec<DeleteResponse>>;

    /// Get the statistics sender channel.
    fn get_stats_sender(&self) -> Sender<AuditStatistics>;
}

dyn_clone::clone_trait_object!(StorageTrait);

/// Create the S3-backed store for an audit run.
///
/// Without a `target_client_config` the session is built from the
/// environment with default retry settings.
pub async fn create_storage(
    config: Config,
    cancellation_token: PipelineCancellationToken,
    stats_sender: Sender<AuditStatistics>,
) -> Storage {
    let client_config = config.target_client_config.clone().unwrap_or_default();

    s3::S3StorageFactory::create(config, client_config, cancellation_token, stats_sender).await
}
