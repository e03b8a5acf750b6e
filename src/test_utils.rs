//! Shared test utilities for the s3audit library crate.
//!
//! Provides a scripted in-memory store that records every call, plus the
//! config and stage helpers used across the unit and property tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_channel::Sender;
use async_trait::async_trait;

use crate::config::{Config, ForceRetryConfig};
use crate::stage::Stage;
use crate::storage::{Storage, StorageTrait};
use crate::types::error::AuditError;
use crate::types::token::create_pipeline_cancellation_token;
use crate::types::{
    AuditStatistics, DeleteResponse, DeleteResponseDetails, ListingPage, ObjectHeaders,
    StatResult,
};

/// Initialise a dummy tracing subscriber for tests.
///
/// Uses `try_init` so that only the first call in a process actually
/// installs the subscriber; subsequent calls are silently ignored.
pub(crate) fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

/// A [`Config`] for container `backups` with no app-level retries.
pub(crate) fn make_test_config() -> Config {
    let mut config = Config::for_container("backups");
    config.force_retry_config = ForceRetryConfig {
        force_retry_count: 0,
        force_retry_interval_milliseconds: 0,
    };
    config
}

pub(crate) fn make_stage(storage: Storage) -> Stage {
    make_stage_with_config(storage, make_test_config())
}

pub(crate) fn make_stage_with_config(storage: Storage, config: Config) -> Stage {
    Stage::new(
        config,
        storage,
        create_pipeline_cancellation_token(),
        Arc::new(AtomicBool::new(false)),
    )
}

pub(crate) fn headers(content_length: u64, etag: &str, content_type: &str) -> ObjectHeaders {
    ObjectHeaders {
        content_length,
        etag: etag.to_string(),
        content_type: content_type.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ListCall {
    pub container: String,
    pub prefix: String,
    pub marker: Option<String>,
}

/// Scripted store.
///
/// Pages registered with [`MockStorage::with_pages`] are chained with
/// synthetic markers (`page-1`, `page-2`, ...) regardless of their own
/// `next_marker`, and their items are filtered by the requested prefix.
/// `stat` answers from the scripted results and reports unknown names as
/// not found. `delete` succeeds unless the name was marked as failing.
#[derive(Clone)]
pub(crate) struct MockStorage {
    pages: HashMap<String, Vec<ListingPage>>,
    stat_results: HashMap<String, Vec<StatResult>>,
    failing_deletes: HashSet<String>,
    fatal_listing: Option<String>,
    list_calls: Arc<Mutex<Vec<ListCall>>>,
    stat_calls: Arc<Mutex<Vec<String>>>,
    delete_calls: Arc<Mutex<Vec<String>>>,
    stats_sender: Sender<AuditStatistics>,
}

impl MockStorage {
    pub fn new(stats_sender: Sender<AuditStatistics>) -> Self {
        Self {
            pages: HashMap::new(),
            stat_results: HashMap::new(),
            failing_deletes: HashSet::new(),
            fatal_listing: None,
            list_calls: Arc::new(Mutex::new(Vec::new())),
            stat_calls: Arc::new(Mutex::new(Vec::new())),
            delete_calls: Arc::new(Mutex::new(Vec::new())),
            stats_sender,
        }
    }

    pub fn with_pages(mut self, container: &str, pages: Vec<ListingPage>) -> Self {
        self.pages.insert(container.to_string(), pages);
        self
    }

    pub fn with_stat(mut self, name: &str, results: Vec<StatResult>) -> Self {
        self.stat_results.insert(name.to_string(), results);
        self
    }

    /// Shortcut for a name with exactly one successful stat.
    pub fn with_object(self, name: &str, object_headers: ObjectHeaders) -> Self {
        self.with_stat(name, vec![StatResult::found(name, object_headers)])
    }

    pub fn with_failing_delete(mut self, name: &str) -> Self {
        self.failing_deletes.insert(name.to_string());
        self
    }

    pub fn with_fatal_listing(mut self, code: &str) -> Self {
        self.fatal_listing = Some(code.to_string());
        self
    }

    /// Report through the channel of a pipeline created around this store.
    pub fn replace_stats_sender(&mut self, stats_sender: Sender<AuditStatistics>) {
        self.stats_sender = stats_sender;
    }

    pub fn list_calls(&self) -> Vec<ListCall> {
        self.list_calls.lock().unwrap().clone()
    }

    pub fn stat_calls(&self) -> Vec<String> {
        self.stat_calls.lock().unwrap().clone()
    }

    pub fn delete_calls(&self) -> Vec<String> {
        self.delete_calls.lock().unwrap().clone()
    }
}

fn page_index(marker: Option<&str>) -> usize {
    marker
        .and_then(|m| m.strip_prefix("page-"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl StorageTrait for MockStorage {
    async fn list_page(
        &self,
        container: &str,
        prefix: &str,
        marker: Option<String>,
        _max_keys: i32,
    ) -> Result<ListingPage> {
        self.list_calls.lock().unwrap().push(ListCall {
            container: container.to_string(),
            prefix: prefix.to_string(),
            marker: marker.clone(),
        });

        if let Some(code) = &self.fatal_listing {
            return Err(anyhow!(AuditError::Store(code.clone())));
        }

        let Some(pages) = self.pages.get(container) else {
            return Ok(ListingPage::succeeded(Vec::new(), None));
        };
        let index = page_index(marker.as_deref());
        let Some(page) = pages.get(index) else {
            return Ok(ListingPage::succeeded(Vec::new(), None));
        };

        let mut page = page.clone();
        page.items.retain(|entry| entry.name.starts_with(prefix));
        page.next_marker = (index + 1 < pages.len()).then(|| format!("page-{}", index + 1));
        Ok(page)
    }

    async fn stat(&self, _container: &str, names: &[String]) -> Result<Vec<StatResult>> {
        let mut results = Vec::new();
        for name in names {
            self.stat_calls.lock().unwrap().push(name.clone());
            match self.stat_results.get(name) {
                Some(scripted) => results.extend(scripted.iter().cloned()),
                None => results.push(StatResult::not_found(name.as_str(), "NotFound")),
            }
        }
        Ok(results)
    }

    async fn delete(&self, container: &str, names: &[String]) -> Result<Vec<DeleteResponse>> {
        let mut responses = Vec::new();
        for name in names {
            self.delete_calls.lock().unwrap().push(name.clone());
            let failing = self.failing_deletes.contains(name);
            responses.push(DeleteResponse {
                success: !failing,
                action: "delete_object".to_string(),
                container: container.to_string(),
                object: name.clone(),
                attempts: 1,
                response: (!failing).then(DeleteResponseDetails::default),
                error: failing.then(|| "AccessDenied: denied".to_string()),
            });
        }
        Ok(responses)
    }

    fn get_stats_sender(&self) -> Sender<AuditStatistics> {
        self.stats_sender.clone()
    }
}
