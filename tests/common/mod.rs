//! Shared integration test infrastructure for s3audit-rs.
//!
//! Provides `MemoryStore`, an in-memory container store implementing the
//! public `StorageTrait`, and helpers that run an `AuditPipeline` over it.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_channel::Sender;
use async_trait::async_trait;
use s3audit_rs::config::{AuditTask, Config, ForceRetryConfig};
use s3audit_rs::{
    AuditPipeline, AuditReport, AuditStatistics, DeleteResponse, DeleteResponseDetails,
    ListingPage, ObjectEntry, ObjectHeaders, StatResult, StorageTrait,
    create_pipeline_cancellation_token,
};

type Containers = HashMap<String, BTreeMap<String, ObjectHeaders>>;

/// Containers of objects kept in sorted maps, listed in key order with the
/// last returned key as the continuation marker.
#[derive(Clone)]
pub struct MemoryStore {
    containers: Arc<Mutex<Containers>>,
    deleted: Arc<Mutex<Vec<String>>>,
    stats_sender: Option<Sender<AuditStatistics>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            containers: Arc::new(Mutex::new(HashMap::new())),
            deleted: Arc::new(Mutex::new(Vec::new())),
            stats_sender: None,
        }
    }

    pub fn put(&self, container: &str, name: &str, size: u64, etag: &str) {
        self.put_with_type(container, name, size, etag, "application/octet-stream");
    }

    pub fn put_with_type(
        &self,
        container: &str,
        name: &str,
        size: u64,
        etag: &str,
        content_type: &str,
    ) {
        self.containers
            .lock()
            .unwrap()
            .entry(container.to_string())
            .or_default()
            .insert(
                name.to_string(),
                ObjectHeaders {
                    content_length: size,
                    etag: etag.to_string(),
                    content_type: content_type.to_string(),
                },
            );
    }

    pub fn contains(&self, container: &str, name: &str) -> bool {
        self.containers
            .lock()
            .unwrap()
            .get(container)
            .is_some_and(|objects| objects.contains_key(name))
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn attach(&self, stats_sender: Sender<AuditStatistics>) -> Self {
        Self {
            stats_sender: Some(stats_sender),
            ..self.clone()
        }
    }
}

#[async_trait]
impl StorageTrait for MemoryStore {
    async fn list_page(
        &self,
        container: &str,
        prefix: &str,
        marker: Option<String>,
        max_keys: i32,
    ) -> Result<ListingPage> {
        let containers = self.containers.lock().unwrap();
        let Some(objects) = containers.get(container) else {
            return Ok(ListingPage::failed("NoSuchBucket"));
        };

        let max_keys = usize::try_from(max_keys).unwrap_or(1).max(1);
        let mut matching = objects
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .filter(|(name, _)| marker.as_deref().is_none_or(|m| name.as_str() > m));

        let items: Vec<ObjectEntry> = matching
            .by_ref()
            .take(max_keys)
            .map(|(name, headers)| ObjectEntry::new(name.clone(), headers.content_length))
            .collect();
        let next_marker = if matching.next().is_some() {
            items.last().map(|entry| entry.name.clone())
        } else {
            None
        };

        Ok(ListingPage::succeeded(items, next_marker))
    }

    async fn stat(&self, container: &str, names: &[String]) -> Result<Vec<StatResult>> {
        let containers = self.containers.lock().unwrap();
        Ok(names
            .iter()
            .map(|name| {
                match containers
                    .get(container)
                    .and_then(|objects| objects.get(name))
                {
                    Some(headers) => StatResult::found(name.as_str(), headers.clone()),
                    None => StatResult::not_found(name.as_str(), "NotFound"),
                }
            })
            .collect())
    }

    async fn delete(&self, container: &str, names: &[String]) -> Result<Vec<DeleteResponse>> {
        let mut containers = self.containers.lock().unwrap();
        let mut responses = Vec::new();
        for name in names {
            let removed = containers
                .get_mut(container)
                .and_then(|objects| objects.remove(name))
                .is_some();
            if removed {
                self.deleted.lock().unwrap().push(name.clone());
            }
            responses.push(DeleteResponse {
                success: removed,
                action: "delete_object".to_string(),
                container: container.to_string(),
                object: name.clone(),
                attempts: 1,
                response: removed.then(DeleteResponseDetails::default),
                error: (!removed).then(|| "NoSuchKey".to_string()),
            });
        }
        Ok(responses)
    }

    fn get_stats_sender(&self) -> Sender<AuditStatistics> {
        match &self.stats_sender {
            Some(sender) => sender.clone(),
            None => async_channel::unbounded().0,
        }
    }
}

/// Result of one pipeline run over a `MemoryStore`.
pub struct RunResult {
    pub report: Result<AuditReport>,
    pub stats: Vec<AuditStatistics>,
    pub has_warning: bool,
}

pub fn config_for(container: &str, task: AuditTask) -> Config {
    Config {
        task,
        force_retry_config: ForceRetryConfig {
            force_retry_count: 0,
            force_retry_interval_milliseconds: 0,
        },
        ..Config::for_container(container)
    }
}

pub async fn run_pipeline(store: &MemoryStore, config: Config) -> RunResult {
    let mut pipeline =
        AuditPipeline::with_storage(config, create_pipeline_cancellation_token(), |stats_sender| {
            Box::new(store.attach(stats_sender))
        });
    let stats_receiver = pipeline.get_stats_receiver();

    let report = pipeline.run().await;

    let mut stats = Vec::new();
    while let Ok(stat) = stats_receiver.try_recv() {
        stats.push(stat);
    }

    RunResult {
        report,
        stats,
        has_warning: pipeline.has_warning(),
    }
}

/// Writes `size` zero bytes to `root/name`, creating parent directories.
pub fn write_local_file(root: &Path, name: &str, size: usize) {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, vec![0u8; size]).unwrap();
}
