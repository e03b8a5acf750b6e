use anyhow::Result;
use tracing::{debug, info, trace, warn};

use crate::config::DuplicateCheckConfig;
use crate::lister::ObjectLister;
use crate::stage::Stage;
use crate::types::{AuditStatistics, DeleteResponse, ObjectHeaders, StatResult};

/// The key a copy of `name` would have if it had been re-uploaded under
/// itself: `name + "/" + basename(name)`.
///
/// ```
/// use s3audit_rs::duplicates::nested_key;
///
/// assert_eq!(nested_key("PROD/db/dump.gz"), "PROD/db/dump.gz/dump.gz");
/// ```
pub fn nested_key(name: &str) -> String {
    let basename = name.rsplit('/').next().unwrap_or(name);
    format!("{name}/{basename}")
}

/// Content length, ETag and content type must all match exactly.
pub fn headers_match(source: &ObjectHeaders, nested: &ObjectHeaders) -> bool {
    source.content_length == nested.content_length
        && source.etag == nested.etag
        && source.content_type == nested.content_type
}

/// An object and the copy found under its nested key.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicatePair {
    pub source: StatResult,
    pub nested: StatResult,
    pub equal: bool,
}

impl DuplicatePair {
    pub fn new(source: StatResult, nested: StatResult) -> Self {
        let equal = match (&source.headers, &nested.headers) {
            (Some(source_headers), Some(nested_headers)) => {
                headers_match(source_headers, nested_headers)
            }
            _ => false,
        };
        Self {
            source,
            nested,
            equal,
        }
    }

    /// Bytes freed by deleting the nested copy.
    pub fn reclaimable_bytes(&self) -> u64 {
        self.nested.content_length()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DuplicateReport {
    pub container: String,
    pub prefix: Option<String>,
    pub erase: bool,
    /// Every pair found, equal or not, in listing order.
    pub pairs: Vec<DuplicatePair>,
    pub reclaimable_bytes: u64,
    pub objects_checked: u64,
    /// Nested keys whose stat returned more than one success.
    pub ambiguous: Vec<String>,
    /// Source names whose own stat was not a single success.
    pub unreadable_sources: Vec<String>,
    pub delete_responses: Vec<DeleteResponse>,
    pub failed_pages: u64,
}

impl DuplicateReport {
    pub fn deletable(&self) -> impl Iterator<Item = &DuplicatePair> {
        self.pairs.iter().filter(|pair| pair.equal)
    }

    pub fn not_duplicates(&self) -> impl Iterator<Item = &DuplicatePair> {
        self.pairs.iter().filter(|pair| !pair.equal)
    }

    pub fn deleted_count(&self) -> usize {
        self.delete_responses.iter().filter(|r| r.success).count()
    }

    pub fn delete_failures(&self) -> impl Iterator<Item = &DeleteResponse> {
        self.delete_responses.iter().filter(|r| !r.success)
    }
}

/// Finds objects duplicated under their nested key and, with `erase`,
/// deletes the nested copy.
pub struct DuplicateDetector {
    stage: Stage,
    erase: bool,
}

impl DuplicateDetector {
    pub fn new(stage: Stage, duplicate_config: &DuplicateCheckConfig) -> Self {
        Self {
            stage,
            erase: duplicate_config.erase,
        }
    }

    /// Evaluates one candidate per listed entry, in listing order.
    pub async fn detect(&self, container: &str, prefix: Option<&str>) -> Result<DuplicateReport> {
        let mut report = DuplicateReport {
            container: container.to_string(),
            prefix: prefix.map(str::to_string),
            erase: self.erase,
            ..DuplicateReport::default()
        };

        info!(
            container = container,
            prefix = prefix,
            erase = self.erase,
            "duplicate check started."
        );

        let mut lister = ObjectLister::new(self.stage.clone(), container, prefix.unwrap_or(""));
        while let Some(page) = lister.next_page().await? {
            if !page.success {
                continue;
            }
            for entry in &page.items {
                self.evaluate(container, &entry.name, &mut report).await?;
            }
        }
        report.failed_pages = lister.pages_failed();

        info!(
            container = container,
            objects = report.objects_checked,
            duplicates = report.deletable().count(),
            reclaimable_bytes = report.reclaimable_bytes,
            "duplicate check completed."
        );

        Ok(report)
    }

    async fn evaluate(
        &self,
        container: &str,
        name: &str,
        report: &mut DuplicateReport,
    ) -> Result<()> {
        report.objects_checked += 1;
        trace!(key = name, "investigating object.");

        let nested_name = nested_key(name);
        let Some(nested) = self
            .single_success(container, &nested_name, report)
            .await?
        else {
            return Ok(());
        };

        let Some(source) = self.source_stat(container, name).await? else {
            warn!(
                key = name,
                nested_key = nested_name,
                "nested copy exists but the object itself could not be read."
            );
            self.stage.set_warning();
            report.unreadable_sources.push(name.to_string());
            return Ok(());
        };

        let pair = DuplicatePair::new(source, nested);
        if pair.equal {
            let bytes = pair.reclaimable_bytes();
            report.reclaimable_bytes += bytes;
            self.stage
                .send_stats(AuditStatistics::DuplicateFound {
                    key: nested_name.clone(),
                    bytes,
                })
                .await;

            if self.erase {
                self.erase_nested(container, &nested_name, report).await?;
            } else {
                info!(
                    key = nested_name,
                    size = bytes,
                    "Would have deleted {} : {}.",
                    nested_name,
                    bytes
                );
            }
        } else {
            warn!(
                key = name,
                nested_key = nested_name,
                source = ?pair.source.headers,
                nested = ?pair.nested.headers,
                "not a duplicate: metadata differs."
            );
            self.stage.set_warning();
            self.stage
                .send_stats(AuditStatistics::NotDuplicate {
                    key: nested_name.clone(),
                })
                .await;
        }

        report.pairs.push(pair);
        Ok(())
    }

    /// The nested key's stat, if it is exactly one success.
    async fn single_success(
        &self,
        container: &str,
        nested_name: &str,
        report: &mut DuplicateReport,
    ) -> Result<Option<StatResult>> {
        let mut successes: Vec<StatResult> = self
            .stage
            .target
            .stat(container, &[nested_name.to_string()])
            .await?
            .into_iter()
            .filter(|stat| stat.success)
            .collect();

        match successes.len() {
            0 => Ok(None),
            1 => Ok(successes.pop()),
            count => {
                warn!(
                    key = nested_name,
                    count = count,
                    "multiple entries with the same name, not treated as a duplicate."
                );
                self.stage.set_warning();
                self.stage
                    .send_stats(AuditStatistics::StatAmbiguous {
                        key: nested_name.to_string(),
                    })
                    .await;
                report.ambiguous.push(nested_name.to_string());
                Ok(None)
            }
        }
    }

    async fn source_stat(&self, container: &str, name: &str) -> Result<Option<StatResult>> {
        let mut successes: Vec<StatResult> = self
            .stage
            .target
            .stat(container, &[name.to_string()])
            .await?
            .into_iter()
            .filter(|stat| stat.success)
            .collect();

        if successes.len() == 1 {
            Ok(successes.pop())
        } else {
            Ok(None)
        }
    }

    async fn erase_nested(
        &self,
        container: &str,
        nested_name: &str,
        report: &mut DuplicateReport,
    ) -> Result<()> {
        let responses = self
            .stage
            .target
            .delete(container, &[nested_name.to_string()])
            .await?;

        for response in responses {
            if response.success {
                info!(
                    container = response.container,
                    key = response.object,
                    attempts = response.attempts,
                    "Successfully deleted {}/{} in {} attempts.",
                    response.container,
                    response.object,
                    response.attempts
                );
                self.stage
                    .send_stats(AuditStatistics::DeleteComplete {
                        key: response.object.clone(),
                    })
                    .await;
            } else {
                warn!(
                    container = response.container,
                    key = response.object,
                    attempts = response.attempts,
                    error = response.error,
                    "delete failed for {}/{}.",
                    response.container,
                    response.object
                );
                self.stage.set_warning();
                self.stage
                    .send_stats(AuditStatistics::DeleteError {
                        key: response.object.clone(),
                    })
                    .await;
            }
            debug!(action = response.action, key = response.object, "delete response.");
            report.delete_responses.push(response);
        }

        Ok(())
    }
}
