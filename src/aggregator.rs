use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{debug, info};

use crate::config::SizeReportConfig;
use crate::lister::ObjectLister;
use crate::stage::Stage;
use crate::types::ObjectEntry;

/// Cumulative bytes per truncated prefix, ordered lexicographically.
pub type AggregateBucket = BTreeMap<String, u64>;

/// The first `depth` slash-delimited segments of `name`.
///
/// Names with fewer segments map to themselves. A depth of 0 is treated
/// as 1.
///
/// ```
/// use s3audit_rs::aggregator::bucket_key;
///
/// assert_eq!(bucket_key("PROD/TEST/db/dump.gz", 2), "PROD/TEST");
/// assert_eq!(bucket_key("PROD", 3), "PROD");
/// ```
pub fn bucket_key(name: &str, depth: usize) -> &str {
    match name.match_indices('/').nth(depth.max(1) - 1) {
        Some((index, _)) => &name[..index],
        None => name,
    }
}

/// Buckets a set of entries in one pass.
pub fn accumulate(entries: &[ObjectEntry], depth: usize) -> AggregateBucket {
    let mut aggregator = PrefixAggregator::new(depth);
    aggregator.add_entries(entries);
    aggregator.into_buckets()
}

/// Incremental form of [`accumulate`], fed one listing page at a time.
#[derive(Debug, Clone)]
pub struct PrefixAggregator {
    depth: usize,
    buckets: AggregateBucket,
    total: u64,
}

impl PrefixAggregator {
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            buckets: AggregateBucket::new(),
            total: 0,
        }
    }

    pub fn add_entries(&mut self, entries: &[ObjectEntry]) {
        for entry in entries {
            self.add(entry);
        }
    }

    pub fn add(&mut self, entry: &ObjectEntry) {
        *self
            .buckets
            .entry(bucket_key(&entry.name, self.depth).to_string())
            .or_insert(0) += entry.size_bytes;
        self.total += entry.size_bytes;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn buckets(&self) -> &AggregateBucket {
        &self.buckets
    }

    pub fn into_buckets(self) -> AggregateBucket {
        self.buckets
    }
}

/// Buckets for one prefix filter of a size report.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefixSizes {
    pub prefix: String,
    pub buckets: AggregateBucket,
    pub total_bytes: u64,
    pub failed_pages: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizeReport {
    pub container: String,
    pub depth: usize,
    pub sections: Vec<PrefixSizes>,
    pub grand_total: u64,
}

/// Runs the size report: one independent bucket set per prefix filter,
/// each filter listed to completion before the next begins.
pub async fn report_sizes(stage: &Stage, size_config: &SizeReportConfig) -> Result<SizeReport> {
    let container = stage.config.container.clone();
    let mut sections = Vec::with_capacity(size_config.prefixes.len());
    let mut grand_total = 0u64;

    for prefix in &size_config.prefixes {
        debug!(container = container, prefix = prefix, "size aggregation started.");

        let mut aggregator = PrefixAggregator::new(size_config.depth);
        let mut lister = ObjectLister::new(stage.clone(), &container, prefix);
        while let Some(page) = lister.next_page().await? {
            if page.success {
                aggregator.add_entries(&page.items);
            }
        }

        info!(
            container = container,
            prefix = prefix,
            size = aggregator.total(),
            buckets = aggregator.buckets().len(),
            "size aggregation completed."
        );

        grand_total += aggregator.total();
        sections.push(PrefixSizes {
            prefix: prefix.clone(),
            total_bytes: aggregator.total(),
            buckets: aggregator.into_buckets(),
            failed_pages: lister.pages_failed(),
        });
    }

    Ok(SizeReport {
        container,
        depth: size_config.depth,
        sections,
        grand_total,
    })
}
