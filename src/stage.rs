use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, anyhow};

use crate::config::Config;
use crate::storage::Storage;
use crate::types::AuditStatistics;
use crate::types::error::AuditError;
use crate::types::token::PipelineCancellationToken;

/// Shared context handed to every audit component.
///
/// Carries the store, the run configuration and the injected diagnostics:
/// the statistics channel (reached through the store) and the warning flag.
/// Components never consult global state for either.
#[derive(Clone)]
pub struct Stage {
    pub config: Config,
    pub target: Storage,
    pub cancellation_token: PipelineCancellationToken,
    pub has_warning: Arc<AtomicBool>,
}

impl Stage {
    pub fn new(
        config: Config,
        target: Storage,
        cancellation_token: PipelineCancellationToken,
        has_warning: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            target,
            cancellation_token,
            has_warning,
        }
    }

    /// Send a statistics event through the storage stats channel.
    pub async fn send_stats(&self, stats: AuditStatistics) {
        let _ = self.target.get_stats_sender().send(stats).await;
    }

    /// Set the warning flag to indicate a non-fatal issue occurred.
    pub fn set_warning(&self) {
        self.has_warning.store(true, Ordering::SeqCst);
    }

    /// Fail with [`AuditError::Cancelled`] once the run has been cancelled.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(anyhow!(AuditError::Cancelled));
        }
        Ok(())
    }
}
