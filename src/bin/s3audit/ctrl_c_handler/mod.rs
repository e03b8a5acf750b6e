// Cancels the audit on Ctrl+C.
//
// Waits for either the run finishing (token cancelled) or the signal.

use s3audit_rs::PipelineCancellationToken;
use tokio::task::JoinHandle;
use tokio::{select, signal};
use tracing::{debug, warn};

pub fn spawn_ctrl_c_handler(cancellation_token: PipelineCancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        select! {
            _ = cancellation_token.cancelled() => {
                debug!("cancellation_token canceled.")
            }
            _ = signal::ctrl_c() => {
                warn!("ctrl-c received, stopping the audit.");
                cancellation_token.cancel();
            }
        }
    })
}
