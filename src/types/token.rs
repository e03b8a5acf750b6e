/// A cancellation token used to abort a running audit.
///
/// This is a type alias for [`tokio_util::sync::CancellationToken`]. The
/// lister checks it before every page request; a cancelled run ends with
/// [`AuditError::Cancelled`](crate::types::error::AuditError::Cancelled).
pub type PipelineCancellationToken = tokio_util::sync::CancellationToken;

/// Create a new [`PipelineCancellationToken`].
///
/// # Example
///
/// ```
/// use s3audit_rs::create_pipeline_cancellation_token;
///
/// let token = create_pipeline_cancellation_token();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
pub fn create_pipeline_cancellation_token() -> PipelineCancellationToken {
    tokio_util::sync::CancellationToken::new()
}
