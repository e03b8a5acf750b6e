pub mod client_builder;

use anyhow::{Result, anyhow};
use async_channel::Sender;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::RequestId;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ClientConfig, Config};
use crate::storage::{Storage, StorageTrait};
use crate::types::error::AuditError;
use crate::types::token::PipelineCancellationToken;
use crate::types::{
    AuditStatistics, DeleteResponse, DeleteResponseDetails, ListingPage, ObjectEntry,
    ObjectHeaders, StatResult,
};

const DELETE_ACTION: &str = "delete_object";

/// Error codes that mean the session itself is unusable.
const AUTH_ERROR_CODES: &[&str] = &[
    "AccessDenied",
    "AllAccessDisabled",
    "ExpiredToken",
    "InvalidAccessKeyId",
    "InvalidToken",
    "SignatureDoesNotMatch",
];

/// How a failed store call affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureClass {
    /// Ends the run with exit code 4.
    Fatal,
    /// Transient service error; worth another attempt.
    Retryable,
    /// Permanent for this request only (missing container, bad key, ...).
    Permanent,
}

/// Extracts the S3 error code and message from an AWS SDK error.
///
/// For service errors returns the S3 error code (e.g. "AccessDenied") and
/// the message from the response. For other error types (network, timeout,
/// construction failure) returns "N/A" and the full error description.
fn extract_sdk_error_details<E: std::fmt::Display + ProvideErrorMetadata>(
    e: &SdkError<E>,
) -> (String, String) {
    if let Some(service_err) = e.as_service_error() {
        (
            service_err.code().unwrap_or("unknown").to_string(),
            service_err.message().unwrap_or("no message").to_string(),
        )
    } else {
        ("N/A".to_string(), e.to_string())
    }
}

fn classify_error_code(is_service_error: bool, code: &str) -> FailureClass {
    if !is_service_error || AUTH_ERROR_CODES.contains(&code) {
        return FailureClass::Fatal;
    }
    match code {
        "InternalError" | "SlowDown" | "ServiceUnavailable" | "RequestTimeout" | "unknown" => {
            FailureClass::Retryable
        }
        _ => FailureClass::Permanent,
    }
}

fn classify_sdk_error<E: std::fmt::Display + ProvideErrorMetadata>(
    e: &SdkError<E>,
) -> FailureClass {
    let (code, _) = extract_sdk_error_details(e);
    classify_error_code(e.as_service_error().is_some(), &code)
}

/// Factory for the S3-backed store.
pub struct S3StorageFactory;

impl S3StorageFactory {
    pub async fn create(
        config: Config,
        client_config: ClientConfig,
        cancellation_token: PipelineCancellationToken,
        stats_sender: Sender<AuditStatistics>,
    ) -> Storage {
        let client = Arc::new(client_config.create_client().await);

        Box::new(S3Storage {
            config,
            cancellation_token,
            client,
            stats_sender,
        })
    }
}

/// Object store backed by an S3-compatible service.
///
/// A listing page is one `ListObjectsV2` call, a stat is one `HeadObject`
/// call per name and a delete is one `DeleteObject` call per name.
#[derive(Clone)]
struct S3Storage {
    config: Config,
    cancellation_token: PipelineCancellationToken,
    client: Arc<Client>,
    stats_sender: Sender<AuditStatistics>,
}

#[async_trait]
impl StorageTrait for S3Storage {
    async fn list_page(
        &self,
        container: &str,
        prefix: &str,
        marker: Option<String>,
        max_keys: i32,
    ) -> Result<ListingPage> {
        let force_retry_count = self.config.force_retry_config.force_retry_count;
        let mut last_error = String::new();

        for attempt in 0..=force_retry_count {
            if attempt > 0 {
                self.sleep_force_retry_interval().await;
            }
            if self.cancellation_token.is_cancelled() {
                return Err(anyhow!(AuditError::Cancelled));
            }

            let result = self
                .client
                .list_objects_v2()
                .bucket(container)
                .set_prefix((!prefix.is_empty()).then(|| prefix.to_string()))
                .set_continuation_token(marker.clone())
                .max_keys(max_keys)
                .send()
                .await;

            let e = match result {
                Ok(output) => {
                    let items = output
                        .contents()
                        .iter()
                        .map(|object| {
                            ObjectEntry::new(
                                object.key().unwrap_or_default(),
                                object.size().unwrap_or(0).max(0) as u64,
                            )
                        })
                        .collect();
                    let next_marker = if output.is_truncated() == Some(true) {
                        output.next_continuation_token().map(String::from)
                    } else {
                        None
                    };
                    return Ok(ListingPage::succeeded(items, next_marker));
                }
                Err(e) => e,
            };

            let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
            match classify_sdk_error(&e) {
                FailureClass::Fatal => {
                    tracing::error!(
                        container = container,
                        prefix = prefix,
                        s3_error_code = s3_error_code,
                        s3_error_message = s3_error_message,
                        "S3 ListObjectsV2 API call failed for s3://{}/{}: {} ({}).",
                        container,
                        prefix,
                        s3_error_code,
                        s3_error_message,
                    );
                    return Err(anyhow!(AuditError::Store(format!(
                        "{s3_error_code} ({s3_error_message})"
                    )))
                    .context("aws_sdk_s3::client::list_objects_v2() failed."));
                }
                class => {
                    tracing::warn!(
                        container = container,
                        prefix = prefix,
                        attempt = attempt + 1,
                        max_attempts = force_retry_count + 1,
                        s3_error_code = s3_error_code,
                        s3_error_message = s3_error_message,
                        "S3 ListObjectsV2 attempt {}/{} failed for s3://{}/{}: {} ({}).",
                        attempt + 1,
                        force_retry_count + 1,
                        container,
                        prefix,
                        s3_error_code,
                        s3_error_message,
                    );
                    last_error = format!("{s3_error_code}: {s3_error_message}");
                    if class == FailureClass::Permanent {
                        break;
                    }
                }
            }
        }

        Ok(ListingPage::failed(last_error))
    }

    async fn stat(&self, container: &str, names: &[String]) -> Result<Vec<StatResult>> {
        let mut results = Vec::with_capacity(names.len());

        for name in names {
            let result = self
                .client
                .head_object()
                .bucket(container)
                .key(name)
                .send()
                .await;

            match result {
                Ok(output) => {
                    let headers = ObjectHeaders {
                        content_length: output.content_length().unwrap_or(0).max(0) as u64,
                        etag: output.e_tag().unwrap_or_default().to_string(),
                        content_type: output.content_type().unwrap_or_default().to_string(),
                    };
                    results.push(StatResult::found(name.as_str(), headers));
                }
                Err(e) => {
                    if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                        tracing::trace!(container = container, key = name, "HeadObject: not found.");
                        results.push(StatResult::not_found(name.as_str(), "NotFound"));
                        continue;
                    }

                    let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                    if classify_sdk_error(&e) == FailureClass::Fatal {
                        tracing::error!(
                            container = container,
                            key = name,
                            s3_error_code = s3_error_code,
                            s3_error_message = s3_error_message,
                            "S3 HeadObject API call failed for s3://{}/{}: {} ({}).",
                            container,
                            name,
                            s3_error_code,
                            s3_error_message,
                        );
                        return Err(anyhow!(AuditError::Store(format!(
                            "{s3_error_code} ({s3_error_message})"
                        )))
                        .context("aws_sdk_s3::client::head_object() failed."));
                    }

                    tracing::debug!(
                        container = container,
                        key = name,
                        s3_error_code = s3_error_code,
                        "S3 HeadObject returned an error for s3://{}/{}.",
                        container,
                        name,
                    );
                    results.push(StatResult::not_found(
                        name.as_str(),
                        format!("{s3_error_code}: {s3_error_message}"),
                    ));
                }
            }
        }

        Ok(results)
    }

    async fn delete(&self, container: &str, names: &[String]) -> Result<Vec<DeleteResponse>> {
        let force_retry_count = self.config.force_retry_config.force_retry_count;
        let mut responses = Vec::with_capacity(names.len());

        for name in names {
            let mut response = DeleteResponse {
                success: false,
                action: DELETE_ACTION.to_string(),
                container: container.to_string(),
                object: name.clone(),
                attempts: 0,
                response: None,
                error: None,
            };

            for attempt in 0..=force_retry_count {
                if attempt > 0 {
                    self.sleep_force_retry_interval().await;
                }
                response.attempts = attempt + 1;

                match self
                    .client
                    .delete_object()
                    .bucket(container)
                    .key(name)
                    .send()
                    .await
                {
                    Ok(output) => {
                        response.success = true;
                        response.error = None;
                        response.response = Some(DeleteResponseDetails {
                            request_id: output.request_id().map(String::from),
                            version_id: output.version_id().map(String::from),
                            delete_marker: output.delete_marker().unwrap_or(false),
                        });
                        break;
                    }
                    Err(e) => {
                        let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                        tracing::warn!(
                            container = container,
                            key = name,
                            attempt = attempt + 1,
                            max_attempts = force_retry_count + 1,
                            s3_error_code = s3_error_code,
                            s3_error_message = s3_error_message,
                            "S3 DeleteObject attempt {}/{} failed for s3://{}/{}: {} ({}).",
                            attempt + 1,
                            force_retry_count + 1,
                            container,
                            name,
                            s3_error_code,
                            s3_error_message,
                        );
                        response.error = Some(format!("{s3_error_code}: {s3_error_message}"));
                        if classify_sdk_error(&e) != FailureClass::Retryable {
                            break;
                        }
                    }
                }
            }

            responses.push(response);
        }

        Ok(responses)
    }

    fn get_stats_sender(&self) -> Sender<AuditStatistics> {
        self.stats_sender.clone()
    }
}

impl S3Storage {
    async fn sleep_force_retry_interval(&self) {
        tokio::time::sleep(Duration::from_millis(
            self.config
                .force_retry_config
                .force_retry_interval_milliseconds,
        ))
        .await;
    }
}
