use aws_config::BehaviorVersion;
use aws_config::meta::region::RegionProviderChain;
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use std::time::Duration;

use crate::config::ClientConfig;
use crate::types::S3Credentials;

const CREDENTIALS_PROVIDER_NAME: &str = "s3audit";

impl ClientConfig {
    /// Build an S3 client from the session settings.
    ///
    /// Credentials come from a named profile, explicit access keys or the
    /// default provider chain. The region falls back to the default chain
    /// when not given.
    pub async fn create_client(&self) -> Client {
        let sdk_config = self.load_sdk_config().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(self.force_path_style);
        if let Some(endpoint_url) = &self.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        Client::from_conf(builder.build())
    }

    async fn load_sdk_config(&self) -> aws_config::SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .retry_config(self.build_retry_config())
            .timeout_config(self.build_timeout_config());

        if let Some(profile_files) = self.build_profile_files() {
            loader = loader.profile_files(profile_files);
        }

        match &self.credential {
            S3Credentials::Profile(profile_name) => {
                loader = loader.profile_name(profile_name);
            }
            S3Credentials::Credentials { access_keys } => {
                loader = loader.credentials_provider(Credentials::new(
                    access_keys.access_key.clone(),
                    access_keys.secret_access_key.clone(),
                    access_keys.session_token.clone(),
                    None,
                    CREDENTIALS_PROVIDER_NAME,
                ));
            }
            S3Credentials::FromEnvironment => {}
        }

        let region_provider = RegionProviderChain::first_try(self.region.clone().map(Region::new))
            .or_default_provider();
        loader = loader.region(region_provider);

        loader.load().await
    }

    fn build_retry_config(&self) -> RetryConfig {
        RetryConfig::standard()
            .with_max_attempts(self.retry_config.aws_max_attempts)
            .with_initial_backoff(Duration::from_millis(
                self.retry_config.initial_backoff_milliseconds,
            ))
    }

    fn build_timeout_config(&self) -> TimeoutConfig {
        let timeouts = &self.cli_timeout_config;
        let mut builder = TimeoutConfig::builder();

        builder
            .set_operation_timeout(timeouts.operation_timeout_milliseconds.map(Duration::from_millis))
            .set_operation_attempt_timeout(
                timeouts
                    .operation_attempt_timeout_milliseconds
                    .map(Duration::from_millis),
            )
            .set_connect_timeout(timeouts.connect_timeout_milliseconds.map(Duration::from_millis))
            .set_read_timeout(timeouts.read_timeout_milliseconds.map(Duration::from_millis));

        builder.build()
    }

    fn build_profile_files(&self) -> Option<ProfileFiles> {
        let location = &self.client_config_location;
        if location.aws_config_file.is_none() && location.aws_shared_credentials_file.is_none() {
            return None;
        }

        let mut builder = ProfileFiles::builder();
        builder = match &location.aws_config_file {
            Some(path) => builder.with_file(ProfileFileKind::Config, path),
            None => builder.include_default_config_file(true),
        };
        builder = match &location.aws_shared_credentials_file {
            Some(path) => builder.with_file(ProfileFileKind::Credentials, path),
            None => builder.include_default_credentials_file(true),
        };

        Some(builder.build())
    }
}
