//! Elevated and role-scoped AWS sessions.

use std::sync::Arc;
use std::time::SystemTime;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use bucketprobe_core::{AwsRegion, ObjectStore, ProbeError, ProbeResult, SessionProvider};
use tracing::{debug, info};

use crate::config::AwsBackendConfig;
use crate::store::S3ObjectStore;

/// Provider name attached to credentials obtained through `sts:AssumeRole`.
const ASSUMED_PROVIDER: &str = "bucketprobe-assume-role";

/// [`SessionProvider`] backed by the AWS SDK.
///
/// The elevated session uses the default credential chain. Scoped sessions
/// are built from the temporary credentials returned by `sts:AssumeRole`.
#[derive(Debug, Clone, Default)]
pub struct AwsSessionProvider {
    config: AwsBackendConfig,
}

impl AwsSessionProvider {
    /// Create a provider.
    #[must_use]
    pub fn new(config: AwsBackendConfig) -> Self {
        Self { config }
    }

    async fn sdk_config(&self, region: &AwsRegion) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.as_str().to_owned()));
        if let Some(endpoint) = &self.config.endpoint_url {
            loader = loader.endpoint_url(endpoint.clone());
        }
        loader.load().await
    }

    fn s3_store(&self, sdk_config: &SdkConfig, credentials: Option<Credentials>) -> S3ObjectStore {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk_config);
        if self.config.force_path_style {
            builder = builder.force_path_style(true);
        }
        if let Some(credentials) = credentials {
            builder = builder.credentials_provider(credentials);
        }
        S3ObjectStore::new(aws_sdk_s3::Client::from_conf(builder.build()))
    }
}

#[async_trait::async_trait]
impl SessionProvider for AwsSessionProvider {
    async fn elevated(&self, region: &AwsRegion) -> ProbeResult<Arc<dyn ObjectStore>> {
        let sdk_config = self.sdk_config(region).await;
        debug!(%region, "opened elevated session");
        Ok(Arc::new(self.s3_store(&sdk_config, None)))
    }

    async fn assume_role(
        &self,
        region: &AwsRegion,
        role_id: &str,
    ) -> ProbeResult<Arc<dyn ObjectStore>> {
        let sdk_config = self.sdk_config(region).await;
        let sts = aws_sdk_sts::Client::new(&sdk_config);
        let output = sts
            .assume_role()
            .role_arn(role_id)
            .role_session_name(&self.config.session_name)
            .send()
            .await
            .map_err(|e| {
                ProbeError::Internal(anyhow::anyhow!(
                    "sts:AssumeRole {role_id}: {}",
                    DisplayErrorContext(&e)
                ))
            })?;
        let issued = output.credentials().ok_or_else(|| {
            ProbeError::Internal(anyhow::anyhow!(
                "sts:AssumeRole {role_id} returned no credentials"
            ))
        })?;

        let credentials = Credentials::new(
            issued.access_key_id(),
            issued.secret_access_key(),
            Some(issued.session_token().to_owned()),
            SystemTime::try_from(*issued.expiration()).ok(),
            ASSUMED_PROVIDER,
        );
        info!(role_id, %region, "obtained scoped credentials");
        Ok(Arc::new(self.s3_store(&sdk_config, Some(credentials))))
    }
}
