//! In-memory sessions and object store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use bucketprobe_core::{AwsRegion, ObjectStore, ProbeError, ProbeResult, SessionProvider};
use bytes::Bytes;
use tracing::debug;

use crate::error::CloudError;
use crate::state::{ACCOUNT_ID, CloudState, object_arn};

/// Who a session acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// The harness's own identity; allowed everything IAM-wise.
    Elevated,
    /// An assumed role.
    Role(String),
}

impl Principal {
    fn arn(&self) -> String {
        match self {
            Self::Elevated => format!("arn:aws:iam::{ACCOUNT_ID}:user/harness"),
            Self::Role(id) => id.clone(),
        }
    }
}

/// Session provider backed by a [`CloudState`].
#[derive(Debug, Clone)]
pub struct MemorySessions {
    state: Arc<CloudState>,
}

impl MemorySessions {
    /// Create a session provider over `state`.
    #[must_use]
    pub fn new(state: Arc<CloudState>) -> Self {
        Self { state }
    }
}

#[async_trait::async_trait]
impl SessionProvider for MemorySessions {
    async fn elevated(&self, region: &AwsRegion) -> ProbeResult<Arc<dyn ObjectStore>> {
        Ok(Arc::new(MemorySession::new(
            self.state.clone(),
            Principal::Elevated,
            region.clone(),
        )))
    }

    async fn assume_role(
        &self,
        region: &AwsRegion,
        role_id: &str,
    ) -> ProbeResult<Arc<dyn ObjectStore>> {
        self.state
            .assume_role(role_id)
            .map_err(|e| ProbeError::Internal(e.into()))?;
        debug!(role_id, "issued scoped session");
        Ok(Arc::new(MemorySession::new(
            self.state.clone(),
            Principal::Role(role_id.to_owned()),
            region.clone(),
        )))
    }
}

/// Object-store client acting as one principal.
#[derive(Debug)]
pub struct MemorySession {
    state: Arc<CloudState>,
    principal: Principal,
    region: AwsRegion,
    pending_puts: AtomicU32,
}

impl MemorySession {
    /// Create a session.
    #[must_use]
    pub fn new(state: Arc<CloudState>, principal: Principal, region: AwsRegion) -> Self {
        let pending = match principal {
            Principal::Elevated => 0,
            Principal::Role(_) => state.lag().scoped_put_refusals,
        };
        Self {
            state,
            principal,
            region,
            pending_puts: AtomicU32::new(pending),
        }
    }

    /// The session's principal.
    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    fn authorize(
        &self,
        action: &'static str,
        bucket: &str,
        key: &str,
        allowed: impl Fn(&crate::policy::PathPolicy) -> bool,
    ) -> Result<(), CloudError> {
        let granted = match &self.principal {
            Principal::Elevated => true,
            Principal::Role(role_id) => self.state.role_allows(role_id, allowed),
        };
        if granted {
            Ok(())
        } else {
            Err(CloudError::AccessDenied {
                principal: self.principal.arn(),
                action,
                resource: object_arn(bucket, key),
            })
        }
    }

    fn denied_while_propagating(&self, bucket: &str, key: &str) -> Option<CloudError> {
        self.pending_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
            .map(|_| CloudError::AccessDenied {
                principal: self.principal.arn(),
                action: "s3:PutObject",
                resource: object_arn(bucket, key),
            })
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemorySession {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        encryption: Option<&str>,
    ) -> ProbeResult<()> {
        let to_probe =
            |e: CloudError| ProbeError::object_store("PutObject", bucket, key, e.to_string());
        if let Some(err) = self.denied_while_propagating(bucket, key) {
            return Err(to_probe(err));
        }
        self.authorize("s3:PutObject", bucket, key, |p| p.allows_put(bucket, key))
            .map_err(to_probe)?;
        self.state
            .put_object(&self.principal.arn(), bucket, key, body, encryption)
            .map_err(to_probe)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> ProbeResult<Bytes> {
        let to_probe =
            |e: CloudError| ProbeError::object_store("GetObject", bucket, key, e.to_string());
        self.authorize("s3:GetObject", bucket, key, |p| p.allows_get(bucket, key))
            .map_err(to_probe)?;
        self.state
            .get_object(bucket, key)
            .map(|o| o.body)
            .map_err(to_probe)
    }

    async fn bucket_exists(&self, bucket: &str) -> ProbeResult<bool> {
        Ok(self.state.bucket_exists(bucket))
    }

    async fn bucket_policy(&self, bucket: &str) -> ProbeResult<Option<String>> {
        debug!(bucket, region = %self.region, "reading bucket policy");
        self.state
            .bucket_policy(bucket)
            .map_err(|e| ProbeError::object_store("GetBucketPolicy", bucket, "", e.to_string()))
    }
}
