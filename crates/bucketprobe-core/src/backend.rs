//! External collaborator interfaces.
//!
//! The engine drives three collaborators it does not implement itself:
//!
//! - a [`Provisioner`] that applies the bucket and role infrastructure and
//!   destroys it again,
//! - a [`SessionProvider`] that hands out elevated sessions and exchanges a
//!   role identifier for a scoped one,
//! - an [`ObjectStore`] bound to one session, used for PUT/GET and for
//!   inspecting the provisioned bucket.
//!
//! All traits use `#[async_trait]` so they stay object-safe; the runner holds
//! them as `Arc<dyn ...>` and shares them across scenario tasks.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ProbeResult;
use crate::types::{AwsRegion, ScenarioContext};

/// Inputs of the bucket module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketVars {
    /// Name of the bucket to create.
    pub bucket_name: String,
    /// Read-only path prefixes.
    pub read_only_paths: Vec<String>,
    /// Read-write path prefixes.
    pub read_write_paths: Vec<String>,
    /// Prefix for the generated policy names.
    pub name_prefix: String,
    /// Target region.
    pub region: AwsRegion,
}

/// Outputs of the bucket module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketOutputs {
    /// Name of the bucket that was created.
    pub bucket_name: String,
    /// Identifier of the read-only policy.
    pub ro_policy_id: String,
    /// Identifier of the read-write policy.
    pub rw_policy_id: String,
}

/// Inputs of the role module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleVars {
    /// Prefix for the role name.
    pub name_prefix: String,
    /// Policies attached to the role.
    pub policy_ids: Vec<String>,
    /// Target region.
    pub region: AwsRegion,
}

/// Outputs of the role module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleOutputs {
    /// Identifier of the role to assume.
    pub role_id: String,
}

/// Applies infrastructure for scenarios.
#[async_trait::async_trait]
pub trait Provisioner: Send + Sync + std::fmt::Debug {
    /// Open an isolated deployment for one scenario run.
    async fn open(&self, ctx: &ScenarioContext) -> ProbeResult<Box<dyn Deployment>>;
}

/// The infrastructure owned by one scenario run.
#[async_trait::async_trait]
pub trait Deployment: Send + Sync + std::fmt::Debug {
    /// Apply the bucket module.
    async fn apply_bucket(&mut self, vars: &BucketVars) -> ProbeResult<BucketOutputs>;

    /// Apply the role module.
    async fn apply_role(&mut self, vars: &RoleVars) -> ProbeResult<RoleOutputs>;

    /// Destroy everything this deployment applied, including partial applies.
    async fn destroy(&mut self) -> ProbeResult<()>;
}

/// Hands out credentialed object-store clients.
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync + std::fmt::Debug {
    /// A client using the harness's own (elevated) credentials.
    async fn elevated(&self, region: &AwsRegion) -> ProbeResult<Arc<dyn ObjectStore>>;

    /// A client using temporary credentials of `role_id`.
    async fn assume_role(
        &self,
        region: &AwsRegion,
        role_id: &str,
    ) -> ProbeResult<Arc<dyn ObjectStore>>;
}

/// Object-store operations under one set of credentials.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Write `body` to `key`, with server-side encryption when `encryption` is set.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        encryption: Option<&str>,
    ) -> ProbeResult<()>;

    /// Read the full body of `key`.
    async fn get_object(&self, bucket: &str, key: &str) -> ProbeResult<Bytes>;

    /// Whether `bucket` exists.
    async fn bucket_exists(&self, bucket: &str) -> ProbeResult<bool>;

    /// The bucket policy document, if one is attached.
    async fn bucket_policy(&self, bucket: &str) -> ProbeResult<Option<String>>;
}
