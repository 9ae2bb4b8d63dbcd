//! In-memory bucket and role modules.

use std::sync::Arc;

use bucketprobe_core::{
    BucketOutputs, BucketVars, Deployment, ProbeError, ProbeResult, Provisioner, RoleOutputs,
    RoleVars, ScenarioContext, validate_bucket_name,
};
use tracing::info;

use crate::policy::{PathAccess, PathPolicy, validate_paths};
use crate::state::{ACCOUNT_ID, CloudState};

/// A resource created by a deployment, in creation order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resource {
    Bucket(String),
    Policy(String),
    Role(String),
}

/// Provisioner backed by a [`CloudState`].
#[derive(Debug, Clone)]
pub struct MemoryProvisioner {
    state: Arc<CloudState>,
}

impl MemoryProvisioner {
    /// Create a provisioner over `state`.
    #[must_use]
    pub fn new(state: Arc<CloudState>) -> Self {
        Self { state }
    }
}

#[async_trait::async_trait]
impl Provisioner for MemoryProvisioner {
    async fn open(&self, ctx: &ScenarioContext) -> ProbeResult<Box<dyn Deployment>> {
        Ok(Box::new(MemoryDeployment {
            state: self.state.clone(),
            test_name: ctx.test_name.clone(),
            created: Vec::new(),
        }))
    }
}

/// Resources applied for one scenario.
#[derive(Debug)]
pub struct MemoryDeployment {
    state: Arc<CloudState>,
    test_name: String,
    created: Vec<Resource>,
}

#[async_trait::async_trait]
impl Deployment for MemoryDeployment {
    async fn apply_bucket(&mut self, vars: &BucketVars) -> ProbeResult<BucketOutputs> {
        validate_bucket_name(&vars.bucket_name)
            .map_err(|e| ProbeError::Provision(e.to_string()))?;
        validate_paths(&vars.read_only_paths, &vars.read_write_paths)
            .map_err(|e| ProbeError::Provision(e.to_string()))?;

        self.state
            .create_bucket(&vars.bucket_name, vars.region.as_str())
            .map_err(|e| ProbeError::Provision(e.to_string()))?;
        self.created.push(Resource::Bucket(vars.bucket_name.clone()));

        let mut ids = Vec::with_capacity(2);
        for (access, paths, suffix) in [
            (PathAccess::ReadOnly, &vars.read_only_paths, "read-only"),
            (PathAccess::ReadWrite, &vars.read_write_paths, "read-write"),
        ] {
            let id = format!(
                "arn:aws:iam::{ACCOUNT_ID}:policy/{}-s3-{suffix}",
                vars.name_prefix
            );
            self.state
                .create_policy(PathPolicy {
                    id: id.clone(),
                    bucket: vars.bucket_name.clone(),
                    access,
                    prefixes: paths.clone(),
                })
                .map_err(|e| ProbeError::Provision(e.to_string()))?;
            self.created.push(Resource::Policy(id.clone()));
            ids.push(id);
        }

        info!(scenario = %self.test_name, bucket = %vars.bucket_name, "applied bucket module");
        let rw_policy_id = ids.pop().unwrap_or_default();
        let ro_policy_id = ids.pop().unwrap_or_default();
        Ok(BucketOutputs {
            bucket_name: vars.bucket_name.clone(),
            ro_policy_id,
            rw_policy_id,
        })
    }

    async fn apply_role(&mut self, vars: &RoleVars) -> ProbeResult<RoleOutputs> {
        let role_id = format!(
            "arn:aws:iam::{ACCOUNT_ID}:role/{}-s3-test-role",
            vars.name_prefix
        );
        self.state
            .create_role(&role_id, vars.policy_ids.clone())
            .map_err(|e| ProbeError::Provision(e.to_string()))?;
        self.created.push(Resource::Role(role_id.clone()));
        info!(scenario = %self.test_name, role = %role_id, "applied role module");
        Ok(RoleOutputs { role_id })
    }

    async fn destroy(&mut self) -> ProbeResult<()> {
        while let Some(resource) = self.created.pop() {
            match resource {
                Resource::Role(id) => {
                    self.state.delete_role(&id);
                }
                Resource::Policy(id) => {
                    self.state.delete_policy(&id);
                }
                Resource::Bucket(name) => {
                    self.state.force_delete_bucket(&name);
                }
            }
        }
        info!(scenario = %self.test_name, "destroyed deployment");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bucketprobe_core::{AwsRegion, UniqueId};

    use super::*;

    fn ctx(id: &str) -> ScenarioContext {
        ScenarioContext::new("T", UniqueId::new(id), AwsRegion::default(), "terratest-s3")
            .unwrap()
    }

    fn bucket_vars(ctx: &ScenarioContext, ro: &[&str], rw: &[&str]) -> BucketVars {
        BucketVars {
            bucket_name: ctx.bucket_name.clone(),
            read_only_paths: ro.iter().map(|p| (*p).to_owned()).collect(),
            read_write_paths: rw.iter().map(|p| (*p).to_owned()).collect(),
            name_prefix: ctx.name_prefix.clone(),
            region: ctx.region.clone(),
        }
    }

    #[tokio::test]
    async fn test_should_apply_and_destroy_everything() {
        let state = Arc::new(CloudState::default());
        let ctx = ctx("abc123");
        let mut deployment = MemoryProvisioner::new(state.clone())
            .open(&ctx)
            .await
            .unwrap();

        let bucket = deployment
            .apply_bucket(&bucket_vars(&ctx, &["a/ro"], &["a/rw"]))
            .await
            .unwrap();
        assert_eq!(bucket.bucket_name, "terratest-s3-abc123");
        assert!(bucket.ro_policy_id.ends_with("abc123-s3-read-only"));
        assert!(bucket.rw_policy_id.ends_with("abc123-s3-read-write"));

        let role = deployment
            .apply_role(&RoleVars {
                name_prefix: ctx.name_prefix.clone(),
                policy_ids: vec![bucket.ro_policy_id, bucket.rw_policy_id],
                region: ctx.region.clone(),
            })
            .await
            .unwrap();
        assert!(role.role_id.ends_with("role/abc123-s3-test-role"));
        assert_eq!(
            (state.bucket_count(), state.policy_count(), state.role_count()),
            (1, 2, 1)
        );

        deployment.destroy().await.unwrap();
        assert_eq!(
            (state.bucket_count(), state.policy_count(), state.role_count()),
            (0, 0, 0)
        );
    }

    #[tokio::test]
    async fn test_should_reject_invalid_paths() {
        let state = Arc::new(CloudState::default());
        let ctx = ctx("bad001");
        let mut deployment = MemoryProvisioner::new(state.clone())
            .open(&ctx)
            .await
            .unwrap();

        let err = deployment
            .apply_bucket(&bucket_vars(&ctx, &["/rooted"], &[]))
            .await
            .unwrap_err();

        assert!(matches!(err, ProbeError::Provision(_)));
        assert_eq!(state.bucket_count(), 0);
        deployment.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn test_should_destroy_partial_apply() {
        let state = Arc::new(CloudState::default());
        let ctx = ctx("part01");
        let mut deployment = MemoryProvisioner::new(state.clone())
            .open(&ctx)
            .await
            .unwrap();
        deployment
            .apply_bucket(&bucket_vars(&ctx, &["a"], &["b"]))
            .await
            .unwrap();

        let err = deployment
            .apply_role(&RoleVars {
                name_prefix: ctx.name_prefix.clone(),
                policy_ids: vec!["arn:aws:iam::000000000000:policy/missing".to_owned()],
                region: ctx.region.clone(),
            })
            .await;
        assert!(err.is_err());

        deployment.destroy().await.unwrap();
        assert_eq!(state.bucket_count(), 0);
        assert_eq!(state.policy_count(), 0);
    }

    #[tokio::test]
    async fn test_should_collide_on_reused_unique_id() {
        let state = Arc::new(CloudState::default());
        let provisioner = MemoryProvisioner::new(state.clone());
        let ctx = ctx("same01");
        let mut first = provisioner.open(&ctx).await.unwrap();
        let mut second = provisioner.open(&ctx).await.unwrap();

        first
            .apply_bucket(&bucket_vars(&ctx, &["a"], &[]))
            .await
            .unwrap();
        let err = second
            .apply_bucket(&bucket_vars(&ctx, &["a"], &[]))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("BucketAlreadyExists"));
    }
}
