//! Provisioner driving the bucket and role modules with `terraform`.

use std::sync::Arc;

use bucketprobe_core::{
    AwsRegion, BucketOutputs, BucketVars, Deployment, ProbeError, ProbeResult, Provisioner,
    RoleOutputs, RoleVars, ScenarioContext,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::TerraformCli;
use crate::options::TerraformOptions;
use crate::workspace::ModuleWorkspace;

/// Output holding the bucket attributes.
pub const BUCKET_OUTPUT: &str = "test-bucket";
/// Output holding the role ARN.
pub const ROLE_OUTPUT: &str = "role_arn";

/// Variables of the bucket module.
#[derive(Debug, Serialize)]
struct BucketModuleVars<'a> {
    test_bucket_name: &'a str,
    read_only_paths: &'a [String],
    read_write_paths: &'a [String],
    name_prefix: &'a str,
}

/// Variables of the role module.
#[derive(Debug, Serialize)]
struct RoleModuleVars<'a> {
    name_prefix: &'a str,
    policy_arns: &'a [String],
}

/// [`Provisioner`] applying terraform modules from private copies.
#[derive(Debug, Clone)]
pub struct TerraformProvisioner {
    options: Arc<TerraformOptions>,
}

impl TerraformProvisioner {
    /// Create a provisioner.
    #[must_use]
    pub fn new(options: TerraformOptions) -> Self {
        Self {
            options: Arc::new(options),
        }
    }
}

#[async_trait::async_trait]
impl Provisioner for TerraformProvisioner {
    async fn open(&self, ctx: &ScenarioContext) -> ProbeResult<Box<dyn Deployment>> {
        let root = self.options.root_dir.as_deref();
        let bucket =
            ModuleWorkspace::copy_from(root, &self.options.bucket_module_dir, "bucket").await?;
        let role = match &self.options.role_module_dir {
            Some(dir) => Some(ModuleWorkspace::copy_from(root, dir, "role").await?),
            None => None,
        };
        info!(
            scenario = %ctx.test_name,
            bucket_dir = %bucket.path().display(),
            "opened terraform deployment"
        );
        Ok(Box::new(TerraformDeployment {
            options: self.options.clone(),
            region: ctx.region.clone(),
            bucket,
            role,
            bucket_applied: false,
            role_applied: false,
        }))
    }
}

/// One scenario's module copies and what was applied in them.
#[derive(Debug)]
pub struct TerraformDeployment {
    options: Arc<TerraformOptions>,
    region: AwsRegion,
    bucket: ModuleWorkspace,
    role: Option<ModuleWorkspace>,
    bucket_applied: bool,
    role_applied: bool,
}

impl TerraformDeployment {
    fn cli<'a>(&'a self, workspace: &'a ModuleWorkspace) -> TerraformCli<'a> {
        TerraformCli::new(&self.options, workspace.path(), &self.region)
    }
}

#[async_trait::async_trait]
impl Deployment for TerraformDeployment {
    async fn apply_bucket(&mut self, vars: &BucketVars) -> ProbeResult<BucketOutputs> {
        self.region = vars.region.clone();
        self.bucket
            .write_vars(&BucketModuleVars {
                test_bucket_name: &vars.bucket_name,
                read_only_paths: &vars.read_only_paths,
                read_write_paths: &vars.read_write_paths,
                name_prefix: &vars.name_prefix,
            })
            .await?;

        // A failed apply may still have created resources.
        self.bucket_applied = true;
        let cli = self.cli(&self.bucket);
        cli.init_and_apply().await?;
        let outputs = cli.outputs().await?;

        Ok(BucketOutputs {
            bucket_name: outputs.attribute(BUCKET_OUTPUT, "bucket_name")?,
            ro_policy_id: outputs.attribute(BUCKET_OUTPUT, "ro_policy_arn")?,
            rw_policy_id: outputs.attribute(BUCKET_OUTPUT, "rw_policy_arn")?,
        })
    }

    async fn apply_role(&mut self, vars: &RoleVars) -> ProbeResult<RoleOutputs> {
        let Some(role) = &self.role else {
            // Single-module layout: the bucket module already created the role.
            let outputs = self.cli(&self.bucket).outputs().await?;
            return Ok(RoleOutputs {
                role_id: outputs.string(ROLE_OUTPUT)?,
            });
        };

        role.write_vars(&RoleModuleVars {
            name_prefix: &vars.name_prefix,
            policy_arns: &vars.policy_ids,
        })
        .await?;
        self.role_applied = true;
        let cli = self.cli(role);
        cli.init_and_apply().await?;
        Ok(RoleOutputs {
            role_id: cli.outputs().await?.string(ROLE_OUTPUT)?,
        })
    }

    async fn destroy(&mut self) -> ProbeResult<()> {
        let mut errors = Vec::new();
        // The role references the bucket's policies; destroy it first. A failed
        // role destroy still leaves the bucket module to clean up.
        if self.role_applied {
            if let Some(role) = &self.role {
                let destroyed = self.cli(role).destroy().await;
                match destroyed {
                    Ok(()) => self.role_applied = false,
                    Err(e) => {
                        warn!(error = %e, "role module destroy failed");
                        errors.push(format!("role module: {e}"));
                    }
                }
            }
        }
        if self.bucket_applied {
            let destroyed = self.cli(&self.bucket).destroy().await;
            match destroyed {
                Ok(()) => self.bucket_applied = false,
                Err(e) => {
                    warn!(error = %e, "bucket module destroy failed");
                    errors.push(format!("bucket module: {e}"));
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProbeError::Teardown(errors.join("; ")))
        }
    }
}
