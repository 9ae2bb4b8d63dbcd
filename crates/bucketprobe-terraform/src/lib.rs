//! Terraform provisioner for bucketprobe.
//!
//! [`TerraformProvisioner`] copies the bucket module (and, optionally, a
//! separate role module) into a private temp dir per scenario, writes the
//! scenario's variables as `terraform.tfvars.json`, and drives
//! `terraform init`, `apply`, `output -json` and `destroy`.

mod cli;
mod options;
mod provisioner;
mod workspace;

pub use cli::{Outputs, TerraformCli, parse_outputs};
pub use options::{DEFAULT_RETRYABLE_ERRORS, TerraformOptions, default_retryable_errors};
pub use provisioner::{BUCKET_OUTPUT, ROLE_OUTPUT, TerraformDeployment, TerraformProvisioner};
pub use workspace::{ModuleWorkspace, VARS_FILE};
