//! Terraform invocation options.

use std::path::PathBuf;
use std::time::Duration;

use bucketprobe_core::{ProbeError, ProbeResult};
use regex::Regex;
use typed_builder::TypedBuilder;

/// Stderr patterns of transient `terraform` failures worth retrying.
pub const DEFAULT_RETRYABLE_ERRORS: &[&str] = &[
    r".*read: connection reset by peer.*",
    r".*TLS handshake timeout.*",
    r"(?s).*Error installing provider.*tcp.*connection reset by peer.*",
    r"(?s).*Failed to query available provider packages.*",
    r"(?s).*timeout while waiting for plugin to start.*",
    r"(?s).*Error: Failed to install provider.*",
    r".*registry service is unreachable.*",
    r"(?s).*Client\.Timeout exceeded while awaiting headers.*",
    r"(?s).*Could not download module.*",
    r"(?s).*(Throttling|RequestLimitExceeded).*",
];

/// How to drive the `terraform` CLI.
#[derive(Debug, Clone, TypedBuilder)]
pub struct TerraformOptions {
    /// The `terraform` executable.
    #[builder(default = PathBuf::from("terraform"), setter(into))]
    pub binary: PathBuf,

    /// Tree copied for every scenario. Relative module sources must resolve
    /// inside it. Defaults to the repository (`.git`) root of each module.
    #[builder(default, setter(strip_option, into))]
    pub root_dir: Option<PathBuf>,

    /// Module creating the bucket and its read-only/read-write policies.
    #[builder(setter(into))]
    pub bucket_module_dir: PathBuf,

    /// Module creating the test role. When unset, the bucket module is
    /// expected to create the role too and expose a `role_arn` output.
    #[builder(default, setter(strip_option, into))]
    pub role_module_dir: Option<PathBuf>,

    /// Retries of `init`/`apply` on a retryable error.
    #[builder(default = 2)]
    pub max_apply_retries: u32,

    /// Retries of `destroy` on any error.
    #[builder(default = 5)]
    pub max_destroy_retries: u32,

    /// Delay between retries.
    #[builder(default = Duration::from_secs(5))]
    pub retry_delay: Duration,

    /// Stderr patterns that make `init`/`apply` retryable.
    #[builder(default = default_retryable_errors())]
    pub retryable_errors: Vec<Regex>,
}

/// Compile [`DEFAULT_RETRYABLE_ERRORS`].
#[must_use]
pub fn default_retryable_errors() -> Vec<Regex> {
    DEFAULT_RETRYABLE_ERRORS
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
}

impl TerraformOptions {
    /// Load from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `BUCKETPROBE_TERRAFORM_BIN` | `terraform` |
    /// | `BUCKETPROBE_BUCKET_MODULE_DIR` | required |
    /// | `BUCKETPROBE_ROLE_MODULE_DIR` | unset |
    /// | `BUCKETPROBE_ROOT_DIR` | repository root of the module |
    pub fn from_env() -> ProbeResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ProbeResult<Self> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let bucket_module_dir = non_empty("BUCKETPROBE_BUCKET_MODULE_DIR").ok_or_else(|| {
            ProbeError::Config("BUCKETPROBE_BUCKET_MODULE_DIR must be set".to_owned())
        })?;
        let mut options = Self::builder().bucket_module_dir(bucket_module_dir).build();
        if let Some(v) = non_empty("BUCKETPROBE_TERRAFORM_BIN") {
            options.binary = PathBuf::from(v);
        }
        options.role_module_dir = non_empty("BUCKETPROBE_ROLE_MODULE_DIR").map(PathBuf::from);
        options.root_dir = non_empty("BUCKETPROBE_ROOT_DIR").map(PathBuf::from);
        Ok(options)
    }

    /// Whether a failed `init`/`apply` with this stderr should be retried.
    #[must_use]
    pub fn is_retryable(&self, stderr: &str) -> bool {
        self.retryable_errors.iter().any(|re| re.is_match(stderr))
    }
}
