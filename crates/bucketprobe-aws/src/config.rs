//! AWS backend configuration.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Settings for reaching AWS (or an S3-compatible endpoint).
///
/// Credentials and the default region come from the standard AWS provider
/// chain; only what the chain cannot express lives here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct AwsBackendConfig {
    /// Endpoint override for S3 and STS.
    #[builder(default, setter(strip_option, into))]
    pub endpoint_url: Option<String>,

    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`.
    #[builder(default)]
    pub force_path_style: bool,

    /// `RoleSessionName` sent with `sts:AssumeRole`.
    #[builder(default = String::from("bucketprobe"), setter(into))]
    pub session_name: String,
}

impl Default for AwsBackendConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl AwsBackendConfig {
    /// Load from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `BUCKETPROBE_ENDPOINT_URL` | unset |
    /// | `BUCKETPROBE_FORCE_PATH_STYLE` | `false` |
    /// | `BUCKETPROBE_SESSION_NAME` | `bucketprobe` |
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(v) = lookup("BUCKETPROBE_ENDPOINT_URL").filter(|v| !v.is_empty()) {
            config.endpoint_url = Some(v);
        }
        if let Some(v) = lookup("BUCKETPROBE_FORCE_PATH_STYLE") {
            config.force_path_style = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = lookup("BUCKETPROBE_SESSION_NAME").filter(|v| !v.is_empty()) {
            config.session_name = v;
        }
        config
    }
}
