//! Harness configuration.
//!
//! [`HarnessConfig`] is read once at process start (see
//! [`HarnessConfig::from_env`]) and handed to the runner. The engine itself
//! never looks at the process environment.

use bytes::Bytes;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::ProbeResult;
use crate::retry::RetryPolicy;
use crate::stage::StageSkips;
use crate::types::{AwsRegion, UniqueId};

/// Regions a scenario may be placed in when no override is given.
pub const DEFAULT_REGIONS: [&str; 4] = ["us-east-1", "us-east-2", "us-west-1", "us-west-2"];

/// Harness configuration.
///
/// # Examples
///
/// ```
/// use bucketprobe_core::HarnessConfig;
///
/// let config = HarnessConfig::default();
/// assert_eq!(config.bucket_name_prefix, "terratest-s3");
/// assert_eq!(config.put_retry.max_attempts, 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct HarnessConfig {
    /// Fixed region for every scenario; a random allowed region otherwise.
    #[builder(default, setter(strip_option))]
    pub region: Option<AwsRegion>,

    /// Regions to pick from when `region` is unset.
    #[builder(default = DEFAULT_REGIONS.iter().map(|r| (*r).to_owned()).collect())]
    pub allowed_regions: Vec<String>,

    /// Prefix of generated bucket names (`<prefix>-<unique id>`).
    #[builder(default = String::from("terratest-s3"))]
    pub bucket_name_prefix: String,

    /// Body the scoped role writes.
    #[builder(default = String::from("test"))]
    pub probe_body: String,

    /// Body written by the fixture step.
    #[builder(default = String::from("test"))]
    pub fixture_body: String,

    /// Retry budget for assuming the scoped role.
    #[builder(default = RetryPolicy::ASSUME_ROLE)]
    pub assume_retry: RetryPolicy,

    /// Retry budget for scoped-role PUTs.
    #[builder(default = RetryPolicy::PUT_OBJECT)]
    pub put_retry: RetryPolicy,

    /// Retry budget for scoped-role GETs.
    #[builder(default = RetryPolicy::GET_OBJECT)]
    pub get_retry: RetryPolicy,

    /// Stages to skip.
    #[builder(default)]
    pub skip: StageSkips,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl HarnessConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `BUCKETPROBE_REGION` / `TERRATEST_REGION` | random allowed region |
    /// | `BUCKETPROBE_BUCKET_PREFIX` | `terratest-s3` |
    /// | `BUCKETPROBE_PROBE_BODY` | `test` |
    /// | `BUCKETPROBE_FIXTURE_BODY` | `test` |
    /// | `SKIP_<stage>` | unset |
    /// | `LOG_LEVEL` | `info` |
    pub fn from_env() -> ProbeResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ProbeResult<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup("BUCKETPROBE_REGION").or_else(|| lookup("TERRATEST_REGION")) {
            if !v.is_empty() {
                config.region = Some(AwsRegion::new(v));
            }
        }
        if let Some(v) = lookup("BUCKETPROBE_BUCKET_PREFIX") {
            config.bucket_name_prefix = v;
        }
        if let Some(v) = lookup("BUCKETPROBE_PROBE_BODY") {
            config.probe_body = v;
        }
        if let Some(v) = lookup("BUCKETPROBE_FIXTURE_BODY") {
            config.fixture_body = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }
        config.skip = StageSkips::from_lookup(&lookup)?;

        Ok(config)
    }

    /// Same configuration with every retry delay removed.
    #[must_use]
    pub fn without_retry_delays(mut self) -> Self {
        self.assume_retry = self.assume_retry.without_delay();
        self.put_retry = self.put_retry.without_delay();
        self.get_retry = self.get_retry.without_delay();
        self
    }

    /// Pick the region for one scenario.
    #[must_use]
    pub fn pick_region(&self) -> AwsRegion {
        if let Some(region) = &self.region {
            return region.clone();
        }
        self.allowed_regions
            .choose(&mut rand::rng())
            .map_or_else(AwsRegion::default, |region| AwsRegion::new(region.clone()))
    }

    /// Generate the unique id for one scenario.
    #[must_use]
    pub fn unique_id(&self) -> UniqueId {
        UniqueId::generate()
    }

    /// Probe body as bytes.
    #[must_use]
    pub fn probe_bytes(&self) -> Bytes {
        Bytes::from(self.probe_body.clone())
    }

    /// Fixture body as bytes.
    #[must_use]
    pub fn fixture_bytes(&self) -> Bytes {
        Bytes::from(self.fixture_body.clone())
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
pub(crate) fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
