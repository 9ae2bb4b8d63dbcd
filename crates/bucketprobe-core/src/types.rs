//! Scenario data model.
//!
//! An [`ObjectProbe`] describes one key and its expected accessibility for the
//! scoped role. A [`BucketScenario`] groups probes with the read-only and
//! read-write path lists handed to the bucket module. Scenarios are built
//! before anything runs and never mutated; the per-run values (unique id,
//! region, bucket name) live in a separate [`ScenarioContext`].

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, ProbeResult};

/// One storage key under test and the outcome expected for the scoped role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectProbe {
    /// Object key, e.g. `path/to/ro-folder/obj1`.
    pub key: String,
    /// Server-side encryption algorithm; empty means no SSE header is sent.
    #[serde(default)]
    pub encryption: String,
    /// Whether a scoped-role GET must succeed.
    pub expect_pass_read: bool,
    /// Whether a scoped-role PUT must succeed.
    pub expect_pass_write: bool,
}

impl ObjectProbe {
    /// Create a new probe.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        encryption: impl Into<String>,
        expect_pass_read: bool,
        expect_pass_write: bool,
    ) -> Self {
        Self {
            key: key.into(),
            encryption: encryption.into(),
            expect_pass_read,
            expect_pass_write,
        }
    }

    /// The encryption to attach to writes, if any.
    #[must_use]
    pub fn encryption(&self) -> Option<&str> {
        if self.encryption.is_empty() {
            None
        } else {
            Some(&self.encryption)
        }
    }

    /// Whether the fixture step must create this object with elevated credentials.
    ///
    /// Only objects the scoped role cannot write itself are seeded, and
    /// unencrypted objects are never seeded because the bucket rejects
    /// unencrypted writes from every principal.
    #[must_use]
    pub fn needs_fixture(&self) -> bool {
        !self.expect_pass_write && !self.encryption.is_empty()
    }
}

/// A named bucket configuration plus the probes it must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketScenario {
    /// Unique scenario name.
    pub test_name: String,
    /// Path prefixes granted read-only access.
    #[serde(default)]
    pub read_only_paths: Vec<String>,
    /// Path prefixes granted read-write access.
    #[serde(default)]
    pub read_write_paths: Vec<String>,
    /// Probes validated in order.
    #[serde(default)]
    pub probes: Vec<ObjectProbe>,
    /// Whether provisioning itself is expected to fail.
    #[serde(default)]
    pub expect_apply_error: bool,
}

impl BucketScenario {
    /// Create a scenario with no paths and no probes.
    #[must_use]
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            read_only_paths: Vec::new(),
            read_write_paths: Vec::new(),
            probes: Vec::new(),
            expect_apply_error: false,
        }
    }

    /// Add read-only path prefixes.
    #[must_use]
    pub fn read_only<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.read_only_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Add read-write path prefixes.
    #[must_use]
    pub fn read_write<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.read_write_paths
            .extend(paths.into_iter().map(Into::into));
        self
    }

    /// Append a probe.
    #[must_use]
    pub fn probe(mut self, probe: ObjectProbe) -> Self {
        self.probes.push(probe);
        self
    }

    /// Mark the scenario as a negative configuration.
    #[must_use]
    pub fn expecting_apply_error(mut self) -> Self {
        self.expect_apply_error = true;
        self
    }

    /// Check the scenario against the matrix rules.
    pub fn validate(&self) -> ProbeResult<()> {
        let invalid = |reason: String| ProbeError::InvalidScenario {
            scenario: self.test_name.clone(),
            reason,
        };

        if self.test_name.trim().is_empty() {
            return Err(invalid("test name must not be empty".to_owned()));
        }
        for probe in &self.probes {
            if probe.key.is_empty() {
                return Err(invalid("probe key must not be empty".to_owned()));
            }
            if probe.encryption.is_empty() && (probe.expect_pass_write || probe.expect_pass_read)
            {
                return Err(invalid(format!(
                    "probe {} has no encryption, so neither write nor read can be expected to pass",
                    probe.key
                )));
            }
        }
        Ok(())
    }
}

/// Validate every scenario and ensure test names are unique.
pub fn validate_matrix(scenarios: &[BucketScenario]) -> ProbeResult<()> {
    let mut seen = HashSet::new();
    for scenario in scenarios {
        scenario.validate()?;
        if !seen.insert(scenario.test_name.as_str()) {
            return Err(ProbeError::InvalidScenario {
                scenario: scenario.test_name.clone(),
                reason: "duplicate test name".to_owned(),
            });
        }
    }
    Ok(())
}

/// AWS region identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AwsRegion(String);

impl AwsRegion {
    /// Region used when nothing else is configured.
    pub const DEFAULT: &str = "us-east-1";

    /// Create a new region.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self(region.into())
    }

    /// Get the region as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AwsRegion {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl fmt::Display for AwsRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase random identifier that keeps parallel scenarios apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniqueId(String);

impl UniqueId {
    /// Length of generated identifiers.
    pub const LEN: usize = 8;

    /// Generate a fresh identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string()[..Self::LEN].to_owned())
    }

    /// Wrap an existing identifier, lowercased.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().to_lowercase())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-run values derived for one scenario.
///
/// Built fresh for every run so the shared scenario list is never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioContext {
    /// Scenario name.
    pub test_name: String,
    /// Identifier unique to this run.
    pub unique_id: UniqueId,
    /// Region the scenario runs in.
    pub region: AwsRegion,
    /// Bucket name requested from the provisioner.
    pub bucket_name: String,
    /// Prefix for every named resource (policies, role).
    pub name_prefix: String,
}

impl ScenarioContext {
    /// Derive the context for one run.
    pub fn new(
        test_name: impl Into<String>,
        unique_id: UniqueId,
        region: AwsRegion,
        bucket_prefix: &str,
    ) -> ProbeResult<Self> {
        let bucket_name = format!("{bucket_prefix}-{unique_id}");
        validate_bucket_name(&bucket_name)?;
        Ok(Self {
            test_name: test_name.into(),
            name_prefix: unique_id.as_str().to_owned(),
            unique_id,
            region,
            bucket_name,
        })
    }
}

/// Validate an S3 bucket name against the general-purpose bucket naming rules.
pub fn validate_bucket_name(name: &str) -> ProbeResult<()> {
    let fail = |reason: &str| {
        Err(ProbeError::Config(format!("invalid bucket name {name:?}: {reason}")))
    };

    if !(3..=63).contains(&name.len()) {
        return fail("must be between 3 and 63 characters long");
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return fail("only lowercase letters, digits, hyphens and dots are allowed");
    }
    let first = name.as_bytes()[0];
    let last = name.as_bytes()[name.len() - 1];
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return fail("must begin and end with a letter or digit");
    }
    if name.contains("..") {
        return fail("must not contain two adjacent dots");
    }
    if name.parse::<std::net::Ipv4Addr>().is_ok() {
        return fail("must not be formatted as an IP address");
    }
    Ok(())
}
