//! Scenario stages and stage skipping.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// One step of a scenario run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Apply the bucket and role infrastructure.
    Provision,
    /// Check the bucket output, existence and policy.
    ValidateProvisioned,
    /// Write read-only fixture objects with elevated credentials.
    SeedFixtures,
    /// Assume the scoped role.
    ExchangeCredentials,
    /// PUT/GET every probe with the scoped role.
    ValidatePermissions,
    /// Destroy what was provisioned.
    Teardown,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Self; 6] = [
        Self::Provision,
        Self::ValidateProvisioned,
        Self::SeedFixtures,
        Self::ExchangeCredentials,
        Self::ValidatePermissions,
        Self::Teardown,
    ];

    /// The stage name used in logs and `SKIP_<stage>` variables.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Provision => "provision",
            Self::ValidateProvisioned => "validate_provisioned",
            Self::SeedFixtures => "seed_fixtures",
            Self::ExchangeCredentials => "exchange_credentials",
            Self::ValidatePermissions => "validate_permissions",
            Self::Teardown => "teardown",
        }
    }

    /// Whether the stage may be skipped.
    ///
    /// Provisioning and credential exchange produce state the later stages
    /// need, and there is nothing persisted to resume from.
    #[must_use]
    pub fn is_skippable(self) -> bool {
        !matches!(self, Self::Provision | Self::ExchangeCredentials)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| ProbeError::Config(format!("unknown stage: {s}")))
    }
}

/// The set of stages to skip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageSkips(BTreeSet<Stage>);

impl StageSkips {
    /// Skip nothing.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Build a skip set, rejecting stages that cannot be skipped.
    pub fn new(stages: impl IntoIterator<Item = Stage>) -> Result<Self, ProbeError> {
        let mut set = BTreeSet::new();
        for stage in stages {
            if !stage.is_skippable() {
                return Err(ProbeError::Config(format!("stage {stage} cannot be skipped")));
            }
            set.insert(stage);
        }
        Ok(Self(set))
    }

    /// Read `SKIP_<stage>` flags through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ProbeError> {
        let requested = Stage::ALL.into_iter().filter(|stage| {
            lookup(&format!("SKIP_{}", stage.as_str()))
                .is_some_and(|v| crate::config::parse_bool(&v))
        });
        Self::new(requested)
    }

    /// Whether `stage` is skipped.
    #[must_use]
    pub fn contains(&self, stage: Stage) -> bool {
        self.0.contains(&stage)
    }

    /// Whether nothing is skipped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
