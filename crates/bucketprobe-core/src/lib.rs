//! Permission-matrix validation engine for path-scoped S3 bucket policies.
//!
//! A [`BucketScenario`] describes the read-only and read-write path prefixes
//! handed to a bucket module, plus a list of [`ObjectProbe`]s stating which
//! keys a role bound to the module's policies must be able to write and read.
//! The [`ScenarioRunner`] provisions the infrastructure, seeds fixture
//! objects, assumes the scoped role, validates every probe and tears the
//! infrastructure down again. [`run_matrix`] runs many scenarios in parallel.
//!
//! Infrastructure, identity and object storage are reached through the
//! traits in [`backend`]; this crate ships no implementation of them.

pub mod backend;
mod config;
mod error;
mod exchange;
mod matrix;
mod report;
pub mod retry;
mod runner;
mod seeder;
mod stage;
#[cfg(test)]
mod testing;
mod types;
mod validator;

pub use backend::{
    BucketOutputs, BucketVars, Deployment, ObjectStore, Provisioner, RoleOutputs, RoleVars,
    SessionProvider,
};
pub use config::{DEFAULT_REGIONS, HarnessConfig};
pub use error::{ProbeError, ProbeResult};
pub use exchange::CredentialExchanger;
pub use matrix::{default_matrix, load_matrix, parse_matrix, run_matrix};
pub use report::{
    AssertionFailure, CheckOutcome, MatrixReport, ProbeOutcome, ScenarioReport, StageRecord,
    StageStatus,
};
pub use retry::{RetryError, RetryPolicy};
pub use runner::ScenarioRunner;
pub use seeder::{FixtureSeeder, SeedOutcome};
pub use stage::{Stage, StageSkips};
pub use types::{
    AwsRegion, BucketScenario, ObjectProbe, ScenarioContext, UniqueId, validate_bucket_name,
    validate_matrix,
};
pub use validator::PermissionValidator;
