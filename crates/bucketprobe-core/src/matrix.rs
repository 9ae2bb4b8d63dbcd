//! Scenario matrices.
//!
//! A matrix is an immutable list of [`BucketScenario`]s built before anything
//! runs. [`run_matrix`] gives every scenario its own task; the only state the
//! tasks share is the runner's read-only configuration and backends.

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info};

use crate::error::ProbeResult;
use crate::report::{MatrixReport, ScenarioReport};
use crate::runner::ScenarioRunner;
use crate::types::{BucketScenario, ObjectProbe, validate_matrix};

/// The built-in matrix: one bucket with single paths and one with several.
#[must_use]
pub fn default_matrix() -> Vec<BucketScenario> {
    vec![
        BucketScenario::new("TestBucketSinglePath")
            .read_only(["path/to/ro-folder"])
            .read_write(["path/to/rw-folder"])
            .probe(ObjectProbe::new("path/to/ro-folder/obj1", "AES256", true, false))
            .probe(ObjectProbe::new("path/to/rw-folder/obj2", "AES256", true, true))
            .probe(ObjectProbe::new("other/folder/obj3", "AES256", false, false)),
        BucketScenario::new("TestBucketMultiplePaths")
            .read_only(["path1/to/ro-folder", "path2/to/ro-folder"])
            .read_write(["path1/to/rw-folder", "path2/to/rw-folder"])
            .probe(ObjectProbe::new("random/path/obj1", "AES256", false, false))
            .probe(ObjectProbe::new("path1/to/ro-folder/obj1", "AES256", true, false))
            .probe(ObjectProbe::new("path2/to/ro-folder/obj1", "AES256", true, false))
            .probe(ObjectProbe::new("path1/to/rw-folder/obj1", "AES256", true, true))
            .probe(ObjectProbe::new("path2/to/rw-folder/obj1", "AES256", true, true))
            // Unencrypted uploads are rejected even inside a read-write path.
            .probe(ObjectProbe::new("path1/to/rw-folder/obj2", "", false, false)),
    ]
}

/// Parse a JSON matrix (an array of scenarios) and validate it.
pub fn parse_matrix(json: &str) -> ProbeResult<Vec<BucketScenario>> {
    let scenarios: Vec<BucketScenario> = serde_json::from_str(json)?;
    validate_matrix(&scenarios)?;
    Ok(scenarios)
}

/// Load and validate a JSON matrix from `path`.
pub async fn load_matrix(path: impl AsRef<Path>) -> ProbeResult<Vec<BucketScenario>> {
    let json = tokio::fs::read_to_string(path.as_ref()).await?;
    parse_matrix(&json)
}

/// Run every scenario in parallel and collect the reports in matrix order.
///
/// The matrix is validated first; an invalid matrix runs nothing.
pub async fn run_matrix(
    runner: Arc<ScenarioRunner>,
    scenarios: Vec<BucketScenario>,
) -> ProbeResult<MatrixReport> {
    validate_matrix(&scenarios)?;
    info!(count = scenarios.len(), "running scenario matrix");

    let names: Vec<String> = scenarios.iter().map(|s| s.test_name.clone()).collect();
    let mut tasks = JoinSet::new();
    for (index, scenario) in scenarios.into_iter().enumerate() {
        let runner = runner.clone();
        tasks.spawn(async move { (index, runner.run(scenario).await) });
    }

    let mut slots: Vec<Option<ScenarioReport>> = vec![None; names.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, report)) => slots[index] = Some(report),
            Err(e) => error!(error = %e, "scenario task did not complete"),
        }
    }

    let scenarios = slots
        .into_iter()
        .zip(names)
        .map(|(slot, name)| {
            slot.unwrap_or_else(|| {
                let mut report = ScenarioReport::new(name);
                report.fatal = Some("scenario task panicked or was cancelled".to_owned());
                report
            })
        })
        .collect();
    Ok(MatrixReport { scenarios })
}
