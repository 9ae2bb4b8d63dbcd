//! Scenario and matrix reports.
//!
//! Failures are collected instead of aborting: a permission mismatch on one
//! probe never stops its siblings, and a fatal stage error is recorded before
//! the runner jumps to teardown. A teardown error is only a warning.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stage::Stage;
use crate::types::{AwsRegion, UniqueId};

/// Result of one PUT or GET check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// The observed outcome matched the expectation.
    Passed,
    /// The observed outcome disagreed with the expectation.
    Mismatch {
        /// Whether success was expected.
        expected_success: bool,
        /// What was observed.
        detail: String,
    },
}

impl CheckOutcome {
    /// Whether the check passed.
    #[must_use]
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Write and read results for one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Object key.
    pub key: String,
    /// Result of the PUT check.
    pub write: CheckOutcome,
    /// Result of the GET check.
    pub read: CheckOutcome,
}

impl ProbeOutcome {
    /// Whether both checks passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.write.is_passed() && self.read.is_passed()
    }
}

/// How a stage ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum StageStatus {
    /// The stage ran to completion.
    Completed,
    /// The stage was skipped by configuration or by the negative-apply path.
    Skipped,
    /// The stage failed fatally.
    Failed(String),
    /// An earlier fatal failure prevented the stage from running.
    NotReached,
}

/// One stage and its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// The stage.
    pub stage: Stage,
    /// Its status.
    pub status: StageStatus,
}

/// A named non-fatal assertion that did not hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionFailure {
    /// Check name, e.g. `validate_bucket_exists`.
    pub check: String,
    /// What went wrong.
    pub message: String,
}

/// Everything observed while running one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub test_name: String,
    /// Unique id of this run.
    pub unique_id: Option<UniqueId>,
    /// Region of this run.
    pub region: Option<AwsRegion>,
    /// Bucket requested for this run.
    pub bucket_name: Option<String>,
    /// Stage statuses in execution order.
    pub stages: Vec<StageRecord>,
    /// Failed non-fatal assertions.
    pub assertions: Vec<AssertionFailure>,
    /// Per-probe results, in probe-list order.
    pub probes: Vec<ProbeOutcome>,
    /// The fatal error that aborted the run, if any.
    pub fatal: Option<String>,
    /// Warnings that do not fail the scenario (teardown errors).
    pub warnings: Vec<String>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScenarioReport {
    /// Start an empty report.
    #[must_use]
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            unique_id: None,
            region: None,
            bucket_name: None,
            stages: Vec::new(),
            assertions: Vec::new(),
            probes: Vec::new(),
            fatal: None,
            warnings: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Record the status of a stage.
    pub fn record(&mut self, stage: Stage, status: StageStatus) {
        self.stages.push(StageRecord { stage, status });
    }

    /// Record a failed assertion.
    pub fn assertion_failed(&mut self, check: impl Into<String>, message: impl Into<String>) {
        self.assertions.push(AssertionFailure {
            check: check.into(),
            message: message.into(),
        });
    }

    /// Status of `stage`, if recorded.
    #[must_use]
    pub fn stage_status(&self, stage: Stage) -> Option<&StageStatus> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.status)
    }

    /// Outcome of the probe for `key`, if validated.
    #[must_use]
    pub fn probe(&self, key: &str) -> Option<&ProbeOutcome> {
        self.probes.iter().find(|p| p.key == key)
    }

    /// Whether the scenario passed. Warnings never fail a scenario.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.fatal.is_none()
            && self.assertions.is_empty()
            && self.probes.iter().all(ProbeOutcome::passed)
    }

    /// Human-readable failure lines.
    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(fatal) = &self.fatal {
            out.push(format!("fatal: {fatal}"));
        }
        for a in &self.assertions {
            out.push(format!("{}: {}", a.check, a.message));
        }
        for p in &self.probes {
            for (op, check) in [("put", &p.write), ("get", &p.read)] {
                if let CheckOutcome::Mismatch {
                    expected_success,
                    detail,
                } = check
                {
                    let expected = if *expected_success {
                        "success"
                    } else {
                        "failure"
                    };
                    out.push(format!("{op} {}: expected {expected}, {detail}", p.key));
                }
            }
        }
        out
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.passed() { "PASS" } else { "FAIL" };
        write!(f, "{verdict} {}", self.test_name)?;
        if let Some(bucket) = &self.bucket_name {
            write!(f, " (bucket {bucket}")?;
            if let Some(region) = &self.region {
                write!(f, ", {region}")?;
            }
            write!(f, ")")?;
        }
        let passed = self.probes.iter().filter(|p| p.passed()).count();
        write!(f, " probes {passed}/{}", self.probes.len())
    }
}

/// Reports of every scenario in a matrix run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatrixReport {
    /// Scenario reports in matrix order.
    pub scenarios: Vec<ScenarioReport>,
}

impl MatrixReport {
    /// Whether every scenario passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.scenarios.iter().all(ScenarioReport::passed)
    }

    /// Report for `test_name`.
    #[must_use]
    pub fn scenario(&self, test_name: &str) -> Option<&ScenarioReport> {
        self.scenarios.iter().find(|s| s.test_name == test_name)
    }

    /// Number of failed scenarios.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.scenarios.iter().filter(|s| !s.passed()).count()
    }
}

impl fmt::Display for MatrixReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for scenario in &self.scenarios {
            writeln!(f, "{scenario}")?;
            for line in scenario.failures() {
                writeln!(f, "    {line}")?;
            }
            for warning in &scenario.warnings {
                writeln!(f, "    warning: {warning}")?;
            }
        }
        write!(
            f,
            "{} scenario(s), {} failed",
            self.scenarios.len(),
            self.failed_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mismatch(expected_success: bool) -> CheckOutcome {
        CheckOutcome::Mismatch {
            expected_success,
            detail: "got AccessDenied".to_owned(),
        }
    }

    #[test]
    fn test_should_pass_empty_report() {
        let report = ScenarioReport::new("TestEmpty");
        assert!(report.passed());
        assert!(report.failures().is_empty());
    }

    #[test]
    fn test_should_fail_on_probe_mismatch() {
        let mut report = ScenarioReport::new("TestMismatch");
        report.probes.push(ProbeOutcome {
            key: "a/rw/o2".to_owned(),
            write: mismatch(true),
            read: CheckOutcome::Passed,
        });
        assert!(!report.passed());
        assert_eq!(
            report.failures(),
            vec!["put a/rw/o2: expected success, got AccessDenied"]
        );
    }

    #[test]
    fn test_should_not_fail_on_warnings() {
        let mut report = ScenarioReport::new("TestWarn");
        report.warnings.push("teardown failed: boom".to_owned());
        assert!(report.passed());
    }

    #[test]
    fn test_should_fail_on_fatal_and_assertions() {
        let mut report = ScenarioReport::new("TestFatal");
        report.assertion_failed("compare_output", "names differ");
        assert!(!report.passed());
        report.assertions.clear();
        report.fatal = Some("provisioning failed".to_owned());
        assert!(!report.passed());
        assert_eq!(report.failures(), vec!["fatal: provisioning failed"]);
    }

    #[test]
    fn test_should_summarize_matrix() {
        let mut failing = ScenarioReport::new("B");
        failing.fatal = Some("x".to_owned());
        let matrix = MatrixReport {
            scenarios: vec![ScenarioReport::new("A"), failing],
        };
        assert!(!matrix.passed());
        assert_eq!(matrix.failed_count(), 1);
        let text = matrix.to_string();
        assert!(text.contains("PASS A"));
        assert!(text.contains("FAIL B"));
        assert!(text.ends_with("2 scenario(s), 1 failed"));
    }

    #[test]
    fn test_should_serialize_stage_status() {
        let record = StageRecord {
            stage: Stage::SeedFixtures,
            status: StageStatus::Failed("denied".to_owned()),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["stage"], "seed_fixtures");
        assert_eq!(json["status"]["status"], "failed");
        assert_eq!(json["status"]["message"], "denied");
    }
}
