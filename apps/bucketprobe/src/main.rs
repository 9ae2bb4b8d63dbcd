//! bucketprobe - permission-matrix runner for the S3 bucket module.
//!
//! Provisions one bucket and role per scenario, checks every object probe
//! against the scoped role and tears the infrastructure down again. All
//! scenarios run in parallel. The exit code is non-zero when any scenario
//! failed.
//!
//! # Usage
//!
//! ```text
//! BUCKETPROBE_BUCKET_MODULE_DIR=modules/test_minimal bucketprobe
//! BUCKETPROBE_BACKEND=memory bucketprobe
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BUCKETPROBE_BACKEND` | `aws` | `aws` (terraform + AWS) or `memory` (dry run) |
//! | `BUCKETPROBE_SCENARIOS` | *(unset)* | JSON scenario matrix; built-in matrix otherwise |
//! | `BUCKETPROBE_REPORT` | *(unset)* | Write the matrix report as JSON to this path |
//! | `BUCKETPROBE_LOG_FORMAT` | `text` | `json` for structured log lines |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |
//!
//! Harness, AWS and terraform settings are documented on `HarnessConfig`,
//! `AwsBackendConfig` and `TerraformOptions`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use bucketprobe_aws::{AwsBackendConfig, AwsSessionProvider};
use bucketprobe_core::{
    BucketScenario, HarnessConfig, MatrixReport, ScenarioRunner, default_matrix, load_matrix,
    run_matrix,
};
use bucketprobe_memory::MemoryCloud;
use bucketprobe_terraform::{TerraformOptions, TerraformProvisioner};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Where scenarios are provisioned and probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    /// Terraform modules applied to a real AWS account.
    Aws,
    /// The in-memory cloud.
    Memory,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "aws" => Ok(Self::Aws),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("unknown backend {other:?}, expected \"aws\" or \"memory\""),
        }
    }
}

/// Settings that only concern the binary.
#[derive(Debug)]
struct CliSettings {
    backend: Backend,
    scenarios: Option<PathBuf>,
    report: Option<PathBuf>,
    json_logs: bool,
}

impl CliSettings {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let backend = non_empty("BUCKETPROBE_BACKEND")
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or(Backend::Aws);
        Ok(Self {
            backend,
            scenarios: non_empty("BUCKETPROBE_SCENARIOS").map(PathBuf::from),
            report: non_empty("BUCKETPROBE_REPORT").map(PathBuf::from),
            json_logs: non_empty("BUCKETPROBE_LOG_FORMAT")
                .is_some_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }
}

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

/// Build the runner for the selected backend.
fn build_runner(backend: Backend, config: HarnessConfig) -> Result<ScenarioRunner> {
    let runner = match backend {
        Backend::Aws => {
            let options = TerraformOptions::from_env().context("invalid terraform settings")?;
            ScenarioRunner::new(
                config,
                Arc::new(TerraformProvisioner::new(options)),
                Arc::new(AwsSessionProvider::new(AwsBackendConfig::from_env())),
            )
        }
        // Nothing propagates in memory, so retries need no delay.
        Backend::Memory => {
            let cloud = MemoryCloud::default();
            ScenarioRunner::new(
                config.without_retry_delays(),
                cloud.provisioner(),
                cloud.sessions(),
            )
        }
    };
    Ok(runner)
}

/// Load the scenario matrix from `path`, or the built-in one.
async fn load_scenarios(path: Option<&Path>) -> Result<Vec<BucketScenario>> {
    match path {
        Some(path) => load_matrix(path)
            .await
            .with_context(|| format!("failed to load scenarios from {}", path.display())),
        None => Ok(default_matrix()),
    }
}

/// Write the report as pretty JSON.
async fn write_report(path: &Path, report: &MatrixReport) -> Result<()> {
    let json = serde_json::to_vec_pretty(report)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write report to {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let lookup = |name: &str| std::env::var(name).ok();
    let config = HarnessConfig::from_env().context("invalid harness configuration")?;
    let settings = CliSettings::from_lookup(lookup)?;

    init_tracing(&config.log_level, settings.json_logs)?;

    let scenarios = load_scenarios(settings.scenarios.as_deref()).await?;
    info!(
        backend = ?settings.backend,
        scenarios = scenarios.len(),
        region = ?config.region,
        skip = ?config.skip,
        version = VERSION,
        "starting bucketprobe",
    );

    let runner = Arc::new(build_runner(settings.backend, config)?);
    let report = run_matrix(runner, scenarios).await?;

    println!("{report}");
    if let Some(path) = &settings.report {
        write_report(path, &report).await?;
        info!(path = %path.display(), "report written");
    }

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
