//! `terraform` command runner and output parsing.

use std::path::Path;
use std::process::Stdio;

use bucketprobe_core::retry::{retry, retry_if};
use bucketprobe_core::{AwsRegion, ProbeError, ProbeResult, RetryError, RetryPolicy};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::options::TerraformOptions;

/// Flags shared by every mutating command.
const NON_INTERACTIVE: &[&str] = &["-input=false", "-no-color"];

/// Runs `terraform` sub-commands in one module directory.
#[derive(Debug)]
pub struct TerraformCli<'a> {
    options: &'a TerraformOptions,
    dir: &'a Path,
    region: &'a AwsRegion,
}

impl<'a> TerraformCli<'a> {
    /// Bind a runner to `dir`, targeting `region`.
    #[must_use]
    pub fn new(options: &'a TerraformOptions, dir: &'a Path, region: &'a AwsRegion) -> Self {
        Self {
            options,
            dir,
            region,
        }
    }

    /// Run one command and return its stdout.
    pub async fn run(&self, args: &[&str]) -> ProbeResult<String> {
        debug!(dir = %self.dir.display(), ?args, "running terraform");
        let output = Command::new(&self.options.binary)
            .args(args)
            .current_dir(self.dir)
            .env("AWS_REGION", self.region.as_str())
            .env("AWS_DEFAULT_REGION", self.region.as_str())
            .env("TF_IN_AUTOMATION", "1")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(ProbeError::Terraform {
                command: args.first().copied().unwrap_or_default().to_owned(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            })
        }
    }

    /// `terraform init` then `terraform apply`, retried on transient errors.
    pub async fn init_and_apply(&self) -> ProbeResult<()> {
        let options = self.options;
        let policy = RetryPolicy::new(options.max_apply_retries + 1, options.retry_delay);
        let retryable = |e: &ProbeError| match e {
            ProbeError::Terraform { stderr, .. } => options.is_retryable(stderr),
            _ => false,
        };

        let init = with_flags(&["init"]);
        let apply = with_flags(&["apply", "-auto-approve"]);

        retry_if("terraform init", policy, |_| self.run(&init), retryable)
            .await
            .map_err(RetryError::into_last)?;
        retry_if("terraform apply", policy, |_| self.run(&apply), retryable)
            .await
            .map_err(RetryError::into_last)?;
        info!(dir = %self.dir.display(), "terraform apply complete");
        Ok(())
    }

    /// `terraform destroy`, retried on any error.
    pub async fn destroy(&self) -> ProbeResult<()> {
        let options = self.options;
        let policy = RetryPolicy::new(options.max_destroy_retries + 1, options.retry_delay);
        let destroy = with_flags(&["destroy", "-auto-approve"]);
        retry("terraform destroy", policy, |_| self.run(&destroy))
            .await
            .map_err(RetryError::into_last)?;
        info!(dir = %self.dir.display(), "terraform destroy complete");
        Ok(())
    }

    /// `terraform output -json`.
    pub async fn outputs(&self) -> ProbeResult<Outputs> {
        let json = self.run(&["output", "-json", "-no-color"]).await?;
        parse_outputs(&json)
    }
}

fn with_flags<'a>(args: &[&'a str]) -> Vec<&'a str> {
    args.iter().chain(NON_INTERACTIVE).copied().collect()
}

/// One entry of `terraform output -json`.
#[derive(Debug, Deserialize)]
struct OutputValue {
    value: serde_json::Value,
}

/// Parsed `terraform output -json`.
#[derive(Debug, Default)]
pub struct Outputs(serde_json::Map<String, serde_json::Value>);

impl Outputs {
    /// A top-level string output.
    pub fn string(&self, name: &str) -> ProbeResult<String> {
        self.0
            .get(name)
            .and_then(serde_json::Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| missing(name))
    }

    /// A string attribute of a top-level object output.
    pub fn attribute(&self, name: &str, attribute: &str) -> ProbeResult<String> {
        self.0
            .get(name)
            .and_then(|v| v.get(attribute))
            .and_then(serde_json::Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| missing(&format!("{name}.{attribute}")))
    }
}

fn missing(name: &str) -> ProbeError {
    ProbeError::Provision(format!("terraform output {name} is missing or not a string"))
}

/// Parse `terraform output -json`, keeping only the values.
pub fn parse_outputs(json: &str) -> ProbeResult<Outputs> {
    let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
    let mut values = serde_json::Map::new();
    for (name, entry) in raw {
        let entry: OutputValue = serde_json::from_value(entry)?;
        values.insert(name, entry.value);
    }
    Ok(Outputs(values))
}
