//! The built-in matrix against a real AWS account.
//!
//! Needs AWS credentials, `terraform` on `PATH` and
//! `BUCKETPROBE_BUCKET_MODULE_DIR` pointing at the bucket module.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bucketprobe_aws::{AwsBackendConfig, AwsSessionProvider};
    use bucketprobe_core::{HarnessConfig, ScenarioRunner, default_matrix, run_matrix};
    use bucketprobe_terraform::{TerraformOptions, TerraformProvisioner};

    use crate::init_tracing;

    #[tokio::test]
    #[ignore = "requires AWS credentials and terraform"]
    async fn test_should_pass_builtin_matrix_on_aws() {
        init_tracing();
        let config = HarnessConfig::from_env().expect("harness config");
        let options = TerraformOptions::from_env().expect("terraform options");
        let runner = ScenarioRunner::new(
            config,
            Arc::new(TerraformProvisioner::new(options)),
            Arc::new(AwsSessionProvider::new(AwsBackendConfig::from_env())),
        );

        let report = run_matrix(Arc::new(runner), default_matrix())
            .await
            .expect("valid matrix");

        assert!(report.passed(), "{report}");
        for scenario in &report.scenarios {
            assert!(scenario.warnings.is_empty(), "teardown left resources: {scenario}");
        }
    }
}
