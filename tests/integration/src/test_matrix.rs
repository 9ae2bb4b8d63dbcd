//! Scenario matrices against the in-memory cloud.

#[cfg(test)]
mod tests {
    use bucketprobe_core::{
        HarnessConfig, Stage, StageStatus, default_matrix, load_matrix, parse_matrix, run_matrix,
    };
    use bucketprobe_memory::LagOptions;

    use crate::memory_runner;

    const MATRIX: &str = r#"[
        {
            "testName": "CustomSinglePath",
            "readOnlyPaths": ["team/a/ro"],
            "readWritePaths": ["team/a/rw"],
            "probes": [
                {"key": "team/a/ro/report.csv", "encryption": "AES256", "expectPassRead": true, "expectPassWrite": false},
                {"key": "team/a/rw/upload.csv", "encryption": "aws:kms", "expectPassRead": true, "expectPassWrite": true},
                {"key": "team/a/rw/plain.csv", "expectPassRead": false, "expectPassWrite": false},
                {"key": "team/b/secret.csv", "encryption": "AES256", "expectPassRead": false, "expectPassWrite": false}
            ]
        },
        {
            "testName": "RootedPathRejected",
            "readOnlyPaths": ["/rooted"],
            "readWritePaths": [],
            "probes": [],
            "expectApplyError": true
        }
    ]"#;

    #[tokio::test]
    async fn test_should_pass_builtin_matrix() {
        let (cloud, runner) = memory_runner(LagOptions::default(), HarnessConfig::default());

        let report = run_matrix(runner, default_matrix()).await.unwrap();

        assert!(report.passed(), "{report}");
        for scenario in &report.scenarios {
            assert_eq!(
                scenario.stage_status(Stage::Teardown),
                Some(&StageStatus::Completed)
            );
            let bucket = scenario.bucket_name.as_deref().unwrap();
            assert!(bucket.starts_with("terratest-s3-"), "{bucket}");
        }
        assert!(cloud.is_empty());
    }

    #[tokio::test]
    async fn test_should_run_matrix_loaded_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.json");
        tokio::fs::write(&path, MATRIX).await.unwrap();
        let scenarios = load_matrix(&path).await.unwrap();
        let (cloud, runner) = memory_runner(LagOptions::default(), HarnessConfig::default());

        let report = run_matrix(runner, scenarios).await.unwrap();

        assert!(report.passed(), "{report}");
        let rejected = report.scenario("RootedPathRejected").unwrap();
        assert_eq!(
            rejected.stage_status(Stage::ValidatePermissions),
            Some(&StageStatus::Skipped)
        );
        assert!(cloud.is_empty());
    }

    #[tokio::test]
    async fn test_should_absorb_lag_within_budget() {
        let (_cloud, runner) = memory_runner(
            LagOptions {
                assume_refusals: 2,
                scoped_put_refusals: 3,
            },
            HarnessConfig::default(),
        );

        let report = run_matrix(runner, default_matrix()).await.unwrap();

        assert!(report.passed(), "{report}");
    }

    #[tokio::test]
    async fn test_should_fail_only_the_broken_scenario() {
        let mut scenarios = parse_matrix(MATRIX).unwrap();
        // A read-only path never accepts writes.
        scenarios[0].probes[0].expect_pass_write = true;
        let (cloud, runner) = memory_runner(LagOptions::default(), HarnessConfig::default());

        let report = run_matrix(runner, scenarios).await.unwrap();

        assert!(!report.passed());
        assert_eq!(report.failed_count(), 1);
        let broken = report.scenario("CustomSinglePath").unwrap();
        assert!(!broken.probe("team/a/ro/report.csv").unwrap().passed());
        assert!(broken.probe("team/a/rw/upload.csv").unwrap().passed());
        assert!(report.to_string().ends_with("2 scenario(s), 1 failed"));
        assert!(cloud.is_empty());
    }

    #[tokio::test]
    async fn test_should_honor_skip_variables() {
        let config = HarnessConfig::from_lookup(|name| match name {
            "SKIP_teardown" | "SKIP_validate_provisioned" => Some("true".to_owned()),
            "BUCKETPROBE_REGION" => Some("eu-west-1".to_owned()),
            _ => None,
        })
        .unwrap();
        let (cloud, runner) = memory_runner(LagOptions::default(), config);

        let report = run_matrix(runner, default_matrix()).await.unwrap();

        assert!(report.passed(), "{report}");
        let first = &report.scenarios[0];
        assert_eq!(first.region.as_ref().unwrap().as_str(), "eu-west-1");
        assert_eq!(
            first.stage_status(Stage::ValidateProvisioned),
            Some(&StageStatus::Skipped)
        );
        assert_eq!(cloud.state().bucket_count(), 2);
    }

    #[tokio::test]
    async fn test_should_run_many_scenarios_in_parallel() {
        let scenarios: Vec<_> = (0..16)
            .flat_map(|i| {
                default_matrix().into_iter().map(move |mut s| {
                    s.test_name = format!("{}{i}", s.test_name);
                    s
                })
            })
            .collect();
        let (cloud, runner) = memory_runner(LagOptions::default(), HarnessConfig::default());

        let report = run_matrix(runner, scenarios).await.unwrap();

        assert!(report.passed(), "{report}");
        assert_eq!(report.scenarios.len(), 32);
        assert!(cloud.is_empty());
    }

    #[tokio::test]
    async fn test_should_refuse_duplicate_names() {
        let mut scenarios = default_matrix();
        scenarios[1].test_name = scenarios[0].test_name.clone();
        let (cloud, runner) = memory_runner(LagOptions::default(), HarnessConfig::default());

        assert!(run_matrix(runner, scenarios).await.is_err());
        assert_eq!(cloud.state().bucket_count(), 0);
    }
}
