//! Scenario runner.
//!
//! [`ScenarioRunner::run`] sequences one scenario through
//! `provision → validate_provisioned → seed_fixtures → exchange_credentials →
//! validate_permissions → teardown`. Stages run strictly in order. A fatal
//! error marks the remaining stages as not reached and jumps to teardown,
//! which always runs once a deployment has been opened.

use std::sync::Arc;

use chrono::Utc;
use tracing::{Instrument, error, info, info_span, warn};

use crate::backend::{BucketVars, Deployment, ObjectStore, Provisioner, RoleVars, SessionProvider};
use crate::config::HarnessConfig;
use crate::error::{ProbeError, ProbeResult};
use crate::exchange::CredentialExchanger;
use crate::report::{ScenarioReport, StageStatus};
use crate::seeder::FixtureSeeder;
use crate::stage::Stage;
use crate::types::{BucketScenario, ScenarioContext};
use crate::validator::PermissionValidator;

/// Runs scenarios against a provisioner and a session provider.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    config: Arc<HarnessConfig>,
    provisioner: Arc<dyn Provisioner>,
    sessions: Arc<dyn SessionProvider>,
}

/// Values produced by the provision stage.
#[derive(Debug)]
struct Provisioned {
    bucket_name: String,
    role_id: String,
}

/// How the provision stage ended.
enum ProvisionResult {
    Applied(Provisioned),
    ExpectedFailure,
}

impl ScenarioRunner {
    /// Create a runner.
    #[must_use]
    pub fn new(
        config: HarnessConfig,
        provisioner: Arc<dyn Provisioner>,
        sessions: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            provisioner,
            sessions,
        }
    }

    /// The runner's configuration.
    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run one scenario to completion and report what happened.
    pub async fn run(&self, scenario: BucketScenario) -> ScenarioReport {
        let mut report = ScenarioReport::new(&scenario.test_name);
        let unique_id = self.config.unique_id();
        let span = info_span!("scenario", name = %scenario.test_name, unique_id = %unique_id);

        async {
            // Nothing is opened for a scenario breaking the matrix rules.
            let ctx = match scenario.validate().and_then(|()| {
                ScenarioContext::new(
                    &scenario.test_name,
                    unique_id,
                    self.config.pick_region(),
                    &self.config.bucket_name_prefix,
                )
            }) {
                Ok(ctx) => ctx,
                Err(e) => {
                    fail_from(&mut report, Stage::Provision, &e);
                    report.record(Stage::Teardown, StageStatus::NotReached);
                    return;
                }
            };
            report.unique_id = Some(ctx.unique_id.clone());
            report.region = Some(ctx.region.clone());
            report.bucket_name = Some(ctx.bucket_name.clone());
            info!(bucket = %ctx.bucket_name, region = %ctx.region, "starting scenario");

            let mut deployment = match self.provisioner.open(&ctx).await {
                Ok(d) => d,
                Err(e) => {
                    fail_from(&mut report, Stage::Provision, &e);
                    report.record(Stage::Teardown, StageStatus::NotReached);
                    return;
                }
            };

            self.run_stages(&scenario, &ctx, deployment.as_mut(), &mut report)
                .await;
            self.teardown(deployment.as_mut(), &mut report).await;
        }
        .instrument(span)
        .await;

        report.finished_at = Some(Utc::now());
        report
    }

    async fn run_stages(
        &self,
        scenario: &BucketScenario,
        ctx: &ScenarioContext,
        deployment: &mut dyn Deployment,
        report: &mut ScenarioReport,
    ) {
        let provisioned = match self.provision(scenario, ctx, deployment, report).await {
            Ok(ProvisionResult::Applied(p)) => p,
            Ok(ProvisionResult::ExpectedFailure) => {
                for stage in &Stage::ALL[1..5] {
                    report.record(*stage, StageStatus::Skipped);
                }
                return;
            }
            Err(e) => {
                fail_from(report, Stage::Provision, &e);
                return;
            }
        };

        let mut elevated: Option<Arc<dyn ObjectStore>> = None;

        if !self.skipped(Stage::ValidateProvisioned, report) {
            match self.elevated(ctx, &mut elevated).await {
                Ok(store) => {
                    self.validate_provisioned(ctx, &provisioned, store.as_ref(), report)
                        .await;
                    report.record(Stage::ValidateProvisioned, StageStatus::Completed);
                }
                Err(e) => {
                    fail_from(report, Stage::ValidateProvisioned, &e);
                    return;
                }
            }
        }

        if !self.skipped(Stage::SeedFixtures, report) {
            let seeded = match self.elevated(ctx, &mut elevated).await {
                Ok(store) => {
                    FixtureSeeder::new(self.config.fixture_bytes())
                        .seed_all(&scenario.probes, &provisioned.bucket_name, store.as_ref())
                        .await
                }
                Err(e) => Err(e),
            };
            match seeded {
                Ok(count) => {
                    info!(count, "seeded fixture objects");
                    report.record(Stage::SeedFixtures, StageStatus::Completed);
                }
                Err(e) => {
                    fail_from(report, Stage::SeedFixtures, &e);
                    return;
                }
            }
        }

        let exchanger = CredentialExchanger::new(self.config.assume_retry);
        let session = match exchanger
            .exchange(self.sessions.as_ref(), &ctx.region, &provisioned.role_id)
            .await
        {
            Ok(session) => {
                report.record(Stage::ExchangeCredentials, StageStatus::Completed);
                session
            }
            Err(e) => {
                fail_from(report, Stage::ExchangeCredentials, &e);
                return;
            }
        };

        if !self.skipped(Stage::ValidatePermissions, report) {
            let validator = PermissionValidator::new(
                self.config.probe_bytes(),
                self.config.fixture_bytes(),
                self.config.put_retry,
                self.config.get_retry,
            );
            report.probes = validator
                .validate_all(&scenario.probes, &provisioned.bucket_name, session.as_ref())
                .await;
            report.record(Stage::ValidatePermissions, StageStatus::Completed);
        }
    }

    async fn provision(
        &self,
        scenario: &BucketScenario,
        ctx: &ScenarioContext,
        deployment: &mut dyn Deployment,
        report: &mut ScenarioReport,
    ) -> ProbeResult<ProvisionResult> {
        let bucket_vars = BucketVars {
            bucket_name: ctx.bucket_name.clone(),
            read_only_paths: scenario.read_only_paths.clone(),
            read_write_paths: scenario.read_write_paths.clone(),
            name_prefix: ctx.name_prefix.clone(),
            region: ctx.region.clone(),
        };
        let applied = match deployment.apply_bucket(&bucket_vars).await {
            Ok(bucket) => {
                let role_vars = RoleVars {
                    name_prefix: ctx.name_prefix.clone(),
                    policy_ids: vec![bucket.ro_policy_id.clone(), bucket.rw_policy_id.clone()],
                    region: ctx.region.clone(),
                };
                deployment
                    .apply_role(&role_vars)
                    .await
                    .map(|role| (bucket, role))
            }
            Err(e) => Err(e),
        };

        if scenario.expect_apply_error {
            match applied {
                Err(e) => {
                    info!(error = %e, "provisioning failed as expected");
                    report.record(Stage::Provision, StageStatus::Completed);
                }
                Ok(_) => {
                    warn!("provisioning succeeded but an error was expected");
                    report.assertion_failed(
                        "expect_apply_error",
                        "provisioning succeeded but an error was expected",
                    );
                    report.record(Stage::Provision, StageStatus::Completed);
                }
            }
            return Ok(ProvisionResult::ExpectedFailure);
        }

        let (bucket, role) = applied?;
        report.record(Stage::Provision, StageStatus::Completed);
        Ok(ProvisionResult::Applied(Provisioned {
            bucket_name: bucket.bucket_name,
            role_id: role.role_id,
        }))
    }

    async fn validate_provisioned(
        &self,
        ctx: &ScenarioContext,
        provisioned: &Provisioned,
        store: &dyn ObjectStore,
        report: &mut ScenarioReport,
    ) {
        let bucket = provisioned.bucket_name.as_str();
        if bucket != ctx.bucket_name {
            report.assertion_failed(
                "compare_output",
                format!(
                    "bucket output {bucket} does not match requested name {}",
                    ctx.bucket_name
                ),
            );
        }
        match store.bucket_exists(bucket).await {
            Ok(true) => {}
            Ok(false) => report.assertion_failed(
                "validate_bucket_exists",
                format!("bucket {bucket} does not exist in {}", ctx.region),
            ),
            Err(e) => report.assertion_failed("validate_bucket_exists", e.to_string()),
        }
        match store.bucket_policy(bucket).await {
            Ok(Some(_)) => {}
            Ok(None) => report.assertion_failed(
                "validate_policy_bucket_attached",
                format!("bucket {bucket} has no policy attached"),
            ),
            Err(e) => report.assertion_failed("validate_policy_bucket_attached", e.to_string()),
        }
    }

    async fn teardown(&self, deployment: &mut dyn Deployment, report: &mut ScenarioReport) {
        if self.skipped(Stage::Teardown, report) {
            warn!("teardown skipped, infrastructure left in place");
            return;
        }
        match deployment.destroy().await {
            Ok(()) => {
                info!("destroyed scenario infrastructure");
                report.record(Stage::Teardown, StageStatus::Completed);
            }
            Err(e) => {
                warn!(error = %e, "teardown failed");
                report.warnings.push(e.to_string());
                report.record(Stage::Teardown, StageStatus::Failed(e.to_string()));
            }
        }
    }

    /// Lazily open the elevated session, shared by the stages that need it.
    async fn elevated(
        &self,
        ctx: &ScenarioContext,
        slot: &mut Option<Arc<dyn ObjectStore>>,
    ) -> ProbeResult<Arc<dyn ObjectStore>> {
        if let Some(store) = slot {
            return Ok(store.clone());
        }
        let store = self.sessions.elevated(&ctx.region).await?;
        *slot = Some(store.clone());
        Ok(store)
    }

    fn skipped(&self, stage: Stage, report: &mut ScenarioReport) -> bool {
        if self.config.skip.contains(stage) {
            info!(%stage, "skipping stage");
            report.record(stage, StageStatus::Skipped);
            true
        } else {
            false
        }
    }
}

/// Record a fatal failure at `stage` and mark the stages before teardown as not reached.
fn fail_from(report: &mut ScenarioReport, stage: Stage, err: &ProbeError) {
    error!(%stage, error = %err, "fatal stage failure");
    report.fatal = Some(err.to_string());
    report.record(stage, StageStatus::Failed(err.to_string()));
    for later in Stage::ALL
        .into_iter()
        .filter(|s| *s > stage && *s != Stage::Teardown)
    {
        report.record(later, StageStatus::NotReached);
    }
}
