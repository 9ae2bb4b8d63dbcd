//! Scoped credential exchange.

use std::sync::Arc;

use tracing::info;

use crate::backend::{ObjectStore, SessionProvider};
use crate::error::{ProbeError, ProbeResult};
use crate::retry::{RetryPolicy, retry};
use crate::types::AwsRegion;

/// Exchanges a role identifier for a scoped session.
///
/// A role created moments ago may not be assumable yet, so the exchange is
/// retried under the configured policy.
#[derive(Debug, Clone, Copy)]
pub struct CredentialExchanger {
    policy: RetryPolicy,
}

impl CredentialExchanger {
    /// Create an exchanger with the given retry budget.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Assume `role_id`, retrying until the budget is spent.
    pub async fn exchange(
        &self,
        sessions: &dyn SessionProvider,
        region: &AwsRegion,
        role_id: &str,
    ) -> ProbeResult<Arc<dyn ObjectStore>> {
        let assume = move |_: u32| sessions.assume_role(region, role_id);
        let session = retry("assume role", self.policy, assume)
            .await
            .map_err(|e| ProbeError::CredentialExchange {
                role_id: role_id.to_owned(),
                attempts: e.attempts,
                message: e.last.to_string(),
            })?;
        info!(role_id, "assumed role");
        Ok(session)
    }
}
