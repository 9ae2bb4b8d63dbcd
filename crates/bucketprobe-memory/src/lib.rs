//! In-memory cloud backend for bucketprobe.
//!
//! [`MemoryCloud`] simulates just enough of S3, IAM and STS to run a scenario
//! matrix without an AWS account: globally named buckets carrying the
//! deny-unencrypted-uploads policy, path-scoped managed policies, assumable
//! roles and injectable propagation lag.

mod error;
pub mod policy;
mod provisioner;
mod session;
mod state;

use std::sync::Arc;

pub use error::{CloudError, CloudResult};
pub use provisioner::{MemoryDeployment, MemoryProvisioner};
pub use session::{MemorySession, MemorySessions, Principal};
pub use state::{ACCOUNT_ID, CloudState, LagOptions, MemoryBucket, MemoryRole, StoredObject};

/// One simulated account, shared by its provisioner and session provider.
#[derive(Debug, Clone, Default)]
pub struct MemoryCloud {
    state: Arc<CloudState>,
}

impl MemoryCloud {
    /// Create an empty account with the given lag.
    #[must_use]
    pub fn new(lag: LagOptions) -> Self {
        Self {
            state: Arc::new(CloudState::new(lag)),
        }
    }

    /// Provisioner applying bucket and role modules to this account.
    #[must_use]
    pub fn provisioner(&self) -> Arc<MemoryProvisioner> {
        Arc::new(MemoryProvisioner::new(self.state.clone()))
    }

    /// Session provider issuing elevated and scoped sessions.
    #[must_use]
    pub fn sessions(&self) -> Arc<MemorySessions> {
        Arc::new(MemorySessions::new(self.state.clone()))
    }

    /// Underlying state, for inspection.
    #[must_use]
    pub fn state(&self) -> &CloudState {
        &self.state
    }

    /// Whether nothing is left behind.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.bucket_count() == 0
            && self.state.policy_count() == 0
            && self.state.role_count() == 0
    }
}
