//! Error types for the permission-matrix engine.
//!
//! [`ProbeError`] follows the error taxonomy of a scenario run: provisioning,
//! fixture seeding, credential exchange, object-store access and teardown each
//! have their own variant so the runner can decide what is fatal.

/// Core error type for bucketprobe.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Invalid harness configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A scenario definition breaks one of the matrix rules.
    #[error("invalid scenario {scenario}: {reason}")]
    InvalidScenario {
        /// The offending scenario's test name.
        scenario: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Applying the bucket or role infrastructure failed.
    #[error("provisioning failed: {0}")]
    Provision(String),

    /// Writing a read-only fixture object with elevated credentials failed.
    #[error("failed to seed fixture s3://{bucket}/{key}: {message}")]
    FixtureSeed {
        /// Target bucket.
        bucket: String,
        /// Target key.
        key: String,
        /// Underlying error message.
        message: String,
    },

    /// The scoped role could not be assumed within the retry budget.
    #[error("could not assume role {role_id} after {attempts} attempt(s): {message}")]
    CredentialExchange {
        /// Role identifier that was being assumed.
        role_id: String,
        /// Number of attempts made.
        attempts: u32,
        /// Last error message.
        message: String,
    },

    /// An object-store call was rejected or failed.
    #[error("{op} s3://{bucket}/{key} failed: {message}")]
    ObjectStore {
        /// Operation name (`PutObject`, `GetObject`, ...).
        op: &'static str,
        /// Target bucket.
        bucket: String,
        /// Target key (empty for bucket-level operations).
        key: String,
        /// Underlying error message.
        message: String,
    },

    /// Destroying provisioned infrastructure failed.
    #[error("teardown failed: {0}")]
    Teardown(String),

    /// A terraform invocation failed.
    #[error("terraform {command} exited with {status}: {stderr}")]
    Terraform {
        /// The terraform sub-command (`init`, `apply`, ...).
        command: String,
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ProbeError {
    /// Build an [`ProbeError::ObjectStore`] error.
    #[must_use]
    pub fn object_store(
        op: &'static str,
        bucket: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ObjectStore {
            op,
            bucket: bucket.into(),
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Convenience result type for bucketprobe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;
