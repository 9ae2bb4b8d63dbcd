//! Errors raised by the in-memory cloud.
//!
//! Variants mirror the S3/IAM/STS error codes a real account returns, so
//! messages read like the ones seen against AWS. At the backend trait boundary
//! they are converted into [`bucketprobe_core::ProbeError`].

/// In-memory cloud error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CloudError {
    /// The bucket does not exist.
    #[error("NoSuchBucket: the specified bucket does not exist: {bucket}")]
    NoSuchBucket {
        /// Bucket name.
        bucket: String,
    },

    /// The bucket name is already taken.
    #[error("BucketAlreadyExists: the requested bucket name is not available: {bucket}")]
    BucketAlreadyExists {
        /// Bucket name.
        bucket: String,
    },

    /// The key does not exist.
    #[error("NoSuchKey: the specified key does not exist: {key}")]
    NoSuchKey {
        /// Object key.
        key: String,
    },

    /// The caller is not allowed to perform the action.
    #[error("AccessDenied: {principal} is not authorized to perform {action} on {resource}")]
    AccessDenied {
        /// Who was denied.
        principal: String,
        /// The action, e.g. `s3:PutObject`.
        action: &'static str,
        /// The resource ARN.
        resource: String,
    },

    /// An argument was rejected.
    #[error("InvalidArgument: {0}")]
    InvalidArgument(String),

    /// An IAM entity does not exist.
    #[error("NoSuchEntity: {0}")]
    NoSuchEntity(String),

    /// An IAM entity already exists.
    #[error("EntityAlreadyExists: {0}")]
    EntityAlreadyExists(String),
}

/// Convenience result type for the in-memory cloud.
pub type CloudResult<T> = Result<T, CloudError>;
