//! Path-scoped IAM policies and the bucket policy document.

use serde::{Deserialize, Serialize};

use crate::error::{CloudError, CloudResult};

/// Server-side encryption algorithms S3 accepts.
pub const SSE_ALGORITHMS: [&str; 3] = ["AES256", "aws:kms", "aws:kms:dsse"];

/// The access a path policy grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathAccess {
    /// `s3:GetObject` under the prefixes.
    ReadOnly,
    /// `s3:GetObject` and `s3:PutObject` under the prefixes.
    ReadWrite,
}

/// A managed policy granting access to path prefixes of one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathPolicy {
    /// Policy ARN.
    pub id: String,
    /// Bucket the policy applies to.
    pub bucket: String,
    /// Granted access.
    pub access: PathAccess,
    /// Path prefixes, without trailing slash.
    pub prefixes: Vec<String>,
}

impl PathPolicy {
    /// Whether the policy grants `s3:GetObject` on `key` in `bucket`.
    #[must_use]
    pub fn allows_get(&self, bucket: &str, key: &str) -> bool {
        self.bucket == bucket && self.covers(key)
    }

    /// Whether the policy grants `s3:PutObject` on `key` in `bucket`.
    #[must_use]
    pub fn allows_put(&self, bucket: &str, key: &str) -> bool {
        self.access == PathAccess::ReadWrite && self.allows_get(bucket, key)
    }

    /// Resource `arn:aws:s3:::bucket/<prefix>/*` matching.
    fn covers(&self, key: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            key.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// Validate the path lists handed to the bucket module.
pub fn validate_paths(read_only: &[String], read_write: &[String]) -> CloudResult<()> {
    for path in read_only.iter().chain(read_write) {
        if path.is_empty() {
            return Err(CloudError::InvalidArgument("path must not be empty".to_owned()));
        }
        if path.starts_with('/') || path.ends_with('/') {
            return Err(CloudError::InvalidArgument(format!(
                "path {path:?} must not begin or end with '/'"
            )));
        }
        if path.contains('*') {
            return Err(CloudError::InvalidArgument(format!(
                "path {path:?} must not contain wildcards"
            )));
        }
    }
    if let Some(both) = read_only.iter().find(|p| read_write.contains(p)) {
        return Err(CloudError::InvalidArgument(format!(
            "path {both:?} is both read-only and read-write"
        )));
    }
    Ok(())
}

/// Validate an `x-amz-server-side-encryption` value.
pub fn validate_encryption(encryption: &str) -> CloudResult<()> {
    if SSE_ALGORITHMS.contains(&encryption) {
        Ok(())
    } else {
        Err(CloudError::InvalidArgument(format!(
            "unsupported server-side encryption {encryption:?}"
        )))
    }
}

/// The bucket policy attached by the module: deny unencrypted uploads.
#[must_use]
pub fn bucket_policy_document(bucket: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "DenyUnencryptedObjectUploads",
            "Effect": "Deny",
            "Principal": "*",
            "Action": "s3:PutObject",
            "Resource": format!("arn:aws:s3:::{bucket}/*"),
            "Condition": {"Null": {"s3:x-amz-server-side-encryption": "true"}}
        }]
    })
    .to_string()
}
