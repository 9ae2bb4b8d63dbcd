//! Shared state of the in-memory cloud.
//!
//! [`CloudState`] holds buckets, managed policies and roles. Bucket names are
//! global, as in S3. All maps are `DashMap`s, so parallel scenarios need no
//! external locking.

use std::sync::atomic::{AtomicU32, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{CloudError, CloudResult};
use crate::policy::{PathPolicy, bucket_policy_document, validate_encryption};

/// Account id used in generated ARNs.
pub const ACCOUNT_ID: &str = "000000000000";

/// Injected eventual-consistency lag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LagOptions {
    /// Refused `sts:AssumeRole` calls before a new role becomes assumable.
    pub assume_refusals: u32,
    /// Denied PUTs on a fresh scoped session before its policies apply.
    pub scoped_put_refusals: u32,
}

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Object body.
    pub body: Bytes,
    /// Server-side encryption it was written with.
    pub encryption: String,
}

/// One bucket.
#[derive(Debug)]
pub struct MemoryBucket {
    /// Region the bucket lives in.
    pub region: String,
    /// Attached bucket policy document.
    pub policy: Option<String>,
    objects: RwLock<std::collections::HashMap<String, StoredObject>>,
}

impl MemoryBucket {
    fn new(region: String, policy: Option<String>) -> Self {
        Self {
            region,
            policy,
            objects: RwLock::new(std::collections::HashMap::new()),
        }
    }

    /// Number of stored objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }
}

/// An IAM role.
#[derive(Debug)]
pub struct MemoryRole {
    /// Attached policy ARNs.
    pub policy_ids: Vec<String>,
    pending_assumes: AtomicU32,
}

/// Buckets, policies and roles of one simulated account.
#[derive(Debug, Default)]
pub struct CloudState {
    buckets: DashMap<String, MemoryBucket>,
    policies: DashMap<String, PathPolicy>,
    roles: DashMap<String, MemoryRole>,
    lag: LagOptions,
}

impl CloudState {
    /// Create an empty account with the given lag.
    #[must_use]
    pub fn new(lag: LagOptions) -> Self {
        Self {
            lag,
            ..Self::default()
        }
    }

    /// Injected lag.
    #[must_use]
    pub fn lag(&self) -> LagOptions {
        self.lag
    }

    // -----------------------------------------------------------------------
    // Buckets
    // -----------------------------------------------------------------------

    /// Create a bucket with the deny-unencrypted-uploads policy attached.
    pub fn create_bucket(&self, name: &str, region: &str) -> CloudResult<()> {
        match self.buckets.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(CloudError::BucketAlreadyExists {
                bucket: name.to_owned(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(MemoryBucket::new(
                    region.to_owned(),
                    Some(bucket_policy_document(name)),
                ));
                info!(bucket = name, region, "bucket created");
                Ok(())
            }
        }
    }

    /// Delete a bucket and everything in it.
    pub fn force_delete_bucket(&self, name: &str) -> bool {
        let removed = self.buckets.remove(name).is_some();
        if removed {
            info!(bucket = name, "bucket deleted");
        }
        removed
    }

    /// Whether the bucket exists.
    #[must_use]
    pub fn bucket_exists(&self, name: &str) -> bool {
        self.buckets.contains_key(name)
    }

    /// Attached bucket policy.
    pub fn bucket_policy(&self, name: &str) -> CloudResult<Option<String>> {
        self.buckets
            .get(name)
            .map(|b| b.policy.clone())
            .ok_or_else(|| CloudError::NoSuchBucket {
                bucket: name.to_owned(),
            })
    }

    /// Number of buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of objects in `bucket`, if it exists.
    #[must_use]
    pub fn object_count(&self, bucket: &str) -> Option<usize> {
        self.buckets.get(bucket).map(|b| b.object_count())
    }

    /// Write an object, enforcing the bucket policy's encryption requirement.
    ///
    /// Identity-based authorization is the caller's job.
    pub fn put_object(
        &self,
        principal: &str,
        bucket: &str,
        key: &str,
        body: Bytes,
        encryption: Option<&str>,
    ) -> CloudResult<()> {
        let b = self
            .buckets
            .get(bucket)
            .ok_or_else(|| CloudError::NoSuchBucket {
                bucket: bucket.to_owned(),
            })?;
        let Some(encryption) = encryption else {
            return Err(CloudError::AccessDenied {
                principal: principal.to_owned(),
                action: "s3:PutObject",
                resource: object_arn(bucket, key),
            });
        };
        validate_encryption(encryption)?;
        b.objects.write().insert(
            key.to_owned(),
            StoredObject {
                body,
                encryption: encryption.to_owned(),
            },
        );
        debug!(bucket, key, principal, "object stored");
        Ok(())
    }

    /// Read an object.
    pub fn get_object(&self, bucket: &str, key: &str) -> CloudResult<StoredObject> {
        let b = self
            .buckets
            .get(bucket)
            .ok_or_else(|| CloudError::NoSuchBucket {
                bucket: bucket.to_owned(),
            })?;
        b.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| CloudError::NoSuchKey {
                key: key.to_owned(),
            })
    }

    // -----------------------------------------------------------------------
    // IAM
    // -----------------------------------------------------------------------

    /// Create a managed policy.
    pub fn create_policy(&self, policy: PathPolicy) -> CloudResult<()> {
        match self.policies.entry(policy.id.clone()) {
            Entry::Occupied(_) => Err(CloudError::EntityAlreadyExists(policy.id)),
            Entry::Vacant(slot) => {
                debug!(policy = %policy.id, "policy created");
                slot.insert(policy);
                Ok(())
            }
        }
    }

    /// Delete a managed policy.
    pub fn delete_policy(&self, id: &str) -> bool {
        self.policies.remove(id).is_some()
    }

    /// Number of managed policies.
    #[must_use]
    pub fn policy_count(&self) -> usize {
        self.policies.len()
    }

    /// Create a role with the given policies attached.
    pub fn create_role(&self, id: &str, policy_ids: Vec<String>) -> CloudResult<()> {
        if let Some(missing) = policy_ids.iter().find(|p| !self.policies.contains_key(*p)) {
            return Err(CloudError::NoSuchEntity(format!("policy {missing} not found")));
        }
        match self.roles.entry(id.to_owned()) {
            Entry::Occupied(_) => Err(CloudError::EntityAlreadyExists(id.to_owned())),
            Entry::Vacant(slot) => {
                slot.insert(MemoryRole {
                    policy_ids,
                    pending_assumes: AtomicU32::new(self.lag.assume_refusals),
                });
                info!(role = id, "role created");
                Ok(())
            }
        }
    }

    /// Delete a role.
    pub fn delete_role(&self, id: &str) -> bool {
        self.roles.remove(id).is_some()
    }

    /// Number of roles.
    #[must_use]
    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    /// Check that `role_id` can be assumed right now.
    ///
    /// A new role refuses the first `assume_refusals` attempts.
    pub fn assume_role(&self, role_id: &str) -> CloudResult<()> {
        let role = self
            .roles
            .get(role_id)
            .ok_or_else(|| CloudError::NoSuchEntity(format!("role {role_id} not found")))?;
        if role
            .pending_assumes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(CloudError::AccessDenied {
                principal: format!("arn:aws:iam::{ACCOUNT_ID}:user/harness"),
                action: "sts:AssumeRole",
                resource: role_id.to_owned(),
            });
        }
        Ok(())
    }

    /// Whether any policy attached to `role_id` satisfies `allowed`.
    pub fn role_allows(&self, role_id: &str, allowed: impl Fn(&PathPolicy) -> bool) -> bool {
        let Some(role) = self.roles.get(role_id) else {
            return false;
        };
        role.policy_ids
            .iter()
            .filter_map(|id| self.policies.get(id))
            .any(|policy| allowed(&policy))
    }
}

/// ARN of an object.
#[must_use]
pub fn object_arn(bucket: &str, key: &str) -> String {
    format!("arn:aws:s3:::{bucket}/{key}")
}
