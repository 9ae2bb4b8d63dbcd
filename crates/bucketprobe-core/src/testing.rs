//! In-crate test doubles.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::backend::{ObjectStore, SessionProvider};
use crate::error::{ProbeError, ProbeResult};
use crate::types::AwsRegion;

/// Object store that denies PUT/GET outside configured prefixes.
#[derive(Debug, Default)]
pub(crate) struct FakeStore {
    pub objects: Arc<Mutex<HashMap<String, Bytes>>>,
    pub writable: Vec<String>,
    pub readable: Vec<String>,
    pub transient_put_failures: AtomicU32,
    pub put_calls: AtomicU32,
    pub get_calls: AtomicU32,
}

impl FakeStore {
    pub fn allowing(writable: &[&str], readable: &[&str]) -> Self {
        Self {
            writable: writable.iter().map(|p| (*p).to_owned()).collect(),
            readable: readable.iter().map(|p| (*p).to_owned()).collect(),
            ..Self::default()
        }
    }

    pub fn insert(&self, key: &str, body: &str) {
        self.objects
            .lock()
            .insert(key.to_owned(), Bytes::from(body.to_owned()));
    }

    fn covered(prefixes: &[String], key: &str) -> bool {
        prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }
}

#[async_trait::async_trait]
impl ObjectStore for FakeStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        encryption: Option<&str>,
    ) -> ProbeResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if encryption.is_none() {
            return Err(ProbeError::object_store("PutObject", bucket, key, "unencrypted"));
        }
        if self
            .transient_put_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ProbeError::object_store("PutObject", bucket, key, "propagating"));
        }
        if !Self::covered(&self.writable, key) {
            return Err(ProbeError::object_store("PutObject", bucket, key, "AccessDenied"));
        }
        self.objects.lock().insert(key.to_owned(), body);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> ProbeResult<Bytes> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if !Self::covered(&self.readable, key) {
            return Err(ProbeError::object_store("GetObject", bucket, key, "AccessDenied"));
        }
        self.objects
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| ProbeError::object_store("GetObject", bucket, key, "NoSuchKey"))
    }

    async fn bucket_exists(&self, _bucket: &str) -> ProbeResult<bool> {
        Ok(true)
    }

    async fn bucket_policy(&self, _bucket: &str) -> ProbeResult<Option<String>> {
        Ok(Some("{}".to_owned()))
    }
}

/// Session provider whose role becomes assumable after a number of refusals.
#[derive(Debug)]
pub(crate) struct FakeSessions {
    pub scoped: Arc<FakeStore>,
    pub refusals: AtomicU32,
    pub assume_calls: AtomicU32,
}

impl FakeSessions {
    pub fn new(scoped: Arc<FakeStore>, refusals: u32) -> Self {
        Self {
            scoped,
            refusals: AtomicU32::new(refusals),
            assume_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait::async_trait]
impl SessionProvider for FakeSessions {
    async fn elevated(&self, _region: &AwsRegion) -> ProbeResult<Arc<dyn ObjectStore>> {
        let mut store = FakeStore::allowing(&[""], &[""]);
        store.objects = self.scoped.objects.clone();
        Ok(Arc::new(store))
    }

    async fn assume_role(
        &self,
        _region: &AwsRegion,
        role_id: &str,
    ) -> ProbeResult<Arc<dyn ObjectStore>> {
        self.assume_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ProbeError::Provision(format!(
                "AccessDenied: not authorized to assume {role_id}"
            )));
        }
        Ok(self.scoped.clone())
    }
}

/// Shared log of what a [`FakeProvisioner`]'s deployments did.
#[derive(Debug, Default)]
pub(crate) struct DeploymentLog {
    pub events: Mutex<Vec<String>>,
}

/// Provisioner whose deployments succeed or fail on demand.
#[derive(Debug, Default)]
pub(crate) struct FakeProvisioner {
    pub log: Arc<DeploymentLog>,
    pub fail_bucket: bool,
    pub fail_destroy: bool,
    pub wrong_bucket_name: bool,
}

#[async_trait::async_trait]
impl crate::backend::Provisioner for FakeProvisioner {
    async fn open(
        &self,
        ctx: &crate::types::ScenarioContext,
    ) -> ProbeResult<Box<dyn crate::backend::Deployment>> {
        self.log
            .events
            .lock()
            .push(format!("open {}", ctx.bucket_name));
        Ok(Box::new(FakeDeployment {
            log: self.log.clone(),
            fail_bucket: self.fail_bucket,
            fail_destroy: self.fail_destroy,
            wrong_bucket_name: self.wrong_bucket_name,
        }))
    }
}

#[derive(Debug)]
struct FakeDeployment {
    log: Arc<DeploymentLog>,
    fail_bucket: bool,
    fail_destroy: bool,
    wrong_bucket_name: bool,
}

#[async_trait::async_trait]
impl crate::backend::Deployment for FakeDeployment {
    async fn apply_bucket(
        &mut self,
        vars: &crate::backend::BucketVars,
    ) -> ProbeResult<crate::backend::BucketOutputs> {
        self.log.events.lock().push("apply_bucket".to_owned());
        if self.fail_bucket {
            return Err(ProbeError::Provision("invalid path".to_owned()));
        }
        let bucket_name = if self.wrong_bucket_name {
            format!("{}-other", vars.bucket_name)
        } else {
            vars.bucket_name.clone()
        };
        Ok(crate::backend::BucketOutputs {
            bucket_name,
            ro_policy_id: format!("{}-ro", vars.name_prefix),
            rw_policy_id: format!("{}-rw", vars.name_prefix),
        })
    }

    async fn apply_role(
        &mut self,
        vars: &crate::backend::RoleVars,
    ) -> ProbeResult<crate::backend::RoleOutputs> {
        self.log
            .events
            .lock()
            .push(format!("apply_role {}", vars.policy_ids.join(",")));
        Ok(crate::backend::RoleOutputs {
            role_id: format!("{}-role", vars.name_prefix),
        })
    }

    async fn destroy(&mut self) -> ProbeResult<()> {
        self.log.events.lock().push("destroy".to_owned());
        if self.fail_destroy {
            return Err(ProbeError::Teardown("bucket not empty".to_owned()));
        }
        Ok(())
    }
}
