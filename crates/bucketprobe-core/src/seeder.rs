//! Fixture seeding.
//!
//! Read-only paths can only be tested if an object already exists there, and
//! the scoped role cannot create it. [`FixtureSeeder`] writes those objects
//! with elevated credentials before the scoped role is assumed.

use bytes::Bytes;
use tracing::{debug, info};

use crate::backend::ObjectStore;
use crate::error::{ProbeError, ProbeResult};
use crate::types::ObjectProbe;

/// What the seeder did with one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The fixture object was written.
    Seeded,
    /// The probe does not need a fixture.
    Skipped,
}

/// Writes fixture objects with elevated credentials.
#[derive(Debug, Clone)]
pub struct FixtureSeeder {
    body: Bytes,
}

impl FixtureSeeder {
    /// Create a seeder writing `body`.
    #[must_use]
    pub fn new(body: Bytes) -> Self {
        Self { body }
    }

    /// The fixture body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Seed one probe.
    ///
    /// Probes the scoped role writes itself, and unencrypted probes, are
    /// skipped. A failed write is fatal for the scenario.
    pub async fn seed(
        &self,
        probe: &ObjectProbe,
        bucket: &str,
        store: &dyn ObjectStore,
    ) -> ProbeResult<SeedOutcome> {
        if !probe.needs_fixture() {
            debug!(key = %probe.key, "no fixture needed");
            return Ok(SeedOutcome::Skipped);
        }

        info!(bucket, key = %probe.key, "elevated credentials: uploading fixture object");
        store
            .put_object(bucket, &probe.key, self.body.clone(), probe.encryption())
            .await
            .map_err(|e| ProbeError::FixtureSeed {
                bucket: bucket.to_owned(),
                key: probe.key.clone(),
                message: e.to_string(),
            })?;
        info!(bucket, key = %probe.key, "uploaded fixture object");
        Ok(SeedOutcome::Seeded)
    }

    /// Seed every probe in order, stopping at the first failure.
    ///
    /// Returns the number of objects written.
    pub async fn seed_all(
        &self,
        probes: &[ObjectProbe],
        bucket: &str,
        store: &dyn ObjectStore,
    ) -> ProbeResult<usize> {
        let mut seeded = 0;
        for probe in probes {
            if self.seed(probe, bucket, store).await? == SeedOutcome::Seeded {
                seeded += 1;
            }
        }
        Ok(seeded)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::testing::FakeStore;

    fn seeder() -> FixtureSeeder {
        FixtureSeeder::new(Bytes::from_static(b"fixture"))
    }

    #[tokio::test]
    async fn test_should_seed_read_only_probe() {
        let store = FakeStore::allowing(&[""], &[""]);
        let probe = ObjectProbe::new("a/ro/o1", "AES256", true, false);

        let outcome = seeder().seed(&probe, "bucket", &store).await.unwrap();

        assert_eq!(outcome, SeedOutcome::Seeded);
        assert_eq!(store.objects.lock()["a/ro/o1"].as_ref(), b"fixture");
    }

    #[tokio::test]
    async fn test_should_skip_writable_and_unencrypted_probes() {
        let store = FakeStore::allowing(&[""], &[""]);
        let writable = ObjectProbe::new("a/rw/o2", "AES256", true, true);
        let unencrypted = ObjectProbe::new("a/rw/o3", "", false, false);

        assert_eq!(
            seeder().seed(&writable, "b", &store).await.unwrap(),
            SeedOutcome::Skipped
        );
        assert_eq!(
            seeder().seed(&unencrypted, "b", &store).await.unwrap(),
            SeedOutcome::Skipped
        );
        assert_eq!(store.put_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_should_continue_past_skipped_probes() {
        let store = FakeStore::allowing(&[""], &[""]);
        let probes = vec![
            ObjectProbe::new("a/rw/o1", "AES256", true, true),
            ObjectProbe::new("a/ro/o2", "AES256", true, false),
            ObjectProbe::new("a/rw/o3", "", false, false),
            ObjectProbe::new("other/o4", "AES256", false, false),
        ];

        let seeded = seeder().seed_all(&probes, "b", &store).await.unwrap();

        assert_eq!(seeded, 2);
        let objects = store.objects.lock();
        assert!(objects.contains_key("a/ro/o2"));
        assert!(objects.contains_key("other/o4"));
        assert!(!objects.contains_key("a/rw/o1"));
    }

    #[tokio::test]
    async fn test_should_fail_when_fixture_write_is_denied() {
        let store = FakeStore::allowing(&["nowhere/"], &[""]);
        let probe = ObjectProbe::new("a/ro/o1", "AES256", true, false);

        let err = seeder().seed(&probe, "b", &store).await.unwrap_err();

        assert!(matches!(err, ProbeError::FixtureSeed { ref key, .. } if key == "a/ro/o1"));
    }
}
