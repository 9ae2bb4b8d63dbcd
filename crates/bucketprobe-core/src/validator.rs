//! Scoped-role permission checks.
//!
//! For every probe the validator attempts a PUT and then a GET with the
//! scoped session and compares each final outcome with the probe's
//! expectation. Both attempts are retried because the role's policies may
//! still be propagating. A PUT that is expected to fail always exhausts its
//! retry budget; that is tolerated.

use bytes::Bytes;
use tracing::{info, warn};

use crate::backend::ObjectStore;
use crate::report::{CheckOutcome, ProbeOutcome};
use crate::retry::{RetryPolicy, retry};
use crate::types::ObjectProbe;

/// Validates probes against a scoped session.
#[derive(Debug, Clone)]
pub struct PermissionValidator {
    probe_body: Bytes,
    fixture_body: Bytes,
    put_retry: RetryPolicy,
    get_retry: RetryPolicy,
}

impl PermissionValidator {
    /// Create a validator.
    ///
    /// `probe_body` is what the scoped role writes; `fixture_body` is what
    /// the fixture step wrote for read-only probes.
    #[must_use]
    pub fn new(
        probe_body: Bytes,
        fixture_body: Bytes,
        put_retry: RetryPolicy,
        get_retry: RetryPolicy,
    ) -> Self {
        Self {
            probe_body,
            fixture_body,
            put_retry,
            get_retry,
        }
    }

    /// The body a successful GET of `probe` must return.
    #[must_use]
    pub fn expected_body(&self, probe: &ObjectProbe) -> &Bytes {
        if probe.needs_fixture() {
            &self.fixture_body
        } else {
            &self.probe_body
        }
    }

    /// Run the PUT check, then the GET check.
    pub async fn validate(
        &self,
        probe: &ObjectProbe,
        bucket: &str,
        session: &dyn ObjectStore,
    ) -> ProbeOutcome {
        let write = self.check_put(probe, bucket, session).await;
        let read = self.check_get(probe, bucket, session).await;
        ProbeOutcome {
            key: probe.key.clone(),
            write,
            read,
        }
    }

    /// Validate every probe in order. A mismatch never stops later probes.
    pub async fn validate_all(
        &self,
        probes: &[ObjectProbe],
        bucket: &str,
        session: &dyn ObjectStore,
    ) -> Vec<ProbeOutcome> {
        let mut outcomes = Vec::with_capacity(probes.len());
        for probe in probes {
            outcomes.push(self.validate(probe, bucket, session).await);
        }
        outcomes
    }

    async fn check_put(
        &self,
        probe: &ObjectProbe,
        bucket: &str,
        session: &dyn ObjectStore,
    ) -> CheckOutcome {
        let key = probe.key.as_str();
        let encryption = probe.encryption();
        let body = &self.probe_body;
        info!(key, "trying to upload using scoped role");
        let result = retry("upload object", self.put_retry, move |_| {
            session.put_object(bucket, key, body.clone(), encryption)
        })
        .await;

        match (probe.expect_pass_write, result) {
            (true, Ok(())) => {
                info!(key, "uploaded using scoped role");
                CheckOutcome::Passed
            }
            (false, Err(_)) => {
                info!(key, "could not be uploaded using scoped role");
                CheckOutcome::Passed
            }
            (true, Err(e)) => {
                warn!(key, error = %e, "upload unexpectedly failed");
                CheckOutcome::Mismatch {
                    expected_success: true,
                    detail: format!("got error: {}", e.last),
                }
            }
            (false, Ok(())) => {
                warn!(key, "upload unexpectedly succeeded");
                CheckOutcome::Mismatch {
                    expected_success: false,
                    detail: "upload succeeded".to_owned(),
                }
            }
        }
    }

    async fn check_get(
        &self,
        probe: &ObjectProbe,
        bucket: &str,
        session: &dyn ObjectStore,
    ) -> CheckOutcome {
        let key = probe.key.as_str();
        let result = retry("read object", self.get_retry, move |_| {
            session.get_object(bucket, key)
        })
        .await;

        match (probe.expect_pass_read, result) {
            (true, Ok(body)) => {
                let expected = self.expected_body(probe);
                if body == *expected {
                    info!(key, "read using scoped role");
                    CheckOutcome::Passed
                } else {
                    warn!(key, "read returned unexpected content");
                    CheckOutcome::Mismatch {
                        expected_success: true,
                        detail: format!(
                            "content mismatch: expected {:?}, got {:?}",
                            String::from_utf8_lossy(expected),
                            String::from_utf8_lossy(&body)
                        ),
                    }
                }
            }
            (false, Err(_)) => {
                info!(key, "could not be read using scoped role");
                CheckOutcome::Passed
            }
            (true, Err(e)) => {
                warn!(key, error = %e, "read unexpectedly failed");
                CheckOutcome::Mismatch {
                    expected_success: true,
                    detail: format!("got error: {}", e.last),
                }
            }
            (false, Ok(_)) => {
                warn!(key, "read unexpectedly succeeded");
                CheckOutcome::Mismatch {
                    expected_success: false,
                    detail: "read succeeded".to_owned(),
                }
            }
        }
    }
}
