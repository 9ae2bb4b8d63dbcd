//! Integration tests for bucketprobe.
//!
//! Tests against the in-memory cloud run with a plain `cargo test`. Tests that
//! need a real AWS account (with terraform on `PATH`) or a running
//! S3-compatible server are marked `#[ignore]`.
//!
//! Run them with:
//! ```text
//! cargo test -p bucketprobe-integration -- --ignored
//! ```

use std::sync::{Arc, Once};

use aws_credential_types::Credentials;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use bucketprobe_core::{HarnessConfig, ScenarioRunner};
use bucketprobe_memory::{LagOptions, MemoryCloud};

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A fresh in-memory cloud and a runner over it, with retry delays removed.
#[must_use]
pub fn memory_runner(
    lag: LagOptions,
    config: HarnessConfig,
) -> (MemoryCloud, Arc<ScenarioRunner>) {
    init_tracing();
    let cloud = MemoryCloud::new(lag);
    let runner = ScenarioRunner::new(
        config.without_retry_delays(),
        cloud.provisioner(),
        cloud.sessions(),
    );
    (cloud, Arc::new(runner))
}

/// Endpoint URL of the S3-compatible server.
fn endpoint_url() -> String {
    std::env::var("S3_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:4566".to_owned())
}

/// Create an S3 client pointing at the local S3-compatible server.
#[must_use]
pub fn s3_client() -> aws_sdk_s3::Client {
    init_tracing();

    let creds = Credentials::new("test", "test", None, None, "integration-test");

    let config = aws_sdk_s3::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(creds)
        .endpoint_url(endpoint_url())
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(config)
}

/// Generate a unique bucket name for a test.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

mod test_live;
mod test_matrix;
mod test_s3_store;
