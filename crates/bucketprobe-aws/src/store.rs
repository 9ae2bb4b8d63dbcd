//! S3 object store.

use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;
use bucketprobe_core::{ObjectStore, ProbeError, ProbeResult};
use bytes::Bytes;
use tracing::debug;

/// [`ObjectStore`] over an S3 client bound to one set of credentials.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Wrap a configured client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Render an SDK error with its full source chain.
fn describe<E, R>(err: &SdkError<E, R>) -> String
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    DisplayErrorContext(err).to_string()
}

/// Whether an error code means "the bucket has no policy".
fn is_missing_policy(code: Option<&str>) -> bool {
    code == Some("NoSuchBucketPolicy")
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        encryption: Option<&str>,
    ) -> ProbeResult<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_server_side_encryption(encryption.map(ServerSideEncryption::from))
            .send()
            .await
            .map_err(|e| ProbeError::object_store("PutObject", bucket, key, describe(&e)))?;
        debug!(bucket, key, "object uploaded");
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> ProbeResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ProbeError::object_store("GetObject", bucket, key, describe(&e)))?;
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| ProbeError::object_store("GetObject", bucket, key, e.to_string()))?;
        Ok(data.into_bytes())
    }

    async fn bucket_exists(&self, bucket: &str) -> ProbeResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(e)) if e.err().is_not_found() => Ok(false),
            Err(e) => Err(ProbeError::object_store("HeadBucket", bucket, "", describe(&e))),
        }
    }

    async fn bucket_policy(&self, bucket: &str) -> ProbeResult<Option<String>> {
        match self.client.get_bucket_policy().bucket(bucket).send().await {
            Ok(output) => Ok(output.policy().map(ToOwned::to_owned)),
            Err(e) if is_missing_policy(e.code()) => Ok(None),
            Err(e) => Err(ProbeError::object_store("GetBucketPolicy", bucket, "", describe(&e))),
        }
    }
}
