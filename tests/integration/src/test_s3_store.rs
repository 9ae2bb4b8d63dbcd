//! `S3ObjectStore` against a running S3-compatible server.

#[cfg(test)]
mod tests {
    use bucketprobe_aws::S3ObjectStore;
    use bucketprobe_core::{ObjectStore, ProbeError};
    use bytes::Bytes;

    use crate::{s3_client, test_bucket_name};

    #[tokio::test]
    #[ignore = "requires running S3-compatible server"]
    async fn test_should_put_and_get_encrypted_object() {
        let client = s3_client();
        let bucket = test_bucket_name("store");
        client
            .create_bucket()
            .bucket(&bucket)
            .send()
            .await
            .expect("create_bucket");
        let store = S3ObjectStore::new(client.clone());

        store
            .put_object(
                &bucket,
                "path/to/rw-folder/obj",
                Bytes::from_static(b"test"),
                Some("AES256"),
            )
            .await
            .expect("put_object");
        let body = store
            .get_object(&bucket, "path/to/rw-folder/obj")
            .await
            .expect("get_object");

        assert_eq!(body, Bytes::from_static(b"test"));
        assert!(store.bucket_exists(&bucket).await.expect("head_bucket"));
        assert_eq!(store.bucket_policy(&bucket).await.expect("policy"), None);

        let _ = client
            .delete_object()
            .bucket(&bucket)
            .key("path/to/rw-folder/obj")
            .send()
            .await;
        let _ = client.delete_bucket().bucket(&bucket).send().await;
    }

    #[tokio::test]
    #[ignore = "requires running S3-compatible server"]
    async fn test_should_report_missing_bucket_and_key() {
        let store = S3ObjectStore::new(s3_client());
        let bucket = test_bucket_name("missing");

        assert!(!store.bucket_exists(&bucket).await.expect("head_bucket"));
        let err = store.get_object(&bucket, "nope").await.unwrap_err();
        assert!(matches!(err, ProbeError::ObjectStore { op: "GetObject", .. }));
    }
}
