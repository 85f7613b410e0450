use crate::config::AwsConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::Client as S3Client;
use tracing::{debug, instrument};

/// Blob storage holding the uploaded image files
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Delete `key` from `bucket`; deleting a missing key succeeds
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;
}

/// Object store backed by S3
pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }

    /// Create a client from the shared SDK configuration
    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig, aws: &AwsConfig) -> Self {
        let mut s3_config_builder = S3ConfigBuilder::from(sdk_config);

        // Force path-style access for LocalStack compatibility
        if aws.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        Self::new(S3Client::from_conf(s3_config_builder.build()))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self))]
    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to delete {key} from bucket {bucket}"))?;

        debug!(bucket = %bucket, key = %key, "Object deleted");
        Ok(())
    }
}
