use crate::events::ObjectNotification;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use aws_sdk_lambda::Client as LambdaClient;
use tracing::{error, instrument};

/// Asks the cleanup path to remove a rejected upload
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemovalRequester: Send + Sync {
    /// Fire-and-forget removal of `key`; returns once the request is accepted
    async fn request_removal(&self, bucket: Option<String>, key: &str) -> Result<()>;
}

/// Requests removal by invoking the cleanup function asynchronously
pub struct LambdaRemover {
    client: LambdaClient,
    function_name: String,
}

impl LambdaRemover {
    pub fn new(client: LambdaClient, function_name: impl Into<String>) -> Self {
        Self {
            client,
            function_name: function_name.into(),
        }
    }

    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig, function_name: impl Into<String>) -> Self {
        Self::new(LambdaClient::new(sdk_config), function_name)
    }
}

#[async_trait]
impl RemovalRequester for LambdaRemover {
    #[instrument(skip(self), fields(function = %self.function_name))]
    async fn request_removal(&self, bucket: Option<String>, key: &str) -> Result<()> {
        let payload = serde_json::to_vec(&ObjectNotification::single(bucket.as_deref(), key))
            .context("Failed to serialize removal request")?;

        let response = self
            .client
            .invoke()
            .function_name(&self.function_name)
            .invocation_type(InvocationType::Event)
            .payload(Blob::new(payload))
            .send()
            .await
            .with_context(|| format!("Failed to invoke {}", self.function_name))?;

        // 202 is the expected status code for Event invocations
        if response.status_code() != 202 {
            error!(
                status_code = response.status_code(),
                "Removal invocation was not accepted"
            );
            anyhow::bail!(
                "Removal invocation of {} returned status {}",
                self.function_name,
                response.status_code()
            );
        }

        Ok(())
    }
}
