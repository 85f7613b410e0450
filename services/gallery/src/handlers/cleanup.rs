use super::{run_batch, HandlerResponse};
use crate::config::CleanupSettings;
use crate::error::Result;
use crate::events::removal_targets;
use crate::object_store::ObjectStore;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Deletes rejected uploads from the image bucket (`remove-image`)
pub struct CleanupHandler {
    objects: Arc<dyn ObjectStore>,
    settings: CleanupSettings,
}

impl CleanupHandler {
    pub fn new(objects: Arc<dyn ObjectStore>, settings: CleanupSettings) -> Self {
        Self { objects, settings }
    }

    /// Delete `key` from the configured bucket
    ///
    /// Deleting a key that no longer exists succeeds, so redelivered removals
    /// are harmless.
    #[instrument(skip(self), fields(bucket = %self.settings.bucket_name))]
    pub async fn remove_object(&self, key: &str) -> Result<()> {
        self.objects
            .delete(&self.settings.bucket_name, key)
            .await?;

        metrics::counter!("gallery.objects.removed").increment(1);
        info!("Removed file");
        Ok(())
    }

    /// Remove every object named by a direct invocation or a queue batch
    #[instrument(skip(self, payload))]
    pub async fn handle(&self, payload: Value) -> Result<HandlerResponse> {
        let targets = removal_targets(payload)?;
        let count = run_batch("remove-image", targets, |target| async move {
            if let Some(ref bucket) = target.bucket {
                if bucket != &self.settings.bucket_name {
                    debug!(requested = %bucket, "Ignoring bucket named by the trigger");
                }
            }
            self.remove_object(&target.key).await
        })
        .await?;

        info!(count, "Removed all files");
        Ok(HandlerResponse::ok("Successfully removed all files"))
    }
}
