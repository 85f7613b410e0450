use super::{run_batch, HandlerResponse};
use crate::error::Result;
use crate::events::{uploaded_objects, ObjectRef};
use crate::metadata_store::MetadataStore;
use crate::model::{is_valid_image_type, ImageRecord};
use crate::remover::RemovalRequester;
use aws_lambda_events::event::s3::S3Event;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Registers new uploads (`log-image`)
///
/// Valid images get an empty record in the metadata table; anything else is
/// handed to the cleanup function for removal.
pub struct IngestHandler {
    store: Arc<dyn MetadataStore>,
    remover: Arc<dyn RemovalRequester>,
}

impl IngestHandler {
    pub fn new(store: Arc<dyn MetadataStore>, remover: Arc<dyn RemovalRequester>) -> Self {
        Self { store, remover }
    }

    /// Insert a record for a valid upload, or request removal of an invalid one
    #[instrument(skip(self), fields(key = %object.key))]
    pub async fn process_upload(&self, object: &ObjectRef) -> Result<()> {
        if !is_valid_image_type(&object.key) {
            warn!(bucket = ?object.bucket, "Invalid file type, requesting removal");
            self.remover
                .request_removal(object.bucket.clone(), &object.key)
                .await?;
            metrics::counter!("gallery.uploads.rejected").increment(1);
            return Ok(());
        }

        self.store
            .insert_if_absent(&ImageRecord::new(object.key.as_str()))
            .await?;

        metrics::counter!("gallery.uploads.ingested").increment(1);
        info!("Image logged");
        Ok(())
    }

    #[instrument(skip(self, event), fields(records = event.records.len()))]
    pub async fn handle(&self, event: S3Event) -> Result<HandlerResponse> {
        let objects = uploaded_objects(&event)?;
        let count = run_batch("log-image", objects, |object| async move {
            self.process_upload(&object).await
        })
        .await?;

        info!(count, "Processed all uploads");
        Ok(HandlerResponse::ok("Successfully processed all images"))
    }
}
