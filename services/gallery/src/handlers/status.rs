use super::{run_batch, HandlerResponse};
use crate::error::{HandlerError, Result};
use crate::events::{sns_domain_events, DomainEvent, EventType};
use crate::metadata_store::MetadataStore;
use crate::model::{ImageStatus, StatusUpdate};
use aws_lambda_events::event::sns::SnsEvent;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};

/// Records review outcomes on image records (`update-status`)
///
/// Unlike metadata updates this does not require the record to exist: a
/// status for an unknown id creates a record holding only status fields.
pub struct StatusHandler {
    store: Arc<dyn MetadataStore>,
}

impl StatusHandler {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// Set status, a fresh `updatedAt` and the reason when one is given
    #[instrument(skip(self, status, reason), fields(status = %status))]
    pub async fn apply_status(
        &self,
        image_id: &str,
        status: ImageStatus,
        reason: Option<String>,
    ) -> Result<()> {
        if image_id.is_empty() {
            return Err(HandlerError::validation("Missing required field: imageId"));
        }

        let update = StatusUpdate::new(status, reason, Utc::now());
        self.store.apply_status(image_id, &update).await?;

        metrics::counter!("gallery.status.updated", "status" => status.to_string()).increment(1);
        info!(image_id, "Updated status");
        Ok(())
    }

    #[instrument(skip(self, event), fields(records = event.records.len()))]
    pub async fn handle(&self, event: SnsEvent) -> Result<HandlerResponse> {
        let events = sns_domain_events(&event, EventType::StatusUpdate)?;
        run_batch("update-status", events, |event| async move {
            match event {
                DomainEvent::StatusUpdate(update) => {
                    self.apply_status(&update.image_id, update.status, update.reason)
                        .await
                }
                other => Err(HandlerError::validation(format!(
                    "Unexpected {} event",
                    other.event_type()
                ))),
            }
        })
        .await?;

        Ok(HandlerResponse::ok("Successfully processed all records"))
    }
}
