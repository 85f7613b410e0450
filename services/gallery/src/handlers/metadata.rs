use super::{run_batch, HandlerResponse};
use crate::error::{HandlerError, Result};
use crate::events::{sns_domain_events, DomainEvent, EventType};
use crate::metadata_store::MetadataStore;
use crate::model::MetadataField;
use aws_lambda_events::event::sns::SnsEvent;
use std::sync::Arc;
use tracing::{info, instrument};

/// Applies single-field metadata updates (`add-metadata`)
pub struct MetadataHandler {
    store: Arc<dyn MetadataStore>,
}

impl MetadataHandler {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// Set one metadata field on an existing image record
    ///
    /// Inputs are validated before the store is touched; a missing record
    /// surfaces as [`HandlerError::NotFound`].
    #[instrument(skip(self, value))]
    pub async fn apply_metadata_field(
        &self,
        image_id: &str,
        field_type: &str,
        value: &str,
    ) -> Result<()> {
        if field_type.is_empty() {
            return Err(HandlerError::validation(
                "Missing required fields: metadata_type must be non-empty",
            ));
        }
        let field = MetadataField::parse(field_type)?;

        self.apply(image_id, field, value).await
    }

    async fn apply(&self, image_id: &str, field: MetadataField, value: &str) -> Result<()> {
        if image_id.is_empty() || value.is_empty() {
            return Err(HandlerError::validation(
                "Missing required fields: id and value must be non-empty",
            ));
        }

        self.store.set_metadata_field(image_id, field, value).await?;

        metrics::counter!("gallery.metadata.updated", "field" => field.storage_key()).increment(1);
        info!(image_id, field = %field, "Updated metadata");
        Ok(())
    }

    #[instrument(skip(self, event), fields(records = event.records.len()))]
    pub async fn handle(&self, event: SnsEvent) -> Result<HandlerResponse> {
        let events = sns_domain_events(&event, EventType::MetadataUpdate)?;
        run_batch("add-metadata", events, |event| async move {
            match event {
                DomainEvent::MetadataUpdate(update) => {
                    self.apply(&update.id, update.field, &update.value).await
                }
                other => Err(HandlerError::validation(format!(
                    "Unexpected {} event",
                    other.event_type()
                ))),
            }
        })
        .await?;

        Ok(HandlerResponse::ok("Successfully updated metadata"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::fixtures::{sns_event, sns_record};
    use crate::metadata_store::MockMetadataStore;

    #[tokio::test]
    async fn test_caption_sets_only_caption() {
        let mut store = MockMetadataStore::new();
        store
            .expect_set_metadata_field()
            .withf(|id, field, value| {
                id == "test-image.jpg" && *field == MetadataField::Caption && value == "Test Caption"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        MetadataHandler::new(Arc::new(store))
            .apply_metadata_field("test-image.jpg", "Caption", "Test Caption")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_field_type_never_reaches_store() {
        let mut store = MockMetadataStore::new();
        store.expect_set_metadata_field().never();
        let handler = MetadataHandler::new(Arc::new(store));

        for field_type in ["Bogus", "caption", "DATE"] {
            let err = handler
                .apply_metadata_field("a.jpg", field_type, "x")
                .await
                .unwrap_err();
            assert!(matches!(err, HandlerError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_empty_inputs_are_rejected() {
        let mut store = MockMetadataStore::new();
        store.expect_set_metadata_field().never();
        let handler = MetadataHandler::new(Arc::new(store));

        assert!(handler.apply_metadata_field("", "Name", "Ann").await.is_err());
        assert!(handler.apply_metadata_field("a.jpg", "", "Ann").await.is_err());
        let err = handler
            .apply_metadata_field("a.jpg", "Name", "")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Missing required fields"));
    }

    #[tokio::test]
    async fn test_missing_record_propagates_not_found() {
        let mut store = MockMetadataStore::new();
        store
            .expect_set_metadata_field()
            .returning(|id, _, _| Err(HandlerError::NotFound(id.to_string())));

        let err = MetadataHandler::new(Arc::new(store))
            .apply_metadata_field("ghost.jpg", "Date", "2024-01-01")
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::NotFound(ref id) if id == "ghost.jpg"));
    }

    #[tokio::test]
    async fn test_handle_reads_field_from_attribute() {
        let mut store = MockMetadataStore::new();
        store
            .expect_set_metadata_field()
            .withf(|id, field, value| id == "test-image.jpg" && *field == MetadataField::Name && value == "Ann")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let event = sns_event(vec![sns_record(
            r#"{"id":"test-image.jpg","value":"Ann"}"#,
            &[("metadata_type", "Name")],
        )]);
        let response = MetadataHandler::new(Arc::new(store))
            .handle(event)
            .await
            .unwrap();
        assert_eq!(response.body.message, "Successfully updated metadata");
    }

    #[tokio::test]
    async fn test_handle_rejects_missing_attribute() {
        let mut store = MockMetadataStore::new();
        store.expect_set_metadata_field().never();

        let event = sns_event(vec![sns_record(r#"{"id":"a.jpg","value":"x"}"#, &[])]);
        let err = MetadataHandler::new(Arc::new(store))
            .handle(event)
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Validation(_)));
    }
}
