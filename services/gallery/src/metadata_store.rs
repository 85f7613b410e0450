use crate::error::HandlerError;
use crate::model::{ImageRecord, MetadataField, StatusUpdate};
use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Image metadata table
///
/// Every mutation is a single request; the only coordination between writers
/// is the condition attached to that request.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a record unless one with the same id exists
    ///
    /// Fails with [`HandlerError::AlreadyExists`] when the id is taken.
    async fn insert_if_absent(&self, record: &ImageRecord) -> Result<(), HandlerError>;

    /// Set `metadata.<field>` on an existing record
    ///
    /// Fails with [`HandlerError::NotFound`] when the record does not exist.
    async fn set_metadata_field(
        &self,
        id: &str,
        field: MetadataField,
        value: &str,
    ) -> Result<(), HandlerError>;

    /// Set status, timestamp and optional reason, creating the item if needed
    async fn apply_status(&self, id: &str, update: &StatusUpdate) -> Result<(), HandlerError>;
}

/// Update request against a single item
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSpec {
    pub update_expression: String,
    pub condition_expression: Option<String>,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

impl UpdateSpec {
    /// `SET #metadata.#field = :value`, only when the record exists
    pub fn metadata_field(field: MetadataField, value: &str) -> Self {
        Self {
            update_expression: "SET #metadata.#field = :value".to_string(),
            condition_expression: Some("attribute_exists(#id)".to_string()),
            names: HashMap::from([
                ("#id".to_string(), "id".to_string()),
                ("#metadata".to_string(), "metadata".to_string()),
                ("#field".to_string(), field.storage_key().to_string()),
            ]),
            values: HashMap::from([(":value".to_string(), AttributeValue::S(value.to_string()))]),
        }
    }

    /// `SET #status = :status, #updatedAt = :updatedAt[, #reason = :reason]`
    pub fn status(update: &StatusUpdate) -> Self {
        let mut update_expression = "SET #status = :status, #updatedAt = :updatedAt".to_string();
        let mut names = HashMap::from([
            ("#status".to_string(), "status".to_string()),
            ("#updatedAt".to_string(), "updatedAt".to_string()),
        ]);
        let mut values = HashMap::from([
            (":status".to_string(), AttributeValue::S(update.status.to_string())),
            (":updatedAt".to_string(), AttributeValue::S(update.updated_at_iso())),
        ]);

        if let Some(ref reason) = update.reason {
            update_expression.push_str(", #reason = :reason");
            names.insert("#reason".to_string(), "reason".to_string());
            values.insert(":reason".to_string(), AttributeValue::S(reason.clone()));
        }

        Self {
            update_expression,
            condition_expression: None,
            names,
            values,
        }
    }
}

/// Metadata store backed by a DynamoDB table keyed by `id`
pub struct DynamoMetadataStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoMetadataStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        let table_name = table_name.into();
        info!(table = %table_name, "DynamoDB metadata store initialized");
        Self { client, table_name }
    }

    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig, table_name: impl Into<String>) -> Self {
        Self::new(DynamoClient::new(sdk_config), table_name)
    }

    fn key(id: &str) -> HashMap<String, AttributeValue> {
        HashMap::from([("id".to_string(), AttributeValue::S(id.to_string()))])
    }

    async fn update(&self, id: &str, spec: UpdateSpec) -> Result<(), HandlerError> {
        let conditional = spec.condition_expression.is_some();
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(id)))
            .update_expression(spec.update_expression)
            .set_condition_expression(spec.condition_expression)
            .set_expression_attribute_names(Some(spec.names))
            .set_expression_attribute_values(Some(spec.values))
            .send()
            .await;

        result.map(|_| ()).map_err(|e| {
            let condition_failed = e
                .as_service_error()
                .map(|e| e.is_conditional_check_failed_exception())
                .unwrap_or(false);
            let on_condition = conditional.then(|| HandlerError::NotFound(id.to_string()));
            map_write_error(e, condition_failed, on_condition, &format!("update image record {id}"))
        })
    }
}

/// Map a failed write to the handler error it stands for
///
/// A failed condition only means something when the request carried one
/// (`on_condition`); every other failure is an upstream error.
fn map_write_error<E>(
    err: E,
    condition_failed: bool,
    on_condition: Option<HandlerError>,
    action: &str,
) -> HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    match on_condition {
        Some(mapped) if condition_failed => mapped,
        _ => anyhow::Error::new(err)
            .context(format!("Failed to {action}"))
            .into(),
    }
}

#[async_trait]
impl MetadataStore for DynamoMetadataStore {
    #[instrument(skip(self, record), fields(id = %record.id))]
    async fn insert_if_absent(&self, record: &ImageRecord) -> Result<(), HandlerError> {
        let item: HashMap<String, AttributeValue> =
            serde_dynamo::to_item(record).context("Failed to encode image record")?;

        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(#id)")
            .expression_attribute_names("#id", "id")
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!(id = %record.id, "Image record inserted");
                Ok(())
            }
            Err(e) => {
                let condition_failed = e
                    .as_service_error()
                    .map(|e| e.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                Err(map_write_error(
                    e,
                    condition_failed,
                    Some(HandlerError::AlreadyExists(record.id.clone())),
                    &format!("insert image record {}", record.id),
                ))
            }
        }
    }

    #[instrument(skip(self, value))]
    async fn set_metadata_field(
        &self,
        id: &str,
        field: MetadataField,
        value: &str,
    ) -> Result<(), HandlerError> {
        self.update(id, UpdateSpec::metadata_field(field, value)).await
    }

    #[instrument(skip(self, update), fields(status = %update.status))]
    async fn apply_status(&self, id: &str, update: &StatusUpdate) -> Result<(), HandlerError> {
        self.update(id, UpdateSpec::status(update)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ImageStatus;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_metadata_field_update_touches_only_that_field() {
        let spec = UpdateSpec::metadata_field(MetadataField::Caption, "X");

        assert_eq!(spec.update_expression, "SET #metadata.#field = :value");
        assert_eq!(spec.condition_expression.as_deref(), Some("attribute_exists(#id)"));
        assert_eq!(spec.names.get("#metadata").map(String::as_str), Some("metadata"));
        assert_eq!(spec.names.get("#field").map(String::as_str), Some("caption"));
        assert_eq!(spec.values.len(), 1);
        assert_eq!(spec.values.get(":value"), Some(&AttributeValue::S("X".to_string())));
    }

    #[test]
    fn test_status_update_with_reason() {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap();
        let update = StatusUpdate::new(ImageStatus::Rejected, Some("blurry".to_string()), at);
        let spec = UpdateSpec::status(&update);

        assert_eq!(
            spec.update_expression,
            "SET #status = :status, #updatedAt = :updatedAt, #reason = :reason"
        );
        assert!(spec.condition_expression.is_none());
        assert_eq!(spec.values.len(), 3);
        assert_eq!(
            spec.values.get(":status"),
            Some(&AttributeValue::S("rejected".to_string()))
        );
        assert_eq!(
            spec.values.get(":updatedAt"),
            Some(&AttributeValue::S("2024-01-15T10:30:45.000Z".to_string()))
        );
        assert_eq!(
            spec.values.get(":reason"),
            Some(&AttributeValue::S("blurry".to_string()))
        );
    }

    #[test]
    fn test_status_update_without_reason() {
        let update = StatusUpdate::new(ImageStatus::Approved, None, Utc::now());
        let spec = UpdateSpec::status(&update);

        assert_eq!(spec.update_expression, "SET #status = :status, #updatedAt = :updatedAt");
        assert_eq!(spec.values.len(), 2);
        assert!(!spec.names.contains_key("#reason"));
    }

    fn throttled() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::Other, "ProvisionedThroughputExceededException")
    }

    #[test]
    fn test_failed_condition_maps_to_domain_error() {
        let err = map_write_error(
            throttled(),
            true,
            Some(HandlerError::NotFound("ghost.jpg".to_string())),
            "update image record ghost.jpg",
        );
        assert!(matches!(err, HandlerError::NotFound(ref id) if id == "ghost.jpg"));

        let err = map_write_error(
            throttled(),
            true,
            Some(HandlerError::AlreadyExists("cat.jpg".to_string())),
            "insert image record cat.jpg",
        );
        assert!(matches!(err, HandlerError::AlreadyExists(_)));
    }

    #[test]
    fn test_unconditional_write_failure_is_upstream() {
        // status updates carry no condition
        let err = map_write_error(throttled(), true, None, "update image record a.jpg");
        assert!(matches!(err, HandlerError::Upstream(_)));
        assert_eq!(err.to_string(), "Failed to update image record a.jpg");
    }

    #[test]
    fn test_other_failures_are_upstream() {
        let err = map_write_error(
            throttled(),
            false,
            Some(HandlerError::NotFound("a.jpg".to_string())),
            "update image record a.jpg",
        );
        assert_eq!(err.kind(), "upstream");
    }

    #[test]
    fn test_new_record_item_shape() {
        let item: HashMap<String, AttributeValue> =
            serde_dynamo::to_item(ImageRecord::new("cat.jpg")).unwrap();

        assert_eq!(item.len(), 2);
        assert_eq!(item.get("id"), Some(&AttributeValue::S("cat.jpg".to_string())));
        assert_eq!(item.get("metadata"), Some(&AttributeValue::M(HashMap::new())));
    }
}
