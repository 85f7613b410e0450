//! Trigger payloads and gallery domain events.
//!
//! Lambda triggers arrive as loosely shaped JSON. Everything a handler acts on is
//! converted here into closed types, and any shape that does not match one of
//! them is rejected with a validation error.

use crate::error::HandlerError;
use crate::model::{ImageStatus, MetadataField};
use aws_lambda_events::event::dynamodb::Event as StreamEvent;
use aws_lambda_events::event::s3::S3Event;
use aws_lambda_events::event::sns::{MessageAttribute, SnsEvent};
use aws_lambda_events::event::sqs::SqsEvent;
use serde::{Deserialize, Serialize};
use serde_dynamo::Item;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Routing attribute naming the event type
pub const ATTR_EVENT_TYPE: &str = "eventType";
/// Routing attribute naming the metadata field being set
pub const ATTR_METADATA_TYPE: &str = "metadata_type";
/// Routing attribute carrying the review status
pub const ATTR_STATUS: &str = "status";
/// Routing attribute naming the notification channel
pub const ATTR_NOTIFICATION_TYPE: &str = "notificationType";

/// Only notification channel the mailer serves
pub const NOTIFICATION_EMAIL: &str = "email";

/// Reference to an object in the image bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// Bucket named by the trigger, if any
    pub bucket: Option<String>,
    pub key: String,
}

/// Extract the uploaded objects from an S3 notification
pub fn uploaded_objects(event: &S3Event) -> Result<Vec<ObjectRef>, HandlerError> {
    event
        .records
        .iter()
        .map(|record| {
            let key = record
                .s3
                .object
                .key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| HandlerError::validation("S3 record has no object key"))?;
            Ok(ObjectRef {
                bucket: record.s3.bucket.name.clone(),
                key,
            })
        })
        .collect()
}

/// S3-shaped notification carrying only bucket and key
///
/// Accepts genuine S3 notifications (extra fields are ignored) and is the payload
/// the ingest handler sends when it requests removal of a rejected upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectNotification {
    #[serde(rename = "Records")]
    pub records: Vec<ObjectRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub s3: ObjectEntity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntity {
    #[serde(default)]
    pub bucket: BucketName,
    pub object: ObjectKey,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectKey {
    pub key: String,
}

impl ObjectNotification {
    /// Removal request for a single object
    pub fn single(bucket: Option<&str>, key: &str) -> Self {
        Self {
            records: vec![ObjectRecord {
                s3: ObjectEntity {
                    bucket: BucketName {
                        name: bucket.map(str::to_string),
                    },
                    object: ObjectKey {
                        key: key.to_string(),
                    },
                },
            }],
        }
    }

    pub fn into_refs(self) -> Vec<ObjectRef> {
        self.records.into_iter().map(ObjectRecord::into_ref).collect()
    }
}

impl ObjectRecord {
    fn into_ref(self) -> ObjectRef {
        ObjectRef {
            bucket: self.s3.bucket.name,
            key: self.s3.object.key,
        }
    }
}

/// Body of a queued removal: a single S3 record or a whole notification
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QueuedRemoval {
    Record(ObjectRecord),
    Notification(ObjectNotification),
}

/// Extract the objects to remove from a cleanup trigger
///
/// The cleanup function is invoked directly with an S3-shaped payload or fed from
/// the work queue, where each message body holds an S3 record.
pub fn removal_targets(payload: Value) -> Result<Vec<ObjectRef>, HandlerError> {
    let is_queue = payload
        .get("Records")
        .and_then(Value::as_array)
        .and_then(|records| records.first())
        .and_then(|record| record.get("eventSource"))
        .and_then(Value::as_str)
        == Some("aws:sqs");

    if !is_queue {
        let notification: ObjectNotification = serde_json::from_value(payload)
            .map_err(|e| HandlerError::validation(format!("Unrecognized removal payload: {e}")))?;
        return Ok(notification.into_refs());
    }

    let event: SqsEvent = serde_json::from_value(payload)
        .map_err(|e| HandlerError::validation(format!("Malformed SQS event: {e}")))?;

    let mut targets = Vec::new();
    for message in event.records {
        let body = message
            .body
            .as_deref()
            .ok_or_else(|| HandlerError::validation("SQS message has no body"))?;
        let queued: QueuedRemoval = serde_json::from_str(body).map_err(|e| {
            HandlerError::validation(format!("Unrecognized queued removal body: {e}"))
        })?;
        match queued {
            QueuedRemoval::Record(record) => targets.push(record.into_ref()),
            QueuedRemoval::Notification(notification) => {
                targets.extend(notification.into_refs())
            }
        }
    }
    Ok(targets)
}

/// Routing attributes attached to a published event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventAttributes(BTreeMap<String, String>);

impl EventAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sns(attributes: &HashMap<String, MessageAttribute>) -> Self {
        Self(
            attributes
                .iter()
                .map(|(name, attr)| (name.clone(), attr.value.clone()))
                .collect(),
        )
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Value of the `eventType` routing attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum EventType {
    #[strum(serialize = "image-upload")]
    ImageUpload,
    #[strum(serialize = "metadata-update")]
    MetadataUpdate,
    #[strum(serialize = "status_update")]
    StatusUpdate,
    #[strum(serialize = "notification")]
    Notification,
}

/// New object registered on the work queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUploadEvent {
    pub key: String,
}

/// Single metadata field update; the field comes from the `metadata_type` attribute
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataUpdateEvent {
    pub id: String,
    pub field: MetadataField,
    pub value: String,
}

#[derive(Debug, Deserialize)]
struct MetadataUpdateBody {
    id: String,
    value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateEvent {
    pub image_id: String,
    pub status: ImageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub image_id: String,
    pub status: ImageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Event carried on the gallery topic
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    ImageUpload(ImageUploadEvent),
    MetadataUpdate(MetadataUpdateEvent),
    StatusUpdate(StatusUpdateEvent),
    Notification(NotificationEvent),
}

fn parse_body<T: serde::de::DeserializeOwned>(
    body: Value,
    event_type: EventType,
) -> Result<T, HandlerError> {
    serde_json::from_value(body)
        .map_err(|e| HandlerError::validation(format!("Malformed {event_type} event: {e}")))
}

impl DomainEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            DomainEvent::ImageUpload(_) => EventType::ImageUpload,
            DomainEvent::MetadataUpdate(_) => EventType::MetadataUpdate,
            DomainEvent::StatusUpdate(_) => EventType::StatusUpdate,
            DomainEvent::Notification(_) => EventType::Notification,
        }
    }

    /// Parse a message whose body or attributes declare its event type
    pub fn parse(message: &str, attributes: &EventAttributes) -> Result<Self, HandlerError> {
        Self::parse_with_default(message, attributes, None)
    }

    /// Parse a message delivered to a subscriber of `expected`
    ///
    /// Messages that declare no event type are read as `expected`; messages that
    /// declare a different one are rejected.
    pub fn parse_as(
        expected: EventType,
        message: &str,
        attributes: &EventAttributes,
    ) -> Result<Self, HandlerError> {
        let event = Self::parse_with_default(message, attributes, Some(expected))?;
        if event.event_type() != expected {
            return Err(HandlerError::validation(format!(
                "Expected {expected} event, received {}",
                event.event_type()
            )));
        }
        Ok(event)
    }

    fn parse_with_default(
        message: &str,
        attributes: &EventAttributes,
        default: Option<EventType>,
    ) -> Result<Self, HandlerError> {
        let mut body: Value = serde_json::from_str(message)
            .map_err(|e| HandlerError::validation(format!("Message is not valid JSON: {e}")))?;
        let fields = body
            .as_object_mut()
            .ok_or_else(|| HandlerError::validation("Message body must be a JSON object"))?;

        let declared_in_body = match fields.remove(ATTR_EVENT_TYPE) {
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                return Err(HandlerError::validation(format!(
                    "eventType must be a string, got {other}"
                )))
            }
            None => None,
        };
        let declared_in_attrs = attributes.get(ATTR_EVENT_TYPE);

        let declared = match (declared_in_body.as_deref(), declared_in_attrs) {
            (Some(in_body), Some(in_attrs)) if in_body != in_attrs => {
                return Err(HandlerError::validation(format!(
                    "eventType mismatch between body ({in_body}) and attributes ({in_attrs})"
                )))
            }
            (Some(t), _) | (None, Some(t)) => Some(t),
            (None, None) => None,
        };

        let event_type = match (declared, default) {
            (Some(raw), _) => raw
                .parse::<EventType>()
                .map_err(|_| HandlerError::validation(format!("Unrecognized eventType {raw:?}")))?,
            (None, Some(default)) => default,
            (None, None) => return Err(HandlerError::validation("Message declares no eventType")),
        };

        match event_type {
            EventType::ImageUpload => Ok(DomainEvent::ImageUpload(parse_body(body, event_type)?)),
            EventType::MetadataUpdate => {
                let raw_field = attributes
                    .get(ATTR_METADATA_TYPE)
                    .ok_or_else(|| HandlerError::validation("Missing metadata_type attribute"))?;
                let body: MetadataUpdateBody = parse_body(body, event_type)?;
                Ok(DomainEvent::MetadataUpdate(MetadataUpdateEvent {
                    id: body.id,
                    field: MetadataField::parse(raw_field)?,
                    value: body.value,
                }))
            }
            EventType::StatusUpdate => Ok(DomainEvent::StatusUpdate(parse_body(body, event_type)?)),
            EventType::Notification => {
                let channel = match fields_notification_type(&body, attributes) {
                    Some(channel) => channel,
                    None => NOTIFICATION_EMAIL.to_string(),
                };
                if channel != NOTIFICATION_EMAIL {
                    return Err(HandlerError::validation(format!(
                        "Unsupported notificationType {channel:?}"
                    )));
                }
                let mut body = body;
                if let Some(fields) = body.as_object_mut() {
                    fields.remove(ATTR_NOTIFICATION_TYPE);
                }
                Ok(DomainEvent::Notification(parse_body(body, event_type)?))
            }
        }
    }

    /// JSON body published for this event
    pub fn to_message(&self) -> Result<String, HandlerError> {
        let mut body = match self {
            DomainEvent::ImageUpload(event) => serde_json::to_value(event),
            DomainEvent::MetadataUpdate(event) => Ok(serde_json::json!({
                "id": event.id,
                "value": event.value,
            })),
            DomainEvent::StatusUpdate(event) => serde_json::to_value(event),
            DomainEvent::Notification(event) => serde_json::to_value(event),
        }
        .map_err(|e| HandlerError::Upstream(anyhow::Error::new(e).context("Failed to serialize event")))?;

        // Metadata bodies stay `{id, value}`; their type travels in the attributes
        if !matches!(self, DomainEvent::MetadataUpdate(_)) {
            if let Some(fields) = body.as_object_mut() {
                fields.insert(
                    ATTR_EVENT_TYPE.to_string(),
                    Value::String(self.event_type().to_string()),
                );
            }
        }
        Ok(body.to_string())
    }

    /// Attributes the topic's subscription filters match on
    pub fn routing_attributes(&self) -> EventAttributes {
        let attributes = EventAttributes::new().with(ATTR_EVENT_TYPE, self.event_type().to_string());
        match self {
            DomainEvent::ImageUpload(_) => attributes,
            DomainEvent::MetadataUpdate(event) => {
                attributes.with(ATTR_METADATA_TYPE, event.field.to_string())
            }
            DomainEvent::StatusUpdate(event) => attributes.with(ATTR_STATUS, event.status.to_string()),
            DomainEvent::Notification(event) => attributes
                .with(ATTR_STATUS, event.status.to_string())
                .with(ATTR_NOTIFICATION_TYPE, NOTIFICATION_EMAIL),
        }
    }
}

fn fields_notification_type(body: &Value, attributes: &EventAttributes) -> Option<String> {
    body.get(ATTR_NOTIFICATION_TYPE)
        .and_then(Value::as_str)
        .or_else(|| attributes.get(ATTR_NOTIFICATION_TYPE))
        .map(str::to_string)
}

/// Domain events carried by an SNS delivery, in record order
pub fn sns_domain_events(
    event: &SnsEvent,
    expected: EventType,
) -> Result<Vec<DomainEvent>, HandlerError> {
    event
        .records
        .iter()
        .map(|record| {
            let attributes = EventAttributes::from_sns(&record.sns.message_attributes);
            DomainEvent::parse_as(expected, &record.sns.message, &attributes)
        })
        .collect()
}

/// Fields of an image record the confirmation mailer reads from a stream image
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusImage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl StatusImage {
    /// Decode a record image carried by a stream record
    pub fn from_item(item: &Item) -> Result<Self, HandlerError> {
        serde_dynamo::from_item(item.clone())
            .map_err(|e| HandlerError::validation(format!("Malformed stream image: {e}")))
    }
}

/// Trigger of the confirmation mailer
#[derive(Debug, Clone)]
pub enum MailerTrigger {
    Stream(StreamEvent),
    Sns(SnsEvent),
}

impl MailerTrigger {
    /// Identify the trigger by the source of its first record
    pub fn from_value(payload: Value) -> Result<Self, HandlerError> {
        let first = payload
            .get("Records")
            .and_then(Value::as_array)
            .ok_or_else(|| HandlerError::validation("Mailer payload has no Records"))?
            .first()
            .cloned();

        let Some(first) = first else {
            return serde_json::from_value(payload)
                .map(MailerTrigger::Stream)
                .map_err(|e| HandlerError::validation(format!("Malformed stream event: {e}")));
        };

        let source = first
            .get("eventSource")
            .or_else(|| first.get("EventSource"))
            .and_then(Value::as_str);

        match source {
            Some("aws:dynamodb") => serde_json::from_value(payload)
                .map(MailerTrigger::Stream)
                .map_err(|e| HandlerError::validation(format!("Malformed stream event: {e}"))),
            Some("aws:sns") => serde_json::from_value(payload)
                .map(MailerTrigger::Sns)
                .map_err(|e| HandlerError::validation(format!("Malformed SNS event: {e}"))),
            _ if first.get("dynamodb").is_some() => serde_json::from_value(payload)
                .map(MailerTrigger::Stream)
                .map_err(|e| HandlerError::validation(format!("Malformed stream event: {e}"))),
            other => Err(HandlerError::validation(format!(
                "Unsupported mailer trigger source {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{json, Value};

    pub fn sns_record(message: &str, attributes: &[(&str, &str)]) -> Value {
        let attributes: serde_json::Map<String, Value> = attributes
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    json!({"Type": "String", "Value": value}),
                )
            })
            .collect();
        json!({
            "EventSource": "aws:sns",
            "EventVersion": "1.0",
            "EventSubscriptionArn": "arn:aws:sns:us-east-1:123456789012:gallery-image-topic:sub",
            "Sns": {
                "Type": "Notification",
                "MessageId": "95df01b4-ee98-5cb9-9903-4c221d41eb5e",
                "TopicArn": "arn:aws:sns:us-east-1:123456789012:gallery-image-topic",
                "Subject": null,
                "Message": message,
                "Timestamp": "2024-01-01T00:00:00.000Z",
                "SignatureVersion": "1",
                "Signature": "EXAMPLE",
                "SigningCertUrl": "https://sns.us-east-1.amazonaws.com/cert.pem",
                "UnsubscribeUrl": "https://sns.us-east-1.amazonaws.com/unsubscribe",
                "MessageAttributes": attributes
            }
        })
    }

    pub fn sns_event(records: Vec<Value>) -> aws_lambda_events::event::sns::SnsEvent {
        serde_json::from_value(json!({ "Records": records })).unwrap()
    }

    pub fn s3_record(bucket: &str, key: &str) -> Value {
        json!({
            "eventVersion": "2.1",
            "eventSource": "aws:s3",
            "awsRegion": "us-east-1",
            "eventTime": "2024-01-01T00:00:00.000Z",
            "eventName": "ObjectCreated:Put",
            "userIdentity": {"principalId": "EXAMPLE"},
            "requestParameters": {"sourceIPAddress": "127.0.0.1"},
            "responseElements": {
                "x-amz-request-id": "EXAMPLE123456789",
                "x-amz-id-2": "EXAMPLE123/5678abcdefghijklambdaisawesome/mnopqrstuvwxyzABCDEFGH"
            },
            "s3": {
                "s3SchemaVersion": "1.0",
                "configurationId": "testConfigRule",
                "bucket": {
                    "name": bucket,
                    "ownerIdentity": {"principalId": "EXAMPLE"},
                    "arn": format!("arn:aws:s3:::{bucket}")
                },
                "object": {
                    "key": key,
                    "size": 1024,
                    "eTag": "0123456789abcdef0123456789abcdef",
                    "sequencer": "0A1B2C3D4E5F678901"
                }
            }
        })
    }

    pub fn sqs_record(body: &str) -> Value {
        json!({
            "messageId": "059f36b4-87a3-44ab-83d2-661975830a7d",
            "receiptHandle": "AQEBwJnKyrHigUMZj6rYigCgxlaS3SLy0a",
            "body": body,
            "attributes": {
                "ApproximateReceiveCount": "1",
                "SentTimestamp": "1545082649183",
                "SenderId": "AIDAIENQZJOLO23YVJ4VO",
                "ApproximateFirstReceiveTimestamp": "1545082649185"
            },
            "messageAttributes": {},
            "md5OfBody": "098f6bcd4621d373cade4e832627b4f6",
            "eventSource": "aws:sqs",
            "eventSourceARN": "arn:aws:sqs:us-east-1:123456789012:gallery-image-queue",
            "awsRegion": "us-east-1"
        })
    }

    pub fn stream_record(event_name: &str, new_image: Value) -> Value {
        json!({
            "eventID": "1",
            "eventName": event_name,
            "eventVersion": "1.1",
            "eventSource": "aws:dynamodb",
            "awsRegion": "us-east-1",
            "dynamodb": {
                "Keys": {"id": {"S": "test-image-1"}},
                "NewImage": new_image,
                "SequenceNumber": "111",
                "SizeBytes": 26,
                "StreamViewType": "NEW_AND_OLD_IMAGES"
            },
            "eventSourceARN": "arn:aws:dynamodb:us-east-1:123456789012:table/gallery-image-table/stream/2024"
        })
    }
}
