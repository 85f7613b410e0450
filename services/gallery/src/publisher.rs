use crate::error::HandlerError;
use crate::events::{DomainEvent, EventAttributes};
use crate::routing::Topology;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_sns::types::MessageAttributeValue;
use aws_sdk_sns::Client as SnsClient;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Publishes raw messages to the gallery topic
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish `message` with string attributes; returns the message id
    async fn publish(&self, message: &str, attributes: &EventAttributes) -> Result<String>;
}

/// Publisher backed by an SNS topic
pub struct SnsPublisher {
    client: SnsClient,
    topic_arn: String,
}

impl SnsPublisher {
    pub fn new(client: SnsClient, topic_arn: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }

    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig, topic_arn: impl Into<String>) -> Self {
        Self::new(SnsClient::new(sdk_config), topic_arn)
    }
}

#[async_trait]
impl EventPublisher for SnsPublisher {
    #[instrument(skip(self, message, attributes), fields(topic = %self.topic_arn))]
    async fn publish(&self, message: &str, attributes: &EventAttributes) -> Result<String> {
        let mut message_attributes = HashMap::new();
        for (name, value) in attributes.iter() {
            let attribute = MessageAttributeValue::builder()
                .data_type("String")
                .string_value(value)
                .build()
                .with_context(|| format!("Failed to build message attribute {name}"))?;
            message_attributes.insert(name.to_string(), attribute);
        }

        let output = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .message(message)
            .set_message_attributes(Some(message_attributes))
            .send()
            .await
            .context("Failed to publish gallery event")?;

        Ok(output.message_id().unwrap_or_default().to_string())
    }
}

/// Publishes domain events with the attributes the topic filters on
pub struct GalleryEvents {
    publisher: Arc<dyn EventPublisher>,
    topology: Topology,
}

impl GalleryEvents {
    pub fn new(publisher: Arc<dyn EventPublisher>, topology: Topology) -> Self {
        Self {
            publisher,
            topology,
        }
    }

    /// Publish an event, refusing events no subscription would deliver
    #[instrument(skip(self, event), fields(event_type = %event.event_type()))]
    pub async fn publish(&self, event: &DomainEvent) -> Result<String, HandlerError> {
        let attributes = event.routing_attributes();
        let subscribers: Vec<&str> = self
            .topology
            .subscribers_for(&attributes)
            .into_iter()
            .map(|s| s.name())
            .collect();

        if subscribers.is_empty() {
            return Err(HandlerError::validation(format!(
                "No subscription accepts {} events with attributes {attributes:?}",
                event.event_type()
            )));
        }
        debug!(subscribers = ?subscribers, "Routing event");

        let message = event.to_message()?;
        let message_id = self.publisher.publish(&message, &attributes).await?;

        info!(message_id = %message_id, "Event published");
        Ok(message_id)
    }
}
