//! Fan-out topology of the gallery topic.
//!
//! Mirrors the subscriptions provisioned on the topic so that publishers can
//! tell which handlers a message will reach before sending it.

use crate::events::{
    EventAttributes, EventType, ATTR_EVENT_TYPE, ATTR_NOTIFICATION_TYPE, ATTR_STATUS,
    NOTIFICATION_EMAIL,
};
use crate::model::ImageStatus;

/// Receives before a queued message moves to the dead-letter queue
pub const MAX_RECEIVE_COUNT: u32 = 3;

/// Attribute allow-lists a message must satisfy to be delivered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPolicy {
    rules: Vec<(String, Vec<String>)>,
}

impl FilterPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, attribute: &str, values: &[&str]) -> Self {
        self.rules.push((
            attribute.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        ));
        self
    }

    /// Every attribute named by the policy must be present with an allowed value
    pub fn matches(&self, attributes: &EventAttributes) -> bool {
        self.rules.iter().all(|(name, allowed)| {
            attributes
                .get(name)
                .map(|value| allowed.iter().any(|a| a == value))
                .unwrap_or(false)
        })
    }
}

/// Where a subscription delivers
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Function(String),
    Queue {
        queue: String,
        dead_letter_queue: String,
        max_receive_count: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub target: Target,
    pub filter: FilterPolicy,
}

impl Subscription {
    pub fn name(&self) -> &str {
        match &self.target {
            Target::Function(name) => name,
            Target::Queue { queue, .. } => queue,
        }
    }
}

/// The set of subscriptions on the gallery topic
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    subscriptions: Vec<Subscription>,
}

impl Topology {
    pub fn new(subscriptions: Vec<Subscription>) -> Self {
        Self { subscriptions }
    }

    /// Subscriptions provisioned for the gallery stack
    pub fn gallery() -> Self {
        let approved = ImageStatus::Approved.to_string();
        let rejected = ImageStatus::Rejected.to_string();

        Self::new(vec![
            Subscription {
                target: Target::Queue {
                    queue: "gallery-image-queue".to_string(),
                    dead_letter_queue: "gallery-image-dlq".to_string(),
                    max_receive_count: MAX_RECEIVE_COUNT,
                },
                filter: FilterPolicy::new()
                    .allow(ATTR_EVENT_TYPE, &[&EventType::ImageUpload.to_string()]),
            },
            Subscription {
                target: Target::Function("gallery-add-metadata".to_string()),
                filter: FilterPolicy::new()
                    .allow(ATTR_EVENT_TYPE, &[&EventType::MetadataUpdate.to_string()]),
            },
            Subscription {
                target: Target::Function("gallery-update-status".to_string()),
                filter: FilterPolicy::new()
                    .allow(ATTR_EVENT_TYPE, &[&EventType::StatusUpdate.to_string()])
                    .allow(ATTR_STATUS, &[&approved, &rejected]),
            },
            Subscription {
                target: Target::Function("gallery-confirmation-mailer".to_string()),
                filter: FilterPolicy::new()
                    .allow(ATTR_EVENT_TYPE, &[&EventType::Notification.to_string()])
                    .allow(ATTR_NOTIFICATION_TYPE, &[NOTIFICATION_EMAIL]),
            },
        ])
    }

    pub fn subscribers_for(&self, attributes: &EventAttributes) -> Vec<&Subscription> {
        self.subscriptions
            .iter()
            .filter(|s| s.filter.matches(attributes))
            .collect()
    }
}
