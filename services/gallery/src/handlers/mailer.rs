use super::{run_batch, HandlerResponse};
use crate::config::MailerSettings;
use crate::error::{HandlerError, Result};
use crate::events::{
    sns_domain_events, DomainEvent, EventType, MailerTrigger, NotificationEvent, StatusImage,
};
use crate::mailer::{MailSender, StatusNotice};
use serde_dynamo::Item;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Stream event name of an updated record
const MODIFY: &str = "MODIFY";

/// Emails the image owner when a review status changes (`confirmation-mailer`)
pub struct ConfirmationMailer {
    sender: Arc<dyn MailSender>,
    settings: MailerSettings,
}

impl ConfirmationMailer {
    pub fn new(sender: Arc<dyn MailSender>, settings: MailerSettings) -> Self {
        Self { sender, settings }
    }

    /// Send a notice for a modified record
    ///
    /// Returns whether an email was sent. Inserts, removals and images lacking
    /// an id or status are skipped.
    #[instrument(skip(self, new_image))]
    pub async fn notify_from_stream_record(&self, event_name: &str, new_image: &Item) -> Result<bool> {
        if event_name != MODIFY {
            debug!("Skipping non-MODIFY stream record");
            return Ok(false);
        }

        let image = StatusImage::from_item(new_image)?;
        let (Some(image_id), Some(status)) = (image.id, image.status) else {
            warn!("Record image lacks id or status, skipping");
            return Ok(false);
        };

        let notice = StatusNotice {
            image_id,
            status,
            reason: image.reason.filter(|r| !r.is_empty()),
            email: image.email,
        };
        self.send(&notice).await?;
        Ok(true)
    }

    /// Send a notice for a routed notification event
    #[instrument(skip(self, event), fields(image_id = %event.image_id))]
    pub async fn notify_from_event(&self, event: &NotificationEvent) -> Result<()> {
        if event.image_id.is_empty() {
            return Err(HandlerError::validation("Missing required field: imageId"));
        }

        let notice = StatusNotice {
            image_id: event.image_id.clone(),
            status: event.status.to_string(),
            reason: event.reason.clone().filter(|r| !r.is_empty()),
            email: event.email.clone(),
        };
        self.send(&notice).await
    }

    async fn send(&self, notice: &StatusNotice) -> Result<()> {
        let email = notice.render(&self.settings.sender_email, &self.settings.default_recipient);
        self.sender.send(&email).await?;

        metrics::counter!("gallery.notifications.sent").increment(1);
        info!(image_id = %notice.image_id, to = %email.to, "Sent notification");
        Ok(())
    }

    #[instrument(skip(self, trigger))]
    pub async fn handle(&self, trigger: MailerTrigger) -> Result<HandlerResponse> {
        match trigger {
            MailerTrigger::Stream(event) => {
                run_batch("confirmation-mailer", event.records, |record| async move {
                    self.notify_from_stream_record(&record.event_name, &record.change.new_image)
                        .await
                        .map(|_| ())
                })
                .await?;
            }
            MailerTrigger::Sns(event) => {
                let events = sns_domain_events(&event, EventType::Notification)?;
                run_batch("confirmation-mailer", events, |event| async move {
                    match event {
                        DomainEvent::Notification(notification) => {
                            self.notify_from_event(&notification).await
                        }
                        other => Err(HandlerError::validation(format!(
                            "Unexpected {} event",
                            other.event_type()
                        ))),
                    }
                })
                .await?;
            }
        }

        Ok(HandlerResponse::ok("Successfully sent notification"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::fixtures::{sns_record, stream_record};
    use crate::mailer::MockMailSender;
    use crate::model::ImageStatus;
    use serde_json::{json, Value};

    fn settings() -> MailerSettings {
        MailerSettings {
            sender_email: "gallery@example.com".to_string(),
            default_recipient: "reviews@example.com".to_string(),
        }
    }

    fn image(value: Value) -> Item {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_insert_sends_nothing() {
        let mut sender = MockMailSender::new();
        sender.expect_send().never();
        let mailer = ConfirmationMailer::new(Arc::new(sender), settings());

        let new_image = image(json!({"id": {"S": "x"}, "status": {"S": "approved"}}));
        for event_name in ["INSERT", "REMOVE"] {
            let sent = mailer
                .notify_from_stream_record(event_name, &new_image)
                .await
                .unwrap();
            assert!(!sent);
        }
    }

    #[tokio::test]
    async fn test_modify_sends_one_email() {
        let mut sender = MockMailSender::new();
        sender
            .expect_send()
            .withf(|email| {
                email.subject.contains('x')
                    && email.html_body.contains("approved")
                    && email.to == "reviews@example.com"
                    && email.from == "gallery@example.com"
            })
            .times(1)
            .returning(|_| Ok(()));
        let mailer = ConfirmationMailer::new(Arc::new(sender), settings());

        let new_image = image(json!({"id": {"S": "x"}, "status": {"S": "approved"}}));
        let sent = mailer
            .notify_from_stream_record("MODIFY", &new_image)
            .await
            .unwrap();
        assert!(sent);
    }

    #[tokio::test]
    async fn test_incomplete_image_is_skipped() {
        let mut sender = MockMailSender::new();
        sender.expect_send().never();
        let mailer = ConfirmationMailer::new(Arc::new(sender), settings());

        let no_status = image(json!({"id": {"S": "x"}}));
        assert!(!mailer
            .notify_from_stream_record("MODIFY", &no_status)
            .await
            .unwrap());
        assert!(!mailer
            .notify_from_stream_record("MODIFY", &image(json!({})))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_event_email_overrides_default_recipient() {
        let mut sender = MockMailSender::new();
        sender
            .expect_send()
            .withf(|email| email.to == "owner@example.com" && email.html_body.contains("Reason: blurry"))
            .times(1)
            .returning(|_| Ok(()));
        let mailer = ConfirmationMailer::new(Arc::new(sender), settings());

        mailer
            .notify_from_event(&NotificationEvent {
                image_id: "x".to_string(),
                status: ImageStatus::Rejected,
                email: Some("owner@example.com".to_string()),
                reason: Some("blurry".to_string()),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_failure_propagates() {
        let mut sender = MockMailSender::new();
        sender
            .expect_send()
            .returning(|_| Err(anyhow::anyhow!("MessageRejected")));
        let mailer = ConfirmationMailer::new(Arc::new(sender), settings());

        let new_image = image(json!({"id": {"S": "x"}, "status": {"S": "approved"}}));
        let err = mailer
            .notify_from_stream_record("MODIFY", &new_image)
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_handle_stream_batch() {
        let mut sender = MockMailSender::new();
        sender.expect_send().times(1).returning(|_| Ok(()));
        let mailer = ConfirmationMailer::new(Arc::new(sender), settings());

        let trigger = MailerTrigger::from_value(json!({
            "Records": [
                stream_record("INSERT", json!({"id": {"S": "a"}, "status": {"S": "approved"}})),
                stream_record("MODIFY", json!({"id": {"S": "b"}, "status": {"S": "rejected"}}))
            ]
        }))
        .unwrap();

        let response = mailer.handle(trigger).await.unwrap();
        assert_eq!(response.body.message, "Successfully sent notification");
    }

    #[tokio::test]
    async fn test_handle_notification_events() {
        let mut sender = MockMailSender::new();
        sender
            .expect_send()
            .withf(|email| email.subject == "Your image x has been approved")
            .times(1)
            .returning(|_| Ok(()));
        let mailer = ConfirmationMailer::new(Arc::new(sender), settings());

        let trigger = MailerTrigger::from_value(json!({
            "Records": [sns_record(
                r#"{"imageId":"x","status":"approved","eventType":"notification"}"#,
                &[("eventType", "notification"), ("notificationType", "email")]
            )]
        }))
        .unwrap();

        mailer.handle(trigger).await.unwrap();
    }
}
