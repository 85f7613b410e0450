//! Publish gallery events to the topic from the command line.
//!
//! ```text
//! publish-event metadata cat.jpg Caption "A sleepy cat"
//! publish-event status cat.jpg rejected --reason "Blurry"
//! publish-event notify cat.jpg approved --email owner@example.com
//! publish-event upload cat.jpg
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gallery::telemetry::init_cli_tracing;
use gallery::{
    Config, DomainEvent, GalleryEvents, ImageStatus, ImageUploadEvent, MetadataField,
    MetadataUpdateEvent, NotificationEvent, PublisherSettings, SnsPublisher, StatusUpdateEvent,
    Topology,
};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "publish-event", about = "Publish an event to the gallery topic")]
struct Cli {
    /// Topic to publish to (defaults to the configured topic_arn)
    #[arg(long, env = "GALLERY__TOPIC_ARN")]
    topic_arn: Option<String>,

    /// Print the message and attributes without publishing
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set one metadata field on an image
    Metadata {
        image_id: String,
        /// Caption, Date or Name
        field: String,
        value: String,
    },
    /// Record a review outcome
    Status {
        image_id: String,
        /// approved or rejected
        status: ImageStatus,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Email the owner about a review outcome
    Notify {
        image_id: String,
        status: ImageStatus,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Register an uploaded object on the work queue
    Upload { key: String },
}

impl Command {
    fn into_event(self) -> Result<DomainEvent> {
        let event = match self {
            Command::Metadata {
                image_id,
                field,
                value,
            } => DomainEvent::MetadataUpdate(MetadataUpdateEvent {
                id: image_id,
                field: MetadataField::parse(&field)?,
                value,
            }),
            Command::Status {
                image_id,
                status,
                reason,
            } => DomainEvent::StatusUpdate(StatusUpdateEvent {
                image_id,
                status,
                reason,
            }),
            Command::Notify {
                image_id,
                status,
                email,
                reason,
            } => DomainEvent::Notification(NotificationEvent {
                image_id,
                status,
                email,
                reason,
            }),
            Command::Upload { key } => DomainEvent::ImageUpload(ImageUploadEvent { key }),
        };
        Ok(event)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;
    init_cli_tracing(&config.service.log_level);

    let event = cli.command.into_event()?;

    if cli.dry_run {
        println!("{}", event.to_message()?);
        for (name, value) in event.routing_attributes().iter() {
            println!("  {name} = {value}");
        }
        return Ok(());
    }

    let topic_arn = match cli.topic_arn.filter(|arn| !arn.trim().is_empty()) {
        Some(arn) => arn,
        None => PublisherSettings::from_config(&config)?.topic_arn,
    };
    let sdk_config = config.aws_sdk_config().await;
    let events = GalleryEvents::new(
        Arc::new(SnsPublisher::from_sdk_config(&sdk_config, topic_arn)),
        Topology::gallery(),
    );

    let message_id = events.publish(&event).await?;
    println!("{message_id}");
    Ok(())
}
