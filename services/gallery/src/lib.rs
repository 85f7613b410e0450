//! Gallery - event handlers for the serverless image gallery pipeline
//!
//! Uploads land in the image bucket and flow through five single-purpose
//! Lambda handlers:
//!
//! ```text
//! S3 upload ─► log-image ─┬─► metadata table ─(stream)─► confirmation-mailer
//!                         └─► remove-image (invalid file types)
//!
//! gallery topic ─┬─ image-upload ─────► work queue (DLQ after 3 receives)
//!                ├─ metadata-update ──► add-metadata ──► metadata table
//!                ├─ status_update ────► update-status ─► metadata table
//!                └─ notification ─────► confirmation-mailer ─► SES
//! ```
//!
//! Backing services are reached through the capability traits
//! [`MetadataStore`], [`ObjectStore`], [`RemovalRequester`], [`MailSender`] and
//! [`EventPublisher`], so every handler can be exercised with mocks.
//!
//! # Example
//!
//! ```rust,no_run
//! use gallery::{Config, DynamoMetadataStore, MetadataHandler, MetadataSettings};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let settings = MetadataSettings::from_config(&config)?;
//!     let sdk_config = config.aws_sdk_config().await;
//!
//!     let store = DynamoMetadataStore::from_sdk_config(&sdk_config, settings.table_name);
//!     let handler = MetadataHandler::new(Arc::new(store));
//!     handler.apply_metadata_field("cat.jpg", "Caption", "A cat").await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod mailer;
pub mod metadata_store;
pub mod model;
pub mod object_store;
pub mod publisher;
pub mod remover;
pub mod routing;
pub mod telemetry;

// Re-export main types
pub use config::{
    AwsConfig, CleanupSettings, Config, IngestSettings, MailerSettings, MetadataSettings,
    PublisherSettings, ServiceConfig, StatusSettings,
};
pub use error::{ConfigError, HandlerError};
pub use events::{
    DomainEvent, EventAttributes, EventType, ImageUploadEvent, MailerTrigger,
    MetadataUpdateEvent, NotificationEvent, ObjectRef, StatusUpdateEvent,
};
pub use handlers::{
    CleanupHandler, ConfirmationMailer, HandlerResponse, IngestHandler, MetadataHandler,
    StatusHandler,
};
pub use mailer::{Email, MailSender, SesMailSender, StatusNotice};
pub use metadata_store::{DynamoMetadataStore, MetadataStore};
pub use model::{ImageMetadata, ImageRecord, ImageStatus, MetadataField, StatusUpdate};
pub use object_store::{ObjectStore, S3ObjectStore};
pub use publisher::{EventPublisher, GalleryEvents, SnsPublisher};
pub use remover::{LambdaRemover, RemovalRequester};
pub use routing::{FilterPolicy, Subscription, Target, Topology};
