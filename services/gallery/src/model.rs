use crate::error::HandlerError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Extensions accepted by the ingest handler (compared lower-cased)
pub const VALID_IMAGE_EXTENSIONS: [&str; 3] = [".jpeg", ".jpg", ".png"];

/// Returns true when the file name carries an accepted image extension
pub fn is_valid_image_type(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    VALID_IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Image record stored in the metadata table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// Object key of the uploaded file (partition key)
    pub id: String,
    #[serde(default)]
    pub metadata: ImageMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ImageStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ImageRecord {
    /// A freshly ingested record with empty metadata
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: ImageMetadata::default(),
            status: None,
            reason: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Review outcome for an image
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImageStatus {
    Approved,
    Rejected,
}

/// Metadata fields that may be set on an image
///
/// Parsed case-sensitively from the `metadata_type` attribute and stored under
/// the lower-cased name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum MetadataField {
    Caption,
    Date,
    Name,
}

impl MetadataField {
    /// Attribute name inside the record's `metadata` map
    pub fn storage_key(&self) -> &'static str {
        match self {
            MetadataField::Caption => "caption",
            MetadataField::Date => "date",
            MetadataField::Name => "name",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, HandlerError> {
        MetadataField::from_str(raw).map_err(|_| {
            HandlerError::validation(format!(
                "Unknown metadata type {raw:?}, expected one of Caption, Date, Name"
            ))
        })
    }
}

/// A status change applied to an image record
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: ImageStatus,
    pub reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn new(status: ImageStatus, reason: Option<String>, updated_at: DateTime<Utc>) -> Self {
        // An empty reason is treated the same as no reason
        let reason = reason.filter(|r| !r.is_empty());
        Self {
            status,
            reason,
            updated_at,
        }
    }

    /// Timestamp in the ISO-8601 form stored on the record
    pub fn updated_at_iso(&self) -> String {
        self.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}
