use crate::error::ConfigError;
use aws_config::BehaviorVersion;
use serde::Deserialize;

/// Main configuration shared by every gallery handler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// AWS client configuration
    #[serde(default)]
    pub aws: AwsConfig,
    /// DynamoDB table holding image records
    pub table_name: Option<String>,
    /// S3 bucket holding uploaded images
    pub bucket_name: Option<String>,
    /// Function invoked to remove rejected uploads
    pub cleanup_function_name: Option<String>,
    /// Verified SES identity used as the sender
    pub sender_email: Option<String>,
    /// Recipient used when an event carries no email address
    pub default_recipient: Option<String>,
    /// SNS topic carrying gallery events
    pub topic_arn: Option<String>,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// AWS SDK configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AwsConfig {
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for LocalStack)
    pub endpoint_url: Option<String>,
    /// Force path-style S3 access (required for LocalStack)
    #[serde(default)]
    pub force_path_style: bool,
}

fn default_service_name() -> String {
    "gallery".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: None,
            force_path_style: false,
        }
    }
}

impl Config {
    /// Load configuration from config files and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .set_default("service.name", "gallery")?
            .set_default("service.log_level", "info")?
            .add_source(config::File::with_name("config/gallery").required(false))
            .add_source(config::File::with_name("/etc/gallery/gallery").required(false))
            // GALLERY__TABLE_NAME -> table_name, GALLERY__AWS__REGION -> aws.region
            .add_source(
                config::Environment::with_prefix("GALLERY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_source(config)
    }

    /// Deserialize an already assembled configuration
    pub fn from_source(source: config::Config) -> Result<Self, ConfigError> {
        source.try_deserialize().map_err(Into::into)
    }

    /// Build the shared AWS SDK configuration
    pub async fn aws_sdk_config(&self) -> aws_config::SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(self.aws.region.clone()));

        if let Some(ref endpoint_url) = self.aws.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }

        loader.load().await
    }
}

/// Returns the value of a required identifier, treating blank values as absent
fn require(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::MissingRequired(name)),
    }
}

/// Settings for the ingest (`log-image`) handler
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSettings {
    pub table_name: String,
    pub cleanup_function_name: String,
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            table_name: require(&config.table_name, "table_name")?,
            cleanup_function_name: require(
                &config.cleanup_function_name,
                "cleanup_function_name",
            )?,
        })
    }
}

/// Settings for the cleanup (`remove-image`) handler
#[derive(Debug, Clone, PartialEq)]
pub struct CleanupSettings {
    pub bucket_name: String,
}

impl CleanupSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            bucket_name: require(&config.bucket_name, "bucket_name")?,
        })
    }
}

/// Settings for the `add-metadata` handler
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataSettings {
    pub table_name: String,
}

impl MetadataSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            table_name: require(&config.table_name, "table_name")?,
        })
    }
}

/// Settings for the `update-status` handler
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSettings {
    pub table_name: String,
}

impl StatusSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            table_name: require(&config.table_name, "table_name")?,
        })
    }
}

/// Settings for the confirmation mailer
#[derive(Debug, Clone, PartialEq)]
pub struct MailerSettings {
    pub sender_email: String,
    pub default_recipient: String,
}

impl MailerSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            sender_email: require(&config.sender_email, "sender_email")?,
            default_recipient: require(&config.default_recipient, "default_recipient")?,
        })
    }
}

/// Settings for publishing events to the gallery topic
#[derive(Debug, Clone, PartialEq)]
pub struct PublisherSettings {
    pub topic_arn: String,
}

impl PublisherSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            topic_arn: require(&config.topic_arn, "topic_arn")?,
        })
    }
}
