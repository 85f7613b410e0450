use gallery::telemetry::init_tracing;
use gallery::{CleanupHandler, CleanupSettings, Config, HandlerResponse, S3ObjectStore};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;
    init_tracing(&config.service.log_level);

    let settings = CleanupSettings::from_config(&config)?;
    let sdk_config = config.aws_sdk_config().await;

    info!(bucket = %settings.bucket_name, "remove-image initialized");

    let handler = Arc::new(CleanupHandler::new(
        Arc::new(S3ObjectStore::from_sdk_config(&sdk_config, &config.aws)),
        settings,
    ));

    // Invoked directly by log-image or fed from the work queue
    let func = service_fn(move |event: LambdaEvent<Value>| {
        let handler = handler.clone();
        async move { Ok::<HandlerResponse, Error>(handler.handle(event.payload).await?) }
    });

    run(func).await
}
