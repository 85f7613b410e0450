use aws_lambda_events::event::sns::SnsEvent;
use gallery::telemetry::init_tracing;
use gallery::{Config, DynamoMetadataStore, HandlerResponse, StatusHandler, StatusSettings};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;
    init_tracing(&config.service.log_level);

    let settings = StatusSettings::from_config(&config)?;
    let sdk_config = config.aws_sdk_config().await;

    info!(table = %settings.table_name, "update-status initialized");

    let handler = Arc::new(StatusHandler::new(Arc::new(
        DynamoMetadataStore::from_sdk_config(&sdk_config, settings.table_name),
    )));

    let func = service_fn(move |event: LambdaEvent<SnsEvent>| {
        let handler = handler.clone();
        async move { Ok::<HandlerResponse, Error>(handler.handle(event.payload).await?) }
    });

    run(func).await
}
