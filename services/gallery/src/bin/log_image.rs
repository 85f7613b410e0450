use aws_lambda_events::event::s3::S3Event;
use gallery::telemetry::init_tracing;
use gallery::{
    Config, DynamoMetadataStore, HandlerResponse, IngestHandler, IngestSettings, LambdaRemover,
};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;
    init_tracing(&config.service.log_level);

    let settings = IngestSettings::from_config(&config)?;
    let sdk_config = config.aws_sdk_config().await;

    let handler = Arc::new(IngestHandler::new(
        Arc::new(DynamoMetadataStore::from_sdk_config(
            &sdk_config,
            &settings.table_name,
        )),
        Arc::new(LambdaRemover::from_sdk_config(
            &sdk_config,
            &settings.cleanup_function_name,
        )),
    ));

    info!(
        table = %settings.table_name,
        cleanup_function = %settings.cleanup_function_name,
        "log-image initialized"
    );

    let func = service_fn(move |event: LambdaEvent<S3Event>| {
        let handler = handler.clone();
        async move { Ok::<HandlerResponse, Error>(handler.handle(event.payload).await?) }
    });

    run(func).await
}
