use gallery::telemetry::init_tracing;
use gallery::{
    Config, ConfirmationMailer, HandlerResponse, MailerSettings, MailerTrigger, SesMailSender,
};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;
    init_tracing(&config.service.log_level);

    let settings = MailerSettings::from_config(&config)?;
    let sdk_config = config.aws_sdk_config().await;

    info!(sender = %settings.sender_email, "confirmation-mailer initialized");

    let handler = Arc::new(ConfirmationMailer::new(
        Arc::new(SesMailSender::from_sdk_config(&sdk_config)),
        settings,
    ));

    // Triggered by the table's change stream and by notification events
    let func = service_fn(move |event: LambdaEvent<Value>| {
        let handler = handler.clone();
        async move {
            let trigger = MailerTrigger::from_value(event.payload)?;
            Ok::<HandlerResponse, Error>(handler.handle(trigger).await?)
        }
    });

    run(func).await
}
