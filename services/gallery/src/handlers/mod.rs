//! The five gallery event handlers.
//!
//! Each handler owns its capability clients and settings, exposes the
//! single-record operation it performs, and a `handle` method that runs that
//! operation over every record of a trigger batch.

pub mod cleanup;
pub mod ingest;
pub mod mailer;
pub mod metadata;
pub mod status;

pub use cleanup::CleanupHandler;
pub use ingest::IngestHandler;
pub use mailer::ConfirmationMailer;
pub use metadata::MetadataHandler;
pub use status::StatusHandler;

use crate::error::HandlerError;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::error;

/// Successful invocation result returned to the Lambda runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResponse {
    pub status_code: u16,
    pub body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    pub message: String,
}

impl HandlerResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            body: ResponseBody {
                message: message.into(),
            },
        }
    }
}

/// Run `process` over every record concurrently and wait for all of them
///
/// Every record runs to completion even when a sibling fails; the first
/// failure in record order then fails the whole batch. Returns the number of
/// records processed.
pub(crate) async fn run_batch<T, F, Fut>(
    handler: &'static str,
    records: impl IntoIterator<Item = T>,
    process: F,
) -> Result<usize, HandlerError>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<(), HandlerError>>,
{
    let tasks: Vec<_> = records
        .into_iter()
        .map(|record| {
            let task = process(record);
            async move {
                task.await.map_err(|e| {
                    metrics::counter!("gallery.records.failed", "handler" => handler).increment(1);
                    error!(handler = handler, kind = e.kind(), error = %e, "Record failed");
                    e
                })
            }
        })
        .collect();

    let results = join_all(tasks).await;
    let count = results.len();
    results.into_iter().collect::<Result<Vec<()>, _>>()?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_response_shape() {
        let response = HandlerResponse::ok("Successfully processed all images");
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({
                "statusCode": 200,
                "body": {"message": "Successfully processed all images"}
            })
        );
    }

    #[tokio::test]
    async fn test_run_batch_counts_records() {
        let seen = AtomicUsize::new(0);
        let counter = &seen;
        let count = run_batch("test", vec![1, 2, 3], move |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(count, 3);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_batch_fails_on_first_error() {
        let result = run_batch("test", vec!["ok", "bad", "ok"], |record| async move {
            if record == "bad" {
                Err(HandlerError::validation("bad record"))
            } else {
                Ok(())
            }
        })
        .await;

        assert!(matches!(result, Err(HandlerError::Validation(_))));
    }

    #[tokio::test]
    async fn test_run_batch_lets_siblings_finish_after_a_failure() {
        let completed = AtomicUsize::new(0);
        let counter = &completed;
        let result = run_batch("test", vec![0u64, 50, 50], move |delay_ms| async move {
            if delay_ms == 0 {
                return Err(HandlerError::validation("fails immediately"));
            }
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(HandlerError::Validation(_))));
        assert_eq!(completed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_batch_empty() {
        let count = run_batch("test", Vec::<u32>::new(), |_| async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
