//! Bounded concurrent processing of many videos.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use vrc_media::CancelSignal;
use vrc_models::ProcessingResult;

use crate::error::{EngineError, ErrorReport};
use crate::metrics;
use crate::recompressor::{InvocationOptions, Recompressor};

/// One entry of a batch manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

/// Outcome of one [`BatchJob`], in manifest order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ProcessingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }
}

/// Parse a JSON manifest: an array of `{input, output, settings?}`.
pub fn parse_manifest(json: &str) -> Result<Vec<BatchJob>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Run every job with at most `max_concurrent` in flight.
///
/// Jobs fail independently. When `cancel` fires, running jobs are cancelled
/// and jobs still waiting for a slot report `CANCELLED` without starting.
pub async fn run_batch(
    recompressor: &Recompressor,
    jobs: Vec<BatchJob>,
    max_concurrent: usize,
    cancel: Option<CancelSignal>,
) -> Vec<BatchOutcome> {
    let max_concurrent = max_concurrent.max(1);
    let semaphore = Arc::new(Semaphore::new(max_concurrent));
    let total = jobs.len();
    let mut tasks = JoinSet::new();

    info!(jobs = total, max_concurrent, "Starting batch");

    for (index, job) in jobs.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let recompressor = recompressor.clone();
        let cancel = cancel.clone();

        tasks.spawn(async move {
            let result = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(_permit) => {
                    metrics::set_in_flight(max_concurrent - semaphore.available_permits());
                    if cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
                        Err(EngineError::Cancelled)
                    } else {
                        let options = InvocationOptions {
                            cancel,
                            progress: None,
                        };
                        recompressor
                            .process_video_with(&job.input, &job.output, &job.settings, options)
                            .await
                    }
                }
                Err(_) => Err(EngineError::Cancelled),
            };
            (index, job, result)
        });
    }

    let mut outcomes: Vec<(usize, BatchOutcome)> = Vec::with_capacity(total);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, job, result)) => {
                let (result, error) = match result {
                    Ok(r) => (Some(r), None),
                    Err(e) => (None, Some(e.to_report())),
                };
                outcomes.push((
                    index,
                    BatchOutcome {
                        input: job.input,
                        output: job.output,
                        result,
                        error,
                    },
                ));
            }
            Err(e) => warn!("Batch task panicked: {}", e),
        }
    }
    metrics::set_in_flight(0);

    outcomes.sort_by_key(|(index, _)| *index);
    let outcomes: Vec<BatchOutcome> = outcomes.into_iter().map(|(_, o)| o).collect();

    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    info!(jobs = total, succeeded, failed = total - succeeded, "Batch finished");
    outcomes
}
