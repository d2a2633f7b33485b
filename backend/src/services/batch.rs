//! Daily batch processing of pending flight submissions.
//!
//! Flights are independent and run in parallel worker tasks up to the
//! configured concurrency limit; stages within one flight stay sequential.
//! A failed flight is reported and abandoned — it never aborts its
//! siblings, and retrying is a whole-pipeline rerun (the archive write goes
//! through `reprocess`, so a rerun of an already-archived flight replaces
//! it rather than colliding).

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::db::{Archive, RecordAttachments};
use crate::models::{DetectorReading, FlightMeta, SimulationSample, TrajectoryPoint};
use crate::pipeline::{process_flight, PipelineError};

/// One pending flight: metadata, parsed input series, and the original
/// uploads to back up in the archive.
pub struct FlightSubmission {
    pub meta: FlightMeta,
    pub readings: Vec<DetectorReading>,
    pub trajectory: Vec<TrajectoryPoint>,
    /// Empty when the reference curve has not been supplied yet; the
    /// flight then comes back as [`FlightStatus::AwaitingReference`].
    pub simulation: Vec<SimulationSample>,
    pub attachments: RecordAttachments,
}

/// Terminal state of one flight within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightStatus {
    /// Calibrated and archived.
    Archived,
    /// Not enough overlapping reference data yet; retry when it arrives.
    AwaitingReference,
    /// Calibration confidence too low; held for manual review.
    Unresolved,
    /// Bad input or storage failure.
    Failed,
}

/// Per-flight outcome line of the batch report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightOutcome {
    pub data_id: String,
    pub status: FlightStatus,
    pub fit_r2: Option<f64>,
    pub message: Option<String>,
}

/// Everything a batch run produced, successes and failures alike.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<FlightOutcome>,
}

impl BatchReport {
    pub fn archived(&self) -> usize {
        self.count(FlightStatus::Archived)
    }

    pub fn awaiting_reference(&self) -> usize {
        self.count(FlightStatus::AwaitingReference)
    }

    pub fn unresolved(&self) -> usize {
        self.count(FlightStatus::Unresolved)
    }

    pub fn failed(&self) -> usize {
        self.count(FlightStatus::Failed)
    }

    fn count(&self, status: FlightStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

/// Process a set of pending submissions against the archive.
///
/// Completion order between flights is not guaranteed; the report is
/// returned in submission order.
pub async fn run_batch(
    archive: Arc<Archive>,
    submissions: Vec<FlightSubmission>,
    config: &PipelineConfig,
) -> BatchReport {
    let limit = config.max_concurrent_flights.max(1);
    let total = submissions.len();
    log::info!("batch start: {total} submissions, concurrency {limit}");

    let mut outcomes: Vec<(usize, FlightOutcome)> = stream::iter(
        submissions.into_iter().enumerate().map(|(idx, submission)| {
            let archive = archive.clone();
            let config = config.clone();
            async move {
                let outcome = process_one(archive, submission, config).await;
                (idx, outcome)
            }
        }),
    )
    .buffer_unordered(limit)
    .collect()
    .await;

    outcomes.sort_by_key(|(idx, _)| *idx);
    let report = BatchReport {
        outcomes: outcomes.into_iter().map(|(_, o)| o).collect(),
    };

    log::info!(
        "batch done: {} archived, {} awaiting reference, {} unresolved, {} failed",
        report.archived(),
        report.awaiting_reference(),
        report.unresolved(),
        report.failed()
    );
    report
}

async fn process_one(
    archive: Arc<Archive>,
    submission: FlightSubmission,
    config: PipelineConfig,
) -> FlightOutcome {
    let data_id = submission.meta.key().data_id();

    let FlightSubmission {
        meta,
        readings,
        trajectory,
        simulation,
        attachments,
    } = submission;

    // The offset search is CPU-bound; keep it off the async executor.
    let result = tokio::task::spawn_blocking(move || {
        process_flight(meta, &readings, &trajectory, &simulation, &config)
    })
    .await;

    let record = match result {
        Ok(Ok(record)) => record,
        Ok(Err(e)) => return outcome_for_pipeline_error(data_id, e),
        Err(join_err) => {
            log::error!("flight {data_id}: worker task failed: {join_err}");
            return FlightOutcome {
                data_id,
                status: FlightStatus::Failed,
                fit_r2: None,
                message: Some(format!("worker task failed: {join_err}")),
            };
        }
    };

    match archive.reprocess(&record.key(), &record, &attachments).await {
        Ok(entry) => FlightOutcome {
            data_id,
            status: FlightStatus::Archived,
            fit_r2: entry.fit_r2,
            message: None,
        },
        Err(e) => {
            log::error!("flight {data_id}: archive write failed: {e}");
            FlightOutcome {
                data_id,
                status: FlightStatus::Failed,
                fit_r2: None,
                message: Some(e.to_string()),
            }
        }
    }
}

fn outcome_for_pipeline_error(data_id: String, error: PipelineError) -> FlightOutcome {
    let status = match &error {
        PipelineError::InsufficientOverlap { .. } => FlightStatus::AwaitingReference,
        PipelineError::AlignmentFailed(_) => FlightStatus::Unresolved,
        PipelineError::InvalidSeries(_) => FlightStatus::Failed,
    };
    log::warn!("flight {data_id}: {error}");
    FlightOutcome {
        data_id,
        status,
        fit_r2: None,
        message: Some(error.to_string()),
    }
}
