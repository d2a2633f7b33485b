//! The per-flight calibration pipeline.
//!
//! Stages run strictly in sequence — normalization, offset search,
//! record assembly — because the offset search is a global property of the
//! whole series; there is no streaming or partial processing. Flights are
//! independent of one another and are parallelized by the batch service.

pub mod alignment;
pub mod builder;
pub mod error;
pub mod normalizer;

pub use alignment::align;
pub use builder::build_record;
pub use error::{PipelineError, PipelineResult};
pub use normalizer::{normalize, repair_timestamps, NormalizedRow, NormalizedSeries};

use chrono::Duration;

use crate::config::PipelineConfig;
use crate::models::{DetectorReading, FlightMeta, FlightRecord, SimulationSample, TrajectoryPoint};

/// Run the full pipeline for one flight.
///
/// 1. Repair corrupted detector timestamps where possible.
/// 2. Normalize all three sources onto the detector grid.
/// 3. Search for the clock offset and fit the scaling factor.
/// 4. Shift the detector timeline by the winning offset, re-normalize so
///    position and dose are sampled at the corrected times, and assemble
///    the record.
///
/// No partial record is ever produced: any stage failure propagates and
/// leaves nothing behind for this flight.
pub fn process_flight(
    mut meta: FlightMeta,
    readings: &[DetectorReading],
    trajectory: &[TrajectoryPoint],
    simulation: &[SimulationSample],
    config: &PipelineConfig,
) -> PipelineResult<FlightRecord> {
    let (readings, policy) = repair_timestamps(readings, None, config.max_timestamp_gap_s)?;
    meta.timestamps = policy;

    let series = normalize(&readings, trajectory, simulation, config)?;
    let alignment = align(&series, config)?;

    log::debug!(
        "aligned flight {}: offset={}s beta={:.4e} r2={:.4}",
        meta.key(),
        alignment.time_offset_s,
        alignment.scaling_beta,
        alignment.fit_r2
    );

    let corrected: Vec<DetectorReading> = readings
        .iter()
        .map(|r| {
            let mut shifted = *r;
            shifted.timestamp += Duration::seconds(alignment.time_offset_s);
            shifted
        })
        .collect();

    let aligned = normalize(&corrected, trajectory, simulation, config)?;
    Ok(build_record(&aligned, Some(alignment), meta))
}
