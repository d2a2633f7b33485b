//! Timestamp normalization: one synchronized sequence on the detector grid.
//!
//! The detector's own timestamps are the canonical timeline ("original"
//! policy). Trajectory and simulation values are resampled onto that grid
//! by linear interpolation; rows outside the overlap of all three sources
//! are dropped rather than extrapolated.

use chrono::{DateTime, Duration, Utc};

use crate::algorithms::{interp_at, ravel_lon, unravel_lon};
use crate::config::PipelineConfig;
use crate::models::series::is_strictly_increasing;
use crate::models::{DetectorReading, SimulationSample, TimestampPolicy, TrajectoryPoint};

use super::error::{PipelineError, PipelineResult};

/// One synchronized row on the detector timestamp grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedRow {
    pub timestamp: DateTime<Utc>,
    pub cnt_5s: u32,
    pub cnt_1min: Option<u32>,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
    pub sim_total: f64,
    pub sim_neutron: f64,
}

/// Output of the normalizer: ordered rows, no duplicate timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSeries {
    pub rows: Vec<NormalizedRow>,
}

impl NormalizedSeries {
    /// Row timestamps as seconds relative to the first row.
    pub fn times_rel_s(&self) -> Vec<f64> {
        let epoch = match self.rows.first() {
            Some(row) => row.timestamp,
            None => return vec![],
        };
        self.rows.iter().map(|r| seconds_since(epoch, r.timestamp)).collect()
    }

    /// Short-interval counts as floats, for correlation and fitting.
    pub fn counts(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.cnt_5s as f64).collect()
    }

    /// Simulated total dose rate per row.
    pub fn sim_total(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.sim_total).collect()
    }
}

fn seconds_since(epoch: DateTime<Utc>, t: DateTime<Utc>) -> f64 {
    (t - epoch).num_milliseconds() as f64 / 1000.0
}

/// Repair corrupted detector timestamps.
///
/// Deltas that are non-positive or larger than `max_gap_s` are replaced by
/// `delta_s` (or, when unset, the median of the valid deltas) and the
/// timeline is rebuilt from the first timestamp. Returns the series
/// untouched with [`TimestampPolicy::Original`] when nothing needed fixing.
///
/// Fails when every delta is corrupt and no override was given, since there
/// is nothing left to infer a cadence from.
pub fn repair_timestamps(
    readings: &[DetectorReading],
    delta_s: Option<i64>,
    max_gap_s: i64,
) -> PipelineResult<(Vec<DetectorReading>, TimestampPolicy)> {
    if readings.len() < 2 {
        return Ok((readings.to_vec(), TimestampPolicy::Original));
    }

    let deltas: Vec<i64> = readings
        .windows(2)
        .map(|w| (w[1].timestamp - w[0].timestamp).num_seconds())
        .collect();

    let mut valid: Vec<i64> = deltas
        .iter()
        .copied()
        .filter(|&dt| dt > 0 && dt <= max_gap_s)
        .collect();

    if valid.len() == deltas.len() {
        return Ok((readings.to_vec(), TimestampPolicy::Original));
    }

    let delta = match delta_s {
        Some(d) if d > 0 => d,
        _ => {
            if valid.is_empty() {
                return Err(PipelineError::InvalidSeries(
                    "timestamps too corrupt to repair without an explicit delta".to_string(),
                ));
            }
            valid.sort_unstable();
            valid[valid.len() / 2]
        }
    };

    let mut repaired = Vec::with_capacity(readings.len());
    repaired.push(readings[0]);
    let mut current = readings[0].timestamp;
    for (reading, &dt) in readings[1..].iter().zip(&deltas) {
        let step = if dt > 0 && dt <= max_gap_s { dt } else { delta };
        current += Duration::seconds(step);
        let mut fixed = *reading;
        fixed.timestamp = current;
        repaired.push(fixed);
    }

    Ok((repaired, TimestampPolicy::Repaired))
}

/// Resample trajectory and simulation onto the detector timestamp grid.
///
/// Fails with [`PipelineError::InsufficientOverlap`] when the common window
/// of all three sources is empty or shorter than the configured minimum —
/// including the case where the reference series has not been supplied yet.
pub fn normalize(
    readings: &[DetectorReading],
    trajectory: &[TrajectoryPoint],
    simulation: &[SimulationSample],
    config: &PipelineConfig,
) -> PipelineResult<NormalizedSeries> {
    if readings.is_empty() {
        return Err(PipelineError::InvalidSeries("no detector readings".to_string()));
    }
    if !is_strictly_increasing(readings.iter().map(|r| &r.timestamp)) {
        return Err(PipelineError::InvalidSeries(
            "detector timestamps not strictly increasing".to_string(),
        ));
    }
    if !is_strictly_increasing(trajectory.iter().map(|p| &p.timestamp)) {
        return Err(PipelineError::InvalidSeries(
            "trajectory timestamps not strictly increasing".to_string(),
        ));
    }
    if !is_strictly_increasing(simulation.iter().map(|s| &s.timestamp)) {
        return Err(PipelineError::InvalidSeries(
            "simulation timestamps not strictly increasing".to_string(),
        ));
    }

    let overlap = overlap_window(readings, trajectory, simulation);
    let (start, end) = match overlap {
        Some(window) => window,
        None => {
            return Err(PipelineError::InsufficientOverlap {
                overlap_s: 0,
                required_s: config.min_overlap_s,
            })
        }
    };

    let overlap_s = (end - start).num_seconds();
    if overlap_s < config.min_overlap_s {
        return Err(PipelineError::InsufficientOverlap {
            overlap_s,
            required_s: config.min_overlap_s,
        });
    }

    let epoch = start;
    let traj_t: Vec<f64> = trajectory.iter().map(|p| seconds_since(epoch, p.timestamp)).collect();
    let traj_lat: Vec<f64> = trajectory.iter().map(|p| p.latitude_deg).collect();
    let traj_lon_raw: Vec<f64> = trajectory.iter().map(|p| p.longitude_deg).collect();
    let traj_lon = unravel_lon(&traj_lon_raw);
    let traj_alt: Vec<f64> = trajectory.iter().map(|p| p.altitude_m).collect();

    let sim_t: Vec<f64> = simulation.iter().map(|s| seconds_since(epoch, s.timestamp)).collect();
    let sim_total: Vec<f64> = simulation.iter().map(|s| s.total).collect();
    let sim_neutron: Vec<f64> = simulation.iter().map(|s| s.neutron).collect();

    let mut rows = Vec::new();
    for reading in readings {
        if reading.timestamp < start || reading.timestamp > end {
            continue;
        }
        let t = seconds_since(epoch, reading.timestamp);
        rows.push(NormalizedRow {
            timestamp: reading.timestamp,
            cnt_5s: reading.cnt_5s,
            cnt_1min: reading.cnt_1min,
            latitude_deg: interp_at(t, &traj_t, &traj_lat),
            longitude_deg: ravel_lon(interp_at(t, &traj_t, &traj_lon)),
            altitude_m: interp_at(t, &traj_t, &traj_alt),
            sim_total: interp_at(t, &sim_t, &sim_total),
            sim_neutron: interp_at(t, &sim_t, &sim_neutron),
        });
    }

    if rows.is_empty() {
        return Err(PipelineError::InsufficientOverlap {
            overlap_s,
            required_s: config.min_overlap_s,
        });
    }

    Ok(NormalizedSeries { rows })
}

fn overlap_window(
    readings: &[DetectorReading],
    trajectory: &[TrajectoryPoint],
    simulation: &[SimulationSample],
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let starts = [
        readings.first()?.timestamp,
        trajectory.first()?.timestamp,
        simulation.first()?.timestamp,
    ];
    let ends = [
        readings.last()?.timestamp,
        trajectory.last()?.timestamp,
        simulation.last()?.timestamp,
    ];

    let start = *starts.iter().max()?;
    let end = *ends.iter().min()?;
    if start >= end {
        return None;
    }
    Some((start, end))
}
