//! Calibrated record types: alignment output, merged rows, archive entries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::flight::{FlightMeta, RecordKey};

/// Result of the time-offset search and linear calibration fit.
///
/// Immutable once computed; a new value can only come from rerunning the
/// alignment engine (reprocessing).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    /// Seconds added to detector timestamps to align them with the
    /// simulation/trajectory clock.
    pub time_offset_s: i64,
    /// Linear conversion factor from raw counts to μSv/h.
    pub scaling_beta: f64,
    /// Squared Pearson correlation at the winning offset, in [0, 1].
    pub fit_r2: f64,
}

/// One row of the merged, calibrated time series.
///
/// Timestamps are on the corrected (simulation) clock; position and
/// simulated dose are resampled onto the detector grid. Simulation values
/// are absent when the record was produced without a reference curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    pub timestamp: DateTime<Utc>,
    pub cnt_5s: u32,
    pub cnt_1min: Option<u32>,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
    pub sim_total: Option<f64>,
    pub sim_neutron: Option<f64>,
}

/// The unit of archival: one calibrated flight measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    pub meta: FlightMeta,
    pub alignment: Option<AlignmentResult>,
    pub rows: Vec<MergedRow>,
}

impl FlightRecord {
    pub fn key(&self) -> RecordKey {
        self.meta.key()
    }
}

/// Index-level projection of a stored [`FlightRecord`].
///
/// One row per archived record; paths are relative to the archive root so
/// the whole archive can be relocated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub data_id: String,
    pub flight_number: String,
    pub date: NaiveDate,
    pub device_id: String,
    pub origin_icao: Option<String>,
    pub destination_icao: Option<String>,
    pub takeoff_utc: DateTime<Utc>,
    pub landing_utc: DateTime<Utc>,
    pub fit_r2: Option<f64>,
    pub citizen_id: String,
    /// Relative path to the processed log in the object store.
    pub processed_path: String,
    /// Relative path to the backed-up raw detector file, if one was kept.
    pub raw_path: Option<String>,
    /// Relative path to the backed-up reference/trajectory file, if kept.
    pub reference_path: Option<String>,
    /// SHA-256 of the processed log content, for dedup and scrubbing.
    pub checksum: String,
}

impl ArchiveEntry {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.flight_number.clone(), self.date, self.device_id.clone())
    }
}
