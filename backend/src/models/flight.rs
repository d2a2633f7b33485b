//! Flight identity and metadata types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provenance of the detector timeline.
///
/// Detector clocks occasionally produce corrupted timestamps; the
/// normalizer repairs what it can and records that it did so. The value is
/// written into the `detector_timestamps` header field of the processed log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampPolicy {
    Original,
    Repaired,
}

impl TimestampPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampPolicy::Original => "original",
            TimestampPolicy::Repaired => "repaired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "original" => Some(TimestampPolicy::Original),
            "repaired" => Some(TimestampPolicy::Repaired),
            _ => None,
        }
    }
}

/// Natural key of an archived flight measurement.
///
/// Exactly one record may exist in the archive per key. The string form
/// (`data_id`) is `"{flight_number} {YYYY-MM-DD} {device_id}"` and also
/// names the record's files in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub flight_number: String,
    pub date: NaiveDate,
    pub device_id: String,
}

impl RecordKey {
    pub fn new(
        flight_number: impl Into<String>,
        date: NaiveDate,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            flight_number: flight_number.into(),
            date,
            device_id: device_id.into(),
        }
    }

    /// Unique id string, e.g. `"AFR81 2025-06-27 Safecast 1225"`.
    pub fn data_id(&self) -> String {
        format!(
            "{} {} {}",
            self.flight_number,
            self.date.format("%Y-%m-%d"),
            self.device_id
        )
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data_id())
    }
}

/// Metadata describing one flight submission.
///
/// Supplied already parsed by the submission intake collaborator; the core
/// never reads upload formats itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightMeta {
    pub flight_number: String,
    pub origin_icao: Option<String>,
    pub destination_icao: Option<String>,
    pub takeoff_utc: DateTime<Utc>,
    pub landing_utc: DateTime<Utc>,
    pub device_id: String,
    pub citizen_id: String,
    pub timestamps: TimestampPolicy,
}

impl FlightMeta {
    /// Archive key for this flight: flight number, takeoff date, device id.
    pub fn key(&self) -> RecordKey {
        RecordKey::new(
            self.flight_number.clone(),
            self.takeoff_utc.date_naive(),
            self.device_id.clone(),
        )
    }
}
