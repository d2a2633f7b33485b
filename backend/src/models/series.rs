//! Raw input time series handed to the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One detector sample: a short-interval count and, where the device
/// reports it, a one-minute aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorReading {
    pub timestamp: DateTime<Utc>,
    /// Counts over the device's short sampling interval (5 s on Safecast).
    pub cnt_5s: u32,
    /// Counts aggregated over the trailing minute, if the device reports it.
    pub cnt_1min: Option<u32>,
}

/// One ADS-B trajectory fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub timestamp: DateTime<Utc>,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
}

/// One sample of the externally computed reference dose-rate curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationSample {
    pub timestamp: DateTime<Utc>,
    /// Total ambient dose equivalent rate, μSv/h.
    pub total: f64,
    /// Neutron component of the dose rate, μSv/h.
    pub neutron: f64,
}

/// Check that a sequence of timestamps is strictly increasing.
///
/// Duplicate timestamps are invalid input per the data contract, as are
/// decreasing ones.
pub fn is_strictly_increasing<'a, I>(timestamps: I) -> bool
where
    I: IntoIterator<Item = &'a DateTime<Utc>>,
{
    let mut prev: Option<&DateTime<Utc>> = None;
    for t in timestamps {
        if let Some(p) = prev {
            if t <= p {
                return false;
            }
        }
        prev = Some(t);
    }
    true
}
