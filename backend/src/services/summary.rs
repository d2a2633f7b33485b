//! Chart-ready overlay data for the notification collaborator.
//!
//! The core supplies the series; rendering and delivery (plot image,
//! result email) happen outside.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::FlightRecord;

/// Time-series overlay of measured vs simulated dose rate for one flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryChart {
    pub data_id: String,
    pub flight_number: String,
    pub device_id: String,
    pub timestamps: Vec<DateTime<Utc>>,
    /// Raw short-interval counts.
    pub counts_5s: Vec<u32>,
    /// Counts converted to μSv/h via the fitted scaling factor, when the
    /// record carries a calibration.
    pub measured_dose: Option<Vec<f64>>,
    /// Simulated total dose rate, when the record carries reference data.
    pub simulated_dose: Option<Vec<f64>>,
    pub altitude_m: Vec<f64>,
    pub fit_r2: Option<f64>,
}

impl SummaryChart {
    /// JSON payload handed to the notifier collaborator.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Build the overlay series from an archived record.
pub fn build_summary_chart(record: &FlightRecord) -> SummaryChart {
    let timestamps = record.rows.iter().map(|r| r.timestamp).collect();
    let counts_5s: Vec<u32> = record.rows.iter().map(|r| r.cnt_5s).collect();
    let altitude_m = record.rows.iter().map(|r| r.altitude_m).collect();

    let measured_dose = record.alignment.map(|alignment| {
        counts_5s
            .iter()
            .map(|&c| c as f64 * alignment.scaling_beta)
            .collect()
    });

    let simulated_dose = record
        .rows
        .iter()
        .map(|r| r.sim_total)
        .collect::<Option<Vec<f64>>>();

    SummaryChart {
        data_id: record.key().data_id(),
        flight_number: record.meta.flight_number.clone(),
        device_id: record.meta.device_id.clone(),
        timestamps,
        counts_5s,
        measured_dose,
        simulated_dose,
        altitude_m,
        fit_r2: record.alignment.map(|a| a.fit_r2),
    }
}
