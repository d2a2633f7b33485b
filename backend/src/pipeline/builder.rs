//! Assembly of the canonical calibrated record.
//!
//! Building a record is a pure function of its inputs; persistence belongs
//! to the archive. Values are quantized here to the precision of the
//! processed log format so that rendering a record and parsing it back
//! yields an identical record.

use chrono::Timelike;

use crate::models::{AlignmentResult, FlightMeta, FlightRecord, MergedRow};

use super::normalizer::NormalizedSeries;

/// Merge normalized rows and the alignment result into a [`FlightRecord`].
///
/// The rows are expected to already be on the corrected clock (detector
/// timestamps shifted by the alignment offset and re-normalized).
pub fn build_record(
    series: &NormalizedSeries,
    alignment: Option<AlignmentResult>,
    meta: FlightMeta,
) -> FlightRecord {
    let rows = series
        .rows
        .iter()
        .map(|row| MergedRow {
            timestamp: row.timestamp.with_nanosecond(0).unwrap_or(row.timestamp),
            cnt_5s: row.cnt_5s,
            cnt_1min: row.cnt_1min,
            latitude_deg: quantize_coord(row.latitude_deg),
            longitude_deg: quantize_coord(row.longitude_deg),
            altitude_m: row.altitude_m.round(),
            sim_total: Some(quantize_dose(row.sim_total)),
            sim_neutron: Some(quantize_dose(row.sim_neutron)),
        })
        .collect();

    FlightRecord {
        meta,
        alignment: alignment.map(quantize_alignment),
        rows,
    }
}

/// Round an alignment result to the precision of the log header fields.
pub fn quantize_alignment(alignment: AlignmentResult) -> AlignmentResult {
    AlignmentResult {
        time_offset_s: alignment.time_offset_s,
        scaling_beta: reparse(format!("{:.4e}", alignment.scaling_beta), alignment.scaling_beta),
        fit_r2: reparse(format!("{:.4}", alignment.fit_r2), alignment.fit_r2),
    }
}

fn quantize_coord(v: f64) -> f64 {
    reparse(format!("{v:.5}"), v)
}

fn quantize_dose(v: f64) -> f64 {
    reparse(format!("{v:.4e}"), v)
}

fn reparse(text: String, fallback: f64) -> f64 {
    text.parse().unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimestampPolicy;
    use crate::pipeline::normalizer::NormalizedRow;
    use chrono::{TimeZone, Utc};

    fn meta() -> FlightMeta {
        FlightMeta {
            flight_number: "AFR81".to_string(),
            origin_icao: Some("LFPG".to_string()),
            destination_icao: Some("FACT".to_string()),
            takeoff_utc: Utc.with_ymd_and_hms(2025, 6, 27, 10, 0, 0).unwrap(),
            landing_utc: Utc.with_ymd_and_hms(2025, 6, 27, 11, 0, 0).unwrap(),
            device_id: "Safecast 1225".to_string(),
            citizen_id: "UNKNOWN".to_string(),
            timestamps: TimestampPolicy::Original,
        }
    }

    #[test]
    fn quantizes_to_log_precision() {
        let series = NormalizedSeries {
            rows: vec![NormalizedRow {
                timestamp: Utc.with_ymd_and_hms(2025, 6, 27, 10, 0, 0).unwrap(),
                cnt_5s: 17,
                cnt_1min: Some(204),
                latitude_deg: 48.123456789,
                longitude_deg: -179.999994,
                altitude_m: 10972.6,
                sim_total: 3.141592653589793,
                sim_neutron: 1.23456789e-2,
            }],
        };

        let alignment = AlignmentResult {
            time_offset_s: 140,
            scaling_beta: 2.310612345e-3,
            fit_r2: 0.987654,
        };

        let record = build_record(&series, Some(alignment), meta());

        let row = &record.rows[0];
        assert_eq!(row.latitude_deg, 48.12346);
        assert_eq!(row.longitude_deg, -179.99999);
        assert_eq!(row.altitude_m, 10973.0);
        assert_eq!(row.sim_total, Some(3.1416));
        assert_eq!(row.sim_neutron, Some(1.2346e-2));

        let fitted = record.alignment.unwrap();
        assert_eq!(fitted.time_offset_s, 140);
        assert_eq!(fitted.scaling_beta, 2.3106e-3);
        assert_eq!(fitted.fit_r2, 0.9877);
    }

    #[test]
    fn quantization_is_idempotent() {
        let series = NormalizedSeries {
            rows: vec![NormalizedRow {
                timestamp: Utc.with_ymd_and_hms(2025, 6, 27, 10, 0, 5).unwrap(),
                cnt_5s: 9,
                cnt_1min: None,
                latitude_deg: -33.96482,
                longitude_deg: 18.60169,
                altitude_m: 46.0,
                sim_total: 3.2e-1,
                sim_neutron: 1.1e-1,
            }],
        };

        let once = build_record(&series, None, meta());
        let again = build_record(
            &NormalizedSeries {
                rows: once
                    .rows
                    .iter()
                    .map(|r| NormalizedRow {
                        timestamp: r.timestamp,
                        cnt_5s: r.cnt_5s,
                        cnt_1min: r.cnt_1min,
                        latitude_deg: r.latitude_deg,
                        longitude_deg: r.longitude_deg,
                        altitude_m: r.altitude_m,
                        sim_total: r.sim_total.unwrap(),
                        sim_neutron: r.sim_neutron.unwrap(),
                    })
                    .collect(),
            },
            None,
            meta(),
        );

        assert_eq!(once, again);
    }
}
