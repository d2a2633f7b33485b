//! Renderer and parser for the `processedCOA-v1` log format.
//!
//! A processed log is an ordered `# key = value` header block followed by
//! comma-delimited data rows matching the declared column list. Every
//! header field is present in every file; unavailable values are written as
//! the literal placeholder `???` so the header shape never varies within a
//! format version.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::models::{
    AlignmentResult, FlightMeta, FlightRecord, MergedRow, TimestampPolicy,
};

use super::{FormatError, FormatResult};

/// Version tag written to (and required from) every processed log.
pub const FORMAT_VERSION: &str = "processedCOA-v1";

/// Literal token for a missing value; blank fields are never written.
pub const PLACEHOLDER: &str = "???";

const TIMESTAMP_FMT: &str = "%Y-%m-%dT%H:%M:%SZ";

const COLUMNS_WITH_REFERENCE: &str =
    "timestamp_utc, cnt_5s, cnt_1min, latitude, longitude, altitude, simulation_total, simulation_neutron";
const COLUMNS_WITHOUT_REFERENCE: &str =
    "timestamp_utc, cnt_5s, cnt_1min, latitude, longitude, altitude";

/// Per-device provenance of the count columns.
struct DeviceProfile {
    native_quantity: &'static str,
    cnt_5s_source: &'static str,
    cnt_1min_source: &'static str,
}

fn device_profile(device_id: &str) -> DeviceProfile {
    let id = device_id.to_lowercase();
    if id.contains("safecast") {
        DeviceProfile {
            native_quantity: "cnt_5s",
            cnt_5s_source: "original",
            cnt_1min_source: "original",
        }
    } else if id.contains("uct") {
        DeviceProfile {
            native_quantity: "event_timestamps",
            cnt_5s_source: "derived",
            cnt_1min_source: "derived",
        }
    } else if id.contains("radiacode") || id.contains("rium") {
        DeviceProfile {
            native_quantity: "average_cps_over_1_minute",
            cnt_5s_source: "derived",
            cnt_1min_source: "derived",
        }
    } else if id.contains("gmc") {
        DeviceProfile {
            native_quantity: "cnt_1min",
            cnt_5s_source: "derived",
            cnt_1min_source: "original",
        }
    } else {
        DeviceProfile {
            native_quantity: PLACEHOLDER,
            cnt_5s_source: PLACEHOLDER,
            cnt_1min_source: PLACEHOLDER,
        }
    }
}

fn opt_str(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(PLACEHOLDER)
}

/// Render a record as `processedCOA-v1` text.
pub fn render_processed_log(record: &FlightRecord) -> String {
    let meta = &record.meta;
    let profile = device_profile(&meta.device_id);
    let has_reference = record
        .rows
        .first()
        .map(|r| r.sim_total.is_some())
        .unwrap_or(record.alignment.is_some());

    let mut out = String::new();
    let mut push = |line: String| {
        out.push_str(&line);
        out.push('\n');
    };

    push(format!("# format = {FORMAT_VERSION}"));
    push("# data_delimiter = comma".to_string());
    push("#".to_string());
    push(format!("# device_id = {}", meta.device_id));
    push(format!("# detector_model = {PLACEHOLDER}"));
    push(format!("# detector_native_quantity = {}", profile.native_quantity));
    push(format!("# cnt_5s_source = {}", profile.cnt_5s_source));
    push(format!("# cnt_1min_source = {}", profile.cnt_1min_source));
    push(format!(
        "# processing_pipeline = coa-rust v{}",
        env!("CARGO_PKG_VERSION")
    ));
    push("#".to_string());
    if has_reference {
        push("# reference_id = cari7a".to_string());
        push("# reference_model = CARI-7A".to_string());
        push("# reference_quantity = H*(10)_total".to_string());
        push("# reference_alignment_method = time_offset_max_r2".to_string());
    } else {
        push(format!("# reference_id = {PLACEHOLDER}"));
        push(format!("# reference_model = {PLACEHOLDER}"));
        push(format!("# reference_quantity = {PLACEHOLDER}"));
        push(format!("# reference_alignment_method = {PLACEHOLDER}"));
    }
    match &record.alignment {
        Some(alignment) => {
            push(format!("# reference_time_offset_s = {}", alignment.time_offset_s));
            push(format!("# reference_scaling_beta = {:.4e}", alignment.scaling_beta));
            push("# reference_scaling_units = μSv/h / cnt_5s".to_string());
            push(format!("# reference_fit_r2 = {:.4}", alignment.fit_r2));
        }
        None => {
            push(format!("# reference_time_offset_s = {PLACEHOLDER}"));
            push(format!("# reference_scaling_beta = {PLACEHOLDER}"));
            push(format!("# reference_scaling_units = {PLACEHOLDER}"));
            push(format!("# reference_fit_r2 = {PLACEHOLDER}"));
        }
    }
    push("#".to_string());
    if has_reference {
        push("# simulation_model = CARI-7A".to_string());
        push(format!("# simulation_version = {PLACEHOLDER}"));
        push("# simulation_total = H*10_total".to_string());
        push("# simulation_neutron = H*10_neutron".to_string());
        push("# simulation_unit = μSv/h".to_string());
    } else {
        push(format!("# simulation_model = {PLACEHOLDER}"));
        push(format!("# simulation_version = {PLACEHOLDER}"));
        push(format!("# simulation_total = {PLACEHOLDER}"));
        push(format!("# simulation_neutron = {PLACEHOLDER}"));
        push(format!("# simulation_unit = {PLACEHOLDER}"));
    }
    push("#".to_string());
    push("# airport_code_type = ICAO".to_string());
    push(format!("# origin = {}", opt_str(&meta.origin_icao)));
    push(format!("# destination = {}", opt_str(&meta.destination_icao)));
    push(format!("# flight_number = {}", meta.flight_number));
    push(format!("# takeoff_utc = {}", meta.takeoff_utc.format(TIMESTAMP_FMT)));
    push(format!("# landing_utc = {}", meta.landing_utc.format(TIMESTAMP_FMT)));
    push("#".to_string());
    push(format!("# detector_timestamps = {}", meta.timestamps.as_str()));
    push("#".to_string());
    push("# timestamp_format = UTC_ISO8601".to_string());
    push("# latitude_unit = degrees".to_string());
    push("# longitude_unit = degrees".to_string());
    push("# altitude_unit = metres".to_string());
    push("#".to_string());
    push(format!("# citizen_id = {}", meta.citizen_id));
    push("#".to_string());
    let columns = if has_reference {
        COLUMNS_WITH_REFERENCE
    } else {
        COLUMNS_WITHOUT_REFERENCE
    };
    push(format!("# columns = {columns}"));

    for row in &record.rows {
        let cnt_1min = match row.cnt_1min {
            Some(v) => v.to_string(),
            None => PLACEHOLDER.to_string(),
        };
        let mut line = format!(
            "{}, {}, {}, {:.5}, {:.5}, {:.0}",
            row.timestamp.format(TIMESTAMP_FMT),
            row.cnt_5s,
            cnt_1min,
            row.latitude_deg,
            row.longitude_deg,
            row.altitude_m
        );
        if has_reference {
            let total = row.sim_total.unwrap_or(f64::NAN);
            let neutron = row.sim_neutron.unwrap_or(f64::NAN);
            line.push_str(&format!(", {total:.4e}, {neutron:.4e}"));
        }
        push(line);
    }

    out
}

/// Parse `processedCOA-v1` text back into a [`FlightRecord`].
///
/// Unknown format versions are rejected. Mandatory header fields must be
/// present (possibly as the placeholder); data rows must match the declared
/// column list.
pub fn parse_processed_log(content: &str) -> FormatResult<FlightRecord> {
    let mut header: Vec<(String, String)> = Vec::new();
    let mut rows: Vec<MergedRow> = Vec::new();
    let mut columns: Option<bool> = None; // Some(has_reference) once declared

    for (idx, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim_end();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix('#') {
            let rest = rest.trim();
            if rest.is_empty() {
                continue;
            }
            if let Some(eq) = rest.find('=') {
                let key = rest[..eq].trim().to_string();
                let value = rest[eq + 1..].trim().to_string();
                if key == "columns" {
                    columns = Some(match value.as_str() {
                        COLUMNS_WITH_REFERENCE => true,
                        COLUMNS_WITHOUT_REFERENCE => false,
                        other => return Err(FormatError::UnsupportedColumns(other.to_string())),
                    });
                }
                header.push((key, value));
            }
            continue;
        }

        let has_reference = columns.ok_or(FormatError::MissingField("columns"))?;
        rows.push(parse_row(line, idx + 1, has_reference)?);
    }

    let get = |key| lookup(&header, key);
    let get_opt = |key| lookup_opt(&header, key);

    let version = get("format")?;
    if version != FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion(version.to_string()));
    }

    let takeoff_utc = parse_timestamp(get("takeoff_utc")?)
        .map_err(|reason| FormatError::InvalidHeader { field: "takeoff_utc", reason })?;
    let landing_utc = parse_timestamp(get("landing_utc")?)
        .map_err(|reason| FormatError::InvalidHeader { field: "landing_utc", reason })?;

    let timestamps_raw = get("detector_timestamps")?;
    let timestamps = TimestampPolicy::from_str(timestamps_raw).ok_or_else(|| {
        FormatError::InvalidHeader {
            field: "detector_timestamps",
            reason: format!("unknown policy {timestamps_raw:?}"),
        }
    })?;

    let alignment = parse_alignment(&get_opt("reference_time_offset_s")?,
                                    &get_opt("reference_scaling_beta")?,
                                    &get_opt("reference_fit_r2")?)?;

    let meta = FlightMeta {
        flight_number: get("flight_number")?.to_string(),
        origin_icao: get_opt("origin")?,
        destination_icao: get_opt("destination")?,
        takeoff_utc,
        landing_utc,
        device_id: get("device_id")?.to_string(),
        citizen_id: get("citizen_id")?.to_string(),
        timestamps,
    };

    Ok(FlightRecord { meta, alignment, rows })
}

fn lookup<'a>(header: &'a [(String, String)], key: &'static str) -> FormatResult<&'a str> {
    header
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .ok_or(FormatError::MissingField(key))
}

fn lookup_opt(header: &[(String, String)], key: &'static str) -> FormatResult<Option<String>> {
    let value = lookup(header, key)?;
    Ok(if value == PLACEHOLDER {
        None
    } else {
        Some(value.to_string())
    })
}

fn parse_alignment(
    offset: &Option<String>,
    beta: &Option<String>,
    r2: &Option<String>,
) -> FormatResult<Option<AlignmentResult>> {
    match (offset, beta, r2) {
        (Some(offset), Some(beta), Some(r2)) => {
            let time_offset_s = offset.parse::<i64>().map_err(|e| FormatError::InvalidHeader {
                field: "reference_time_offset_s",
                reason: e.to_string(),
            })?;
            let scaling_beta = beta.parse::<f64>().map_err(|e| FormatError::InvalidHeader {
                field: "reference_scaling_beta",
                reason: e.to_string(),
            })?;
            let fit_r2 = r2.parse::<f64>().map_err(|e| FormatError::InvalidHeader {
                field: "reference_fit_r2",
                reason: e.to_string(),
            })?;
            Ok(Some(AlignmentResult { time_offset_s, scaling_beta, fit_r2 }))
        }
        (None, None, None) => Ok(None),
        _ => Err(FormatError::InvalidHeader {
            field: "reference_time_offset_s",
            reason: "alignment fields must all be present or all placeholders".to_string(),
        }),
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FMT)
        .map(|naive| naive.and_utc())
        .map_err(|e| e.to_string())
}

fn parse_row(line: &str, line_no: usize, has_reference: bool) -> FormatResult<MergedRow> {
    let invalid = |reason: String| FormatError::InvalidRow { line: line_no, reason };

    let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();
    let expected = if has_reference { 8 } else { 6 };
    if fields.len() != expected {
        return Err(invalid(format!("expected {expected} fields, found {}", fields.len())));
    }

    let timestamp = parse_timestamp(fields[0]).map_err(&invalid)?;
    let cnt_5s = fields[1]
        .parse::<u32>()
        .map_err(|e| invalid(format!("cnt_5s: {e}")))?;
    let cnt_1min = if fields[2] == PLACEHOLDER {
        None
    } else {
        Some(fields[2].parse::<u32>().map_err(|e| invalid(format!("cnt_1min: {e}")))?)
    };
    let parse_f64 = |field: &str, name: &str| -> FormatResult<f64> {
        field.parse::<f64>().map_err(|e| invalid(format!("{name}: {e}")))
    };

    let latitude_deg = parse_f64(fields[3], "latitude")?;
    let longitude_deg = parse_f64(fields[4], "longitude")?;
    let altitude_m = parse_f64(fields[5], "altitude")?;

    let (sim_total, sim_neutron) = if has_reference {
        (
            Some(parse_f64(fields[6], "simulation_total")?),
            Some(parse_f64(fields[7], "simulation_neutron")?),
        )
    } else {
        (None, None)
    };

    Ok(MergedRow {
        timestamp,
        cnt_5s,
        cnt_1min,
        latitude_deg,
        longitude_deg,
        altitude_m,
        sim_total,
        sim_neutron,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn sample_record(with_reference: bool) -> FlightRecord {
        let takeoff = Utc.with_ymd_and_hms(2025, 6, 27, 10, 5, 0).unwrap();
        let rows = (0..4)
            .map(|i| MergedRow {
                timestamp: takeoff + chrono::Duration::seconds(i * 5),
                cnt_5s: 10 + i as u32,
                cnt_1min: if i == 2 { None } else { Some(120 + i as u32) },
                latitude_deg: 48.0 + i as f64 * 0.25,
                longitude_deg: 2.5,
                altitude_m: 10000.0 + i as f64,
                sim_total: with_reference.then(|| 3.1416),
                sim_neutron: with_reference.then(|| 1.2345e-1),
            })
            .collect();

        FlightRecord {
            meta: FlightMeta {
                flight_number: "AFR81".to_string(),
                origin_icao: Some("LFPG".to_string()),
                destination_icao: None,
                takeoff_utc: takeoff,
                landing_utc: takeoff + chrono::Duration::hours(11),
                device_id: "Safecast 1225".to_string(),
                citizen_id: "UNKNOWN".to_string(),
                timestamps: TimestampPolicy::Original,
            },
            alignment: with_reference.then(|| AlignmentResult {
                time_offset_s: 140,
                scaling_beta: 2.3106e-3,
                fit_r2: 0.9877,
            }),
            rows,
        }
    }

    #[test]
    fn roundtrip_with_reference() {
        let record = sample_record(true);
        let text = render_processed_log(&record);
        let parsed = parse_processed_log(&text).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn roundtrip_without_reference() {
        let record = sample_record(false);
        let text = render_processed_log(&record);
        assert!(text.contains("# reference_time_offset_s = ???"));
        let parsed = parse_processed_log(&text).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn placeholder_never_blank() {
        let record = sample_record(false);
        let text = render_processed_log(&record);
        for line in text.lines().filter(|l| l.starts_with("# ") && l.contains('=')) {
            let value = line.split_once('=').unwrap().1.trim();
            assert!(!value.is_empty(), "blank header value in {line:?}");
        }
    }

    #[test]
    fn unknown_version_rejected() {
        let record = sample_record(true);
        let text = render_processed_log(&record).replace("processedCOA-v1", "processedCOA-v9");
        let err = parse_processed_log(&text).unwrap_err();
        assert!(matches!(err, FormatError::UnsupportedVersion(v) if v == "processedCOA-v9"));
    }

    #[test]
    fn unknown_columns_rejected() {
        let record = sample_record(true);
        let text = render_processed_log(&record)
            .replace("timestamp_utc, cnt_5s", "timestamp_utc, cnt_9s");
        assert!(matches!(
            parse_processed_log(&text).unwrap_err(),
            FormatError::UnsupportedColumns(_)
        ));
    }

    #[test]
    fn malformed_row_reports_line() {
        let record = sample_record(true);
        let mut text = render_processed_log(&record);
        text.push_str("2025-06-27T21:10:00Z, not_a_number, 12, 1.0, 2.0, 3\n");
        let err = parse_processed_log(&text).unwrap_err();
        assert!(matches!(err, FormatError::InvalidRow { .. }));
    }

    #[test]
    fn header_order_is_stable() {
        let text = render_processed_log(&sample_record(true));
        let keys: Vec<&str> = text
            .lines()
            .filter_map(|l| l.strip_prefix("# "))
            .filter_map(|l| l.split_once(" ="))
            .map(|(k, _)| k)
            .collect();
        let format_pos = keys.iter().position(|&k| k == "format").unwrap();
        let device_pos = keys.iter().position(|&k| k == "device_id").unwrap();
        let columns_pos = keys.iter().position(|&k| k == "columns").unwrap();
        assert_eq!(format_pos, 0);
        assert!(device_pos < columns_pos);
        assert_eq!(columns_pos, keys.len() - 1);
    }

    proptest! {
        #[test]
        fn roundtrip_arbitrary_rows(
            counts in proptest::collection::vec((0u32..20_000, 0u32..200_000), 1..40),
            lat in -90.0f64..90.0,
            lon in -180.0f64..180.0,
        ) {
            let takeoff = Utc.with_ymd_and_hms(2025, 6, 27, 10, 5, 0).unwrap();
            let mut record = sample_record(true);
            record.rows = counts
                .iter()
                .enumerate()
                .map(|(i, &(c5, c1))| MergedRow {
                    timestamp: takeoff + chrono::Duration::seconds(i as i64 * 5),
                    cnt_5s: c5,
                    cnt_1min: Some(c1),
                    // quantized to the renderer's precision up front
                    latitude_deg: format!("{lat:.5}").parse().unwrap(),
                    longitude_deg: format!("{lon:.5}").parse().unwrap(),
                    altitude_m: 11000.0,
                    sim_total: Some(3.25e0),
                    sim_neutron: Some(1.5e0),
                })
                .collect();

            let text = render_processed_log(&record);
            let parsed = parse_processed_log(&text).unwrap();
            prop_assert_eq!(parsed, record);
        }
    }
}
