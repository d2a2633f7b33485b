//! Archive integration tests: lifecycle, search, atomic replacement,
//! deletion, concurrency, and the consistency scan.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use std::sync::Arc;

use coa_rust::db::{
    Archive, ArchiveError, LocalRepository, RecordAttachments, SearchCriteria,
};
use coa_rust::models::{
    AlignmentResult, FlightMeta, FlightRecord, MergedRow, RecordKey, TimestampPolicy,
};

fn record(flight_number: &str, device_id: &str, citizen_id: &str) -> FlightRecord {
    let takeoff = Utc.with_ymd_and_hms(2025, 6, 27, 10, 5, 0).unwrap();
    FlightRecord {
        meta: FlightMeta {
            flight_number: flight_number.to_string(),
            origin_icao: Some("LFPG".to_string()),
            destination_icao: Some("FACT".to_string()),
            takeoff_utc: takeoff,
            landing_utc: takeoff + Duration::hours(11),
            device_id: device_id.to_string(),
            citizen_id: citizen_id.to_string(),
            timestamps: TimestampPolicy::Original,
        },
        alignment: Some(AlignmentResult {
            time_offset_s: 140,
            scaling_beta: 2.3106e-3,
            fit_r2: 0.9877,
        }),
        rows: (0..10)
            .map(|i| MergedRow {
                timestamp: takeoff + Duration::seconds(i * 5),
                cnt_5s: 100 + i as u32,
                cnt_1min: Some(1200),
                latitude_deg: 48.25,
                longitude_deg: 2.5,
                altitude_m: 11000.0,
                sim_total: Some(3.25),
                sim_neutron: Some(1.5),
            })
            .collect(),
    }
}

fn open_archive(root: &std::path::Path) -> Arc<Archive> {
    Arc::new(Archive::open(root, Arc::new(LocalRepository::new())).unwrap())
}

#[tokio::test]
async fn add_then_search_then_load() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = open_archive(tmp.path());

    let record = record("AFR81", "Safecast 1225", "UNKNOWN");
    let entry = archive.add(&record, &RecordAttachments::default()).await.unwrap();
    assert_eq!(entry.data_id, "AFR81 2025-06-27 Safecast 1225");
    assert_eq!(entry.fit_r2, Some(0.9877));

    let hits = archive
        .search(&SearchCriteria::by_flight_number("AFR81"))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0], entry);

    let loaded = archive.load_record(&record.key()).await.unwrap();
    assert_eq!(loaded, record);
}

#[tokio::test]
async fn duplicate_add_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = open_archive(tmp.path());

    let record = record("AFR81", "Safecast 1225", "UNKNOWN");
    archive.add(&record, &RecordAttachments::default()).await.unwrap();

    let err = archive
        .add(&record, &RecordAttachments::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ArchiveError::DuplicateKey(_)));
}

#[tokio::test]
async fn empty_search_criteria_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = open_archive(tmp.path());

    let err = archive.search(&SearchCriteria::default()).await.unwrap_err();
    assert!(matches!(err, ArchiveError::InvalidQuery(_)));
}

#[tokio::test]
async fn search_conjunction_excludes_mismatches() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = open_archive(tmp.path());

    for (flight, device) in [
        ("AFR81", "Safecast 1225"),
        ("AFR81", "GMC"),
        ("BAW12", "Safecast 1225"),
    ] {
        archive
            .add(&record(flight, device, "UNKNOWN"), &RecordAttachments::default())
            .await
            .unwrap();
    }

    let by_flight = archive
        .search(&SearchCriteria::by_flight_number("AFR81"))
        .await
        .unwrap();
    assert_eq!(by_flight.len(), 2);
    assert!(by_flight.iter().all(|e| e.flight_number == "AFR81"));

    let full = archive
        .search(
            &SearchCriteria::by_flight_number("AFR81")
                .with_date(NaiveDate::from_ymd_opt(2025, 6, 27).unwrap())
                .with_device_id("Safecast 1225"),
        )
        .await
        .unwrap();
    assert_eq!(full.len(), 1);
    assert_eq!(full[0].device_id, "Safecast 1225");

    let miss = archive
        .search(&SearchCriteria::by_flight_number("AFR81").with_device_id("Radiacode"))
        .await
        .unwrap();
    assert!(miss.is_empty());
}

#[tokio::test]
async fn reprocess_replaces_atomically_and_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = open_archive(tmp.path());

    let original = record("AFR81", "Safecast 1225", "UNKNOWN");
    let key = original.key();
    let first = archive.add(&original, &RecordAttachments::default()).await.unwrap();

    // unchanged record: archive observably identical
    let same = archive
        .reprocess(&key, &original, &RecordAttachments::default())
        .await
        .unwrap();
    assert_eq!(same, first);
    assert_eq!(archive.list_ids().await.unwrap().len(), 1);

    // changed record: row and files swapped, still exactly one entry
    let mut updated = original.clone();
    updated.meta.citizen_id = "citizen-7".to_string();
    updated.alignment = Some(AlignmentResult {
        time_offset_s: 141,
        scaling_beta: 2.31e-3,
        fit_r2: 0.991,
    });
    let second = archive
        .reprocess(&key, &updated, &RecordAttachments::default())
        .await
        .unwrap();
    assert_ne!(second.checksum, first.checksum);
    assert_eq!(second.fit_r2, Some(0.991));
    assert_eq!(archive.list_ids().await.unwrap().len(), 1);
    assert_eq!(archive.load_record(&key).await.unwrap(), updated);

    // consistency maintained throughout
    assert!(archive.consistency_check().await.unwrap().is_consistent());
}

#[tokio::test]
async fn reprocess_of_absent_key_behaves_as_add() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = open_archive(tmp.path());

    let record = record("AFR81", "Safecast 1225", "UNKNOWN");
    archive
        .reprocess(&record.key(), &record, &RecordAttachments::default())
        .await
        .unwrap();
    assert_eq!(archive.list_ids().await.unwrap().len(), 1);
}

#[tokio::test]
async fn reprocess_key_mismatch_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = open_archive(tmp.path());

    let record = record("AFR81", "Safecast 1225", "UNKNOWN");
    let other_key = RecordKey::new(
        "BAW12",
        NaiveDate::from_ymd_opt(2025, 6, 27).unwrap(),
        "Safecast 1225",
    );

    let err = archive
        .reprocess(&other_key, &record, &RecordAttachments::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ArchiveError::InvalidQuery(_)));
}

#[tokio::test]
async fn delete_removes_row_and_files() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = open_archive(tmp.path());

    let record = record("AFR81", "Safecast 1225", "UNKNOWN");
    let attachments = RecordAttachments {
        raw: Some(("device.log".to_string(), b"raw bytes".to_vec())),
        reference: Some(("flight.kml".to_string(), b"kml bytes".to_vec())),
    };
    archive.add(&record, &attachments).await.unwrap();
    let key = record.key();

    archive.delete(&key).await.unwrap();
    assert!(archive.get(&key).await.unwrap().is_none());
    assert!(archive.consistency_check().await.unwrap().is_consistent());

    // a second delete finds nothing at all
    let err = archive.delete(&key).await.unwrap_err();
    assert!(matches!(err, ArchiveError::NotFound(_)));
}

#[tokio::test]
async fn delete_retry_after_partial_failure_converges() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = open_archive(tmp.path());

    let record = record("AFR81", "Safecast 1225", "UNKNOWN");
    archive.add(&record, &RecordAttachments::default()).await.unwrap();
    let key = record.key();

    // simulate a crash that removed the index row but left the files
    archive.delete(&key).await.unwrap();
    let orphan = tmp
        .path()
        .join("processed")
        .join(format!("{}.log", key.data_id()));
    std::fs::write(&orphan, "leftover").unwrap();
    assert!(!archive.consistency_check().await.unwrap().is_consistent());

    // the retried delete cleans up without erroring
    archive.delete(&key).await.unwrap();
    assert!(archive.consistency_check().await.unwrap().is_consistent());
}

#[tokio::test]
async fn consistency_scan_reports_divergence() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = open_archive(tmp.path());

    archive
        .add(&record("AFR81", "Safecast 1225", "UNKNOWN"), &RecordAttachments::default())
        .await
        .unwrap();

    // orphan: a processed file nothing points at
    std::fs::write(tmp.path().join("processed/stray id.log"), "stray").unwrap();

    let report = archive.consistency_check().await.unwrap();
    assert_eq!(report.orphan_files, vec!["stray id".to_string()]);
    assert!(report.missing_files.is_empty());

    // the scan reports; it repairs nothing
    assert!(tmp.path().join("processed/stray id.log").exists());
}

#[tokio::test]
async fn concurrent_adds_with_distinct_keys_all_land() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = open_archive(tmp.path());

    let mut handles = Vec::new();
    for i in 0..16 {
        let archive = archive.clone();
        handles.push(tokio::spawn(async move {
            let record = record("AFR81", &format!("Safecast {i:04}"), "UNKNOWN");
            archive.add(&record, &RecordAttachments::default()).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let hits = archive
        .search(&SearchCriteria::by_flight_number("AFR81"))
        .await
        .unwrap();
    assert_eq!(hits.len(), 16);
    assert!(archive.consistency_check().await.unwrap().is_consistent());
}

#[tokio::test]
async fn concurrent_same_key_operations_serialize() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = open_archive(tmp.path());

    let base = record("AFR81", "Safecast 1225", "UNKNOWN");
    let key = base.key();

    let mut handles = Vec::new();
    for i in 0..16 {
        let archive = archive.clone();
        let key = key.clone();
        let mut version = base.clone();
        handles.push(tokio::spawn(async move {
            version.meta.citizen_id = format!("citizen-{i}");
            archive.reprocess(&key, &version, &RecordAttachments::default()).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // exactly one consistent final state, readable and indexed
    assert_eq!(archive.list_ids().await.unwrap().len(), 1);
    let finale = archive.load_record(&key).await.unwrap();
    assert!(finale.meta.citizen_id.starts_with("citizen-"));
    assert!(archive.consistency_check().await.unwrap().is_consistent());
}

#[tokio::test]
async fn export_copies_record_and_backups() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = open_archive(tmp.path());

    let record = record("AFR81", "Safecast 1225", "UNKNOWN");
    let attachments = RecordAttachments {
        raw: Some(("device.log".to_string(), b"raw bytes".to_vec())),
        reference: None,
    };
    archive.add(&record, &attachments).await.unwrap();

    let dest = tempfile::tempdir().unwrap();
    let exported = archive
        .export(&SearchCriteria::by_flight_number("AFR81"), dest.path())
        .await
        .unwrap();
    assert_eq!(exported.len(), 1);

    let folder = &exported[0];
    assert!(folder
        .join("Data AFR81 2025-06-27 Safecast 1225.log")
        .exists());
    assert_eq!(
        std::fs::read(folder.join("backup/device.log")).unwrap(),
        b"raw bytes"
    );
}
