//! Domain models for flight radiation measurements.
//!
//! This module provides the core data structures exchanged between the
//! pipeline stages and the archive: raw input series, flight metadata,
//! alignment results, and the canonical calibrated flight record.

pub mod flight;
pub mod record;
pub mod series;

pub use flight::{FlightMeta, RecordKey, TimestampPolicy};
pub use record::{AlignmentResult, ArchiveEntry, FlightRecord, MergedRow};
pub use series::{DetectorReading, SimulationSample, TrajectoryPoint};
