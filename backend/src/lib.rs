//! # Cosmic on Air processing core
//!
//! Calibration engine for low-cost radiation detector measurements taken
//! aboard commercial flights. Raw detector counts, the flight trajectory,
//! and an externally simulated reference dose-rate curve go in; a single
//! calibrated, searchable flight record comes out and is kept in a durable
//! archive.
//!
//! ## Features
//!
//! - **Timestamp Normalization**: one synchronized series on the detector
//!   grid, with repair of corrupted detector clocks
//! - **Alignment**: exhaustive clock-offset search maximizing fit R², and
//!   a least-squares counts → dose-rate calibration
//! - **Processed Log Format**: versioned, round-trip-safe textual record
//!   format (`processedCOA-v1`)
//! - **Archive**: queryable index + object store with add, search,
//!   reprocess, delete, export, and a consistency scan
//! - **Batch Processing**: bounded-concurrency daily runs with per-flight
//!   outcome reporting
//!
//! ## Architecture
//!
//! The crate is organized into several logical modules:
//!
//! - [`models`]: domain types shared across the system
//! - [`algorithms`]: interpolation, correlation, and fitting primitives
//! - [`pipeline`]: the sequential per-flight calibration stages
//! - [`format`]: the persisted processed-log format
//! - [`db`]: archive index, object store, and repository backends
//! - [`services`]: batch orchestration and notifier-facing data products

pub mod algorithms;
pub mod config;
pub mod db;
pub mod format;
pub mod models;
pub mod pipeline;
pub mod services;
