//! Processing and archive configuration.
//!
//! Configuration is plain TOML loaded from `coa.toml` in standard
//! locations; every field has a default so an empty file (or none at all
//! for the pipeline defaults) is valid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Tuning knobs for the normalizer and alignment engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum overlap of detector, trajectory, and simulation coverage.
    #[serde(default = "default_min_overlap_s")]
    pub min_overlap_s: i64,
    /// Half-width of the clock-offset search window.
    #[serde(default = "default_offset_window_s")]
    pub offset_window_s: i64,
    /// Step between candidate offsets.
    #[serde(default = "default_offset_step_s")]
    pub offset_step_s: i64,
    /// Minimum fit R² for a calibration to be accepted.
    #[serde(default = "default_min_fit_r2")]
    pub min_fit_r2: f64,
    /// Minimum number of overlapping samples at the winning offset.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    /// Force the counts → dose fit through the origin.
    #[serde(default = "default_force_origin_fit")]
    pub force_origin_fit: bool,
    /// Largest credible gap between consecutive detector samples; anything
    /// larger (or non-positive) is treated as a corrupted timestamp.
    #[serde(default = "default_max_timestamp_gap_s")]
    pub max_timestamp_gap_s: i64,
    /// Upper bound on flights processed concurrently in a batch run.
    #[serde(default = "default_max_concurrent_flights")]
    pub max_concurrent_flights: usize,
}

fn default_min_overlap_s() -> i64 {
    300
}

fn default_offset_window_s() -> i64 {
    600
}

fn default_offset_step_s() -> i64 {
    1
}

fn default_min_fit_r2() -> f64 {
    0.5
}

fn default_min_samples() -> usize {
    10
}

fn default_force_origin_fit() -> bool {
    true
}

fn default_max_timestamp_gap_s() -> i64 {
    1800
}

fn default_max_concurrent_flights() -> usize {
    4
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_overlap_s: default_min_overlap_s(),
            offset_window_s: default_offset_window_s(),
            offset_step_s: default_offset_step_s(),
            min_fit_r2: default_min_fit_r2(),
            min_samples: default_min_samples(),
            force_origin_fit: default_force_origin_fit(),
            max_timestamp_gap_s: default_max_timestamp_gap_s(),
            max_concurrent_flights: default_max_concurrent_flights(),
        }
    }
}

/// Archive location settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSettings {
    /// Root folder of the object store and index file.
    #[serde(default = "default_archive_root")]
    pub root: PathBuf,
    /// Index backend: "sqlite" or "local".
    #[serde(default = "default_index_backend")]
    pub index: String,
}

fn default_archive_root() -> PathBuf {
    PathBuf::from("data_archive")
}

fn default_index_backend() -> String {
    "sqlite".to_string()
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            root: default_archive_root(),
            index: default_index_backend(),
        }
    }
}

/// Top-level configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoaConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub archive: ArchiveSettings,
}

impl CoaConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `coa.toml` in standard locations, falling back to defaults
    /// when no file exists.
    ///
    /// Searches the current directory, then `backend/`, then the parent
    /// directory.
    pub fn from_default_location() -> anyhow::Result<Self> {
        let search_paths = [
            PathBuf::from("coa.toml"),
            PathBuf::from("backend/coa.toml"),
            PathBuf::from("../coa.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }
}
