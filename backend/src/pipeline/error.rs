//! Error types for the processing pipeline.

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised while turning raw series into a calibrated record.
///
/// `InsufficientOverlap` marks a flight as deferred (typically the
/// reference upload has not arrived yet); `AlignmentFailed` marks it as
/// unresolved. Neither produces an archive write.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The detector, trajectory, and simulation series do not share enough
    /// of a common time window to calibrate against.
    #[error("insufficient overlap: {overlap_s}s available, {required_s}s required")]
    InsufficientOverlap { overlap_s: i64, required_s: i64 },

    /// The offset search or calibration fit did not reach the configured
    /// confidence, or the counts series was degenerate.
    #[error("alignment failed: {0}")]
    AlignmentFailed(String),

    /// Malformed input series (empty, unordered, or duplicate timestamps).
    #[error("invalid series: {0}")]
    InvalidSeries(String),
}

impl PipelineError {
    /// True for failures that should be retried once missing inputs arrive
    /// rather than flagged as bad data.
    pub fn is_deferrable(&self) -> bool {
        matches!(self, PipelineError::InsufficientOverlap { .. })
    }
}
