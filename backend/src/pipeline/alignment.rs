//! Clock-offset search and counts → dose-rate calibration.
//!
//! The detector's internal clock drifts relative to the trajectory and
//! simulation clock. The engine slides the counts series across a window of
//! candidate offsets, scores each by squared Pearson correlation against
//! the simulated total dose rate, and fits the linear conversion factor at
//! the winning offset. The search is exhaustive and deterministic.

use crate::algorithms::{fit_slope_intercept, fit_through_origin, interp_at, pearson_r2};
use crate::config::PipelineConfig;
use crate::models::AlignmentResult;

use super::error::{PipelineError, PipelineResult};
use super::normalizer::NormalizedSeries;

/// Find the clock offset maximizing fit R², then fit the scaling factor.
///
/// A detector sample stamped `t` is compared against the simulated dose
/// rate at `t + offset`; samples whose shifted time falls outside the
/// simulated range are dropped, not extrapolated. Ties in R² prefer the
/// offset closest to zero.
///
/// # Errors
/// [`PipelineError::AlignmentFailed`] when the counts series has zero
/// variance, no candidate offset yields enough overlapping samples, the
/// best R² is below the configured threshold, or the fitted scaling factor
/// is not positive.
pub fn align(series: &NormalizedSeries, config: &PipelineConfig) -> PipelineResult<AlignmentResult> {
    let counts = series.counts();
    let sim = series.sim_total();
    let times = series.times_rel_s();

    if counts.len() < config.min_samples.max(2) {
        return Err(PipelineError::AlignmentFailed(format!(
            "only {} samples, {} required",
            counts.len(),
            config.min_samples.max(2)
        )));
    }

    let first = counts[0];
    if counts.iter().all(|&c| c == first) {
        return Err(PipelineError::AlignmentFailed(
            "detector counts have zero variance".to_string(),
        ));
    }

    let step = config.offset_step_s.max(1);
    let window = config.offset_window_s.max(0);

    let mut best: Option<(i64, f64)> = None;
    let mut offset = -window;
    while offset <= window {
        if let Some(r2) = score_offset(&counts, &sim, &times, offset, config.min_samples) {
            let improved = match best {
                None => true,
                Some((best_offset, best_r2)) => {
                    r2 > best_r2 || (r2 == best_r2 && offset.abs() < best_offset.abs())
                }
            };
            if improved {
                best = Some((offset, r2));
            }
        }
        offset += step;
    }

    let (best_offset, best_r2) = best.ok_or_else(|| {
        PipelineError::AlignmentFailed(
            "no candidate offset produced a valid correlation".to_string(),
        )
    })?;

    if best_r2 < config.min_fit_r2 {
        return Err(PipelineError::AlignmentFailed(format!(
            "best fit R² {:.4} at offset {}s is below threshold {:.4}",
            best_r2, best_offset, config.min_fit_r2
        )));
    }

    let (xs, ys) = shifted_pairs(&counts, &sim, &times, best_offset);
    let beta = if config.force_origin_fit {
        fit_through_origin(&xs, &ys)
    } else {
        fit_slope_intercept(&xs, &ys).0
    };

    if beta <= 0.0 {
        return Err(PipelineError::AlignmentFailed(format!(
            "non-positive scaling factor {beta:.4e} at offset {best_offset}s"
        )));
    }

    Ok(AlignmentResult {
        time_offset_s: best_offset,
        scaling_beta: beta,
        fit_r2: best_r2,
    })
}

/// R² of counts vs the simulation shifted by `offset`, or `None` when too
/// few samples overlap or the correlation is degenerate.
fn score_offset(
    counts: &[f64],
    sim: &[f64],
    times: &[f64],
    offset: i64,
    min_samples: usize,
) -> Option<f64> {
    let (xs, ys) = shifted_pairs(counts, sim, times, offset);
    if xs.len() < min_samples {
        return None;
    }
    pearson_r2(&xs, &ys)
}

fn shifted_pairs(counts: &[f64], sim: &[f64], times: &[f64], offset: i64) -> (Vec<f64>, Vec<f64>) {
    let t_min = times[0];
    let t_max = times[times.len() - 1];
    let offset = offset as f64;

    let mut xs = Vec::with_capacity(counts.len());
    let mut ys = Vec::with_capacity(counts.len());
    for i in 0..counts.len() {
        let shifted = times[i] + offset;
        if shifted < t_min || shifted > t_max {
            continue;
        }
        xs.push(counts[i]);
        ys.push(interp_at(shifted, times, sim));
    }
    (xs, ys)
}
