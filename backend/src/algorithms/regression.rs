//! Correlation and least-squares fitting.

/// Squared Pearson correlation coefficient of two equal-length series.
///
/// Returns `None` when either series has zero variance (the correlation is
/// undefined there, and the caller treats it as a degenerate input rather
/// than a valid fit).
pub fn pearson_r2(x: &[f64], y: &[f64]) -> Option<f64> {
    debug_assert_eq!(x.len(), y.len());
    let n = x.len();
    if n < 2 {
        return None;
    }

    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return None;
    }

    let r = sxy / (sxx.sqrt() * syy.sqrt());
    Some((r * r).min(1.0))
}

/// Least-squares slope of `y = beta * x` (intercept forced to zero):
/// beta = Σxy / Σx².
pub fn fit_through_origin(x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
    let sxx: f64 = x.iter().map(|a| a * a).sum();
    if sxx == 0.0 {
        return 0.0;
    }
    sxy / sxx
}

/// Full least-squares fit of `y = slope * x + intercept`.
pub fn fit_slope_intercept(x: &[f64], y: &[f64]) -> (f64, f64) {
    debug_assert_eq!(x.len(), y.len());
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for i in 0..x.len() {
        let dx = x[i] - mean_x;
        sxy += dx * (y[i] - mean_y);
        sxx += dx * dx;
    }

    if sxx == 0.0 {
        return (0.0, mean_y);
    }
    let slope = sxy / sxx;
    (slope, mean_y - slope * mean_x)
}
