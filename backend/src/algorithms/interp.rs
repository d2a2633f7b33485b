//! Piecewise-linear interpolation over an ordered sample grid.

/// Interpolate `fp` (sampled at `xp`, strictly increasing) at a single `x`.
///
/// Values outside the sampled range clamp to the end samples; callers that
/// must not extrapolate drop out-of-range points before calling.
pub fn interp_at(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    debug_assert_eq!(xp.len(), fp.len());
    debug_assert!(!xp.is_empty());

    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[xp.len() - 1] {
        return fp[fp.len() - 1];
    }

    // partition_point returns the first index with xp[i] > x
    let hi = xp.partition_point(|&v| v <= x);
    let lo = hi - 1;

    let span = xp[hi] - xp[lo];
    if span == 0.0 {
        return fp[lo];
    }
    let frac = (x - xp[lo]) / span;
    fp[lo] + frac * (fp[hi] - fp[lo])
}

/// Interpolate `fp` at every point of `x`.
pub fn interp(x: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    x.iter().map(|&v| interp_at(v, xp, fp)).collect()
}

/// Unwrap a longitude sequence so it never jumps across the ±180° line.
///
/// Interpolating raw longitudes across the antimeridian produces values on
/// the wrong side of the globe; unwrap first, interpolate, then wrap back
/// with [`ravel_lon`].
pub fn unravel_lon(lon: &[f64]) -> Vec<f64> {
    let mut out = lon.to_vec();
    for i in 1..out.len() {
        while out[i] - out[i - 1] > 180.0 {
            out[i] -= 360.0;
        }
        while out[i] - out[i - 1] < -180.0 {
            out[i] += 360.0;
        }
    }
    out
}

/// Wrap a longitude back into (-180, 180].
pub fn ravel_lon(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 {
        180.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interp_matches_linear_segments() {
        let xp = [0.0, 10.0, 20.0];
        let fp = [0.0, 100.0, 0.0];

        assert_eq!(interp_at(5.0, &xp, &fp), 50.0);
        assert_eq!(interp_at(15.0, &xp, &fp), 50.0);
        assert_eq!(interp_at(10.0, &xp, &fp), 100.0);
    }

    #[test]
    fn interp_clamps_outside_range() {
        let xp = [0.0, 1.0];
        let fp = [3.0, 5.0];

        assert_eq!(interp_at(-1.0, &xp, &fp), 3.0);
        assert_eq!(interp_at(2.0, &xp, &fp), 5.0);
    }

    #[test]
    fn interp_vector_form() {
        let xp = [0.0, 2.0];
        let fp = [0.0, 4.0];
        assert_eq!(interp(&[0.5, 1.0, 1.5], &xp, &fp), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn unravel_crossing_antimeridian() {
        let lon = [179.0, -179.0, -178.0];
        let unwrapped = unravel_lon(&lon);
        assert_eq!(unwrapped, vec![179.0, 181.0, 182.0]);

        assert_eq!(ravel_lon(181.0), -179.0);
        assert_eq!(ravel_lon(-181.0), 179.0);
        assert_eq!(ravel_lon(180.0), 180.0);
    }
}
