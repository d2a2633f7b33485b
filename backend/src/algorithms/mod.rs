//! Numeric primitives shared by the pipeline stages.

pub mod interp;
pub mod regression;

pub use interp::{interp, interp_at, ravel_lon, unravel_lon};
pub use regression::{fit_slope_intercept, fit_through_origin, pearson_r2};
