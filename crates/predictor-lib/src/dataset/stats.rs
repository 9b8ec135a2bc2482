//! Descriptive statistics over numeric columns

use polars::prelude::*;

/// IQR multiplier for the outlier fences
const IQR_FENCE: f64 = 1.5;

fn chunked(values: &[f64]) -> Float64Chunked {
    Float64Chunked::from_vec("values".into(), values.to_vec())
}

/// Arithmetic mean; 0.0 for no values
pub fn mean(values: &[f64]) -> f64 {
    chunked(values).mean().unwrap_or(0.0)
}

/// Population standard deviation (ddof = 0); 0.0 for no values
pub fn population_std(values: &[f64]) -> f64 {
    chunked(values).std(0).unwrap_or(0.0)
}

/// Quantile with linear interpolation between closest ranks
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    chunked(values)
        .quantile(q.clamp(0.0, 1.0), QuantileMethod::Linear)
        .ok()
        .flatten()
}

/// Inclusive bounds `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`
pub fn iqr_bounds(values: &[f64]) -> Option<(f64, f64)> {
    let q1 = quantile(values, 0.25)?;
    let q3 = quantile(values, 0.75)?;
    let iqr = q3 - q1;
    Some((q1 - IQR_FENCE * iqr, q3 + IQR_FENCE * iqr))
}
