//! Accuracy of estimates against ground truth.
//!
//! Relative errors are taken over nodes whose truth is non-zero, plus nodes where
//! both truth and estimate are zero (a relative error of zero). Nodes with zero
//! truth but a non-zero estimate have no defined relative error and are skipped.

#[cfg(feature = "with_serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Denominator floor for relative errors
const EPSILON: f64 = f64::EPSILON;

/// Summary of estimation error
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "with_serde", derive(Serialize, Deserialize))]
pub struct Metrics {
    /// Root mean squared error
    pub rmse: f64,
    /// Mean absolute error
    pub mae: f64,
    /// Mean relative error
    pub mre: f64,
    /// Median relative error
    pub medre: f64,
}

impl Metrics {
    /// Compute error summary of `estimates` against `truth`
    pub fn compute(estimates: &[f64], truth: &[f64]) -> Result<Self> {
        check_lengths(estimates, truth)?;
        if estimates.is_empty() {
            return Ok(Self::default());
        }

        let n = estimates.len() as f64;
        let (squared, absolute) = estimates
            .iter()
            .zip(truth)
            .fold((0.0, 0.0), |(sq, abs), (e, t)| {
                let diff = e - t;
                (sq + diff * diff, abs + diff.abs())
            });

        let mut relative = relative_errors(estimates, truth);
        let mre = if relative.is_empty() {
            0.0
        } else {
            relative.iter().sum::<f64>() / relative.len() as f64
        };

        Ok(Self {
            rmse: (squared / n).sqrt(),
            mae: absolute / n,
            mre,
            medre: median(&mut relative),
        })
    }
}

/// Fraction of nodes whose relative error is below `threshold`.
///
/// Nodes where truth and estimate are both zero count as below the threshold;
/// nodes with zero truth and a non-zero estimate never do. The denominator is
/// always the total number of nodes.
pub fn frac_rel_error_below(estimates: &[f64], truth: &[f64], threshold: f64) -> Result<f64> {
    check_lengths(estimates, truth)?;
    if estimates.is_empty() {
        return Ok(0.0);
    }
    let below = estimates
        .iter()
        .zip(truth)
        .filter(|&(&e, &t)| {
            if t != 0.0 {
                (e - t).abs() / t < threshold
            } else {
                e == 0.0
            }
        })
        .count();
    Ok(below as f64 / estimates.len() as f64)
}

fn check_lengths(estimates: &[f64], truth: &[f64]) -> Result<()> {
    if estimates.len() != truth.len() {
        return Err(Error::LengthMismatch {
            estimates: estimates.len(),
            truth: truth.len(),
        });
    }
    Ok(())
}

/// Relative errors over nodes where the relative error is defined
fn relative_errors(estimates: &[f64], truth: &[f64]) -> Vec<f64> {
    estimates
        .iter()
        .zip(truth)
        .filter(|&(&e, &t)| t != 0.0 || e == 0.0)
        .map(|(e, t)| (e - t).abs() / t.max(EPSILON))
        .collect()
}

/// Median of `values`, averaging the two middle values for even lengths
fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    }
}
