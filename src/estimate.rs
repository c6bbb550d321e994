//! Conversion of a register vector into a cardinality estimate.

/// Raw estimates up to `SMALL_RANGE * M` are corrected with linear counting
const SMALL_RANGE: f64 = 2.5;

/// Return cardinality estimate of a single sketch, or `None` when the harmonic
/// sum of its registers underflows to zero (every register saturated).
///
/// The small-range correction applies only when some registers are zero;
/// otherwise the raw estimate is kept even below the small-range threshold.
#[inline]
pub fn estimate_sketch(registers: &[u32], alpha: f64) -> Option<f64> {
    let m = registers.len() as f64;
    let (sum, zeros) = registers.iter().fold((0.0, 0usize), |(sum, zeros), &r| {
        (sum + (-f64::from(r)).exp2(), zeros + usize::from(r == 0))
    });
    if sum == 0.0 {
        return None;
    }

    let raw = alpha * m * m / sum;
    if raw <= SMALL_RANGE * m && zeros != 0 {
        return Some(m * (m / zeros as f64).ln());
    }
    Some(raw)
}
