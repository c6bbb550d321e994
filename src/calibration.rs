//! Calibration constant `alpha(M)` of the HyperLogLog estimate for `M` registers:
//!
//! ```text
//! alpha(M) = 1 / (M * integral_0^inf (log2((2 + u) / (1 + u)))^M du)
//! ```
//!
//! [Original HyperLogLog paper](https://algo.inria.fr/flajolet/Publications/FlFuGaMe07.pdf)
//!
//! The integral is evaluated numerically after substituting `u = s / M`, which makes
//! the integrand's width independent of `M`, so `alpha(M) = 1 / integral_0^inf f(s / M) ds`.
//! The half-line is then mapped onto `[0, 1)` with `s = t / (1 - t)` and integrated
//! with globally adaptive 7/15-point Gauss-Kronrod quadrature.

use std::f64::consts::LN_2;

use tracing::{debug, warn};

use crate::cache::{CacheStore, CalibrationCache, MemoryCache};
use crate::error::{Error, Result};

/// Target absolute error of the integral
const TOLERANCE: f64 = 1e-16;
/// Relative error floor below which bisection only chases round-off
const ROUNDOFF: f64 = 50.0 * f64::EPSILON;
/// Maximum number of subintervals
const LIMIT: usize = 2000;
/// Number of subintervals `[0, 1)` is split into before adapting
const INITIAL_INTERVALS: usize = 8;

/// Gauss-Kronrod 15-point abscissae, `XGK[7]` is the center
const XGK: [f64; 8] = [
    0.991_455_371_120_812_6,
    0.949_107_912_342_758_5,
    0.864_864_423_359_769_1,
    0.741_531_185_599_394_4,
    0.586_087_235_467_691_1,
    0.405_845_151_377_397_2,
    0.207_784_955_007_898_5,
    0.0,
];

/// Gauss-Kronrod 15-point weights
const WGK: [f64; 8] = [
    0.022_935_322_010_529_22,
    0.063_092_092_629_978_55,
    0.104_790_010_322_250_2,
    0.140_653_259_715_525_9,
    0.169_004_726_639_267_9,
    0.190_350_578_064_785_4,
    0.204_432_940_075_298_9,
    0.209_482_141_084_727_8,
];

/// Gauss 7-point weights for abscissae `XGK[1], XGK[3], XGK[5], XGK[7]`
const WG: [f64; 4] = [
    0.129_484_966_168_869_7,
    0.279_705_391_489_276_7,
    0.381_830_050_505_118_9,
    0.417_959_183_673_469_4,
];

/// Computes calibration constants through an injected cache, so integration
/// runs once per distinct register count.
#[derive(Debug)]
pub struct Calibrator<C: CalibrationCache = CacheStore> {
    cache: C,
}

impl<C: CalibrationCache> Calibrator<C> {
    pub fn new(cache: C) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Return calibration constant for `registers` registers per node
    pub fn alpha(&self, registers: usize) -> Result<f64> {
        if registers == 0 {
            return Err(Error::InvalidRegisterCount(registers));
        }
        if let Some(alpha) = self.cache.get(registers) {
            debug!(registers, alpha, "calibration cache hit");
            return Ok(alpha);
        }
        let alpha = self
            .cache
            .get_or_insert_with(registers, &|| compute_alpha(registers))?;
        debug!(registers, alpha, "calibration cache miss");
        Ok(alpha)
    }
}

impl Default for Calibrator<CacheStore> {
    fn default() -> Self {
        Self::new(MemoryCache::new().into())
    }
}

/// Compute calibration constant for `registers` registers by numeric integration.
///
/// For a single register the integral diverges and the constant tends to zero.
pub fn compute_alpha(registers: usize) -> Result<f64> {
    match registers {
        0 => Err(Error::InvalidRegisterCount(registers)),
        1 => {
            warn!("calibration integral diverges for a single register, using zero");
            Ok(0.0)
        }
        _ => Ok(1.0 / integrate(registers as f64)),
    }
}

/// Integrand `f(s / M)` mapped onto `[0, 1)`
#[inline]
fn integrand(t: f64, m: f64) -> f64 {
    let one_minus_t = 1.0 - t;
    let u = t / one_minus_t / m;
    // log2((2 + u) / (1 + u)) = ln(1 + 1 / (1 + u)) / ln(2), raised to `m` in log space
    let log_base = (1.0 / (1.0 + u)).ln_1p().ln() - LN_2.ln();
    let value = (m * log_base).exp() / (one_minus_t * one_minus_t);
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Subinterval with its integral and error estimates
#[derive(Debug, Clone, Copy)]
struct Segment {
    a: f64,
    b: f64,
    result: f64,
    error: f64,
}

impl Segment {
    /// Apply Gauss-Kronrod rule to `[a, b]`
    fn new(a: f64, b: f64, m: f64) -> Self {
        let center = 0.5 * (a + b);
        let half = 0.5 * (b - a);
        let fc = integrand(center, m);
        let mut kronrod = fc * WGK[7];
        let mut gauss = fc * WG[3];
        for j in 0..7 {
            let dx = half * XGK[j];
            let sum = integrand(center - dx, m) + integrand(center + dx, m);
            kronrod += WGK[j] * sum;
            if j % 2 == 1 {
                gauss += WG[j / 2] * sum;
            }
        }
        Self {
            a,
            b,
            result: kronrod * half,
            error: ((kronrod - gauss) * half).abs(),
        }
    }
}

/// Integrate `f(s / m)` over `s` in `[0, inf)`
fn integrate(m: f64) -> f64 {
    let width = 1.0 / INITIAL_INTERVALS as f64;
    let mut segments: Vec<Segment> = (0..INITIAL_INTERVALS)
        .map(|i| Segment::new(i as f64 * width, (i + 1) as f64 * width, m))
        .collect();

    loop {
        let result: f64 = segments.iter().map(|s| s.result).sum();
        let error: f64 = segments.iter().map(|s| s.error).sum();
        if error <= TOLERANCE.max(ROUNDOFF * result.abs()) {
            return result;
        }
        if segments.len() >= LIMIT {
            debug!(m, result, error, "calibration integral reached interval limit");
            return result;
        }

        // bisect the segment contributing the largest error
        let worst = segments
            .iter()
            .enumerate()
            .max_by(|(_, x), (_, y)| x.error.total_cmp(&y.error))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let Segment { a, b, .. } = segments.swap_remove(worst);
        let mid = 0.5 * (a + b);
        segments.push(Segment::new(a, mid, m));
        segments.push(Segment::new(mid, b, m));
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use test_case::test_case;

    use crate::cache::{Compute, NoCache};

    /// Bias correction constants used by fixed-precision HyperLogLog implementations
    fn tabulated_alpha(m: usize) -> f64 {
        match m {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / (m as f64)),
        }
    }

    #[test_case(2 => 0.351_194)]
    #[test_case(4 => 0.532_435)]
    #[test_case(8 => 0.625_609)]
    #[test_case(16 => 0.673_102)]
    #[test_case(32 => 0.697_123)]
    #[test_case(64 => 0.709_208)]
    #[test_case(1024 => 0.720_587)]
    fn test_compute_alpha(m: usize) -> f64 {
        let alpha = compute_alpha(m).unwrap();
        (alpha * 1e6).round() / 1e6
    }

    #[test_case(16, 5e-4)]
    #[test_case(32, 5e-4)]
    #[test_case(64, 5e-4)]
    #[test_case(128, 1e-4)]
    #[test_case(4096, 1e-4)]
    #[test_case(65536, 1e-4)]
    fn test_alpha_matches_tabulated(m: usize, tolerance: f64) {
        let alpha = compute_alpha(m).unwrap();
        assert!(
            (alpha - tabulated_alpha(m)).abs() < tolerance,
            "alpha({m}) = {alpha}"
        );
    }

    #[test]
    fn test_alpha_limit() {
        // alpha(M) -> 1 / (2 ln 2) as M grows
        let alpha = compute_alpha(1 << 20).unwrap();
        assert!((alpha - 1.0 / (2.0 * LN_2)).abs() < 1e-4);
    }

    #[test]
    fn test_alpha_degenerate() {
        assert!(matches!(
            compute_alpha(0),
            Err(Error::InvalidRegisterCount(0))
        ));
        assert_eq!(compute_alpha(1).unwrap(), 0.0);
        let err = Calibrator::default().alpha(0).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    /// Cache counting stored values, relying on the default compute-on-miss cycle
    #[derive(Default)]
    struct CountingCache {
        inner: MemoryCache,
        puts: AtomicUsize,
    }

    impl CalibrationCache for CountingCache {
        fn get(&self, registers: usize) -> Option<f64> {
            self.inner.get(registers)
        }

        fn put(&self, registers: usize, value: f64) -> Result<()> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.inner.put(registers, value)
        }
    }

    #[test]
    fn test_calibrator_integrates_once() {
        let calibrator = Calibrator::new(CountingCache::default());
        let first = calibrator.alpha(16).unwrap();
        let second = calibrator.alpha(16).unwrap();
        assert_eq!(first.to_bits(), second.to_bits());
        assert_eq!(calibrator.cache().puts.load(Ordering::SeqCst), 1);

        calibrator.alpha(32).unwrap();
        assert_eq!(calibrator.cache().puts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_calibrator_uses_cached_value() {
        let cache = MemoryCache::new();
        cache.put(16, 0.5).unwrap();
        let calibrator = Calibrator::new(cache);
        assert_eq!(calibrator.alpha(16).unwrap(), 0.5);
    }

    #[test]
    fn test_calibrator_without_cache_is_deterministic() {
        let calibrator = Calibrator::new(NoCache);
        assert_eq!(
            calibrator.alpha(64).unwrap().to_bits(),
            calibrator.alpha(64).unwrap().to_bits()
        );
    }

    #[test]
    fn test_compute_passed_to_cache() {
        let cache = MemoryCache::new();
        let compute: Compute<'_> = &|| compute_alpha(8);
        let alpha = cache.get_or_insert_with(8, compute).unwrap();
        assert_eq!(Calibrator::new(cache).alpha(8).unwrap(), alpha);
    }
}
