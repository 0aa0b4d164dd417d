//! Standard normal density and distribution.
//!
//! Generic over `T: Float`; the oracle and the solvers use `f64`.

use num_traits::Float;

/// 1 / sqrt(2π)
const INV_SQRT_TWO_PI: f64 = 0.398_942_280_401_432_7;

/// Zelen & Severo tail polynomial (Abramowitz & Stegun 26.2.17).
const TAIL_P: f64 = 0.231_641_9;
const TAIL_B: [f64; 5] = [
    0.319_381_530,
    -0.356_563_782,
    1.781_477_937,
    -1.821_255_978,
    1.330_274_429,
];

/// Upper tail `1 - Φ(x)` for `x >= 0`, absolute error below 7.5e-8.
#[inline]
fn upper_tail<T: Float>(x: T) -> T {
    let t = T::one() / (T::one() + T::from(TAIL_P).unwrap() * x);
    let poly = TAIL_B
        .iter()
        .rev()
        .fold(T::zero(), |acc, &b| (acc + T::from(b).unwrap()) * t);
    norm_pdf(x) * poly
}

/// Standard normal cumulative distribution function Φ.
///
/// Exactly symmetric, `Φ(x) + Φ(-x) = 1`, with absolute error below 1e-7.
///
/// # Examples
/// ```
/// use volsim_core::math::norm_cdf;
///
/// assert!((norm_cdf(0.0_f64) - 0.5).abs() < 1e-7);
/// assert!(norm_cdf(-3.0_f64) < 0.01);
/// assert!(norm_cdf(3.0_f64) > 0.99);
/// ```
#[inline]
pub fn norm_cdf<T: Float>(x: T) -> T {
    if x >= T::zero() {
        T::one() - upper_tail(x)
    } else {
        upper_tail(-x)
    }
}

/// Standard normal density φ(x) = exp(-x²/2) / sqrt(2π).
///
/// # Examples
/// ```
/// use volsim_core::math::norm_pdf;
///
/// assert!((norm_pdf(0.0_f64) - 0.3989422804).abs() < 1e-7);
/// ```
#[inline]
pub fn norm_pdf<T: Float>(x: T) -> T {
    let half = T::from(0.5).unwrap();
    T::from(INV_SQRT_TWO_PI).unwrap() * (-half * x * x).exp()
}
