//! Black-Scholes oracle for European options.
//!
//! ## Mathematical Formulas
//!
//! **Call Price**: C = S·e^(-qT)·N(d₁) - K·e^(-rT)·N(d₂)
//! **Put Price**: P = K·e^(-rT)·N(-d₂) - S·e^(-qT)·N(-d₁)
//!
//! Where:
//! - d₁ = (ln(S/K) + (r - q + σ²/2)T) / (σ√T)
//! - d₂ = d₁ - σ√T
//!
//! With the default zero dividend yield, call delta is N(d₁) and put delta
//! is N(d₁) - 1.

use volsim_core::math::solvers::{BrentSolver, SolverConfig};
use volsim_core::math::{norm_cdf, norm_pdf};
use volsim_core::traits::OptionOracle;
use volsim_core::types::{OptionType, SolverError, SurfaceError};

use super::error::AnalyticalError;

/// Lower end of the implied volatility search bracket.
pub const MIN_IMPLIED_VOL: f64 = 1e-4;

/// Upper end of the implied volatility search bracket.
pub const MAX_IMPLIED_VOL: f64 = 5.0;

/// Lognormal pricing oracle.
///
/// Stateless apart from the dividend yield and the solver used for implied
/// volatility, so one instance can be shared by every rayon worker.
///
/// # Examples
/// ```
/// use volsim_core::traits::OptionOracle;
/// use volsim_core::types::OptionType;
/// use volsim_models::analytical::BlackScholesOracle;
///
/// let bs = BlackScholesOracle::new();
/// let call = bs.price(OptionType::Call, 100.0, 100.0, 1.0, 0.05, 0.2).unwrap();
/// let put = bs.price(OptionType::Put, 100.0, 100.0, 1.0, 0.05, 0.2).unwrap();
///
/// // Put-call parity: C - P = S - K*exp(-rT)
/// let parity = call - put - (100.0 - 100.0 * (-0.05_f64).exp());
/// assert!(parity.abs() < 1e-10);
/// ```
#[derive(Debug, Clone)]
pub struct BlackScholesOracle {
    dividend_yield: f64,
    solver: BrentSolver<f64>,
}

impl Default for BlackScholesOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl BlackScholesOracle {
    /// Oracle with zero dividend yield.
    pub fn new() -> Self {
        Self {
            dividend_yield: 0.0,
            solver: BrentSolver::new(SolverConfig::new(1e-12, 200)),
        }
    }

    /// Oracle with a continuous dividend yield.
    ///
    /// # Errors
    /// `AnalyticalError::InvalidRate` if the yield is not finite.
    pub fn with_dividend_yield(dividend_yield: f64) -> Result<Self, AnalyticalError> {
        if !dividend_yield.is_finite() {
            return Err(AnalyticalError::InvalidRate {
                rate: dividend_yield,
            });
        }
        Ok(Self {
            dividend_yield,
            ..Self::new()
        })
    }

    /// Continuous dividend yield.
    #[inline]
    pub fn dividend_yield(&self) -> f64 {
        self.dividend_yield
    }

    /// d₁ = (ln(S/K) + (r - q + σ²/2)T) / (σ√T)
    pub fn d1(
        &self,
        spot: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
        volatility: f64,
    ) -> Result<f64, AnalyticalError> {
        validate(spot, strike, expiry, rate)?;
        validate_volatility(volatility)?;
        Ok(self.d1_unchecked(spot, strike, expiry, rate, volatility))
    }

    /// d₂ = d₁ - σ√T
    pub fn d2(
        &self,
        spot: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
        volatility: f64,
    ) -> Result<f64, AnalyticalError> {
        Ok(self.d1(spot, strike, expiry, rate, volatility)? - volatility * expiry.sqrt())
    }

    /// Gamma = e^(-qT)·φ(d₁) / (S·σ·√T), identical for calls and puts.
    pub fn gamma(
        &self,
        spot: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
        volatility: f64,
    ) -> Result<f64, AnalyticalError> {
        let d1 = self.d1(spot, strike, expiry, rate, volatility)?;
        let carry = (-self.dividend_yield * expiry).exp();
        Ok(carry * norm_pdf(d1) / (spot * volatility * expiry.sqrt()))
    }

    /// Vega = S·e^(-qT)·√T·φ(d₁), identical for calls and puts.
    pub fn vega(
        &self,
        spot: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
        volatility: f64,
    ) -> Result<f64, AnalyticalError> {
        let d1 = self.d1(spot, strike, expiry, rate, volatility)?;
        let carry = (-self.dividend_yield * expiry).exp();
        Ok(spot * carry * expiry.sqrt() * norm_pdf(d1))
    }

    #[inline]
    fn d1_unchecked(&self, spot: f64, strike: f64, expiry: f64, rate: f64, volatility: f64) -> f64 {
        let drift = (rate - self.dividend_yield + 0.5 * volatility * volatility) * expiry;
        ((spot / strike).ln() + drift) / (volatility * expiry.sqrt())
    }

    fn price_unchecked(
        &self,
        option_type: OptionType,
        spot: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
        volatility: f64,
    ) -> f64 {
        let d1 = self.d1_unchecked(spot, strike, expiry, rate, volatility);
        let d2 = d1 - volatility * expiry.sqrt();
        let forward_spot = spot * (-self.dividend_yield * expiry).exp();
        let discounted_strike = strike * (-rate * expiry).exp();

        match option_type {
            OptionType::Call => forward_spot * norm_cdf(d1) - discounted_strike * norm_cdf(d2),
            OptionType::Put => discounted_strike * norm_cdf(-d2) - forward_spot * norm_cdf(-d1),
        }
    }

    /// No-arbitrage bounds on the premium.
    fn price_bounds(
        &self,
        option_type: OptionType,
        spot: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
    ) -> (f64, f64) {
        let forward_spot = spot * (-self.dividend_yield * expiry).exp();
        let discounted_strike = strike * (-rate * expiry).exp();
        match option_type {
            OptionType::Call => ((forward_spot - discounted_strike).max(0.0), forward_spot),
            OptionType::Put => ((discounted_strike - forward_spot).max(0.0), discounted_strike),
        }
    }

    fn invert_price(
        &self,
        option_type: OptionType,
        spot: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
        price: f64,
    ) -> Result<f64, AnalyticalError> {
        validate(spot, strike, expiry, rate)?;

        let (lower, upper) = self.price_bounds(option_type, spot, strike, expiry, rate);
        if !(price.is_finite() && price > lower && price < upper) {
            return Err(AnalyticalError::PriceOutOfBounds {
                price,
                lower,
                upper,
            });
        }

        let objective =
            |vol: f64| self.price_unchecked(option_type, spot, strike, expiry, rate, vol) - price;

        self.solver
            .find_root(objective, MIN_IMPLIED_VOL, MAX_IMPLIED_VOL)
            .map_err(|err| AnalyticalError::NumericalInstability {
                message: match err {
                    SolverError::NoBracket { .. } => format!(
                        "price {price} not reachable with volatility in [{MIN_IMPLIED_VOL}, {MAX_IMPLIED_VOL}]"
                    ),
                    other => other.to_string(),
                },
            })
    }
}

impl OptionOracle for BlackScholesOracle {
    fn price(
        &self,
        option_type: OptionType,
        spot: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
        volatility: f64,
    ) -> Result<f64, SurfaceError> {
        validate(spot, strike, expiry, rate)?;
        validate_volatility(volatility)?;
        Ok(self.price_unchecked(option_type, spot, strike, expiry, rate, volatility))
    }

    fn delta(
        &self,
        option_type: OptionType,
        spot: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
        volatility: f64,
    ) -> Result<f64, SurfaceError> {
        let d1 = self.d1(spot, strike, expiry, rate, volatility)?;
        let carry = (-self.dividend_yield * expiry).exp();
        let n_d1 = norm_cdf(d1);

        Ok(match option_type {
            OptionType::Call => carry * n_d1,
            OptionType::Put => carry * (n_d1 - 1.0),
        })
    }

    fn implied_volatility(
        &self,
        option_type: OptionType,
        spot: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
        price: f64,
    ) -> Result<f64, SurfaceError> {
        Ok(self.invert_price(option_type, spot, strike, expiry, rate, price)?)
    }
}

fn validate(spot: f64, strike: f64, expiry: f64, rate: f64) -> Result<(), AnalyticalError> {
    if !(spot > 0.0 && spot.is_finite()) {
        return Err(AnalyticalError::InvalidSpot { spot });
    }
    if !(strike > 0.0 && strike.is_finite()) {
        return Err(AnalyticalError::InvalidStrike { strike });
    }
    if !(expiry > 0.0 && expiry.is_finite()) {
        return Err(AnalyticalError::InvalidExpiry { expiry });
    }
    if !rate.is_finite() {
        return Err(AnalyticalError::InvalidRate { rate });
    }
    Ok(())
}

fn validate_volatility(volatility: f64) -> Result<(), AnalyticalError> {
    if !(volatility > 0.0 && volatility.is_finite()) {
        return Err(AnalyticalError::InvalidVolatility { volatility });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const S: f64 = 100.0;
    const R: f64 = 0.05;
    const VOL: f64 = 0.2;

    fn bs() -> BlackScholesOracle {
        BlackScholesOracle::new()
    }

    // ================================================================
    // Pricing
    // ================================================================

    #[test]
    fn test_call_price_reference_value() {
        // S=100, K=100, T=1, r=5%, σ=20%: C ≈ 10.4506
        let price = bs().price(OptionType::Call, S, 100.0, 1.0, R, VOL).unwrap();
        assert_relative_eq!(price, 10.4506, epsilon = 1e-3);
    }

    #[test]
    fn test_put_price_reference_value() {
        // P ≈ 5.5735
        let price = bs().price(OptionType::Put, S, 100.0, 1.0, R, VOL).unwrap();
        assert_relative_eq!(price, 5.5735, epsilon = 1e-3);
    }

    #[test]
    fn test_put_call_parity_with_dividend() {
        let oracle = BlackScholesOracle::with_dividend_yield(0.02).unwrap();
        for strike in [80.0, 95.0, 100.0, 110.0, 130.0] {
            let call = oracle.price(OptionType::Call, S, strike, 0.75, R, VOL).unwrap();
            let put = oracle.price(OptionType::Put, S, strike, 0.75, R, VOL).unwrap();
            let expected = S * (-0.02_f64 * 0.75).exp() - strike * (-R * 0.75).exp();
            assert_relative_eq!(call - put, expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_d1_d2_relationship() {
        let oracle = bs();
        let d1 = oracle.d1(S, 105.0, 0.5, R, VOL).unwrap();
        let d2 = oracle.d2(S, 105.0, 0.5, R, VOL).unwrap();
        assert_relative_eq!(d1 - d2, VOL * 0.5_f64.sqrt(), epsilon = 1e-14);
    }

    // ================================================================
    // Greeks
    // ================================================================

    #[test]
    fn test_delta_bounds_and_parity() {
        let oracle = bs();
        for strike in [50.0, 90.0, 100.0, 110.0, 200.0] {
            let call = oracle.delta(OptionType::Call, S, strike, 1.0, R, VOL).unwrap();
            let put = oracle.delta(OptionType::Put, S, strike, 1.0, R, VOL).unwrap();
            assert!((0.0..=1.0).contains(&call));
            assert!((-1.0..=0.0).contains(&put));
            assert_relative_eq!(call - put, 1.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_call_delta_decreases_in_strike() {
        let oracle = bs();
        let mut previous = 1.0;
        for i in 1..=60 {
            let strike = 40.0 + 4.0 * i as f64;
            let delta = oracle.delta(OptionType::Call, S, strike, 0.5, R, VOL).unwrap();
            assert!(delta <= previous);
            previous = delta;
        }
    }

    #[test]
    fn test_delta_vs_finite_diff() {
        let oracle = bs();
        let h = 1e-3;
        let up = oracle.price(OptionType::Call, S + h, 100.0, 1.0, R, VOL).unwrap();
        let down = oracle.price(OptionType::Call, S - h, 100.0, 1.0, R, VOL).unwrap();
        let delta = oracle.delta(OptionType::Call, S, 100.0, 1.0, R, VOL).unwrap();
        assert_relative_eq!(delta, (up - down) / (2.0 * h), epsilon = 1e-4);
    }

    #[test]
    fn test_vega_vs_finite_diff() {
        let oracle = bs();
        let h = 1e-4;
        let up = oracle.price(OptionType::Call, S, 100.0, 1.0, R, VOL + h).unwrap();
        let down = oracle.price(OptionType::Call, S, 100.0, 1.0, R, VOL - h).unwrap();
        let vega = oracle.vega(S, 100.0, 1.0, R, VOL).unwrap();
        assert_relative_eq!(vega, (up - down) / (2.0 * h), epsilon = 1e-2);
        assert!(oracle.gamma(S, 100.0, 1.0, R, VOL).unwrap() > 0.0);
    }

    // ================================================================
    // Implied volatility
    // ================================================================

    #[test]
    fn test_implied_volatility_recovers_input() {
        let oracle = bs();
        for (option_type, strike, vol) in [
            (OptionType::Call, 100.0, 0.2),
            (OptionType::Call, 120.0, 0.35),
            (OptionType::Put, 85.0, 0.15),
            (OptionType::Put, 100.0, 0.6),
        ] {
            let price = oracle.price(option_type, S, strike, 1.0, R, vol).unwrap();
            let implied = oracle
                .implied_volatility(option_type, S, strike, 1.0, R, price)
                .unwrap();
            assert_relative_eq!(implied, vol, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_implied_volatility_rejects_arbitrage_price() {
        let oracle = bs();
        let err = oracle
            .implied_volatility(OptionType::Call, S, 100.0, 1.0, R, 150.0)
            .unwrap_err();
        assert!(err.is_invalid_parameter());

        let err = oracle
            .implied_volatility(OptionType::Put, S, 100.0, 1.0, R, 0.0)
            .unwrap_err();
        assert!(err.is_invalid_parameter());
    }

    // ================================================================
    // Validation
    // ================================================================

    #[test]
    fn test_invalid_inputs() {
        let oracle = bs();
        assert!(oracle.price(OptionType::Call, -1.0, 100.0, 1.0, R, VOL).is_err());
        assert!(oracle.price(OptionType::Call, S, 0.0, 1.0, R, VOL).is_err());
        assert!(oracle.price(OptionType::Call, S, 100.0, 0.0, R, VOL).is_err());
        assert!(oracle.price(OptionType::Call, S, 100.0, 1.0, f64::NAN, VOL).is_err());
        assert!(oracle.delta(OptionType::Put, S, 100.0, 1.0, R, 0.0).is_err());
        assert!(BlackScholesOracle::with_dividend_yield(f64::INFINITY).is_err());

        let err = oracle.delta(OptionType::Call, S, 100.0, 1.0, R, -0.2).unwrap_err();
        assert!(err.is_invalid_parameter());
    }

    #[test]
    fn test_negative_rate_allowed() {
        let price = bs().price(OptionType::Call, S, 100.0, 1.0, -0.01, VOL).unwrap();
        assert!(price > 0.0);
    }
}
