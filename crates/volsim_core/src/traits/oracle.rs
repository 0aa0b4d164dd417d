//! Pricing oracle trait.

use crate::types::{OptionType, SurfaceError};

/// Closed-form pricing functions for a European option.
///
/// Arguments follow one order everywhere: option type, spot, strike,
/// expiry in years, continuously compounded rate, then volatility (or
/// price for the inverse). Implementations must be pure and thread-safe
/// since the surface assembler calls them from rayon workers.
///
/// # Examples
///
/// ```
/// use volsim_core::traits::OptionOracle;
/// use volsim_core::types::{OptionType, SurfaceError};
///
/// /// Forward-style oracle with delta linear in strike.
/// struct Linear;
///
/// impl OptionOracle for Linear {
///     fn price(&self, _: OptionType, spot: f64, strike: f64, _: f64, _: f64, _: f64)
///         -> Result<f64, SurfaceError> {
///         Ok((spot - strike).max(0.0))
///     }
///
///     fn delta(&self, _: OptionType, spot: f64, strike: f64, _: f64, _: f64, _: f64)
///         -> Result<f64, SurfaceError> {
///         Ok(1.0 - strike / (2.0 * spot))
///     }
/// }
///
/// let oracle = Linear;
/// assert_eq!(oracle.delta(OptionType::Call, 100.0, 100.0, 1.0, 0.0, 0.2).unwrap(), 0.5);
/// assert!(oracle
///     .implied_volatility(OptionType::Call, 100.0, 100.0, 1.0, 0.0, 5.0)
///     .is_err());
/// ```
pub trait OptionOracle: Send + Sync {
    /// Option premium.
    fn price(
        &self,
        option_type: OptionType,
        spot: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
        volatility: f64,
    ) -> Result<f64, SurfaceError>;

    /// Sensitivity of the premium to spot.
    fn delta(
        &self,
        option_type: OptionType,
        spot: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
        volatility: f64,
    ) -> Result<f64, SurfaceError>;

    /// Volatility that reproduces `price`.
    ///
    /// Optional; the default reports the capability as missing.
    fn implied_volatility(
        &self,
        option_type: OptionType,
        spot: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
        price: f64,
    ) -> Result<f64, SurfaceError> {
        let _ = (option_type, spot, strike, expiry, rate, price);
        Err(SurfaceError::invalid(
            "implied volatility is not supported by this oracle",
        ))
    }
}

impl<O: OptionOracle + ?Sized> OptionOracle for &O {
    fn price(
        &self,
        option_type: OptionType,
        spot: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
        volatility: f64,
    ) -> Result<f64, SurfaceError> {
        (**self).price(option_type, spot, strike, expiry, rate, volatility)
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
        (**self).delta(option_type, spot, strike, expiry, rate, volatility)
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
        (**self).implied_volatility(option_type, spot, strike, expiry, rate, price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flat;

    impl OptionOracle for Flat {
        fn price(&self, _: OptionType, _: f64, _: f64, _: f64, _: f64, v: f64) -> Result<f64, SurfaceError> {
            Ok(v * 10.0)
        }

        fn delta(&self, t: OptionType, _: f64, _: f64, _: f64, _: f64, _: f64) -> Result<f64, SurfaceError> {
            Ok(if t.is_call() { 0.5 } else { -0.5 })
        }
    }

    fn delta_via<O: OptionOracle>(oracle: O, t: OptionType) -> f64 {
        oracle.delta(t, 100.0, 100.0, 1.0, 0.0, 0.2).unwrap()
    }

    #[test]
    fn test_reference_forwarding() {
        let oracle = Flat;
        assert_eq!(delta_via(&oracle, OptionType::Call), 0.5);
        assert_eq!(delta_via(&oracle, OptionType::Put), -0.5);
        assert_eq!((&oracle).price(OptionType::Call, 1.0, 1.0, 1.0, 0.0, 0.3).unwrap(), 3.0);
    }

    #[test]
    fn test_default_implied_volatility_is_unsupported() {
        let err = Flat
            .implied_volatility(OptionType::Call, 100.0, 100.0, 1.0, 0.0, 2.0)
            .unwrap_err();
        assert!(err.is_invalid_parameter());
    }
}
