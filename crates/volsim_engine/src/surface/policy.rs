//! Caller-selected assembly policies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use volsim_core::types::SurfaceError;
use volsim_models::calibration::SmilePoint;

/// What to do when a surface cell cannot be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failing cell and return its error with coordinates.
    #[default]
    Abort,
    /// Store NaN in the cell and record a [`CellFailure`](super::CellFailure).
    MarkFailed,
}

impl FromStr for FailurePolicy {
    type Err = SurfaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "mark_failed" | "mark-failed" | "markfailed" => Ok(FailurePolicy::MarkFailed),
            other => Err(SurfaceError::invalid(format!(
                "unknown failure policy '{other}', expected 'abort' or 'mark_failed'"
            ))),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Abort => write!(f, "abort"),
            FailurePolicy::MarkFailed => write!(f, "mark_failed"),
        }
    }
}

/// Quote template for fitted smiles.
///
/// Each entry is a relative moneyness `K/F` and a vol offset added to the
/// anchor, so one template produces quotes for any forward and anchor.
///
/// # Examples
///
/// ```
/// use volsim_engine::surface::SmileTemplate;
///
/// let template = SmileTemplate::new(vec![0.9, 1.0, 1.1], vec![0.02, 0.0, -0.01]).unwrap();
/// let quotes = template.quotes(200.0, 0.25).unwrap();
/// assert_eq!(quotes[0].strike, 180.0);
/// assert!((quotes[0].implied_vol - 0.27).abs() < 1e-15);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmileTemplate {
    moneyness: Vec<f64>,
    vol_offsets: Vec<f64>,
}

impl SmileTemplate {
    /// Build a template.
    ///
    /// # Errors
    /// `InvalidParameter` on empty or mismatched vectors, non-positive
    /// moneyness, or non-finite offsets.
    pub fn new(moneyness: Vec<f64>, vol_offsets: Vec<f64>) -> Result<Self, SurfaceError> {
        let template = Self {
            moneyness,
            vol_offsets,
        };
        template.validate()?;
        Ok(template)
    }

    /// Check the template's invariants.
    pub fn validate(&self) -> Result<(), SurfaceError> {
        if self.moneyness.is_empty() {
            return Err(SurfaceError::invalid("smile template has no quotes"));
        }
        if self.moneyness.len() != self.vol_offsets.len() {
            return Err(SurfaceError::invalid(format!(
                "smile template has {} moneyness points but {} vol offsets",
                self.moneyness.len(),
                self.vol_offsets.len()
            )));
        }
        if let Some(m) = self.moneyness.iter().find(|m| !(**m > 0.0 && m.is_finite())) {
            return Err(SurfaceError::invalid(format!(
                "template moneyness must be positive, got {m}"
            )));
        }
        if let Some(o) = self.vol_offsets.iter().find(|o| !o.is_finite()) {
            return Err(SurfaceError::invalid(format!(
                "template vol offset must be finite, got {o}"
            )));
        }
        Ok(())
    }

    /// Moneyness points `K/F`.
    pub fn moneyness(&self) -> &[f64] {
        &self.moneyness
    }

    /// Vol offsets from the anchor.
    pub fn vol_offsets(&self) -> &[f64] {
        &self.vol_offsets
    }

    /// Concrete quotes for `forward` and `anchor_vol`.
    ///
    /// # Errors
    /// `InvalidParameter` if an offset drives a quote vol to zero or below.
    pub fn quotes(&self, forward: f64, anchor_vol: f64) -> Result<Vec<SmilePoint>, SurfaceError> {
        self.moneyness
            .iter()
            .zip(&self.vol_offsets)
            .map(|(&m, &offset)| {
                let vol = anchor_vol + offset;
                if vol > 0.0 {
                    Ok(SmilePoint::new(m * forward, vol))
                } else {
                    Err(SurfaceError::invalid(format!(
                        "template quote at moneyness {m} has vol {vol} for anchor {anchor_vol}"
                    )))
                }
            })
            .collect()
    }
}

/// Where the smile for each (state, maturity) comes from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SmileSource {
    /// Closed-form alpha from the anchor with the calibrator's shape.
    #[default]
    AtmAnchored,
    /// Least-squares fit to template quotes around the anchor.
    Fitted(SmileTemplate),
}
