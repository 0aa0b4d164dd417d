//! Option type enumeration.
//!
//! # Examples
//!
//! ```
//! use volsim_core::types::OptionType;
//!
//! let call: OptionType = "Call".parse().unwrap();
//! assert_eq!(call, OptionType::Call);
//! assert_eq!("p".parse::<OptionType>().unwrap(), OptionType::Put);
//! assert!("straddle".parse::<OptionType>().is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use super::error::ParseOptionTypeError;

/// Vanilla option side.
///
/// Free-form spellings ("c", "call", "p", "put", any case) are accepted only
/// through [`FromStr`] and the serde boundary; everything downstream matches
/// on the enum.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub enum OptionType {
    /// Right to buy.
    #[default]
    Call,
    /// Right to sell.
    Put,
}

impl OptionType {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::Call => "call",
            OptionType::Put => "put",
        }
    }

    /// `true` for [`OptionType::Call`].
    #[inline]
    pub fn is_call(&self) -> bool {
        matches!(self, OptionType::Call)
    }
}

impl FromStr for OptionType {
    type Err = ParseOptionTypeError;

    fn from_str(s: &str) -> Result<Self, ParseOptionTypeError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" | "call" => Ok(OptionType::Call),
            "p" | "put" => Ok(OptionType::Put),
            _ => Err(ParseOptionTypeError(s.to_string())),
        }
    }
}

impl TryFrom<String> for OptionType {
    type Error = ParseOptionTypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OptionType> for String {
    fn from(value: OptionType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_all_spellings() {
        for s in ["c", "C", "call", "CALL", "Call", " call "] {
            assert_eq!(s.parse::<OptionType>().unwrap(), OptionType::Call, "{s}");
        }
        for s in ["p", "P", "put", "PUT", "Put"] {
            assert_eq!(s.parse::<OptionType>().unwrap(), OptionType::Put, "{s}");
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "x".parse::<OptionType>().unwrap_err();
        assert_eq!(err, ParseOptionTypeError("x".to_string()));
        assert!("".parse::<OptionType>().is_err());
        assert!("calls".parse::<OptionType>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for kind in [OptionType::Call, OptionType::Put] {
            assert_eq!(kind.to_string().parse::<OptionType>().unwrap(), kind);
        }
    }

    #[test]
    fn test_is_call() {
        assert!(OptionType::Call.is_call());
        assert!(!OptionType::Put.is_call());
        assert_eq!(OptionType::default(), OptionType::Call);
    }
}
