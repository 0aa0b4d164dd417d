//! SABRスマイル（Hagan近似公式）
//!
//! SABRモデルは以下のSDEで記述される:
//! ```text
//! dF = alpha * F^beta * dW_F
//! d(alpha) = nu * alpha * dW_alpha
//! E[dW_F * dW_alpha] = rho * dt
//! ```
//!
//! ## インプライドボラティリティ
//!
//! 主要項（デフォルト, [`SabrExpansion::LeadingOrder`]）:
//! ```text
//! ATM (F = K):  sigma = alpha / F^(1-beta)
//! それ以外:     sigma = alpha / (FK)^((1-beta)/2) * z / x(z)
//! z    = (nu / alpha) * (FK)^((1-beta)/2) * ln(F/K)
//! x(z) = ln((sqrt(1 - 2 rho z + z^2) + z - rho) / (1 - rho))
//! ```
//! [`SabrExpansion::Hagan`] は分母 D(F,K) と時間補正項 (1 + (...) T) を加える。
//!
//! ## 縮退ガード
//!
//! - |z| が小さい場合: 級数 z/x(z) ≈ 1 - rho z / 2
//! - rho → +1 の場合: 極限 x(z) = -ln(1 - z)（z < 1 のみ）
//! - rho → -1 の場合: x(z) = ln(1 + z)（z > -1 のみ）
//! - それ以外で対数の引数が非正または非有限: `SabrError::Degenerate`
//!
//! ## 使用例
//!
//! ```
//! use volsim_models::models::sabr::SabrParams;
//!
//! let params = SabrParams::new(
//!     2.0,    // alpha
//!     0.5,    // beta
//!     -0.5,   // rho
//!     0.4,    // nu
//!     1.0,    // 満期
//!     100.0,  // フォワード
//! )
//! .unwrap();
//!
//! let atm = params.implied_vol(100.0).unwrap();
//! assert!((atm - 0.2).abs() < 1e-12);
//!
//! // 負のrhoでは低ストライク側のボラティリティが高い
//! assert!(params.implied_vol(90.0).unwrap() > params.implied_vol(110.0).unwrap());
//! ```

use thiserror::Error;
use volsim_core::types::SurfaceError;

/// |z| がこの値未満の場合は級数近似を使用
const Z_SERIES_TOLERANCE: f64 = 1e-7;

/// 1 ∓ rho がこの値未満の場合は rho = ±1 の極限を使用
const RHO_LIMIT_TOLERANCE: f64 = 1e-10;

/// SABRエラー型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SabrError {
    /// 無効なフォワード価格（正でなければならない）
    #[error("無効なフォワード価格: F = {0} (正の値が必要)")]
    InvalidForward(f64),

    /// 無効なalpha（正でなければならない）
    #[error("無効な初期ボラティリティ: alpha = {0} (正の値が必要)")]
    InvalidAlpha(f64),

    /// 無効なnu（非負でなければならない）
    #[error("無効なvol-of-vol: nu = {0} (非負の値が必要)")]
    InvalidNu(f64),

    /// 無効なbeta（[0, 1]の範囲内でなければならない）
    #[error("無効なベータ: beta = {0} ([0, 1]の範囲が必要)")]
    InvalidBeta(f64),

    /// 無効な相関係数（[-1, 1]の範囲内でなければならない）
    #[error("無効な相関係数: rho = {0} ([-1, 1]の範囲が必要)")]
    InvalidRho(f64),

    /// 無効な満期（正でなければならない）
    #[error("無効な満期: T = {0} (正の値が必要)")]
    InvalidMaturity(f64),

    /// 無効なストライク（正でなければならない）
    #[error("無効なストライク価格: K = {0} (正の値が必要)")]
    InvalidStrike(f64),

    /// 公式の評価が未定義領域に入った
    #[error("ストライク {strike} でSABR公式が縮退しました: {reason}")]
    Degenerate {
        /// 評価したストライク
        strike: f64,
        /// 縮退の内容
        reason: String,
    },
}

impl From<SabrError> for SurfaceError {
    fn from(err: SabrError) -> Self {
        match err {
            SabrError::Degenerate { .. } => SurfaceError::NumericalDegeneracy(err.to_string()),
            other => SurfaceError::InvalidParameter(other.to_string()),
        }
    }
}

/// インプライドボラティリティ近似の次数
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum SabrExpansion {
    /// 主要項のみ
    #[default]
    LeadingOrder,
    /// Hagan et al. (2002) の D(F,K) と時間補正項を含む
    Hagan,
}

/// SABRパラメータ
///
/// 特定の満期とフォワードに対してのみ有効。構築後は不変。
///
/// # 例
///
/// ```
/// use volsim_models::models::sabr::SabrParams;
///
/// assert!(SabrParams::new(0.2, 1.0, 0.0, 0.3, 1.0, 100.0).is_ok());
/// assert!(SabrParams::new(0.2, 1.5, 0.0, 0.3, 1.0, 100.0).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SabrParams {
    alpha: f64,
    beta: f64,
    rho: f64,
    nu: f64,
    maturity: f64,
    forward: f64,
}

impl SabrParams {
    /// 新しいSABRパラメータを作成（検証付き）
    pub fn new(
        alpha: f64,
        beta: f64,
        rho: f64,
        nu: f64,
        maturity: f64,
        forward: f64,
    ) -> Result<Self, SabrError> {
        if !(forward > 0.0 && forward.is_finite()) {
            return Err(SabrError::InvalidForward(forward));
        }
        if !(alpha > 0.0 && alpha.is_finite()) {
            return Err(SabrError::InvalidAlpha(alpha));
        }
        if !(nu >= 0.0 && nu.is_finite()) {
            return Err(SabrError::InvalidNu(nu));
        }
        if !(0.0..=1.0).contains(&beta) {
            return Err(SabrError::InvalidBeta(beta));
        }
        if !(-1.0..=1.0).contains(&rho) {
            return Err(SabrError::InvalidRho(rho));
        }
        if !(maturity > 0.0 && maturity.is_finite()) {
            return Err(SabrError::InvalidMaturity(maturity));
        }

        Ok(Self {
            alpha,
            beta,
            rho,
            nu,
            maturity,
            forward,
        })
    }

    /// alpha
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// beta
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// rho
    pub fn rho(&self) -> f64 {
        self.rho
    }

    /// nu
    pub fn nu(&self) -> f64 {
        self.nu
    }

    /// 満期
    pub fn maturity(&self) -> f64 {
        self.maturity
    }

    /// フォワード
    pub fn forward(&self) -> f64 {
        self.forward
    }

    /// ATMインプライドボラティリティ
    ///
    /// 主要項では alpha / F^(1-beta)。
    pub fn atm_vol(&self, expansion: SabrExpansion) -> f64 {
        let f_pow = self.forward.powf(1.0 - self.beta);
        let base = self.alpha / f_pow;
        match expansion {
            SabrExpansion::LeadingOrder => base,
            SabrExpansion::Hagan => base * self.time_correction(f_pow, f_pow * f_pow),
        }
    }

    /// 主要項によるインプライドボラティリティ
    pub fn implied_vol(&self, strike: f64) -> Result<f64, SabrError> {
        self.implied_vol_with(strike, SabrExpansion::LeadingOrder)
    }

    /// 指定した近似次数でインプライドボラティリティを計算
    ///
    /// # エラー
    ///
    /// - `InvalidStrike`: ストライクが正の有限値でない
    /// - `Degenerate`: x(z) が未定義、または結果が正の有限値でない
    pub fn implied_vol_with(&self, strike: f64, expansion: SabrExpansion) -> Result<f64, SabrError> {
        if !(strike > 0.0 && strike.is_finite()) {
            return Err(SabrError::InvalidStrike(strike));
        }

        let f = self.forward;
        if (f - strike).abs() <= f64::EPSILON * f {
            return Ok(self.atm_vol(expansion));
        }

        let one_minus_beta = 1.0 - self.beta;
        let log_fk = (f / strike).ln();
        let fk_pow_half = (f * strike).powf(0.5 * one_minus_beta);

        let z = (self.nu / self.alpha) * fk_pow_half * log_fk;
        let z_over_x = self.z_over_x(z, strike)?;

        let mut vol = self.alpha / fk_pow_half * z_over_x;

        if expansion == SabrExpansion::Hagan {
            let lb2 = one_minus_beta * one_minus_beta * log_fk * log_fk;
            let d = 1.0 + lb2 / 24.0 + lb2 * lb2 / 1920.0;
            vol = vol / d * self.time_correction(fk_pow_half, fk_pow_half * fk_pow_half);
        }

        if !vol.is_finite() || vol <= 0.0 {
            return Err(SabrError::Degenerate {
                strike,
                reason: format!("implied vol evaluated to {vol}"),
            });
        }

        Ok(vol)
    }

    /// z / x(z)（縮退ガード付き）
    fn z_over_x(&self, z: f64, strike: f64) -> Result<f64, SabrError> {
        let rho = self.rho;

        // z → 0: z/x(z) = 1 - rho z / 2 + O(z^2)
        if z.abs() < Z_SERIES_TOLERANCE {
            return Ok(1.0 - 0.5 * rho * z);
        }

        let x = if 1.0 - rho < RHO_LIMIT_TOLERANCE {
            // rho → 1: x(z) = -ln(1 - z)
            if z >= 1.0 {
                return Err(SabrError::Degenerate {
                    strike,
                    reason: format!("rho -> 1 limit undefined for z = {z}"),
                });
            }
            -(-z).ln_1p()
        } else if 1.0 + rho < RHO_LIMIT_TOLERANCE {
            // rho → -1: x(z) = ln(1 + z)
            if z <= -1.0 {
                return Err(SabrError::Degenerate {
                    strike,
                    reason: format!("rho -> -1 limit undefined for z = {z}"),
                });
            }
            z.ln_1p()
        } else {
            let disc = 1.0 - 2.0 * rho * z + z * z;
            let arg = (disc.max(0.0).sqrt() + z - rho) / (1.0 - rho);
            if !(arg > 0.0 && arg.is_finite()) {
                return Err(SabrError::Degenerate {
                    strike,
                    reason: format!("log argument of x(z) is {arg} at z = {z}"),
                });
            }
            arg.ln()
        };

        if x == 0.0 || !x.is_finite() {
            return Err(SabrError::Degenerate {
                strike,
                reason: format!("x(z) = {x} at z = {z}"),
            });
        }

        Ok(z / x)
    }

    /// 時間補正項 1 + [(1-β)²α²/(24 (FK)^(1-β)) + ρβνα/(4 (FK)^((1-β)/2)) + (2-3ρ²)ν²/24] T
    fn time_correction(&self, fk_pow_half: f64, fk_pow_full: f64) -> f64 {
        let one_minus_beta = 1.0 - self.beta;
        let (alpha, rho, nu) = (self.alpha, self.rho, self.nu);

        let term1 = one_minus_beta * one_minus_beta * alpha * alpha / (24.0 * fk_pow_full);
        let term2 = rho * self.beta * nu * alpha / (4.0 * fk_pow_half);
        let term3 = (2.0 - 3.0 * rho * rho) * nu * nu / 24.0;

        1.0 + (term1 + term2 + term3) * self.maturity
    }
}
