//! Heston確率的ボラティリティモデル（フルトランケーションEuler離散化）
//!
//! 資産価格と分散は以下のSDEに従う:
//! ```text
//! dS = mu * S * dt + sqrt(V) * S * dW_1
//! dV = kappa * (theta - V) * dt + xi * sqrt(V) * dW_2
//! E[dW_1 * dW_2] = rho * dt
//! ```
//! ここで:
//! - S = 資産価格
//! - V = 瞬間分散
//! - mu = ドリフト
//! - kappa = 平均回帰速度
//! - theta = 長期分散
//! - xi = ボラティリティのボラティリティ (vol-of-vol)
//! - rho = 資産価格と分散の相関
//!
//! ## フルトランケーション
//!
//! Euler離散化では分散が一時的に負になり得るため、ドリフトと拡散の両方で
//! V⁺ = max(V, 0) を使用し、更新後の分散も0でクランプする:
//! ```text
//! V_next = max(V + kappa * (theta - V⁺) * dt + xi * sqrt(V⁺) * dW_2, 0)
//! S_next = S * exp((mu - V⁺ / 2) * dt + sqrt(V⁺) * dW_1)
//! ```
//! dW_1, dW_2 は sqrt(dt) でスケール済みの相関増分。
//!
//! ## 使用例
//!
//! ```
//! use volsim_models::models::heston::HestonParams;
//!
//! let params = HestonParams::new(
//!     100.0,  // スポット価格
//!     0.04,   // 初期分散
//!     0.04,   // 長期分散
//!     2.0,    // 平均回帰速度
//!     0.3,    // vol-of-vol
//!     -0.7,   // 相関
//!     0.07,   // ドリフト
//! )
//! .unwrap();
//!
//! assert!(params.satisfies_feller());
//!
//! let (s, v) = params.full_truncation_step(100.0, 0.04, 1.0 / 252.0, 0.0, 0.0);
//! assert!(s > 100.0);
//! assert!((v - 0.04).abs() < 1e-12);
//! ```

use thiserror::Error;
use volsim_core::types::SurfaceError;

/// Hestonモデルエラー型
///
/// パラメータ検証時のエラーを表現する。
///
/// # 例
///
/// ```
/// use volsim_models::models::heston::HestonError;
///
/// let err = HestonError::InvalidSpot(-100.0);
/// assert!(format!("{}", err).contains("-100"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HestonError {
    /// 無効なスポット価格（正の有限値でなければならない）
    #[error("無効なスポット価格: S0 = {0} (正の値が必要)")]
    InvalidSpot(f64),

    /// 無効な初期分散（非負でなければならない）
    #[error("無効な初期分散: v0 = {0} (非負の値が必要)")]
    InvalidV0(f64),

    /// 無効な長期分散（非負でなければならない）
    #[error("無効な長期分散: theta = {0} (非負の値が必要)")]
    InvalidTheta(f64),

    /// 無効な平均回帰速度（非負でなければならない）
    #[error("無効な平均回帰速度: kappa = {0} (非負の値が必要)")]
    InvalidKappa(f64),

    /// 無効なvol-of-vol（非負でなければならない）
    #[error("無効なvol-of-vol: xi = {0} (非負の値が必要)")]
    InvalidXi(f64),

    /// 無効な相関係数（-1から1の範囲内でなければならない）
    #[error("無効な相関係数: rho = {0} ([-1, 1]の範囲が必要)")]
    InvalidRho(f64),

    /// 無効なドリフト（有限値でなければならない）
    #[error("無効なドリフト: mu = {0} (有限値が必要)")]
    InvalidDrift(f64),
}

impl From<HestonError> for SurfaceError {
    fn from(err: HestonError) -> Self {
        SurfaceError::InvalidParameter(err.to_string())
    }
}

/// Hestonモデルパラメータ
///
/// `new` で検証済み。フィールドは読み取り専用として扱う。
///
/// # 例
///
/// ```
/// use volsim_models::models::heston::HestonParams;
///
/// assert!(HestonParams::new(100.0, 0.04, 0.04, 2.0, 0.3, -0.7, 0.07).is_ok());
/// assert!(HestonParams::new(100.0, 0.04, 0.04, 2.0, 0.3, -1.5, 0.07).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HestonParams {
    /// スポット価格 (S0)
    pub spot: f64,
    /// 初期分散 (v0)
    pub v0: f64,
    /// 長期分散 (theta)
    pub theta: f64,
    /// 平均回帰速度 (kappa)
    pub kappa: f64,
    /// ボラティリティのボラティリティ (xi)
    pub xi: f64,
    /// 相関係数 (rho)
    pub rho: f64,
    /// ドリフト (mu)
    pub drift: f64,
}

impl HestonParams {
    /// 新しいHestonパラメータを作成（検証付き）
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        spot: f64,
        v0: f64,
        theta: f64,
        kappa: f64,
        xi: f64,
        rho: f64,
        drift: f64,
    ) -> Result<Self, HestonError> {
        let params = Self {
            spot,
            v0,
            theta,
            kappa,
            xi,
            rho,
            drift,
        };
        params.validate()?;
        Ok(params)
    }

    /// パラメータを検証
    ///
    /// NaNと無限大は全てのフィールドで拒否される。
    pub fn validate(&self) -> Result<(), HestonError> {
        // スポット価格は正でなければならない
        if !(self.spot > 0.0 && self.spot.is_finite()) {
            return Err(HestonError::InvalidSpot(self.spot));
        }

        if !non_negative(self.v0) {
            return Err(HestonError::InvalidV0(self.v0));
        }

        if !non_negative(self.theta) {
            return Err(HestonError::InvalidTheta(self.theta));
        }

        if !non_negative(self.kappa) {
            return Err(HestonError::InvalidKappa(self.kappa));
        }

        if !non_negative(self.xi) {
            return Err(HestonError::InvalidXi(self.xi));
        }

        // 相関は[-1, 1]の範囲内でなければならない
        if !(-1.0..=1.0).contains(&self.rho) {
            return Err(HestonError::InvalidRho(self.rho));
        }

        if !self.drift.is_finite() {
            return Err(HestonError::InvalidDrift(self.drift));
        }

        Ok(())
    }

    /// Feller条件をチェック (2 * kappa * theta > xi^2)
    ///
    /// 連続時間では分散が0に到達しない十分条件。離散化では満たされても
    /// 負の分散が起こり得るため、トランケーションは常に適用される。
    ///
    /// ```
    /// use volsim_models::models::heston::HestonParams;
    ///
    /// // 2 * 2.0 * 0.04 = 0.16 > 0.3^2 = 0.09
    /// let p = HestonParams::new(100.0, 0.04, 0.04, 2.0, 0.3, -0.7, 0.07).unwrap();
    /// assert!(p.satisfies_feller());
    ///
    /// // 2 * 0.5 * 0.04 = 0.04 < 0.5^2 = 0.25
    /// let p = HestonParams::new(100.0, 0.04, 0.04, 0.5, 0.5, -0.7, 0.07).unwrap();
    /// assert!(!p.satisfies_feller());
    /// ```
    pub fn satisfies_feller(&self) -> bool {
        2.0 * self.kappa * self.theta > self.xi * self.xi
    }

    /// Feller比率 (2 * kappa * theta / xi^2)
    ///
    /// xi = 0 の場合は無限大を返す。
    pub fn feller_ratio(&self) -> f64 {
        let denominator = self.xi * self.xi;
        if denominator > 0.0 {
            2.0 * self.kappa * self.theta / denominator
        } else {
            f64::INFINITY
        }
    }

    /// フルトランケーションEulerで1ステップ進める
    ///
    /// # 引数
    ///
    /// * `s` - 現在の価格
    /// * `v` - 現在の分散（負でもよい、V⁺で処理される）
    /// * `dt` - タイムステップ
    /// * `dw1` - 価格用の相関増分（sqrt(dt)スケール済み）
    /// * `dw2` - 分散用の相関増分（sqrt(dt)スケール済み）
    ///
    /// # 戻り値
    ///
    /// (S_next, V_next)。V_next >= 0 は常に保証される。
    #[inline]
    pub fn full_truncation_step(&self, s: f64, v: f64, dt: f64, dw1: f64, dw2: f64) -> (f64, f64) {
        let v_plus = v.max(0.0);
        let sqrt_v = v_plus.sqrt();

        let v_next = (v + self.kappa * (self.theta - v_plus) * dt + self.xi * sqrt_v * dw2).max(0.0);
        let s_next = s * ((self.drift - 0.5 * v_plus) * dt + sqrt_v * dw1).exp();

        (s_next, v_next)
    }
}

impl Default for HestonParams {
    /// 標準的なパラメータセット:
    /// spot = 100, v0 = theta = 0.04, kappa = 2.0, xi = 0.3, rho = -0.7, drift = 0.07
    fn default() -> Self {
        Self {
            spot: 100.0,
            v0: 0.04,
            theta: 0.04,
            kappa: 2.0,
            xi: 0.3,
            rho: -0.7,
            drift: 0.07,
        }
    }
}

#[inline]
fn non_negative(x: f64) -> bool {
    x >= 0.0 && x.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_is_valid() {
        let p = HestonParams::default();
        assert!(p.validate().is_ok());
        assert_relative_eq!(p.feller_ratio(), 0.16 / 0.09, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_parameters() {
        assert_eq!(
            HestonParams::new(0.0, 0.04, 0.04, 2.0, 0.3, -0.7, 0.07),
            Err(HestonError::InvalidSpot(0.0))
        );
        assert_eq!(
            HestonParams::new(100.0, -0.01, 0.04, 2.0, 0.3, -0.7, 0.07),
            Err(HestonError::InvalidV0(-0.01))
        );
        assert_eq!(
            HestonParams::new(100.0, 0.04, 0.04, -1.0, 0.3, -0.7, 0.07),
            Err(HestonError::InvalidKappa(-1.0))
        );
        assert_eq!(
            HestonParams::new(100.0, 0.04, 0.04, 2.0, 0.3, 1.01, 0.07),
            Err(HestonError::InvalidRho(1.01))
        );
        assert!(matches!(
            HestonParams::new(100.0, 0.04, f64::NAN, 2.0, 0.3, -0.7, 0.07),
            Err(HestonError::InvalidTheta(_))
        ));
        assert!(matches!(
            HestonParams::new(100.0, 0.04, 0.04, 2.0, f64::INFINITY, -0.7, 0.07),
            Err(HestonError::InvalidXi(_))
        ));
        assert!(matches!(
            HestonParams::new(100.0, 0.04, 0.04, 2.0, 0.3, f64::NAN, 0.07),
            Err(HestonError::InvalidRho(_))
        ));
        assert!(matches!(
            HestonParams::new(100.0, 0.04, 0.04, 2.0, 0.3, -0.7, f64::NAN),
            Err(HestonError::InvalidDrift(_))
        ));
    }

    #[test]
    fn test_boundary_parameters_accepted() {
        assert!(HestonParams::new(100.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0).is_ok());
        assert!(HestonParams::new(100.0, 0.04, 0.04, 2.0, 0.3, 1.0, -0.1).is_ok());
    }

    #[test]
    fn test_error_converts_to_invalid_parameter() {
        let err: SurfaceError = HestonError::InvalidRho(2.0).into();
        assert!(err.is_invalid_parameter());
        assert!(err.to_string().contains("rho = 2"));
    }

    #[test]
    fn test_feller_ratio_zero_xi() {
        let p = HestonParams::new(100.0, 0.04, 0.04, 2.0, 0.0, 0.0, 0.0).unwrap();
        assert!(p.feller_ratio().is_infinite());
        assert!(p.satisfies_feller());
    }

    #[test]
    fn test_step_without_noise_follows_drift() {
        let p = HestonParams::default();
        let dt = 0.01;
        let (s, v) = p.full_truncation_step(100.0, 0.09, dt, 0.0, 0.0);

        assert_relative_eq!(v, 0.09 + 2.0 * (0.04 - 0.09) * dt, epsilon = 1e-15);
        assert_relative_eq!(s, 100.0 * ((0.07 - 0.045) * dt).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_negative_variance_is_truncated() {
        let p = HestonParams::default();
        // A large negative shock drives the raw update below zero
        let (_, v) = p.full_truncation_step(100.0, 0.01, 0.01, 0.0, -5.0);
        assert_eq!(v, 0.0);
    }

    #[test]
    fn test_zero_variance_has_no_diffusion() {
        let p = HestonParams::default();
        let dt = 1.0 / 252.0;

        let (s_up, v_up) = p.full_truncation_step(100.0, 0.0, dt, 3.0, 3.0);
        let (s_down, v_down) = p.full_truncation_step(100.0, 0.0, dt, -3.0, -3.0);

        assert_eq!(s_up, s_down);
        assert_eq!(v_up, v_down);
        assert_relative_eq!(s_up, 100.0 * (0.07 * dt).exp(), epsilon = 1e-12);
        assert_relative_eq!(v_up, 2.0 * 0.04 * dt, epsilon = 1e-15);
    }

    #[test]
    fn test_negative_input_variance_uses_floor() {
        let p = HestonParams::default();
        let dt = 0.01;
        let (s, v) = p.full_truncation_step(50.0, -0.02, dt, 1.0, 1.0);

        // Drift uses V⁺ = 0, but the level keeps the raw value
        assert_relative_eq!(v, (-0.02 + 2.0 * 0.04 * dt).max(0.0), epsilon = 1e-15);
        assert_relative_eq!(s, 50.0 * (0.07 * dt).exp(), epsilon = 1e-12);
    }
}
