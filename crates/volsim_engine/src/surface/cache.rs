//! Smile memoisation.

use std::collections::HashMap;

use volsim_core::types::SurfaceError;
use volsim_models::models::SabrParams;

/// Exact-match key: maturity, forward and anchor vol by bit pattern, plus a
/// fingerprint of the calibration settings that produced the smile.
///
/// The fingerprint keeps smiles from differently configured assemblers
/// apart when they share one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SmileKey {
    calibration: u64,
    maturity: u64,
    forward: u64,
    anchor: u64,
}

impl SmileKey {
    /// Key for one smile request under calibration fingerprint 0.
    pub fn new(maturity: f64, forward: f64, anchor_vol: f64) -> Self {
        Self {
            calibration: 0,
            maturity: maturity.to_bits(),
            forward: forward.to_bits(),
            anchor: anchor_vol.to_bits(),
        }
    }

    /// Same request under another calibration fingerprint.
    pub fn with_calibration(mut self, fingerprint: u64) -> Self {
        self.calibration = fingerprint;
        self
    }
}

/// Per-worker cache of calibrated smiles.
///
/// Owned by a single worker, so no synchronisation. Only successful
/// calibrations are stored; a failure is recomputed (and fails again) on
/// the next request.
#[derive(Debug, Default)]
pub struct SmileCache {
    entries: HashMap<SmileKey, SabrParams>,
    hits: usize,
    misses: usize,
}

impl SmileCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached smile for `key`, or the result of `calibrate` stored under it.
    pub fn get_or_try_insert_with<F>(
        &mut self,
        key: SmileKey,
        calibrate: F,
    ) -> Result<SabrParams, SurfaceError>
    where
        F: FnOnce() -> Result<SabrParams, SurfaceError>,
    {
        if let Some(params) = self.entries.get(&key) {
            self.hits += 1;
            return Ok(*params);
        }
        self.misses += 1;
        let params = calibrate()?;
        self.entries.insert(key, params);
        Ok(params)
    }

    /// Requests served from the cache.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Requests that ran a calibration.
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Number of stored smiles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop stored smiles; hit and miss counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
