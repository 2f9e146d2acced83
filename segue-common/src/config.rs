//! Runtime tuning for transition reconciliation
//!
//! Thresholds and multipliers for the progress sync policy plus the
//! directional motion vectors. One instance per engine, passed by value at
//! construction time; these are not global parameters.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Tunable constants for progress sync and directional motion
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransitionTuning {
    /// Drift at or below this is imperceptible; keep the predicted position
    pub soft_catch_up_threshold_ms: u64,
    /// Drift above this is corrected with an immediate snap
    pub hard_snap_threshold_ms: u64,
    /// Maximum time the predicted position may run ahead of its anchor
    pub max_extrapolation_ms: u64,
    /// Playback-rate multiplier while catching up to a reported position ahead
    pub catch_up_speed_up: f32,
    /// Playback-rate multiplier while waiting for a reported position behind
    pub catch_up_slow_down: f32,
    /// Motion vector for a forward (next-track) transition
    pub vector_next: f32,
    /// Motion vector for a backward (previous-track) transition
    pub vector_previous: f32,
}

impl Default for TransitionTuning {
    fn default() -> Self {
        Self {
            soft_catch_up_threshold_ms: 100,
            hard_snap_threshold_ms: 500,
            max_extrapolation_ms: 500,
            catch_up_speed_up: 1.05,
            catch_up_slow_down: 0.95,
            vector_next: -1.0,
            vector_previous: 1.0,
        }
    }
}

impl TransitionTuning {
    /// Load tuning from a TOML file, with defaults for absent keys
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let tuning: TransitionTuning = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid tuning file {:?}: {}", path, e)))?;
        tuning.validate()?;
        tracing::debug!(?path, "loaded transition tuning");
        Ok(tuning)
    }

    /// Reject values the sync policy cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.soft_catch_up_threshold_ms >= self.hard_snap_threshold_ms {
            return Err(Error::Config(format!(
                "soft_catch_up_threshold_ms ({}) must be below hard_snap_threshold_ms ({})",
                self.soft_catch_up_threshold_ms, self.hard_snap_threshold_ms
            )));
        }
        if self.catch_up_speed_up <= 1.0 {
            return Err(Error::Config(format!(
                "catch_up_speed_up ({}) must be above 1.0",
                self.catch_up_speed_up
            )));
        }
        if self.catch_up_slow_down <= 0.0 || self.catch_up_slow_down >= 1.0 {
            return Err(Error::Config(format!(
                "catch_up_slow_down ({}) must be between 0.0 and 1.0",
                self.catch_up_slow_down
            )));
        }
        Ok(())
    }
}
