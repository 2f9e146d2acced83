//! Playback-position reconciliation
//!
//! Between engine position reports the UI extrapolates the playback
//! position locally; when a fresh report arrives this policy decides how
//! to correct the drift. Small drift is left alone, moderate drift is
//! absorbed by briefly adjusting the advance rate, and large drift snaps,
//! because a gradual correction over half a second is more noticeable
//! than a cut.

use segue_common::config::TransitionTuning;

/// How to reconcile the predicted position with a reported one
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressSyncDecision {
    /// Drift is imperceptible; keep the predicted position
    KeepPredicted { position_ms: u64 },

    /// Adjust the advance rate until predicted catches up with reported
    SoftCatchUp {
        predicted_position_ms: u64,
        target_position_ms: u64,
        speed_multiplier: f32,
    },

    /// Jump to the reported position immediately
    HardSnap { position_ms: u64 },
}

/// Reconciliation thresholds and anchored extrapolation
#[derive(Debug, Clone)]
pub struct ProgressSyncPolicy {
    soft_threshold_ms: u64,
    hard_threshold_ms: u64,
    max_extrapolation_ms: u64,
    speed_up: f32,
    slow_down: f32,
}

impl ProgressSyncPolicy {
    pub fn new(tuning: &TransitionTuning) -> Self {
        Self {
            soft_threshold_ms: tuning.soft_catch_up_threshold_ms,
            hard_threshold_ms: tuning.hard_snap_threshold_ms,
            max_extrapolation_ms: tuning.max_extrapolation_ms,
            speed_up: tuning.catch_up_speed_up,
            slow_down: tuning.catch_up_slow_down,
        }
    }

    /// Decide how to correct the drift between predicted and reported
    pub fn reconcile(&self, predicted_position_ms: u64, reported_position_ms: u64) -> ProgressSyncDecision {
        let drift = reported_position_ms as i64 - predicted_position_ms as i64;
        let absolute_drift = drift.unsigned_abs();

        if absolute_drift <= self.soft_threshold_ms {
            ProgressSyncDecision::KeepPredicted {
                position_ms: predicted_position_ms,
            }
        } else if absolute_drift <= self.hard_threshold_ms {
            let speed_multiplier = if drift > 0 { self.speed_up } else { self.slow_down };
            ProgressSyncDecision::SoftCatchUp {
                predicted_position_ms,
                target_position_ms: reported_position_ms,
                speed_multiplier,
            }
        } else {
            ProgressSyncDecision::HardSnap {
                position_ms: reported_position_ms,
            }
        }
    }

    /// Predicted position for `now`, given the last engine anchor
    ///
    /// Elapsed time is clamped so the prediction cannot run arbitrarily far
    /// ahead while no fresh anchor arrives.
    pub fn extrapolate(
        &self,
        anchor_position_ms: u64,
        anchor_realtime_ms: u64,
        now_realtime_ms: u64,
    ) -> u64 {
        let elapsed_ms = now_realtime_ms.saturating_sub(anchor_realtime_ms);
        anchor_position_ms + elapsed_ms.min(self.max_extrapolation_ms)
    }
}

impl Default for ProgressSyncPolicy {
    fn default() -> Self {
        Self::new(&TransitionTuning::default())
    }
}
