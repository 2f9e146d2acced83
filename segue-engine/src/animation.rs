//! Per-transition animation session and directional motion policy
//!
//! The presentation layer creates one `TransitionAnimationSession` per
//! accepted transition and drops it when presenting that transition's
//! outcome finishes. The session's once-only gates absorb presentation
//! frameworks that invoke completion callbacks more than once.
//!
//! `DirectionalVectorPolicy` maps (phase, direction) to a motion vector and
//! field-reveal order. It consumes reducer state but never influences it.

use segue_common::config::TransitionTuning;
use segue_common::model::{CorrelationKey, TransitionDirection, TransitionTrack, UiPhase};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Text fields revealed in cascade during a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCascadeField {
    Track,
    Artist,
    Album,
}

/// Motion descriptor for one (phase, direction) pairing
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalMotion {
    /// Horizontal motion vector; sign encodes the travel direction
    pub vector: f32,
    /// Order in which text fields are revealed
    pub cascade: [TextCascadeField; 3],
}

/// Maps transition phase and direction to a motion descriptor
#[derive(Debug, Clone)]
pub struct DirectionalVectorPolicy {
    vector_next: f32,
    vector_previous: f32,
}

const FORWARD_CASCADE: [TextCascadeField; 3] = [
    TextCascadeField::Track,
    TextCascadeField::Artist,
    TextCascadeField::Album,
];

const BACKWARD_CASCADE: [TextCascadeField; 3] = [
    TextCascadeField::Album,
    TextCascadeField::Artist,
    TextCascadeField::Track,
];

impl DirectionalVectorPolicy {
    pub fn new(tuning: &TransitionTuning) -> Self {
        Self {
            vector_next: tuning.vector_next,
            vector_previous: tuning.vector_previous,
        }
    }

    /// Resolve the motion for the requested direction in the given phase
    ///
    /// During `RollingBack` the motion for the requested direction is
    /// inverted: a rollback of a forward transition visually plays as a
    /// backward one, independent of the stored direction value.
    pub fn resolve(&self, phase: UiPhase, direction: TransitionDirection) -> DirectionalMotion {
        let forward = self.resolve_forward(direction);
        match phase {
            UiPhase::RollingBack => {
                let mut cascade = forward.cascade;
                cascade.reverse();
                DirectionalMotion {
                    vector: -forward.vector,
                    cascade,
                }
            }
            UiPhase::Stable | UiPhase::OptimisticMorphing | UiPhase::AwaitingEngine => forward,
        }
    }

    fn resolve_forward(&self, direction: TransitionDirection) -> DirectionalMotion {
        match direction {
            TransitionDirection::Next | TransitionDirection::Unknown => DirectionalMotion {
                vector: self.vector_next,
                cascade: FORWARD_CASCADE,
            },
            TransitionDirection::Previous => DirectionalMotion {
                vector: self.vector_previous,
                cascade: BACKWARD_CASCADE,
            },
        }
    }
}

impl Default for DirectionalVectorPolicy {
    fn default() -> Self {
        Self::new(&TransitionTuning::default())
    }
}

/// Descriptor of one in-flight transition's presentation
///
/// Each distinct gate (the handoff gate, or a per-field id such as
/// `"track"`) fires its closure on the first call only; repeats return
/// false and run nothing. The gate ledger lives and dies with the session
/// instance, so dropping the session at presentation end is the reset.
#[derive(Debug)]
pub struct TransitionAnimationSession {
    pub session_id: u64,
    pub key: CorrelationKey,
    pub phase: UiPhase,
    pub direction: TransitionDirection,
    pub target_track: TransitionTrack,
    pub started_at_ms: u64,
    handoff_committed: AtomicBool,
    committed_fields: Mutex<HashSet<String>>,
}

impl TransitionAnimationSession {
    pub fn new(
        session_id: u64,
        key: CorrelationKey,
        phase: UiPhase,
        direction: TransitionDirection,
        target_track: TransitionTrack,
        started_at_ms: u64,
    ) -> Self {
        Self {
            session_id,
            key,
            phase,
            direction,
            target_track,
            started_at_ms,
            handoff_committed: AtomicBool::new(false),
            committed_fields: Mutex::new(HashSet::new()),
        }
    }

    /// Run `action` on the first handoff commit only
    pub fn commit_handoff_once(&self, action: impl FnOnce()) -> bool {
        if self
            .handoff_committed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        action();
        true
    }

    /// Run `action` on the first commit for this field id only
    pub fn commit_field_once(&self, field_id: &str, action: impl FnOnce()) -> bool {
        let newly_added = self
            .committed_fields
            .lock()
            .expect("field ledger poisoned")
            .insert(field_id.to_string());
        if !newly_added {
            return false;
        }
        action();
        true
    }
}
