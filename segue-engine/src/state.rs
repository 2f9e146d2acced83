//! Transition state, intents, and effects
//!
//! `TrackTransitionState` is the single authoritative state for one playback
//! session; it is only ever mutated by the reducer through the store.
//! Intents and effects are ephemeral: intents flow in through the store's
//! mailbox, effects flow out through the effect sink, and neither is stored.

use segue_common::model::{
    CommittedPlaybackSnapshot, CorrelationKey, EngineCommand, EngineEvent, TransitionDirection,
    TransitionTrack, UiPhase,
};
use uuid::Uuid;

/// Authoritative transition state for one playback session
///
/// Invariant: `display_track`, when present, equals `committed_track` or
/// `optimistic_track`. The reducer checks this before processing any intent
/// and fails fatally on violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTransitionState {
    /// Key of the most recent transition attempt; the sole freshness fence
    pub current_key: CorrelationKey,
    /// Last track confirmed by the playback engine
    pub committed_track: Option<TransitionTrack>,
    /// Track currently presented to the user
    pub display_track: Option<TransitionTrack>,
    /// Track shown ahead of engine confirmation
    pub optimistic_track: Option<TransitionTrack>,
    pub phase: UiPhase,
    pub transition_direction: TransitionDirection,
    /// Whether the engine has confirmed audio for the displayed track
    pub audio_ready: bool,
    /// Number of transition animations in flight (0 or 1)
    pub active_transition_count: u32,
}

impl TrackTransitionState {
    /// Resting state for a freshly created session
    ///
    /// One state exists per playback session. On session end the state is
    /// reset by constructing a new one, never incrementally repaired.
    pub fn initial(session_id: Uuid) -> Self {
        Self {
            current_key: CorrelationKey::initial(session_id),
            committed_track: None,
            display_track: None,
            optimistic_track: None,
            phase: UiPhase::Stable,
            transition_direction: TransitionDirection::Unknown,
            audio_ready: false,
            active_transition_count: 0,
        }
    }
}

/// Input to the reducer; one per producer-side occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionIntent {
    /// User requested a track change
    Skip {
        key: CorrelationKey,
        direction: TransitionDirection,
        target_track: TransitionTrack,
    },

    /// Asynchronous confirmation from the playback engine
    EngineUpdate(EngineEvent),

    /// The presentation layer finished the transition animation
    AnimationCompleted { key: CorrelationKey },

    /// Replay a persisted snapshot into a fresh store
    HydrateCommittedSnapshot(CommittedPlaybackSnapshot),
}

/// Instruction produced by a reduction, delivered after the state commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionEffect {
    /// Ask the protocol layer to issue a command to the remote engine
    CommandEngine {
        correlation_key: CorrelationKey,
        command: EngineCommand,
        track: TransitionTrack,
    },

    /// Emit a counter metric
    EmitMetric {
        correlation_key: CorrelationKey,
        name: String,
    },

    /// Persist the last engine-confirmed playback
    PersistCommittedSnapshot(CommittedPlaybackSnapshot),
}

/// Result of one reduction: the new state and its ordered effects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    pub state: TrackTransitionState,
    pub effects: Vec<TransitionEffect>,
}

impl Reduction {
    /// A reduction that leaves the state untouched and emits nothing
    pub fn unchanged(state: &TrackTransitionState) -> Self {
        Self {
            state: state.clone(),
            effects: Vec::new(),
        }
    }
}
