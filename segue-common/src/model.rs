//! Core value types for track transitions
//!
//! Everything here is an immutable value: correlation keys, track payloads,
//! engine events and commands. The protocol layer normalizes its JSON-shaped
//! payloads into these types before they reach the engine; nothing in this
//! module performs I/O.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Direction of a user-issued track transition
///
/// `Unknown` is the resting value outside of any transition (initial state,
/// or after a transition settles back to stable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionDirection {
    Next,
    Previous,
    Unknown,
}

/// UI-facing phase of the transition state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiPhase {
    /// Resting: displayed track is the committed track
    Stable,
    /// Displayed track updated ahead of engine confirmation
    OptimisticMorphing,
    /// Animation finished, engine confirmation still pending
    AwaitingEngine,
    /// Confirmation failed, reverting to the committed track
    RollingBack,
}

/// Immutable track payload carried through a transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionTrack {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub image_key: Option<String>,
}

/// Identity of one user-issued transition attempt
///
/// Freshness is determined solely by field-wise equality with the state's
/// current key. There is deliberately no ordering relation: a reconnect
/// produces a new `session_id`, which invalidates every previously issued
/// key without any numeric comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationKey {
    pub session_id: Uuid,
    pub queue_version: u64,
    pub intent_id: u64,
}

impl CorrelationKey {
    pub fn new(session_id: Uuid, queue_version: u64, intent_id: u64) -> Self {
        Self {
            session_id,
            queue_version,
            intent_id,
        }
    }

    /// Zero key for a freshly created session
    pub fn initial(session_id: Uuid) -> Self {
        Self::new(session_id, 0, 0)
    }

    /// A key is stale when it is not exactly the current key
    pub fn is_stale(&self, current: &CorrelationKey) -> bool {
        self != current
    }

    /// Stable string form, used for idempotency tokens and log lines
    pub fn token(&self) -> String {
        format!("{}:{}:{}", self.session_id, self.queue_version, self.intent_id)
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Issues correlation keys with a monotonically increasing intent counter
///
/// Session id and queue version are read from the providers at issue time,
/// so a reconnect (new session id) automatically fences off older keys.
pub struct CorrelationKeyFactory {
    session_id: Box<dyn Fn() -> Uuid + Send + Sync>,
    queue_version: Box<dyn Fn() -> u64 + Send + Sync>,
    counter: AtomicU64,
}

impl CorrelationKeyFactory {
    pub fn new(
        session_id: impl Fn() -> Uuid + Send + Sync + 'static,
        queue_version: impl Fn() -> u64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            session_id: Box::new(session_id),
            queue_version: Box::new(queue_version),
            counter: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> CorrelationKey {
        CorrelationKey {
            session_id: (self.session_id)(),
            queue_version: (self.queue_version)(),
            intent_id: self.counter.fetch_add(1, Ordering::Relaxed) + 1,
        }
    }
}

/// Category of an engine-reported playback failure
///
/// The protocol layer maps its own timeout handling into `Timeout` failure
/// events; the engine never schedules timeouts itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackFailureCategory {
    Retryable,
    NonRetryable,
    GeoBlocked,
    Drm,
    Timeout,
}

impl PlaybackFailureCategory {
    /// Lowercase suffix used in rollback metric names
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackFailureCategory::Retryable => "retryable",
            PlaybackFailureCategory::NonRetryable => "non_retryable",
            PlaybackFailureCategory::GeoBlocked => "geo_blocked",
            PlaybackFailureCategory::Drm => "drm",
            PlaybackFailureCategory::Timeout => "timeout",
        }
    }
}

/// Engine-reported playback failure payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackFailure {
    pub category: PlaybackFailureCategory,
    pub message: String,
}

/// Command sent to the remote playback engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineCommand {
    SkipNext,
    SkipPrevious,
    PlayTrack,
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineCommand::SkipNext => "skip_next",
            EngineCommand::SkipPrevious => "skip_previous",
            EngineCommand::PlayTrack => "play_track",
        };
        write!(f, "{}", name)
    }
}

/// Asynchronous confirmation from the remote playback engine
///
/// Every variant carries the correlation key of the transition attempt it
/// answers; the engine drops any event whose key is not the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// Engine accepted the request and is buffering the track
    Buffering {
        key: CorrelationKey,
        track: TransitionTrack,
    },

    /// Engine confirmed playback, with a position anchor for extrapolation
    Playing {
        key: CorrelationKey,
        track: TransitionTrack,
        anchor_position_ms: u64,
        anchor_realtime_ms: u64,
    },

    /// Engine failed to play the requested track
    Error {
        key: CorrelationKey,
        failed_track: TransitionTrack,
        failure: PlaybackFailure,
    },
}

impl EngineEvent {
    pub fn key(&self) -> &CorrelationKey {
        match self {
            EngineEvent::Buffering { key, .. } => key,
            EngineEvent::Playing { key, .. } => key,
            EngineEvent::Error { key, .. } => key,
        }
    }
}

/// Last engine-confirmed playback, persisted across process restarts
///
/// Rehydrating this snapshot lets a fresh store show the last confirmed
/// track immediately instead of an empty state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedPlaybackSnapshot {
    pub session_id: Uuid,
    pub queue_version: u64,
    pub track: TransitionTrack,
    pub anchor_position_ms: u64,
    pub anchor_realtime_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> TransitionTrack {
        TransitionTrack {
            id: id.to_string(),
            title: format!("Title {}", id),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            image_key: None,
        }
    }

    #[test]
    fn test_key_staleness_is_exact_equality() {
        let session = Uuid::new_v4();
        let key = CorrelationKey::new(session, 3, 7);
        let same = CorrelationKey::new(session, 3, 7);
        assert!(!key.is_stale(&same));

        // Any single field mismatch makes the key stale
        assert!(key.is_stale(&CorrelationKey::new(Uuid::new_v4(), 3, 7)));
        assert!(key.is_stale(&CorrelationKey::new(session, 4, 7)));
        assert!(key.is_stale(&CorrelationKey::new(session, 3, 8)));
    }

    #[test]
    fn test_key_has_no_ordering_semantics() {
        // An older intent id is just as stale as a newer one
        let session = Uuid::new_v4();
        let current = CorrelationKey::new(session, 1, 5);
        assert!(CorrelationKey::new(session, 1, 4).is_stale(&current));
        assert!(CorrelationKey::new(session, 1, 6).is_stale(&current));
    }

    #[test]
    fn test_key_token_format() {
        let session = Uuid::nil();
        let key = CorrelationKey::new(session, 2, 9);
        assert_eq!(key.token(), format!("{}:2:9", session));
    }

    #[test]
    fn test_factory_increments_intent_id() {
        let session = Uuid::new_v4();
        let factory = CorrelationKeyFactory::new(move || session, || 5);

        let first = factory.next();
        let second = factory.next();
        assert_eq!(first.session_id, session);
        assert_eq!(first.queue_version, 5);
        assert_eq!(first.intent_id, 1);
        assert_eq!(second.intent_id, 2);
    }

    #[test]
    fn test_factory_reflects_provider_changes() {
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Arc;

        let version = Arc::new(AtomicU64::new(1));
        let reader = Arc::clone(&version);
        let session = Uuid::new_v4();
        let factory =
            CorrelationKeyFactory::new(move || session, move || reader.load(Ordering::Relaxed));

        assert_eq!(factory.next().queue_version, 1);
        version.store(2, Ordering::Relaxed);
        assert_eq!(factory.next().queue_version, 2);
    }

    #[test]
    fn test_engine_event_key_accessor() {
        let key = CorrelationKey::new(Uuid::new_v4(), 1, 1);
        let event = EngineEvent::Error {
            key: key.clone(),
            failed_track: track("t1"),
            failure: PlaybackFailure {
                category: PlaybackFailureCategory::Drm,
                message: "drm failure".to_string(),
            },
        };
        assert_eq!(event.key(), &key);
    }

    #[test]
    fn test_engine_event_serde_round_trip() {
        let event = EngineEvent::Playing {
            key: CorrelationKey::new(Uuid::new_v4(), 1, 2),
            track: track("t2"),
            anchor_position_ms: 1000,
            anchor_realtime_ms: 99_000,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Playing\""));
        let parsed: EngineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_failure_category_metric_suffix() {
        assert_eq!(PlaybackFailureCategory::NonRetryable.as_str(), "non_retryable");
        assert_eq!(PlaybackFailureCategory::Timeout.as_str(), "timeout");
    }

    #[test]
    fn test_engine_command_display() {
        assert_eq!(EngineCommand::SkipNext.to_string(), "skip_next");
        assert_eq!(EngineCommand::SkipPrevious.to_string(), "skip_previous");
        assert_eq!(EngineCommand::PlayTrack.to_string(), "play_track");
    }
}
