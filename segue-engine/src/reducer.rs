//! Pure transition reducer
//!
//! `reduce` maps (state, intent) to (new state, ordered effects) with no
//! blocking and no side effects. All races between producers are resolved
//! here by equality-based correlation-key fencing: an `EngineUpdate` or
//! `AnimationCompleted` whose key is not exactly the current key is dropped
//! with zero effects, which is what makes "last intent wins" hold even when
//! older in-flight requests resolve after newer ones.

use crate::error::{Error, Result};
use crate::state::{Reduction, TrackTransitionState, TransitionEffect, TransitionIntent};
use segue_common::model::{
    CommittedPlaybackSnapshot, CorrelationKey, EngineCommand, EngineEvent, TransitionDirection,
    TransitionTrack, UiPhase,
};
use tracing::debug;

/// Apply one intent to the previous state
///
/// Returns `Error::InvariantViolation` when the input state's displayed
/// track is sourced from neither the committed nor the optimistic track.
/// That is a defect in the integrating caller and is fatal by contract;
/// the reducer never repairs state.
pub fn reduce(previous: &TrackTransitionState, intent: TransitionIntent) -> Result<Reduction> {
    check_invariants(previous)?;

    match intent {
        TransitionIntent::Skip {
            key,
            direction,
            target_track,
        } => Ok(on_skip(previous, key, direction, target_track)),
        TransitionIntent::EngineUpdate(event) => Ok(on_engine_event(previous, event)),
        TransitionIntent::AnimationCompleted { key } => {
            Ok(on_animation_completed(previous, key))
        }
        TransitionIntent::HydrateCommittedSnapshot(snapshot) => {
            Ok(on_hydrate(previous, snapshot))
        }
    }
}

fn on_skip(
    previous: &TrackTransitionState,
    key: CorrelationKey,
    direction: TransitionDirection,
    target_track: TransitionTrack,
) -> Reduction {
    let command = match direction {
        TransitionDirection::Next => EngineCommand::SkipNext,
        TransitionDirection::Previous => EngineCommand::SkipPrevious,
        TransitionDirection::Unknown => EngineCommand::PlayTrack,
    };

    // A skip is accepted in every phase. It supersedes whatever transition
    // was mid-flight: the count resets to 1, it never accumulates.
    let state = TrackTransitionState {
        current_key: key.clone(),
        committed_track: previous.committed_track.clone(),
        display_track: Some(target_track.clone()),
        optimistic_track: Some(target_track.clone()),
        phase: UiPhase::OptimisticMorphing,
        transition_direction: direction,
        audio_ready: false,
        active_transition_count: 1,
    };

    Reduction {
        state,
        effects: vec![TransitionEffect::CommandEngine {
            correlation_key: key,
            command,
            track: target_track,
        }],
    }
}

fn on_engine_event(previous: &TrackTransitionState, event: EngineEvent) -> Reduction {
    if event.key().is_stale(&previous.current_key) {
        debug!(
            event_key = %event.key(),
            current_key = %previous.current_key,
            "dropping stale engine event"
        );
        return Reduction::unchanged(previous);
    }

    match event {
        EngineEvent::Buffering { track, .. } => {
            // Fill an empty display so the UI has something to show while
            // the engine buffers; never overwrite an optimistic choice.
            let state = TrackTransitionState {
                display_track: previous.display_track.clone().or_else(|| Some(track.clone())),
                optimistic_track: previous.optimistic_track.clone().or(Some(track)),
                audio_ready: false,
                ..previous.clone()
            };
            Reduction {
                state,
                effects: Vec::new(),
            }
        }

        EngineEvent::Playing {
            key,
            track,
            anchor_position_ms,
            anchor_realtime_ms,
        } => {
            let state = TrackTransitionState {
                committed_track: Some(track.clone()),
                display_track: Some(track.clone()),
                optimistic_track: None,
                phase: UiPhase::Stable,
                transition_direction: TransitionDirection::Unknown,
                audio_ready: true,
                active_transition_count: 0,
                ..previous.clone()
            };

            let snapshot = CommittedPlaybackSnapshot {
                session_id: key.session_id,
                queue_version: key.queue_version,
                track,
                anchor_position_ms,
                anchor_realtime_ms,
            };
            Reduction {
                state,
                effects: vec![
                    TransitionEffect::PersistCommittedSnapshot(snapshot),
                    TransitionEffect::EmitMetric {
                        correlation_key: key,
                        name: "track_transition_playing_confirmed".to_string(),
                    },
                ],
            }
        }

        EngineEvent::Error { key, failure, .. } => {
            // The committed track is never changed by a failure; the display
            // reverts to it while the rollback animation plays out.
            let state = TrackTransitionState {
                display_track: previous.committed_track.clone(),
                optimistic_track: None,
                phase: UiPhase::RollingBack,
                audio_ready: false,
                active_transition_count: 1,
                ..previous.clone()
            };
            Reduction {
                state,
                effects: vec![TransitionEffect::EmitMetric {
                    correlation_key: key,
                    name: format!("track_transition_rollback_{}", failure.category.as_str()),
                }],
            }
        }
    }
}

fn on_animation_completed(previous: &TrackTransitionState, key: CorrelationKey) -> Reduction {
    if key.is_stale(&previous.current_key) || previous.phase != UiPhase::OptimisticMorphing {
        debug!(
            %key,
            phase = ?previous.phase,
            "dropping animation completion"
        );
        return Reduction::unchanged(previous);
    }

    // The UI already shows the target; only confirmation is pending.
    let state = TrackTransitionState {
        phase: UiPhase::AwaitingEngine,
        active_transition_count: 0,
        ..previous.clone()
    };
    Reduction {
        state,
        effects: Vec::new(),
    }
}

fn on_hydrate(previous: &TrackTransitionState, snapshot: CommittedPlaybackSnapshot) -> Reduction {
    let state = TrackTransitionState {
        current_key: CorrelationKey {
            session_id: snapshot.session_id,
            queue_version: snapshot.queue_version,
            intent_id: previous.current_key.intent_id,
        },
        committed_track: Some(snapshot.track.clone()),
        display_track: Some(snapshot.track),
        optimistic_track: None,
        phase: UiPhase::Stable,
        transition_direction: TransitionDirection::Unknown,
        audio_ready: true,
        active_transition_count: 0,
    };
    Reduction {
        state,
        effects: Vec::new(),
    }
}

fn check_invariants(state: &TrackTransitionState) -> Result<()> {
    if let Some(display) = &state.display_track {
        let matches_committed = Some(display) == state.committed_track.as_ref();
        let matches_optimistic = Some(display) == state.optimistic_track.as_ref();
        if !matches_committed && !matches_optimistic {
            return Err(Error::InvariantViolation(format!(
                "display_track {:?} sourced from neither committed_track nor optimistic_track",
                display.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use segue_common::model::{
        CorrelationKey, PlaybackFailure, PlaybackFailureCategory, TransitionTrack,
    };
    use uuid::Uuid;

    fn track(id: &str) -> TransitionTrack {
        TransitionTrack {
            id: id.to_string(),
            title: format!("Title {}", id),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            image_key: None,
        }
    }

    fn key(session: Uuid, intent_id: u64) -> CorrelationKey {
        CorrelationKey::new(session, 1, intent_id)
    }

    fn playing(k: &CorrelationKey, t: &TransitionTrack) -> TransitionIntent {
        TransitionIntent::EngineUpdate(EngineEvent::Playing {
            key: k.clone(),
            track: t.clone(),
            anchor_position_ms: 0,
            anchor_realtime_ms: 0,
        })
    }

    fn skip(k: &CorrelationKey, t: &TransitionTrack) -> TransitionIntent {
        TransitionIntent::Skip {
            key: k.clone(),
            direction: TransitionDirection::Next,
            target_track: t.clone(),
        }
    }

    #[test]
    fn test_skip_from_any_state_enters_optimistic_morphing() {
        let session = Uuid::new_v4();
        let initial = TrackTransitionState::initial(session);
        let k = key(session, 1);
        let target = track("track_b");

        let reduction = reduce(&initial, skip(&k, &target)).unwrap();
        let state = reduction.state;

        assert_eq!(state.current_key, k);
        assert_eq!(state.phase, UiPhase::OptimisticMorphing);
        assert_eq!(state.transition_direction, TransitionDirection::Next);
        assert_eq!(state.display_track, Some(target.clone()));
        assert_eq!(state.optimistic_track, Some(target.clone()));
        assert_eq!(state.active_transition_count, 1);
        assert!(!state.audio_ready);
        assert_eq!(
            reduction.effects,
            vec![TransitionEffect::CommandEngine {
                correlation_key: k,
                command: EngineCommand::SkipNext,
                track: target,
            }]
        );
    }

    #[test]
    fn test_skip_direction_command_mapping() {
        let session = Uuid::new_v4();
        let initial = TrackTransitionState::initial(session);
        let target = track("t");

        for (direction, command) in [
            (TransitionDirection::Next, EngineCommand::SkipNext),
            (TransitionDirection::Previous, EngineCommand::SkipPrevious),
            (TransitionDirection::Unknown, EngineCommand::PlayTrack),
        ] {
            let reduction = reduce(
                &initial,
                TransitionIntent::Skip {
                    key: key(session, 1),
                    direction,
                    target_track: target.clone(),
                },
            )
            .unwrap();
            assert_eq!(reduction.effects.len(), 1);
            match &reduction.effects[0] {
                TransitionEffect::CommandEngine { command: c, .. } => assert_eq!(*c, command),
                other => panic!("expected CommandEngine, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_skip_resets_transition_count_mid_flight() {
        let session = Uuid::new_v4();
        let initial = TrackTransitionState::initial(session);

        let first = reduce(&initial, skip(&key(session, 1), &track("b"))).unwrap();
        assert_eq!(first.state.active_transition_count, 1);

        // A second skip while the first is mid-flight resets to 1
        let second = reduce(&first.state, skip(&key(session, 2), &track("c"))).unwrap();
        assert_eq!(second.state.active_transition_count, 1);
        assert_eq!(second.state.current_key, key(session, 2));
    }

    #[test]
    fn test_stale_engine_update_is_dropped_without_effects() {
        let session = Uuid::new_v4();
        let initial = TrackTransitionState::initial(session);
        let accepted = reduce(&initial, skip(&key(session, 2), &track("c")))
            .unwrap()
            .state;

        let stale = playing(&key(session, 1), &track("b"));
        let reduction = reduce(&accepted, stale).unwrap();
        assert_eq!(reduction.state, accepted);
        assert!(reduction.effects.is_empty());
    }

    #[test]
    fn test_stale_animation_completed_is_dropped_without_effects() {
        let session = Uuid::new_v4();
        let initial = TrackTransitionState::initial(session);
        let accepted = reduce(&initial, skip(&key(session, 2), &track("c")))
            .unwrap()
            .state;

        let reduction = reduce(
            &accepted,
            TransitionIntent::AnimationCompleted {
                key: key(session, 1),
            },
        )
        .unwrap();
        assert_eq!(reduction.state, accepted);
        assert!(reduction.effects.is_empty());
    }

    #[test]
    fn test_matching_playing_commits_to_stable() {
        let session = Uuid::new_v4();
        let initial = TrackTransitionState::initial(session);
        let k = key(session, 1);
        let target = track("track_b");
        let morphing = reduce(&initial, skip(&k, &target)).unwrap().state;

        let reduction = reduce(&morphing, playing(&k, &target)).unwrap();
        let state = reduction.state;

        assert_eq!(state.committed_track, Some(target.clone()));
        assert_eq!(state.display_track, Some(target));
        assert!(state.optimistic_track.is_none());
        assert_eq!(state.phase, UiPhase::Stable);
        assert_eq!(state.transition_direction, TransitionDirection::Unknown);
        assert!(state.audio_ready);
        assert_eq!(state.active_transition_count, 0);
    }

    #[test]
    fn test_playing_commit_effects() {
        let session = Uuid::new_v4();
        let initial = TrackTransitionState::initial(session);
        let k = key(session, 1);
        let target = track("track_b");
        let morphing = reduce(&initial, skip(&k, &target)).unwrap().state;

        let reduction = reduce(
            &morphing,
            TransitionIntent::EngineUpdate(EngineEvent::Playing {
                key: k.clone(),
                track: target.clone(),
                anchor_position_ms: 1000,
                anchor_realtime_ms: 50_000,
            }),
        )
        .unwrap();

        assert_eq!(reduction.effects.len(), 2);
        match &reduction.effects[0] {
            TransitionEffect::PersistCommittedSnapshot(snapshot) => {
                assert_eq!(snapshot.session_id, session);
                assert_eq!(snapshot.track, target);
                assert_eq!(snapshot.anchor_position_ms, 1000);
                assert_eq!(snapshot.anchor_realtime_ms, 50_000);
            }
            other => panic!("expected PersistCommittedSnapshot, got {:?}", other),
        }
        match &reduction.effects[1] {
            TransitionEffect::EmitMetric { name, .. } => {
                assert_eq!(name, "track_transition_playing_confirmed");
            }
            other => panic!("expected EmitMetric, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_order_confirmations_last_intent_wins() {
        let session = Uuid::new_v4();
        let mut state = TrackTransitionState::initial(session);
        let key1 = key(session, 1);
        let key2 = key(session, 2);
        let track_b = track("track_b");
        let track_c = track("track_c");

        for intent in [
            skip(&key1, &track_b),
            skip(&key2, &track_c),
            playing(&key1, &track_b),
            playing(&key2, &track_c),
        ] {
            state = reduce(&state, intent).unwrap().state;
        }

        assert_eq!(state.current_key, key2);
        assert_eq!(state.committed_track.as_ref().unwrap().id, "track_c");
        assert_eq!(state.display_track.as_ref().unwrap().id, "track_c");
        assert_eq!(state.phase, UiPhase::Stable);
    }

    #[test]
    fn test_matching_error_rolls_back_to_committed() {
        let session = Uuid::new_v4();
        let initial = TrackTransitionState::initial(session);

        // Commit track_a first, then fail a skip to track_b
        let key1 = key(session, 1);
        let track_a = track("track_a");
        let mut state = reduce(&initial, skip(&key1, &track_a)).unwrap().state;
        state = reduce(&state, playing(&key1, &track_a)).unwrap().state;

        let key2 = key(session, 2);
        let track_b = track("track_b");
        state = reduce(&state, skip(&key2, &track_b)).unwrap().state;

        let reduction = reduce(
            &state,
            TransitionIntent::EngineUpdate(EngineEvent::Error {
                key: key2.clone(),
                failed_track: track_b,
                failure: PlaybackFailure {
                    category: PlaybackFailureCategory::Retryable,
                    message: "stream stalled".to_string(),
                },
            }),
        )
        .unwrap();

        let rolled_back = reduction.state;
        assert_eq!(rolled_back.phase, UiPhase::RollingBack);
        assert_eq!(rolled_back.display_track, rolled_back.committed_track);
        assert_eq!(rolled_back.committed_track.as_ref().unwrap().id, "track_a");
        assert!(rolled_back.optimistic_track.is_none());
        assert_eq!(rolled_back.active_transition_count, 1);
        assert_eq!(
            reduction.effects,
            vec![TransitionEffect::EmitMetric {
                correlation_key: key2,
                name: "track_transition_rollback_retryable".to_string(),
            }]
        );
    }

    #[test]
    fn test_animation_completed_enters_awaiting_engine() {
        let session = Uuid::new_v4();
        let initial = TrackTransitionState::initial(session);
        let k = key(session, 1);
        let target = track("track_b");
        let morphing = reduce(&initial, skip(&k, &target)).unwrap().state;

        let reduction = reduce(
            &morphing,
            TransitionIntent::AnimationCompleted { key: k },
        )
        .unwrap();
        let state = reduction.state;

        assert_eq!(state.phase, UiPhase::AwaitingEngine);
        assert_eq!(state.active_transition_count, 0);
        assert_eq!(state.display_track, Some(target.clone()));
        assert_eq!(state.optimistic_track, Some(target));
        assert!(reduction.effects.is_empty());
    }

    #[test]
    fn test_animation_completed_outside_morphing_is_dropped() {
        let session = Uuid::new_v4();
        let initial = TrackTransitionState::initial(session);
        let k = key(session, 1);
        let target = track("track_b");

        // Commit first so the phase is Stable
        let mut state = reduce(&initial, skip(&k, &target)).unwrap().state;
        state = reduce(&state, playing(&k, &target)).unwrap().state;
        assert_eq!(state.phase, UiPhase::Stable);

        let reduction = reduce(
            &state,
            TransitionIntent::AnimationCompleted { key: k },
        )
        .unwrap();
        assert_eq!(reduction.state, state);
        assert!(reduction.effects.is_empty());
    }

    #[test]
    fn test_playing_after_awaiting_engine_commits() {
        let session = Uuid::new_v4();
        let initial = TrackTransitionState::initial(session);
        let k = key(session, 1);
        let target = track("track_b");

        let mut state = reduce(&initial, skip(&k, &target)).unwrap().state;
        state = reduce(&state, TransitionIntent::AnimationCompleted { key: k.clone() })
            .unwrap()
            .state;
        assert_eq!(state.phase, UiPhase::AwaitingEngine);

        state = reduce(&state, playing(&k, &target)).unwrap().state;
        assert_eq!(state.phase, UiPhase::Stable);
        assert_eq!(state.committed_track, Some(target));
    }

    #[test]
    fn test_buffering_fills_empty_display_only() {
        let session = Uuid::new_v4();
        let initial = TrackTransitionState::initial(session);
        let k = CorrelationKey::initial(session);
        let buffered = track("buffered");

        let reduction = reduce(
            &initial,
            TransitionIntent::EngineUpdate(EngineEvent::Buffering {
                key: k.clone(),
                track: buffered.clone(),
            }),
        )
        .unwrap();
        assert_eq!(reduction.state.display_track, Some(buffered.clone()));
        assert_eq!(reduction.state.optimistic_track, Some(buffered));
        assert!(!reduction.state.audio_ready);
        assert!(reduction.effects.is_empty());

        // An optimistic choice is never overwritten by a buffering event
        let k2 = key(session, 1);
        let chosen = track("chosen");
        let morphing = reduce(&initial, skip(&k2, &chosen)).unwrap().state;
        let reduction = reduce(
            &morphing,
            TransitionIntent::EngineUpdate(EngineEvent::Buffering {
                key: k2,
                track: track("other"),
            }),
        )
        .unwrap();
        assert_eq!(reduction.state.display_track, Some(chosen.clone()));
        assert_eq!(reduction.state.optimistic_track, Some(chosen));
    }

    #[test]
    fn test_hydrate_replays_snapshot() {
        let restored_session = Uuid::new_v4();
        let initial = TrackTransitionState::initial(Uuid::new_v4());
        let snapshot = CommittedPlaybackSnapshot {
            session_id: restored_session,
            queue_version: 7,
            track: track("restored"),
            anchor_position_ms: 42_000,
            anchor_realtime_ms: 1_000_000,
        };

        let reduction = reduce(
            &initial,
            TransitionIntent::HydrateCommittedSnapshot(snapshot.clone()),
        )
        .unwrap();
        let state = reduction.state;

        assert_eq!(state.current_key.session_id, restored_session);
        assert_eq!(state.current_key.queue_version, 7);
        assert_eq!(state.committed_track, Some(snapshot.track.clone()));
        assert_eq!(state.display_track, Some(snapshot.track));
        assert_eq!(state.phase, UiPhase::Stable);
        assert!(state.audio_ready);
        assert!(reduction.effects.is_empty());
    }

    #[test]
    fn test_corrupted_display_track_is_fatal() {
        let session = Uuid::new_v4();
        let mut state = TrackTransitionState::initial(session);
        state.committed_track = Some(track("a"));
        state.display_track = Some(track("rogue"));
        state.optimistic_track = Some(track("b"));

        let result = reduce(
            &state,
            TransitionIntent::AnimationCompleted {
                key: state.current_key.clone(),
            },
        );
        assert!(matches!(result, Err(Error::InvariantViolation(_))));
    }
}
