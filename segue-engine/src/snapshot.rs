//! Committed-snapshot persistence
//!
//! The reducer emits `PersistCommittedSnapshot` whenever the engine
//! confirms playback; a repository keeps the latest snapshot so a fresh
//! store can be hydrated with the last confirmed track instead of an empty
//! state. The storage backend is the integrating caller's choice.

use crate::effects::EffectSink;
use crate::state::TransitionEffect;
use segue_common::model::CommittedPlaybackSnapshot;
use std::sync::{Arc, Mutex};

/// Stores the most recent engine-confirmed playback
pub trait CommittedSnapshotRepository: Send + Sync {
    fn read(&self) -> Option<CommittedPlaybackSnapshot>;
    fn write(&self, snapshot: CommittedPlaybackSnapshot);
}

/// Repository backed by a single in-memory slot
#[derive(Default)]
pub struct InMemorySnapshotRepository {
    slot: Mutex<Option<CommittedPlaybackSnapshot>>,
}

impl InMemorySnapshotRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommittedSnapshotRepository for InMemorySnapshotRepository {
    fn read(&self) -> Option<CommittedPlaybackSnapshot> {
        self.slot.lock().expect("snapshot slot poisoned").clone()
    }

    fn write(&self, snapshot: CommittedPlaybackSnapshot) {
        *self.slot.lock().expect("snapshot slot poisoned") = Some(snapshot);
    }
}

/// Sink adapter that routes snapshot effects into a repository
///
/// `PersistCommittedSnapshot` effects are written to the repository; every
/// other effect is forwarded to the inner sink untouched.
pub struct SnapshotPersistingSink<S: EffectSink> {
    repository: Arc<dyn CommittedSnapshotRepository>,
    inner: S,
}

impl<S: EffectSink> SnapshotPersistingSink<S> {
    pub fn new(repository: Arc<dyn CommittedSnapshotRepository>, inner: S) -> Self {
        Self { repository, inner }
    }
}

impl<S: EffectSink> EffectSink for SnapshotPersistingSink<S> {
    fn deliver(&self, effect: TransitionEffect) {
        match effect {
            TransitionEffect::PersistCommittedSnapshot(snapshot) => {
                self.repository.write(snapshot);
            }
            other => self.inner.deliver(other),
        }
    }
}
