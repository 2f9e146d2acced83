//! Single-writer transition store
//!
//! All intents are serialized through one mailbox and applied by a single
//! admission task, so the reducer only ever sees one intent at a time,
//! consistent with the previously committed state. Dispatch order equals
//! apply order within one store instance; there is no cross-store or
//! wall-clock ordering guarantee. Effects are forwarded to the sink
//! strictly after the new state is published.

use crate::effects::EffectSink;
use crate::error::{Error, Result};
use crate::handoff::HandoffGate;
use crate::reducer;
use crate::state::{TrackTransitionState, TransitionIntent};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Owns the authoritative state for one playback session
///
/// Create with [`TransitionStore::spawn`], feed intents with `dispatch`,
/// observe state through `subscribe`, and stop with `shutdown`. One store
/// per session; a reconnect replaces the store rather than repairing it.
pub struct TransitionStore {
    intent_tx: Mutex<Option<mpsc::UnboundedSender<TransitionIntent>>>,
    state_rx: watch::Receiver<TrackTransitionState>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TransitionStore {
    /// Start the admission task with the given initial state and sink
    pub fn spawn(initial_state: TrackTransitionState, sink: Arc<dyn EffectSink>) -> Self {
        let (intent_tx, mut intent_rx) = mpsc::unbounded_channel::<TransitionIntent>();
        let (state_tx, state_rx) = watch::channel(initial_state);

        let task = tokio::spawn(async move {
            while let Some(intent) = intent_rx.recv().await {
                let previous = state_tx.borrow().clone();
                match reducer::reduce(&previous, intent) {
                    Ok(reduction) => {
                        debug!(phase = ?reduction.state.phase, "applied intent");
                        // Publish first, deliver after: side channels reading
                        // the snapshot never observe effects from a state
                        // they cannot see yet.
                        state_tx.send_replace(reduction.state);
                        for effect in reduction.effects {
                            sink.deliver(effect);
                        }
                    }
                    Err(e) => {
                        // Contract violation by the integrating caller.
                        // Fatal: the state must not be repaired or reused.
                        error!(error = %e, "transition store halting");
                        panic!("transition store contract violation: {e}");
                    }
                }
            }
        });

        Self {
            intent_tx: Mutex::new(Some(intent_tx)),
            state_rx,
            task: tokio::sync::Mutex::new(Some(task)),
        }
    }

    /// Admit an intent; applied strictly in dispatch order
    pub fn dispatch(&self, intent: TransitionIntent) -> Result<()> {
        let guard = self.intent_tx.lock().expect("intent sender poisoned");
        match guard.as_ref() {
            Some(tx) => tx.send(intent).map_err(|_| Error::StoreClosed),
            None => Err(Error::StoreClosed),
        }
    }

    /// Watch the state snapshot stream
    pub fn subscribe(&self) -> watch::Receiver<TrackTransitionState> {
        self.state_rx.clone()
    }

    /// Clone of the most recently committed state
    pub fn current(&self) -> TrackTransitionState {
        self.state_rx.borrow().clone()
    }

    /// Generation fence over this store's current key
    ///
    /// Hand this to side channels (e.g. a rendering pipeline) so they can
    /// ask whether their key is still the active generation before
    /// committing an irreversible action.
    pub fn handoff_gate(&self) -> HandoffGate {
        let rx = self.state_rx.clone();
        HandoffGate::new(move || rx.borrow().current_key.clone())
    }

    /// Stop admitting intents and wait for the admission task to drain
    ///
    /// Intents already dispatched are still applied; dispatch afterwards
    /// fails with `Error::StoreClosed`.
    pub async fn shutdown(&self) {
        self.intent_tx.lock().expect("intent sender poisoned").take();
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    std::panic::resume_unwind(e.into_panic());
                }
            }
        }
    }
}
