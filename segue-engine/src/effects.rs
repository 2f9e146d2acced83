//! Effect delivery and idempotent dispatch
//!
//! The store forwards effects through an injected `EffectSink`. Wrapping a
//! sink in `IdempotentEffectSink` guarantees at-most-once delivery per
//! effect identity for the wrapper's lifetime; duplicate deliveries are a
//! defined no-op, not an error. Callers clear or recreate the wrapper at
//! session boundaries to bound the delivered-token set.

use crate::state::TransitionEffect;
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::debug;

/// Receives effects emitted by the store, in reduction order
///
/// Injected capability: the protocol layer supplies a sink that translates
/// `CommandEngine` into remote requests, routes metrics, and so on. Sinks
/// are expected to enqueue rather than block; the store calls `deliver`
/// synchronously on its admission task.
pub trait EffectSink: Send + Sync {
    fn deliver(&self, effect: TransitionEffect);
}

impl<F> EffectSink for F
where
    F: Fn(TransitionEffect) + Send + Sync,
{
    fn deliver(&self, effect: TransitionEffect) {
        self(effect)
    }
}

impl TransitionEffect {
    /// Identity under which at-most-once delivery is enforced
    pub fn idempotency_token(&self) -> String {
        match self {
            TransitionEffect::CommandEngine {
                correlation_key,
                command,
                ..
            } => format!("engine:{}:{}", correlation_key.token(), command),
            TransitionEffect::EmitMetric {
                correlation_key,
                name,
            } => format!("metric:{}:{}", correlation_key.token(), name),
            TransitionEffect::PersistCommittedSnapshot(snapshot) => format!(
                "snapshot:{}:{}:{}:{}",
                snapshot.session_id,
                snapshot.queue_version,
                snapshot.track.id,
                snapshot.anchor_position_ms
            ),
        }
    }
}

/// Wraps a sink so the same effect is never delivered twice
pub struct IdempotentEffectSink<S: EffectSink> {
    delegate: S,
    delivered: Mutex<HashSet<String>>,
}

impl<S: EffectSink> IdempotentEffectSink<S> {
    pub fn new(delegate: S) -> Self {
        Self {
            delegate,
            delivered: Mutex::new(HashSet::new()),
        }
    }

    /// Forget all delivered tokens
    ///
    /// Called at session boundaries; the token set otherwise grows for the
    /// lifetime of the wrapper.
    pub fn clear(&self) {
        self.delivered
            .lock()
            .expect("idempotency ledger poisoned")
            .clear();
    }
}

impl<S: EffectSink> EffectSink for IdempotentEffectSink<S> {
    fn deliver(&self, effect: TransitionEffect) {
        let token = effect.idempotency_token();
        let newly_marked = self
            .delivered
            .lock()
            .expect("idempotency ledger poisoned")
            .insert(token.clone());
        if newly_marked {
            self.delegate.deliver(effect);
        } else {
            debug!(%token, "suppressing duplicate effect delivery");
        }
    }
}
