//! Generation fence for irreversible commits
//!
//! A side channel (e.g. the rendering pipeline) holds the correlation key
//! of the transition it is presenting. Before committing an irreversible
//! action it asks the gate whether that key is still the active generation;
//! a skip or reconnect that has since superseded it makes the answer false.

use segue_common::model::CorrelationKey;

/// Answers "is this still the active generation?" at call time
pub struct HandoffGate {
    active_key: Box<dyn Fn() -> CorrelationKey + Send + Sync>,
}

impl HandoffGate {
    /// Build a gate over a provider of the currently active key
    pub fn new(active_key: impl Fn() -> CorrelationKey + Send + Sync + 'static) -> Self {
        Self {
            active_key: Box::new(active_key),
        }
    }

    /// True iff the candidate equals the provider's current value,
    /// field-wise, at call time
    pub fn can_commit(&self, candidate: &CorrelationKey) -> bool {
        (self.active_key)() == *candidate
    }
}
