//! Error types for segue-engine
//!
//! Stale inputs are not errors (the reducer drops them silently); the
//! variants here cover genuine contract violations and lifecycle failures.

use thiserror::Error;

/// Main error type for the transition engine
#[derive(Error, Debug)]
pub enum Error {
    /// The integrating caller fed the reducer a state whose displayed track
    /// was not sourced from the committed or optimistic track. This is a
    /// defect in the caller, never repaired by the engine.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Dispatch attempted after the store shut down
    #[error("Transition store is closed")]
    StoreClosed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience Result type using segue-engine Error
pub type Result<T> = std::result::Result<T, Error>;
