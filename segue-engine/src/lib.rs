//! # Segue Transition Engine (segue-engine)
//!
//! Optimistic track-transition reconciliation for a remote playback engine.
//!
//! **Purpose:** Let a playback UI react instantly to a user-issued track
//! change, then reconcile that optimistic state against asynchronous,
//! possibly out-of-order, possibly failing engine confirmations.
//!
//! **Architecture:** A pure reducer driven by a single-writer store.
//! Producers (user input, engine callbacks, animation callbacks) dispatch
//! intents concurrently; the store serializes them into one admission
//! order, and equality-based correlation-key fencing makes the last intent
//! win no matter when older confirmations resolve. Effects leave the store
//! through an injected sink, with an idempotent wrapper guaranteeing
//! at-most-once delivery per effect identity.
//!
//! This crate performs no network I/O, schedules no timeouts, and renders
//! nothing; those concerns live with the protocol and presentation layers.

pub mod animation;
pub mod effects;
pub mod error;
pub mod handoff;
pub mod progress;
pub mod reducer;
pub mod snapshot;
pub mod state;
pub mod store;

pub use error::{Error, Result};
pub use store::TransitionStore;
