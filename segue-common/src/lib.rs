//! # Segue Common Library
//!
//! Shared vocabulary for the segue track-transition engine:
//! - Correlation keys and track value types
//! - Engine event and command types
//! - Runtime tuning configuration
//! - Common error type

pub mod config;
pub mod error;
pub mod model;

pub use config::TransitionTuning;
pub use error::{Error, Result};
