//! flowctl: post-processing of DRL flow-control training runs.
//!
//! Reads the per-episode trajectories a training run leaves behind, extracts
//! drag, lift and expected control-action series, aggregates rewards per
//! episode and selects the best policy checkpoint for a final simulation.

pub mod config;
pub mod error;
pub mod evaluation;
pub mod report;
pub mod trajectory;

pub use error::{EvalError, Result};
