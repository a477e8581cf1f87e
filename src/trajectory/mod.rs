//! Trajectory types and loading of per-episode observations files.
//!
//! This module provides:
//! - [`types::Trajectory`], [`types::Episode`] -- the core data structures that
//!   capture what one training episode recorded.
//! - [`naming::FileTemplate`] -- episode-indexed file name templates.
//! - [`loader::EpisodeLoader`] -- lazy, ordered reading and validation of the
//!   observations files in a training directory.

pub mod loader;
pub mod naming;
pub mod types;

// Re-export the most commonly used items at the module level.
pub use loader::{parse_trajectory, EpisodeLoader, LoadedEpisode};
pub use naming::FileTemplate;
pub use types::{BetaParams, Episode, EpisodeIndex, Trajectory};
