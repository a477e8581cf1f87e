//! Error taxonomy for the evaluation pipeline.
//!
//! Per-file and per-trajectory errors ([`EvalError::MissingFile`],
//! [`EvalError::Unreadable`], [`EvalError::MalformedTrajectory`]) are
//! recovered by the pipeline: logged, counted and excluded. Only
//! [`EvalError::NoEpisodes`] and configuration/report errors reach the caller.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("episode {index}: observations file not found at {}", path.display())]
    MissingFile { index: u32, path: PathBuf },

    #[error("episode {index}: cannot read {}: {reason}", path.display())]
    Unreadable {
        index: u32,
        path: PathBuf,
        reason: String,
    },

    #[error("episode {index}, trajectory {position}: {reason}")]
    MalformedTrajectory {
        index: u32,
        position: usize,
        reason: String,
    },

    #[error("no episode has enough valid trajectories to select a policy")]
    NoEpisodes,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EvalError {
    /// Whether the pipeline skips past this error instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EvalError::MissingFile { .. }
                | EvalError::Unreadable { .. }
                | EvalError::MalformedTrajectory { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let missing = EvalError::MissingFile {
            index: 2,
            path: PathBuf::from("observations_2.json"),
        };
        let malformed = EvalError::MalformedTrajectory {
            index: 0,
            position: 1,
            reason: "missing field `rewards`".into(),
        };
        assert!(missing.is_recoverable());
        assert!(malformed.is_recoverable());
        assert!(!EvalError::NoEpisodes.is_recoverable());
        assert!(!EvalError::Config("bad".into()).is_recoverable());
    }

    #[test]
    fn test_display_names_episode() {
        let err = EvalError::MissingFile {
            index: 7,
            path: PathBuf::from("run/observations_7.json"),
        };
        let msg = err.to_string();
        assert!(msg.contains("episode 7"));
        assert!(msg.contains("observations_7.json"));
    }
}
