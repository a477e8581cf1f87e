//! Core trajectory data types read from a training directory.
//!
//! A [`Trajectory`] is one rollout of the flow-control policy as recorded by the
//! training library. An [`Episode`] groups the trajectories produced by one
//! training iteration.

use serde::{Deserialize, Serialize};

/// Episode index as used in artifact file names.
pub type EpisodeIndex = u32;

// ---------------------------------------------------------------------------
// Single trajectory
// ---------------------------------------------------------------------------

/// One rollout: per-control-step experience plus auxiliary force series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// Observed states, one vector of pressure sensor readings per control step.
    pub states: Vec<Vec<f64>>,
    /// Sampled control actions (angular velocity in rad/s).
    pub actions: Vec<f64>,
    /// Reward received after each control step.
    pub rewards: Vec<f64>,
    /// Drag coefficient series.
    #[serde(default)]
    pub cd: Vec<f64>,
    /// Lift coefficient series.
    #[serde(default)]
    pub cl: Vec<f64>,
    /// Beta distribution parameters of the policy, when recorded.
    #[serde(default)]
    pub policy: Option<BetaParams>,
    /// Simulated time of each control step, when recorded.
    #[serde(default)]
    pub time: Option<Vec<f64>>,
}

/// Per-step parameters of the Beta distribution the actions were sampled from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetaParams {
    pub alpha: Vec<f64>,
    pub beta: Vec<f64>,
}

impl Trajectory {
    /// Number of control steps.
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// Total accumulated reward.
    pub fn total_reward(&self) -> f64 {
        self.rewards.iter().sum()
    }

    /// Average reward per control step (0.0 for an empty trajectory).
    pub fn mean_reward(&self) -> f64 {
        if self.rewards.is_empty() {
            return 0.0;
        }
        self.total_reward() / self.rewards.len() as f64
    }
}

// ---------------------------------------------------------------------------
// Episode
// ---------------------------------------------------------------------------

/// All valid trajectories of one training episode.
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub index: EpisodeIndex,
    pub trajectories: Vec<Trajectory>,
    /// Number of records in the file that failed validation.
    pub malformed: usize,
}

impl Episode {
    pub fn new(index: EpisodeIndex, trajectories: Vec<Trajectory>) -> Self {
        Self {
            index,
            trajectories,
            malformed: 0,
        }
    }

    /// Number of valid trajectories.
    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_trajectory(rewards: &[f64]) -> Trajectory {
        Trajectory {
            states: vec![vec![0.0]; rewards.len()],
            actions: vec![0.0; rewards.len()],
            rewards: rewards.to_vec(),
            cd: Vec::new(),
            cl: Vec::new(),
            policy: None,
            time: None,
        }
    }

    #[test]
    fn test_reward_reductions() {
        let t = make_trajectory(&[1.0, 2.0, 3.0, 6.0]);
        assert_eq!(t.len(), 4);
        assert!((t.total_reward() - 12.0).abs() < 1e-12);
        assert!((t.mean_reward() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_trajectory_mean_is_zero() {
        let t = make_trajectory(&[]);
        assert!(t.is_empty());
        assert_eq!(t.mean_reward(), 0.0);
    }

    #[test]
    fn test_episode_counts() {
        let ep = Episode::new(3, vec![make_trajectory(&[1.0]), make_trajectory(&[2.0])]);
        assert_eq!(ep.index, 3);
        assert_eq!(ep.len(), 2);
        assert_eq!(ep.malformed, 0);
    }
}
