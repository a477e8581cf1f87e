//! Episode-level reward aggregation.
//!
//! Each trajectory is reduced to a single reward on its own (no padding or
//! truncation across trajectories of unequal length), then the episode score is
//! the arithmetic mean over its trajectories:
//!
//!   R_episode = (1/N) * sum_i R_i,   R_i = mean_k r_ik  or  sum_k r_ik

use serde::Serialize;

use crate::config::RewardEstimator;
use crate::trajectory::types::{Episode, EpisodeIndex, Trajectory};

use super::metrics::MetricExtractor;

/// Derived per-episode aggregate used for policy selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicySummary {
    pub episode: EpisodeIndex,
    /// Mean of the per-trajectory rewards.
    pub mean_reward: f64,
    /// Population standard deviation of the per-trajectory rewards.
    pub reward_std: f64,
    /// Mean absolute expected action over all trajectories.
    pub mean_action_magnitude: f64,
    pub valid_trajectories: usize,
    pub malformed_trajectories: usize,
}

/// Reduce one trajectory's rewards with the given estimator.
pub fn trajectory_reward(trajectory: &Trajectory, estimator: RewardEstimator) -> f64 {
    match estimator {
        RewardEstimator::Mean => trajectory.mean_reward(),
        RewardEstimator::Sum => trajectory.total_reward(),
    }
}

/// Arithmetic mean; `None` when `values` is empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by N). Zero for fewer than two values.
pub fn population_std(values: &[f64]) -> f64 {
    let Some(mu) = mean(values) else {
        return 0.0;
    };
    if values.len() < 2 {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Builds a [`PolicySummary`] from the valid trajectories of an episode.
#[derive(Debug, Clone)]
pub struct RewardAggregator {
    estimator: RewardEstimator,
    extractor: MetricExtractor,
}

impl RewardAggregator {
    pub fn new(estimator: RewardEstimator, extractor: MetricExtractor) -> Self {
        Self {
            estimator,
            extractor,
        }
    }

    pub fn estimator(&self) -> RewardEstimator {
        self.estimator
    }

    /// Summarise an episode. Returns `None` when it has no valid trajectories.
    pub fn summarize(&self, episode: &Episode) -> Option<PolicySummary> {
        let rewards: Vec<f64> = episode
            .trajectories
            .iter()
            .map(|t| trajectory_reward(t, self.estimator))
            .collect();
        let mean_reward = mean(&rewards)?;

        let magnitudes: Vec<f64> = episode
            .trajectories
            .iter()
            .filter_map(|t| {
                let actions = self.extractor.expected_actions(t);
                mean(&actions.iter().map(|a| a.abs()).collect::<Vec<_>>())
            })
            .collect();

        Some(PolicySummary {
            episode: episode.index,
            mean_reward,
            reward_std: population_std(&rewards),
            mean_action_magnitude: mean(&magnitudes).unwrap_or(0.0),
            valid_trajectories: episode.len(),
            malformed_trajectories: episode.malformed,
        })
    }
}
