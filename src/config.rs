use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

/// Placeholder substituted with the episode index in file name templates.
pub const INDEX_PLACEHOLDER: &str = "{}";

/// Complete configuration for the evaluation pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    pub naming: NamingConfig,
    pub metrics: MetricsConfig,
    pub selection: SelectionConfig,
    pub loading: LoadingConfig,
}

/// File naming templates inside a training directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Observations file per episode (default: "observations_{}.json").
    pub observations: String,
    /// Checkpoint file per episode (default: "checkpoint_{}.pt").
    pub checkpoint: String,
    /// Traced policy file per episode (default: "policy_trace_{}.pt").
    pub traced_policy: String,
}

/// Metric extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Lower bound of the control action range in rad/s (default: -5.0).
    pub action_min: f64,
    /// Upper bound of the control action range in rad/s (default: 5.0).
    pub action_max: f64,
    /// Simulated time of the first control step (default: 0.0).
    pub start_time: f64,
    /// Simulated time between two control steps (default: 0.01).
    pub control_interval: f64,
}

/// How a single trajectory's rewards are reduced to one number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RewardEstimator {
    /// Average reward per control step.
    #[default]
    Mean,
    /// Total return over the trajectory.
    Sum,
}

/// Policy selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Per-trajectory reward reduction (default: mean).
    pub estimator: RewardEstimator,
    /// Minimum number of valid trajectories for an episode to be eligible (default: 1).
    pub min_valid_trajectories: usize,
    /// Number of ranked episodes shown in reports (default: 5).
    pub top_k: usize,
}

/// Loading settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingConfig {
    /// Load episodes on the rayon thread pool (default: false).
    pub parallel: bool,
    /// Expected number of episodes; `None` discovers the range from the directory.
    pub episodes: Option<u32>,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            observations: "observations_{}.json".into(),
            checkpoint: "checkpoint_{}.pt".into(),
            traced_policy: "policy_trace_{}.pt".into(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            action_min: -5.0,
            action_max: 5.0,
            start_time: 0.0,
            control_interval: 0.01,
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            estimator: RewardEstimator::Mean,
            min_valid_trajectories: 1,
            top_k: 5,
        }
    }
}

impl EvalConfig {
    /// Parse a configuration from JSON text. Missing sections fall back to defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        for (name, template) in [
            ("naming.observations", &self.naming.observations),
            ("naming.checkpoint", &self.naming.checkpoint),
            ("naming.traced_policy", &self.naming.traced_policy),
        ] {
            if template.matches(INDEX_PLACEHOLDER).count() != 1 {
                return Err(EvalError::Config(format!(
                    "{name} must contain exactly one `{INDEX_PLACEHOLDER}` placeholder, got {template:?}"
                )));
            }
        }

        let m = &self.metrics;
        if !(m.action_min.is_finite() && m.action_max.is_finite()) || m.action_min >= m.action_max
        {
            return Err(EvalError::Config(format!(
                "action range [{}, {}] is empty",
                m.action_min, m.action_max
            )));
        }
        if !(m.control_interval.is_finite() && m.control_interval > 0.0) {
            return Err(EvalError::Config(format!(
                "control_interval must be positive, got {}",
                m.control_interval
            )));
        }
        if self.selection.min_valid_trajectories == 0 {
            return Err(EvalError::Config(
                "min_valid_trajectories must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        EvalConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EvalConfig::from_json(
            r#"{"selection": {"estimator": "sum"}, "metrics": {"action_max": 3.0, "action_min": -3.0}}"#,
        )
        .unwrap();
        assert_eq!(config.selection.estimator, RewardEstimator::Sum);
        assert_eq!(config.selection.min_valid_trajectories, 1);
        assert!((config.metrics.action_max - 3.0).abs() < f64::EPSILON);
        assert_eq!(config.naming.observations, "observations_{}.json");
    }

    #[test]
    fn test_rejects_template_without_placeholder() {
        let mut config = EvalConfig::default();
        config.naming.observations = "observations.json".into();
        assert!(matches!(config.validate(), Err(EvalError::Config(_))));
    }

    #[test]
    fn test_rejects_empty_action_range() {
        let mut config = EvalConfig::default();
        config.metrics.action_min = 1.0;
        config.metrics.action_max = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_threshold() {
        let mut config = EvalConfig::default();
        config.selection.min_valid_trajectories = 0;
        assert!(config.validate().is_err());
    }
}
