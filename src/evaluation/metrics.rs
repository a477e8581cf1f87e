//! Per-trajectory metric extraction.
//!
//! Turns a [`Trajectory`] into three time-indexed series: drag coefficient,
//! lift coefficient and the expected control action (angular velocity).
//!
//! The expected action at control step k is the mean of the policy's Beta
//! distribution mapped onto the action range:
//!
//!   E[omega_k] = omega_min + (omega_max - omega_min) * alpha_k / (alpha_k + beta_k)
//!
//! Trajectories recorded without distribution parameters use the sampled
//! action instead.

use serde::Serialize;

use crate::config::MetricsConfig;
use crate::trajectory::types::Trajectory;

// ---------------------------------------------------------------------------
// Time series
// ---------------------------------------------------------------------------

/// Values paired with the simulated time they were recorded at.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeSeries {
    pub time: Vec<f64>,
    pub values: Vec<f64>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Arithmetic mean, `None` for an empty series.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    /// Mean of absolute values, `None` for an empty series.
    pub fn mean_abs(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().map(|v| v.abs()).sum::<f64>() / self.values.len() as f64)
    }

    /// Root mean square, `None` for an empty series.
    pub fn rms(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let sq = self.values.iter().map(|v| v * v).sum::<f64>() / self.values.len() as f64;
        Some(sq.sqrt())
    }
}

/// The fixed metric record for one trajectory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryMetrics {
    pub drag: TimeSeries,
    pub lift: TimeSeries,
    pub action: TimeSeries,
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Stateless extractor parameterised by the action range and control timing.
#[derive(Debug, Clone)]
pub struct MetricExtractor {
    config: MetricsConfig,
}

impl MetricExtractor {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Extract drag, lift and expected action series.
    pub fn extract(&self, trajectory: &Trajectory) -> TrajectoryMetrics {
        let control_time = self.control_times(trajectory);
        let action = TimeSeries {
            time: control_time.clone(),
            values: self.expected_actions(trajectory),
        };
        let drag = TimeSeries {
            time: self.force_times(trajectory, trajectory.cd.len(), &control_time),
            values: trajectory.cd.clone(),
        };
        let lift = TimeSeries {
            time: self.force_times(trajectory, trajectory.cl.len(), &control_time),
            values: trajectory.cl.clone(),
        };
        TrajectoryMetrics { drag, lift, action }
    }

    /// Expected angular velocity at each control step.
    pub fn expected_actions(&self, trajectory: &Trajectory) -> Vec<f64> {
        match &trajectory.policy {
            Some(params) => params
                .alpha
                .iter()
                .zip(&params.beta)
                .map(|(&a, &b)| self.scale_action(beta_mean(a, b)))
                .collect(),
            None => trajectory.actions.clone(),
        }
    }

    /// Map a value in [0, 1] onto [action_min, action_max].
    pub fn scale_action(&self, unit: f64) -> f64 {
        let MetricsConfig {
            action_min,
            action_max,
            ..
        } = self.config;
        action_min + (action_max - action_min) * unit
    }

    fn control_times(&self, trajectory: &Trajectory) -> Vec<f64> {
        if let Some(time) = &trajectory.time {
            return time.clone();
        }
        uniform_axis(
            self.config.start_time,
            self.config.control_interval,
            trajectory.actions.len(),
        )
    }

    /// Force coefficients are usually written at every solver step rather than
    /// every control step. Samples matching the control step count share its
    /// time axis; anything else is spread uniformly over the control span.
    fn force_times(&self, trajectory: &Trajectory, samples: usize, control_time: &[f64]) -> Vec<f64> {
        if samples == control_time.len() {
            return control_time.to_vec();
        }
        let start = control_time.first().copied().unwrap_or(self.config.start_time);
        let span = self.control_span(trajectory, control_time);
        let spacing = if samples == 0 {
            0.0
        } else {
            span / samples as f64
        };
        uniform_axis(start, spacing, samples)
    }

    /// Duration covered by the control series, including the last step.
    ///
    /// Recorded time stamps give the step from their own spacing; otherwise
    /// the configured control interval applies.
    fn control_span(&self, trajectory: &Trajectory, control_time: &[f64]) -> f64 {
        let steps = trajectory.actions.len().max(1);
        match (trajectory.time.as_ref(), control_time.first(), control_time.last()) {
            (Some(_), Some(&first), Some(&last)) if control_time.len() >= 2 => {
                (last - first) * control_time.len() as f64 / (control_time.len() - 1) as f64
            }
            _ => steps as f64 * self.config.control_interval,
        }
    }
}

/// Mean of a Beta(alpha, beta) distribution.
///
/// Both parameters must be positive; anything else is not a Beta
/// distribution and yields the midpoint 0.5.
pub fn beta_mean(alpha: f64, beta: f64) -> f64 {
    if !(alpha > 0.0 && beta > 0.0) {
        return 0.5;
    }
    alpha / (alpha + beta)
}

/// `n` points starting at `start` spaced `step` apart.
pub fn uniform_axis(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|k| start + k as f64 * step).collect()
}
