//! Open-loop reference signal.
//!
//! Before closed-loop training, the cylinder is driven by a prescribed
//! sinusoidal rotation
//!
//!   omega(t) = A * sin(2 * pi * f * t + phi)
//!
//! Evaluating it on the same time axis as a trained policy's expected action
//! lets both be plotted and compared directly.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

use super::metrics::TimeSeries;

/// Sinusoidal open-loop rotation of the cylinder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SinusoidalRotation {
    /// Amplitude in rad/s.
    pub amplitude: f64,
    /// Frequency in Hz.
    pub frequency: f64,
    /// Phase offset in radians.
    #[serde(default)]
    pub phase: f64,
}

impl SinusoidalRotation {
    pub fn new(amplitude: f64, frequency: f64, phase: f64) -> Self {
        Self {
            amplitude,
            frequency,
            phase,
        }
    }

    /// Angular velocity at time `t`.
    pub fn omega(&self, t: f64) -> f64 {
        self.amplitude * (2.0 * PI * self.frequency * t + self.phase).sin()
    }

    /// Evaluate on the given time axis.
    pub fn series(&self, time: &[f64]) -> TimeSeries {
        TimeSeries {
            time: time.to_vec(),
            values: time.iter().map(|&t| self.omega(t)).collect(),
        }
    }
}

/// Upper bound on the number of samples [`time_range`] will produce.
pub const MAX_SAMPLES: usize = 10_000_000;

/// Time stamps from `start` up to and including `end`, `step` apart.
pub fn time_range(start: f64, end: f64, step: f64) -> Result<Vec<f64>> {
    if !(step.is_finite() && step > 0.0) {
        return Err(EvalError::Config(format!("time step must be positive, got {step}")));
    }
    if !(start.is_finite() && end.is_finite()) || end < start {
        return Err(EvalError::Config(format!("empty time range [{start}, {end}]")));
    }
    // Tolerate round-off so `end` itself is included when it lies on the grid.
    let n = ((end - start) / step + 1e-9).floor() + 1.0;
    if !n.is_finite() || n > MAX_SAMPLES as f64 {
        return Err(EvalError::Config(format!(
            "time range [{start}, {end}] with step {step} exceeds {MAX_SAMPLES} samples"
        )));
    }
    Ok((0..n as usize).map(|k| start + k as f64 * step).collect())
}
