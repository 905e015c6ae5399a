use crate::error::{Error, Result};
use crate::state::PropagationRates;
use serde::{Deserialize, Serialize};

/// Default number of recording checkpoints in mass-only mode.
pub const DEFAULT_POINTS: usize = 1000;

/// Default number of progress updates per trajectory.
pub const DEFAULT_PROGRESS_INCREMENTS: usize = 100;

const STEP_RATIO_EPS: f64 = 1e-9;

/// Integration parameters used on every step of a trajectory.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationSettings {
    /// Explicit-Euler step `h`.
    pub step_size: f64,
    /// Simulated duration.
    pub time_length: f64,
    /// Recording checkpoints for mass-only mode.
    pub points: usize,
    pub progress_increments: usize,
    pub propagation_rates: PropagationRates,
}

impl IntegrationSettings {
    /// Validates step size and duration; the remaining fields take their defaults.
    pub fn new(step_size: f64, time_length: f64) -> Result<Self> {
        if !(step_size.is_finite() && step_size > 0.0) {
            return Err(Error::InvalidSettings(format!("step size must be a positive number, got {step_size}")));
        }
        if !time_length.is_finite() || time_length < step_size {
            return Err(Error::InvalidSettings(format!(
                "time length ({time_length}) must be at least the step size ({step_size})"
            )));
        }
        Ok(IntegrationSettings {
            step_size,
            time_length,
            points: DEFAULT_POINTS,
            progress_increments: DEFAULT_PROGRESS_INCREMENTS,
            propagation_rates: PropagationRates::default(),
        })
    }

    pub fn with_points(mut self, points: usize) -> Self {
        self.points = points.max(1);
        self
    }

    pub fn with_progress_increments(mut self, increments: usize) -> Self {
        self.progress_increments = increments.max(1);
        self
    }

    pub fn with_propagation_rates(mut self, rates: PropagationRates) -> Self {
        self.propagation_rates = rates;
        self
    }

    /// Same settings over a different duration.
    pub fn with_time_length(self, time_length: f64) -> Result<Self> {
        let base = IntegrationSettings::new(self.step_size, time_length)?;
        Ok(IntegrationSettings { time_length: base.time_length, ..self })
    }

    /// Number of Euler steps needed to cover `time_length`.
    ///
    /// Ratios within rounding noise of a whole number are not rounded up an extra step.
    pub fn total_steps(&self) -> usize {
        let ratio = self.time_length / self.step_size;
        let nearest = ratio.round();
        if (ratio - nearest).abs() <= STEP_RATIO_EPS * nearest.max(1.0) {
            nearest as usize
        } else {
            ratio.ceil() as usize
        }
    }

    /// Spacing of the mass-only recording checkpoints.
    pub fn checkpoint_interval(&self) -> f64 {
        self.time_length / self.points as f64
    }
}
