use crate::error::{Error, Result};
use crate::optimizer::{FitOptions, ShrinkMode};
use crate::settings::IntegrationSettings;
use crate::state::PropagationRates;
use crate::sweep::ParamGrid;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Mass-curve sampling and progress cadence.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct IntegrationConfig {
    /// Evenly spaced recording checkpoints over the run in mass-only mode.
    #[serde(default = "default_points")]
    pub points: usize,
    /// How many progress updates a single trajectory emits.
    #[serde(default = "default_progress_increments")]
    pub progress_increments: usize,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        IntegrationConfig {
            points: default_points(),
            progress_increments: default_progress_increments(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct KineticsConfig {
    #[serde(default)]
    pub propagation_rates: PropagationRates,
}

// Nelder-Mead settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FitConfig {
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default)]
    pub shrink: ShrinkMode,
    /// Abort the fit on an unstable candidate instead of scoring it `+inf`.
    #[serde(default)]
    pub abort_on_instability: bool,
    /// Build the simplex from the first seed instead of using every seed.
    #[serde(default)]
    pub expand_simplex: bool,
    /// Relative perturbation per coordinate when expanding the simplex.
    #[serde(default = "default_simplex_step")]
    pub simplex_step: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        FitConfig {
            iterations: default_iterations(),
            shrink: ShrinkMode::default(),
            abort_on_instability: false,
            expand_simplex: false,
            simplex_step: default_simplex_step(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct OutputConfig {
    /// Write at most this many aggregate columns in concentration files.
    #[serde(default)]
    pub max_recorded_bins: Option<usize>,
}

/// Run configuration, loaded from an optional TOML file.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct RunConfig {
    #[serde(default)]
    pub integration: IntegrationConfig,
    #[serde(default)]
    pub kinetics: KineticsConfig,
    #[serde(default)]
    pub fit: FitConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub sweep: Option<ParamGrid>,
}

impl RunConfig {
    /// Loads the run configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let config_str = std::fs::read_to_string(path_ref)?;
        Self::from_toml(&config_str)
            .map_err(|e| Error::InvalidSettings(format!("{}: {}", path_ref.display(), e)))
    }

    /// Parses and validates a configuration held in memory.
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: RunConfig =
            toml::from_str(config_str).map_err(|e| Error::InvalidSettings(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.integration.points == 0 {
            return Err(Error::InvalidSettings("points must be greater than 0".into()));
        }
        if self.integration.progress_increments == 0 {
            return Err(Error::InvalidSettings("progress_increments must be greater than 0".into()));
        }
        if self.fit.iterations == 0 {
            return Err(Error::InvalidSettings("iterations must be greater than 0".into()));
        }
        if !(self.fit.simplex_step.is_finite() && self.fit.simplex_step > 0.0) {
            return Err(Error::InvalidSettings("simplex_step must be positive".into()));
        }
        if let Some(grid) = &self.sweep {
            grid.validate()?;
        }
        Ok(())
    }

    /// Converts the configuration plus command-line timing into runtime integration settings.
    pub fn integration_settings(&self, step_size: f64, time_length: f64) -> Result<IntegrationSettings> {
        IntegrationSettings::new(step_size, time_length)
            .map(|s| {
                s.with_points(self.integration.points)
                    .with_progress_increments(self.integration.progress_increments)
                    .with_propagation_rates(self.kinetics.propagation_rates)
            })
    }

    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            iterations: self.fit.iterations,
            shrink: self.fit.shrink,
            abort_on_instability: self.fit.abort_on_instability,
        }
    }
}

fn default_points() -> usize {
    1000
}

fn default_progress_increments() -> usize {
    100
}

fn default_iterations() -> usize {
    100
}

fn default_simplex_step() -> f64 {
    0.05
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = RunConfig::from_toml("").unwrap();
        assert_eq!(config.integration.points, 1000);
        assert_eq!(config.fit.iterations, 100);
        assert_eq!(config.fit.shrink, ShrinkMode::TowardBest);
        assert_eq!(config.kinetics.propagation_rates, PropagationRates::Nucleation);
        assert!(config.sweep.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let config = RunConfig::from_toml(
            r#"
            [integration]
            points = 250

            [kinetics]
            propagation_rates = "elongation"

            [fit]
            shrink = "legacy"
            iterations = 20
            "#,
        )
        .unwrap();
        assert_eq!(config.integration.points, 250);
        assert_eq!(config.integration.progress_increments, 100);
        assert_eq!(config.kinetics.propagation_rates, PropagationRates::Elongation);
        assert_eq!(config.fit.shrink, ShrinkMode::Legacy);
        assert_eq!(config.fit_options().iterations, 20);
    }

    #[test]
    fn zero_points_are_rejected() {
        let err = RunConfig::from_toml("[integration]\npoints = 0\n").unwrap_err();
        assert!(matches!(err, Error::InvalidSettings(_)));
    }

    #[test]
    fn settings_carry_config_values() {
        let config = RunConfig::from_toml("[integration]\npoints = 10\n").unwrap();
        let settings = config.integration_settings(0.5, 10.0).unwrap();
        assert_eq!(settings.points, 10);
        assert_eq!(settings.total_steps(), 20);
    }
}
