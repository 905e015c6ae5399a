pub mod config;
pub mod error;
pub mod fit;
pub mod formats;
pub mod mass_curve;
pub mod objective;
pub mod optimizer;
pub mod params;
pub mod progress;
pub mod settings;
pub mod state;
pub mod sweep;
pub mod trajectory;

// Re-export key types for easier use by dependent crates
pub use config::{FitConfig, IntegrationConfig, KineticsConfig, OutputConfig, RunConfig};
pub use error::{Error, Result};
pub use fit::{axis_simplex, global_fit};
pub use formats::{parse_conditions, parse_params, ConcentrationWriter};
pub use mass_curve::{MassCurve, CURVE_SEPARATOR};
pub use objective::{calc_error, mean_squared_error, FitProblem};
pub use optimizer::{Candidate, FitOptions, FitReport, IterationRecord, NelderMead, Operation, ShrinkMode};
pub use params::{ParamVector, PARAM_DIM, RATE_CONSTANTS};
pub use progress::{NoProgress, ProgressReporter};
pub use settings::IntegrationSettings;
pub use state::{KineticState, PropagationRates};
pub use sweep::{file_stem, GridCounts, ParamGrid};
pub use trajectory::{for_each_state, simulate_masses, Trajectory};
