use crate::error::Result;
use crate::objective::FitProblem;
use crate::optimizer::{FitOptions, FitReport, NelderMead};
use crate::params::{ParamVector, PARAM_DIM};
use crate::progress::ProgressReporter;
use log::{info, warn};

/// Perturbation used for coordinates that are exactly zero.
const ZERO_COORDINATE_STEP: f64 = 0.00025;

/// Builds an `N + 1` vertex simplex around `seed` by perturbing one coordinate per vertex.
///
/// Non-zero coordinates are scaled by `1 + relative_step`; zero coordinates move by a
/// small absolute step so the simplex never collapses onto an axis.
pub fn axis_simplex(seed: &ParamVector, relative_step: f64) -> Vec<ParamVector> {
    let base = seed.to_array();
    let mut simplex = Vec::with_capacity(PARAM_DIM + 1);
    simplex.push(*seed);
    for i in 0..PARAM_DIM {
        let mut values = base;
        values[i] = if values[i] != 0.0 {
            values[i] * (1.0 + relative_step)
        } else {
            ZERO_COORDINATE_STEP
        };
        simplex.push(ParamVector::from_array(values));
    }
    simplex
}

/// Fits kinetic parameters to every measured curve of `problem` at once.
///
/// Unstable or zero-mass candidates score `+inf` unless `options.abort_on_instability`
/// is set. Any other error ends the fit.
pub fn global_fit(
    problem: &FitProblem,
    seeds: Vec<ParamVector>,
    options: &FitOptions,
    progress: &dyn ProgressReporter,
) -> Result<FitReport<ParamVector>> {
    info!(
        "Fitting {} curve(s) from {} seed vertices ({} iterations, shrink {:?}).",
        problem.measured().len(),
        seeds.len(),
        options.iterations,
        options.shrink
    );
    let mut penalized = 0usize;
    let objective = |params: &ParamVector| match problem.error(params) {
        Err(e) if e.is_candidate_failure() && !options.abort_on_instability => {
            warn!("Scoring candidate {:?} as +inf: {}", params, e);
            penalized += 1;
            Ok(f64::INFINITY)
        }
        other => other,
    };
    let report = NelderMead::new(options.iterations, options.shrink).minimize(seeds, objective, progress)?;
    if penalized > 0 {
        warn!("{} candidate evaluation(s) were numerically unusable.", penalized);
    }
    Ok(report)
}
