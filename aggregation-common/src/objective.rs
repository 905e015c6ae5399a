use crate::error::{Error, Result};
use crate::mass_curve::MassCurve;
use crate::params::ParamVector;
use crate::progress::NoProgress;
use crate::settings::IntegrationSettings;
use crate::state::KineticState;
use crate::trajectory::simulate_masses;
use log::trace;

/// Mean squared error between measured samples and the simulated curve looked up at the same times.
///
/// The mean runs over every sample of every curve pair.
pub fn mean_squared_error(measured: &[MassCurve], simulated: &[MassCurve]) -> Result<f64> {
    if measured.len() != simulated.len() {
        return Err(Error::DimensionMismatch {
            what: "simulated curves per measured curve",
            expected: measured.len(),
            found: simulated.len(),
        });
    }
    let mut error = 0.0;
    let mut count = 0usize;
    for (index, (real, model)) in measured.iter().zip(simulated).enumerate() {
        for (time, mass) in real.iter() {
            let modeled = model.lookup(time).ok_or(Error::EmptyCurve { index })?;
            error += (modeled - mass).powi(2);
            count += 1;
        }
    }
    if count == 0 {
        return Err(Error::EmptyCurve { index: 0 });
    }
    Ok(error / count as f64)
}

/// Fit error of `params` against already-normalized measured curves.
///
/// Inadmissible (negative) parameters score `+inf` without simulating. Otherwise each
/// initial state is simulated up to the last time of its measured curve, normalized
/// at that time, and compared sample by sample.
pub fn calc_error(
    params: &ParamVector,
    initial_states: &[KineticState],
    measured: &[MassCurve],
    settings: &IntegrationSettings,
) -> Result<f64> {
    if !params.is_positive() {
        return Ok(f64::INFINITY);
    }
    if initial_states.len() != measured.len() {
        return Err(Error::DimensionMismatch {
            what: "initial conditions per measured curve",
            expected: measured.len(),
            found: initial_states.len(),
        });
    }

    let mut simulated = Vec::with_capacity(measured.len());
    for (index, (initial, real)) in initial_states.iter().zip(measured).enumerate() {
        let end = real.last_time().ok_or(Error::EmptyCurve { index })?;
        let run = settings.with_time_length(end)?;
        let mut model = simulate_masses(initial, params, &run, &NoProgress)?;
        model.normalize(end)?;
        simulated.push(model);
    }
    let error = mean_squared_error(measured, &simulated)?;
    trace!("calc_error({:?}) = {}", params, error);
    Ok(error)
}

/// Measured curves paired with their initial conditions, normalized once up front.
#[derive(Debug, Clone)]
pub struct FitProblem {
    initial_states: Vec<KineticState>,
    measured: Vec<MassCurve>,
    settings: IntegrationSettings,
}

impl FitProblem {
    /// Pairs curves with initial states and normalizes each curve at its own final time.
    ///
    /// Every curve must last at least one integration step.
    pub fn new(
        initial_states: Vec<KineticState>,
        mut measured: Vec<MassCurve>,
        settings: IntegrationSettings,
    ) -> Result<Self> {
        if initial_states.len() != measured.len() {
            return Err(Error::DimensionMismatch {
                what: "initial conditions per measured curve",
                expected: measured.len(),
                found: initial_states.len(),
            });
        }
        for (index, curve) in measured.iter_mut().enumerate() {
            let end = curve.last_time().ok_or(Error::EmptyCurve { index })?;
            settings.with_time_length(end)?;
            curve.normalize(end)?;
        }
        Ok(FitProblem {
            initial_states,
            measured,
            settings,
        })
    }

    pub fn measured(&self) -> &[MassCurve] {
        &self.measured
    }

    pub fn error(&self, params: &ParamVector) -> Result<f64> {
        calc_error(params, &self.initial_states, &self.measured, &self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PARAM_DIM;

    fn params() -> ParamVector {
        ParamVector::new(4.0, 2.0, [0.01, 1.5, 3000.0], [0.05, 1.0, 1000.0])
    }

    fn initial() -> KineticState {
        KineticState::new(1.0, 0.0, vec![0.0, 0.0])
    }

    fn settings() -> IntegrationSettings {
        IntegrationSettings::new(0.001, 0.001).unwrap().with_points(20)
    }

    fn synthetic_problem() -> FitProblem {
        let run = settings().with_time_length(0.2).unwrap();
        let measured = simulate_masses(&initial(), &params(), &run, &NoProgress).unwrap();
        FitProblem::new(vec![initial()], vec![measured], settings()).unwrap()
    }

    #[test]
    fn mse_averages_over_all_points() {
        let measured = vec![
            MassCurve::new(vec![0.0, 1.0], vec![1.0, 1.0]).unwrap(),
            MassCurve::new(vec![0.0], vec![0.0]).unwrap(),
        ];
        let simulated = vec![
            MassCurve::new(vec![0.0, 1.0], vec![1.0, 3.0]).unwrap(),
            MassCurve::new(vec![0.0], vec![1.0]).unwrap(),
        ];
        // (0 + 4 + 1) / 3
        assert!((mean_squared_error(&measured, &simulated).unwrap() - 5.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn negative_parameters_score_infinity() {
        let problem = synthetic_problem();
        for i in 0..PARAM_DIM {
            let mut values = params().to_array();
            values[i] = -0.5;
            let error = problem.error(&ParamVector::from_array(values)).unwrap();
            assert_eq!(error, f64::INFINITY, "field {i}");
        }
    }

    #[test]
    fn generating_parameters_fit_their_own_curve() {
        let problem = synthetic_problem();
        let error = problem.error(&params()).unwrap();
        assert!(error < 1e-20, "{error}");
        let mut off = params();
        off.r = 3.0;
        assert!(problem.error(&off).unwrap() > error);
    }

    #[test]
    fn measured_curves_are_normalized_at_their_end() {
        let problem = synthetic_problem();
        let curve = &problem.measured()[0];
        assert_eq!(curve.lookup(curve.last_time().unwrap()), Some(1.0));
    }

    #[test]
    fn unpaired_inputs_are_rejected() {
        let curve = MassCurve::new(vec![0.0, 1.0], vec![0.5, 1.0]).unwrap();
        let err = FitProblem::new(vec![initial(), initial()], vec![curve], settings()).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 1, found: 2, .. }));
    }

    #[test]
    fn curves_shorter_than_one_step_are_rejected_up_front() {
        let curve = MassCurve::new(vec![0.0, 0.0005], vec![0.5, 1.0]).unwrap();
        let err = FitProblem::new(vec![initial()], vec![curve], settings()).unwrap_err();
        assert!(matches!(err, Error::InvalidSettings(_)), "{err}");
    }

    #[test]
    fn zero_simulated_mass_cannot_be_normalized() {
        let problem = synthetic_problem();
        let mut inert = params();
        inert.forward[0] = 0.0;
        let err = problem.error(&inert).unwrap_err();
        assert!(err.is_candidate_failure());
    }
}
