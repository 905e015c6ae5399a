use crate::error::{Error, Result};
use crate::mass_curve::MassCurve;
use crate::params::ParamVector;
use crate::progress::{ProgressCadence, ProgressReporter};
use crate::settings::IntegrationSettings;
use crate::state::KineticState;
use log::trace;

/// Upper bound on aggregate bins reserved before stepping; longer chains grow on demand.
const MAX_PRESIZED_BINS: usize = 1 << 24;

/// Every state of a run, starting with the initial one.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub states: Vec<KineticState>,
}

impl Trajectory {
    /// Full-state mode: records the state after every step.
    ///
    /// The chain grows by one bin per step, so memory grows quadratically with the
    /// step count. Prefer [`for_each_state`] to stream states out instead.
    pub fn generate(
        initial: &KineticState,
        params: &ParamVector,
        settings: &IntegrationSettings,
        progress: &dyn ProgressReporter,
    ) -> Result<Self> {
        let len = settings.total_steps().saturating_add(1).min(MAX_PRESIZED_BINS);
        let mut trajectory = Trajectory {
            times: Vec::with_capacity(len),
            states: Vec::with_capacity(len),
        };
        for_each_state(initial, params, settings, progress, |_, time, state| {
            trajectory.times.push(time);
            trajectory.states.push(state.clone());
            Ok(())
        })?;
        Ok(trajectory)
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Total aggregate mass at every recorded time.
    pub fn mass_curve(&self) -> MassCurve {
        MassCurve {
            times: self.times.clone(),
            masses: self.states.iter().map(KineticState::total_mass).collect(),
        }
    }
}

/// Steps `initial` forward `settings.total_steps()` times, calling `on_state` with
/// `(step, time, state)` for the initial state (step 0) and after every step.
///
/// Two buffers, pre-sized for the final chain length, are swapped each step.
/// A non-finite concentration stops the run with [`Error::NumericalInstability`].
/// Returns the final state.
pub fn for_each_state<F>(
    initial: &KineticState,
    params: &ParamVector,
    settings: &IntegrationSettings,
    progress: &dyn ProgressReporter,
    mut on_state: F,
) -> Result<KineticState>
where
    F: FnMut(usize, f64, &KineticState) -> Result<()>,
{
    let total_steps = settings.total_steps();
    let capacity = initial
        .aggregate_count()
        .checked_add(total_steps)
        .and_then(|c| c.checked_add(1))
        .ok_or_else(|| {
            Error::InvalidSettings(format!(
                "{} steps of {} cannot be represented",
                total_steps, settings.step_size
            ))
        })?
        .min(MAX_PRESIZED_BINS);

    let mut current = KineticState::with_capacity(capacity);
    current.inactive = initial.inactive;
    current.active = initial.active;
    current.aggregates.extend_from_slice(&initial.aggregates);
    let mut scratch = KineticState::with_capacity(capacity);

    on_state(0, 0.0, &current)?;

    let mut cadence = ProgressCadence::new(total_steps, settings.progress_increments);
    progress.start(settings.progress_increments as u64);

    for step in 1..=total_steps {
        current.next_into(params, settings.step_size, settings.propagation_rates, &mut scratch)?;
        std::mem::swap(&mut current, &mut scratch);

        let time = step as f64 * settings.step_size;
        if !current.is_finite() {
            progress.finish();
            return Err(Error::NumericalInstability { step, time });
        }
        on_state(step, time, &current)?;

        if let Some(position) = cadence.crossed(step) {
            progress.advance(position);
        }
    }

    progress.finish();
    trace!(
        "Integrated {} steps to t = {} ({} bins).",
        total_steps,
        total_steps as f64 * settings.step_size,
        current.aggregate_count()
    );
    Ok(current)
}

/// Mass-only mode: total aggregate mass at `settings.points` evenly spaced checkpoints.
///
/// Every step is integrated; a sample is recorded only when the elapsed time crosses
/// the next checkpoint. The initial state and the final step are always recorded.
pub fn simulate_masses(
    initial: &KineticState,
    params: &ParamVector,
    settings: &IntegrationSettings,
    progress: &dyn ProgressReporter,
) -> Result<MassCurve> {
    let total_steps = settings.total_steps();
    let interval = settings.checkpoint_interval();
    let mut curve = MassCurve::with_capacity(settings.points + 2);
    let mut next_checkpoint: usize = 1;

    for_each_state(initial, params, settings, progress, |step, time, state| {
        let due = step == 0 || step == total_steps || time >= next_checkpoint as f64 * interval;
        if due {
            curve.push(time, state.total_mass());
        }
        while next_checkpoint as f64 * interval <= time {
            next_checkpoint += 1;
        }
        Ok(())
    })?;
    Ok(curve)
}
