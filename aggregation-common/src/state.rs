use crate::error::{Error, Result};
use crate::params::ParamVector;
use serde::{Deserialize, Serialize};

/// Which rate pair drives the interior, last-bin and new-bin propagation terms.
///
/// `Nucleation` reproduces the historical model, which uses `forward[1]`/`backward[1]`
/// there while the active-monomer and first-bin equations use index 2. The mix-up is
/// kept as the default so existing fits stay reproducible.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationRates {
    #[default]
    Nucleation,
    Elongation,
}

impl PropagationRates {
    fn index(self) -> usize {
        match self {
            PropagationRates::Nucleation => 1,
            PropagationRates::Elongation => 2,
        }
    }
}

/// Instantaneous concentrations of every species.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KineticState {
    /// Inactive monomer.
    pub inactive: f64,
    /// Active monomer.
    pub active: f64,
    /// `aggregates[i]` holds chains of length `i + 1`.
    pub aggregates: Vec<f64>,
}

impl KineticState {
    pub fn new(inactive: f64, active: f64, aggregates: Vec<f64>) -> Self {
        KineticState { inactive, active, aggregates }
    }

    /// Creates a state with room for `capacity` aggregate bins without reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        KineticState {
            inactive: 0.0,
            active: 0.0,
            aggregates: Vec::with_capacity(capacity),
        }
    }

    pub fn aggregate_count(&self) -> usize {
        self.aggregates.len()
    }

    /// Total aggregate concentration; monomer species are excluded.
    pub fn total_mass(&self) -> f64 {
        self.aggregates.iter().sum()
    }

    /// Monomer plus aggregate concentration.
    pub fn total_species(&self) -> f64 {
        self.inactive + self.active + self.total_mass()
    }

    /// Advances one explicit-Euler step into a fresh state with one more aggregate bin.
    pub fn next(&self, params: &ParamVector, step_size: f64, rates: PropagationRates) -> Result<KineticState> {
        let mut out = KineticState::with_capacity(self.aggregates.len() + 1);
        self.next_into(params, step_size, rates, &mut out)?;
        Ok(out)
    }

    /// Same as [`KineticState::next`] but writes into `out`, reusing its allocation.
    ///
    /// No clamping is applied; negative concentrations are left for the caller to see.
    pub fn next_into(
        &self,
        params: &ParamVector,
        step_size: f64,
        rates: PropagationRates,
        out: &mut KineticState,
    ) -> Result<()> {
        let agg = &self.aggregates;
        let k = agg.len();
        if k == 0 {
            return Err(Error::DimensionMismatch {
                what: "aggregate bins in state",
                expected: 1,
                found: 0,
            });
        }
        if step_size <= 0.0 || !step_size.is_finite() {
            return Err(Error::InvalidSettings(format!("step size must be positive, got {step_size}")));
        }

        let f = &params.forward;
        let b = &params.backward;
        let p = rates.index();
        let (im, am) = (self.inactive, self.active);
        let am_pow = am.powf(params.r);
        let h = step_size;

        out.aggregates.clear();
        out.aggregates.resize(k + 1, 0.0);

        out.inactive = im + h * (-im * f[0] + am * b[0]);

        let mut diff = im * f[0] - am * b[0];
        diff -= params.n * am_pow * f[1];
        diff += params.n * agg[0] * b[1];
        for i in 0..k - 1 {
            diff -= am * agg[i] * f[2];
            diff += agg[i + 1] * b[2];
        }
        // tail bin has no forward partner
        diff -= am * agg[k - 1] * f[2];
        out.active = am + h * diff;

        let second = agg.get(1).copied().unwrap_or(0.0);
        let diff = am_pow * f[1] - agg[0] * b[1] - am * agg[0] * f[2] + second * b[2];
        out.aggregates[0] = agg[0] + h * diff;

        for i in 1..k.saturating_sub(1) {
            let diff = am * agg[i - 1] * f[p] - agg[i] * b[p] - am * agg[i] * f[p] + agg[i + 1] * b[p];
            out.aggregates[i] = agg[i] + h * diff;
        }

        if k >= 2 {
            let last = k - 1;
            let diff = am * agg[last - 1] * f[p] - agg[last] * b[p] - am * agg[last] * f[p];
            out.aggregates[last] = agg[last] + h * diff;
        }

        // the new bin only sees one step of inflow
        out.aggregates[k] = h * am * agg[k - 1] * f[p];
        Ok(())
    }

    /// True when no concentration is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.inactive.is_finite() && self.active.is_finite() && self.total_mass().is_finite()
    }
}
