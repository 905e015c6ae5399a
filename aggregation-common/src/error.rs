/// Main error type
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A record in one of the text inputs could not be read.
    #[error("{kind} record {line}: {message}")]
    Parse {
        /// Which input is being read (parameters, conditions, mass curve).
        kind: &'static str,
        /// 1-based record number within the input.
        line: usize,
        /// What was wrong with the record.
        message: String,
    },
    /// Two collections that must pair up, or a state that must have a given shape, do not.
    #[error("{what}: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Name of the mismatched quantity.
        what: &'static str,
        /// Required size.
        expected: usize,
        /// Size actually supplied.
        found: usize,
    },
    /// A mass curve without any samples was supplied where one is needed.
    #[error("mass curve {index} has no samples")]
    EmptyCurve {
        /// Position of the curve in its input.
        index: usize,
    },
    /// Stepping produced a NaN or infinite concentration.
    #[error("non-finite concentration after step {step} (t = {time})")]
    NumericalInstability {
        /// 1-based integration step at which the blow-up was detected.
        step: usize,
        /// Simulated time of that step.
        time: f64,
    },
    /// A curve cannot be normalized because its reference value is zero or not finite.
    #[error("cannot normalize by {value} at t = {time}")]
    DegenerateNormalization {
        /// Reference time of the normalization.
        time: f64,
        /// Mass found at the reference time.
        value: f64,
    },
    /// Integration or fit settings are unusable.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    /// The optimizer needs at least two vertices to form a centroid.
    #[error("simplex needs at least 2 vertices, got {0}")]
    DegenerateSimplex(usize),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors that condemn a single candidate parameter vector rather than the whole fit.
    pub fn is_candidate_failure(&self) -> bool {
        matches!(
            self,
            Error::NumericalInstability { .. } | Error::DegenerateNormalization { .. }
        )
    }
}

/// Main result type
pub type Result<T> = std::result::Result<T, Error>;
