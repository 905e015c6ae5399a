use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

/// Number of reversible reactions carrying a forward/backward rate pair.
pub const RATE_CONSTANTS: usize = 3;

/// Number of free scalars in a [`ParamVector`].
pub const PARAM_DIM: usize = 2 + 2 * RATE_CONSTANTS;

/// Kinetic parameters of the chain-growth model.
///
/// Rate index 0 is monomer activation, 1 is nucleation, 2 is elongation.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamVector {
    /// Multiplier on active-monomer consumption by nucleation.
    pub n: f64,
    /// Exponent of the active-monomer concentration in the nucleation rate law.
    pub r: f64,
    pub forward: [f64; RATE_CONSTANTS],
    pub backward: [f64; RATE_CONSTANTS],
}

impl ParamVector {
    /// Creates a new ParamVector.
    pub fn new(n: f64, r: f64, forward: [f64; RATE_CONSTANTS], backward: [f64; RATE_CONSTANTS]) -> Self {
        ParamVector { n, r, forward, backward }
    }

    /// Builds a vector from the flat file order `n, r, f0, f1, f2, b0, b1, b2`.
    pub fn from_array(values: [f64; PARAM_DIM]) -> Self {
        ParamVector {
            n: values[0],
            r: values[1],
            forward: [values[2], values[3], values[4]],
            backward: [values[5], values[6], values[7]],
        }
    }

    /// Flattens the vector in file order.
    pub fn to_array(&self) -> [f64; PARAM_DIM] {
        [
            self.n,
            self.r,
            self.forward[0],
            self.forward[1],
            self.forward[2],
            self.backward[0],
            self.backward[1],
            self.backward[2],
        ]
    }

    /// True when every scalar is non-negative. The only admissibility gate before simulating.
    pub fn is_positive(&self) -> bool {
        self.to_array().iter().all(|v| *v >= 0.0)
    }

    fn zip_with(&self, other: &ParamVector, f: impl Fn(f64, f64) -> f64) -> Self {
        let a = self.to_array();
        let b = other.to_array();
        let mut out = [0.0; PARAM_DIM];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = f(a[i], b[i]);
        }
        ParamVector::from_array(out)
    }

    /// Multiplies every scalar by `scalar`.
    pub fn scale(&self, scalar: f64) -> Self {
        let mut out = self.to_array();
        out.iter_mut().for_each(|v| *v *= scalar);
        ParamVector::from_array(out)
    }
}

impl Add for ParamVector {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        self.zip_with(&other, |a, b| a + b)
    }
}

impl Sub for ParamVector {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        self.zip_with(&other, |a, b| a - b)
    }
}

impl Mul<f64> for ParamVector {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        self.scale(scalar)
    }
}

/// Labeled fit-result layout: `n:`, `r:`, `forward:f0,f1,f2`, `backward:b0,b1,b2`.
impl fmt::Display for ParamVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "n:{}", self.n)?;
        writeln!(f, "r:{}", self.r)?;
        writeln!(f, "forward:{},{},{}", self.forward[0], self.forward[1], self.forward[2])?;
        writeln!(f, "backward:{},{},{}", self.backward[0], self.backward[1], self.backward[2])
    }
}
