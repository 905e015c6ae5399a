use crate::error::{Error, Result};
use crate::params::{ParamVector, PARAM_DIM, RATE_CONSTANTS};
use serde::{Deserialize, Serialize};

/// Number of grid values taken along each parameter field.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCounts {
    #[serde(default = "one")]
    pub n: usize,
    #[serde(default = "one")]
    pub r: usize,
    #[serde(default = "ones")]
    pub forward: [usize; RATE_CONSTANTS],
    #[serde(default = "ones")]
    pub backward: [usize; RATE_CONSTANTS],
}

impl Default for GridCounts {
    fn default() -> Self {
        GridCounts {
            n: 1,
            r: 1,
            forward: ones(),
            backward: ones(),
        }
    }
}

impl GridCounts {
    /// Counts in file order, matching [`ParamVector::to_array`].
    pub fn to_array(&self) -> [usize; PARAM_DIM] {
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
}

fn one() -> usize {
    1
}

fn ones() -> [usize; RATE_CONSTANTS] {
    [1; RATE_CONSTANTS]
}

/// Cartesian grid of parameter vectors: field `j` takes `start[j] + change[j] * i`
/// for `i < count[j]`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ParamGrid {
    pub start: ParamVector,
    #[serde(default)]
    pub change: ParamVector,
    #[serde(default)]
    pub count: GridCounts,
}

impl ParamGrid {
    pub fn validate(&self) -> Result<()> {
        if self.count.to_array().contains(&0) {
            return Err(Error::InvalidSettings("sweep counts must all be at least 1".into()));
        }
        let finite = |v: &ParamVector| v.to_array().iter().all(|x| x.is_finite());
        if !finite(&self.start) || !finite(&self.change) {
            return Err(Error::InvalidSettings("sweep start and change must be finite".into()));
        }
        self.checked_len()
            .ok_or_else(|| Error::InvalidSettings("sweep grid has too many points".into()))?;
        Ok(())
    }

    fn checked_len(&self) -> Option<usize> {
        self.count
            .to_array()
            .iter()
            .try_fold(1usize, |acc, c| acc.checked_mul(*c))
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.checked_len().unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grid point at a flat `index`; the last field varies fastest.
    pub fn point(&self, index: usize) -> Option<ParamVector> {
        if index >= self.len() {
            return None;
        }
        let counts = self.count.to_array();
        let start = self.start.to_array();
        let change = self.change.to_array();
        let mut values = [0.0; PARAM_DIM];
        let mut rest = index;
        for j in (0..PARAM_DIM).rev() {
            let digit = rest % counts[j];
            rest /= counts[j];
            values[j] = start[j] + change[j] * digit as f64;
        }
        Some(ParamVector::from_array(values))
    }

    pub fn iter(&self) -> impl Iterator<Item = ParamVector> + '_ {
        (0..self.len()).filter_map(move |i| self.point(i))
    }
}

/// File stem for a grid point: its values in file order joined by `_`.
pub fn file_stem(params: &ParamVector) -> String {
    params
        .to_array()
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> ParamGrid {
        ParamGrid {
            start: ParamVector::new(1.0, 2.0, [0.001, 1.2, 1000.0], [0.0, 0.0, 200.0]),
            change: ParamVector::new(1.0, 0.0, [0.001, 0.01, 100.0], [0.0001, 0.0001, 10.0]),
            count: GridCounts {
                n: 3,
                forward: [1, 1, 2],
                ..GridCounts::default()
            },
        }
    }

    #[test]
    fn len_is_product_of_counts() {
        assert_eq!(grid().len(), 6);
        assert_eq!(grid().iter().count(), 6);
    }

    #[test]
    fn last_field_varies_fastest() {
        let g = grid();
        let p0 = g.point(0).unwrap();
        let p1 = g.point(1).unwrap();
        let p2 = g.point(2).unwrap();
        assert_eq!(p0, g.start);
        assert_eq!(p1.forward[2], 1100.0);
        assert_eq!(p1.n, 1.0);
        assert_eq!(p2.n, 2.0);
        assert_eq!(p2.forward[2], 1000.0);
        assert!(g.point(6).is_none());
    }

    #[test]
    fn zero_count_is_rejected() {
        let mut g = grid();
        g.count.backward[1] = 0;
        assert!(matches!(g.validate(), Err(Error::InvalidSettings(_))));
        assert!(grid().validate().is_ok());
    }

    #[test]
    fn stems_join_values() {
        let p = ParamVector::new(4.0, 2.0, [0.01, 1.5, 3000.0], [0.05, 1.0, 1000.0]);
        assert_eq!(file_stem(&p), "4_2_0.01_1.5_3000_0.05_1_1000");
    }

    #[test]
    fn counts_default_to_one_in_toml() {
        let g: ParamGrid = toml::from_str(
            r#"
            start = { n = 1.0, r = 1.0, forward = [0.1, 1.0, 10.0], backward = [0.0, 0.0, 1.0] }
            change = { n = 1.0, r = 0.0, forward = [0.0, 0.0, 0.0], backward = [0.0, 0.0, 0.0] }
            count = { n = 4 }
            "#,
        )
        .unwrap();
        assert_eq!(g.len(), 4);
        assert_eq!(g.point(3).unwrap().n, 4.0);
    }
}
