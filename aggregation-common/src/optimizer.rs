//! Fixed-budget Nelder–Mead simplex search.
//!
//! Reflection through the centroid of all but the worst vertex uses factor 1,
//! expansion factor 2, inside/outside contraction and shrink factor 0.5. There is no
//! convergence tolerance; the search always runs its full iteration budget.

use crate::error::{Error, Result};
use crate::progress::ProgressReporter;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::ops::{Add, Mul, Sub};

/// Default iteration budget.
pub const DEFAULT_ITERATIONS: usize = 100;

/// Where the shrink step moves the non-best vertices.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShrinkMode {
    /// `best + 0.5 * (vertex - best)`.
    #[default]
    TowardBest,
    /// `vertex + 0.5 * (vertex - best)`, which moves away from the best vertex.
    /// Only for reproducing fits made with the historical optimizer.
    Legacy,
}

impl ShrinkMode {
    pub fn apply<V>(self, best: &V, vertex: &V) -> V
    where
        V: Clone + Add<Output = V> + Sub<Output = V> + Mul<f64, Output = V>,
    {
        let offset = (vertex.clone() - best.clone()) * 0.5;
        match self {
            ShrinkMode::TowardBest => best.clone() + offset,
            ShrinkMode::Legacy => vertex.clone() + offset,
        }
    }
}

/// The simplex step taken in one iteration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Reflection,
    Expansion,
    InsideContraction,
    OutsideContraction,
    Shrink,
}

/// A vertex and its cached objective value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate<V> {
    pub point: V,
    pub error: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub operation: Operation,
    pub best_error: f64,
    pub worst_error: f64,
}

/// Outcome of a search: the best vertex, the final simplex (sorted), and what each iteration did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport<V> {
    pub best: Candidate<V>,
    pub simplex: Vec<Candidate<V>>,
    pub history: Vec<IterationRecord>,
    pub evaluations: usize,
}

/// Options for a full parameter fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub iterations: usize,
    pub shrink: ShrinkMode,
    /// Abort on a numerically unstable candidate instead of scoring it `+inf`.
    pub abort_on_instability: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            iterations: DEFAULT_ITERATIONS,
            shrink: ShrinkMode::default(),
            abort_on_instability: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NelderMead {
    pub iterations: usize,
    pub shrink: ShrinkMode,
}

impl Default for NelderMead {
    fn default() -> Self {
        NelderMead {
            iterations: DEFAULT_ITERATIONS,
            shrink: ShrinkMode::default(),
        }
    }
}

fn sort_candidates<V>(simplex: &mut [Candidate<V>]) {
    simplex.sort_by(|a, b| a.error.total_cmp(&b.error));
}

impl NelderMead {
    pub fn new(iterations: usize, shrink: ShrinkMode) -> Self {
        NelderMead { iterations, shrink }
    }

    /// Minimizes `objective` starting from the simplex spanned by `seeds`.
    ///
    /// Any vertex count of at least 2 is accepted; `N + 1` for `N` free scalars is the
    /// usual choice. Errors from `objective` abort the search.
    pub fn minimize<V, F>(
        &self,
        seeds: Vec<V>,
        mut objective: F,
        progress: &dyn ProgressReporter,
    ) -> Result<FitReport<V>>
    where
        V: Clone + Default + Debug + Add<Output = V> + Sub<Output = V> + Mul<f64, Output = V>,
        F: FnMut(&V) -> Result<f64>,
    {
        if seeds.len() < 2 {
            return Err(Error::DegenerateSimplex(seeds.len()));
        }

        let mut evaluations = 0usize;
        let mut score = |point: &V| -> Result<f64> {
            evaluations += 1;
            objective(point)
        };

        let mut simplex = Vec::with_capacity(seeds.len());
        for point in seeds {
            let error = score(&point)?;
            debug!("Seed {:?} -> {}", point, error);
            simplex.push(Candidate { point, error });
        }

        let worst = simplex.len() - 1;
        let mut history = Vec::with_capacity(self.iterations);
        progress.start(self.iterations as u64);

        for iteration in 0..self.iterations {
            sort_candidates(&mut simplex);
            debug!("Iteration {}: errors {:?}", iteration + 1, simplex.iter().map(|c| c.error).collect::<Vec<_>>());

            let best_error = simplex[0].error;
            let worst_error = simplex[worst].error;

            let mut centroid = V::default();
            for candidate in &simplex[..worst] {
                centroid = centroid + candidate.point.clone();
            }
            let centroid = centroid * (1.0 / worst as f64);

            let reflection = centroid.clone() + (centroid.clone() - simplex[worst].point.clone());
            let refl_error = score(&reflection)?;

            let operation = if refl_error < worst_error && refl_error > best_error {
                simplex[worst] = Candidate { point: reflection, error: refl_error };
                Operation::Reflection
            } else if refl_error <= best_error {
                let expansion = centroid.clone() + (reflection.clone() - centroid.clone()) * 2.0;
                let expa_error = score(&expansion)?;
                if expa_error < refl_error {
                    simplex[worst] = Candidate { point: expansion, error: expa_error };
                    Operation::Expansion
                } else {
                    simplex[worst] = Candidate { point: reflection, error: refl_error };
                    Operation::Reflection
                }
            } else {
                let inside = centroid.clone() + (simplex[worst].point.clone() - centroid.clone()) * 0.5;
                let in_error = score(&inside)?;
                let outside = centroid.clone() + (reflection - centroid) * 0.5;
                let out_error = score(&outside)?;

                if in_error < worst_error && in_error < out_error {
                    simplex[worst] = Candidate { point: inside, error: in_error };
                    Operation::InsideContraction
                } else if out_error < worst_error {
                    simplex[worst] = Candidate { point: outside, error: out_error };
                    Operation::OutsideContraction
                } else {
                    let best = simplex[0].point.clone();
                    for candidate in simplex.iter_mut().skip(1) {
                        candidate.point = self.shrink.apply(&best, &candidate.point);
                        candidate.error = score(&candidate.point)?;
                    }
                    Operation::Shrink
                }
            };

            let (best_error, worst_error) = simplex.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
                (lo.min(c.error), hi.max(c.error))
            });
            debug!("Iteration {}: {:?}, best {}, worst {}", iteration + 1, operation, best_error, worst_error);
            history.push(IterationRecord {
                iteration: iteration + 1,
                operation,
                best_error,
                worst_error,
            });
            progress.advance(iteration as u64 + 1);
        }
        progress.finish();

        sort_candidates(&mut simplex);
        let best = simplex[0].clone();
        info!(
            "Nelder-Mead finished {} iterations ({} evaluations), best error {}",
            self.iterations, evaluations, best.error
        );
        Ok(FitReport {
            best,
            simplex,
            history,
            evaluations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;

    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    struct Point2 {
        x: f64,
        y: f64,
    }

    impl Add for Point2 {
        type Output = Self;
        fn add(self, o: Self) -> Self {
            Point2 { x: self.x + o.x, y: self.y + o.y }
        }
    }

    impl Sub for Point2 {
        type Output = Self;
        fn sub(self, o: Self) -> Self {
            Point2 { x: self.x - o.x, y: self.y - o.y }
        }
    }

    impl Mul<f64> for Point2 {
        type Output = Self;
        fn mul(self, s: f64) -> Self {
            Point2 { x: self.x * s, y: self.y * s }
        }
    }

    fn bowl(p: &Point2) -> Result<f64> {
        Ok((p.x - 1.0).powi(2) + 3.0 * (p.y - 2.0).powi(2))
    }

    fn seeds() -> Vec<Point2> {
        vec![
            Point2 { x: 0.0, y: 0.0 },
            Point2 { x: 0.5, y: 0.0 },
            Point2 { x: 0.0, y: 0.5 },
        ]
    }

    #[test]
    fn converges_on_quadratic_bowl() {
        let report = NelderMead::default().minimize(seeds(), bowl, &NoProgress).unwrap();
        assert!((report.best.point.x - 1.0).abs() < 1e-2, "{:?}", report.best);
        assert!((report.best.point.y - 2.0).abs() < 1e-2, "{:?}", report.best);
        assert!(report.best.error < 1e-4);
        assert_eq!(report.history.len(), DEFAULT_ITERATIONS);
    }

    #[test]
    fn final_simplex_is_sorted_and_best_never_worsens() {
        let report = NelderMead::new(30, ShrinkMode::TowardBest).minimize(seeds(), bowl, &NoProgress).unwrap();
        assert!(report.simplex.windows(2).all(|w| w[0].error <= w[1].error));
        assert!(report.history.windows(2).all(|w| w[1].best_error <= w[0].best_error));
        assert_eq!(report.best.error, report.simplex[0].error);
    }

    #[test]
    fn infinite_scores_are_avoided() {
        // x < 0 is inadmissible
        let objective = |p: &Point2| -> Result<f64> {
            if p.x < 0.0 {
                Ok(f64::INFINITY)
            } else {
                bowl(p)
            }
        };
        let start = vec![
            Point2 { x: 0.1, y: 0.0 },
            Point2 { x: 0.6, y: 0.0 },
            Point2 { x: 0.1, y: 0.5 },
        ];
        let report = NelderMead::default().minimize(start, objective, &NoProgress).unwrap();
        assert!(report.best.error.is_finite());
        assert!(report.best.point.x >= 0.0);
    }

    #[test]
    fn shrink_modes_differ_in_direction() {
        let best = Point2 { x: 0.0, y: 0.0 };
        let vertex = Point2 { x: 2.0, y: -2.0 };
        assert_eq!(ShrinkMode::TowardBest.apply(&best, &vertex), Point2 { x: 1.0, y: -1.0 });
        assert_eq!(ShrinkMode::Legacy.apply(&best, &vertex), Point2 { x: 3.0, y: -3.0 });
    }

    fn shrink_once(mode: ShrinkMode) -> FitReport<Point2> {
        // flat everywhere but the origin, so no reflection or contraction improves on the worst vertex
        let plateau = |p: &Point2| -> Result<f64> { Ok(if *p == Point2::default() { 0.0 } else { 1.0 }) };
        let start = vec![
            Point2 { x: 0.0, y: 0.0 },
            Point2 { x: 2.0, y: 0.0 },
            Point2 { x: 0.0, y: 2.0 },
        ];
        NelderMead::new(1, mode).minimize(start, plateau, &NoProgress).unwrap()
    }

    #[test]
    fn shrink_toward_best_halves_distances() {
        let report = shrink_once(ShrinkMode::TowardBest);
        assert_eq!(report.history[0].operation, Operation::Shrink);
        // 3 seeds, reflection, two contractions, then one re-score per moved vertex
        assert_eq!(report.evaluations, 3 + 3 + 2);
        let points: Vec<Point2> = report.simplex.iter().map(|c| c.point).collect();
        assert_eq!(
            points,
            vec![Point2 { x: 0.0, y: 0.0 }, Point2 { x: 1.0, y: 0.0 }, Point2 { x: 0.0, y: 1.0 }]
        );
        assert_eq!(report.best.error, 0.0);
    }

    #[test]
    fn legacy_shrink_moves_away_from_best() {
        let report = shrink_once(ShrinkMode::Legacy);
        assert_eq!(report.history[0].operation, Operation::Shrink);
        assert_eq!(report.evaluations, 8);
        let points: Vec<Point2> = report.simplex.iter().map(|c| c.point).collect();
        assert_eq!(
            points,
            vec![Point2 { x: 0.0, y: 0.0 }, Point2 { x: 3.0, y: 0.0 }, Point2 { x: 0.0, y: 3.0 }]
        );
        assert!(report.simplex[1..].iter().all(|c| c.error == 1.0));
    }

    #[test]
    fn single_vertex_is_degenerate() {
        let err = NelderMead::default()
            .minimize(vec![Point2::default()], bowl, &NoProgress)
            .unwrap_err();
        assert!(matches!(err, Error::DegenerateSimplex(1)));
    }

    #[test]
    fn objective_errors_abort_the_search() {
        let failing = |_: &Point2| -> Result<f64> { Err(Error::InvalidSettings("boom".into())) };
        let err = NelderMead::default().minimize(seeds(), failing, &NoProgress).unwrap_err();
        assert!(matches!(err, Error::InvalidSettings(_)));
    }

    #[test]
    fn two_vertices_are_tolerated() {
        let one_dim = |p: &Point2| -> Result<f64> { Ok((p.x - 3.0).powi(2)) };
        let start = vec![Point2 { x: 0.0, y: 0.0 }, Point2 { x: 1.0, y: 0.0 }];
        let report = NelderMead::default().minimize(start, one_dim, &NoProgress).unwrap();
        assert!((report.best.point.x - 3.0).abs() < 1e-3);
    }
}
