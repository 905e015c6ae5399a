use aggregation_common::{
    axis_simplex, global_fit, simulate_masses, Error, FitOptions, FitProblem, IntegrationSettings, KineticState,
    NoProgress, ParamVector, Result,
};

fn true_params() -> ParamVector {
    ParamVector::new(4.0, 2.0, [0.01, 1.5, 3000.0], [0.05, 1.0, 1000.0])
}

fn problem() -> Result<FitProblem> {
    let settings = IntegrationSettings::new(0.001, 0.001)?.with_points(20);
    let initial = vec![
        KineticState::new(1.0, 0.0, vec![0.0, 0.0]),
        KineticState::new(2.0, 0.0, vec![0.0]),
    ];
    let mut measured = Vec::new();
    for (state, duration) in initial.iter().zip([0.2, 0.15]) {
        let run = settings.with_time_length(duration)?;
        measured.push(simulate_masses(state, &true_params(), &run, &NoProgress)?);
    }
    FitProblem::new(initial, measured, settings)
}

#[test]
fn fit_improves_on_its_seeds() -> Result<()> {
    let problem = problem()?;
    let mut start = true_params();
    start.r = 2.4;
    start.forward[1] = 1.2;
    let seeds = axis_simplex(&start, 0.1);

    let mut seed_best = f64::INFINITY;
    for seed in &seeds {
        seed_best = seed_best.min(problem.error(seed)?);
    }

    let options = FitOptions {
        iterations: 30,
        ..FitOptions::default()
    };
    let report = global_fit(&problem, seeds, &options, &NoProgress)?;
    assert_eq!(report.history.len(), 30);
    assert!(report.best.error <= seed_best);
    assert!(report.best.error.is_finite());
    assert_eq!(report.simplex.len(), 9);
    Ok(())
}

#[test]
fn zero_mass_candidates_are_penalized() -> Result<()> {
    let problem = problem()?;
    let mut inert = true_params();
    inert.forward[0] = 0.0;
    let seeds = vec![true_params(), inert];

    let options = FitOptions {
        iterations: 3,
        ..FitOptions::default()
    };
    let report = global_fit(&problem, seeds.clone(), &options, &NoProgress)?;
    assert!(report.best.error.is_finite());

    let strict = FitOptions {
        abort_on_instability: true,
        ..options
    };
    let err = global_fit(&problem, seeds, &strict, &NoProgress).unwrap_err();
    assert!(matches!(err, Error::DegenerateNormalization { .. }));
    Ok(())
}

#[test]
fn lone_seed_is_degenerate() -> Result<()> {
    let problem = problem()?;
    let err = global_fit(&problem, vec![true_params()], &FitOptions::default(), &NoProgress).unwrap_err();
    assert!(matches!(err, Error::DegenerateSimplex(1)));
    Ok(())
}
