use aggregation_common::{
    axis_simplex, file_stem, for_each_state, global_fit, parse_conditions, parse_params, simulate_masses,
    ConcentrationWriter, FitProblem, KineticState, MassCurve, NoProgress, ParamVector, RunConfig,
};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use indicatif::{MultiProgress, ParallelProgressIterator};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

mod progress_bar;

use progress_bar::{styled_bar, BarReporter};

/// Chain-growth aggregation kinetics: simulate trajectories and fit rate constants.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Optional TOML run configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Simulate every parameter / initial-condition pair
    Gen(GenArgs),
    /// Fit one parameter vector to measured mass curves
    Fit(FitArgs),
    /// Simulate mass curves over the parameter grid of the `[sweep]` config section
    Sweep(SweepArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputMode {
    /// `time,mass` samples at the configured checkpoints
    Mass,
    /// `time,im,am,agg0,...` after every step
    Conc,
}

#[derive(Args, Debug)]
struct GenArgs {
    /// Parameter file, one `n,r,f0,f1,f2,b0,b1,b2` record per line
    #[arg(short, long)]
    params: PathBuf,

    /// Initial-conditions file, one `im,am,agg0,...` record per line
    #[arg(short, long)]
    conditions: PathBuf,

    /// Output file name; run `i` is written to `i_<name>` in the same directory
    #[arg(short, long)]
    output: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputMode::Mass)]
    mode: OutputMode,

    /// Explicit-Euler step size
    #[arg(long)]
    step_size: f64,

    /// Simulated duration
    #[arg(long)]
    time_length: f64,
}

#[derive(Args, Debug)]
struct FitArgs {
    /// Seed parameter vectors, one per line; together they form the starting simplex
    #[arg(short, long)]
    params: PathBuf,

    /// Initial conditions, one per measured curve
    #[arg(short, long)]
    conditions: PathBuf,

    /// Measured mass curves separated by `>`
    #[arg(short, long)]
    data: PathBuf,

    /// Where to write the best parameter vector
    #[arg(short, long)]
    output: PathBuf,

    #[arg(long)]
    step_size: f64,

    /// Optional JSON report with the final simplex and per-iteration history
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SweepArgs {
    /// Initial-conditions file; only the first record is used
    #[arg(short, long)]
    conditions: PathBuf,

    /// Directory receiving one mass curve per grid point
    #[arg(short, long)]
    output_dir: PathBuf,

    #[arg(long)]
    step_size: f64,

    #[arg(long)]
    time_length: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Starting Aggregation Engine...");
    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            RunConfig::load(path).with_context(|| format!("Failed to load config '{}'", path.display()))?
        }
        None => RunConfig::default(),
    };
    debug!("Run configuration: {:#?}", config);
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    let start_time = Instant::now();
    match &cli.command {
        Command::Gen(args) => run_gen(args, &config)?,
        Command::Fit(args) => run_fit(args, &config)?,
        Command::Sweep(args) => run_sweep(args, &config)?,
    }
    info!("Finished in {:.3} seconds.", start_time.elapsed().as_secs_f64());
    Ok(())
}

fn read_params(path: &Path) -> Result<Vec<ParamVector>> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read parameters '{}'", path.display()))?;
    let params = parse_params(&text).with_context(|| format!("Invalid parameter file '{}'", path.display()))?;
    if params.is_empty() {
        bail!("Parameter file '{}' holds no records", path.display());
    }
    Ok(params)
}

fn read_conditions(path: &Path) -> Result<Vec<KineticState>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read initial conditions '{}'", path.display()))?;
    let conditions =
        parse_conditions(&text).with_context(|| format!("Invalid initial-conditions file '{}'", path.display()))?;
    if conditions.is_empty() {
        bail!("Initial-conditions file '{}' holds no records", path.display());
    }
    Ok(conditions)
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("Failed to create '{}'", path.display()))?;
    Ok(BufWriter::new(file))
}

/// `dir/name` becomes `dir/{index}_name`.
fn indexed_path(output: &Path, index: usize) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!("{index}_{name}"))
}

fn run_gen(args: &GenArgs, config: &RunConfig) -> Result<()> {
    let params = read_params(&args.params)?;
    let conditions = read_conditions(&args.conditions)?;
    if params.len() != conditions.len() {
        bail!(
            "{} parameter records but {} initial conditions; they must pair up",
            params.len(),
            conditions.len()
        );
    }
    let settings = config.integration_settings(args.step_size, args.time_length)?;
    info!(
        "Generating {} run(s) in {:?} mode: {} steps of {} each.",
        params.len(),
        args.mode,
        settings.total_steps(),
        settings.step_size
    );

    let bars = MultiProgress::new();
    params
        .par_iter()
        .zip(conditions.par_iter())
        .enumerate()
        .try_for_each(|(index, (p, initial))| -> Result<()> {
            let path = indexed_path(&args.output, index);
            let reporter = BarReporter::in_group(&bars, format!("run {index}"))?;
            match args.mode {
                OutputMode::Mass => {
                    let curve = simulate_masses(initial, p, &settings, &reporter)
                        .with_context(|| format!("Run {index} failed"))?;
                    let mut out = create(&path)?;
                    curve.write_csv(&mut out)?;
                    out.flush()?;
                }
                OutputMode::Conc => {
                    let mut writer = ConcentrationWriter::new(create(&path)?, config.output.max_recorded_bins);
                    for_each_state(initial, p, &settings, &reporter, |_, time, state| {
                        writer.write_state(time, state)
                    })
                    .with_context(|| format!("Run {index} failed"))?;
                    writer.finish()?.flush()?;
                }
            }
            info!("Run {} written to {}", index, path.display());
            Ok(())
        })
}

fn run_fit(args: &FitArgs, config: &RunConfig) -> Result<()> {
    let seeds = read_params(&args.params)?;
    let conditions = read_conditions(&args.conditions)?;
    let text = fs::read_to_string(&args.data)
        .with_context(|| format!("Failed to read measured data '{}'", args.data.display()))?;
    let measured =
        MassCurve::parse_many(&text).with_context(|| format!("Invalid measured data '{}'", args.data.display()))?;

    let longest = measured
        .iter()
        .filter_map(MassCurve::last_time)
        .fold(f64::NEG_INFINITY, f64::max);
    if !longest.is_finite() {
        bail!("Measured data '{}' holds no samples", args.data.display());
    }
    let settings = config.integration_settings(args.step_size, longest)?;
    info!(
        "Loaded {} measured curve(s) and {} initial condition(s); longest curve ends at t = {}.",
        measured.len(),
        conditions.len(),
        longest
    );
    let problem = FitProblem::new(conditions, measured, settings)?;

    let seeds = if config.fit.expand_simplex {
        if seeds.len() > 1 {
            warn!("expand_simplex is set; using only the first of {} seed vectors.", seeds.len());
        }
        axis_simplex(&seeds[0], config.fit.simplex_step)
    } else {
        seeds
    };

    let reporter = BarReporter::new("iterations")?;
    let report = global_fit(&problem, seeds, &config.fit_options(), &reporter)?;
    info!("Best error {} after {} evaluations.", report.best.error, report.evaluations);

    fs::write(&args.output, report.best.point.to_string())
        .with_context(|| format!("Failed to write fit result '{}'", args.output.display()))?;
    info!("Best parameters written to {}", args.output.display());

    if let Some(path) = &args.report {
        let mut out = create(path)?;
        serde_json::to_writer_pretty(&mut out, &report)
            .with_context(|| format!("Failed to serialize fit report to '{}'", path.display()))?;
        out.flush()?;
        info!("Fit report written to {}", path.display());
    }
    Ok(())
}

fn run_sweep(args: &SweepArgs, config: &RunConfig) -> Result<()> {
    let Some(grid) = &config.sweep else {
        bail!("The sweep command needs a [sweep] section in the --config file");
    };
    let conditions = read_conditions(&args.conditions)?;
    if conditions.len() > 1 {
        warn!("Sweeping from the first of {} initial conditions.", conditions.len());
    }
    let initial = &conditions[0];
    let settings = config.integration_settings(args.step_size, args.time_length)?;
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create output directory '{}'", args.output_dir.display()))?;
    info!("Sweeping {} grid point(s) into {}", grid.len(), args.output_dir.display());

    let bar = styled_bar(grid.len() as u64, "grid points")?;
    (0..grid.len())
        .into_par_iter()
        .progress_with(bar)
        .try_for_each(|index| -> Result<()> {
            let Some(params) = grid.point(index) else {
                return Ok(());
            };
            let curve = match simulate_masses(initial, &params, &settings, &NoProgress) {
                Ok(curve) => curve,
                Err(e) if e.is_candidate_failure() => {
                    warn!("Skipping grid point {}: {}", file_stem(&params), e);
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            let path = args.output_dir.join(format!("{}.csv", file_stem(&params)));
            let mut out = create(&path)?;
            curve.write_csv(&mut out)?;
            out.flush()?;
            debug!("Grid point {} written to {}", index, path.display());
            Ok(())
        })
}
