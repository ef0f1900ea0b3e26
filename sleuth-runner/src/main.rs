mod checks;
mod inputs;
mod records;
mod reports;
mod util;
mod workers;

use anyhow::{Context, Result, bail, ensure};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::info;
use sleuth_engine::{
    DiscardSink, GridSource, InMemoryGrids, PointEvaluation, RankBy, RecordSink, Scenario,
    predict, rank_evaluations,
};
use std::fs::{self, File};
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use checks::{Check, GrowthChecker};
use inputs::{load_grids, load_scenario};
use records::JsonLinesSink;
use util::{run_dir, split_csv};
use workers::{PointOutcome, run_sweep};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    /// Sweep the coefficient ranges and score each point against history
    Calibrate,
    /// Grow forward from a snapshot with the first sweep point
    Predict,
    /// Run engine property checks over a set of seeds
    Test,
}

impl RunMode {
    const fn label(self) -> &'static str {
        match self {
            Self::Calibrate => "calibrate",
            Self::Predict => "predict",
            Self::Test => "test",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RankArg {
    Product,
    Osm,
}

impl From<RankArg> for RankBy {
    fn from(value: RankArg) -> Self {
        match value {
            RankArg::Product => Self::Product,
            RankArg::Osm => Self::Osm,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "sleuth-runner", version)]
#[command(about = "Calibrate and run the SLEUTH urban growth cellular automaton")]
struct Args {
    /// What to run
    #[arg(long, value_enum, default_value_t = RunMode::Calibrate)]
    mode: RunMode,

    /// Scenario JSON file (defaults apply when omitted)
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Grid bundle JSON file (a small demo landscape when omitted)
    #[arg(long)]
    grids: Option<PathBuf>,

    /// Override the scenario's random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the scenario's Monte Carlo iteration count
    #[arg(long)]
    iterations: Option<usize>,

    /// Override the prediction stop year
    #[arg(long)]
    until: Option<u32>,

    /// Concurrent sweep workers (defaults to available parallelism)
    #[arg(long)]
    jobs: Option<usize>,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console", "csv"])]
    report: String,

    /// Score used to rank sweep points
    #[arg(long, value_enum, default_value_t = RankArg::Product)]
    rank: RankArg,

    /// Ranked points shown in the console report
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Directory for JSON-lines year records (one timestamped subdirectory per run)
    #[arg(long)]
    records: Option<PathBuf>,

    /// Seeds for test mode (comma-separated)
    #[arg(long, default_value = "1,2,3")]
    seeds: String,

    /// Checks for test mode (comma-separated, or "all")
    #[arg(long, default_value = "all")]
    checks: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    announce_banner();

    let start_time = Instant::now();
    let scenario = prepare_scenario(&args)?;
    let grids = load_grids(args.grids.as_deref())?;
    let (rows, cols) = grids.dimensions();
    info!(
        "loaded {rows}x{cols} grids with {} urban snapshots",
        grids.urban_years().len()
    );

    let failed = match args.mode {
        RunMode::Calibrate => run_calibration(&args, grids, scenario, start_time).await?,
        RunMode::Predict => run_prediction(&args, &grids, &scenario)?,
        RunMode::Test => run_checks(&args, &grids, &scenario)?,
    };

    if failed {
        std::process::exit(1);
    }

    Ok(())
}

fn announce_banner() {
    println!("{}", "🏙️ SLEUTH Growth Runner".bright_cyan().bold());
    println!("{}", "========================".cyan());
}

fn prepare_scenario(args: &Args) -> Result<Scenario> {
    let mut scenario = load_scenario(args.scenario.as_deref())?;
    if let Some(seed) = args.seed {
        scenario.random_seed = seed;
    }
    if let Some(iterations) = args.iterations {
        ensure!(iterations > 0, "--iterations must be at least 1");
        scenario.monte_carlo_iterations = iterations;
    }
    if let Some(until) = args.until {
        scenario.prediction_stop_date = Some(until);
    }
    scenario.validate().context("invalid scenario overrides")?;
    Ok(scenario)
}

fn worker_count(args: &Args) -> usize {
    args.jobs.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1)
    })
}

async fn run_calibration(
    args: &Args,
    grids: InMemoryGrids,
    scenario: Scenario,
    start_time: Instant,
) -> Result<bool> {
    let seed = scenario.random_seed;
    println!(
        "{} {} sweep points × {} iterations",
        "🧮 Calibrating".bright_yellow().bold(),
        scenario.coefficients.point_count(),
        scenario.monte_carlo_iterations
    );

    let outcome = run_sweep(
        Arc::new(grids),
        Arc::new(scenario),
        worker_count(args),
        args.records.is_some(),
    )
    .await?;

    if let Some(base) = &args.records {
        let dir = run_dir(base, RunMode::Calibrate.label(), seed);
        write_sweep_records(&dir, &outcome.points)?;
    }

    let mut ranked: Vec<PointEvaluation> =
        outcome.points.into_iter().map(|p| p.evaluation).collect();
    let rank = RankBy::from(args.rank);
    rank_evaluations(&mut ranked, rank);

    let mut output_target = OutputTarget::new(args.output.clone())?;
    match args.report.as_str() {
        "json" => {
            reports::generate_json_report(&mut output_target, &ranked, &outcome.failures, rank)?;
        }
        "markdown" => {
            reports::generate_markdown_report(
                &mut output_target,
                &ranked,
                &outcome.failures,
                rank,
            )?;
        }
        "csv" => reports::generate_csv_report(&mut output_target, &ranked)?,
        _ => {
            reports::generate_console_report(
                &mut output_target,
                &ranked,
                &outcome.failures,
                rank,
                args.top,
                start_time.elapsed(),
            )?;
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {:?}", start_time.elapsed())?;
        }
    }
    output_target.flush_inner()?;

    Ok(!outcome.failures.is_empty())
}

fn write_sweep_records(dir: &Path, points: &[PointOutcome]) -> Result<()> {
    let mut sink = open_records(dir)?;
    for point in points {
        for record in &point.records {
            sink.accept(record)?;
        }
    }
    let written = sink.written();
    sink.finish()?;
    println!("📝 Wrote {written} year records to {}", dir.display());
    Ok(())
}

fn open_records(dir: &Path) -> Result<JsonLinesSink<BufWriter<File>>> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join("records.jsonl");
    let file =
        File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(JsonLinesSink::new(BufWriter::new(file)))
}

fn run_prediction(args: &Args, grids: &InMemoryGrids, scenario: &Scenario) -> Result<bool> {
    if scenario.prediction_stop_date.is_none() {
        bail!("prediction needs a stop year: set prediction_stop_date or pass --until");
    }
    let Some(coefficients) = scenario.coefficients.points().first().copied() else {
        bail!("scenario sweep has no coefficient points");
    };
    println!(
        "{} with {}",
        "🔮 Predicting".bright_yellow().bold(),
        workers::describe(coefficients)
    );

    let prediction = if let Some(base) = &args.records {
        let dir = run_dir(base, RunMode::Predict.label(), scenario.random_seed);
        let mut sink = open_records(&dir)?;
        let prediction = predict(grids, scenario, coefficients, &mut sink)
            .context("prediction failed")?;
        let written = sink.written();
        sink.finish()?;

        let path = dir.join("probability.json");
        let file =
            File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &prediction.probability)
            .with_context(|| format!("failed to write {}", path.display()))?;
        writer.flush()?;
        println!("📝 Wrote {written} year records to {}", dir.display());
        prediction
    } else {
        predict(grids, scenario, coefficients, &mut DiscardSink)
            .context("prediction failed")?
    };

    let mut output_target = OutputTarget::new(args.output.clone())?;
    reports::generate_prediction_report(&mut output_target, &prediction, &args.report)?;
    output_target.flush_inner()?;
    Ok(false)
}

fn parse_checks(list: &str) -> Result<Vec<Check>> {
    let names = split_csv(list);
    if names.iter().any(|name| name == "all") {
        return Ok(Check::ALL.to_vec());
    }
    names
        .iter()
        .map(|name| Check::parse(name).with_context(|| format!("unknown check: {name}")))
        .collect()
}

fn parse_seeds(list: &str) -> Result<Vec<u64>> {
    let seeds = split_csv(list)
        .iter()
        .map(|token| {
            token
                .parse::<u64>()
                .with_context(|| format!("invalid seed: {token}"))
        })
        .collect::<Result<Vec<_>>>()?;
    ensure!(!seeds.is_empty(), "at least one seed is required");
    Ok(seeds)
}

fn run_checks(args: &Args, grids: &InMemoryGrids, scenario: &Scenario) -> Result<bool> {
    let checks = parse_checks(&args.checks)?;
    let seeds = parse_seeds(&args.seeds)?;
    println!("{}", "🧪 Running Engine Checks".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let checker = GrowthChecker::new(grids, scenario, args.verbose);
    let results = checker.run(&checks, &seeds);

    let mut output_target = OutputTarget::new(args.output.clone())?;
    reports::generate_check_report(&mut output_target, &results, &args.report)?;
    output_target.flush_inner()?;
    Ok(results.iter().any(|r| !r.passed))
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
