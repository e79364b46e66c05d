//! recon-scheduler: plan a night of TNO follow-up observations.
//!
//! `plan` runs the whole pipeline and stores the program; `track` prints the
//! observable ephemeris samples of one target.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use recon_scheduler::config::RunConfig;
use recon_scheduler::db::{RepositoryConfig, RepositoryFactory};
use recon_scheduler::ephemeris::TableEphemeris;
use recon_scheduler::models::ModifiedJulianDate;
use recon_scheduler::parsing::{parse_designation, read_candidate_table};
use recon_scheduler::services::{
    build_track, GroupFillPolicy, InstrumentConfigurations, ObservingGroupScheduler, ReconPlanner,
};

#[derive(Parser)]
#[command(name = "recon-scheduler")]
#[command(about = "Visibility filtering and observing-group scheduling for TNO recon tracking")]
#[command(version)]
struct Cli {
    /// Log progress (info level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log everything (debug level)
    #[arg(long, global = true)]
    debug: bool,

    /// Run configuration (TOML); defaults to ./recon.toml when present
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select, filter and schedule candidates, then store the program
    Plan(PlanArgs),

    /// Print the observable ephemeris samples of one target
    Track(TrackArgs),
}

#[derive(Args)]
struct PlanArgs {
    /// Candidate table (CSV)
    #[arg(long)]
    candidates: Option<PathBuf>,

    /// Ephemeris table (JSON)
    #[arg(long)]
    ephemeris: Option<PathBuf>,

    /// Plan the night at or after this UTC time
    #[arg(long)]
    start: Option<String>,

    /// End of the occultation event window
    #[arg(long)]
    stop: Option<String>,

    #[arg(long)]
    runid: Option<String>,

    #[arg(long)]
    qrunid: Option<String>,

    /// Comma-separated orbit classes to track
    #[arg(long, value_delimiter = ',')]
    classes: Option<Vec<String>>,

    /// Minimum position uncertainty, arcseconds
    #[arg(long)]
    min_uncertainty: Option<f64>,

    /// Separation radius around the group anchor, degrees
    #[arg(long)]
    radius: Option<f64>,

    /// Group duration budget, seconds
    #[arg(long)]
    budget: Option<f64>,

    /// Extra copies of every group
    #[arg(long)]
    repeat_count: Option<u32>,

    /// single-target or fill-to-budget
    #[arg(long)]
    fill_policy: Option<GroupFillPolicy>,

    /// Overhead added per block, seconds
    #[arg(long)]
    overhead: Option<f64>,

    /// Repository settings file (TOML) replacing the [repository] table
    #[arg(long)]
    repository_config: Option<PathBuf>,

    /// local, json or print
    #[arg(long)]
    repository: Option<String>,

    /// Program document path for the json repository
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct TrackArgs {
    /// Target designation, e.g. "2003 UZ413" or K03U41Z
    target: String,

    /// Ephemeris table (JSON)
    #[arg(long)]
    ephemeris: Option<PathBuf>,

    #[arg(long)]
    start: Option<String>,

    #[arg(long)]
    stop: Option<String>,

    /// Sampling step, minutes
    #[arg(long)]
    step: Option<f64>,
}

fn init_logging(cli: &Cli) {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_config(cli: &Cli) -> Result<RunConfig> {
    match &cli.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display())),
        None => RunConfig::from_default_location().context("Failed to load run configuration"),
    }
}

fn apply_plan_overrides(config: &mut RunConfig, args: &PlanArgs) -> Result<()> {
    let run = &mut config.run;
    if args.candidates.is_some() {
        run.candidates = args.candidates.clone();
    }
    if args.ephemeris.is_some() {
        run.ephemeris = args.ephemeris.clone();
    }
    if args.start.is_some() {
        run.start = args.start.clone();
    }
    if args.stop.is_some() {
        run.stop = args.stop.clone();
    }
    if let Some(runid) = &args.runid {
        run.runid = runid.clone();
    }
    if let Some(qrunid) = &args.qrunid {
        run.qrunid = qrunid.clone();
    }
    if let Some(classes) = &args.classes {
        config.selection.classes = classes.clone();
    }
    if let Some(value) = args.min_uncertainty {
        config.selection.min_uncertainty_arcsec = value;
    }
    let scheduler = &mut config.scheduler;
    if let Some(value) = args.radius {
        scheduler.separation_radius_deg = value;
    }
    if let Some(value) = args.budget {
        scheduler.duration_budget_sec = value;
    }
    if let Some(value) = args.repeat_count {
        scheduler.repeat_count = value;
    }
    if let Some(value) = args.fill_policy {
        scheduler.fill_policy = value;
    }
    if let Some(value) = args.overhead {
        scheduler.block_overhead_sec = value;
    }
    if let Some(path) = &args.repository_config {
        config.repository = RepositoryConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?
            .repository;
    }
    if let Some(kind) = &args.repository {
        config.repository.repo_type = kind.clone();
    }
    if args.output.is_some() {
        config.repository.output = args.output.clone();
    }
    config.validate().context("Invalid run configuration")?;
    Ok(())
}

fn required_start(config: &RunConfig) -> Result<ModifiedJulianDate> {
    config
        .start_time()?
        .context("No start time: pass --start or set run.start")
}

fn load_ephemeris(path: Option<&PathBuf>) -> Result<TableEphemeris> {
    let path = path.context("No ephemeris table: pass --ephemeris or set run.ephemeris")?;
    TableEphemeris::from_file(path)
        .with_context(|| format!("Failed to load ephemeris {}", path.display()))
}

async fn plan(mut config: RunConfig, args: &PlanArgs) -> Result<()> {
    apply_plan_overrides(&mut config, args)?;

    let start = required_start(&config)?;
    let candidates = config
        .run
        .candidates
        .as_ref()
        .context("No candidate table: pass --candidates or set run.candidates")?;
    let table = read_candidate_table(candidates)
        .with_context(|| format!("Failed to read {}", candidates.display()))?;
    let ephemeris = load_ephemeris(config.run.ephemeris.as_ref())?;

    let tokens = config.tokens();
    let repository = RepositoryFactory::create(
        config.repository.repository_type()?,
        &config.repository,
        &tokens,
    )
    .await
    .context("Failed to open program repository")?;

    let planner = ReconPlanner::new(
        config.site()?,
        ObservingGroupScheduler::new(config.scheduler_config(), InstrumentConfigurations::default()),
        config.minimum_window(),
        tokens,
    );
    let report = planner
        .run(
            &table,
            &config.selection_criteria()?,
            start,
            &ephemeris,
            repository.as_ref(),
        )
        .await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    report.write_to(&mut out)?;
    out.flush()?;

    if !report.is_success() {
        bail!("{} record(s) could not be stored", report.failures.len());
    }
    info!("Stored {} group(s)", report.schedule.groups.len());
    Ok(())
}

async fn track(mut config: RunConfig, args: &TrackArgs) -> Result<()> {
    if args.ephemeris.is_some() {
        config.run.ephemeris = args.ephemeris.clone();
    }
    if args.start.is_some() {
        config.run.start = args.start.clone();
    }
    if args.stop.is_some() {
        config.run.stop = args.stop.clone();
    }
    if let Some(step) = args.step {
        config.track.step_minutes = step;
    }
    config.validate().context("Invalid run configuration")?;

    let designation = parse_designation(&args.target)
        .with_context(|| format!("Cannot decode designation '{}'", args.target))?;
    let span = config
        .event_window()?
        .context("A track needs both --start and --stop")?;
    let ephemeris = load_ephemeris(config.run.ephemeris.as_ref())?;

    let points = build_track(
        &ephemeris,
        &config.site()?,
        &designation,
        &span,
        config.track_step(),
    )
    .await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for point in &points {
        writeln!(out, "{}", point)?;
    }
    writeln!(out, "{} observable sample(s) for {}", points.len(), designation)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Plan(args) => plan(config, args).await,
        Commands::Track(args) => track(config, args).await,
    }
}
