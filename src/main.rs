//! clipmatch CLI - run one query round against a JSON fixture
//!
//! 1. Load the engine config (clipmatch.toml, walked up from the working directory)
//! 2. Load the fixture into a MemoryStore
//! 3. Run one round: new, revise or finalize
//! 4. Print the round report (or JSON) and optionally save the updated store
//!
//! Saving with `--out` and pointing the next invocation at the saved file
//! chains rounds; user verdicts are edited into its `matches` section.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing_subscriber::EnvFilter;

use clipmatch::rendering::ReportRenderer;
use clipmatch::{EngineConfig, FeatureStore, JobKind, MemoryStore, RoundProcessor, RoundRequest};

/// Feedback-tuned video clip retrieval
///
/// Scores every clip of a query's search set against the reference clip
/// (or a target refit from reviewed clips) and selects matches and near
/// misses for review.
///
/// Examples:
///   clipmatch fixture.json                       # First round
///   clipmatch state.json --job revise --out next.json
///   clipmatch state.json --job finalize --json   # Final report as JSON
#[derive(Parser, Debug)]
#[command(name = "clipmatch")]
#[command(version)]
#[command(about, long_about = None)]
pub struct Cli {
    /// JSON fixture holding queries, search sets, features and past rounds
    #[arg(value_name = "FIXTURE")]
    pub fixture: PathBuf,

    /// Kind of round to run
    ///
    ///   new       First round, default weights and threshold
    ///   revise    Tune on the previous round's feedback
    ///   finalize  Final report with every user-confirmed match
    #[arg(short, long, default_value = "new")]
    pub job: JobKind,

    /// Query to process (required when the fixture holds several)
    #[arg(short, long)]
    pub query: Option<i64>,

    /// Config file (default: clipmatch.toml found from the working directory up)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// RNG seed for reproducible sampling (overrides the config)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Review budget for this round (overrides query and config)
    #[arg(short, long)]
    pub budget: Option<usize>,

    /// Print the round report as JSON
    #[arg(long)]
    pub json: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Write the updated store (with the new round) to this file
    #[arg(short, long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Verbose logging (RUST_LOG overrides)
    #[arg(short, long)]
    pub verbose: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => EngineConfig::load_file(path)?,
        None => EngineConfig::load(&std::env::current_dir().context("Failed to read working directory")?)?,
    };
    if cli.verbose {
        eprintln!("⚙️  clipmatch\n{}", config.display_summary());
    }

    let mut store = MemoryStore::from_fixture_file(&cli.fixture)?;
    let query = resolve_query(&cli, &store)?;

    let mut request = RoundRequest::new(query, cli.job);
    request.budget = cli.budget;

    let mut rng = match cli.seed.or(config.seed) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let report = RoundProcessor::new(&config)
        .run(&mut store, &request, &mut rng)
        .context("Failed to record round state")?;

    if cli.json {
        println!("{}", ReportRenderer::render_json(&report)?);
    } else {
        print!("{}", ReportRenderer::new(!cli.no_color).render(&report));
    }

    if let Some(out) = &cli.out {
        store.save(out)?;
        if cli.verbose {
            eprintln!("✓ Saved store to {}", out.display());
        }
    }

    Ok(if report.is_errored() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "clipmatch=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// The query named on the command line, or the fixture's only query.
fn resolve_query(cli: &Cli, store: &MemoryStore) -> Result<i64> {
    if let Some(id) = cli.query {
        store.query(id)?;
        return Ok(id);
    }
    match store.fixture().queries.as_slice() {
        [only] => Ok(only.id),
        [] => bail!("Fixture {} holds no queries", cli.fixture.display()),
        many => bail!(
            "Fixture {} holds {} queries; pick one with --query",
            cli.fixture.display(),
            many.len()
        ),
    }
}
