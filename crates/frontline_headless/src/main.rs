//! Headless Frontline match runner.
//!
//! Runs matches without graphics, controlled via JSON lines on stdin/stdout
//! or driven entirely by the built-in AI.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin (faction 0 vs AI)
//! cargo run -p frontline_headless
//!
//! # One AI-vs-AI match, report as JSON on stdout
//! cargo run -p frontline_headless -- simulate --scenario skirmish_1v1 --seed 7
//!
//! # Batch balance run
//! cargo run -p frontline_headless -- batch --count 200 --output results/
//!
//! # Check data files before shipping them
//! cargo run -p frontline_headless -- validate --config data/sim_config.ron --profile data/ai/turtle.ron
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use frontline_core::archetypes::ArchetypeTable;
use frontline_core::config::SimConfig;
use frontline_headless::{
    ai::AiProfile,
    batch::{run_batch, verify_determinism, BatchConfig},
    match_runner::run_match,
    runner::{HeadlessConfig, HeadlessRunner},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "frontline_headless")]
#[command(about = "Headless territory RTS runner for AI play, balance runs and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive match over stdin/stdout
    Run {
        /// Scenario preset or RON file
        #[arg(short, long, default_value = "vs_ai")]
        scenario: String,

        /// Output state after every tick command
        #[arg(long)]
        auto_state: bool,
    },

    /// Run one AI-vs-AI match and print its report
    Simulate {
        /// Scenario preset or RON file
        #[arg(short, long, default_value = "skirmish_1v1")]
        scenario: String,

        /// Seed (defaults to the scenario's)
        #[arg(long)]
        seed: Option<u64>,

        /// Tick limit (defaults to the scenario's time limit)
        #[arg(long)]
        max_ticks: Option<u64>,
    },

    /// Run a batch of matches for balance testing
    Batch {
        /// Scenario preset or RON file
        #[arg(short, long, default_value = "skirmish_1v1")]
        scenario: String,

        /// Number of matches to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel matches (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: usize,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Tick limit per match
        #[arg(long)]
        max_ticks: Option<u64>,
    },

    /// Verify determinism by running the same seed multiple times
    Verify {
        /// Scenario preset or RON file
        #[arg(short, long, default_value = "skirmish_1v1")]
        scenario: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Tick limit per run
        #[arg(long, default_value = "3000")]
        max_ticks: u64,
    },

    /// Parse and validate RON data files
    Validate {
        /// Simulation tuning file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Archetype table file
        #[arg(long)]
        archetypes: Option<PathBuf>,

        /// Scenario file
        #[arg(long)]
        scenario: Option<PathBuf>,

        /// AI profile file
        #[arg(long)]
        profile: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    // RUST_LOG wins over --verbose when set.
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(log_level).into()));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            auto_state,
        }) => {
            cmd_run(&scenario, auto_state);
        }
        Some(Commands::Simulate {
            scenario,
            seed,
            max_ticks,
        }) => {
            cmd_simulate(&scenario, seed, max_ticks);
        }
        Some(Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
            max_ticks,
        }) => {
            cmd_batch(&scenario, count, parallel, output, seed, max_ticks);
        }
        Some(Commands::Verify {
            scenario,
            seed,
            runs,
            max_ticks,
        }) => {
            cmd_verify(&scenario, seed, runs, max_ticks);
        }
        Some(Commands::Validate {
            config,
            archetypes,
            scenario,
            profile,
        }) => {
            cmd_validate(config, archetypes, scenario, profile);
        }
        None => {
            // Default: interactive mode
            cmd_run("vs_ai", false);
        }
    }
}

fn load_scenario(name: &str) -> Scenario {
    match Scenario::resolve(name) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("Failed to load scenario '{}': {}", name, e);
            std::process::exit(1);
        }
    }
}

/// Run an interactive match
fn cmd_run(scenario: &str, auto_state: bool) {
    tracing::info!("Starting interactive session");

    let scenario = load_scenario(scenario);
    let config = HeadlessConfig {
        auto_state_output: auto_state,
        ..HeadlessConfig::default()
    };

    let mut runner = match HeadlessRunner::from_scenario(&scenario, config) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Failed to start match: {}", e);
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    if let Err(e) = runner.run(stdin.lock(), io::stdout().lock()) {
        eprintln!("Session ended with an error: {}", e);
        std::process::exit(1);
    }
}

/// Run one AI-vs-AI match
fn cmd_simulate(scenario: &str, seed: Option<u64>, max_ticks: Option<u64>) {
    let scenario = load_scenario(scenario);
    let seed = seed.unwrap_or(scenario.seed);

    match run_match(&scenario, seed, max_ticks) {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to encode report: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Match failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Run a batch of matches for balance testing
fn cmd_batch(scenario: &str, count: u32, parallel: usize, output: PathBuf, seed: u64, max_ticks: Option<u64>) {
    let scenario = load_scenario(scenario);
    let mut config = BatchConfig::new(scenario, count)
        .with_seed(seed)
        .with_parallelism(parallel)
        .with_output(output.clone());
    config.max_ticks = max_ticks;

    let results = run_batch(config);
    let path = output.join("batch.json");
    if let Err(e) = results.save(&path) {
        eprintln!("Failed to save results to {}: {}", path.display(), e);
        std::process::exit(1);
    }

    let summary = &results.summary;
    eprintln!("Games: {} ({} failed)", summary.total_games, results.errors.len());
    for (faction, wins) in &summary.wins {
        eprintln!(
            "  faction {}: {} wins ({:.1}%)",
            faction,
            wins,
            summary.win_rate(*faction) * 100.0
        );
    }
    eprintln!("  draws: {}, timeouts: {}", summary.draws, summary.timeouts);
    eprintln!("  average length: {:.0} ticks", summary.average_ticks);
    eprintln!("Results written to {}", path.display());

    if !results.errors.is_empty() {
        std::process::exit(1);
    }
}

/// Verify determinism
fn cmd_verify(scenario: &str, seed: u64, runs: u32, max_ticks: u64) {
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario,
        seed,
        runs
    );

    let scenario = load_scenario(scenario);
    if verify_determinism(&scenario, seed, runs, Some(max_ticks)) {
        eprintln!("PASS: All {} runs produced identical results", runs);
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        std::process::exit(1);
    }
}

/// Validate RON data files
fn cmd_validate(
    config: Option<PathBuf>,
    archetypes: Option<PathBuf>,
    scenario: Option<PathBuf>,
    profile: Option<PathBuf>,
) {
    let mut failures = 0;
    let mut checked = 0;
    let mut report = |what: &str, path: &PathBuf, result: Result<(), String>| {
        checked += 1;
        match result {
            Ok(()) => eprintln!("OK    {} {}", what, path.display()),
            Err(e) => {
                failures += 1;
                eprintln!("FAIL  {} {}: {}", what, path.display(), e);
            }
        }
    };

    if let Some(path) = &config {
        report("config", path, SimConfig::load(path).map(drop).map_err(|e| e.to_string()));
    }
    if let Some(path) = &archetypes {
        report("archetypes", path, ArchetypeTable::load(path).map(drop).map_err(|e| e.to_string()));
    }
    if let Some(path) = &scenario {
        let result = Scenario::load(path)
            .and_then(|s| s.build_simulation().map(drop))
            .map_err(|e| e.to_string());
        report("scenario", path, result);
    }
    if let Some(path) = &profile {
        report("profile", path, AiProfile::load(path).map(drop).map_err(|e| e.to_string()));
    }

    if checked == 0 {
        eprintln!("Nothing to validate; pass --config, --archetypes, --scenario or --profile");
        std::process::exit(2);
    }
    if failures > 0 {
        std::process::exit(1);
    }
}
