mod commands;
mod input;
mod output;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::black_litterman::BlackLittermanArgs;
use commands::optimize::{AnalyzeArgs, FrontierArgs, OptimizeArgs};
use commands::simulate::{HestonArgs, MonteCarloArgs};
use commands::stress::StressTestArgs;
use commands::Overrides;

/// Portfolio analytics from the command line
#[derive(Parser)]
#[command(
    name = "pae",
    version,
    about = "Portfolio analytics: optimization, simulation and Black-Litterman allocation",
    long_about = "Runs portfolio analytics requests read from a JSON or YAML file (--input) \
                  or piped stdin. Every request carries its own market data; results are \
                  written to stdout, logs to stderr."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Engine config file (JSON or YAML) replacing the request's `config`
    #[arg(long, global = true)]
    config: Option<String>,

    /// Fix the random seed of every stochastic step
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Worker threads for simulations (defaults to the core count)
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Print failures as a JSON error object on stdout
    #[arg(long, global = true)]
    error_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a portfolio against optimized alternatives and benchmarks
    Analyze(AnalyzeArgs),
    /// Optimize a ticker universe for max Sharpe or min volatility
    Optimize(OptimizeArgs),
    /// Sample the efficient frontier
    Frontier(FrontierArgs),
    /// Correlated lognormal Monte Carlo simulation
    MonteCarlo(MonteCarloArgs),
    /// Stochastic-volatility (Heston) simulation with VaR/CVaR
    Heston(HestonArgs),
    /// Black-Litterman allocation from market priors and investor views
    BlackLitterman(BlackLittermanArgs),
    /// Replay the portfolio through historical market episodes
    StressTest(StressTestArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if !atty::is(atty::Stream::Stderr) {
        colored::control::set_override(false);
    }

    let overrides = Overrides {
        config: cli.config.clone(),
        seed: cli.seed,
        threads: cli.threads,
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Analyze(args) => commands::optimize::run_analyze(args, &overrides),
        Commands::Optimize(args) => commands::optimize::run_optimize(args, &overrides),
        Commands::Frontier(args) => commands::optimize::run_frontier(args, &overrides),
        Commands::MonteCarlo(args) => commands::simulate::run_monte_carlo(args, &overrides),
        Commands::Heston(args) => commands::simulate::run_heston(args, &overrides),
        Commands::BlackLitterman(args) => {
            commands::black_litterman::run_black_litterman(args, &overrides)
        }
        Commands::StressTest(args) => commands::stress::run_stress_test(args, &overrides),
        Commands::Version => {
            println!("pae {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            if cli.error_json {
                output::json::print_json(&commands::error_response(e.as_ref()));
            } else {
                eprintln!("{}: {}", "error".red().bold(), e);
            }
            process::exit(1);
        }
    }
}
