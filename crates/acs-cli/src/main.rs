//! ACS2 experiment driver.
//!
//! - `acs2 run` - explore/exploit trials on a maze, checkpoints to a result file
//! - `acs2 config` - print the effective configuration as YAML
//! - `acs2 summary` - read back a result file

mod config;
mod report;
mod runner;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use acs_env::Maze;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ExperimentConfig;
use crate::report::{read_results, ResultWriter};

#[derive(Parser)]
#[command(name = "acs2")]
#[command(about = "Anticipatory learning classifier system experiments", version)]
struct Cli {
    /// Experiment configuration (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run experiments
    Run {
        /// Override the configured seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the number of experiments
        #[arg(long)]
        experiments: Option<u32>,

        /// Built-in layout name or maze file
        #[arg(long)]
        maze: Option<String>,

        /// Result file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the final population as JSON
        #[arg(long)]
        dump: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,

    /// Summarize a result file
    Summary {
        /// Result file written by `run`
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let mut config = ExperimentConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            seed,
            experiments,
            maze,
            output,
            dump,
        } => {
            if let Some(seed) = seed {
                config.seed = seed;
            }
            if let Some(experiments) = experiments {
                config.experiments = experiments;
            }
            if let Some(maze) = maze {
                config.maze = maze;
            }
            if output.is_some() {
                config.output = output;
            }
            if dump.is_some() {
                config.population_dump = dump;
            }
            run(&config)
        }
        Commands::Config => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
        Commands::Summary { file } => summarize(&file),
    }
}

fn load_maze(config: &ExperimentConfig) -> Result<Maze> {
    let text = match acs_env::builtin(&config.maze) {
        Some(text) => text.to_string(),
        None => std::fs::read_to_string(&config.maze)
            .with_context(|| format!("Failed to read maze from {}", config.maze))?,
    };
    let maze = Maze::parse(config.maze.as_str(), &text)
        .with_context(|| format!("Failed to parse maze {}", config.maze))?
        .with_slip(config.slip)?;
    Ok(maze)
}

fn run(config: &ExperimentConfig) -> Result<()> {
    let maze = load_maze(config)?;
    tracing::info!(
        maze = %config.maze,
        width = maze.width(),
        height = maze.height(),
        experiments = config.experiments,
        "Starting run"
    );

    let out: Box<dyn Write> = match &config.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = ResultWriter::new(out);
    writer.header(Utc::now(), &config.to_yaml()?)?;

    let mut last = None;
    for index in 0..config.experiments {
        if index > 0 {
            writer.next_experiment()?;
        }
        let outcome = runner::run_experiment(config, index, &maze, &mut writer)?;
        if let Some(point) = outcome.checkpoints.last() {
            eprintln!(
                "experiment {index}: knowledge {:.2}% after {} steps, {}/{} explore trials reached the goal{}",
                point.knowledge,
                point.time,
                outcome.explore_finished,
                config.explore_trials,
                outcome
                    .exploit_mean_steps
                    .map(|steps| format!(", {steps:.1} steps per exploit trial"))
                    .unwrap_or_default()
            );
        }
        if let Some(perf) = outcome.performance.last() {
            eprintln!(
                "experiment {index}: {:.2} steps per interleaved exploit trial at trial {}",
                perf.mean_steps, perf.trial
            );
        }
        last = Some(outcome);
    }
    writer.flush()?;

    if let (Some(path), Some(outcome)) = (&config.population_dump, &last) {
        dump_population(path, &outcome.agent.population)?;
    }
    Ok(())
}

fn dump_population(path: &Path, population: &acs_core::Population) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), population)
        .with_context(|| format!("Failed to write population to {}", path.display()))?;
    tracing::info!(path = %path.display(), classifiers = population.len(), "Population written");
    Ok(())
}

fn summarize(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let experiments = read_results(&text).with_context(|| format!("Failed to parse {}", path.display()))?;

    println!("Experiments: {}", experiments.len());
    for (index, record) in experiments.iter().enumerate() {
        if let Some(last) = record.checkpoints.last() {
            println!(
                "  {index}: time {} knowledge {:.2}% population {}/{} reliable {}",
                last.time, last.knowledge, last.macro_size, last.micro_size, last.reliable
            );
        }
        if let Some(perf) = record.performance.last() {
            println!(
                "  {index}: trial {} {:.2} steps per exploit trial",
                perf.trial, perf.mean_steps
            );
        }
    }
    let finals: Vec<_> = experiments.iter().filter_map(|e| e.checkpoints.last()).collect();
    if !finals.is_empty() {
        let mean = finals.iter().map(|c| c.knowledge).sum::<f64>() / finals.len() as f64;
        println!("Mean final knowledge: {mean:.2}%");
    }
    Ok(())
}
