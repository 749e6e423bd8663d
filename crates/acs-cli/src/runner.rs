//! Explore/exploit sequencing with periodic model tests.

use std::collections::VecDeque;
use std::io::Write;

use acs_core::rng::derive_seed;
use acs_core::{Agent, Environment};
use acs_env::Maze;
use anyhow::{Context, Result};

use crate::config::ExperimentConfig;
use crate::report::{Checkpoint, ResultWriter, RewardPerformance};

/// Result of one experiment.
#[derive(Debug)]
pub struct ExperimentOutcome {
    pub agent: Agent,
    pub checkpoints: Vec<Checkpoint>,
    /// Written only when exploitation is interleaved with exploration.
    pub performance: Vec<RewardPerformance>,
    /// Explore trials that reached the goal.
    pub explore_finished: u64,
    /// Mean steps per exploit trial, `None` when no exploit trials ran.
    pub exploit_mean_steps: Option<f64>,
}

/// Run experiment `index` on a fresh agent, writing checkpoints as they are taken.
pub fn run_experiment<W: Write>(
    config: &ExperimentConfig,
    index: u32,
    maze: &Maze,
    writer: &mut ResultWriter<W>,
) -> Result<ExperimentOutcome> {
    let seed = derive_seed(config.seed, u64::from(index));
    let mut env = maze.clone().with_seed(derive_seed(seed, 1));
    let mut agent = Agent::new(config.acs.clone(), &env, seed).context("Invalid learning parameters")?;

    tracing::info!(experiment = index, seed, maze = env.id(), "Starting experiment");

    let interval = config.checkpoint_interval.max(1);
    let mut next_checkpoint = 0;
    let mut checkpoints = Vec::new();
    let mut explore_finished = 0;
    let window = config.performance_window.max(1);
    let mut recent: VecDeque<u64> = VecDeque::new();
    let mut performance = Vec::new();

    for trial in 0..config.explore_trials {
        if agent.ctx.time >= next_checkpoint {
            checkpoints.push(checkpoint(&agent, &mut env, writer)?);
            next_checkpoint = (agent.ctx.time / interval + 1) * interval;
        }

        let report = agent.explore_trial(&mut env, config.max_steps)?;
        if report.finished {
            explore_finished += 1;
        }
        tracing::debug!(
            experiment = index,
            trial,
            steps = report.steps,
            finished = report.finished,
            population = agent.population.len(),
            "Explore trial"
        );

        if config.interleave_exploit {
            recent.push_back(agent.exploit_trial(&mut env, config.max_steps)?.steps);
            if recent.len() as u64 > window {
                recent.pop_front();
            }
            if trial % window == 0 {
                let line = RewardPerformance {
                    time: agent.ctx.time,
                    trial,
                    mean_steps: recent.iter().sum::<u64>() as f64 / recent.len() as f64,
                    macro_size: agent.population.len(),
                };
                writer.performance(&line).context("Failed to write performance")?;
                performance.push(line);
            }
        }
    }
    checkpoints.push(checkpoint(&agent, &mut env, writer)?);

    let mut exploit_steps = 0;
    for _ in 0..config.exploit_trials {
        exploit_steps += agent.exploit_trial(&mut env, config.max_steps)?.steps;
    }
    let exploit_mean_steps =
        (config.exploit_trials > 0).then(|| exploit_steps as f64 / config.exploit_trials as f64);

    writer.flush().context("Failed to flush results")?;
    tracing::info!(
        experiment = index,
        time = agent.ctx.time,
        explore_finished,
        exploit_mean_steps = ?exploit_mean_steps,
        "Experiment finished"
    );

    Ok(ExperimentOutcome {
        agent,
        checkpoints,
        performance,
        explore_finished,
        exploit_mean_steps,
    })
}

fn checkpoint<W: Write>(agent: &Agent, env: &mut Maze, writer: &mut ResultWriter<W>) -> Result<Checkpoint> {
    let point = Checkpoint::capture(agent, agent.test_model(env));
    writer.checkpoint(&point).context("Failed to write checkpoint")?;
    tracing::info!(
        time = point.time,
        knowledge = point.knowledge,
        population = point.macro_size,
        reliable = point.reliable,
        "Checkpoint"
    );
    Ok(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::read_results;
    use acs_env::MAZE_SMALL;

    fn small_config() -> ExperimentConfig {
        ExperimentConfig {
            maze: "maze_small".to_string(),
            explore_trials: 60,
            exploit_trials: 5,
            max_steps: 30,
            checkpoint_interval: 100,
            seed: 3,
            ..ExperimentConfig::default()
        }
    }

    #[test]
    fn experiment_writes_increasing_checkpoints() {
        let config = small_config();
        let maze = Maze::parse("small", MAZE_SMALL).expect("valid maze");
        let mut writer = ResultWriter::new(Vec::new());

        let outcome = run_experiment(&config, 0, &maze, &mut writer).expect("run");
        assert!(outcome.checkpoints.len() >= 2);
        assert_eq!(outcome.checkpoints[0].time, 0);
        assert!(outcome.checkpoints.windows(2).all(|w| w[0].time <= w[1].time));
        assert!(outcome.exploit_mean_steps.is_some());

        let text = String::from_utf8(writer.into_inner()).expect("utf8");
        let parsed = read_results(&text).expect("parse");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].checkpoints.len(), outcome.checkpoints.len());
    }

    #[test]
    fn interleaved_exploitation_writes_performance_lines() {
        let config = ExperimentConfig {
            interleave_exploit: true,
            performance_window: 10,
            ..small_config()
        };
        let maze = Maze::parse("small", MAZE_SMALL).expect("valid maze");
        let mut writer = ResultWriter::new(Vec::new());

        let outcome = run_experiment(&config, 0, &maze, &mut writer).expect("run");
        let trials: Vec<u64> = outcome.performance.iter().map(|p| p.trial).collect();
        assert_eq!(trials, vec![0, 10, 20, 30, 40, 50]);
        for line in &outcome.performance {
            assert!(line.mean_steps >= 1.0 && line.mean_steps <= config.max_steps as f64);
        }
        assert!(outcome.performance.windows(2).all(|w| w[0].time <= w[1].time));

        let text = String::from_utf8(writer.into_inner()).expect("utf8");
        let records = read_results(&text).expect("parse");
        assert_eq!(records.len(), 1);
        let read: Vec<(u64, u64)> = records[0].performance.iter().map(|p| (p.time, p.trial)).collect();
        let written: Vec<(u64, u64)> = outcome.performance.iter().map(|p| (p.time, p.trial)).collect();
        assert_eq!(read, written);
        assert_eq!(records[0].checkpoints.len(), outcome.checkpoints.len());
    }

    #[test]
    fn performance_lines_are_off_by_default() {
        let maze = Maze::parse("small", MAZE_SMALL).expect("valid maze");
        let mut writer = ResultWriter::new(Vec::new());
        let outcome = run_experiment(&small_config(), 0, &maze, &mut writer).expect("run");
        assert!(outcome.performance.is_empty());
    }

    #[test]
    fn experiments_are_reproducible_per_index() {
        let config = small_config();
        let maze = Maze::parse("small", MAZE_SMALL).expect("valid maze");

        let run = |index| {
            let mut writer = ResultWriter::new(Vec::new());
            run_experiment(&config, index, &maze, &mut writer).expect("run");
            String::from_utf8(writer.into_inner()).expect("utf8")
        };
        assert_eq!(run(1), run(1));
    }
}
