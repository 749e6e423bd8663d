//! Experiment configuration, loaded from YAML.

use std::path::{Path, PathBuf};

use acs_core::AcsConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Everything one `acs2 run` needs besides the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Built-in layout name or path to a maze file
    #[serde(default = "default_maze")]
    pub maze: String,

    /// Probability that a move is replaced by a random one
    pub slip: f64,

    /// Independent repetitions, separated by `Next Experiment` in the result file
    #[serde(default = "default_experiments")]
    pub experiments: u32,

    #[serde(default = "default_explore_trials")]
    pub explore_trials: u64,

    /// Greedy trials run after exploration
    pub exploit_trials: u64,

    /// Follow every explore trial with one exploit trial and report its steps to the goal
    pub interleave_exploit: bool,

    /// Exploit trials averaged per `Performance` line, also the trial interval between lines
    #[serde(default = "default_performance_window")]
    pub performance_window: u64,

    /// Step limit per trial
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,

    /// Steps between model tests
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,

    pub seed: u64,

    /// Result file; stdout when unset
    pub output: Option<PathBuf>,

    /// JSON dump of the final population of the last experiment
    pub population_dump: Option<PathBuf>,

    /// Learning parameters
    pub acs: AcsConfig,
}

fn default_maze() -> String {
    "maze4".to_string()
}
fn default_experiments() -> u32 {
    1
}
fn default_explore_trials() -> u64 {
    1_000
}
fn default_max_steps() -> u64 {
    50
}
fn default_checkpoint_interval() -> u64 {
    500
}
fn default_performance_window() -> u64 {
    50
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            maze: default_maze(),
            slip: 0.0,
            experiments: default_experiments(),
            explore_trials: default_explore_trials(),
            exploit_trials: 0,
            interleave_exploit: false,
            performance_window: default_performance_window(),
            max_steps: default_max_steps(),
            checkpoint_interval: default_checkpoint_interval(),
            seed: 0,
            output: None,
            population_dump: None,
            acs: AcsConfig::default(),
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        Ok(config)
    }

    /// Load `path` when given and present, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acs_core::{BiasMethod, Exploration};

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
maze: maze_small
explore_trials: 20
acs:
  beta: 0.1
  enable_pee: true
  exploration:
    kind: biased
    bias_probability: 0.3
    method: action_delay
"#;
        let config: ExperimentConfig = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(config.maze, "maze_small");
        assert_eq!(config.explore_trials, 20);
        assert_eq!(config.max_steps, 50);
        assert_eq!(config.experiments, 1);
        assert!(!config.interleave_exploit);
        assert_eq!(config.performance_window, 50);
        assert_eq!(config.acs.beta, 0.1);
        assert!(config.acs.enable_pee);
        assert_eq!(config.acs.gamma, AcsConfig::default().gamma);
        assert_eq!(
            config.acs.exploration,
            Exploration::Biased {
                bias_probability: 0.3,
                method: BiasMethod::ActionDelay
            }
        );
    }

    #[test]
    fn yaml_roundtrip() {
        let config = ExperimentConfig {
            slip: 0.25,
            interleave_exploit: true,
            performance_window: 10,
            output: Some(PathBuf::from("out.txt")),
            ..ExperimentConfig::default()
        };
        let yaml = config.to_yaml().expect("serialize");
        let back: ExperimentConfig = serde_yaml::from_str(&yaml).expect("parse");
        assert_eq!(back, config);
    }

    #[test]
    fn missing_file_means_defaults() {
        let path = std::env::temp_dir().join("acs2-config-that-does-not-exist.yaml");
        let config = ExperimentConfig::load_or_default(Some(&path)).expect("defaults");
        assert_eq!(config, ExperimentConfig::default());
    }
}
