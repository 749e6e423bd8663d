use thiserror::Error;

/// Rejected learning parameters. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must lie in [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },

    #[error("{name} must be finite, got {value}")]
    NotFinite { name: &'static str, value: f64 },

    #[error("environment exposes no actions")]
    NoActions,

    #[error("perception length must be non-zero")]
    EmptyPerception,

    #[error("max_population {limit} cannot hold one covering classifier per action ({actions})")]
    PopulationTooSmall { limit: usize, actions: usize },

    #[error("tournament_size must lie in (0, 1], got {0}")]
    TournamentSize(f64),

    #[error("theta_r ({theta_r}) must be greater than theta_i ({theta_i})")]
    ThresholdOrder { theta_i: f64, theta_r: f64 },
}

/// The environment broke the perception/action contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentError {
    #[error("perception has length {actual}, expected {expected}")]
    PerceptionLength { expected: usize, actual: usize },

    #[error("unknown action {action} (environment has {count})")]
    UnknownAction { action: usize, count: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AcsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

pub type Result<T> = std::result::Result<T, AcsError>;
