//! Anticipatory learning classifier system (ACS2) with probability-enhanced effects.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod agent;
pub mod alp;
pub mod attribute;
pub mod classifier;
pub mod condition;
pub mod config;
pub mod context;
pub mod effect;
pub mod environment;
pub mod error;
pub mod exploration;
pub mod ga;
pub mod mark;
pub mod metrics;
pub mod perception;
pub mod population;
pub mod rl;
pub mod rng;

pub use agent::{Agent, TrialReport};
pub use alp::apply_alp;
pub use attribute::ProbabilisticAttribute;
pub use classifier::{Action, Classifier, ClassifierId};
pub use condition::Condition;
pub use config::{AcsConfig, BiasMethod, Crossover, Exploration, Selection};
pub use context::AcsContext;
pub use effect::{Cursor, Effect, EnhancedEffect};
pub use environment::{Environment, ResetKind, Transition};
pub use error::{AcsError, ConfigError, EnvironmentError, Result};
pub use exploration::{best_action, choose_action};
pub use ga::{apply_ga, GaOutcome};
pub use mark::Mark;
pub use metrics::{ModelTest, PopulationStats};
pub use perception::{Perception, Symbol, WILDCARD};
pub use population::{ActionSet, ClassifierSet, MatchSet, Population};
pub use rl::apply_reinforcement;
pub use rng::{DeterministicRng, SplitMix64};
