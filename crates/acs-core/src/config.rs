#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How non-greedy actions are picked during exploration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Exploration {
    /// Uniform random action with probability `epsilon`.
    #[default]
    EpsilonGreedy,
    /// Like epsilon-greedy, but a random action is replaced by a biased one with probability
    /// `bias_probability`.
    Biased {
        bias_probability: f64,
        method: BiasMethod,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BiasMethod {
    /// Prefer the action whose classifiers were least recently updated by the ALP.
    #[default]
    ActionDelay,
    /// Prefer the action whose classifiers have the lowest quality.
    KnowledgeArray,
    /// Pick one of the two above uniformly each time.
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Selection {
    #[default]
    RouletteWheel,
    Tournament,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Crossover {
    #[default]
    TwoPoint,
    OnePoint,
}

/// Learning parameters for one experiment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AcsConfig {
    /// Learning rate for q, r, ir and the PEE reinforcement.
    pub beta: f64,
    /// Discount factor.
    pub gamma: f64,
    /// Inadequacy threshold.
    pub theta_i: f64,
    /// Reliability threshold.
    pub theta_r: f64,
    pub q_ini: f64,
    pub r_ini: f64,
    /// Maximum number of specified unchanging condition positions. `None` is unlimited.
    pub u_max: Option<usize>,
    pub epsilon: f64,
    /// GA application threshold (average time since last GA in an action set).
    pub theta_ga: u64,
    /// Per-position mutation probability.
    pub mu: f64,
    /// Crossover probability.
    pub chi: f64,
    /// Action set size (numerosity) the GA deletes down to.
    pub theta_as: u32,
    /// Experience required before a classifier may subsume others.
    pub theta_exp: u64,
    /// Global numerosity limit. `None` is unlimited.
    pub max_population: Option<usize>,
    /// Probability that a covered position keeps its perceived symbol.
    pub cover_specificity: f64,
    /// Fraction of the action set taking part in a tournament.
    pub tournament_size: f64,
    pub enable_pee: bool,
    pub enable_ga: bool,
    pub enable_subsumption: bool,
    pub exploration: Exploration,
    pub selection: Selection,
    pub crossover: Crossover,
}

impl Default for AcsConfig {
    fn default() -> Self {
        Self {
            beta: 0.05,
            gamma: 0.95,
            theta_i: 0.1,
            theta_r: 0.9,
            q_ini: 0.5,
            r_ini: 0.5,
            u_max: None,
            epsilon: 0.5,
            theta_ga: 100,
            mu: 0.3,
            chi: 0.8,
            theta_as: 20,
            theta_exp: 20,
            max_population: None,
            cover_specificity: 0.0,
            tournament_size: 0.4,
            enable_pee: false,
            enable_ga: true,
            enable_subsumption: true,
            exploration: Exploration::EpsilonGreedy,
            selection: Selection::RouletteWheel,
            crossover: Crossover::TwoPoint,
        }
    }
}

impl AcsConfig {
    pub fn with_pee(mut self, enable: bool) -> Self {
        self.enable_pee = enable;
        self
    }

    /// Check every parameter against its admissible range.
    pub fn validate(&self, action_count: usize, perception_length: usize) -> Result<(), ConfigError> {
        let unit = [
            ("beta", self.beta),
            ("gamma", self.gamma),
            ("theta_i", self.theta_i),
            ("theta_r", self.theta_r),
            ("q_ini", self.q_ini),
            ("epsilon", self.epsilon),
            ("mu", self.mu),
            ("chi", self.chi),
            ("cover_specificity", self.cover_specificity),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { name, value });
            }
        }
        if let Exploration::Biased {
            bias_probability, ..
        } = self.exploration
        {
            if !(0.0..=1.0).contains(&bias_probability) {
                return Err(ConfigError::OutOfUnitRange {
                    name: "bias_probability",
                    value: bias_probability,
                });
            }
        }
        if self.theta_r <= self.theta_i {
            return Err(ConfigError::ThresholdOrder {
                theta_i: self.theta_i,
                theta_r: self.theta_r,
            });
        }
        if !self.r_ini.is_finite() {
            return Err(ConfigError::NotFinite {
                name: "r_ini",
                value: self.r_ini,
            });
        }
        if !(self.tournament_size > 0.0 && self.tournament_size <= 1.0) {
            return Err(ConfigError::TournamentSize(self.tournament_size));
        }
        if action_count == 0 {
            return Err(ConfigError::NoActions);
        }
        if perception_length == 0 {
            return Err(ConfigError::EmptyPerception);
        }
        if let Some(limit) = self.max_population {
            if limit < action_count {
                return Err(ConfigError::PopulationTooSmall {
                    limit,
                    actions: action_count,
                });
            }
        }
        Ok(())
    }
}
