#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Population;

/// Outcome of checking every test transition against the reliable classifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModelTest {
    pub correct: u64,
    pub wrong: u64,
}

impl ModelTest {
    pub fn record(&mut self, correct: bool) {
        if correct {
            self.correct += 1;
        } else {
            self.wrong += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.correct + self.wrong
    }

    /// Percentage of correctly anticipated transitions; 0 without any test.
    pub fn knowledge(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => 100.0 * self.correct as f64 / total as f64,
        }
    }
}

/// Population size and generality at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PopulationStats {
    /// Number of macro-classifiers.
    pub macro_size: usize,
    /// Summed numerosity.
    pub micro_size: u64,
    pub reliable: usize,
    /// Numerosity-weighted fraction of specified condition positions.
    pub specificity: f64,
}

impl PopulationStats {
    pub fn collect(population: &Population, theta_r: f64) -> Self {
        Self {
            macro_size: population.len(),
            micro_size: population.num_size(),
            reliable: population.reliable(theta_r).len(),
            specificity: population.specificity(),
        }
    }
}
