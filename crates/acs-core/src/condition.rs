use core::fmt;
use core::ops::Index;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::rng::DeterministicRng;
use crate::{Perception, Symbol, WILDCARD};

/// Ternary pattern over perception positions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Condition(Vec<Symbol>);

impl Condition {
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self(symbols)
    }

    /// All wildcards.
    pub fn general(len: usize) -> Self {
        Self(vec![WILDCARD; len])
    }

    /// Fully specified from a perception.
    pub fn specific(perception: &Perception) -> Self {
        Self(perception.iter().collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<Symbol> {
        self.0.get(idx).copied()
    }

    pub fn is_wildcard(&self, idx: usize) -> bool {
        self.0.get(idx) == Some(&WILDCARD)
    }

    /// Number of non-wildcard positions.
    pub fn specificity(&self) -> usize {
        self.0.iter().filter(|s| **s != WILDCARD).count()
    }

    pub fn specified_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, s)| **s != WILDCARD)
            .map(|(i, _)| i)
    }

    pub fn wildcard_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == WILDCARD)
            .map(|(i, _)| i)
    }

    pub fn matches(&self, perception: &Perception) -> bool {
        self.0.len() == perception.len()
            && self
                .0
                .iter()
                .zip(perception.iter())
                .all(|(c, p)| *c == WILDCARD || *c == p)
    }

    pub fn generalize(&mut self, idx: usize) -> bool {
        match self.0.get_mut(idx) {
            Some(s) if *s != WILDCARD => {
                *s = WILDCARD;
                true
            }
            _ => false,
        }
    }

    pub fn specialize(&mut self, idx: usize, symbol: Symbol) -> bool {
        match self.0.get_mut(idx) {
            Some(s) => {
                *s = symbol;
                true
            }
            None => false,
        }
    }

    /// Copy every specified position of `other` into `self`.
    pub fn specialize_with(&mut self, other: &Condition) {
        for (mine, theirs) in self.0.iter_mut().zip(other.0.iter()) {
            if *theirs != WILDCARD {
                *mine = *theirs;
            }
        }
    }

    /// Generalize one uniformly chosen specified position.
    pub fn generalize_random_specified(&mut self, rng: &mut impl DeterministicRng) -> Option<usize> {
        let specified: Vec<usize> = self.specified_positions().collect();
        if specified.is_empty() {
            return None;
        }
        let idx = specified[rng.next_index(specified.len())];
        self.0[idx] = WILDCARD;
        Some(idx)
    }

    /// `true` if every perception matched by `other` is also matched by `self`.
    pub fn subsumes(&self, other: &Condition) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| *a == WILDCARD || a == b)
    }

    /// Whether `self` and `other` can be specialized into one condition without a conflicting
    /// position.
    pub fn is_compatible(&self, other: &Condition) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| *a == WILDCARD || *b == WILDCARD || a == b)
    }

    /// Exchange positions `from..to` with `other`.
    pub fn swap_range(&mut self, other: &mut Condition, from: usize, to: usize) {
        let to = to.min(self.0.len()).min(other.0.len());
        for idx in from..to {
            core::mem::swap(&mut self.0[idx], &mut other.0[idx]);
        }
    }
}

impl Index<usize> for Condition {
    type Output = Symbol;

    fn index(&self, idx: usize) -> &Symbol {
        &self.0[idx]
    }
}

impl From<&str> for Condition {
    fn from(value: &str) -> Self {
        Self(value.chars().collect())
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for s in &self.0 {
            write!(f, "{s}")?;
        }
        Ok(())
    }
}
