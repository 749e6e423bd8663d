use core::convert::Infallible;
use core::fmt;
use core::ops::Index;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One attribute value of a perception, condition or effect.
pub type Symbol = char;

/// "Match any" in conditions, "pass-through" in fixed effect strings.
pub const WILDCARD: Symbol = '#';

/// The agent's sensory reading at one time step.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Perception(Vec<Symbol>);

impl Perception {
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self(symbols)
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

    pub fn symbols(&self) -> &[Symbol] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.0.iter().copied()
    }

    /// Overwrite in place, reusing the allocation.
    pub fn assign(&mut self, symbols: impl IntoIterator<Item = Symbol>) {
        self.0.clear();
        self.0.extend(symbols);
    }

    pub fn copy_from(&mut self, other: &Perception) {
        self.assign(other.iter());
    }

    /// Positions where `self` and `other` disagree.
    pub fn changed_positions<'a>(&'a self, other: &'a Perception) -> impl Iterator<Item = usize> + 'a {
        self.0
            .iter()
            .zip(other.0.iter())
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .map(|(i, _)| i)
    }
}

impl Index<usize> for Perception {
    type Output = Symbol;

    fn index(&self, idx: usize) -> &Symbol {
        &self.0[idx]
    }
}

impl From<&str> for Perception {
    fn from(value: &str) -> Self {
        Self(value.chars().collect())
    }
}

impl FromStr for Perception {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for Perception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for s in &self.0 {
            write!(f, "{s}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_reuses_buffer_and_reports_changes() {
        let a = Perception::from("0101");
        let mut b = Perception::default();
        b.copy_from(&a);
        assert_eq!(a, b);

        b.assign("0011".chars());
        let changed: Vec<usize> = a.changed_positions(&b).collect();
        assert_eq!(changed, vec![1, 2]);
        assert_eq!(b.to_string(), "0011");
    }
}
