use std::collections::BTreeSet;

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::rng::DeterministicRng;
use crate::{Condition, Perception, Symbol, WILDCARD};

/// Perception values seen at a classifier's wildcard positions when it anticipated incorrectly.
///
/// The ALP uses the mark to decide which positions to specialize next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Mark {
    slots: Vec<BTreeSet<Symbol>>,
}

impl Mark {
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![BTreeSet::new(); len],
        }
    }

    pub fn is_marked(&self) -> bool {
        self.slots.iter().any(|s| !s.is_empty())
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
    }

    pub fn get(&self, idx: usize) -> Option<&BTreeSet<Symbol>> {
        self.slots.get(idx)
    }

    /// Record `perception` at every wildcard position of `condition`. Returns `true` if the mark
    /// changed.
    pub fn set_with_condition(&mut self, condition: &Condition, perception: &Perception) -> bool {
        let mut changed = false;
        for idx in condition.wildcard_positions() {
            let (Some(slot), Some(symbol)) = (self.slots.get_mut(idx), perception.get(idx)) else {
                continue;
            };
            changed |= slot.insert(symbol);
        }
        changed
    }

    /// Condition holding the positions where `perception` differs from what was marked.
    ///
    /// If some marked position never saw the current value, one of those is chosen uniformly.
    /// Otherwise every ambiguous position (more than one marked value) is specified, falling back
    /// to all marked positions.
    pub fn differences(&self, perception: &Perception, rng: &mut impl DeterministicRng) -> Condition {
        let mut diff = Condition::general(self.slots.len());
        if !self.is_marked() {
            return diff;
        }

        let unseen: Vec<usize> = self
            .marked_positions()
            .filter(|&idx| {
                perception
                    .get(idx)
                    .is_some_and(|s| !self.slots[idx].contains(&s))
            })
            .collect();
        if !unseen.is_empty() {
            let idx = unseen[rng.next_index(unseen.len())];
            diff.specialize(idx, perception[idx]);
            return diff;
        }

        let ambiguous: Vec<usize> = self
            .marked_positions()
            .filter(|&idx| self.slots[idx].len() > 1)
            .collect();
        let chosen: Vec<usize> = if ambiguous.is_empty() {
            self.marked_positions().collect()
        } else {
            ambiguous
        };
        for idx in chosen {
            if let Some(symbol) = perception.get(idx) {
                diff.specialize(idx, symbol);
            }
        }
        diff
    }

    fn marked_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_empty())
            .map(|(i, _)| i)
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for slot in &self.slots {
            match slot.len() {
                0 => write!(f, "{WILDCARD}")?,
                1 => write!(f, "{}", slot.iter().next().copied().unwrap_or(WILDCARD))?,
                _ => {
                    write!(f, "{{")?;
                    for s in slot {
                        write!(f, "{s}")?;
                    }
                    write!(f, "}}")?;
                }
            }
        }
        Ok(())
    }
}
