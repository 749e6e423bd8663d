//! Probability distribution over the anticipated symbols of one effect position.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Symbol;

/// Ordered `(symbol, probability)` pairs.
///
/// Invariants: symbols are unique, probabilities are strictly positive and sum to 1.0 (up to
/// floating point error). The order is insertion order and only matters for tie-breaking in
/// [`ProbabilisticAttribute::best_symbol`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProbabilisticAttribute {
    entries: Vec<(Symbol, f64)>,
}

impl ProbabilisticAttribute {
    /// Single symbol with probability 1.0.
    pub fn new(symbol: Symbol) -> Self {
        Self {
            entries: vec![(symbol, 1.0)],
        }
    }

    /// Weighted union of `a` and `b`; see [`ProbabilisticAttribute::merge`].
    pub fn merged(a: &Self, b: &Self, q1: f64, q2: f64) -> Self {
        let mut out = a.clone();
        out.merge(b, q1, q2);
        out
    }

    /// Number of tracked symbols.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`: an attribute tracks at least one symbol.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.entries.iter().map(|(s, _)| *s)
    }

    pub fn probability(&self, symbol: Symbol) -> f64 {
        self.position(symbol)
            .map(|idx| self.entries[idx].1)
            .unwrap_or(0.0)
    }

    pub fn contains(&self, symbol: Symbol) -> bool {
        self.position(symbol).is_some()
    }

    /// `true` iff more than one symbol is tracked.
    pub fn is_enhanced(&self) -> bool {
        self.entries.len() > 1
    }

    /// Add `symbol` (or strengthen it if present) with a share of `1 / len` and renormalize.
    ///
    /// Inserting into `{a: 1.0}` yields `{a: 0.5, b: 0.5}`.
    pub fn insert(&mut self, symbol: Symbol) {
        let share = 1.0 / self.entries.len().max(1) as f64;
        match self.position(symbol) {
            Some(idx) => self.entries[idx].1 += share,
            None => self.entries.push((symbol, share)),
        }
        self.normalize();
    }

    /// Merge the single-symbol distribution `{symbol: 1.0}` into `self` with weights `q1`
    /// (for `self`) and `q2` (for the new evidence).
    pub fn insert_weighted(&mut self, symbol: Symbol, q1: f64, q2: f64) {
        self.merge(&Self::new(symbol), q1, q2);
    }

    /// Weighted union: `p(s) = w1 * self(s) + w2 * other(s)` with `w1 = q1 / (q1 + q2)` and
    /// `w2 = q2 / (q1 + q2)`.
    ///
    /// Non-positive or non-finite total weight falls back to equal weights. Symbols whose
    /// resulting mass is zero are dropped.
    pub fn merge(&mut self, other: &Self, q1: f64, q2: f64) {
        let (w1, w2) = blend_weights(q1, q2);
        for entry in &mut self.entries {
            entry.1 *= w1;
        }
        for (symbol, p) in other.iter() {
            match self.position(symbol) {
                Some(idx) => self.entries[idx].1 += w2 * p,
                None => self.entries.push((symbol, w2 * p)),
            }
        }
        if self.entries.iter().any(|(_, p)| *p > 0.0) {
            self.entries.retain(|(_, p)| *p > 0.0);
        }
        self.normalize();
    }

    /// Drop `symbol` and redistribute its mass. Fails (returns `false`) if the symbol is absent or
    /// is the last one tracked.
    pub fn remove(&mut self, symbol: Symbol) -> bool {
        if self.entries.len() <= 1 {
            return false;
        }
        let Some(idx) = self.position(symbol) else {
            return false;
        };
        self.entries.remove(idx);
        self.normalize();
        true
    }

    /// Most probable symbol; ties go to the first one inserted.
    pub fn best_symbol(&self) -> Symbol {
        let mut best = self.entries[0];
        for entry in &self.entries[1..] {
            if entry.1 > best.1 {
                best = *entry;
            }
        }
        best.0
    }

    /// Same symbol set, probabilities ignored.
    pub fn is_similar(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len() && self.symbols().all(|s| other.contains(s))
    }

    /// Move `rate * (1 - p)` of mass onto `symbol`, scaling every other symbol down
    /// proportionally. Returns `false` (no-op) if `symbol` is not tracked.
    pub fn reinforce(&mut self, symbol: Symbol, rate: f64) -> bool {
        let Some(idx) = self.position(symbol) else {
            return false;
        };
        let old = self.entries[idx].1;
        let new = old + rate * (1.0 - old);
        let rest = 1.0 - old;
        if rest > 0.0 {
            let scale = (1.0 - new) / rest;
            for (i, entry) in self.entries.iter_mut().enumerate() {
                if i != idx {
                    entry.1 *= scale;
                }
            }
        }
        self.entries[idx].1 = new;
        if self.entries.iter().any(|(_, p)| *p <= 0.0) && self.entries.len() > 1 {
            // rate == 1.0 wipes the rest; keep the strict positivity invariant.
            self.entries.retain(|(_, p)| *p > 0.0);
        }
        self.normalize();
        true
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, p)| p).sum()
    }

    fn position(&self, symbol: Symbol) -> Option<usize> {
        self.entries.iter().position(|(s, _)| *s == symbol)
    }

    fn normalize(&mut self) {
        let sum = self.total();
        if sum > 0.0 && sum.is_finite() {
            for entry in &mut self.entries {
                entry.1 /= sum;
            }
        }
    }
}

fn blend_weights(q1: f64, q2: f64) -> (f64, f64) {
    let total = q1 + q2;
    if total > 0.0 && total.is_finite() && q1 >= 0.0 && q2 >= 0.0 {
        (q1 / total, q2 / total)
    } else {
        (0.5, 0.5)
    }
}

impl fmt::Display for ProbabilisticAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_enhanced() {
            return write!(f, "{}", self.entries[0].0);
        }
        write!(f, "{{")?;
        for (i, (s, p)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{s}:{p:.2}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn two(a: Symbol, b: Symbol) -> ProbabilisticAttribute {
        let mut attr = ProbabilisticAttribute::new(a);
        attr.insert(b);
        attr
    }

    #[test]
    fn insert_splits_mass() {
        let attr = two('a', 'b');
        assert!(attr.is_enhanced());
        assert!((attr.probability('a') - 0.5).abs() < EPS);
        assert!((attr.probability('b') - 0.5).abs() < EPS);
    }

    #[test]
    fn insert_existing_strengthens() {
        let mut attr = two('a', 'b');
        attr.insert('a');
        assert_eq!(attr.len(), 2);
        assert!(attr.probability('a') > attr.probability('b'));
        assert!((attr.total() - 1.0).abs() < EPS);
    }

    #[test]
    fn reinforce_matches_reference_arithmetic() {
        let mut attr = two('a', 'b');
        assert!(attr.reinforce('a', 0.2));
        assert!((attr.probability('a') - 0.6).abs() < EPS);
        assert!((attr.probability('b') - 0.4).abs() < EPS);
    }

    #[test]
    fn reinforce_unknown_symbol_is_noop() {
        let mut attr = two('a', 'b');
        let before = attr.clone();
        assert!(!attr.reinforce('z', 0.5));
        assert_eq!(attr, before);
    }

    #[test]
    fn remove_refuses_last_symbol_and_unknown_symbol() {
        let mut attr = ProbabilisticAttribute::new('a');
        assert!(!attr.remove('a'));
        assert!(!attr.remove('b'));

        let mut attr = two('a', 'b');
        assert!(attr.remove('a'));
        assert_eq!(attr.len(), 1);
        assert!((attr.probability('b') - 1.0).abs() < EPS);
    }

    #[test]
    fn best_symbol_ties_go_to_first() {
        let attr = two('x', 'y');
        assert_eq!(attr.best_symbol(), 'x');
    }

    #[test]
    fn weighted_merge_blends_distributions() {
        let a = ProbabilisticAttribute::new('a');
        let b = ProbabilisticAttribute::new('b');
        let m = ProbabilisticAttribute::merged(&a, &b, 3.0, 1.0);
        assert!((m.probability('a') - 0.75).abs() < EPS);
        assert!((m.probability('b') - 0.25).abs() < EPS);

        let mut c = ProbabilisticAttribute::new('a');
        c.insert_weighted('b', 0.0, 0.0);
        assert!((c.probability('b') - 0.5).abs() < EPS);
    }

    #[test]
    fn zero_weight_side_is_dropped() {
        let mut a = ProbabilisticAttribute::new('a');
        a.insert_weighted('b', 0.0, 1.0);
        assert_eq!(a.len(), 1);
        assert!(a.contains('b'));
    }

    #[test]
    fn similarity_ignores_probabilities() {
        let mut a = two('a', 'b');
        let b = two('b', 'a');
        a.reinforce('a', 0.5);
        assert!(a.is_similar(&b));
        assert!(!a.is_similar(&ProbabilisticAttribute::new('a')));
    }

    #[test]
    fn display_shows_distribution() {
        assert_eq!(ProbabilisticAttribute::new('1').to_string(), "1");
        assert_eq!(two('1', '2').to_string(), "{1:0.50,2:0.50}");
    }
}
