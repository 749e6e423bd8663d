//! Effect part of a classifier.
//!
//! [`EnhancedEffect`] is the sparse position -> [`ProbabilisticAttribute`] map; positions without
//! an entry are pass-through (anticipated value == perceived value). [`Effect`] wraps it with the
//! anticipation logic. A fixed effect string such as `"#1#"` is an enhanced effect whose
//! attributes all hold exactly one symbol.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Perception, ProbabilisticAttribute, Symbol, WILDCARD};

/// Position-ordered sparse mapping; no duplicate positions.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnhancedEffect {
    len: usize,
    items: Vec<(usize, ProbabilisticAttribute)>,
}

impl EnhancedEffect {
    /// All `len` positions pass-through.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            items: Vec::new(),
        }
    }

    /// Total number of positions (specified + pass-through).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of specified positions.
    pub fn size(&self) -> usize {
        self.items.len()
    }

    /// Number of pass-through positions.
    pub fn unspecified(&self) -> usize {
        self.len - self.items.len()
    }

    /// Ordered insertion keyed by `position`. An occupied position merges `symbol` into the
    /// existing attribute instead of creating a second entry. Out-of-range positions are
    /// rejected.
    pub fn insert(&mut self, symbol: Symbol, position: usize) -> bool {
        if position >= self.len {
            return false;
        }
        match self.search(position) {
            Ok(idx) => self.items[idx].1.insert(symbol),
            Err(idx) => self
                .items
                .insert(idx, (position, ProbabilisticAttribute::new(symbol))),
        }
        true
    }

    /// Put a whole attribute at `position`, replacing whatever was there.
    pub fn set(&mut self, position: usize, attribute: ProbabilisticAttribute) -> bool {
        if position >= self.len {
            return false;
        }
        match self.search(position) {
            Ok(idx) => self.items[idx].1 = attribute,
            Err(idx) => self.items.insert(idx, (position, attribute)),
        }
        true
    }

    /// Insert a fresh single-symbol attribute into the `gap`-th currently unspecified position
    /// (0-indexed, counting gaps before the first entry and after the last one).
    ///
    /// Returns the absolute position used, or `None` if `gap >= unspecified()`.
    pub fn insert_at(&mut self, symbol: Symbol, gap: usize) -> Option<usize> {
        if gap >= self.unspecified() {
            return None;
        }

        let mut remaining = gap;
        let mut start = 0;
        let mut index = self.items.len();
        for (i, (pos, _)) in self.items.iter().enumerate() {
            let gap_len = pos - start;
            if remaining < gap_len {
                index = i;
                break;
            }
            remaining -= gap_len;
            start = pos + 1;
        }

        let position = start + remaining;
        self.items
            .insert(index, (position, ProbabilisticAttribute::new(symbol)));
        Some(position)
    }

    /// Remove the entry keyed by `position`.
    pub fn remove(&mut self, position: usize) -> bool {
        match self.search(position) {
            Ok(idx) => {
                self.items.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    /// Remove the `ordinal`-th entry (0-indexed, in position order).
    pub fn remove_at(&mut self, ordinal: usize) -> bool {
        if ordinal >= self.items.len() {
            return false;
        }
        self.items.remove(ordinal);
        true
    }

    pub fn get(&self, position: usize) -> Option<&ProbabilisticAttribute> {
        self.search(position).ok().map(|idx| &self.items[idx].1)
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut ProbabilisticAttribute> {
        match self.search(position) {
            Ok(idx) => Some(&mut self.items[idx].1),
            Err(_) => None,
        }
    }

    pub fn contains_position(&self, position: usize) -> bool {
        self.search(position).is_ok()
    }

    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.items.iter().map(|(p, _)| *p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ProbabilisticAttribute)> + '_ {
        self.items.iter().map(|(p, a)| (*p, a))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut ProbabilisticAttribute)> + '_ {
        self.items.iter_mut().map(|(p, a)| (*p, a))
    }

    /// Independent forward cursor; any number may be live at once.
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor {
            items: &self.items,
            next: 0,
        }
    }

    fn search(&self, position: usize) -> Result<usize, usize> {
        self.items.binary_search_by_key(&position, |(p, _)| *p)
    }
}

/// Resettable one-pass traversal over an [`EnhancedEffect`].
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    items: &'a [(usize, ProbabilisticAttribute)],
    next: usize,
}

impl<'a> Cursor<'a> {
    pub fn reset(&mut self) {
        self.next = 0;
    }

    pub fn next_item(&mut self) -> Option<(usize, &'a ProbabilisticAttribute)> {
        let (pos, attr) = self.items.get(self.next)?;
        self.next += 1;
        Some((*pos, attr))
    }
}

/// Anticipated change caused by executing a classifier's action.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Effect {
    slots: EnhancedEffect,
}

impl Effect {
    /// Anticipates no change anywhere.
    pub fn pass_through(len: usize) -> Self {
        Self {
            slots: EnhancedEffect::new(len),
        }
    }

    /// Specified (with the `after` symbol) exactly where `before` and `after` differ.
    pub fn for_change(before: &Perception, after: &Perception) -> Self {
        let mut out = Self::pass_through(before.len());
        for idx in before.changed_positions(after) {
            out.slots.insert(after[idx], idx);
        }
        out
    }

    /// Parse a fixed effect string; [`WILDCARD`] marks pass-through positions.
    pub fn fixed(s: &str) -> Self {
        let symbols: Vec<Symbol> = s.chars().collect();
        let mut out = Self::pass_through(symbols.len());
        for (idx, symbol) in symbols.into_iter().enumerate() {
            if symbol != WILDCARD {
                out.slots.insert(symbol, idx);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.len() == 0
    }

    pub fn slots(&self) -> &EnhancedEffect {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut EnhancedEffect {
        &mut self.slots
    }

    pub fn get(&self, position: usize) -> Option<&ProbabilisticAttribute> {
        self.slots.get(position)
    }

    pub fn specified_count(&self) -> usize {
        self.slots.size()
    }

    /// `true` if any position anticipates a change.
    pub fn specifies_change(&self) -> bool {
        !self.slots.is_empty()
    }

    /// `true` if any position tracks more than one symbol.
    pub fn is_enhanced(&self) -> bool {
        self.slots.iter().any(|(_, attr)| attr.is_enhanced())
    }

    /// Pass-through positions must not change; specified positions must change to a symbol the
    /// attribute tracks (staying equal at a specified position is a mismatch).
    pub fn anticipates(&self, before: &Perception, after: &Perception) -> bool {
        if before.len() != self.len() || after.len() != self.len() {
            return false;
        }
        let mut slots = self.slots.iter().peekable();
        for idx in 0..self.len() {
            match slots.next_if(|(pos, _)| *pos == idx) {
                Some((_, attr)) => {
                    if before[idx] == after[idx] || !attr.contains(after[idx]) {
                        return false;
                    }
                }
                None => {
                    if before[idx] != after[idx] {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Whether specifying pass-through positions alone can make this effect anticipate the
    /// transition, i.e. every specified position already agrees with it.
    pub fn is_specializable(&self, before: &Perception, after: &Perception) -> bool {
        if before.len() != self.len() || after.len() != self.len() {
            return false;
        }
        self.slots
            .iter()
            .all(|(idx, attr)| before[idx] != after[idx] && attr.contains(after[idx]))
    }

    /// Whether growing attributes can make this effect anticipate the transition: every
    /// specified position did change, possibly to a symbol not tracked yet.
    pub fn is_enhanceable(&self, before: &Perception, after: &Perception) -> bool {
        if before.len() != self.len() || after.len() != self.len() {
            return false;
        }
        self.slots.iter().all(|(idx, _)| before[idx] != after[idx])
    }

    /// Specify every changed pass-through position with the observed symbol. Returns the
    /// positions that became specified.
    pub fn specialize(&mut self, before: &Perception, after: &Perception) -> Vec<usize> {
        let mut added = Vec::new();
        for idx in before.changed_positions(after) {
            if !self.slots.contains_position(idx) {
                self.slots.insert(after[idx], idx);
                added.push(idx);
            }
        }
        added
    }

    /// Insert the observed symbol at every changed position, merging into existing attributes.
    /// Returns `false` (no-op) unless [`Effect::is_enhanceable`] holds.
    pub fn enhance(&mut self, before: &Perception, after: &Perception) -> bool {
        if !self.is_enhanceable(before, after) {
            return false;
        }
        let mut changed = false;
        for idx in before.changed_positions(after) {
            let had = self.slots.get(idx).is_some_and(|a| a.contains(after[idx]));
            if !had {
                self.slots.insert(after[idx], idx);
                changed = true;
            }
        }
        changed
    }

    /// Shift probability mass toward what was actually observed.
    pub fn reinforce(&mut self, after: &Perception, rate: f64) {
        for (idx, attr) in self.slots.iter_mut() {
            if attr.is_enhanced() {
                if let Some(symbol) = after.get(idx) {
                    attr.reinforce(symbol, rate);
                }
            }
        }
    }

    /// Same specified positions, whatever the symbols there.
    pub fn same_positions(&self, other: &Effect) -> bool {
        self.len() == other.len() && self.slots.positions().eq(other.slots.positions())
    }

    /// Same specified positions with similar attributes.
    pub fn is_similar(&self, other: &Effect) -> bool {
        self.len() == other.len()
            && self.slots.size() == other.slots.size()
            && self
                .slots
                .iter()
                .zip(other.slots.iter())
                .all(|((p1, a1), (p2, a2))| p1 == p2 && a1.is_similar(a2))
    }

    /// Blend two effects position by position with weights `q1` and `q2`. Meant for effects
    /// with [`Effect::same_positions`]; a position only one side specifies is copied as is.
    pub fn merged(e1: &Effect, e2: &Effect, q1: f64, q2: f64) -> Effect {
        let mut out = e1.clone();
        for (idx, attr2) in e2.slots.iter() {
            let attr = match e1.slots.get(idx) {
                Some(attr1) => ProbabilisticAttribute::merged(attr1, attr2, q1, q2),
                None => attr2.clone(),
            };
            out.slots.set(idx, attr);
        }
        out
    }

    /// Most likely next perception given `before`.
    pub fn best_anticipation(&self, before: &Perception) -> Perception {
        Perception::new(
            before
                .iter()
                .enumerate()
                .map(|(idx, s)| self.slots.get(idx).map_or(s, |a| a.best_symbol()))
                .collect(),
        )
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut cursor = self.slots.cursor();
        let mut pending = cursor.next_item();
        for idx in 0..self.len() {
            match pending {
                Some((pos, attr)) if pos == idx => {
                    write!(f, "{attr}")?;
                    pending = cursor.next_item();
                }
                _ => write!(f, "{WILDCARD}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Perception {
        Perception::from(s)
    }

    #[test]
    fn insert_keeps_order_and_merges_duplicates() {
        let mut e = EnhancedEffect::new(6);
        assert!(e.insert('a', 4));
        assert!(e.insert('b', 1));
        assert!(e.insert('c', 4));
        assert_eq!(e.size(), 2);
        assert_eq!(e.positions().collect::<Vec<_>>(), vec![1, 4]);
        let merged = e.get(4).expect("position 4");
        assert!(merged.contains('a') && merged.contains('c'));
        assert!(!e.insert('z', 6));
    }

    #[test]
    fn insert_at_targets_gaps() {
        let mut e = EnhancedEffect::new(5);
        e.insert('x', 1);
        e.insert('x', 3);
        assert_eq!(e.insert_at('a', 0), Some(0));
        assert_eq!(e.insert_at('b', 1), Some(4));
        assert_eq!(e.insert_at('c', 0), Some(2));
        assert_eq!(e.unspecified(), 0);
        assert_eq!(e.insert_at('d', 0), None);
    }

    #[test]
    fn insert_at_out_of_range_is_noop() {
        let mut e = EnhancedEffect::new(3);
        e.insert('x', 0);
        let before = e.clone();
        assert_eq!(e.insert_at('y', 2), None);
        assert_eq!(e, before);
    }

    #[test]
    fn remove_by_key_and_by_ordinal() {
        let mut e = EnhancedEffect::new(4);
        e.insert('a', 0);
        e.insert('b', 2);
        e.insert('c', 3);
        assert!(!e.remove(1));
        assert!(e.remove(2));
        assert!(e.get(2).is_none());
        assert!(e.remove_at(1));
        assert_eq!(e.positions().collect::<Vec<_>>(), vec![0]);
        assert!(!e.remove_at(5));
    }

    #[test]
    fn cursors_are_independent() {
        let mut e = EnhancedEffect::new(3);
        e.insert('a', 0);
        e.insert('b', 2);

        let mut c1 = e.cursor();
        let mut c2 = e.cursor();
        assert_eq!(c1.next_item().map(|(p, _)| p), Some(0));
        assert_eq!(c2.next_item().map(|(p, _)| p), Some(0));
        assert_eq!(c1.next_item().map(|(p, _)| p), Some(2));
        assert!(c1.next_item().is_none());
        c1.reset();
        assert_eq!(c1.next_item().map(|(p, _)| p), Some(0));
        assert_eq!(c2.next_item().map(|(p, _)| p), Some(2));
    }

    #[test]
    fn fixed_effect_anticipation() {
        let e = Effect::fixed("#1#");
        assert!(e.anticipates(&p("000"), &p("010")));
        // Pass-through position changed.
        assert!(!e.anticipates(&p("000"), &p("011")));
        // Specified position did not change.
        assert!(!e.anticipates(&p("010"), &p("010")));
        assert_eq!(e.to_string(), "#1#");
    }

    #[test]
    fn enhanced_effect_accepts_any_tracked_symbol() {
        let mut e = Effect::fixed("1");
        assert!(e.enhance(&p("0"), &p("2")));
        assert!(e.is_enhanced());
        assert!(e.anticipates(&p("0"), &p("1")));
        assert!(e.anticipates(&p("0"), &p("2")));
        assert!(!e.anticipates(&p("0"), &p("0")));
        assert_eq!(e.to_string(), "{1:0.50,2:0.50}");
    }

    #[test]
    fn enhance_refuses_unchanged_specified_position() {
        let mut e = Effect::fixed("1#");
        assert!(!e.enhance(&p("10"), &p("12")));
        assert!(!e.is_enhanced());
    }

    #[test]
    fn specialize_only_fills_pass_through() {
        let mut e = Effect::fixed("#2");
        let added = e.specialize(&p("00"), &p("13"));
        assert_eq!(added, vec![0]);
        assert_eq!(e.to_string(), "12");
    }

    #[test]
    fn merged_effect_blends_shared_positions() {
        let a = Effect::fixed("1#");
        let b = Effect::fixed("2#");
        let m = Effect::merged(&a, &b, 1.0, 1.0);
        let attr = m.get(0).expect("position 0");
        assert!(attr.contains('1') && attr.contains('2'));
        assert!(m.is_similar(&Effect::merged(&b, &a, 1.0, 1.0)));
        assert!(!m.is_similar(&a));
    }

    #[test]
    fn mismatched_perception_length_is_neither_specializable_nor_enhanceable() {
        let e = Effect::fixed("1##");
        assert!(!e.is_specializable(&p("00"), &p("10")));
        assert!(!e.is_enhanceable(&p("00"), &p("10")));
        assert!(!e.is_enhanceable(&p("000"), &p("1")));
        assert!(e.is_enhanceable(&p("000"), &p("200")));
    }

    #[test]
    fn same_positions_ignores_symbols() {
        assert!(Effect::fixed("1#").same_positions(&Effect::fixed("2#")));
        assert!(!Effect::fixed("1#").same_positions(&Effect::fixed("#1")));
        assert!(!Effect::fixed("1#").same_positions(&Effect::fixed("1##")));
    }

    #[test]
    fn reinforce_moves_mass_toward_observation() {
        let mut e = Effect::fixed("1");
        e.enhance(&p("0"), &p("2"));
        e.reinforce(&p("2"), 0.2);
        let attr = e.get(0).expect("position 0");
        assert!(attr.probability('2') > attr.probability('1'));
        assert_eq!(e.best_anticipation(&p("0")), p("2"));
    }
}
