use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::rng::DeterministicRng;
use crate::{AcsConfig, Condition, Effect, Mark, Perception};

/// Stable identifier of a classifier inside one [`crate::Population`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ClassifierId(pub u64);

/// Index into the environment's action list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Action(pub usize);

impl fmt::Display for ClassifierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One condition-action-effect rule with its learned statistics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Classifier {
    pub condition: Condition,
    pub action: Action,
    pub effect: Effect,
    pub mark: Mark,
    /// Quality: how often the effect was anticipated correctly.
    pub q: f64,
    /// Reward prediction.
    pub r: f64,
    /// Immediate reward prediction.
    pub ir: f64,
    /// Numerosity (macro-classifier multiplicity).
    pub num: u32,
    /// Number of ALP applications.
    pub exp: u64,
    /// Time of the last GA application in an action set holding this classifier.
    pub tga: u64,
    /// Time of the last ALP application.
    pub talp: u64,
    /// Average interval between ALP applications.
    pub tav: f64,
    /// Average numerosity of the action sets this classifier took part in.
    pub avg_action_set_size: f64,
    /// Set when the classifier keeps failing in the same context and may be merged into an
    /// enhanced effect.
    pub ee: bool,
}

impl Classifier {
    pub fn new(condition: Condition, action: Action, effect: Effect, config: &AcsConfig, time: u64) -> Self {
        let len = condition.len();
        Self {
            condition,
            action,
            effect,
            mark: Mark::new(len),
            q: config.q_ini,
            r: config.r_ini,
            ir: 0.0,
            num: 1,
            exp: 0,
            tga: time,
            talp: time,
            tav: 0.0,
            avg_action_set_size: 1.0,
            ee: false,
        }
    }

    /// Fully general, anticipates no change.
    pub fn general(len: usize, action: Action, config: &AcsConfig, time: u64) -> Self {
        Self::new(
            Condition::general(len),
            action,
            Effect::pass_through(len),
            config,
            time,
        )
    }

    /// Classifier built from an observed transition: specified exactly where it changed.
    pub fn cover_transition(
        before: &Perception,
        action: Action,
        after: &Perception,
        config: &AcsConfig,
        time: u64,
    ) -> Self {
        let mut condition = Condition::general(before.len());
        for idx in before.changed_positions(after) {
            condition.specialize(idx, before[idx]);
        }
        let mut cl = Self::new(
            condition,
            action,
            Effect::for_change(before, after),
            config,
            time,
        );
        cl.exp = 1;
        cl
    }

    /// Fresh offspring: same rule and estimates, bookkeeping reset.
    pub fn copy_from(&self, time: u64) -> Self {
        Self {
            condition: self.condition.clone(),
            action: self.action,
            effect: self.effect.clone(),
            mark: Mark::new(self.condition.len()),
            q: self.q,
            r: self.r,
            ir: self.ir,
            num: 1,
            exp: 0,
            tga: time,
            talp: time,
            tav: self.tav,
            avg_action_set_size: self.avg_action_set_size,
            ee: false,
        }
    }

    pub fn fitness(&self) -> f64 {
        self.q * self.r
    }

    pub fn is_reliable(&self, theta_r: f64) -> bool {
        self.q > theta_r
    }

    pub fn is_inadequate(&self, theta_i: f64) -> bool {
        self.q < theta_i
    }

    pub fn increase_quality(&mut self, beta: f64) {
        self.q = (self.q + beta * (1.0 - self.q)).clamp(0.0, 1.0);
    }

    pub fn decrease_quality(&mut self, beta: f64) {
        self.q = (self.q - beta * self.q).clamp(0.0, 1.0);
    }

    pub fn matches(&self, perception: &Perception) -> bool {
        self.condition.matches(perception)
    }

    pub fn anticipates(&self, before: &Perception, after: &Perception) -> bool {
        self.effect.anticipates(before, after)
    }

    /// Moyenne adaptive modifiee: plain average for the first `1/beta` samples, then a
    /// Widrow-Hoff update.
    fn adapt(value: f64, target: f64, exp: u64, beta: f64) -> f64 {
        if (exp as f64) < 1.0 / beta {
            value + (target - value) / exp.max(1) as f64
        } else {
            value + beta * (target - value)
        }
    }

    /// Record an ALP application at `time`. Call after incrementing `exp`.
    pub fn set_alp_timestamp(&mut self, time: u64, beta: f64) {
        let interval = time.saturating_sub(self.talp) as f64;
        self.tav = Self::adapt(self.tav, interval, self.exp, beta);
        self.talp = time;
    }

    pub fn update_action_set_size(&mut self, action_set_size: u32, beta: f64) {
        self.avg_action_set_size = Self::adapt(
            self.avg_action_set_size,
            action_set_size as f64,
            self.exp,
            beta,
        );
    }

    /// Record the perception at the wildcard positions. Returns `true` if the mark changed.
    pub fn set_mark(&mut self, perception: &Perception) -> bool {
        self.mark.set_with_condition(&self.condition, perception)
    }

    pub fn is_marked(&self) -> bool {
        self.mark.is_marked()
    }

    /// Strictly fewer specified condition positions.
    pub fn is_more_general(&self, other: &Classifier) -> bool {
        self.condition.specificity() < other.condition.specificity()
    }

    /// Same condition, action and effect symbols.
    pub fn is_similar(&self, other: &Classifier) -> bool {
        self.action == other.action
            && self.condition == other.condition
            && self.effect.is_similar(&other.effect)
    }

    /// Experienced, reliable and not marked.
    pub fn is_subsumer(&self, theta_exp: u64, theta_r: f64) -> bool {
        self.exp > theta_exp && self.is_reliable(theta_r) && !self.is_marked()
    }

    pub fn does_subsume(&self, other: &Classifier, theta_exp: u64, theta_r: f64) -> bool {
        self.is_subsumer(theta_exp, theta_r)
            && self.action == other.action
            && self.is_more_general(other)
            && self.condition.subsumes(&other.condition)
            && self.effect.is_similar(&other.effect)
    }

    /// Specify the effect at every changed pass-through position and the condition with the
    /// prior value there.
    pub fn specialize(&mut self, before: &Perception, after: &Perception) {
        for idx in self.effect.specialize(before, after) {
            self.condition.specialize(idx, before[idx]);
        }
    }

    /// Grow the effect's attributes with the observed outcome and pin the condition at any newly
    /// specified position. Returns `false` if the effect could not be enhanced.
    pub fn enhance(&mut self, before: &Perception, after: &Perception) -> bool {
        let had: Vec<usize> = self.effect.slots().positions().collect();
        if !self.effect.enhance(before, after) {
            return false;
        }
        for idx in before.changed_positions(after) {
            if !had.contains(&idx) {
                self.condition.specialize(idx, before[idx]);
            }
        }
        true
    }

    /// Condition positions that are specified while the effect passes them through.
    pub fn specified_unchanging_attributes(&self) -> Vec<usize> {
        self.condition
            .specified_positions()
            .filter(|idx| !self.effect.slots().contains_position(*idx))
            .collect()
    }

    /// Generalize one uniformly chosen specified unchanging position.
    pub fn generalize_unchanging_attribute(&mut self, rng: &mut impl DeterministicRng) -> Option<usize> {
        let candidates = self.specified_unchanging_attributes();
        if candidates.is_empty() {
            return None;
        }
        let idx = candidates[rng.next_index(candidates.len())];
        self.condition.generalize(idx);
        Some(idx)
    }

    /// Combine two classifiers that fail in the same context into one with an enhanced effect.
    pub fn merge_with(&self, other: &Classifier, time: u64, q_ini: f64) -> Classifier {
        let mut condition = self.condition.clone();
        condition.specialize_with(&other.condition);
        let len = condition.len();
        Classifier {
            condition,
            action: self.action,
            effect: Effect::merged(&self.effect, &other.effect, self.q, other.q),
            mark: Mark::new(len),
            q: ((self.q + other.q) / 2.0).max(q_ini),
            r: (self.r + other.r) / 2.0,
            ir: (self.ir + other.ir) / 2.0,
            num: 1,
            exp: 0,
            tga: time,
            talp: time,
            tav: 0.0,
            avg_action_set_size: (self.avg_action_set_size + other.avg_action_set_size) / 2.0,
            ee: false,
        }
    }
}

impl fmt::Display for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{} q:{:.3} r:{:.2} ir:{:.2} num:{} exp:{}",
            self.condition, self.action, self.effect, self.q, self.r, self.ir, self.num, self.exp
        )?;
        if self.is_marked() {
            write!(f, " mark:{}", self.mark)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SplitMix64;

    fn p(s: &str) -> Perception {
        Perception::from(s)
    }

    fn cfg() -> AcsConfig {
        AcsConfig::default()
    }

    #[test]
    fn quality_stays_in_unit_interval() {
        let mut cl = Classifier::general(2, Action(0), &cfg(), 0);
        for _ in 0..200 {
            cl.increase_quality(0.3);
        }
        assert!(cl.q <= 1.0 && cl.q > 0.99);
        for _ in 0..200 {
            cl.decrease_quality(0.3);
        }
        assert!(cl.q >= 0.0 && cl.q < 0.01);
    }

    #[test]
    fn covering_a_transition_specifies_changes_only() {
        let cl = Classifier::cover_transition(&p("010"), Action(1), &p("110"), &cfg(), 5);
        assert_eq!(cl.condition, Condition::from("0##"));
        assert_eq!(cl.effect.to_string(), "1##");
        assert!(cl.matches(&p("010")));
        assert!(cl.anticipates(&p("010"), &p("110")));
        assert_eq!(cl.tga, 5);
    }

    #[test]
    fn specialize_pins_condition_to_prior_values() {
        let mut cl = Classifier::general(3, Action(0), &cfg(), 0);
        cl.specialize(&p("000"), &p("101"));
        assert_eq!(cl.condition, Condition::from("0#0"));
        assert_eq!(cl.effect.to_string(), "1#1");
        assert!(cl.specified_unchanging_attributes().is_empty());
    }

    #[test]
    fn subsumption_requires_experience_and_generality() {
        let mut general = Classifier::new(
            Condition::from("#1"),
            Action(0),
            Effect::fixed("1#"),
            &cfg(),
            0,
        );
        let specific = Classifier::new(
            Condition::from("01"),
            Action(0),
            Effect::fixed("1#"),
            &cfg(),
            0,
        );
        assert!(!general.does_subsume(&specific, 20, 0.9));
        general.exp = 21;
        general.q = 0.95;
        assert!(general.does_subsume(&specific, 20, 0.9));
        general.set_mark(&p("01"));
        assert!(!general.does_subsume(&specific, 20, 0.9));
    }

    #[test]
    fn alp_timestamp_tracks_average_interval() {
        let mut cl = Classifier::general(1, Action(0), &cfg(), 0);
        cl.exp = 1;
        cl.set_alp_timestamp(10, 0.05);
        assert!((cl.tav - 10.0).abs() < 1e-9);
        cl.exp = 2;
        cl.set_alp_timestamp(14, 0.05);
        assert!((cl.tav - 7.0).abs() < 1e-9);
        assert_eq!(cl.talp, 14);
    }

    #[test]
    fn unchanging_attributes_can_be_generalized() {
        let mut rng = SplitMix64::new(9);
        let mut cl = Classifier::new(
            Condition::from("012"),
            Action(0),
            Effect::fixed("#3#"),
            &cfg(),
            0,
        );
        assert_eq!(cl.specified_unchanging_attributes(), vec![0, 2]);
        let idx = cl.generalize_unchanging_attribute(&mut rng).expect("candidate");
        assert!(idx == 0 || idx == 2);
        assert_eq!(cl.condition.specificity(), 2);
    }

    #[test]
    fn merge_produces_enhanced_effect() {
        let c = cfg();
        let mut a = Classifier::new(Condition::from("0#"), Action(0), Effect::fixed("1#"), &c, 0);
        let mut b = Classifier::new(Condition::from("#0"), Action(0), Effect::fixed("2#"), &c, 0);
        a.q = 0.2;
        b.q = 0.4;
        let m = a.merge_with(&b, 7, c.q_ini);
        assert_eq!(m.condition, Condition::from("00"));
        assert!(m.effect.is_enhanced());
        assert!(m.anticipates(&p("00"), &p("10")));
        assert!(m.anticipates(&p("00"), &p("20")));
        assert!((m.q - c.q_ini).abs() < 1e-9);
        assert_eq!(m.talp, 7);
    }
}
