//! Classifier storage and the non-owning match/action set views over it.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::rng::DeterministicRng;
use crate::{AcsContext, Action, Classifier, ClassifierId, Condition, Effect, Perception, WILDCARD};

/// Owns every classifier. Iteration order is id order, so runs are reproducible.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Population {
    classifiers: BTreeMap<ClassifierId, Classifier>,
    next_id: u64,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    /// One fully general, pass-through classifier per action.
    pub fn with_general_classifiers(ctx: &AcsContext) -> Self {
        let mut pop = Self::new();
        for action in ctx.actions() {
            pop.insert(Classifier::general(
                ctx.perception_length,
                action,
                &ctx.config,
                ctx.time,
            ));
        }
        pop
    }

    /// Number of macro-classifiers.
    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }

    /// Summed numerosity.
    pub fn num_size(&self) -> u64 {
        self.classifiers.values().map(|cl| cl.num as u64).sum()
    }

    pub fn get(&self, id: ClassifierId) -> Option<&Classifier> {
        self.classifiers.get(&id)
    }

    pub fn get_mut(&mut self, id: ClassifierId) -> Option<&mut Classifier> {
        self.classifiers.get_mut(&id)
    }

    pub fn contains(&self, id: ClassifierId) -> bool {
        self.classifiers.contains_key(&id)
    }

    pub fn insert(&mut self, classifier: Classifier) -> ClassifierId {
        let id = ClassifierId(self.next_id);
        self.next_id += 1;
        self.classifiers.insert(id, classifier);
        id
    }

    pub fn remove(&mut self, id: ClassifierId) -> Option<Classifier> {
        self.classifiers.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClassifierId, &Classifier)> + '_ {
        self.classifiers.iter().map(|(id, cl)| (*id, cl))
    }

    /// View over the whole population.
    pub fn all(&self) -> ClassifierSet {
        ClassifierSet::from_ids(self.classifiers.keys().copied().collect())
    }

    /// Classifiers whose quality exceeds `theta_r`.
    pub fn reliable(&self, theta_r: f64) -> ClassifierSet {
        ClassifierSet::from_ids(
            self.iter()
                .filter(|(_, cl)| cl.is_reliable(theta_r))
                .map(|(id, _)| id)
                .collect(),
        )
    }

    /// Classifiers matching `perception`, covering every action nobody proposes yet.
    pub fn match_set(&mut self, ctx: &mut AcsContext, perception: &Perception) -> MatchSet {
        let mut set: ClassifierSet = ClassifierSet::from_ids(
            self.iter()
                .filter(|(_, cl)| cl.matches(perception))
                .map(|(id, _)| id)
                .collect(),
        );

        let actions: Vec<Action> = ctx.actions().collect();
        for action in actions {
            let covered = set
                .classifiers(self)
                .any(|(_, cl)| cl.action == action);
            if covered {
                continue;
            }
            let cl = self.cover(ctx, perception, action);
            let id = self.insert(cl);
            tracing::debug!(classifier = %id, action = %action, perception = %perception, "Covering");
            set.push(id);
        }

        MatchSet {
            perception: perception.clone(),
            set,
        }
    }

    fn cover(&self, ctx: &mut AcsContext, perception: &Perception, action: Action) -> Classifier {
        let specificity = ctx.config.cover_specificity;
        let condition = Condition::new(
            perception
                .iter()
                .map(|s| if ctx.rng.chance(specificity) { s } else { WILDCARD })
                .collect(),
        );
        Classifier::new(
            condition,
            action,
            Effect::pass_through(perception.len()),
            &ctx.config,
            ctx.time,
        )
    }

    /// Lowest quality first, then highest specificity, then lowest numerosity.
    pub fn select_victim(&self, candidates: impl IntoIterator<Item = ClassifierId>) -> Option<ClassifierId> {
        candidates
            .into_iter()
            .filter_map(|id| self.get(id).map(|cl| (id, cl)))
            .min_by(|(_, a), (_, b)| {
                a.q.total_cmp(&b.q)
                    .then_with(|| b.condition.specificity().cmp(&a.condition.specificity()))
                    .then_with(|| a.num.cmp(&b.num))
            })
            .map(|(id, _)| id)
    }

    /// Remove one micro-classifier. Returns `true` if the macro-classifier disappeared.
    pub fn decrement(&mut self, id: ClassifierId) -> bool {
        let Some(cl) = self.classifiers.get_mut(&id) else {
            return false;
        };
        if cl.num > 1 {
            cl.num -= 1;
            return false;
        }
        self.classifiers.remove(&id);
        true
    }

    /// Delete micro-classifiers until the summed numerosity is at most `max`. Returns the ids
    /// that were removed entirely.
    pub fn enforce_limit(&mut self, max: usize) -> Vec<ClassifierId> {
        let mut removed = Vec::new();
        while self.num_size() > max as u64 {
            let Some(victim) = self.select_victim(self.classifiers.keys().copied()) else {
                break;
            };
            if self.decrement(victim) {
                tracing::debug!(classifier = %victim, "Deleted to respect population limit");
                removed.push(victim);
            }
        }
        removed
    }

    /// Numerosity-weighted fraction of specified condition positions.
    pub fn specificity(&self) -> f64 {
        self.all().specificity(self)
    }
}

/// Ordered list of classifier ids; does not own the classifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifierSet {
    ids: Vec<ClassifierId>,
}

impl ClassifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids(ids: Vec<ClassifierId>) -> Self {
        Self { ids }
    }

    pub fn ids(&self) -> &[ClassifierId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: ClassifierId) -> bool {
        self.ids.contains(&id)
    }

    pub fn push(&mut self, id: ClassifierId) {
        if !self.ids.contains(&id) {
            self.ids.push(id);
        }
    }

    pub fn remove(&mut self, id: ClassifierId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|x| *x != id);
        self.ids.len() != before
    }

    /// Live classifiers in set order; stale ids are skipped.
    pub fn classifiers<'a>(
        &'a self,
        population: &'a Population,
    ) -> impl Iterator<Item = (ClassifierId, &'a Classifier)> + 'a {
        self.ids
            .iter()
            .filter_map(move |id| population.get(*id).map(|cl| (*id, cl)))
    }

    pub fn num_size(&self, population: &Population) -> u64 {
        self.classifiers(population).map(|(_, cl)| cl.num as u64).sum()
    }

    /// Bootstrap target for the reward update: `max(q * r)`, 0 for an empty set.
    pub fn max_qr(&self, population: &Population) -> f64 {
        self.classifiers(population)
            .map(|(_, cl)| cl.fitness())
            .fold(0.0, f64::max)
    }

    /// Numerosity-weighted fraction of specified condition positions, 0 for an empty set.
    pub fn specificity(&self, population: &Population) -> f64 {
        let mut specified = 0.0;
        let mut total = 0.0;
        for (_, cl) in self.classifiers(population) {
            specified += (cl.condition.specificity() * cl.num as usize) as f64;
            total += (cl.condition.len() * cl.num as usize) as f64;
        }
        if total > 0.0 {
            specified / total
        } else {
            0.0
        }
    }

    /// Whether a reliable classifier matches `before`, proposes `action` and anticipates `after`.
    pub fn exist_classifier(
        &self,
        population: &Population,
        before: &Perception,
        action: Action,
        after: &Perception,
        theta_r: f64,
    ) -> bool {
        self.classifiers(population).any(|(_, cl)| {
            cl.is_reliable(theta_r)
                && cl.action == action
                && cl.matches(before)
                && cl.anticipates(before, after)
        })
    }

    /// Action of the classifier with the highest `q * r`, preferring classifiers that anticipate
    /// a change. Ties go to the earlier classifier.
    pub fn best_qr_action(&self, population: &Population) -> Option<Action> {
        let best = |changing_only: bool| {
            let mut best: Option<(f64, Action)> = None;
            for (_, cl) in self.classifiers(population) {
                if changing_only && !cl.effect.specifies_change() {
                    continue;
                }
                let fitness = cl.fitness();
                if best.is_none_or(|(b, _)| fitness > b) {
                    best = Some((fitness, cl.action));
                }
            }
            best.map(|(_, action)| action)
        };
        best(true).or_else(|| best(false))
    }

    pub fn filter_action(&self, population: &Population, action: Action) -> ClassifierSet {
        ClassifierSet::from_ids(
            self.classifiers(population)
                .filter(|(_, cl)| cl.action == action)
                .map(|(id, _)| id)
                .collect(),
        )
    }

    /// Uniformly chosen live member.
    pub fn pick(&self, population: &Population, rng: &mut impl DeterministicRng) -> Option<ClassifierId> {
        let live: Vec<ClassifierId> = self.classifiers(population).map(|(id, _)| id).collect();
        if live.is_empty() {
            return None;
        }
        Some(live[rng.next_index(live.len())])
    }
}

/// Classifiers matching one perception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSet {
    pub perception: Perception,
    set: ClassifierSet,
}

impl MatchSet {
    pub fn action_set(&self, population: &Population, action: Action) -> ActionSet {
        ActionSet {
            action,
            set: self.set.filter_action(population, action),
        }
    }
}

impl Deref for MatchSet {
    type Target = ClassifierSet;

    fn deref(&self) -> &ClassifierSet {
        &self.set
    }
}

impl DerefMut for MatchSet {
    fn deref_mut(&mut self) -> &mut ClassifierSet {
        &mut self.set
    }
}

/// Members of a match set that propose one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSet {
    pub action: Action,
    set: ClassifierSet,
}

impl ActionSet {
    pub fn new(action: Action, set: ClassifierSet) -> Self {
        Self { action, set }
    }
}

impl Deref for ActionSet {
    type Target = ClassifierSet;

    fn deref(&self) -> &ClassifierSet {
        &self.set
    }
}

impl DerefMut for ActionSet {
    fn deref_mut(&mut self) -> &mut ClassifierSet {
        &mut self.set
    }
}
