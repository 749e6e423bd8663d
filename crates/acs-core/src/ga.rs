//! Genetic generalization in action sets, with subsumption and action-set size control.

use crate::alp::find_subsumer;
use crate::rng::DeterministicRng;
use crate::{
    AcsContext, ActionSet, Classifier, ClassifierId, ClassifierSet, Crossover, MatchSet, Perception,
    Population, Selection,
};

/// What one GA invocation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GaOutcome {
    pub fired: bool,
    /// Micro-classifiers added, either inserted or absorbed by a subsumer.
    pub offspring: usize,
    /// Micro-classifiers deleted to keep the action set within `theta_as`.
    pub deleted: usize,
}

/// Whether the numerosity-weighted average GA timestamp of `set` lags `time` by more than
/// `theta_ga`.
pub fn should_apply(population: &Population, set: &ClassifierSet, time: u64, theta_ga: u64) -> bool {
    let mut weighted = 0.0;
    let mut num = 0u64;
    for (_, cl) in set.classifiers(population) {
        weighted += cl.tga as f64 * cl.num as f64;
        num += cl.num as u64;
    }
    num > 0 && time as f64 - weighted / num as f64 > theta_ga as f64
}

/// Run the GA on `action_set` if it is due.
///
/// `before` is the perception the action set was formed from; mutation specializes with it so
/// offspring still match that situation. Offspring matching `after` also join `match_set`.
pub fn apply_ga(
    ctx: &mut AcsContext,
    population: &mut Population,
    action_set: &mut ActionSet,
    mut match_set: Option<&mut MatchSet>,
    before: &Perception,
    after: &Perception,
) -> GaOutcome {
    let mut outcome = GaOutcome::default();
    if !should_apply(population, action_set, ctx.time, ctx.config.theta_ga) {
        return outcome;
    }
    outcome.fired = true;

    for id in action_set.ids() {
        if let Some(cl) = population.get_mut(*id) {
            cl.tga = ctx.time;
        }
    }

    let (Some(id1), Some(id2)) = (
        select_parent(ctx, population, action_set),
        select_parent(ctx, population, action_set),
    ) else {
        return outcome;
    };
    let (Some(parent1), Some(parent2)) = (population.get(id1), population.get(id2)) else {
        return outcome;
    };
    let mut child1 = parent1.copy_from(ctx.time);
    let mut child2 = parent2.copy_from(ctx.time);

    mutate(&mut child1, ctx.config.mu, before, &mut ctx.rng);
    mutate(&mut child2, ctx.config.mu, before, &mut ctx.rng);

    if ctx.rng.chance(ctx.config.chi) && child1.effect.is_similar(&child2.effect) {
        crossover(&mut child1, &mut child2, ctx.config.crossover, &mut ctx.rng);
    }
    child1.q /= 2.0;
    child2.q /= 2.0;

    let children: Vec<Classifier> = [child1, child2]
        .into_iter()
        .filter(|cl| cl.condition.specificity() > 0)
        .collect();

    let theta_as = ctx.config.theta_as as u64;
    while action_set.num_size(population) + children.len() as u64 > theta_as {
        let Some(victim) = population.select_victim(action_set.ids().iter().copied()) else {
            break;
        };
        if population.decrement(victim) {
            action_set.remove(victim);
            if let Some(ms) = match_set.as_deref_mut() {
                ms.remove(victim);
            }
        }
        outcome.deleted += 1;
    }

    // At most one new macro-classifier per pass; further novel offspring are discarded.
    let mut inserted = false;
    for child in children {
        let Some(child) = absorb_ga_classifier(ctx, population, action_set, child) else {
            outcome.offspring += 1;
            continue;
        };
        if inserted {
            tracing::trace!(step = ctx.time, classifier = %child, "Discarded second novel GA offspring");
            continue;
        }
        let matches = child.matches(after);
        let id = population.insert(child);
        action_set.push(id);
        if matches {
            if let Some(ms) = match_set.as_deref_mut() {
                ms.push(id);
            }
        }
        inserted = true;
        outcome.offspring += 1;
    }

    tracing::debug!(
        step = ctx.time,
        action = %action_set.action,
        offspring = outcome.offspring,
        deleted = outcome.deleted,
        "Applied GA"
    );
    outcome
}

fn select_parent(ctx: &mut AcsContext, population: &Population, set: &ClassifierSet) -> Option<ClassifierId> {
    match ctx.config.selection {
        Selection::RouletteWheel => roulette(population, set, &mut ctx.rng),
        Selection::Tournament => tournament(population, set, ctx.config.tournament_size, &mut ctx.rng),
    }
}

/// Fitness-proportionate over `q * r * num`; uniform if every weight is zero.
fn roulette(population: &Population, set: &ClassifierSet, rng: &mut impl DeterministicRng) -> Option<ClassifierId> {
    let weighted: Vec<(ClassifierId, f64)> = set
        .classifiers(population)
        .map(|(id, cl)| (id, (cl.fitness() * cl.num as f64).max(0.0)))
        .collect();
    let total: f64 = weighted.iter().map(|(_, w)| w).sum();
    if !(total > 0.0 && total.is_finite()) {
        return set.pick(population, rng);
    }

    let mut point = rng.next_f64() * total;
    for (id, w) in &weighted {
        if point < *w {
            return Some(*id);
        }
        point -= w;
    }
    weighted.last().map(|(id, _)| *id)
}

fn tournament(
    population: &Population,
    set: &ClassifierSet,
    fraction: f64,
    rng: &mut impl DeterministicRng,
) -> Option<ClassifierId> {
    let live: Vec<(ClassifierId, f64)> = set
        .classifiers(population)
        .map(|(id, cl)| (id, cl.fitness()))
        .collect();
    if live.is_empty() {
        return None;
    }
    let size = ((fraction * live.len() as f64).ceil() as usize).max(1);
    let mut best: Option<(ClassifierId, f64)> = None;
    for _ in 0..size {
        let entry = live[rng.next_index(live.len())];
        if best.is_none_or(|(_, f)| entry.1 > f) {
            best = Some(entry);
        }
    }
    best.map(|(id, _)| id)
}

/// Flip each condition position with probability `mu`: specified positions become wildcards,
/// wildcards take the perceived symbol.
fn mutate(cl: &mut Classifier, mu: f64, perception: &Perception, rng: &mut impl DeterministicRng) {
    for idx in 0..cl.condition.len() {
        if !rng.chance(mu) {
            continue;
        }
        if cl.condition.is_wildcard(idx) {
            if let Some(symbol) = perception.get(idx) {
                cl.condition.specialize(idx, symbol);
            }
        } else {
            cl.condition.generalize(idx);
        }
    }
}

fn crossover(a: &mut Classifier, b: &mut Classifier, method: Crossover, rng: &mut impl DeterministicRng) {
    let len = a.condition.len();
    let (from, to) = match method {
        Crossover::OnePoint => (rng.next_index(len + 1), len),
        Crossover::TwoPoint => {
            let x = rng.next_index(len + 1);
            let y = rng.next_index(len + 1);
            (x.min(y), x.max(y))
        }
    };
    a.condition.swap_range(&mut b.condition, from, to);

    let q = (a.q + b.q) / 2.0;
    let r = (a.r + b.r) / 2.0;
    a.q = q;
    b.q = q;
    a.r = r;
    b.r = r;
}

/// A subsumer or identical classifier in the action set absorbs `child`. Returns the child when
/// nothing absorbed it.
fn absorb_ga_classifier(
    ctx: &AcsContext,
    population: &mut Population,
    action_set: &ActionSet,
    child: Classifier,
) -> Option<Classifier> {
    let cfg = &ctx.config;
    let subsumer = if cfg.enable_subsumption {
        find_subsumer(population, action_set, &child, cfg.theta_exp, cfg.theta_r)
    } else {
        None
    };
    let existing = subsumer.or_else(|| {
        action_set
            .classifiers(population)
            .find(|(_, cl)| cl.is_similar(&child))
            .map(|(id, _)| id)
    });

    match existing.and_then(|id| population.get_mut(id).map(|cl| (id, cl))) {
        Some((id, cl)) => {
            cl.num += 1;
            if subsumer.is_some() {
                tracing::debug!(classifier = %id, num = cl.num, "Subsumed GA offspring");
            }
            None
        }
        None => Some(child),
    }
}
