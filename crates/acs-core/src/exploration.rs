use crate::rng::DeterministicRng;
use crate::{AcsContext, Action, BiasMethod, Exploration, MatchSet, Population};

/// Epsilon-greedy choice over `match_set`, optionally with a biased exploration step.
pub fn choose_action(ctx: &mut AcsContext, population: &Population, match_set: &MatchSet) -> Action {
    if ctx.rng.chance(ctx.config.epsilon) {
        return match ctx.config.exploration {
            Exploration::EpsilonGreedy => random_action(ctx),
            Exploration::Biased {
                bias_probability,
                method,
            } => {
                if ctx.rng.chance(bias_probability) {
                    biased_action(ctx, population, match_set, method)
                } else {
                    random_action(ctx)
                }
            }
        };
    }
    best_action(ctx, population, match_set)
}

/// Greedy choice: highest `q * r`, random if the match set is empty.
pub fn best_action(ctx: &mut AcsContext, population: &Population, match_set: &MatchSet) -> Action {
    match match_set.best_qr_action(population) {
        Some(action) => action,
        None => random_action(ctx),
    }
}

fn random_action(ctx: &mut AcsContext) -> Action {
    Action(ctx.rng.next_index(ctx.action_count))
}

fn biased_action(ctx: &mut AcsContext, population: &Population, match_set: &MatchSet, method: BiasMethod) -> Action {
    let method = match method {
        BiasMethod::Mixed if ctx.rng.next_bool() => BiasMethod::ActionDelay,
        BiasMethod::Mixed => BiasMethod::KnowledgeArray,
        other => other,
    };
    match method {
        BiasMethod::KnowledgeArray => knowledge_array_action(ctx, population, match_set),
        _ => action_delay_action(ctx, population, match_set),
    }
}

/// Action whose classifiers were least recently updated by the ALP; actions nobody proposes
/// come first.
fn action_delay_action(ctx: &AcsContext, population: &Population, match_set: &MatchSet) -> Action {
    if let Some(action) = unseen_action(ctx, population, match_set) {
        return action;
    }
    let mut oldest: Option<(u64, Action)> = None;
    for (_, cl) in match_set.classifiers(population) {
        if oldest.is_none_or(|(talp, _)| cl.talp < talp) {
            oldest = Some((cl.talp, cl.action));
        }
    }
    oldest.map_or(Action(0), |(_, action)| action)
}

/// Action with the lowest numerosity-weighted quality; actions nobody proposes come first.
fn knowledge_array_action(ctx: &AcsContext, population: &Population, match_set: &MatchSet) -> Action {
    if let Some(action) = unseen_action(ctx, population, match_set) {
        return action;
    }
    let mut quality = vec![0.0; ctx.action_count];
    let mut num = vec![0.0; ctx.action_count];
    for (_, cl) in match_set.classifiers(population) {
        if let (Some(q), Some(n)) = (quality.get_mut(cl.action.0), num.get_mut(cl.action.0)) {
            *q += cl.q * cl.num as f64;
            *n += cl.num as f64;
        }
    }

    let mut lowest: Option<(f64, Action)> = None;
    for (idx, (q, n)) in quality.iter().zip(num.iter()).enumerate() {
        let avg = q / n;
        if lowest.is_none_or(|(best, _)| avg < best) {
            lowest = Some((avg, Action(idx)));
        }
    }
    lowest.map_or(Action(0), |(_, action)| action)
}

fn unseen_action(ctx: &AcsContext, population: &Population, match_set: &MatchSet) -> Option<Action> {
    ctx.actions()
        .find(|action| !match_set.classifiers(population).any(|(_, cl)| cl.action == *action))
}
