//! Anticipatory learning process: compares each classifier's anticipation with the observed
//! transition and specializes, enhances, creates or removes classifiers accordingly.

use crate::rng::DeterministicRng;
use crate::{AcsContext, ActionSet, Classifier, ClassifierId, Condition, MatchSet, Perception, Population};

/// Run the ALP over `action_set` for the transition `before -> after`.
///
/// New classifiers are inserted into the population and the action set, and into `match_set`
/// when they match `after`. Inadequate classifiers are removed from all three.
pub fn apply_alp(
    ctx: &mut AcsContext,
    population: &mut Population,
    action_set: &mut ActionSet,
    mut match_set: Option<&mut MatchSet>,
    before: &Perception,
    after: &Perception,
) {
    let time = ctx.time;
    let beta = ctx.config.beta;
    let set_size = action_set.num_size(population).min(u32::MAX as u64) as u32;
    let mut new_list: Vec<Classifier> = Vec::new();
    let mut was_expected_case = false;

    for id in action_set.ids().to_vec() {
        let Some(cl) = population.get_mut(id) else {
            continue;
        };
        cl.exp += 1;
        cl.update_action_set_size(set_size, beta);
        cl.set_alp_timestamp(time, beta);

        let (child, inadequate, enhanced) = if cl.anticipates(before, after) {
            was_expected_case = true;
            (expected_case(ctx, cl, before, after), false, false)
        } else {
            let (child, enhanced) = unexpected_case(ctx, cl, before, after);
            (child, cl.is_inadequate(ctx.config.theta_i), enhanced)
        };

        if inadequate {
            population.remove(id);
            action_set.remove(id);
            if let Some(ms) = match_set.as_deref_mut() {
                ms.remove(id);
            }
            tracing::debug!(classifier = %id, "Removed inadequate classifier");
        } else if enhanced {
            fold_enhanced(population, action_set, match_set.as_deref_mut(), id);
        }

        if let Some(mut child) = child {
            child.tga = time;
            add_alp_classifier(ctx, population, action_set, &mut new_list, child);
        }
    }

    if !was_expected_case {
        let cover = Classifier::cover_transition(before, action_set.action, after, &ctx.config, time);
        add_alp_classifier(ctx, population, action_set, &mut new_list, cover);
    }

    if ctx.config.enable_pee {
        if let Some(merged) = merge_enhanceable(ctx, population, action_set) {
            add_alp_classifier(ctx, population, action_set, &mut new_list, merged);
        }
    }

    for cl in new_list {
        let matches = cl.matches(after);
        let id = population.insert(cl);
        action_set.push(id);
        if matches {
            if let Some(ms) = match_set.as_deref_mut() {
                ms.push(id);
            }
        }
        tracing::trace!(classifier = %id, step = time, "Inserted ALP classifier");
    }
}

/// Correct anticipation. Returns a child specialized by the mark if the classifier was marked.
fn expected_case(
    ctx: &mut AcsContext,
    cl: &mut Classifier,
    before: &Perception,
    after: &Perception,
) -> Option<Classifier> {
    let cfg = &ctx.config;
    let child = if cl.is_marked() {
        let diff = cl.mark.differences(before, &mut ctx.rng);
        specialize_by_mark(cl, diff, cfg.u_max, cfg.q_ini, ctx.time, &mut ctx.rng)
    } else {
        None
    };

    if cfg.enable_pee {
        cl.effect.reinforce(after, cfg.beta);
    }
    cl.increase_quality(cfg.beta);
    cl.mark.clear();
    child
}

/// Copy of `cl` with `diff` folded into its condition, keeping at most `u_max` specified
/// unchanging positions.
fn specialize_by_mark(
    cl: &Classifier,
    mut diff: Condition,
    u_max: Option<usize>,
    q_ini: f64,
    time: u64,
    rng: &mut impl DeterministicRng,
) -> Option<Classifier> {
    if diff.specificity() == 0 {
        return None;
    }
    let mut child = cl.copy_from(time);

    if let Some(u_max) = u_max {
        let mut no_spec = child.specified_unchanging_attributes().len();
        let mut no_spec_new = diff.specificity();
        if no_spec >= u_max {
            while no_spec >= u_max && child.generalize_unchanging_attribute(rng).is_some() {
                no_spec -= 1;
            }
            while no_spec + no_spec_new > u_max {
                let from_diff = no_spec == 0 || (no_spec_new > 0 && rng.next_bool());
                if from_diff {
                    if diff.generalize_random_specified(rng).is_none() {
                        break;
                    }
                    no_spec_new -= 1;
                } else {
                    if child.generalize_unchanging_attribute(rng).is_none() {
                        break;
                    }
                    no_spec -= 1;
                }
            }
        } else {
            while no_spec + no_spec_new > u_max && diff.generalize_random_specified(rng).is_some() {
                no_spec_new -= 1;
            }
        }
        if no_spec_new == 0 {
            return None;
        }
    }

    child.condition.specialize_with(&diff);
    child.q = child.q.max(q_ini);
    Some(child)
}

/// Incorrect anticipation. Returns a child specializing the effect on the changed positions when
/// that makes the anticipation correct, and whether the effect was enhanced in place.
fn unexpected_case(
    ctx: &mut AcsContext,
    cl: &mut Classifier,
    before: &Perception,
    after: &Perception,
) -> (Option<Classifier>, bool) {
    let cfg = &ctx.config;
    cl.decrease_quality(cfg.beta);
    // An unchanged mark means the classifier already failed in this exact context.
    let recurring = !cl.set_mark(before);
    if cfg.enable_pee {
        cl.ee = recurring;
    }

    let specializable = cl.effect.is_specializable(before, after);
    if cfg.enable_pee && recurring && !specializable && cl.effect.is_enhanceable(before, after) {
        let enhanced = cl.enhance(before, after);
        if enhanced {
            tracing::debug!(step = ctx.time, effect = %cl.effect, "Enhanced effect");
        }
        return (None, enhanced);
    }
    if !specializable {
        return (None, false);
    }

    let mut child = cl.copy_from(ctx.time);
    child.specialize(before, after);
    child.q = child.q.max(cfg.q_ini);
    (Some(child), false)
}

/// An enhanced effect can make `id` similar to another member of the action set; the other one
/// then absorbs its numerosity so no duplicate macro-classifier remains.
fn fold_enhanced(
    population: &mut Population,
    action_set: &mut ActionSet,
    match_set: Option<&mut MatchSet>,
    id: ClassifierId,
) {
    let Some(enhanced) = population.get(id) else {
        return;
    };
    let Some(target) = action_set
        .classifiers(population)
        .find(|(other, cl)| *other != id && cl.is_similar(enhanced))
        .map(|(other, _)| other)
    else {
        return;
    };
    let Some(removed) = population.remove(id) else {
        return;
    };
    if let Some(cl) = population.get_mut(target) {
        cl.num += removed.num;
    }
    action_set.remove(id);
    if let Some(ms) = match_set {
        ms.remove(id);
    }
    tracing::debug!(classifier = %id, into = %target, "Folded enhanced classifier");
}

/// Fold a new ALP classifier into the population: a subsumer in the action set absorbs it, a
/// similar classifier gains quality, otherwise it is queued for insertion.
fn add_alp_classifier(
    ctx: &AcsContext,
    population: &mut Population,
    action_set: &ActionSet,
    new_list: &mut Vec<Classifier>,
    child: Classifier,
) {
    let cfg = &ctx.config;
    if cfg.enable_subsumption {
        if let Some(id) = find_subsumer(population, action_set, &child, cfg.theta_exp, cfg.theta_r) {
            if let Some(old) = population.get_mut(id) {
                old.num += 1;
                tracing::debug!(classifier = %id, num = old.num, "Subsumed ALP offspring");
            }
            return;
        }
    }

    let similar = action_set
        .classifiers(population)
        .find(|(_, cl)| cl.is_similar(&child))
        .map(|(id, _)| id);
    if let Some(old) = similar.and_then(|id| population.get_mut(id)) {
        old.increase_quality(cfg.beta);
        return;
    }

    if let Some(old) = new_list.iter_mut().find(|cl| cl.is_similar(&child)) {
        old.increase_quality(cfg.beta);
        return;
    }

    new_list.push(child);
}

/// The most general classifier in `set` that subsumes `child`; ties go to the earlier one.
pub(crate) fn find_subsumer(
    population: &Population,
    set: &ActionSet,
    child: &Classifier,
    theta_exp: u64,
    theta_r: f64,
) -> Option<ClassifierId> {
    set.classifiers(population)
        .filter(|(_, cl)| cl.does_subsume(child, theta_exp, theta_r))
        .min_by_key(|(_, cl)| cl.condition.specificity())
        .map(|(id, _)| id)
}

/// Merge the first pair of enhanceable classifiers with compatible conditions whose effects
/// specify the same positions with different symbols. Both parents lose their enhanceable flag.
fn merge_enhanceable(ctx: &AcsContext, population: &mut Population, action_set: &ActionSet) -> Option<Classifier> {
    let candidates: Vec<(ClassifierId, &Classifier)> = action_set
        .classifiers(population)
        .filter(|(_, cl)| cl.ee)
        .collect();

    let mut pair = None;
    'outer: for (i, (id1, c1)) in candidates.iter().enumerate() {
        for (id2, c2) in &candidates[i + 1..] {
            if c1.effect.same_positions(&c2.effect)
                && !c1.effect.is_similar(&c2.effect)
                && c1.condition.is_compatible(&c2.condition)
            {
                pair = Some((*id1, *id2, c1.merge_with(c2, ctx.time, ctx.config.q_ini)));
                break 'outer;
            }
        }
    }

    let (id1, id2, merged) = pair?;
    for id in [id1, id2] {
        if let Some(cl) = population.get_mut(id) {
            cl.ee = false;
        }
    }
    tracing::debug!(
        first = %id1,
        second = %id2,
        effect = %merged.effect,
        "Merged enhanceable classifiers"
    );
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AcsConfig, Action, ClassifierSet, Effect};

    fn p(s: &str) -> Perception {
        Perception::from(s)
    }

    fn setup(config: AcsConfig, len: usize) -> (AcsContext, Population) {
        let ctx = AcsContext::new(config, len, 2, 7).expect("valid config");
        let pop = Population::with_general_classifiers(&ctx);
        (ctx, pop)
    }

    fn action_set(ctx: &mut AcsContext, pop: &mut Population, perception: &Perception, action: Action) -> ActionSet {
        let ms = pop.match_set(ctx, perception);
        ms.action_set(pop, action)
    }

    #[test]
    fn unexpected_change_creates_specialized_child() {
        let (mut ctx, mut pop) = setup(AcsConfig::default(), 2);
        let before = p("00");
        let after = p("10");
        let mut aset = action_set(&mut ctx, &mut pop, &before, Action(0));
        apply_alp(&mut ctx, &mut pop, &mut aset, None, &before, &after);

        assert_eq!(pop.len(), 3);
        let child = aset
            .classifiers(&pop)
            .map(|(_, cl)| cl)
            .find(|cl| cl.effect.specifies_change())
            .expect("specialized child");
        assert_eq!(child.condition, Condition::from("0#"));
        assert!(child.anticipates(&before, &after));
        assert!(child.q >= ctx.config.q_ini);
    }

    #[test]
    fn expected_case_raises_quality_and_clears_mark() {
        let (mut ctx, mut pop) = setup(AcsConfig::default(), 2);
        let before = p("01");
        let mut aset = action_set(&mut ctx, &mut pop, &before, Action(1));
        let id = aset.ids()[0];
        pop.get_mut(id).expect("live").set_mark(&p("11"));
        let q0 = pop.get(id).expect("live").q;

        apply_alp(&mut ctx, &mut pop, &mut aset, None, &before, &before);
        let cl = pop.get(id).expect("live");
        assert!(cl.q > q0);
        assert!(!cl.is_marked());
        // The mark differed at position 0, so a child specified there was created.
        assert!(aset
            .classifiers(&pop)
            .any(|(_, c)| c.condition == Condition::from("0#")));
    }

    #[test]
    fn inadequate_classifiers_are_removed() {
        let config = AcsConfig {
            beta: 0.5,
            ..AcsConfig::default()
        };
        let (mut ctx, mut pop) = setup(config, 1);
        let before = p("0");
        let after = p("1");
        let mut ms = pop.match_set(&mut ctx, &before);
        let mut aset = ms.action_set(&pop, Action(0));
        let general = aset.ids()[0];
        for _ in 0..4 {
            apply_alp(&mut ctx, &mut pop, &mut aset, Some(&mut ms), &before, &after);
        }
        assert!(!pop.contains(general));
        assert!(!aset.contains(general));
        assert!(!ms.contains(general));
    }

    #[test]
    fn recurring_ambiguous_failure_enhances_the_effect() {
        let config = AcsConfig::default().with_pee(true);
        let (mut ctx, _) = setup(config, 1);
        let mut pop = Population::new();
        let id = pop.insert(Classifier::new(
            Condition::from("0"),
            Action(0),
            Effect::fixed("1"),
            &ctx.config,
            0,
        ));
        let mut aset = ActionSet::new(Action(0), ClassifierSet::from_ids(vec![id]));
        let before = p("0");

        // A fully specified condition never changes its mark, so the failure is recurring.
        apply_alp(&mut ctx, &mut pop, &mut aset, None, &before, &p("2"));
        let cl = pop.get(id).expect("live");
        assert!(cl.ee);
        assert!(cl.effect.is_enhanced());
        assert!(cl.anticipates(&before, &p("1")));
        assert!(cl.anticipates(&before, &p("2")));
    }

    fn pinned(ctx: &AcsContext, pop: &mut Population, condition: &str, effect: &str) -> ClassifierId {
        pop.insert(Classifier::new(
            Condition::from(condition),
            Action(0),
            Effect::fixed(effect),
            &ctx.config,
            0,
        ))
    }

    #[test]
    fn enhanceable_pair_with_same_positions_is_merged() {
        let config = AcsConfig::default().with_pee(true);
        let (mut ctx, _) = setup(config, 2);
        let mut pop = Population::new();
        let a = pinned(&ctx, &mut pop, "00", "1#");
        let b = pinned(&ctx, &mut pop, "00", "2#");
        let mut aset = ActionSet::new(Action(0), ClassifierSet::from_ids(vec![a, b]));
        let still = p("00");

        apply_alp(&mut ctx, &mut pop, &mut aset, None, &still, &still);
        assert!(!pop.get(a).expect("live").ee);
        assert!(!pop.get(b).expect("live").ee);
        let merged = pop
            .iter()
            .map(|(_, cl)| cl)
            .find(|cl| cl.effect.is_enhanced())
            .expect("merged classifier");
        assert_eq!(merged.condition, Condition::from("00"));
        assert!(merged.q >= ctx.config.q_ini);
        assert!(merged.anticipates(&still, &p("10")));
        assert!(merged.anticipates(&still, &p("20")));
        assert!(!merged.anticipates(&still, &p("01")));
    }

    #[test]
    fn enhanceable_pair_with_disjoint_positions_is_kept_apart() {
        let config = AcsConfig::default().with_pee(true);
        let (mut ctx, _) = setup(config, 2);
        let mut pop = Population::new();
        let a = pinned(&ctx, &mut pop, "00", "1#");
        let b = pinned(&ctx, &mut pop, "00", "#1");
        let mut aset = ActionSet::new(Action(0), ClassifierSet::from_ids(vec![a, b]));
        let still = p("00");

        apply_alp(&mut ctx, &mut pop, &mut aset, None, &still, &still);
        assert!(pop.get(a).expect("live").ee);
        assert!(pop.get(b).expect("live").ee);
        assert!(pop.iter().all(|(_, cl)| !cl.effect.is_enhanced()));
        assert!(pop.iter().all(|(_, cl)| cl.effect.to_string() != "11"));
    }

    #[test]
    fn enhancement_into_an_existing_classifier_folds_numerosity() {
        let config = AcsConfig::default().with_pee(true);
        let mut ctx = AcsContext::new(config, 1, 1, 7).expect("valid config");
        let mut pop = Population::new();
        let fresh = pinned(&ctx, &mut pop, "0", "1");
        let known = pinned(&ctx, &mut pop, "0", "1");
        assert!(pop.get_mut(known).expect("live").enhance(&p("0"), &p("2")));
        let mut ms = pop.match_set(&mut ctx, &p("0"));
        let mut aset = ms.action_set(&pop, Action(0));
        assert_eq!(aset.ids(), &[fresh, known]);

        apply_alp(&mut ctx, &mut pop, &mut aset, Some(&mut ms), &p("0"), &p("2"));
        assert_eq!(pop.len(), 1);
        assert_eq!(pop.num_size(), 2);
        assert_eq!(pop.get(known).expect("live").num, 2);
        assert!(!aset.contains(fresh));
        assert!(!ms.contains(fresh));
    }

    #[test]
    fn specialized_child_is_absorbed_by_a_reliable_subsumer() {
        let (mut ctx, _) = setup(AcsConfig::default(), 2);
        let mut pop = Population::new();
        let subsumer = pinned(&ctx, &mut pop, "0#", "1#");
        {
            let cl = pop.get_mut(subsumer).expect("live");
            cl.q = 0.95;
            cl.exp = 30;
        }
        let general = pinned(&ctx, &mut pop, "#1", "##");
        let mut aset = ActionSet::new(Action(0), ClassifierSet::from_ids(vec![subsumer, general]));
        let before_num = pop.num_size();

        apply_alp(&mut ctx, &mut pop, &mut aset, None, &p("01"), &p("11"));
        assert_eq!(pop.len(), 2);
        assert_eq!(pop.get(subsumer).expect("live").num, 2);
        assert_eq!(pop.num_size(), before_num + 1);
    }
}
