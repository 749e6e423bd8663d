use crate::error::Result;
use crate::{
    alp, exploration, ga, rl, AcsConfig, AcsContext, ActionSet, Environment, MatchSet, ModelTest,
    Perception, Population, PopulationStats, ResetKind,
};

/// Steps taken and payoff collected during one trial.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrialReport {
    pub steps: u64,
    pub reward: f64,
    /// The environment ended the trial before the step limit.
    pub finished: bool,
}

/// A learning classifier system bound to one experiment.
#[derive(Debug, Clone)]
pub struct Agent {
    pub ctx: AcsContext,
    pub population: Population,
}

impl Agent {
    /// Agent sized for `env`, starting with one general classifier per action.
    pub fn new<E: Environment + ?Sized>(config: AcsConfig, env: &E, seed: u64) -> Result<Self> {
        let ctx = AcsContext::new(config, env.perception_length(), env.action_count(), seed)?;
        let population = Population::with_general_classifiers(&ctx);
        Ok(Self { ctx, population })
    }

    pub fn with_population(ctx: AcsContext, population: Population) -> Self {
        Self { ctx, population }
    }

    /// One explore trial: ALP, reinforcement and GA on every step. A reset that reports
    /// [`ResetKind::Test`] turns the trial into an exploit trial.
    pub fn explore_trial<E: Environment + ?Sized>(&mut self, env: &mut E, max_steps: u64) -> Result<TrialReport> {
        if env.reset() == ResetKind::Test {
            tracing::debug!(step = self.ctx.time, env = env.id(), "Test trial");
            return self.exploit_steps(env, max_steps);
        }
        let mut situation = Perception::default();
        self.observe(env, &mut situation)?;

        let mut previous: Option<(ActionSet, Perception, f64)> = None;
        let mut report = TrialReport::default();
        while report.steps < max_steps {
            let mut match_set = self.population.match_set(&mut self.ctx, &situation);
            if let Some((action_set, before, reward)) = previous.take() {
                let max_qr = match_set.max_qr(&self.population);
                self.learn(action_set, Some(&mut match_set), &before, &situation, reward, max_qr);
            }

            let action = exploration::choose_action(&mut self.ctx, &self.population, &match_set);
            self.ctx.check_action(action)?;
            let action_set = match_set.action_set(&self.population, action);
            let before = situation.clone();
            let reward = env.execute(action);
            self.observe(env, &mut situation)?;
            tracing::trace!(step = self.ctx.time, action = %action, reward, "Explore step");

            report.steps += 1;
            report.reward += reward;
            self.ctx.time += 1;

            if env.is_reset() {
                self.learn(action_set, None, &before, &situation, reward, 0.0);
                report.finished = true;
                break;
            }
            previous = Some((action_set, before, reward));
        }
        Ok(report)
    }

    /// One exploit trial: greedy actions, reinforcement only.
    pub fn exploit_trial<E: Environment + ?Sized>(&mut self, env: &mut E, max_steps: u64) -> Result<TrialReport> {
        env.reset();
        self.exploit_steps(env, max_steps)
    }

    fn exploit_steps<E: Environment + ?Sized>(&mut self, env: &mut E, max_steps: u64) -> Result<TrialReport> {
        let mut situation = Perception::default();
        self.observe(env, &mut situation)?;

        let mut previous: Option<(ActionSet, f64)> = None;
        let mut report = TrialReport::default();
        while report.steps < max_steps {
            let match_set = self.population.match_set(&mut self.ctx, &situation);
            if let Some((action_set, reward)) = previous.take() {
                let max_qr = match_set.max_qr(&self.population);
                rl::apply_reinforcement(&self.ctx.config, &mut self.population, &action_set, reward, max_qr);
            }

            let action = exploration::best_action(&mut self.ctx, &self.population, &match_set);
            self.ctx.check_action(action)?;
            let action_set = match_set.action_set(&self.population, action);
            let reward = env.execute(action);
            self.observe(env, &mut situation)?;

            report.steps += 1;
            report.reward += reward;

            if env.is_reset() {
                rl::apply_reinforcement(&self.ctx.config, &mut self.population, &action_set, reward, 0.0);
                report.finished = true;
                break;
            }
            previous = Some((action_set, reward));
        }
        Ok(report)
    }

    /// Check every test transition of `env` against the reliable classifiers.
    pub fn test_model<E: Environment + ?Sized>(&self, env: &mut E) -> ModelTest {
        let theta_r = self.ctx.config.theta_r;
        let reliable = self.population.reliable(theta_r);
        let mut result = ModelTest::default();

        env.do_testing();
        while let Some(t) = env.next_test() {
            result.record(reliable.exist_classifier(&self.population, &t.before, t.action, &t.after, theta_r));
        }
        env.end_testing();
        result
    }

    pub fn stats(&self) -> PopulationStats {
        PopulationStats::collect(&self.population, self.ctx.config.theta_r)
    }

    fn observe<E: Environment + ?Sized>(&self, env: &E, out: &mut Perception) -> Result<()> {
        env.situation(out);
        self.ctx.check_perception(out)
    }

    /// ALP, reinforcement, GA, then the global population limit.
    fn learn(
        &mut self,
        mut action_set: ActionSet,
        mut match_set: Option<&mut MatchSet>,
        before: &Perception,
        after: &Perception,
        reward: f64,
        max_qr: f64,
    ) {
        let ctx = &mut self.ctx;
        let population = &mut self.population;

        alp::apply_alp(ctx, population, &mut action_set, match_set.as_deref_mut(), before, after);
        rl::apply_reinforcement(&ctx.config, population, &action_set, reward, max_qr);
        if ctx.config.enable_ga {
            ga::apply_ga(ctx, population, &mut action_set, match_set.as_deref_mut(), before, after);
        }
        if let Some(limit) = ctx.config.max_population {
            for id in population.enforce_limit(limit) {
                if let Some(ms) = match_set.as_deref_mut() {
                    ms.remove(id);
                }
            }
        }
    }
}
