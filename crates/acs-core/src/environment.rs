use crate::{Action, Perception};

/// What kind of trial a reset started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    Explore,
    Test,
}

/// One transition of an environment's test set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub before: Perception,
    pub action: Action,
    pub after: Perception,
}

/// The world an agent learns in.
///
/// Implementations must keep `perception_length` and `action_count` fixed for their lifetime.
pub trait Environment {
    fn id(&self) -> &str;

    fn perception_length(&self) -> usize;

    fn action_count(&self) -> usize;

    /// Start a new trial.
    fn reset(&mut self) -> ResetKind;

    /// Write the current perception into `out`, replacing its contents.
    fn situation(&self, out: &mut Perception);

    /// Apply `action` and return the payoff.
    fn execute(&mut self, action: Action) -> f64;

    /// `true` once the current trial has ended.
    fn is_reset(&self) -> bool;

    /// Begin enumerating the test transitions.
    fn do_testing(&mut self) {}

    fn next_test(&mut self) -> Option<Transition> {
        None
    }

    fn end_testing(&mut self) {}
}
