use crate::error::{EnvironmentError, Result};
use crate::{AcsConfig, Action, Perception, SplitMix64};

/// Per-experiment state shared by covering, action selection and the learning passes.
#[derive(Debug, Clone)]
pub struct AcsContext {
    pub config: AcsConfig,
    pub rng: SplitMix64,
    pub perception_length: usize,
    pub action_count: usize,
    /// Number of environment steps taken so far in explore trials.
    pub time: u64,
}

impl AcsContext {
    /// Validates `config` against the environment dimensions.
    pub fn new(config: AcsConfig, perception_length: usize, action_count: usize, seed: u64) -> Result<Self> {
        config.validate(action_count, perception_length)?;
        Ok(Self {
            config,
            rng: SplitMix64::new(seed),
            perception_length,
            action_count,
            time: 0,
        })
    }

    pub fn actions(&self) -> impl Iterator<Item = Action> {
        (0..self.action_count).map(Action)
    }

    pub fn check_perception(&self, perception: &Perception) -> Result<()> {
        if perception.len() != self.perception_length {
            return Err(EnvironmentError::PerceptionLength {
                expected: self.perception_length,
                actual: perception.len(),
            }
            .into());
        }
        Ok(())
    }

    pub fn check_action(&self, action: Action) -> Result<()> {
        if action.0 >= self.action_count {
            return Err(EnvironmentError::UnknownAction {
                action: action.0,
                count: self.action_count,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AcsError, ConfigError};

    #[test]
    fn rejects_invalid_config_at_construction() {
        let err = AcsContext::new(AcsConfig::default(), 4, 0, 1).unwrap_err();
        assert_eq!(err, AcsError::Config(ConfigError::NoActions));
    }

    #[test]
    fn reports_contract_violations() {
        let ctx = AcsContext::new(AcsConfig::default(), 3, 2, 1).expect("valid");
        assert!(ctx.check_perception(&Perception::from("010")).is_ok());
        assert_eq!(
            ctx.check_perception(&Perception::from("01")),
            Err(AcsError::Environment(EnvironmentError::PerceptionLength {
                expected: 3,
                actual: 2
            }))
        );
        assert!(ctx.check_action(Action(1)).is_ok());
        assert!(ctx.check_action(Action(2)).is_err());
        assert_eq!(ctx.actions().count(), 2);
    }
}
