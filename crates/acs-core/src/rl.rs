use crate::{AcsConfig, ClassifierSet, Population};

/// One-step bootstrapped update of every classifier in `set`:
/// `r += beta * (reward + gamma * max_qr - r)` and `ir += beta * (reward - ir)`.
///
/// `max_qr` is the best `q * r` of the next match set, 0 when the trial ended.
pub fn apply_reinforcement(
    config: &AcsConfig,
    population: &mut Population,
    set: &ClassifierSet,
    reward: f64,
    max_qr: f64,
) {
    let target = reward + config.gamma * max_qr;
    for id in set.ids() {
        if let Some(cl) = population.get_mut(*id) {
            cl.r += config.beta * (target - cl.r);
            cl.ir += config.beta * (reward - cl.ir);
        }
    }
}
