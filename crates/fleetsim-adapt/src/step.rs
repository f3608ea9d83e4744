//! Ready-made perturbations for [`BeamHillClimbing`](crate::BeamHillClimbing).

use fleetsim_core::{AgentId, LearningError};
use rand::{Rng, RngCore};

use crate::beam::Perturbation;

/// Pick a uniformly random option from a fixed menu.
pub fn menu_step<T>(menu: Vec<T>) -> Result<Perturbation<T>, LearningError>
where
    T: Clone + Send + 'static,
{
    if menu.is_empty() {
        return Err(LearningError::InvalidConfig("menu must offer at least one option"));
    }
    Ok(Box::new(move |rng: &mut dyn RngCore, _agent: AgentId, _current: &T| {
        Some(menu[rng.random_range(0..menu.len())].clone())
    }))
}

/// Shift a scalar by up to `scale` either way, staying within `[min, max]`.
pub fn jitter_step(scale: f64, min: f64, max: f64) -> Result<Perturbation<f64>, LearningError> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(LearningError::InvalidConfig("jitter scale must be finite and positive"));
    }
    if !(min.is_finite() && max.is_finite() && min < max) {
        return Err(LearningError::InvalidConfig("jitter range must satisfy min < max"));
    }
    Ok(Box::new(move |rng: &mut dyn RngCore, _agent: AgentId, current: &f64| {
        let shifted = *current + rng.random_range(-scale..=scale);
        Some(shifted.clamp(min, max))
    }))
}
