//! Beliefs over hidden states and the sampling of belief sets.
//!
//! A belief is the POMDP's effective planning state: a probability
//! distribution over the S hidden states. [`BeliefGenerator`] produces the
//! fixed belief collection a solve call reuses across every timestep, by
//! simulating the model forward from the uniform belief.

use rand::Rng;
use thiserror::Error;

use crate::model::Pomdp;
use pbvi_math::{dot, linf_distance, normalize, SIMPLEX_TOLERANCE};

/// Expansion attempts allowed per requested belief before the generator
/// gives up on novelty and pads the collection.
const ATTEMPTS_PER_BELIEF: usize = 32;

/// Minimum L∞ separation for an expanded belief to count as new.
const NOVELTY_TOLERANCE: f64 = 1e-6;

/// Errors from belief construction.
#[derive(Debug, Error)]
pub enum BeliefError {
    #[error("belief must cover at least one state")]
    Empty,
    #[error("belief probabilities must be finite and non-negative (got {value} for state {state})")]
    InvalidProbability { state: usize, value: f64 },
    #[error("belief probabilities must sum to 1 (got {sum:.6})")]
    InvalidSum { sum: f64 },
}

pub type Result<T> = std::result::Result<T, BeliefError>;

/// Probability distribution over hidden states. Immutable once built; all
/// constructors guarantee the simplex invariant.
#[derive(Debug, Clone, PartialEq)]
pub struct Belief {
    probs: Vec<f64>,
}

impl Belief {
    /// Uniform belief over `states` states.
    pub fn uniform(states: usize) -> Self {
        debug_assert!(states > 0);
        Self {
            probs: vec![1.0 / states as f64; states],
        }
    }

    /// Belief certain of one state.
    pub fn certain(states: usize, state: usize) -> Self {
        debug_assert!(state < states);
        let mut probs = vec![0.0; states];
        probs[state] = 1.0;
        Self { probs }
    }

    /// Validated construction from raw probabilities.
    pub fn from_probs(probs: Vec<f64>) -> Result<Self> {
        if probs.is_empty() {
            return Err(BeliefError::Empty);
        }
        let mut sum = 0.0;
        for (state, &value) in probs.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(BeliefError::InvalidProbability { state, value });
            }
            sum += value;
        }
        if (sum - 1.0).abs() > SIMPLEX_TOLERANCE {
            return Err(BeliefError::InvalidSum { sum });
        }
        Ok(Self { probs })
    }

    /// Number of states covered.
    pub fn len(&self) -> usize {
        self.probs.len()
    }

    /// Always false for a constructed belief; present for completeness.
    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }

    /// The raw probabilities.
    pub fn probs(&self) -> &[f64] {
        &self.probs
    }

    /// Expected value of `values` under this belief.
    pub fn value_of(&self, values: &[f64]) -> f64 {
        dot(&self.probs, values)
    }

    /// Largest componentwise probability difference to `other`.
    pub fn linf_distance(&self, other: &Belief) -> f64 {
        linf_distance(&self.probs, &other.probs)
    }

    /// Samples a hidden state from this distribution.
    pub fn sample_state<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let roll: f64 = rng.random();
        let mut cumulative = 0.0;
        for (state, &p) in self.probs.iter().enumerate() {
            cumulative += p;
            if roll < cumulative {
                return state;
            }
        }
        // Round-off can leave the cumulative sum a hair under 1.
        self.probs.len() - 1
    }

    /// Bayes posterior after taking `action` and seeing `observation`.
    ///
    /// `b'(s') ∝ Z(s', a, o) · Σ_s T(s, a, s') · b(s)`. Returns None when the
    /// observation has zero probability under this belief.
    pub fn update<M: Pomdp>(&self, model: &M, action: usize, observation: usize) -> Option<Belief> {
        let states = self.probs.len();
        let mut posterior = vec![0.0; states];
        for (next_state, slot) in posterior.iter_mut().enumerate() {
            let mut mass = 0.0;
            for (state, &p) in self.probs.iter().enumerate() {
                mass += model.transition(state, action, next_state) * p;
            }
            *slot = model.observation(next_state, action, observation) * mass;
        }
        normalize(&mut posterior)?;
        Some(Belief { probs: posterior })
    }
}

/// Samples the belief collection for one solve call.
///
/// The first belief is always uniform; the rest come from simulating the
/// model (sample a state, take a random action, sample the successor and an
/// observation, apply the Bayes update) and keeping only candidates novel
/// against everything found so far.
#[derive(Debug)]
pub struct BeliefGenerator<'a, M> {
    model: &'a M,
}

impl<'a, M: Pomdp> BeliefGenerator<'a, M> {
    pub fn new(model: &'a M) -> Self {
        Self { model }
    }

    /// Generates exactly `count` beliefs. When expansion stalls inside its
    /// attempt budget, the collection is padded with copies of existing
    /// members so the size contract holds.
    pub fn generate<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<Belief> {
        if count == 0 {
            return Vec::new();
        }
        let mut beliefs = Vec::with_capacity(count);
        beliefs.push(Belief::uniform(self.model.states()));

        let budget = count.saturating_mul(ATTEMPTS_PER_BELIEF);
        let mut attempts = 0;
        while beliefs.len() < count && attempts < budget {
            attempts += 1;
            let origin = &beliefs[rng.random_range(0..beliefs.len())];
            let state = origin.sample_state(rng);
            let action = rng.random_range(0..self.model.actions());
            let next_state = self.sample_next_state(state, action, rng);
            let observation = self.sample_observation(next_state, action, rng);
            let Some(candidate) = origin.update(self.model, action, observation) else {
                continue;
            };
            if beliefs
                .iter()
                .all(|b| b.linf_distance(&candidate) > NOVELTY_TOLERANCE)
            {
                beliefs.push(candidate);
            }
        }

        while beliefs.len() < count {
            let index = rng.random_range(0..beliefs.len());
            beliefs.push(beliefs[index].clone());
        }
        beliefs
    }

    fn sample_next_state<R: Rng + ?Sized>(
        &self,
        state: usize,
        action: usize,
        rng: &mut R,
    ) -> usize {
        let roll: f64 = rng.random();
        let mut cumulative = 0.0;
        for next_state in 0..self.model.states() {
            cumulative += self.model.transition(state, action, next_state);
            if roll < cumulative {
                return next_state;
            }
        }
        self.model.states() - 1
    }

    fn sample_observation<R: Rng + ?Sized>(
        &self,
        next_state: usize,
        action: usize,
        rng: &mut R,
    ) -> usize {
        let roll: f64 = rng.random();
        let mut cumulative = 0.0;
        for observation in 0..self.model.observations() {
            cumulative += self.model.observation(next_state, action, observation);
            if roll < cumulative {
                return observation;
            }
        }
        self.model.observations() - 1
    }
}
