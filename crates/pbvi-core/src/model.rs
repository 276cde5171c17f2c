//! POMDP model interface and a dense tabular implementation.
//!
//! A model exposes state, action, and observation counts, a discount factor,
//! and the three tensors driving the dynamics:
//! - `T(s, a, s')`: probability of reaching `s'` from `s` under action `a`
//! - `Z(s', a, o)`: probability of observing `o` in `s'` after action `a`
//! - `R(s, a, s')`: reward for the transition

use thiserror::Error;

use pbvi_math::SIMPLEX_TOLERANCE;

/// Errors from dense model construction.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model must have at least one state, action, and observation (got {states}x{actions}x{observations})")]
    EmptyDimension {
        states: usize,
        actions: usize,
        observations: usize,
    },
    #[error("discount factor must lie in [0, 1] (got {0})")]
    InvalidDiscount(f64),
    #[error("{tensor} tensor must hold {expected} entries (got {actual})")]
    WrongTensorSize {
        tensor: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{tensor} entries must be probabilities in [0, 1] (got {value} at flat index {index})")]
    InvalidProbability {
        tensor: &'static str,
        index: usize,
        value: f64,
    },
    #[error("{tensor} row for state {state}, action {action} must sum to 1 (got {sum:.6})")]
    UnnormalizedRow {
        tensor: &'static str,
        state: usize,
        action: usize,
        sum: f64,
    },
    #[error("rewards must be finite (got {value} at flat index {index})")]
    NonFiniteReward { index: usize, value: f64 },
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// Queryable POMDP dynamics consumed by the projection and solver layers.
///
/// Implementations must keep every `transition` row (over `next_state`) and
/// every `observation` row (over `observation`) a probability distribution.
pub trait Pomdp {
    /// Number of hidden states S.
    fn states(&self) -> usize;
    /// Number of actions A.
    fn actions(&self) -> usize;
    /// Number of observations O.
    fn observations(&self) -> usize;
    /// Discount factor γ.
    fn discount(&self) -> f64;
    /// `T(s, a, s')`.
    fn transition(&self, state: usize, action: usize, next_state: usize) -> f64;
    /// `Z(s', a, o)`.
    fn observation(&self, next_state: usize, action: usize, observation: usize) -> f64;
    /// `R(s, a, s')`.
    fn reward(&self, state: usize, action: usize, next_state: usize) -> f64;
}

/// Tabular POMDP with fully materialized, validated tensors.
///
/// Tensor layouts are row-major: transitions and rewards as `[s][a][s']`,
/// observations as `[s'][a][o]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseModel {
    states: usize,
    actions: usize,
    observations: usize,
    discount: f64,
    transitions: Vec<f64>,
    observation_table: Vec<f64>,
    rewards: Vec<f64>,
}

impl DenseModel {
    /// Builds a model after validating dimensions, probability rows, and
    /// reward finiteness.
    pub fn new(
        states: usize,
        actions: usize,
        observations: usize,
        transitions: Vec<f64>,
        observation_table: Vec<f64>,
        rewards: Vec<f64>,
        discount: f64,
    ) -> Result<Self> {
        if states == 0 || actions == 0 || observations == 0 {
            return Err(ModelError::EmptyDimension {
                states,
                actions,
                observations,
            });
        }
        if !(0.0..=1.0).contains(&discount) {
            return Err(ModelError::InvalidDiscount(discount));
        }
        let transition_len = states * actions * states;
        if transitions.len() != transition_len {
            return Err(ModelError::WrongTensorSize {
                tensor: "transition",
                expected: transition_len,
                actual: transitions.len(),
            });
        }
        let observation_len = states * actions * observations;
        if observation_table.len() != observation_len {
            return Err(ModelError::WrongTensorSize {
                tensor: "observation",
                expected: observation_len,
                actual: observation_table.len(),
            });
        }
        if rewards.len() != transition_len {
            return Err(ModelError::WrongTensorSize {
                tensor: "reward",
                expected: transition_len,
                actual: rewards.len(),
            });
        }

        check_probability_rows("transition", &transitions, states, actions, states)?;
        check_probability_rows("observation", &observation_table, states, actions, observations)?;
        for (index, &value) in rewards.iter().enumerate() {
            if !value.is_finite() {
                return Err(ModelError::NonFiniteReward { index, value });
            }
        }

        Ok(Self {
            states,
            actions,
            observations,
            discount,
            transitions,
            observation_table,
            rewards,
        })
    }

    fn flat(&self, outer: usize, action: usize, inner: usize, width: usize) -> usize {
        (outer * self.actions + action) * width + inner
    }
}

/// Validates one tensor of `rows * actions` probability rows of `width`
/// entries each.
fn check_probability_rows(
    tensor: &'static str,
    table: &[f64],
    rows: usize,
    actions: usize,
    width: usize,
) -> Result<()> {
    for state in 0..rows {
        for action in 0..actions {
            let base = (state * actions + action) * width;
            let mut sum = 0.0;
            for (offset, &value) in table[base..base + width].iter().enumerate() {
                if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                    return Err(ModelError::InvalidProbability {
                        tensor,
                        index: base + offset,
                        value,
                    });
                }
                sum += value;
            }
            if (sum - 1.0).abs() > SIMPLEX_TOLERANCE {
                return Err(ModelError::UnnormalizedRow {
                    tensor,
                    state,
                    action,
                    sum,
                });
            }
        }
    }
    Ok(())
}

impl Pomdp for DenseModel {
    fn states(&self) -> usize {
        self.states
    }

    fn actions(&self) -> usize {
        self.actions
    }

    fn observations(&self) -> usize {
        self.observations
    }

    fn discount(&self) -> f64 {
        self.discount
    }

    fn transition(&self, state: usize, action: usize, next_state: usize) -> f64 {
        self.transitions[self.flat(state, action, next_state, self.states)]
    }

    fn observation(&self, next_state: usize, action: usize, observation: usize) -> f64 {
        self.observation_table[self.flat(next_state, action, observation, self.observations)]
    }

    fn reward(&self, state: usize, action: usize, next_state: usize) -> f64 {
        self.rewards[self.flat(state, action, next_state, self.states)]
    }
}
