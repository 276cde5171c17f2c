//! One-step lookahead projection of a value function through the model.
//!
//! For the previous timestep's list `v` and every pair `(a, o)`, the cell
//! holds one vector per entry `e` of `v`:
//!
//! `proj(s) = r(a, s) / O + γ · Σ_s' T(s, a, s') · Z(s', a, o) · e(s')`
//!
//! where `r(a, s) = Σ_s' T(s, a, s') · R(s, a, s')` is the expected
//! immediate reward. Dividing `r` by O lets the later cross-sum over
//! observations reassemble the full reward exactly once.

use crate::model::Pomdp;
use crate::value::{VEntry, VList};

/// Precomputes the reward shares for a model and projects value lists
/// through it. Build once per solve; the reward table never changes.
#[derive(Debug)]
pub struct Projecter<'a, M> {
    model: &'a M,
    /// `r(a, s) / O`, row-major by action.
    reward_shares: Vec<f64>,
}

impl<'a, M: Pomdp> Projecter<'a, M> {
    pub fn new(model: &'a M) -> Self {
        let states = model.states();
        let actions = model.actions();
        let share = 1.0 / model.observations() as f64;
        let mut reward_shares = vec![0.0; actions * states];
        for action in 0..actions {
            for state in 0..states {
                let mut expected = 0.0;
                for next_state in 0..states {
                    expected += model.transition(state, action, next_state)
                        * model.reward(state, action, next_state);
                }
                reward_shares[action * states + state] = expected * share;
            }
        }
        Self {
            model,
            reward_shares,
        }
    }

    /// Projects every entry of `previous` through every `(action,
    /// observation)` pair. Cell entry order follows `previous`, so an
    /// entry's position doubles as its parent index.
    pub fn project(&self, previous: &VList) -> ProjectionTable {
        let actions = self.model.actions();
        let observations = self.model.observations();
        let mut cells = Vec::with_capacity(actions * observations);
        for action in 0..actions {
            for observation in 0..observations {
                cells.push(self.project_cell(previous, action, observation));
            }
        }
        ProjectionTable {
            cells,
            actions,
            observations,
        }
    }

    fn project_cell(&self, previous: &VList, action: usize, observation: usize) -> VList {
        let states = self.model.states();
        let rewards = &self.reward_shares[action * states..(action + 1) * states];
        if previous.is_empty() {
            // Nothing to continue with; the reward share alone keeps the
            // cell non-empty.
            let entry = VEntry {
                values: rewards.to_vec(),
                action,
                strategy: vec![0],
            };
            return VList::from_entries(vec![entry]);
        }

        let discount = self.model.discount();
        let mut cell = VList::with_capacity(previous.len());
        for (parent, entry) in previous.iter().enumerate() {
            let mut values = Vec::with_capacity(states);
            for state in 0..states {
                let mut continuation = 0.0;
                for (next_state, &alpha) in entry.values.iter().enumerate() {
                    continuation += self.model.transition(state, action, next_state)
                        * self.model.observation(next_state, action, observation)
                        * alpha;
                }
                values.push(rewards[state] + discount * continuation);
            }
            cell.push(VEntry {
                values,
                action,
                strategy: vec![parent],
            });
        }
        cell
    }
}

/// The A×O grid of projected lists for one timestep. Consumed by the backup
/// engine and discarded.
#[derive(Debug)]
pub struct ProjectionTable {
    cells: Vec<VList>,
    actions: usize,
    observations: usize,
}

impl ProjectionTable {
    pub fn cell(&self, action: usize, observation: usize) -> &VList {
        &self.cells[action * self.observations + observation]
    }

    pub fn actions(&self) -> usize {
        self.actions
    }

    pub fn observations(&self) -> usize {
        self.observations
    }
}
