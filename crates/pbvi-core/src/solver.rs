//! The point-based solver: belief-covering backups over a finite horizon.
//!
//! Each timestep projects the previous value list through the model, then
//! runs the cross-sum backup: beliefs already improved by an accepted entry
//! are skipped, every other belief gets one full backup, and the resulting
//! list is pruned to its upper envelope. The loop stops at the horizon or,
//! when an epsilon threshold is set, as soon as the weak-bound distance
//! between successive lists falls to epsilon or below.

use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::belief::{Belief, BeliefGenerator};
use crate::model::Pomdp;
use crate::projection::{ProjectionTable, Projecter};
use crate::value::{weak_bound_distance, VEntry, VList, ValueFunction};

/// Errors detected before any solve work starts.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("epsilon must be non-negative (got {0})")]
    InvalidEpsilon(f64),
    #[error("discount factor must lie in [0, 1) for the worst-case bound (got {0})")]
    InvalidDiscount(f64),
    #[error("model must have at least one state, action, and observation (got {states}x{actions}x{observations})")]
    DegenerateModel {
        states: usize,
        actions: usize,
        observations: usize,
    },
}

pub type Result<T> = std::result::Result<T, SolverError>;

/// Tunables for one solver instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerseusConfig {
    /// Beliefs sampled once per solve and reused across every timestep.
    pub belief_count: usize,
    /// Maximum number of backup steps.
    pub horizon: usize,
    /// Weak-bound stopping threshold; 0 disables early stopping.
    pub epsilon: f64,
    /// Seed for the solver-owned random engine; None draws from the OS.
    pub seed: Option<u64>,
}

impl Default for PerseusConfig {
    fn default() -> Self {
        Self {
            belief_count: 100,
            horizon: 50,
            epsilon: 0.01,
            seed: None,
        }
    }
}

/// Everything a solve call produces.
///
/// `variation` is the last weak-bound distance when epsilon stopping was
/// enabled, 0.0 otherwise. The sampled beliefs ride along because the
/// improvement guarantee is stated over exactly that collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub value_function: ValueFunction,
    pub variation: f64,
    pub beliefs: Vec<Belief>,
}

/// Point-based value iteration over a sampled belief set.
///
/// The random engine is owned per instance: two solvers built with the same
/// seed produce identical solutions for the same model.
#[derive(Debug)]
pub struct Perseus {
    config: PerseusConfig,
    rng: SmallRng,
}

impl Perseus {
    /// Validates the configuration and fixes the random seed.
    pub fn new(config: PerseusConfig) -> Result<Self> {
        if !(config.epsilon >= 0.0) {
            return Err(SolverError::InvalidEpsilon(config.epsilon));
        }
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &PerseusConfig {
        &self.config
    }

    /// Runs the full horizon loop against `model`.
    ///
    /// `min_reward` is the smallest reward the model can emit; it anchors
    /// the initial bound `min_reward / (1 - γ)`, which is why γ = 1 is
    /// rejected here. Fails atomically: on any validation error no belief
    /// sampling or backup work has happened.
    pub fn solve<M: Pomdp>(&mut self, model: &M, min_reward: f64) -> Result<Solution> {
        let discount = model.discount();
        if !(0.0..1.0).contains(&discount) {
            return Err(SolverError::InvalidDiscount(discount));
        }
        let (states, actions, observations) =
            (model.states(), model.actions(), model.observations());
        if states == 0 || actions == 0 || observations == 0 {
            return Err(SolverError::DegenerateModel {
                states,
                actions,
                observations,
            });
        }

        let beliefs = BeliefGenerator::new(model).generate(self.config.belief_count, &mut self.rng);
        let bound = min_reward / (1.0 - discount);
        let mut value_function = ValueFunction::initial(states, bound);
        let projecter = Projecter::new(model);

        let use_epsilon = self.config.epsilon > 0.0;
        let mut variation = 0.0;
        let mut timestep = 0;
        // The distance check cannot fire before the first backup; past that
        // the loop runs while the surface still moves more than epsilon.
        while timestep < self.config.horizon
            && (!use_epsilon || timestep == 0 || variation > self.config.epsilon)
        {
            timestep += 1;
            let previous = &value_function.steps()[timestep - 1];
            let projections = projecter.project(previous);
            let mut backed_up = cross_sum(&projections, &beliefs, previous);
            let stats = backed_up.prune();
            if use_epsilon {
                variation = weak_bound_distance(previous, &backed_up);
            }
            debug!(
                timestep,
                entries = backed_up.len(),
                pruned = stats.examined - stats.kept,
                variation,
                "backup step complete"
            );
            value_function.push(backed_up);
        }

        info!(
            steps = value_function.len() - 1,
            beliefs = beliefs.len(),
            converged = use_epsilon && variation <= self.config.epsilon,
            "solve finished"
        );
        Ok(Solution {
            value_function,
            variation: if use_epsilon { variation } else { 0.0 },
            beliefs,
        })
    }
}

/// Belief-covering backup of one timestep.
///
/// Beliefs are visited in sampler order. From the second belief onward, a
/// belief whose best value against the accepted entries already matches its
/// best value against `old` is skipped. Every other belief gets a full
/// backup: per action, the best projected vector per observation (first
/// maximal on ties) is cross-summed and the parent indices recorded; the
/// best action's vector is accepted.
fn cross_sum(projections: &ProjectionTable, beliefs: &[Belief], old: &VList) -> VList {
    let mut result = VList::with_capacity(beliefs.len());
    for (visited, belief) in beliefs.iter().enumerate() {
        if visited > 0 {
            let accepted = result.best_at(belief);
            let previous = old.best_at(belief);
            if let (Some((_, accepted_value)), Some((_, old_value))) = (accepted, previous) {
                if accepted_value >= old_value {
                    continue;
                }
            }
        }

        let mut candidates: Vec<VEntry> = Vec::with_capacity(projections.actions());
        for action in 0..projections.actions() {
            let mut values = vec![0.0; belief.len()];
            let mut strategy = vec![0usize; projections.observations()];
            for observation in 0..projections.observations() {
                if let Some((entry, _)) = projections.cell(action, observation).best_at(belief) {
                    for (total, component) in values.iter_mut().zip(&entry.values) {
                        *total += component;
                    }
                    strategy[observation] = entry.strategy[0];
                }
            }
            candidates.push(VEntry {
                values,
                action,
                strategy,
            });
        }

        let mut best_index = 0;
        let mut best_value = f64::NEG_INFINITY;
        for (index, candidate) in candidates.iter().enumerate() {
            let value = belief.value_of(&candidate.values);
            if value > best_value {
                best_index = index;
                best_value = value;
            }
        }
        result.push(candidates.swap_remove(best_index));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DenseModel;
    use crate::value::weak_bound_distance;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    /// The classic tiger problem: listen (noisy but cheap) or open a door
    /// (reset, big win or bigger loss).
    fn tiger_model(discount: f64) -> DenseModel {
        let transitions = vec![
            // s0: listen, open-left, open-right
            1.0, 0.0, 0.5, 0.5, 0.5, 0.5, //
            // s1
            0.0, 1.0, 0.5, 0.5, 0.5, 0.5, //
        ];
        let observation_table = vec![
            // s'0: listen, open-left, open-right
            0.85, 0.15, 0.5, 0.5, 0.5, 0.5, //
            // s'1
            0.15, 0.85, 0.5, 0.5, 0.5, 0.5, //
        ];
        let rewards = vec![
            // s0
            -1.0, -1.0, -100.0, -100.0, 10.0, 10.0, //
            // s1
            -1.0, -1.0, 10.0, 10.0, -100.0, -100.0, //
        ];
        DenseModel::new(2, 3, 2, transitions, observation_table, rewards, discount).unwrap()
    }

    /// Two-state chain with one observation; fast mixing keeps convergence
    /// quick in stopping tests.
    fn chain_model(discount: f64) -> DenseModel {
        let transitions = vec![1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0];
        let observation_table = vec![1.0, 1.0, 1.0, 1.0];
        let rewards = vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        DenseModel::new(2, 2, 1, transitions, observation_table, rewards, discount).unwrap()
    }

    fn config(belief_count: usize, horizon: usize, epsilon: f64) -> PerseusConfig {
        PerseusConfig {
            belief_count,
            horizon,
            epsilon,
            seed: Some(1729),
        }
    }

    #[test]
    fn negative_epsilon_is_rejected_at_construction() {
        let err = Perseus::new(config(10, 5, -0.1)).unwrap_err();
        assert!(matches!(err, SolverError::InvalidEpsilon(e) if e == -0.1));

        let err = Perseus::new(config(10, 5, f64::NAN)).unwrap_err();
        assert!(matches!(err, SolverError::InvalidEpsilon(_)));
    }

    #[test]
    fn discount_of_one_is_rejected() {
        let model = tiger_model(1.0);
        let mut solver = Perseus::new(config(10, 5, 0.0)).unwrap();
        let err = solver.solve(&model, -100.0).unwrap_err();
        assert!(matches!(err, SolverError::InvalidDiscount(d) if d == 1.0));
    }

    #[test]
    fn degenerate_model_dimensions_are_rejected() {
        struct NoActions;
        impl Pomdp for NoActions {
            fn states(&self) -> usize {
                2
            }
            fn actions(&self) -> usize {
                0
            }
            fn observations(&self) -> usize {
                1
            }
            fn discount(&self) -> f64 {
                0.9
            }
            fn transition(&self, _: usize, _: usize, _: usize) -> f64 {
                0.0
            }
            fn observation(&self, _: usize, _: usize, _: usize) -> f64 {
                0.0
            }
            fn reward(&self, _: usize, _: usize, _: usize) -> f64 {
                0.0
            }
        }
        let mut solver = Perseus::new(config(10, 5, 0.0)).unwrap();
        let err = solver.solve(&NoActions, 0.0).unwrap_err();
        assert!(matches!(
            err,
            SolverError::DegenerateModel { actions: 0, .. }
        ));
    }

    #[test]
    fn horizon_zero_returns_initial_bound_only() {
        let model = chain_model(0.9);
        let mut solver = Perseus::new(config(10, 0, 0.3)).unwrap();
        let solution = solver.solve(&model, -10.0).unwrap();
        assert_eq!(solution.value_function.len(), 1);
        let first = &solution.value_function.steps()[0];
        assert_eq!(first.len(), 1);
        for &v in &first.entries()[0].values {
            assert!(approx_eq(v, -100.0, 1e-9));
        }
        assert_eq!(solution.variation, 0.0);
    }

    #[test]
    fn epsilon_zero_runs_exactly_horizon_steps() {
        let model = chain_model(0.9);
        let mut solver = Perseus::new(config(8, 5, 0.0)).unwrap();
        let solution = solver.solve(&model, 0.0).unwrap();
        assert_eq!(solution.value_function.len(), 6);
        assert_eq!(solution.variation, 0.0);
    }

    #[test]
    fn epsilon_stopping_halts_before_the_horizon() {
        let model = chain_model(0.5);
        let mut solver = Perseus::new(config(8, 200, 1.0)).unwrap();
        let solution = solver.solve(&model, 0.0).unwrap();
        assert!(solution.value_function.len() < 50);
        assert!(solution.variation <= 1.0);
    }

    #[test]
    fn single_belief_backs_up_once() {
        let model = tiger_model(0.95);
        let mut solver = Perseus::new(config(1, 1, 0.0)).unwrap();
        let solution = solver.solve(&model, -100.0).unwrap();
        assert_eq!(solution.value_function.len(), 2);
        assert_eq!(solution.value_function.steps()[1].len(), 1);
        assert_eq!(solution.beliefs.len(), 1);
    }

    #[test]
    fn zero_beliefs_degenerate_without_error() {
        let model = chain_model(0.9);
        let mut solver = Perseus::new(config(0, 3, 0.0)).unwrap();
        let solution = solver.solve(&model, 0.0).unwrap();
        assert_eq!(solution.value_function.len(), 4);
        assert!(solution.beliefs.is_empty());
        for step in &solution.value_function.steps()[1..] {
            assert!(step.is_empty());
        }
    }

    #[test]
    fn improvement_invariant_holds_on_sampled_beliefs() {
        let model = tiger_model(0.95);
        let mut solver = Perseus::new(config(16, 8, 0.0)).unwrap();
        let solution = solver.solve(&model, -100.0).unwrap();
        let steps = solution.value_function.steps();
        for t in 1..steps.len() {
            for belief in &solution.beliefs {
                let (_, before) = steps[t - 1].best_at(belief).unwrap();
                let (_, after) = steps[t].best_at(belief).unwrap();
                assert!(
                    after >= before - 1e-9,
                    "belief {:?} worsened at step {t}: {before} -> {after}",
                    belief.probs()
                );
            }
        }
    }

    #[test]
    fn tiger_value_rises_far_above_initial_bound() {
        // The gap to the fixed point contracts by the discount per step,
        // so closing a -2000 start needs a long horizon.
        let model = tiger_model(0.95);
        let mut solver = Perseus::new(config(24, 150, 0.0)).unwrap();
        let solution = solver.solve(&model, -100.0).unwrap();
        let uniform = Belief::uniform(2);
        let steps = solution.value_function.steps();
        let (_, initial) = steps[0].best_at(&uniform).unwrap();
        let (_, last) = steps[steps.len() - 1].best_at(&uniform).unwrap();
        assert!(approx_eq(initial, -2000.0, 1e-6));
        assert!(last > -100.0, "uniform-belief value stayed at {last}");
    }

    #[test]
    fn entries_reference_valid_parents_and_actions() {
        let model = tiger_model(0.95);
        let mut solver = Perseus::new(config(12, 6, 0.0)).unwrap();
        let solution = solver.solve(&model, -100.0).unwrap();
        let steps = solution.value_function.steps();
        for t in 1..steps.len() {
            for entry in steps[t].iter() {
                assert_eq!(entry.values.len(), 2);
                assert!(entry.action < 3);
                assert_eq!(entry.strategy.len(), 2);
                for &parent in &entry.strategy {
                    assert!(parent < steps[t - 1].len());
                }
            }
        }
    }

    #[test]
    fn same_seed_gives_identical_solutions() {
        let model = tiger_model(0.95);
        let mut first = Perseus::new(config(16, 6, 0.0)).unwrap();
        let mut second = Perseus::new(config(16, 6, 0.0)).unwrap();
        let a = first.solve(&model, -100.0).unwrap();
        let b = second.solve(&model, -100.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn config_serde_round_trip() {
        let config = PerseusConfig {
            belief_count: 64,
            horizon: 20,
            epsilon: 0.05,
            seed: Some(7),
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: PerseusConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn default_config_is_valid() {
        let config = PerseusConfig::default();
        assert!(config.epsilon >= 0.0);
        assert!(config.belief_count > 0);
        assert!(Perseus::new(config).is_ok());
    }

    #[test]
    fn cross_sum_single_belief_yields_single_entry() {
        let model = tiger_model(0.95);
        let projecter = Projecter::new(&model);
        let previous = ValueFunction::initial(2, -2000.0);
        let previous = &previous.steps()[0];
        let projections = projecter.project(previous);
        let beliefs = vec![Belief::uniform(2)];
        let result = cross_sum(&projections, &beliefs, previous);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn cross_sum_skips_duplicate_beliefs() {
        let model = tiger_model(0.95);
        let projecter = Projecter::new(&model);
        let previous = ValueFunction::initial(2, -2000.0);
        let previous = &previous.steps()[0];
        let projections = projecter.project(previous);
        let beliefs = vec![Belief::uniform(2), Belief::uniform(2), Belief::uniform(2)];
        let result = cross_sum(&projections, &beliefs, previous);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn cross_sum_improves_every_belief() {
        let model = tiger_model(0.95);
        let projecter = Projecter::new(&model);
        let previous = ValueFunction::initial(2, -2000.0);
        let previous = &previous.steps()[0];
        let projections = projecter.project(previous);
        let beliefs = vec![
            Belief::uniform(2),
            Belief::certain(2, 0),
            Belief::certain(2, 1),
            Belief::from_probs(vec![0.3, 0.7]).unwrap(),
        ];
        let result = cross_sum(&projections, &beliefs, previous);
        for belief in &beliefs {
            let (_, new_value) = result.best_at(belief).unwrap();
            let (_, old_value) = previous.best_at(belief).unwrap();
            assert!(new_value >= old_value - 1e-9);
        }
    }

    #[test]
    fn cross_sum_with_no_beliefs_is_empty() {
        let model = tiger_model(0.95);
        let projecter = Projecter::new(&model);
        let previous = ValueFunction::initial(2, -2000.0);
        let previous = &previous.steps()[0];
        let projections = projecter.project(previous);
        let result = cross_sum(&projections, &[], previous);
        assert!(result.is_empty());
    }

    #[test]
    fn backup_distance_shrinks_as_the_chain_converges() {
        let model = chain_model(0.5);
        let mut solver = Perseus::new(config(8, 12, 0.0)).unwrap();
        let solution = solver.solve(&model, 0.0).unwrap();
        let steps = solution.value_function.steps();
        let early = weak_bound_distance(&steps[1], &steps[2]);
        let late = weak_bound_distance(&steps[10], &steps[11]);
        assert!(late <= early);
        assert!(late >= 0.0);
    }
}
