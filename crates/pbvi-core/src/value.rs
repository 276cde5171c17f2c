//! Piecewise-linear value functions: alpha-vectors, per-timestep lists, and
//! the weak-bound distance between successive timesteps.

use crate::belief::Belief;
use pbvi_math::{linf_distance, upper_envelope};

pub use pbvi_math::PruneStats;

/// One alpha-vector: expected reward per hidden state under a fixed
/// one-step policy.
///
/// `strategy[o]` is the index of the entry in the *previous* timestep's
/// [`VList`] to follow after observing `o`. It is a back-reference, not an
/// owning link; the initial bound entry carries an empty strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct VEntry {
    /// Expected reward for each hidden state.
    pub values: Vec<f64>,
    /// Action this vector commits to.
    pub action: usize,
    /// Per-observation index into the previous timestep's list.
    pub strategy: Vec<usize>,
}

impl VEntry {
    /// Entry with every state value equal to `value`, action 0, no strategy.
    pub fn constant(states: usize, value: f64) -> Self {
        Self {
            values: vec![value; states],
            action: 0,
            strategy: Vec::new(),
        }
    }
}

/// One timestep's value function: the upper envelope of its entries' dot
/// products over the belief simplex. Append-only within a timestep so
/// strategy back-references stay stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VList {
    entries: Vec<VEntry>,
}

impl VList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn from_entries(entries: Vec<VEntry>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, entry: VEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[VEntry] {
        &self.entries
    }

    /// Entry maximizing the expected value at `belief`, with its value.
    ///
    /// Ties keep the first maximal entry encountered, which makes lookups
    /// deterministic for a fixed entry order.
    pub fn best_at(&self, belief: &Belief) -> Option<(&VEntry, f64)> {
        let mut best: Option<(&VEntry, f64)> = None;
        for entry in &self.entries {
            let value = belief.value_of(&entry.values);
            match best {
                Some((_, best_value)) if value <= best_value => {}
                _ => best = Some((entry, value)),
            }
        }
        best
    }

    /// Drops every entry not on the upper envelope, preserving the relative
    /// order of survivors.
    pub fn prune(&mut self) -> PruneStats {
        let views: Vec<&[f64]> = self.entries.iter().map(|e| e.values.as_slice()).collect();
        let (kept, stats) = upper_envelope(&views);
        if kept.len() != self.entries.len() {
            let mut index = 0;
            self.entries.retain(|_| {
                let keep = kept.binary_search(&index).is_ok();
                index += 1;
                keep
            });
        }
        stats
    }
}

impl<'a> IntoIterator for &'a VList {
    type Item = &'a VEntry;
    type IntoIter = std::slice::Iter<'a, VEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Value functions for timesteps 0..=t, timestep 0 being the initial
/// worst-case bound.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFunction {
    steps: Vec<VList>,
}

impl ValueFunction {
    /// Starts a value function at the uniform worst-case bound: one entry
    /// with all `states` values equal to `bound`.
    pub fn initial(states: usize, bound: f64) -> Self {
        Self {
            steps: vec![VList::from_entries(vec![VEntry::constant(states, bound)])],
        }
    }

    pub fn push(&mut self, list: VList) {
        self.steps.push(list);
    }

    /// Number of timesteps stored (at least 1).
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[VList] {
        &self.steps
    }
}

/// Conservative bound on how much the value surface moved between two
/// successive lists.
///
/// Zero when `new` is empty; +∞ when `old` is empty but `new` is not.
/// Otherwise the largest, over new entries, of the smallest L∞ distance to
/// any old entry. This bounds the change over the whole simplex from above
/// without evaluating any belief, so it is a stopping proxy rather than an
/// exact max-norm.
pub fn weak_bound_distance(old: &VList, new: &VList) -> f64 {
    if new.is_empty() {
        return 0.0;
    }
    if old.is_empty() {
        return f64::INFINITY;
    }
    let mut worst: f64 = 0.0;
    for fresh in new {
        let mut closest = f64::INFINITY;
        for stale in old {
            let distance = linf_distance(&fresh.values, &stale.values);
            if distance < closest {
                closest = distance;
            }
        }
        if closest > worst {
            worst = closest;
        }
    }
    worst
}
