//! Upper-envelope pruning for sets of state-value vectors.
//!
//! A vector belongs to the upper envelope when some probability distribution
//! (a "witness point") exists where it strictly beats every other kept
//! vector. The construction is Lark's filtering algorithm: cheap pointwise
//! screening first, then one small linear program per surviving vector.

use serde::Serialize;

use super::lp::{LinearProgram, LpOutcome, Relation};
use super::simplex::{dot, normalize};

/// Advantage below which a witness does not count as strict.
pub const WITNESS_TOLERANCE: f64 = 1e-9;

/// Counters describing one pruning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PruneStats {
    /// Vectors examined.
    pub examined: usize,
    /// Vectors kept on the envelope.
    pub kept: usize,
    /// Vectors dropped by the pointwise screening, before any LP ran.
    pub dropped_pointwise: usize,
    /// Witness searches performed.
    pub witness_calls: usize,
}

/// True when `a` is componentwise greater than or equal to `b`.
pub fn pointwise_dominates(a: &[f64], b: &[f64]) -> bool {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).all(|(x, y)| x >= y)
}

/// Searches for a distribution where `target` strictly beats every vector in
/// `others`.
///
/// Solves `max δ` over beliefs `b` subject to `b·(target - u) ≥ δ` for every
/// `u`, and returns the witness belief when the best advantage exceeds
/// [`WITNESS_TOLERANCE`]. An empty `others` makes any belief a witness; the
/// uniform one is returned.
pub fn witness_point(target: &[f64], others: &[&[f64]]) -> Option<Vec<f64>> {
    let dim = target.len();
    if dim == 0 {
        return None;
    }
    if others.is_empty() {
        return Some(vec![1.0 / dim as f64; dim]);
    }

    // Variables: b_1..b_dim, then the advantage split as δ⁺ - δ⁻ so the
    // program stays in non-negative variables.
    let mut lp = LinearProgram::new(dim + 2);
    let mut objective = vec![0.0; dim + 2];
    objective[dim] = 1.0;
    objective[dim + 1] = -1.0;
    lp.set_objective(&objective);

    let mut row = vec![0.0; dim + 2];
    for u in others {
        debug_assert_eq!(u.len(), dim);
        for (slot, (u_s, t_s)) in row.iter_mut().zip(u.iter().zip(target)) {
            *slot = u_s - t_s;
        }
        row[dim] = 1.0;
        row[dim + 1] = -1.0;
        lp.add_row(&row, Relation::LessEq, 0.0);
    }
    for slot in row.iter_mut().take(dim) {
        *slot = 1.0;
    }
    row[dim] = 0.0;
    row[dim + 1] = 0.0;
    lp.add_row(&row, Relation::Equal, 1.0);

    match lp.solve() {
        LpOutcome::Optimal {
            objective,
            mut solution,
        } if objective > WITNESS_TOLERANCE => {
            solution.truncate(dim);
            for x in solution.iter_mut() {
                if *x < 0.0 {
                    *x = 0.0;
                }
            }
            normalize(&mut solution)?;
            Some(solution)
        }
        _ => None,
    }
}

/// Computes the indices of the vectors lying on the upper envelope.
///
/// Kept indices come back in ascending order. Exact duplicates collapse to
/// their first occurrence; vectors only touching the envelope without
/// strictly exceeding it anywhere are dropped. All vectors must share one
/// dimension.
pub fn upper_envelope(vectors: &[&[f64]]) -> (Vec<usize>, PruneStats) {
    let mut stats = PruneStats {
        examined: vectors.len(),
        kept: 0,
        dropped_pointwise: 0,
        witness_calls: 0,
    };
    if vectors.is_empty() {
        return (Vec::new(), stats);
    }

    // Screening: drop anything strictly below another vector, and all but
    // the first copy of exact duplicates.
    let mut remaining: Vec<usize> = Vec::with_capacity(vectors.len());
    'screen: for i in 0..vectors.len() {
        for j in 0..vectors.len() {
            if i == j {
                continue;
            }
            if pointwise_dominates(vectors[j], vectors[i])
                && (!pointwise_dominates(vectors[i], vectors[j]) || j < i)
            {
                stats.dropped_pointwise += 1;
                continue 'screen;
            }
        }
        remaining.push(i);
    }

    // Lark's filtering: a candidate survives only with a witness against the
    // vectors kept so far; what actually moves to the kept set is the best
    // remaining vector at that witness, lexicographically greatest among
    // ties so the loop cannot stall.
    let mut kept: Vec<usize> = Vec::with_capacity(remaining.len());
    while let Some(&candidate) = remaining.last() {
        let kept_views: Vec<&[f64]> = kept.iter().map(|&k| vectors[k]).collect();
        stats.witness_calls += 1;
        match witness_point(vectors[candidate], &kept_views) {
            None => {
                remaining.pop();
            }
            Some(belief) => {
                let position = best_position_at(&belief, &remaining, vectors);
                kept.push(remaining.remove(position));
            }
        }
    }

    kept.sort_unstable();
    stats.kept = kept.len();
    (kept, stats)
}

/// Position in `pool` of the vector maximizing `belief · v`, preferring the
/// lexicographically greatest vector among near-ties.
fn best_position_at(belief: &[f64], pool: &[usize], vectors: &[&[f64]]) -> usize {
    let mut best = 0;
    let mut best_value = dot(belief, vectors[pool[0]]);
    for (position, &index) in pool.iter().enumerate().skip(1) {
        let value = dot(belief, vectors[index]);
        if value > best_value + WITNESS_TOLERANCE {
            best = position;
            best_value = value;
        } else if value > best_value - WITNESS_TOLERANCE
            && lex_greater(vectors[index], vectors[pool[best]])
        {
            best = position;
            best_value = best_value.max(value);
        }
    }
    best
}

fn lex_greater(a: &[f64], b: &[f64]) -> bool {
    for (x, y) in a.iter().zip(b) {
        if x > y {
            return true;
        }
        if x < y {
            return false;
        }
    }
    false
}
