//! Small helpers for vectors living on (or evaluated over) the probability simplex.

/// Tolerance when checking that probabilities sum to 1.
pub const SIMPLEX_TOLERANCE: f64 = 1e-6;

/// Dot product of two equal-length slices.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Largest absolute componentwise difference between two equal-length slices.
///
/// Returns 0.0 for empty input.
pub fn linf_distance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

/// True when every entry is a finite non-negative probability and the entries
/// sum to 1 within [`SIMPLEX_TOLERANCE`]. Empty slices are not distributions.
pub fn is_distribution(p: &[f64]) -> bool {
    if p.is_empty() {
        return false;
    }
    let mut sum = 0.0;
    for &x in p {
        if !x.is_finite() || x < 0.0 {
            return false;
        }
        sum += x;
    }
    (sum - 1.0).abs() <= SIMPLEX_TOLERANCE
}

/// Scale `p` in place so its entries sum to 1.
///
/// Returns the mass present before scaling, or None when that mass is zero,
/// negative, or non-finite (in which case `p` is left untouched).
pub fn normalize(p: &mut [f64]) -> Option<f64> {
    let mass: f64 = p.iter().sum();
    if !mass.is_finite() || mass <= 0.0 {
        return None;
    }
    for x in p.iter_mut() {
        *x /= mass;
    }
    Some(mass)
}
