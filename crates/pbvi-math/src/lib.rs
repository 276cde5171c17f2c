//! Geometry over the probability simplex for POMDP value functions.

pub mod math;

pub use math::lp::*;
pub use math::prune::*;
pub use math::simplex::*;
