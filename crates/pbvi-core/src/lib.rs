//! POMDP Point-Based Solver Core
//!
//! This library provides the core machinery for point-based POMDP solving:
//! - Model access trait and a dense tensor-backed implementation
//! - Belief points, Bayes updates, and simulation-based belief sampling
//! - Value lists of alpha vectors with policy annotations
//! - Per-action, per-observation projection of a value list
//! - The belief-covering backup loop with weak-bound stopping
//!
//! Simplex geometry and envelope pruning live in `pbvi-math`.

pub mod belief;
pub mod model;
pub mod projection;
pub mod solver;
pub mod value;
