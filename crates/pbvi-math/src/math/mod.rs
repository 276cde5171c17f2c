//! Core math modules.

pub mod lp;
pub mod prune;
pub mod simplex;
