//! The search layer: a monotonicity-aware sweep of the generalization
//! lattice (FLASH) with an exhaustive fallback for non-monotone model
//! sets and a time-bounded heuristic for oversized search spaces.

pub mod search;
pub mod strategy;

pub use search::{SearchOptions, SearchOutcome, search};
pub use strategy::FlashStrategy;
