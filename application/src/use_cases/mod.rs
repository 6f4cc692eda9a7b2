//! Use cases
//!
//! Application-level operations that orchestrate the registry, tracker,
//! permission gate and session guard.

pub mod aggregator;
pub mod prompt_turn;
pub mod shared;
