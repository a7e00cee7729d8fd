//! Homotopy-class discovery and candidate lifecycle management.
//!
//! The planning cycle runs bottom-up through this module:
//! [`graph`] builds an exploration graph between start and goal,
//! [`exploration`] enumerates simple paths through it, [`h_signature`]
//! classifies each path topologically, [`pool`] keeps one optimized
//! trajectory per class alive across cycles, and [`planner`] orchestrates
//! the whole cycle.

pub mod exploration;
pub mod graph;
pub mod h_signature;
pub mod planner;
pub mod pool;
