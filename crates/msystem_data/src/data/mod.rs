//! Core data structures for the M System simulation.

pub mod geometry;
pub mod model;
pub mod rule;
pub mod seed;
