//! # M System
//!
//! Simulator for M Systems: tiles bonding through glued connectors in 3D,
//! floating objects around them, and priority-ordered evolution rules.
//!
//! The engine lives in `msystem_core`, plain data types in `msystem_data`
//! and descriptor loading plus the run log in `msystem_io`. This crate adds
//! the drivers in [`app`] and the `msystem` command line tool.

pub mod app;

pub use msystem_core::{
    calculate_tile_stats, init_logging, AppConfig, BatchSummary, MSystem, RunOutcome, SimError,
    SimEvent, SimState, Simulator, StepSnapshot, Termination, TileStats, World,
};
pub use msystem_data::MSystemDescription;
pub use msystem_io::{load_system, RunLogger};
