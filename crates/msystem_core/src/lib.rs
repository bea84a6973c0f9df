//! # M System Core
//!
//! The simulation engine for M Systems: tiles bonding through glued
//! connectors in 3D, floating objects diffusing around them, and
//! priority-ordered evolution rules rewriting both.
//!
//! This crate contains:
//! - The geometry kernel (vectors, rotations, planes, polytope intersection)
//! - The validated object model and the spatial world with its bond graph
//! - The floating object pool
//! - The evolution rule engine (Metabolic, Create, Insert, Divide, Destroy)
//! - The simulator step loop with run control and damage injection
//! - Component statistics, metrics and structured logging
//!
//! ## Example
//!
//! ```
//! use msystem_core::geometry::{RotationLogic, Quaternion, Vector3};
//! use std::f64::consts::FRAC_PI_2;
//!
//! let q = Quaternion::from_axis_angle(Vector3::Z, FRAC_PI_2);
//! let v = q.apply(Vector3::X);
//! assert!(v.approx_eq(Vector3::Y, 1e-9));
//! ```

/// Run configuration (world, geometry, rules, stats, batch)
pub mod config;
/// Error taxonomy shared by the engine and its drivers
pub mod error;
/// Floating object pool with spatial selection and mobility
pub mod floating;
/// Vector, rotation and plane operations
pub mod geometry;
/// Performance metrics collection and logging
pub mod metrics;
/// Validated object model and rule catalog
pub mod model;
/// Polygon shapes, intersection tests and contact resolution
pub mod polytope;
/// Evolution rule matching and firing
pub mod rules;
/// Step loop and run control
pub mod simulator;
/// Per-step deltas and notifications
pub mod snapshot;
/// Component scoring and batch aggregation
pub mod stats;
/// Placed tiles, bonds and components
pub mod world;

pub use config::AppConfig;
pub use error::{GeometryError, RuleError, RuleFailure, SimError, ValidationError};
pub use metrics::{init_logging, Metrics};
pub use model::{Catalog, MSystem};
pub use simulator::{RunOutcome, SimEvent, SimState, Simulator, StopFlag, Termination};
pub use snapshot::{Notification, StepSnapshot};
pub use stats::{calculate_tile_stats, BatchSummary, TileStats};
pub use world::{TileId, World};
