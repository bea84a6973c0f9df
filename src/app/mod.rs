//! Drivers around the engine: the worker-thread controller, the event
//! observer and the multi-run batch runner.

pub mod batch;
pub mod controller;
pub mod observer;

pub use batch::{run_trial, BatchRunner, TrialResult};
pub use controller::{ControlCommand, SimulationController};
pub use observer::{ObserverReport, RunObserver};
