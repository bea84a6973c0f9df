//! Error taxonomy for the simulation engine.
//!
//! Only [`ValidationError`] and [`SimError::RuntimeRunFailure`] ever reach a
//! caller. [`RuleError`]s are produced while matching and firing rules and
//! are always absorbed by the engine as "not applicable this step".

use thiserror::Error;

/// Failures of the geometry kernel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("invalid rotation: quaternion norm {norm} is not 1")]
    InvalidRotation { norm: f64 },
}

/// Malformed or inconsistent Object Model, rule set or configuration.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("validation failure for `{object}`: {reason}")]
pub struct ValidationError {
    pub object: String,
    pub reason: String,
}

impl ValidationError {
    #[must_use]
    pub fn new<O: Into<String>, R: Into<String>>(object: O, reason: R) -> Self {
        Self {
            object: object.into(),
            reason: reason.into(),
        }
    }
}

/// Reasons a candidate rule instance could not be applied.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("glues `{glue1}` and `{glue2}` are not related")]
    IncompatibleGlue { glue1: String, glue2: String },

    #[error("bond between `{glue1}` and `{glue2}` needs signal `{signal}` nearby")]
    MissingSignal {
        glue1: String,
        glue2: String,
        signal: String,
    },

    #[error("geometry mismatch: {0}")]
    GeometryMismatch(String),

    #[error("collision unresolved after {retries} pushes")]
    CollisionUnresolved { retries: u32 },

    #[error("missing reagents: {0}")]
    MissingReagents(String),

    #[error("not applicable: {0}")]
    NotApplicable(String),

    /// World invariant broken; escalated to a run failure instead of absorbed.
    #[error("internal inconsistency: {0}")]
    Internal(String),
}

impl From<GeometryError> for RuleError {
    fn from(err: GeometryError) -> Self {
        Self::GeometryMismatch(err.to_string())
    }
}

/// An absorbed rule failure with enough context to reproduce it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("rule `{rule}` not applied at step {step} (objects {objects:?}): {cause}")]
pub struct RuleFailure {
    pub rule: String,
    pub step: u64,
    pub objects: Vec<String>,
    pub cause: RuleError,
}

/// Errors surfaced to whoever drives a simulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("run failure in trial {trial} at step {step} (rule {rule:?}, objects {objects:?}): {message}")]
    RuntimeRunFailure {
        trial: usize,
        step: u64,
        rule: Option<String>,
        objects: Vec<String>,
        message: String,
    },

    #[error("simulation worker is not running")]
    WorkerUnavailable,
}

impl SimError {
    /// Wraps an escalated rule failure.
    #[must_use]
    pub fn from_rule_failure(trial: usize, failure: RuleFailure) -> Self {
        Self::RuntimeRunFailure {
            trial,
            step: failure.step,
            rule: Some(failure.rule),
            objects: failure.objects,
            message: failure.cause.to_string(),
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display() {
        let err = ValidationError::new("q1", "tile has no vertices");
        assert_eq!(
            err.to_string(),
            "validation failure for `q1`: tile has no vertices"
        );
    }

    #[test]
    fn test_rule_failure_carries_context() {
        let failure = RuleFailure {
            rule: "grow".into(),
            step: 7,
            objects: vec!["q1".into()],
            cause: RuleError::Internal("dangling bond".into()),
        };
        let err = SimError::from_rule_failure(3, failure);
        let text = err.to_string();
        assert!(text.contains("trial 3"));
        assert!(text.contains("step 7"));
        assert!(text.contains("grow"));
        assert!(text.contains("q1"));
    }

    #[test]
    fn test_geometry_error_becomes_mismatch() {
        let err: RuleError = GeometryError::InvalidRotation { norm: 2.0 }.into();
        assert!(matches!(err, RuleError::GeometryMismatch(_)));
    }
}
