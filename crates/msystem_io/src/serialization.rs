//! JSON helpers and M System descriptor loading.
//!
//! The descriptor is the already-structured `MSystemDescription` bundle;
//! loading it here means deserialising and then validating it into an
//! [`MSystem`].

use crate::error::{IoError, Result};
use msystem_core::MSystem;
use msystem_data::MSystemDescription;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Serializes data to JSON.
pub fn to_json<T>(data: &T) -> Result<String>
where
    T: Serialize,
{
    serde_json::to_string(data)
        .map_err(|e| IoError::serialization(format!("JSON serialization failed: {}", e)))
}

/// Serializes data to pretty-printed JSON.
pub fn to_json_pretty<T>(data: &T) -> Result<String>
where
    T: Serialize,
{
    serde_json::to_string_pretty(data)
        .map_err(|e| IoError::serialization(format!("JSON serialization failed: {}", e)))
}

/// Deserializes data from a JSON string; an empty document is a validation error.
pub fn from_json<T>(json: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    if json.trim().is_empty() {
        return Err(IoError::validation("Empty JSON string"));
    }

    serde_json::from_str(json)
        .map_err(|e| IoError::serialization(format!("JSON deserialization failed: {}", e)))
}

pub fn write_json_file<T, P>(data: &T, path: P) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let json = to_json_pretty(data)?;
    std::fs::write(&path, json).map_err(|e| {
        IoError::FileSystem(e).with_context(format!("writing JSON to {:?}", path.as_ref()))
    })?;
    Ok(())
}

pub fn read_json_file<T, P>(path: P) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let json = std::fs::read_to_string(&path).map_err(|e| {
        IoError::FileSystem(e).with_context(format!("reading JSON from {:?}", path.as_ref()))
    })?;
    from_json(&json)
}

/// Reads a descriptor bundle without validating it.
pub fn load_description<P: AsRef<Path>>(path: P) -> Result<MSystemDescription> {
    read_json_file(path)
}

/// Reads and validates a descriptor bundle.
///
/// `tolerance` is the geometric epsilon validation checks planarity with.
pub fn load_system<P: AsRef<Path>>(path: P, tolerance: f64) -> Result<MSystem> {
    let description = load_description(&path)?;
    MSystem::from_description(description, tolerance).map_err(|e| {
        IoError::from(e).with_context(format!("validating {:?}", path.as_ref()))
    })
}
