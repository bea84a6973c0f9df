use super::geometry::Vector3;
use super::model::ObjectModel;
use super::rule::EvolutionRule;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
/// Intrinsic rotation angles in radians, applied roll (X), pitch (Y), yaw (Z).
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// A tile placed in the world before the first step.
pub struct SeedTile {
    pub tile: String,
    #[serde(default)]
    pub position: Vector3,
    #[serde(default)]
    pub orientation: EulerAngles,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// A batch of floating objects scattered around `position`.
pub struct SeedFloating {
    pub name: String,
    pub count: u32,
    #[serde(default)]
    pub position: Vector3,
    /// Half extent of the cube the batch is scattered in.
    #[serde(default)]
    pub spread: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SeedConfiguration {
    #[serde(default)]
    pub tiles: Vec<SeedTile>,
    #[serde(default)]
    pub floating: Vec<SeedFloating>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
/// Everything the descriptor loader hands to the engine.
pub struct MSystemDescription {
    pub model: ObjectModel,
    #[serde(default)]
    pub rules: Vec<EvolutionRule>,
    #[serde(default)]
    pub seed: SeedConfiguration,
}
