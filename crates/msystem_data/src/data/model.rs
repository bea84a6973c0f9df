use super::geometry::{Color, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named counts of floating objects (or other catalog objects).
pub type Multiset = BTreeMap<String, u32>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
/// Named compatibility tag carried by connectors and tile surfaces.
pub struct Glue {
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// One row of the glue table: the unordered pair may bond when `signals` are present.
pub struct GlueRelationEntry {
    pub glue1: String,
    pub glue2: String,
    #[serde(default)]
    pub signals: Multiset,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
/// Table of glue pairs allowed to bond.
pub struct GlueRelation {
    #[serde(default)]
    pub entries: Vec<GlueRelationEntry>,
}

impl GlueRelation {
    /// Signals required to bond `a` with `b`; `None` when the pair never bonds.
    ///
    /// The pair is unordered.
    #[must_use]
    pub fn signals_for(&self, a: &str, b: &str) -> Option<&Multiset> {
        self.entries
            .iter()
            .find(|e| (e.glue1 == a && e.glue2 == b) || (e.glue1 == b && e.glue2 == a))
            .map(|e| &e.signals)
    }

    #[must_use]
    pub fn is_compatible(&self, a: &str, b: &str) -> bool {
        self.signals_for(a, b).is_some()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// Bonding site of a tile template.
///
/// One anchor makes a point connector, two anchors an edge connector.
/// Anchors are expressed in the tile's local frame.
pub struct Connector {
    pub name: String,
    pub anchors: Vec<Vector3>,
    /// Bonding angle in radians.
    #[serde(default)]
    pub angle: f64,
    pub glue: String,
    #[serde(default)]
    pub resistance: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Protein {
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// Protein instance fixed on a tile at a local position.
pub struct ProteinAttachment {
    pub protein: String,
    pub position: Vector3,
}

fn default_thickness() -> f64 {
    0.1
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// Immutable tile template.
///
/// Vertices lie in the local `z = 0` plane; three or more make a polygon,
/// two a rod and one a point.
pub struct Tile {
    pub name: String,
    pub vertices: Vec<Vector3>,
    #[serde(default)]
    pub connectors: Vec<Connector>,
    #[serde(default)]
    pub surface_glue: Option<String>,
    #[serde(default)]
    pub proteins: Vec<ProteinAttachment>,
    #[serde(default)]
    pub color: Color,
    #[serde(default = "default_thickness")]
    pub thickness: f64,
}

impl Tile {
    #[must_use]
    pub fn connector_index(&self, name: &str) -> Option<usize> {
        self.connectors.iter().position(|c| c.name == name)
    }

    #[must_use]
    pub fn is_polygon(&self) -> bool {
        self.vertices.len() >= 3
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// Mobile species template.
pub struct FloatingObject {
    pub name: String,
    /// Objects per unit volume when seeding by concentration.
    #[serde(default)]
    pub concentration: f64,
    /// Maximum per-axis displacement per step.
    #[serde(default)]
    pub mobility: f64,
    #[serde(default)]
    pub color: Color,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
/// Catalog of every template an M System may instantiate.
pub struct ObjectModel {
    #[serde(default)]
    pub glues: Vec<Glue>,
    #[serde(default)]
    pub proteins: Vec<Protein>,
    #[serde(default)]
    pub floating_objects: Vec<FloatingObject>,
    #[serde(default)]
    pub tiles: Vec<Tile>,
    #[serde(default)]
    pub glue_relation: GlueRelation,
}
