//! Plain data types shared by the M System engine, loader and tooling.
//!
//! Nothing here knows about a running world: these are the immutable
//! templates, the rule catalog and the seed placements an external
//! descriptor loader produces.

pub mod data;

pub use data::geometry::{Color, Point, Quaternion, Vector3};
pub use data::model::{
    Connector, FloatingObject, Glue, GlueRelation, GlueRelationEntry, Multiset, ObjectModel,
    Protein, ProteinAttachment, Tile,
};
pub use data::rule::{
    CreateRule, DestroyRule, DivideRule, EvolutionRule, InsertRule, MetabolicRule,
    MetabolicSubType, RuleKind, RuleObject, RuleObjectKind, RuleType,
};
pub use data::seed::{EulerAngles, MSystemDescription, SeedConfiguration, SeedFloating, SeedTile};
