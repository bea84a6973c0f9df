use super::model::Multiset;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleType {
    Metabolic,
    Create,
    Insert,
    Divide,
    Destroy,
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Metabolic => "Metabolic",
            Self::Create => "Create",
            Self::Insert => "Insert",
            Self::Divide => "Divide",
            Self::Destroy => "Destroy",
        };
        f.write_str(name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
/// Transport pattern of a metabolic rule across a tile surface.
pub enum MetabolicSubType {
    /// Several units cross in the same direction.
    Symport,
    /// Units cross in opposite directions.
    Antiport,
    /// A single species crosses in one direction.
    #[default]
    Uniport,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
/// Protein-catalysed transfer between the inner and outer side of a tile.
pub struct MetabolicRule {
    pub sub_type: MetabolicSubType,
    pub protein: String,
    #[serde(default)]
    pub left_in: Multiset,
    #[serde(default)]
    pub left_out: Multiset,
    #[serde(default)]
    pub right_in: Multiset,
    #[serde(default)]
    pub right_out: Multiset,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
/// Consumes reagents to bond a new tile onto a free connector.
pub struct CreateRule {
    #[serde(default)]
    pub reagents: Multiset,
    pub tile: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
/// Consumes reagents to splice a new tile into an existing bond.
pub struct InsertRule {
    #[serde(default)]
    pub reagents: Multiset,
    pub tile: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
/// Duplicates the component of `tile`, releasing the copy beyond `connector`.
pub struct DivideRule {
    pub tile: String,
    pub connector: String,
    #[serde(default)]
    pub cost: Multiset,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
/// Removes a tile (or its component) and releases products into the pool.
pub struct DestroyRule {
    pub tile: String,
    #[serde(default)]
    pub reagents: Multiset,
    #[serde(default)]
    pub products: Multiset,
    #[serde(default)]
    pub whole_component: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum RuleKind {
    Metabolic(MetabolicRule),
    Create(CreateRule),
    Insert(InsertRule),
    Divide(DivideRule),
    Destroy(DestroyRule),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Kind of catalog object a rule side refers to.
pub enum RuleObjectKind {
    Tile,
    Protein,
    Floating,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleObject {
    pub kind: RuleObjectKind,
    pub name: String,
    pub count: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// Priority-ordered rewrite rule. Lower priority values fire first.
pub struct EvolutionRule {
    pub name: String,
    #[serde(default)]
    pub priority: u32,
    #[serde(flatten)]
    pub kind: RuleKind,
}

fn floating_side(set: &Multiset, out: &mut Vec<RuleObject>) {
    for (name, &count) in set {
        if count > 0 {
            out.push(RuleObject {
                kind: RuleObjectKind::Floating,
                name: name.clone(),
                count,
            });
        }
    }
}

fn tile_object(name: &str, count: u32) -> RuleObject {
    RuleObject {
        kind: RuleObjectKind::Tile,
        name: name.to_string(),
        count,
    }
}

impl EvolutionRule {
    #[must_use]
    pub fn rule_type(&self) -> RuleType {
        match self.kind {
            RuleKind::Metabolic(_) => RuleType::Metabolic,
            RuleKind::Create(_) => RuleType::Create,
            RuleKind::Insert(_) => RuleType::Insert,
            RuleKind::Divide(_) => RuleType::Divide,
            RuleKind::Destroy(_) => RuleType::Destroy,
        }
    }

    /// Structural rules change the bonding graph; metabolic rules only move pool objects.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        !matches!(self.kind, RuleKind::Metabolic(_))
    }

    /// Objects consumed or required by the rule.
    #[must_use]
    pub fn left_side(&self) -> Vec<RuleObject> {
        let mut side = Vec::new();
        match &self.kind {
            RuleKind::Metabolic(m) => {
                side.push(RuleObject {
                    kind: RuleObjectKind::Protein,
                    name: m.protein.clone(),
                    count: 1,
                });
                floating_side(&m.left_in, &mut side);
                floating_side(&m.left_out, &mut side);
            }
            RuleKind::Create(c) => floating_side(&c.reagents, &mut side),
            RuleKind::Insert(i) => floating_side(&i.reagents, &mut side),
            RuleKind::Divide(d) => {
                side.push(tile_object(&d.tile, 1));
                floating_side(&d.cost, &mut side);
            }
            RuleKind::Destroy(d) => {
                side.push(tile_object(&d.tile, 1));
                floating_side(&d.reagents, &mut side);
            }
        }
        side
    }

    /// Objects present after the rule fires.
    #[must_use]
    pub fn right_side(&self) -> Vec<RuleObject> {
        let mut side = Vec::new();
        match &self.kind {
            RuleKind::Metabolic(m) => {
                side.push(RuleObject {
                    kind: RuleObjectKind::Protein,
                    name: m.protein.clone(),
                    count: 1,
                });
                floating_side(&m.right_in, &mut side);
                floating_side(&m.right_out, &mut side);
            }
            RuleKind::Create(c) => side.push(tile_object(&c.tile, 1)),
            RuleKind::Insert(i) => side.push(tile_object(&i.tile, 1)),
            RuleKind::Divide(d) => side.push(tile_object(&d.tile, 2)),
            RuleKind::Destroy(d) => floating_side(&d.products, &mut side),
        }
        side
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_deserializes_from_tagged_json() {
        let json = r#"{"name":"grow","priority":2,"type":"Create","reagents":{"a":3},"tile":"q1"}"#;
        let rule: EvolutionRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.rule_type(), RuleType::Create);
        assert_eq!(rule.priority, 2);
        assert!(rule.is_structural());
        let left = rule.left_side();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].count, 3);
        assert_eq!(rule.right_side()[0].name, "q1");
    }

    #[test]
    fn test_metabolic_sides_include_protein() {
        let mut left_out = Multiset::new();
        left_out.insert("a".into(), 1);
        let mut right_in = Multiset::new();
        right_in.insert("a".into(), 1);
        let rule = EvolutionRule {
            name: "pump".into(),
            priority: 1,
            kind: RuleKind::Metabolic(MetabolicRule {
                sub_type: MetabolicSubType::Uniport,
                protein: "p".into(),
                left_out,
                right_in,
                ..Default::default()
            }),
        };
        assert!(!rule.is_structural());
        assert_eq!(rule.left_side()[0].kind, RuleObjectKind::Protein);
        assert_eq!(rule.right_side().len(), 2);
    }
}
