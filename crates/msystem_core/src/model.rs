//! Validated, immutable Object Model shared by every world of a run.

use crate::error::ValidationError;
use msystem_data::{
    EvolutionRule, FloatingObject, GlueRelation, MSystemDescription, MetabolicRule,
    MetabolicSubType, Multiset, RuleKind, SeedConfiguration, Tile, Vector3,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Template lookup tables, frozen after validation.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub glues: BTreeSet<String>,
    pub proteins: BTreeSet<String>,
    pub floating: BTreeMap<String, Arc<FloatingObject>>,
    pub tiles: BTreeMap<String, Arc<Tile>>,
    pub glue_relation: GlueRelation,
}

impl Catalog {
    #[must_use]
    pub fn tile(&self, name: &str) -> Option<&Arc<Tile>> {
        self.tiles.get(name)
    }

    #[must_use]
    pub fn floating(&self, name: &str) -> Option<&Arc<FloatingObject>> {
        self.floating.get(name)
    }
}

/// A loaded M System: catalog, rule set and seed placements.
#[derive(Debug, Clone)]
pub struct MSystem {
    pub catalog: Arc<Catalog>,
    pub rules: Arc<Vec<EvolutionRule>>,
    pub seed: SeedConfiguration,
}

fn unique<'a, I>(kind: &str, names: I) -> Result<BTreeSet<String>, ValidationError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = BTreeSet::new();
    for name in names {
        if name.is_empty() {
            return Err(ValidationError::new(kind, "empty name"));
        }
        if !seen.insert(name.to_string()) {
            return Err(ValidationError::new(name, format!("duplicate {kind} name")));
        }
    }
    Ok(seen)
}

fn finite(points: &[Vector3]) -> bool {
    points.iter().all(|p| p.is_finite())
}

fn units(set: &Multiset) -> u32 {
    set.values().sum()
}

impl MSystem {
    /// Validates a descriptor bundle. `tol` bounds the planarity check on tile vertices.
    pub fn from_description(desc: MSystemDescription, tol: f64) -> Result<Self, ValidationError> {
        let MSystemDescription { model, rules, seed } = desc;

        let glues = unique("glue", model.glues.iter().map(|g| g.name.as_str()))?;
        let proteins = unique("protein", model.proteins.iter().map(|p| p.name.as_str()))?;
        unique(
            "floating object",
            model.floating_objects.iter().map(|f| f.name.as_str()),
        )?;
        unique("tile", model.tiles.iter().map(|t| t.name.as_str()))?;
        unique("rule", rules.iter().map(|r| r.name.as_str()))?;

        let floating: BTreeMap<String, Arc<FloatingObject>> = model
            .floating_objects
            .into_iter()
            .map(|f| (f.name.clone(), Arc::new(f)))
            .collect();

        for f in floating.values() {
            if !(f.concentration.is_finite() && f.concentration >= 0.0) {
                return Err(ValidationError::new(&f.name, "concentration must be >= 0"));
            }
            if !(f.mobility.is_finite() && f.mobility >= 0.0) {
                return Err(ValidationError::new(&f.name, "mobility must be >= 0"));
            }
        }

        for tile in &model.tiles {
            validate_tile(tile, &glues, &proteins, tol)?;
        }

        for entry in &model.glue_relation.entries {
            for glue in [&entry.glue1, &entry.glue2] {
                if !glues.contains(glue) {
                    return Err(ValidationError::new(
                        glue,
                        "glue relation references undeclared glue",
                    ));
                }
            }
            for signal in entry.signals.keys() {
                if !floating.contains_key(signal) {
                    return Err(ValidationError::new(
                        signal,
                        "glue relation signal is not a floating object",
                    ));
                }
            }
        }

        let tiles: BTreeMap<String, Arc<Tile>> = model
            .tiles
            .into_iter()
            .map(|t| (t.name.clone(), Arc::new(t)))
            .collect();

        let catalog = Catalog {
            glues,
            proteins,
            floating,
            tiles,
            glue_relation: model.glue_relation,
        };

        for rule in &rules {
            validate_rule(rule, &catalog)?;
        }

        for placed in &seed.tiles {
            if !catalog.tiles.contains_key(&placed.tile) {
                return Err(ValidationError::new(&placed.tile, "seed references undeclared tile"));
            }
            if !placed.position.is_finite() {
                return Err(ValidationError::new(&placed.tile, "seed position is not finite"));
            }
        }
        for batch in &seed.floating {
            if !catalog.floating.contains_key(&batch.name) {
                return Err(ValidationError::new(
                    &batch.name,
                    "seed references undeclared floating object",
                ));
            }
            if !(batch.spread.is_finite() && batch.spread >= 0.0) {
                return Err(ValidationError::new(&batch.name, "seed spread must be >= 0"));
            }
        }

        Ok(Self {
            catalog: Arc::new(catalog),
            rules: Arc::new(rules),
            seed,
        })
    }
}

fn validate_tile(
    tile: &Tile,
    glues: &BTreeSet<String>,
    proteins: &BTreeSet<String>,
    tol: f64,
) -> Result<(), ValidationError> {
    let err = |reason: String| ValidationError::new(&tile.name, reason);

    if tile.vertices.is_empty() {
        return Err(err("tile has no vertices".into()));
    }
    if !finite(&tile.vertices) {
        return Err(err("vertex coordinates must be finite".into()));
    }
    if tile.vertices.iter().any(|v| v.z.abs() > tol) {
        return Err(err("vertices must lie in the local z = 0 plane".into()));
    }
    if !(tile.thickness.is_finite() && tile.thickness >= 0.0) {
        return Err(err("thickness must be >= 0".into()));
    }
    if let Some(glue) = &tile.surface_glue {
        if !glues.contains(glue) {
            return Err(err(format!("surface glue `{glue}` is not declared")));
        }
    }

    let mut names = BTreeSet::new();
    for c in &tile.connectors {
        if !names.insert(c.name.as_str()) {
            return Err(err(format!("duplicate connector `{}`", c.name)));
        }
        if !(1..=2).contains(&c.anchors.len()) {
            return Err(err(format!(
                "connector `{}` needs one or two anchors, has {}",
                c.name,
                c.anchors.len()
            )));
        }
        if !finite(&c.anchors) || !c.angle.is_finite() {
            return Err(err(format!("connector `{}` has non-finite geometry", c.name)));
        }
        if c.anchors.len() == 2 && c.anchors[0].distance(c.anchors[1]) <= tol {
            return Err(err(format!("connector `{}` has a zero-length edge", c.name)));
        }
        if !glues.contains(&c.glue) {
            return Err(err(format!(
                "connector `{}` uses undeclared glue `{}`",
                c.name, c.glue
            )));
        }
        if c.resistance.is_some_and(|r| !(r.is_finite() && r >= 0.0)) {
            return Err(err(format!("connector `{}` has invalid resistance", c.name)));
        }
    }

    for attachment in &tile.proteins {
        if !proteins.contains(&attachment.protein) {
            return Err(err(format!(
                "protein `{}` is not declared",
                attachment.protein
            )));
        }
        if !attachment.position.is_finite() {
            return Err(err("protein position must be finite".into()));
        }
    }
    Ok(())
}

fn check_floating(rule: &str, set: &Multiset, catalog: &Catalog) -> Result<(), ValidationError> {
    for name in set.keys() {
        if !catalog.floating.contains_key(name) {
            return Err(ValidationError::new(
                rule,
                format!("undeclared floating object `{name}`"),
            ));
        }
    }
    Ok(())
}

fn check_tile<'a>(rule: &str, name: &str, catalog: &'a Catalog) -> Result<&'a Tile, ValidationError> {
    catalog
        .tiles
        .get(name)
        .map(|t| &**t)
        .ok_or_else(|| ValidationError::new(rule, format!("undeclared tile `{name}`")))
}

fn validate_metabolic(rule: &str, m: &MetabolicRule, catalog: &Catalog) -> Result<(), ValidationError> {
    if !catalog.proteins.contains(&m.protein) {
        return Err(ValidationError::new(
            rule,
            format!("undeclared protein `{}`", m.protein),
        ));
    }
    for set in [&m.left_in, &m.left_out, &m.right_in, &m.right_out] {
        check_floating(rule, set, catalog)?;
    }

    let (inward, outward) = (units(&m.left_out), units(&m.left_in));
    if inward + outward == 0 {
        return Err(ValidationError::new(rule, "metabolic left side is empty"));
    }
    let consistent = match m.sub_type {
        MetabolicSubType::Uniport => {
            let species: BTreeSet<&String> = m.left_in.keys().chain(m.left_out.keys()).collect();
            species.len() == 1 && (inward == 0 || outward == 0)
        }
        MetabolicSubType::Symport => (inward == 0 || outward == 0) && inward + outward >= 2,
        MetabolicSubType::Antiport => inward > 0 && outward > 0,
    };
    if !consistent {
        return Err(ValidationError::new(
            rule,
            format!("in/out maps do not describe a {:?} transport", m.sub_type),
        ));
    }
    Ok(())
}

fn validate_rule(rule: &EvolutionRule, catalog: &Catalog) -> Result<(), ValidationError> {
    let name = rule.name.as_str();
    match &rule.kind {
        RuleKind::Metabolic(m) => validate_metabolic(name, m, catalog),
        RuleKind::Create(c) => {
            check_floating(name, &c.reagents, catalog)?;
            let tile = check_tile(name, &c.tile, catalog)?;
            if tile.connectors.is_empty() {
                return Err(ValidationError::new(name, "created tile has no connectors"));
            }
            Ok(())
        }
        RuleKind::Insert(i) => {
            check_floating(name, &i.reagents, catalog)?;
            let tile = check_tile(name, &i.tile, catalog)?;
            if tile.connectors.len() < 2 {
                return Err(ValidationError::new(
                    name,
                    "inserted tile needs at least two connectors",
                ));
            }
            Ok(())
        }
        RuleKind::Divide(d) => {
            check_floating(name, &d.cost, catalog)?;
            let tile = check_tile(name, &d.tile, catalog)?;
            if tile.connector_index(&d.connector).is_none() {
                return Err(ValidationError::new(
                    name,
                    format!("tile `{}` has no connector `{}`", d.tile, d.connector),
                ));
            }
            Ok(())
        }
        RuleKind::Destroy(d) => {
            check_floating(name, &d.reagents, catalog)?;
            check_floating(name, &d.products, catalog)?;
            check_tile(name, &d.tile, catalog).map(|_| ())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msystem_data::{Connector, CreateRule, Glue, ObjectModel, Protein, SeedTile};

    fn square(name: &str, glue: &str) -> Tile {
        Tile {
            name: name.into(),
            vertices: vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(1.0, 1.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
            ],
            connectors: vec![Connector {
                name: "east".into(),
                anchors: vec![Vector3::new(1.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 0.0)],
                angle: 0.0,
                glue: glue.into(),
                resistance: None,
            }],
            surface_glue: None,
            proteins: Vec::new(),
            color: Default::default(),
            thickness: 0.1,
        }
    }

    fn description() -> MSystemDescription {
        MSystemDescription {
            model: ObjectModel {
                glues: vec![Glue { name: "g".into() }],
                proteins: vec![Protein { name: "p".into() }],
                floating_objects: vec![FloatingObject {
                    name: "a".into(),
                    concentration: 0.0,
                    mobility: 0.0,
                    color: Default::default(),
                }],
                tiles: vec![square("q1", "g")],
                glue_relation: GlueRelation::default(),
            },
            rules: vec![EvolutionRule {
                name: "grow".into(),
                priority: 1,
                kind: RuleKind::Create(CreateRule {
                    reagents: [("a".to_string(), 3)].into_iter().collect(),
                    tile: "q1".into(),
                }),
            }],
            seed: SeedConfiguration {
                tiles: vec![SeedTile {
                    tile: "q1".into(),
                    position: Vector3::ZERO,
                    orientation: Default::default(),
                }],
                floating: Vec::new(),
            },
        }
    }

    #[test]
    fn test_valid_description() {
        let system = MSystem::from_description(description(), 1e-6).unwrap();
        assert!(system.catalog.tile("q1").is_some());
        assert_eq!(system.rules.len(), 1);
    }

    #[test]
    fn test_undeclared_glue_rejected() {
        let mut desc = description();
        desc.model.tiles = vec![square("q1", "missing")];
        let err = MSystem::from_description(desc, 1e-6).unwrap_err();
        assert_eq!(err.object, "q1");
    }

    #[test]
    fn test_duplicate_tile_rejected() {
        let mut desc = description();
        desc.model.tiles.push(square("q1", "g"));
        assert!(MSystem::from_description(desc, 1e-6).is_err());
    }

    #[test]
    fn test_rule_with_unknown_reagent_rejected() {
        let mut desc = description();
        desc.rules[0].kind = RuleKind::Create(CreateRule {
            reagents: [("zz".to_string(), 1)].into_iter().collect(),
            tile: "q1".into(),
        });
        let err = MSystem::from_description(desc, 1e-6).unwrap_err();
        assert_eq!(err.object, "grow");
    }

    #[test]
    fn test_antiport_needs_both_directions() {
        let mut desc = description();
        desc.rules[0].kind = RuleKind::Metabolic(MetabolicRule {
            sub_type: MetabolicSubType::Antiport,
            protein: "p".into(),
            left_out: [("a".to_string(), 1)].into_iter().collect(),
            right_in: [("a".to_string(), 1)].into_iter().collect(),
            ..Default::default()
        });
        assert!(MSystem::from_description(desc, 1e-6).is_err());
    }

    #[test]
    fn test_non_planar_tile_rejected() {
        let mut desc = description();
        desc.model.tiles[0].vertices[2].z = 0.5;
        assert!(MSystem::from_description(desc, 1e-6).is_err());
    }
}
