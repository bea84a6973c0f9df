pub mod macros;

use msystem_core::model::MSystem;
use msystem_core::{AppConfig, Simulator, World};
use msystem_data::{
    Connector, CreateRule, DestroyRule, EvolutionRule, FloatingObject, Glue, GlueRelationEntry,
    MSystemDescription, MetabolicRule, MetabolicSubType, Multiset, Protein, ProteinAttachment,
    RuleKind, SeedFloating, SeedTile, Tile, Vector3,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub fn multiset(items: &[(&str, u32)]) -> Multiset {
    items.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Unit square in the XY plane with an `east` edge connector on x = 1 and a
/// `west` one on x = 0.
pub fn square(name: &str, east_glue: &str, west_glue: &str) -> Tile {
    Tile {
        name: name.into(),
        vertices: vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ],
        connectors: vec![
            Connector {
                name: "east".into(),
                anchors: vec![Vector3::new(1.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 0.0)],
                angle: 0.0,
                glue: east_glue.into(),
                resistance: None,
            },
            Connector {
                name: "west".into(),
                anchors: vec![Vector3::new(0.0, 1.0, 0.0), Vector3::new(0.0, 0.0, 0.0)],
                angle: 0.0,
                glue: west_glue.into(),
                resistance: None,
            },
        ],
        surface_glue: None,
        proteins: Vec::new(),
        color: Default::default(),
        thickness: 0.1,
    }
}

#[allow(dead_code)]
pub struct ModelBuilder {
    desc: MSystemDescription,
}

#[allow(dead_code)]
impl ModelBuilder {
    pub fn new() -> Self {
        Self {
            desc: MSystemDescription::default(),
        }
    }

    pub fn glue(mut self, name: &str) -> Self {
        self.desc.model.glues.push(Glue { name: name.into() });
        self
    }

    pub fn protein(mut self, name: &str) -> Self {
        self.desc.model.proteins.push(Protein { name: name.into() });
        self
    }

    pub fn floating(mut self, name: &str, mobility: f64) -> Self {
        self.desc.model.floating_objects.push(FloatingObject {
            name: name.into(),
            concentration: 0.0,
            mobility,
            color: Default::default(),
        });
        self
    }

    pub fn bond(mut self, glue1: &str, glue2: &str, signals: &[(&str, u32)]) -> Self {
        self.desc
            .model
            .glue_relation
            .entries
            .push(GlueRelationEntry {
                glue1: glue1.into(),
                glue2: glue2.into(),
                signals: multiset(signals),
            });
        self
    }

    pub fn tile(mut self, tile: Tile) -> Self {
        self.desc.model.tiles.push(tile);
        self
    }

    /// A square carrying `protein` at its centre.
    pub fn membrane_tile(self, name: &str, glue: &str, protein: &str) -> Self {
        let mut tile = square(name, glue, glue);
        tile.proteins.push(ProteinAttachment {
            protein: protein.into(),
            position: Vector3::new(0.5, 0.5, 0.0),
        });
        self.tile(tile)
    }

    pub fn rule(mut self, name: &str, priority: u32, kind: RuleKind) -> Self {
        self.desc.rules.push(EvolutionRule {
            name: name.into(),
            priority,
            kind,
        });
        self
    }

    pub fn create_rule(self, name: &str, priority: u32, reagents: &[(&str, u32)], tile: &str) -> Self {
        self.rule(
            name,
            priority,
            RuleKind::Create(CreateRule {
                reagents: multiset(reagents),
                tile: tile.into(),
            }),
        )
    }

    pub fn destroy_rule(
        self,
        name: &str,
        tile: &str,
        reagents: &[(&str, u32)],
        products: &[(&str, u32)],
        whole_component: bool,
    ) -> Self {
        self.rule(
            name,
            1,
            RuleKind::Destroy(DestroyRule {
                tile: tile.into(),
                reagents: multiset(reagents),
                products: multiset(products),
                whole_component,
            }),
        )
    }

    pub fn uniport_in(self, name: &str, protein: &str, species: &str) -> Self {
        self.rule(
            name,
            1,
            RuleKind::Metabolic(MetabolicRule {
                sub_type: MetabolicSubType::Uniport,
                protein: protein.into(),
                left_in: Multiset::new(),
                left_out: multiset(&[(species, 1)]),
                right_in: multiset(&[(species, 1)]),
                right_out: Multiset::new(),
            }),
        )
    }

    pub fn uniport_out(self, name: &str, protein: &str, species: &str) -> Self {
        self.rule(
            name,
            1,
            RuleKind::Metabolic(MetabolicRule {
                sub_type: MetabolicSubType::Uniport,
                protein: protein.into(),
                left_in: multiset(&[(species, 1)]),
                left_out: Multiset::new(),
                right_in: Multiset::new(),
                right_out: multiset(&[(species, 1)]),
            }),
        )
    }

    /// Moves the already declared rule `name` to tier `priority`.
    pub fn priority(mut self, name: &str, priority: u32) -> Self {
        for rule in self.desc.rules.iter_mut().filter(|r| r.name == name) {
            rule.priority = priority;
        }
        self
    }

    pub fn seed_tile(mut self, tile: &str, position: Vector3) -> Self {
        self.desc.seed.tiles.push(SeedTile {
            tile: tile.into(),
            position,
            orientation: Default::default(),
        });
        self
    }

    pub fn seed_floating(mut self, name: &str, count: u32, position: Vector3) -> Self {
        self.desc.seed.floating.push(SeedFloating {
            name: name.into(),
            count,
            position,
            spread: 0.0,
        });
        self
    }

    pub fn description(self) -> MSystemDescription {
        self.desc
    }

    pub fn build(self) -> MSystem {
        MSystem::from_description(self.desc, 1e-6).expect("Failed to validate test model")
    }
}

#[allow(dead_code)]
pub struct WorldBuilder {
    model: ModelBuilder,
    config: AppConfig,
    seed: u64,
}

#[allow(dead_code)]
impl WorldBuilder {
    pub fn new(model: ModelBuilder) -> Self {
        Self {
            model,
            config: AppConfig::default(),
            seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_config<F>(mut self, modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        modifier(&mut self.config);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn build_world(self) -> World {
        let system = self.model.build();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        World::seeded(&system, &self.config, &mut rng).expect("Failed to seed test world")
    }

    pub fn build_simulator(self) -> Simulator {
        let system = self.model.build();
        Simulator::new(&system, &self.config, self.seed).expect("Failed to create test simulator")
    }

    pub fn build_parts(self) -> (MSystem, AppConfig, u64) {
        (self.model.build(), self.config, self.seed)
    }
}
