//! Pool of unattached floating objects.
//!
//! The pool is unordered; ids exist so snapshot consumers can follow an
//! object across steps and so a step can remember who already reacted.

use crate::geometry::{Point, Vector3};
use msystem_data::{FloatingObject, Multiset};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FloatingId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct FloatingObjectInSpace {
    pub id: FloatingId,
    pub template: Arc<FloatingObject>,
    pub position: Point,
}

impl FloatingObjectInSpace {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.template.name
    }
}

/// What happened to an object since the last step boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolChange {
    Create,
    Move,
    Destroy,
}

#[derive(Debug, Clone, Default)]
pub struct FloatingPool {
    objects: BTreeMap<FloatingId, FloatingObjectInSpace>,
    next_id: u64,
    journal: BTreeMap<FloatingId, (PoolChange, FloatingObjectInSpace)>,
}

impl FloatingPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: FloatingId) -> Option<&FloatingObjectInSpace> {
        self.objects.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FloatingObjectInSpace> {
        self.objects.values()
    }

    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.objects.values().filter(|o| o.name() == name).count()
    }

    /// Object count per species.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for o in self.objects.values() {
            *counts.entry(o.name().to_string()).or_insert(0) += 1;
        }
        counts
    }

    pub fn add(&mut self, template: Arc<FloatingObject>, position: Point) -> FloatingId {
        let id = FloatingId(self.next_id);
        self.next_id += 1;
        let object = FloatingObjectInSpace {
            id,
            template,
            position,
        };
        self.journal.insert(id, (PoolChange::Create, object.clone()));
        self.objects.insert(id, object);
        id
    }

    pub fn remove(&mut self, id: FloatingId) -> Option<FloatingObjectInSpace> {
        let object = self.objects.remove(&id)?;
        match self.journal.remove(&id) {
            // Born and consumed within one step: nobody ever saw it.
            Some((PoolChange::Create, _)) => {}
            _ => {
                self.journal
                    .insert(id, (PoolChange::Destroy, object.clone()));
            }
        }
        Some(object)
    }

    fn relocate(&mut self, id: FloatingId, position: Point) {
        let Some(object) = self.objects.get_mut(&id) else {
            return;
        };
        object.position = position;
        let snapshot = object.clone();
        let entry = self
            .journal
            .entry(id)
            .or_insert((PoolChange::Move, snapshot.clone()));
        entry.1 = snapshot;
    }

    /// Number of `name` objects within `radius` of `center`.
    #[must_use]
    pub fn count_within(&self, center: Point, radius: f64, name: &str) -> usize {
        self.objects
            .values()
            .filter(|o| o.name() == name && o.position.distance(center) <= radius)
            .count()
    }

    /// Picks objects satisfying `required`, nearest first, among those within
    /// `radius` of `center` that are not `spent` and pass `accept`.
    ///
    /// Returns `None` unless every species can be fully supplied.
    pub fn select_near<F>(
        &self,
        center: Point,
        radius: f64,
        required: &Multiset,
        spent: &BTreeSet<FloatingId>,
        accept: F,
    ) -> Option<Vec<FloatingId>>
    where
        F: Fn(&FloatingObjectInSpace) -> bool,
    {
        let mut chosen = Vec::new();
        for (name, &count) in required {
            if count == 0 {
                continue;
            }
            let mut near: Vec<(f64, FloatingId)> = self
                .objects
                .values()
                .filter(|o| o.name() == name && !spent.contains(&o.id) && accept(o))
                .map(|o| (o.position.distance(center), o.id))
                .filter(|(d, _)| *d <= radius)
                .collect();
            if near.len() < count as usize {
                return None;
            }
            near.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            chosen.extend(near.into_iter().take(count as usize).map(|(_, id)| id));
        }
        Some(chosen)
    }

    /// Moves every mobile object by a uniform per-axis offset, clamped to the cube of half extent `bounds`.
    pub fn random_walk<R: Rng>(&mut self, rng: &mut R, bounds: f64) {
        let moves: Vec<(FloatingId, Point)> = self
            .objects
            .values()
            .filter(|o| o.template.mobility > 0.0)
            .map(|o| {
                let m = o.template.mobility;
                let offset = Vector3::new(
                    rng.gen_range(-m..=m),
                    rng.gen_range(-m..=m),
                    rng.gen_range(-m..=m),
                );
                (o.id, clamp_to_bounds(o.position + offset, bounds))
            })
            .collect();
        for (id, position) in moves {
            self.relocate(id, position);
        }
    }

    /// Drains the changes recorded since the previous call.
    pub fn take_changes(&mut self) -> Vec<(PoolChange, FloatingObjectInSpace)> {
        std::mem::take(&mut self.journal).into_values().collect()
    }

    /// Forgets pending changes without reporting them.
    pub fn clear_changes(&mut self) {
        self.journal.clear();
    }
}

#[must_use]
pub fn clamp_to_bounds(p: Point, bounds: f64) -> Point {
    Vector3::new(
        p.x.clamp(-bounds, bounds),
        p.y.clamp(-bounds, bounds),
        p.z.clamp(-bounds, bounds),
    )
}
