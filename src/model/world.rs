use std::collections::BTreeMap;

use rand::RngCore;

use super::citizen::Citizen;
use crate::config::SimConfig;
use crate::id::{CitizenId, IdGenerator};
use crate::map::{Map, TileObjectData, TileObjectKind, Tree};

#[derive(Debug, Clone)]
pub struct World {
    /// Milliseconds since the simulation started.
    pub time: u64,
    pub citizens: BTreeMap<CitizenId, Citizen>,
    pub map: Map,
    pub id_gen: IdGenerator,
    pub config: SimConfig,
}

impl World {
    pub fn new(config: SimConfig) -> Self {
        Self {
            time: 0,
            citizens: BTreeMap::new(),
            map: Map::new(&config.map),
            id_gen: IdGenerator::new(),
            config,
        }
    }

    pub fn citizen(&self, id: CitizenId) -> Option<&Citizen> {
        self.citizens.get(&id)
    }

    pub fn citizen_mut(&mut self, id: CitizenId) -> Option<&mut Citizen> {
        self.citizens.get_mut(&id)
    }

    /// Like `citizen`, for ids the caller knows are present.
    ///
    /// # Panics
    /// Panics if the citizen does not exist.
    pub fn expect_citizen(&self, id: CitizenId) -> &Citizen {
        self.citizens
            .get(&id)
            .unwrap_or_else(|| panic!("expect_citizen: {id} not found"))
    }

    /// # Panics
    /// Panics if the citizen does not exist.
    pub fn expect_citizen_mut(&mut self, id: CitizenId) -> &mut Citizen {
        self.citizens
            .get_mut(&id)
            .unwrap_or_else(|| panic!("expect_citizen_mut: {id} not found"))
    }

    /// Case-insensitive name lookup.
    pub fn citizen_by_name(&self, name: &str) -> Option<&Citizen> {
        self.citizens
            .values()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn is_alive(&self, id: CitizenId) -> bool {
        self.citizens.get(&id).is_some_and(Citizen::is_alive)
    }

    pub fn living_citizens(&self) -> impl Iterator<Item = &Citizen> {
        self.citizens.values().filter(|c| c.is_alive())
    }

    pub fn citizen_ids(&self) -> Vec<CitizenId> {
        self.citizens.keys().copied().collect()
    }

    /// Seed the map with grown trees and mushrooms up to the configured levels.
    pub fn populate(&mut self, rng: &mut dyn RngCore) {
        let min_trees = self.config.map.min_trees;
        let max_mushrooms = self.config.map.max_mushrooms;
        while self.map.count(TileObjectKind::Tree) < min_trees {
            let Some(pos) = self.map.random_free_position(rng) else {
                break;
            };
            self.map
                .add_object_at(TileObjectData::Tree(Tree { growth: 1.0 }), &pos);
        }
        while self.map.count(TileObjectKind::Mushroom) < max_mushrooms {
            let Some(pos) = self.map.random_free_position(rng) else {
                break;
            };
            self.map.add_object_at(TileObjectData::Mushroom, &pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn populate_fills_to_configured_levels() {
        let mut world = World::new(SimConfig::default());
        let mut rng = SmallRng::seed_from_u64(7);
        world.populate(&mut rng);
        assert_eq!(world.map.count(TileObjectKind::Tree), world.config.map.min_trees);
        assert_eq!(
            world.map.count(TileObjectKind::Mushroom),
            world.config.map.max_mushrooms
        );
        assert!(world.map.trees().all(|t| t.as_tree().is_some_and(Tree::is_grown)));
    }

    #[test]
    #[should_panic(expected = "not found")]
    fn expect_citizen_panics_on_missing_id() {
        let world = World::new(SimConfig::default());
        world.expect_citizen(CitizenId(9));
    }
}
