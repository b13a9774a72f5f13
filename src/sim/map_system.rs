use super::context::TickContext;
use super::signal::SignalKind;
use super::system::SimSystem;
use crate::id::ObjectId;
use crate::map::{TileObjectData, TileObjectKind, Tree};

/// Runs the map's deferred updates (tree growth, crop growth, building
/// deterioration) and keeps trees and mushrooms stocked.
#[derive(Debug, Default)]
pub struct MapSystem {
    next_mushroom_spawn: u64,
}

impl MapSystem {
    pub fn new() -> Self {
        Self::default()
    }
}

/// What a deferred update did to its object.
enum Deferred {
    Reschedule(u64),
    Remove,
    Done,
}

impl SimSystem for MapSystem {
    fn name(&self) -> &str {
        "map"
    }

    fn tick(&mut self, ctx: &mut TickContext) {
        let now = ctx.now();
        let due = ctx.world.map.drain_due(now);
        let mut removed: Vec<ObjectId> = Vec::new();

        for id in due {
            let cfg = &ctx.world.config.map;
            let Some(object) = ctx.world.map.object_mut(id) else {
                continue;
            };
            let outcome = match &mut object.data {
                TileObjectData::Tree(tree) => {
                    tree.growth = (tree.growth + cfg.tree_growth_step).min(1.0);
                    if tree.is_grown() {
                        Deferred::Done
                    } else {
                        Deferred::Reschedule(cfg.tree_growth_interval_ms)
                    }
                }
                TileObjectData::FarmTile(field) => match field.crop {
                    Some(growth) if growth < 1.0 => {
                        let growth = (growth + cfg.crop_growth_step).min(1.0);
                        field.crop = Some(growth);
                        if growth < 1.0 {
                            Deferred::Reschedule(cfg.crop_growth_interval_ms)
                        } else {
                            Deferred::Done
                        }
                    }
                    _ => Deferred::Done,
                },
                TileObjectData::Building(building) => {
                    building.deterioration += cfg.deterioration_step;
                    if building.deterioration >= 1.0 {
                        Deferred::Remove
                    } else {
                        Deferred::Reschedule(cfg.deterioration_interval_ms)
                    }
                }
                TileObjectData::Mushroom => Deferred::Done,
            };
            match outcome {
                Deferred::Reschedule(after) => ctx.world.map.schedule(id, now + after),
                Deferred::Remove => removed.push(id),
                Deferred::Done => {}
            }
        }

        for building in removed {
            if let Some(object) = ctx.world.map.delete_object(building) {
                let kind = object.as_building().map(|b| b.kind);
                tracing::info!(%building, ?kind, "building fell apart");
            }
            ctx.emit(SignalKind::BuildingRemoved { building });
        }

        self.upkeep(ctx);
    }
}

impl MapSystem {
    /// Plant a sapling while trees are below the minimum and regrow one
    /// mushroom per spawn interval.
    fn upkeep(&mut self, ctx: &mut TickContext) {
        let now = ctx.now();
        let cfg = ctx.world.config.map.clone();
        let map = &mut ctx.world.map;

        if map.count(TileObjectKind::Tree) < cfg.min_trees {
            if let Some(pos) = map.random_free_position(&mut *ctx.rng) {
                if let Some(sapling) = map.add_object_at(TileObjectData::Tree(Tree { growth: 0.0 }), &pos) {
                    map.schedule(sapling, now + cfg.tree_growth_interval_ms);
                    tracing::trace!(tree = %sapling, "sapling planted");
                }
            }
        }

        if now >= self.next_mushroom_spawn {
            self.next_mushroom_spawn = now + cfg.mushroom_spawn_interval_ms;
            if map.count(TileObjectKind::Mushroom) < cfg.max_mushrooms {
                if let Some(pos) = map.random_free_position(&mut *ctx.rng) {
                    map.add_object_at(TileObjectData::Mushroom, &pos);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::id::CitizenId;
    use crate::map::FarmTile;
    use crate::model::{Building, BuildingKind, Position, World};
    use crate::testutil::tick_system;

    fn bare_world() -> World {
        let mut config = SimConfig::default();
        config.map.min_trees = 0;
        config.map.max_mushrooms = 0;
        World::new(config)
    }

    #[test]
    fn sapling_grows_until_cuttable() {
        let mut world = bare_world();
        let tree = world
            .map
            .add_object_at(TileObjectData::Tree(Tree { growth: 0.0 }), &Position::new(50.0, 50.0))
            .unwrap();
        world.map.schedule(tree, 0);
        let mut system = MapSystem::new();
        let step = world.config.map.tree_growth_interval_ms;
        let mut guard = 0;
        while !world.map.object(tree).unwrap().as_tree().unwrap().is_grown() {
            tick_system(&mut world, &mut system, 1);
            world.time += step;
            guard += 1;
            assert!(guard < 1_000, "tree never finished growing");
        }
        assert!(world.map.tick_queue().iter().all(|e| e.object != tree));
    }

    #[test]
    fn crop_ripens() {
        let mut world = bare_world();
        let field = world
            .map
            .add_object_at(
                TileObjectData::FarmTile(FarmTile { owner: CitizenId(1), crop: Some(0.0) }),
                &Position::new(50.0, 50.0),
            )
            .unwrap();
        world.map.schedule(field, 0);
        let mut system = MapSystem::new();
        let step = world.config.map.crop_growth_interval_ms;
        for _ in 0..1_000 {
            tick_system(&mut world, &mut system, 1);
            world.time += step;
        }
        assert!(world.map.object(field).unwrap().as_farm_tile().unwrap().is_ripe());
    }

    #[test]
    fn rotten_building_is_removed_with_signal() {
        let mut world = bare_world();
        let mut house = Building::new_construction(BuildingKind::House, CitizenId(1), &world.config);
        house.build_progress = None;
        house.deterioration = 0.999;
        let id = world
            .map
            .add_object_at(TileObjectData::Building(house), &Position::new(50.0, 50.0))
            .unwrap();
        world.map.schedule(id, 0);
        let signals = tick_system(&mut world, &mut MapSystem::new(), 1);
        assert!(!world.map.contains(id));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalKind::BuildingRemoved { building: id });
    }

    #[test]
    fn upkeep_restores_minimum_trees() {
        let mut world = bare_world();
        world.config.map.min_trees = 3;
        let mut system = MapSystem::new();
        for seed in 0..3 {
            tick_system(&mut world, &mut system, seed);
        }
        assert_eq!(world.map.count(TileObjectKind::Tree), 3);
        assert!(world.map.trees().all(|t| !t.as_tree().unwrap().is_grown()));
    }
}
