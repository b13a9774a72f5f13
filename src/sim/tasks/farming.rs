use serde::{Deserialize, Serialize};

use super::TaskBehavior;
use crate::id::{CitizenId, ObjectId};
use crate::map::{FarmTile, TileObjectData};
use crate::model::{ItemName, ItemUnitData, World};
use crate::sim::context::TickContext;
use crate::sim::helpers::move_near;
use crate::sim::state_stack::{FrameMeta, ReturnedData, TaskStep};

const FARMING: &str = "farming";
const SKILL_GAIN: f64 = 0.01;

/// Hoe a new farm tile near home.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceFarmTile {
    pub tile: Option<ObjectId>,
    pub progress: f64,
}

impl TaskBehavior for PlaceFarmTile {
    fn tick(&mut self, ctx: &mut TickContext, id: CitizenId, _meta: &mut FrameMeta) -> TaskStep {
        let now = ctx.now();
        let World {
            citizens,
            map,
            config,
            ..
        } = &mut *ctx.world;
        let Some(citizen) = citizens.get_mut(&id) else {
            return TaskStep::Failed;
        };
        let tile = match self.tile {
            Some(tile) => tile,
            None => {
                let center = citizen
                    .home
                    .and_then(|h| map.position_of(h))
                    .unwrap_or(citizen.position);
                let placed = map.add_object(
                    TileObjectData::FarmTile(FarmTile {
                        owner: id,
                        crop: None,
                    }),
                    &center,
                    config.citizen.search_radius,
                    &mut *ctx.rng,
                );
                let Some(tile) = placed else {
                    citizen.think(now, "No free land for a field.");
                    return TaskStep::Failed;
                };
                self.tile = Some(tile);
                tile
            }
        };
        let Some(position) = map.position_of(tile) else {
            return TaskStep::Failed;
        };
        if !move_near(citizen, position, config.citizen.interaction_distance) {
            return TaskStep::Running;
        }
        self.progress += citizen.work_speed(FARMING);
        if self.progress < f64::from(config.jobs.farm_work_ticks) {
            return TaskStep::Running;
        }
        citizen.train_skill(FARMING, SKILL_GAIN);
        TaskStep::Success(None)
    }
}

/// Plant an empty farm tile or harvest a ripe one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TendFarmTile {
    pub tile: ObjectId,
    pub progress: f64,
}

impl TendFarmTile {
    pub fn new(tile: ObjectId) -> Self {
        Self { tile, progress: 0.0 }
    }
}

impl TaskBehavior for TendFarmTile {
    fn tick(&mut self, ctx: &mut TickContext, id: CitizenId, _meta: &mut FrameMeta) -> TaskStep {
        let now = ctx.now();
        let World {
            citizens,
            map,
            config,
            ..
        } = &mut *ctx.world;
        let Some(citizen) = citizens.get_mut(&id) else {
            return TaskStep::Failed;
        };
        let Some(object) = map.object(self.tile) else {
            return TaskStep::Failed;
        };
        let Some(field) = object.as_farm_tile().filter(|f| f.owner == id) else {
            return TaskStep::Failed;
        };
        let needs_work = field.crop.is_none() || field.is_ripe();
        if !needs_work {
            return TaskStep::Failed;
        }
        let position = object.position;
        if !move_near(citizen, position, config.citizen.interaction_distance) {
            return TaskStep::Running;
        }
        self.progress += citizen.work_speed(FARMING);
        if self.progress < f64::from(config.jobs.farm_work_ticks) {
            return TaskStep::Running;
        }

        let Some(field) = map
            .object_mut(self.tile)
            .and_then(|o| o.as_farm_tile_mut())
        else {
            return TaskStep::Failed;
        };
        citizen.train_skill(FARMING, SKILL_GAIN);
        if field.crop.is_none() {
            field.crop = Some(0.0);
            map.schedule(self.tile, now + config.map.crop_growth_interval_ms);
            return TaskStep::Success(None);
        }
        field.crop = None;
        let yield_amount = config.jobs.wheat_per_harvest;
        let data = vec![ItemUnitData { produced_at: now }; yield_amount as usize];
        let put = citizen
            .inventory
            .put_item_into(ItemName::Wheat, yield_amount as i32, data);
        TaskStep::Success(Some(ReturnedData::Amount { amount: put }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Position;
    use crate::sim::state_stack::CitizenState;
    use crate::testutil::TestWorld;

    #[test]
    fn plant_then_harvest() {
        let mut tw = TestWorld::new();
        let id = tw.citizen("Ada", Position::new(100.0, 100.0));
        let mut place = CitizenState::new(PlaceFarmTile::default(), 0);
        assert_eq!(tw.run_frame(id, &mut place, 500), TaskStep::Success(None));
        let field = tw.world.map.objects_of_kind(crate::map::TileObjectKind::FarmTile).next().unwrap().id;

        let mut plant = CitizenState::new(TendFarmTile::new(field), 0);
        assert_eq!(tw.run_frame(id, &mut plant, 500), TaskStep::Success(None));
        let crop = tw.world.map.object(field).unwrap().as_farm_tile().unwrap().crop;
        assert_eq!(crop, Some(0.0));

        let mut growing = CitizenState::new(TendFarmTile::new(field), 0);
        assert_eq!(tw.tick_frame(id, &mut growing), TaskStep::Failed);

        tw.world
            .map
            .object_mut(field)
            .unwrap()
            .as_farm_tile_mut()
            .unwrap()
            .crop = Some(1.0);
        let mut harvest = CitizenState::new(TendFarmTile::new(field), 0);
        let wheat = tw.world.config.jobs.wheat_per_harvest;
        assert_eq!(
            tw.run_frame(id, &mut harvest, 500),
            TaskStep::Success(Some(ReturnedData::Amount { amount: wheat }))
        );
        assert_eq!(tw.world.expect_citizen(id).inventory.get_amount(ItemName::Wheat), wheat);
    }

    #[test]
    fn someone_elses_field_is_not_tended() {
        let mut tw = TestWorld::new();
        let id = tw.citizen("Ada", Position::new(100.0, 100.0));
        let other = tw.citizen("Bo", Position::new(100.0, 100.0));
        let field = tw
            .world
            .map
            .add_object_at(
                TileObjectData::FarmTile(FarmTile { owner: other, crop: None }),
                &Position::new(100.0, 100.0),
            )
            .unwrap();
        let mut frame = CitizenState::new(TendFarmTile::new(field), 0);
        assert_eq!(tw.tick_frame(id, &mut frame), TaskStep::Failed);
    }
}
