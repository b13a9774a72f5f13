use serde::{Deserialize, Serialize};

use super::{GetItem, TaskBehavior, Wanted};
use crate::id::{BuildingId, CitizenId};
use crate::map::TileObjectData;
use crate::model::{Building, BuildingKind, ItemName, World, move_item_between};
use crate::sim::context::TickContext;
use crate::sim::helpers::move_near;
use crate::sim::signal::SignalKind;
use crate::sim::state_stack::{CitizenState, FrameMeta, ReturnedData, TaskStep};

const BUILDING: &str = "building";
const SKILL_GAIN: f64 = 0.02;

/// Raise a building of `kind`, placing a new site when `site` is `None`.
/// Wood is delivered to the site before work starts and consumed on completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildBuilding {
    pub kind: BuildingKind,
    pub site: Option<BuildingId>,
    pub awaiting_materials: bool,
}

impl BuildBuilding {
    pub fn new(kind: BuildingKind) -> Self {
        Self {
            kind,
            site: None,
            awaiting_materials: false,
        }
    }

    pub fn resume(kind: BuildingKind, site: BuildingId) -> Self {
        Self {
            kind,
            site: Some(site),
            awaiting_materials: false,
        }
    }
}

impl TaskBehavior for BuildBuilding {
    fn tick(&mut self, ctx: &mut TickContext, id: CitizenId, meta: &mut FrameMeta) -> TaskStep {
        let now = ctx.now();
        if self.awaiting_materials {
            self.awaiting_materials = false;
            meta.take_returned();
            if meta.take_failed() {
                return TaskStep::Failed;
            }
        }

        let World {
            citizens,
            map,
            config,
            ..
        } = &mut *ctx.world;
        let reach = config.citizen.interaction_distance;
        let cost = self.kind.wood_cost(config);
        let Some(citizen) = citizens.get_mut(&id) else {
            return TaskStep::Failed;
        };

        let site = match self.site {
            Some(site) => site,
            None => {
                let center = citizen
                    .home
                    .and_then(|h| map.position_of(h))
                    .unwrap_or(citizen.position);
                let building = Building::new_construction(self.kind, id, config);
                let placed = map.add_object(
                    TileObjectData::Building(building),
                    &center,
                    config.citizen.search_radius,
                    &mut *ctx.rng,
                );
                let Some(site) = placed else {
                    citizen.think(now, "There is no room to build here.");
                    return TaskStep::Failed;
                };
                citizen.think(now, format!("I'm building a {}.", self.kind));
                self.site = Some(site);
                site
            }
        };

        let Some(position) = map.usable_building(site).and_then(|_| map.position_of(site)) else {
            return TaskStep::Failed;
        };
        if !move_near(citizen, position, reach) {
            return TaskStep::Running;
        }
        let Some(building) = map.building_mut(site) else {
            return TaskStep::Failed;
        };
        let Some(progress) = building.build_progress else {
            return TaskStep::Success(Some(ReturnedData::Building { building: site }));
        };

        let on_site = building.inventory.get_amount(ItemName::Wood);
        if on_site < cost {
            move_item_between(
                ItemName::Wood,
                &mut citizen.inventory,
                &mut building.inventory,
                Some(cost - on_site),
            );
            let on_site = building.inventory.get_amount(ItemName::Wood);
            if on_site < cost {
                self.awaiting_materials = true;
                let missing = cost - on_site;
                return TaskStep::Push(CitizenState::new(
                    GetItem::new(Wanted::Item(ItemName::Wood), missing),
                    now,
                ));
            }
        }

        let progress = progress + config.jobs.build_progress_per_tick * citizen.work_speed(BUILDING);
        if progress < 1.0 {
            building.build_progress = Some(progress);
            return TaskStep::Running;
        }

        let used = building.inventory.remove_item(ItemName::Wood, cost);
        assert_eq!(
            used, cost,
            "BuildBuilding: site {site} lost its materials before completion"
        );
        building.build_progress = None;
        citizen.train_skill(BUILDING, SKILL_GAIN);
        citizen.think(now, format!("The {} is finished.", self.kind));
        tracing::info!(citizen = %citizen.name, building = %site, kind = %self.kind, "building completed");
        map.schedule(site, now + config.map.deterioration_interval_ms);
        ctx.emit(SignalKind::BuildingCompleted { building: site });
        TaskStep::Success(Some(ReturnedData::Building { building: site }))
    }
}

/// Spend wood to undo deterioration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairBuilding {
    pub building: BuildingId,
    pub progress: f64,
    pub awaiting_wood: bool,
}

impl RepairBuilding {
    pub fn new(building: BuildingId) -> Self {
        Self {
            building,
            progress: 0.0,
            awaiting_wood: false,
        }
    }
}

impl TaskBehavior for RepairBuilding {
    fn tick(&mut self, ctx: &mut TickContext, id: CitizenId, meta: &mut FrameMeta) -> TaskStep {
        let now = ctx.now();
        if self.awaiting_wood {
            self.awaiting_wood = false;
            meta.take_returned();
            if meta.take_failed() {
                return TaskStep::Failed;
            }
        }
        let World {
            citizens,
            map,
            config,
            ..
        } = &mut *ctx.world;
        let Some(citizen) = citizens.get_mut(&id) else {
            return TaskStep::Failed;
        };
        let Some(position) = map
            .usable_building(self.building)
            .filter(|b| b.is_built())
            .and_then(|_| map.position_of(self.building))
        else {
            return TaskStep::Failed;
        };
        if map
            .building(self.building)
            .is_some_and(|b| b.deterioration <= 0.0)
        {
            return TaskStep::Success(None);
        }
        if citizen.inventory.get_amount(ItemName::Wood) == 0 {
            self.awaiting_wood = true;
            return TaskStep::Push(CitizenState::new(
                GetItem::new(Wanted::Item(ItemName::Wood), 1),
                now,
            ));
        }
        if !move_near(citizen, position, config.citizen.interaction_distance) {
            return TaskStep::Running;
        }
        self.progress += citizen.work_speed(BUILDING);
        if self.progress < f64::from(config.jobs.repair_ticks) {
            return TaskStep::Running;
        }
        let Some(building) = map.building_mut(self.building) else {
            return TaskStep::Failed;
        };
        citizen.inventory.remove_item(ItemName::Wood, 1);
        building.deterioration = (building.deterioration - config.jobs.repair_per_wood).max(0.0);
        citizen.train_skill(BUILDING, SKILL_GAIN);
        TaskStep::Success(None)
    }
}

/// Get a home: finish an own house, move into an abandoned one, or build one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimHome {
    pub target: Option<BuildingId>,
    pub awaiting_child: bool,
}

impl ClaimHome {
    fn next_step(world: &World, id: CitizenId, now: u64) -> Result<BuildingId, CitizenState> {
        let citizen = world.expect_citizen(id);
        let cost = BuildingKind::House.wood_cost(&world.config);

        let own_site = world
            .map
            .buildings()
            .find(|(_, b)| {
                b.kind == BuildingKind::House && b.owner == id && !b.is_built() && b.is_usable()
            })
            .map(|(o, _)| o.id);
        if let Some(site) = own_site {
            return Err(CitizenState::new(BuildBuilding::resume(BuildingKind::House, site), now));
        }

        let repair_threshold = world.config.needs.home_repair_threshold;
        let abandoned = world.map.find_nearest(
            &citizen.position,
            crate::map::TileObjectKind::Building,
            world.config.citizen.max_search_radius,
            |o| {
                o.as_building().is_some_and(|b| {
                    b.kind == BuildingKind::House
                        && b.is_built()
                        && b.deterioration < repair_threshold
                        && b.inhabited_by.is_none()
                        && (b.owner == id || !world.is_alive(b.owner))
                })
            },
        );
        if let Some(house) = abandoned {
            return Ok(house.id);
        }

        if citizen.inventory.get_amount(ItemName::Wood) >= cost {
            Err(CitizenState::new(BuildBuilding::new(BuildingKind::House), now))
        } else {
            Err(CitizenState::new(
                GetItem::new(Wanted::Item(ItemName::Wood), cost),
                now,
            ))
        }
    }
}

impl TaskBehavior for ClaimHome {
    fn tick(&mut self, ctx: &mut TickContext, id: CitizenId, meta: &mut FrameMeta) -> TaskStep {
        let now = ctx.now();
        if self.awaiting_child {
            self.awaiting_child = false;
            let returned = meta.take_returned();
            if meta.take_failed() {
                return TaskStep::Failed;
            }
            if let Some(ReturnedData::Building { building }) = returned {
                self.target = Some(building);
            }
        }

        let target = match self.target {
            Some(target) => target,
            None => match Self::next_step(ctx.world, id, now) {
                Ok(house) => {
                    self.target = Some(house);
                    house
                }
                Err(child) => {
                    self.awaiting_child = true;
                    return TaskStep::Push(child);
                }
            },
        };

        let World {
            citizens,
            map,
            config,
            ..
        } = &mut *ctx.world;
        let claimable = map.usable_building(target).is_some_and(|b| {
            b.is_built() && b.inhabited_by.is_none_or(|c| c == id)
        });
        let position = map.position_of(target);
        let (true, Some(position)) = (claimable, position) else {
            self.target = None;
            return TaskStep::Running;
        };
        let Some(citizen) = citizens.get_mut(&id) else {
            return TaskStep::Failed;
        };
        if !move_near(citizen, position, config.citizen.interaction_distance) {
            return TaskStep::Running;
        }

        if let Some(old) = citizen.home.filter(|&h| h != target) {
            if let Some(old_home) = map.building_mut(old) {
                old_home.inhabited_by = None;
            }
        }
        let Some(house) = map.building_mut(target) else {
            return TaskStep::Failed;
        };
        house.inhabited_by = Some(id);
        house.owner = id;
        citizen.home = Some(target);
        citizen.think(now, "This is my home now.");
        tracing::info!(citizen = %citizen.name, home = %target, "home claimed");
        TaskStep::Success(Some(ReturnedData::Building { building: target }))
    }
}
