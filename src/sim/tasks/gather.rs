use serde::{Deserialize, Serialize};

use super::TaskBehavior;
use crate::id::{CitizenId, ObjectId};
use crate::map::{TileObjectKind, Tree};
use crate::model::{ItemName, ItemUnitData};
use crate::sim::context::TickContext;
use crate::sim::helpers::{move_near, search_nearest};
use crate::sim::state_stack::{FrameMeta, ReturnedData, TaskStep};

const GATHERING: &str = "gathering";
const WOODCUTTING: &str = "woodcutting";
const SKILL_GAIN: f64 = 0.01;

/// Pick mushrooms one at a time until `amount` are gathered or the
/// inventory is full.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatherMushrooms {
    pub amount: u32,
    pub gathered: u32,
    pub target: Option<ObjectId>,
    pub progress: f64,
}

impl GatherMushrooms {
    pub fn new(amount: u32) -> Self {
        Self {
            amount,
            ..Self::default()
        }
    }

    fn finish(&self) -> TaskStep {
        if self.gathered > 0 {
            TaskStep::Success(Some(ReturnedData::Amount {
                amount: self.gathered,
            }))
        } else {
            TaskStep::Failed
        }
    }
}

impl TaskBehavior for GatherMushrooms {
    fn tick(&mut self, ctx: &mut TickContext, id: CitizenId, _meta: &mut FrameMeta) -> TaskStep {
        let now = ctx.now();
        let world = &mut *ctx.world;
        let reach = world.config.citizen.interaction_distance;
        let pick_ticks = f64::from(world.config.jobs.pick_ticks);

        let citizen = world.expect_citizen(id);
        if self.gathered >= self.amount
            || citizen.inventory.available_capacity(ItemName::Mushroom) == 0
        {
            return self.finish();
        }

        let target = self
            .target
            .and_then(|t| world.map.position_of(t).map(|p| (t, p)));
        let (target, target_pos) = match target {
            Some(found) => found,
            None => {
                self.progress = 0.0;
                let found = search_nearest(
                    &world.map,
                    &citizen.position,
                    TileObjectKind::Mushroom,
                    &world.config.citizen,
                    |_| true,
                );
                match found {
                    Some(found) => {
                        self.target = Some(found.0);
                        found
                    }
                    None => {
                        world
                            .expect_citizen_mut(id)
                            .think(now, "I can't find any mushrooms.");
                        return self.finish();
                    }
                }
            }
        };

        let citizen = world.expect_citizen_mut(id);
        if !move_near(citizen, target_pos, reach) {
            return TaskStep::Running;
        }
        self.progress += citizen.work_speed(GATHERING);
        if self.progress < pick_ticks {
            return TaskStep::Running;
        }

        world.map.delete_object(target);
        let citizen = world.expect_citizen_mut(id);
        let put = citizen.inventory.put_item_into(
            ItemName::Mushroom,
            1,
            vec![ItemUnitData { produced_at: now }],
        );
        citizen.train_skill(GATHERING, SKILL_GAIN);
        self.gathered += put;
        self.target = None;
        self.progress = 0.0;
        TaskStep::Running
    }
}

/// Fell the nearest grown tree for one log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CutTree {
    pub target: Option<ObjectId>,
    pub progress: f64,
}

impl TaskBehavior for CutTree {
    fn tick(&mut self, ctx: &mut TickContext, id: CitizenId, _meta: &mut FrameMeta) -> TaskStep {
        let now = ctx.now();
        let world = &mut *ctx.world;
        let reach = world.config.citizen.interaction_distance;
        let cut_ticks = f64::from(world.config.jobs.cut_tree_ticks);

        let citizen = world.expect_citizen(id);
        if citizen.inventory.available_capacity(ItemName::TreeLog) == 0 {
            world
                .expect_citizen_mut(id)
                .think(now, "No room to carry a log.");
            return TaskStep::Failed;
        }

        let standing = self.target.and_then(|t| {
            world
                .map
                .object(t)
                .filter(|o| o.as_tree().is_some_and(Tree::is_grown))
                .map(|o| (t, o.position))
        });
        let (target, target_pos) = match standing {
            Some(found) => found,
            None => {
                self.progress = 0.0;
                let found = search_nearest(
                    &world.map,
                    &citizen.position,
                    TileObjectKind::Tree,
                    &world.config.citizen,
                    |o| o.as_tree().is_some_and(Tree::is_grown),
                );
                match found {
                    Some(found) => {
                        self.target = Some(found.0);
                        found
                    }
                    None => {
                        world
                            .expect_citizen_mut(id)
                            .think(now, "There are no trees to cut.");
                        return TaskStep::Failed;
                    }
                }
            }
        };

        let citizen = world.expect_citizen_mut(id);
        if !move_near(citizen, target_pos, reach) {
            return TaskStep::Running;
        }
        self.progress += citizen.work_speed(WOODCUTTING);
        if self.progress < cut_ticks {
            return TaskStep::Running;
        }

        world.map.delete_object(target);
        let citizen = world.expect_citizen_mut(id);
        let put = citizen.inventory.put_item_into(
            ItemName::TreeLog,
            1,
            vec![ItemUnitData { produced_at: now }],
        );
        citizen.train_skill(WOODCUTTING, SKILL_GAIN);
        TaskStep::Success(Some(ReturnedData::Amount { amount: put }))
    }
}

/// Saw one log into planks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CutLogsIntoPlanks {
    pub progress: f64,
}

impl TaskBehavior for CutLogsIntoPlanks {
    fn tick(&mut self, ctx: &mut TickContext, id: CitizenId, _meta: &mut FrameMeta) -> TaskStep {
        let now = ctx.now();
        let planks_ticks = f64::from(ctx.world.config.jobs.planks_ticks);
        let wood_per_log = ctx.world.config.jobs.wood_per_log;
        let citizen = ctx.world.expect_citizen_mut(id);
        citizen.move_to = None;

        if citizen.inventory.get_amount(ItemName::TreeLog) == 0 {
            return TaskStep::Failed;
        }
        // Sawing frees the log's slot, so one slot is enough.
        if citizen.inventory.available_capacity(ItemName::Wood) == 0
            && citizen.inventory.get_amount(ItemName::TreeLog) > 1
        {
            citizen.think(now, "No room for planks.");
            return TaskStep::Failed;
        }

        self.progress += citizen.work_speed(WOODCUTTING);
        if self.progress < planks_ticks {
            return TaskStep::Running;
        }
        citizen.inventory.remove_item(ItemName::TreeLog, 1);
        let data = vec![ItemUnitData { produced_at: now }; wood_per_log as usize];
        let put = citizen
            .inventory
            .put_item_into(ItemName::Wood, wood_per_log as i32, data);
        citizen.train_skill(WOODCUTTING, SKILL_GAIN);
        TaskStep::Success(Some(ReturnedData::Amount { amount: put }))
    }
}
