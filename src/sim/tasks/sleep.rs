use serde::{Deserialize, Serialize};

use super::TaskBehavior;
use crate::id::CitizenId;
use crate::model::World;
use crate::sim::context::TickContext;
use crate::sim::helpers::move_near;
use crate::sim::state_stack::{FrameMeta, TaskStep};

/// Walk home if there is one, then sleep until fully rested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sleep {
    pub asleep: bool,
}

impl TaskBehavior for Sleep {
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
        if !self.asleep {
            let bed = citizen
                .home
                .filter(|&h| map.usable_building(h).is_some_and(|b| b.is_built()))
                .and_then(|h| map.position_of(h));
            if let Some(bed) = bed {
                if !move_near(citizen, bed, config.citizen.interaction_distance) {
                    return TaskStep::Running;
                }
            }
            self.asleep = true;
            citizen.move_to = None;
            citizen.think(now, "Zzz...");
        }
        citizen.energy_per_cent += config.citizen.sleep_regen_per_tick;
        if citizen.energy_per_cent >= 1.0 {
            citizen.energy_per_cent = 1.0;
            return TaskStep::Success(None);
        }
        TaskStep::Running
    }
}
