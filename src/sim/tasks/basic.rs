use serde::{Deserialize, Serialize};

use super::TaskBehavior;
use crate::id::CitizenId;
use crate::model::Position;
use crate::sim::context::TickContext;
use crate::sim::helpers::move_near;
use crate::sim::state_stack::{FrameMeta, TaskStep};

/// Walk until within `range` of `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveTo {
    pub target: Position,
    pub range: f64,
}

impl TaskBehavior for MoveTo {
    fn tick(&mut self, ctx: &mut TickContext, id: CitizenId, _meta: &mut FrameMeta) -> TaskStep {
        let citizen = ctx.world.expect_citizen_mut(id);
        if move_near(citizen, self.target, self.range) {
            TaskStep::Success(None)
        } else {
            TaskStep::Running
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wait {
    pub until: u64,
}

impl TaskBehavior for Wait {
    fn tick(&mut self, ctx: &mut TickContext, _id: CitizenId, _meta: &mut FrameMeta) -> TaskStep {
        if ctx.now() >= self.until {
            TaskStep::Success(None)
        } else {
            TaskStep::Running
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmoteKind {
    Wave,
    Cheer,
}

/// Stand still showing an emote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emote {
    pub kind: EmoteKind,
    pub until: u64,
}

impl TaskBehavior for Emote {
    fn tick(&mut self, ctx: &mut TickContext, id: CitizenId, _meta: &mut FrameMeta) -> TaskStep {
        let now = ctx.now();
        let citizen = ctx.world.expect_citizen_mut(id);
        citizen.move_to = None;
        if now >= self.until {
            TaskStep::Success(None)
        } else {
            TaskStep::Running
        }
    }
}
