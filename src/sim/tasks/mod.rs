//! Every frame kind a citizen's stack can hold, and the dispatch that ticks
//! the top one.

mod basic;
mod construction;
mod farming;
mod gather;
mod get_item;
mod sleep;

use serde::{Deserialize, Serialize};

pub use basic::{Emote, EmoteKind, MoveTo, Wait};
pub use construction::{BuildBuilding, ClaimHome, RepairBuilding};
pub use farming::{PlaceFarmTile, TendFarmTile};
pub use gather::{CutLogsIntoPlanks, CutTree, GatherMushrooms};
pub use get_item::{GetItem, GetItemStrategy, TransferDirection, TransferWithBuilding, Wanted};
pub use sleep::Sleep;

use super::chat::ChatWith;
use super::context::TickContext;
use super::market::{
    EnterMarketQueue, MarketPutItemOnCounter, MarketServe, MarketTradeInteraction,
    MarketTradeItemWith,
};
use super::state_stack::{CitizenState, FrameMeta, TaskStep, Tool, apply_step};
use crate::id::CitizenId;

/// Behaviour of one frame kind.
pub trait TaskBehavior {
    /// Advance the frame by one tick. `meta` carries the outcome of the
    /// child this frame pushed, if it just finished.
    fn tick(&mut self, ctx: &mut TickContext, id: CitizenId, meta: &mut FrameMeta) -> TaskStep;
}

macro_rules! tasks {
    ($($variant:ident => $name:expr, $tool:expr;)+) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "task", rename_all = "snake_case")]
        pub enum Task {
            $($variant($variant),)+
        }

        impl Task {
            pub fn name(&self) -> &'static str {
                match self {
                    $(Task::$variant(_) => $name,)+
                }
            }

            /// Tool shown while this frame is on top.
            pub fn tool(&self) -> Option<Tool> {
                match self {
                    $(Task::$variant(_) => $tool,)+
                }
            }

            fn behavior(&mut self) -> &mut dyn TaskBehavior {
                match self {
                    $(Task::$variant(t) => t as &mut dyn TaskBehavior,)+
                }
            }
        }

        $(
            impl From<$variant> for Task {
                fn from(t: $variant) -> Self {
                    Task::$variant(t)
                }
            }
        )+
    };
}

tasks! {
    MoveTo => "move_to", None;
    Wait => "wait", None;
    Emote => "emote", None;
    GatherMushrooms => "gather_mushrooms", Some(Tool::Basket);
    CutTree => "cut_tree", Some(Tool::Axe);
    CutLogsIntoPlanks => "cut_logs_into_planks", Some(Tool::Axe);
    GetItem => "get_item", None;
    TransferWithBuilding => "transfer_with_building", None;
    BuildBuilding => "build_building", Some(Tool::Hammer);
    RepairBuilding => "repair_building", Some(Tool::Hammer);
    ClaimHome => "claim_home", None;
    Sleep => "sleep", None;
    PlaceFarmTile => "place_farm_tile", Some(Tool::Hoe);
    TendFarmTile => "tend_farm_tile", Some(Tool::Hoe);
    MarketTradeItemWith => "market_trade_item_with", None;
    EnterMarketQueue => "enter_market_queue", None;
    MarketTradeInteraction => "market_trade_interaction", None;
    MarketPutItemOnCounter => "market_put_item_on_counter", None;
    MarketServe => "market_serve", None;
    ChatWith => "chat_with", None;
}

/// Tick one frame without touching the stack.
pub(crate) fn tick_frame(ctx: &mut TickContext, id: CitizenId, frame: &mut CitizenState) -> TaskStep {
    let CitizenState { task, meta, .. } = frame;
    task.behavior().tick(ctx, id, meta)
}

/// Tick the top frame of `id`'s stack and apply its step.
///
/// The frame is taken off the stack while it runs, so a finishing frame's
/// outcome lands on the frame below it.
pub fn tick_top_frame(ctx: &mut TickContext, id: CitizenId) {
    let Some(mut frame) = ctx
        .world
        .citizen_mut(id)
        .and_then(|c| c.state_info.stack.pop())
    else {
        return;
    };
    let step = tick_frame(ctx, id, &mut frame);
    if let Some(citizen) = ctx.world.citizen_mut(id) {
        apply_step(citizen, frame, step);
    }
}
