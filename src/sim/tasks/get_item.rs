//! Acquiring items by whatever means are available.

use serde::{Deserialize, Serialize};

use super::{CutLogsIntoPlanks, CutTree, GatherMushrooms, TaskBehavior};
use crate::id::{BuildingId, CitizenId};
use crate::model::{Inventory, ItemName, World, move_item_between};
use crate::sim::context::TickContext;
use crate::sim::helpers::{find_market, move_near, owned_building_with};
use crate::sim::market::MarketTradeItemWith;
use crate::sim::state_stack::{CitizenState, FrameMeta, ReturnedData, TaskStep};

/// Children pushed before `GetItem` gives up.
const MAX_ROUNDS: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "item", rename_all = "snake_case")]
pub enum Wanted {
    Item(ItemName),
    /// Any edible item.
    Food,
}

impl Wanted {
    pub fn count(&self, inventory: &Inventory) -> u32 {
        match self {
            Wanted::Item(item) => inventory.get_amount(*item),
            Wanted::Food => ItemName::food_items().map(|i| inventory.get_amount(i)).sum(),
        }
    }

    fn candidates(&self) -> Vec<ItemName> {
        match self {
            Wanted::Item(item) => vec![*item],
            Wanted::Food => ItemName::food_items().collect(),
        }
    }
}

/// Where `GetItem` looks, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GetItemStrategy {
    OwnedBuilding,
    Buy,
    Produce,
}

impl GetItemStrategy {
    fn next(self) -> Option<Self> {
        match self {
            GetItemStrategy::OwnedBuilding => Some(GetItemStrategy::Buy),
            GetItemStrategy::Buy => Some(GetItemStrategy::Produce),
            GetItemStrategy::Produce => None,
        }
    }
}

/// Hold at least `amount` of what is wanted: take it from an owned
/// building, buy it, or gather and produce it personally. A failed strategy
/// moves on to the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetItem {
    pub want: Wanted,
    pub amount: u32,
    pub strategy: GetItemStrategy,
    pub awaiting_child: bool,
    pub rounds: u32,
}

impl GetItem {
    pub fn new(want: Wanted, amount: u32) -> Self {
        Self {
            want,
            amount,
            strategy: GetItemStrategy::OwnedBuilding,
            awaiting_child: false,
            rounds: 0,
        }
    }

    fn child_for(&self, world: &World, id: CitizenId, missing: u32, now: u64) -> Option<CitizenState> {
        let citizen = world.expect_citizen(id);
        match self.strategy {
            GetItemStrategy::OwnedBuilding => self.want.candidates().into_iter().find_map(|item| {
                owned_building_with(world, id, item).map(|building| {
                    CitizenState::new(
                        TransferWithBuilding {
                            building,
                            item,
                            amount: missing,
                            direction: TransferDirection::Take,
                        },
                        now,
                    )
                })
            }),
            GetItemStrategy::Buy => self.want.candidates().into_iter().find_map(|item| {
                let market_id = find_market(world, &citizen.position, item, Some(id))?;
                let market = world.map.building(market_id)?;
                let stocked = market.inventory.get_amount(item);
                let price = market.sell_price(item, &world.config);
                let affordable = citizen.money / price.max(1);
                let amount = missing.min(affordable).min(stocked);
                (amount > 0).then(|| {
                    CitizenState::new(MarketTradeItemWith::buy(market_id, item, amount), now)
                })
            }),
            GetItemStrategy::Produce => match self.want {
                Wanted::Food | Wanted::Item(ItemName::Mushroom) => {
                    Some(CitizenState::new(GatherMushrooms::new(missing), now))
                }
                Wanted::Item(ItemName::Wood) => {
                    if citizen.inventory.get_amount(ItemName::TreeLog) > 0 {
                        Some(CitizenState::new(CutLogsIntoPlanks::default(), now))
                    } else {
                        Some(CitizenState::new(CutTree::default(), now))
                    }
                }
                Wanted::Item(ItemName::TreeLog) => Some(CitizenState::new(CutTree::default(), now)),
                Wanted::Item(ItemName::Wheat) => None,
            },
        }
    }
}

impl TaskBehavior for GetItem {
    fn tick(&mut self, ctx: &mut TickContext, id: CitizenId, meta: &mut FrameMeta) -> TaskStep {
        let now = ctx.now();
        let world = &*ctx.world;
        let have = self.want.count(&world.expect_citizen(id).inventory);
        if have >= self.amount {
            return TaskStep::Success(Some(ReturnedData::Amount { amount: have }));
        }
        if self.awaiting_child {
            self.awaiting_child = false;
            meta.take_returned();
            if meta.take_failed() {
                match self.strategy.next() {
                    Some(next) => self.strategy = next,
                    None => return TaskStep::Failed,
                }
            }
        }
        if self.rounds >= MAX_ROUNDS {
            return TaskStep::Failed;
        }

        let missing = self.amount - have;
        loop {
            if let Some(child) = self.child_for(world, id, missing, now) {
                self.awaiting_child = true;
                self.rounds += 1;
                return TaskStep::Push(child);
            }
            match self.strategy.next() {
                Some(next) => self.strategy = next,
                None => return TaskStep::Failed,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// Building to citizen.
    Take,
    /// Citizen to building.
    Store,
}

/// Walk to a building and move items between it and the citizen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferWithBuilding {
    pub building: BuildingId,
    pub item: ItemName,
    pub amount: u32,
    pub direction: TransferDirection,
}

impl TaskBehavior for TransferWithBuilding {
    fn tick(&mut self, ctx: &mut TickContext, id: CitizenId, _meta: &mut FrameMeta) -> TaskStep {
        let reach = ctx.world.config.citizen.interaction_distance;
        let World { citizens, map, .. } = &mut *ctx.world;
        let Some(position) = map
            .usable_building(self.building)
            .and_then(|_| map.position_of(self.building))
        else {
            return TaskStep::Failed;
        };
        let Some(citizen) = citizens.get_mut(&id) else {
            return TaskStep::Failed;
        };
        if !move_near(citizen, position, reach) {
            return TaskStep::Running;
        }
        let Some(building) = map.building_mut(self.building) else {
            return TaskStep::Failed;
        };
        let moved = match self.direction {
            TransferDirection::Take => move_item_between(
                self.item,
                &mut building.inventory,
                &mut citizen.inventory,
                Some(self.amount),
            ),
            TransferDirection::Store => move_item_between(
                self.item,
                &mut citizen.inventory,
                &mut building.inventory,
                Some(self.amount),
            ),
        };
        if moved == 0 {
            TaskStep::Failed
        } else {
            TaskStep::Success(Some(ReturnedData::Amount { amount: moved }))
        }
    }
}
