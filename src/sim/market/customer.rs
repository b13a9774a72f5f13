use serde::{Deserialize, Serialize};

use super::{
    TradeAgreement, join_queue, leave_queue, market_get_queue_position, open_market,
    queue_len, queue_slot_position,
};
use crate::id::{BuildingId, CitizenId};
use crate::model::{
    Intention, ItemName, MarketTradeIntention, MarketTradeStep, World, move_item_between,
};
use crate::sim::chat::{read_reply, say};
use crate::sim::context::TickContext;
use crate::sim::helpers::move_near;
use crate::sim::state_stack::{CitizenState, FrameMeta, FrameTag, ReturnedData, TaskStep};
use crate::sim::tasks::TaskBehavior;

/// How close to a queue slot counts as standing on it.
const SLOT_TOLERANCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradePhase {
    Start,
    Queue,
    Negotiate,
    Exchange,
}

/// Buy from or sell to a market: queue, negotiate, then use the counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTradeItemWith {
    pub market: BuildingId,
    pub item: ItemName,
    pub amount: u32,
    pub sell_to_market: bool,
    pub phase: TradePhase,
}

impl MarketTradeItemWith {
    pub fn buy(market: BuildingId, item: ItemName, amount: u32) -> Self {
        Self {
            market,
            item,
            amount,
            sell_to_market: false,
            phase: TradePhase::Start,
        }
    }

    pub fn sell(market: BuildingId, item: ItemName, amount: u32) -> Self {
        Self {
            sell_to_market: true,
            ..Self::buy(market, item, amount)
        }
    }

    /// A trade frame tagged so chat todos leave it alone.
    pub fn into_state(self, now: u64) -> CitizenState {
        CitizenState::new(self, now).tagged(FrameTag::Trade)
    }

    fn abandon(&self, world: &mut World, id: CitizenId) -> TaskStep {
        leave_queue(&mut world.map, self.market, id);
        TaskStep::Failed
    }
}

impl TaskBehavior for MarketTradeItemWith {
    fn tick(&mut self, ctx: &mut TickContext, id: CitizenId, meta: &mut FrameMeta) -> TaskStep {
        let now = ctx.now();
        let world = &mut *ctx.world;
        let returned = meta.take_returned();
        let child_failed = meta.take_failed();

        if open_market(world, self.market).is_none() {
            world
                .expect_citizen_mut(id)
                .think(now, "The market is closed.");
            tracing::warn!(citizen = %id, market = %self.market, "market vanished mid-trade");
            return self.abandon(world, id);
        }
        if self.phase != TradePhase::Start && child_failed {
            return self.abandon(world, id);
        }

        match self.phase {
            TradePhase::Start => {
                self.phase = TradePhase::Queue;
                TaskStep::Push(CitizenState::new(EnterMarketQueue::new(self.market), now))
            }
            TradePhase::Queue => {
                self.phase = TradePhase::Negotiate;
                TaskStep::Push(CitizenState::new(
                    MarketTradeInteraction::new(self.market, self.item, self.amount, self.sell_to_market),
                    now,
                ))
            }
            TradePhase::Negotiate => match returned {
                Some(ReturnedData::Agreement { agreement }) => {
                    self.phase = TradePhase::Exchange;
                    TaskStep::Push(CitizenState::new(
                        MarketPutItemOnCounter::new(self.market, agreement),
                        now,
                    ))
                }
                _ => self.abandon(world, id),
            },
            TradePhase::Exchange => {
                leave_queue(&mut world.map, self.market, id);
                match returned {
                    Some(ReturnedData::Amount { amount }) => {
                        TaskStep::Success(Some(ReturnedData::Amount { amount }))
                    }
                    _ => TaskStep::Failed,
                }
            }
        }
    }
}

/// Walk to the end of the queue, join once close to the next free slot and
/// move up until served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnterMarketQueue {
    pub market: BuildingId,
}

impl EnterMarketQueue {
    pub fn new(market: BuildingId) -> Self {
        Self { market }
    }
}

impl TaskBehavior for EnterMarketQueue {
    fn tick(&mut self, ctx: &mut TickContext, id: CitizenId, _meta: &mut FrameMeta) -> TaskStep {
        let world = &mut *ctx.world;
        if open_market(world, self.market).is_none() {
            leave_queue(&mut world.map, self.market, id);
            return TaskStep::Failed;
        }
        let reach = world.config.citizen.interaction_distance;

        let index = match market_get_queue_position(world, self.market, id) {
            Some(index) => index,
            None => {
                let next = queue_len(&world.map, self.market);
                let Some(slot) = queue_slot_position(world, self.market, next) else {
                    return TaskStep::Failed;
                };
                if !move_near(world.expect_citizen_mut(id), slot, reach) {
                    return TaskStep::Running;
                }
                match join_queue(&mut world.map, self.market, id) {
                    Some(index) => index,
                    None => return TaskStep::Failed,
                }
            }
        };

        let Some(slot) = queue_slot_position(world, self.market, index) else {
            return TaskStep::Failed;
        };
        let at_slot = move_near(world.expect_citizen_mut(id), slot, SLOT_TOLERANCE);
        if index == 0 && at_slot {
            TaskStep::Success(None)
        } else {
            TaskStep::Running
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStep {
    Request,
    AwaitOffer,
    AwaitConfirm,
}

/// The customer's half of the scripted negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTradeInteraction {
    pub market: BuildingId,
    pub item: ItemName,
    pub amount: u32,
    pub sell_to_market: bool,
    pub step: NegotiationStep,
    pub last_said: u64,
}

impl MarketTradeInteraction {
    pub fn new(market: BuildingId, item: ItemName, amount: u32, sell_to_market: bool) -> Self {
        Self {
            market,
            item,
            amount,
            sell_to_market,
            step: NegotiationStep::Request,
            last_said: 0,
        }
    }

    fn tell(&mut self, world: &mut World, id: CitizenId, merchant: CitizenId, step: MarketTradeStep, amount: u32, price: u32) {
        let trade = MarketTradeIntention {
            step,
            item_name: self.item,
            item_amount: amount,
            single_price: price,
            sell_to_market: self.sell_to_market,
        };
        say(world, id, Intention::MarketTrade { to: merchant, trade });
        self.last_said = world.time;
    }

    /// How many of the offered units this customer can actually trade.
    fn acceptable(&self, world: &World, id: CitizenId, offered: u32, price: u32) -> u32 {
        let citizen = world.expect_citizen(id);
        if self.sell_to_market {
            offered.min(citizen.inventory.get_amount(self.item))
        } else {
            offered
                .min(citizen.money / price.max(1))
                .min(citizen.inventory.available_capacity(self.item))
        }
    }
}

impl TaskBehavior for MarketTradeInteraction {
    fn tick(&mut self, ctx: &mut TickContext, id: CitizenId, _meta: &mut FrameMeta) -> TaskStep {
        let world = &mut *ctx.world;
        let Some(merchant) = open_market(world, self.market).map(|b| b.owner) else {
            return TaskStep::Failed;
        };

        let unanswered =
            world.time.saturating_sub(self.last_said) >= world.config.market.request_retry_ms;

        match self.step {
            NegotiationStep::Request => {
                self.tell(world, id, merchant, MarketTradeStep::Request, self.amount, 0);
                self.step = NegotiationStep::AwaitOffer;
                TaskStep::Running
            }
            NegotiationStep::AwaitOffer => {
                let Some(reply) = read_reply(world, merchant, id, self.last_said) else {
                    if unanswered {
                        tracing::trace!(citizen = %id, %merchant, "asking again");
                        self.tell(world, id, merchant, MarketTradeStep::Request, self.amount, 0);
                    }
                    return TaskStep::Running;
                };
                let Some(Intention::MarketTrade { trade, .. }) = reply.intention else {
                    return TaskStep::Running;
                };
                match trade.step {
                    MarketTradeStep::Offer => {
                        let price = trade.single_price;
                        let amount = self.acceptable(world, id, trade.item_amount, price);
                        if amount == 0 {
                            self.tell(world, id, merchant, MarketTradeStep::Decline, 0, price);
                            return TaskStep::Failed;
                        }
                        let step = if amount == trade.item_amount {
                            MarketTradeStep::Accept
                        } else {
                            MarketTradeStep::CounterOffer
                        };
                        self.tell(world, id, merchant, step, amount, price);
                        self.step = NegotiationStep::AwaitConfirm;
                        TaskStep::Running
                    }
                    MarketTradeStep::Decline => TaskStep::Failed,
                    _ => TaskStep::Running,
                }
            }
            NegotiationStep::AwaitConfirm => {
                let Some(reply) = read_reply(world, merchant, id, self.last_said) else {
                    if unanswered {
                        self.step = NegotiationStep::Request;
                    }
                    return TaskStep::Running;
                };
                let Some(Intention::MarketTrade { trade, .. }) = reply.intention else {
                    return TaskStep::Running;
                };
                match trade.step {
                    MarketTradeStep::Confirm => {
                        let agreement = TradeAgreement {
                            item: self.item,
                            amount: trade.item_amount,
                            single_price: trade.single_price,
                            sell_to_market: self.sell_to_market,
                        };
                        TaskStep::Success(Some(ReturnedData::Agreement { agreement }))
                    }
                    MarketTradeStep::Decline => TaskStep::Failed,
                    _ => TaskStep::Running,
                }
            }
        }
    }
}

/// The customer's half of the counter exchange. The seller puts goods down
/// first; each side waits for its consideration to appear. There is no
/// timeout: the wait only ends when the market closes or the merchant
/// declines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPutItemOnCounter {
    pub market: BuildingId,
    pub agreement: TradeAgreement,
    /// Units this customer put down when selling.
    pub placed: Option<u32>,
    pub since: u64,
}

impl MarketPutItemOnCounter {
    pub fn new(market: BuildingId, agreement: TradeAgreement) -> Self {
        Self {
            market,
            agreement,
            placed: None,
            since: 0,
        }
    }
}

impl TaskBehavior for MarketPutItemOnCounter {
    fn tick(&mut self, ctx: &mut TickContext, id: CitizenId, _meta: &mut FrameMeta) -> TaskStep {
        let now = ctx.now();
        let Some(merchant) = open_market(ctx.world, self.market).map(|b| b.owner) else {
            return TaskStep::Failed;
        };
        let declined = read_reply(ctx.world, merchant, id, self.since)
            .and_then(|m| m.intention)
            .is_some_and(|i| {
                matches!(i, Intention::MarketTrade { trade, .. } if trade.step == MarketTradeStep::Decline)
            });

        let World { citizens, map, .. } = &mut *ctx.world;
        let Some(citizen) = citizens.get_mut(&id) else {
            return TaskStep::Failed;
        };
        let Some(state) = map
            .building_mut(self.market)
            .and_then(|b| b.market.as_mut())
        else {
            return TaskStep::Failed;
        };
        let counter = &mut state.counter;
        let item = self.agreement.item;
        let price = self.agreement.single_price;

        if self.agreement.sell_to_market {
            let Some(placed) = self.placed else {
                let moved = move_item_between(
                    item,
                    &mut citizen.inventory,
                    &mut counter.items,
                    Some(self.agreement.amount),
                );
                if moved == 0 {
                    return TaskStep::Failed;
                }
                counter.placed_by = Some(id);
                self.placed = Some(moved);
                self.since = now;
                return TaskStep::Running;
            };
            if counter.money == 0 && !declined {
                return TaskStep::Running;
            }
            counter.placed_by = None;
            citizen.money += std::mem::take(&mut counter.money);
            let returned = move_item_between(item, &mut counter.items, &mut citizen.inventory, None);
            let sold = placed.saturating_sub(returned);
            if sold == 0 {
                return TaskStep::Failed;
            }
            citizen.think(now, format!("Sold {sold} {item}."));
            TaskStep::Success(Some(ReturnedData::Amount { amount: sold }))
        } else {
            if declined {
                return TaskStep::Failed;
            }
            let on_counter = counter.items.get_amount(item);
            if on_counter == 0 {
                return TaskStep::Running;
            }
            let affordable = citizen.money / price.max(1);
            let take = on_counter.min(self.agreement.amount).min(affordable);
            let moved = move_item_between(item, &mut counter.items, &mut citizen.inventory, Some(take));
            let cost = moved * price;
            citizen.money -= cost;
            counter.money += cost;
            if moved == 0 {
                return TaskStep::Failed;
            }
            citizen.think(now, format!("Bought {moved} {item}."));
            TaskStep::Success(Some(ReturnedData::Amount { amount: moved }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BuildingKind, Position};
    use crate::sim::market::sweep_counter;
    use crate::testutil::TestWorld;

    fn queued_customer(tw: &mut TestWorld) -> (CitizenId, BuildingId, CitizenId) {
        let merchant = tw.citizen("Mo", Position::new(200.0, 200.0));
        let market = tw.building(BuildingKind::FoodMarket, merchant, Position::new(200.0, 200.0));
        let customer = tw.citizen("Cy", Position::default());
        let slot = queue_slot_position(&tw.world, market, 0).unwrap();
        tw.world.expect_citizen_mut(customer).position = slot;
        join_queue(&mut tw.world.map, market, customer);
        (merchant, market, customer)
    }

    fn requests_said(world: &World, customer: CitizenId) -> usize {
        world
            .expect_citizen(customer)
            .chat
            .messages
            .iter()
            .filter(|m| {
                matches!(m.intention, Some(Intention::MarketTrade { trade, .. }) if trade.step == MarketTradeStep::Request)
            })
            .count()
    }

    #[test]
    fn unanswered_request_is_repeated() {
        let mut tw = TestWorld::new();
        let (_, market, customer) = queued_customer(&mut tw);
        let retry = tw.world.config.market.request_retry_ms;
        let mut frame = CitizenState::new(
            MarketTradeInteraction::new(market, ItemName::Mushroom, 2, false),
            0,
        );

        tw.world.time = 100;
        assert_eq!(tw.tick_frame(customer, &mut frame), TaskStep::Running);
        tw.world.time += retry - 1;
        tw.tick_frame(customer, &mut frame);
        assert_eq!(requests_said(&tw.world, customer), 1);

        tw.world.time += 1;
        tw.tick_frame(customer, &mut frame);
        assert_eq!(requests_said(&tw.world, customer), 2);
    }

    #[test]
    fn seller_gets_goods_back_when_the_counter_is_swept_unpaid() {
        let mut tw = TestWorld::new();
        let (_, market, customer) = queued_customer(&mut tw);
        tw.give(customer, ItemName::Mushroom, 2);
        let agreement = TradeAgreement {
            item: ItemName::Mushroom,
            amount: 2,
            single_price: 2,
            sell_to_market: true,
        };
        let mut frame = CitizenState::new(MarketPutItemOnCounter::new(market, agreement), 0);
        assert_eq!(tw.tick_frame(customer, &mut frame), TaskStep::Running);
        assert_eq!(tw.world.expect_citizen(customer).inventory.get_amount(ItemName::Mushroom), 0);
        let counter = &tw.world.map.building(market).unwrap().market.as_ref().unwrap().counter;
        assert_eq!(counter.placed_by, Some(customer));

        leave_queue(&mut tw.world.map, market, customer);
        sweep_counter(&mut tw.world, market);
        assert_eq!(tw.world.expect_citizen(customer).inventory.get_amount(ItemName::Mushroom), 2);
        let building = tw.world.map.building(market).unwrap();
        assert_eq!(building.inventory.get_amount(ItemName::Mushroom), 0);
        assert_eq!(building.market.as_ref().unwrap().counter.placed_by, None);
    }
}
