use serde::{Deserialize, Serialize};

use super::{TradeAgreement, merchant_spot, open_market, prune_queue, queue_front, sweep_counter};
use crate::id::{BuildingId, CitizenId};
use crate::model::{
    Intention, ItemName, MarketTradeIntention, MarketTradeStep, World, move_item_between,
};
use crate::sim::chat::{last_line_to, read_reply, say};
use crate::sim::context::TickContext;
use crate::sim::helpers::move_near;
use crate::sim::state_stack::{CitizenState, FrameMeta, FrameTag, TaskStep};
use crate::sim::tasks::{Task, TaskBehavior};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ServePhase {
    Waiting,
    Negotiating {
        customer: CitizenId,
        /// Amount and unit price last offered.
        offer: Option<(u32, u32)>,
    },
    Exchange {
        customer: CitizenId,
        agreement: TradeAgreement,
        done: bool,
    },
}

/// Stand behind the counter and serve the queue front to back. Ends once the
/// queue has stayed empty for a while so the job can pick the next thing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketServe {
    pub market: BuildingId,
    pub phase: ServePhase,
    /// Customer messages at or before this time were already answered.
    pub last_handled: u64,
    pub idle_since: Option<u64>,
}

impl MarketServe {
    pub fn new(market: BuildingId) -> Self {
        Self {
            market,
            phase: ServePhase::Waiting,
            last_handled: 0,
            idle_since: None,
        }
    }

    pub fn into_state(self, now: u64) -> CitizenState {
        CitizenState::new(self, now)
            .tagged(FrameTag::Work)
            .tagged(FrameTag::Trade)
    }

    fn offer_for(&self, world: &World, id: CitizenId, trade: &MarketTradeIntention) -> (u32, u32) {
        let Some(building) = world.map.building(self.market) else {
            return (0, 0);
        };
        if !building.kind.traded_items().contains(&trade.item_name) {
            return (0, 0);
        }
        let item = trade.item_name;
        if trade.sell_to_market {
            let price = building.buy_price(item);
            let funds = world.citizen(id).map_or(0, |m| m.money);
            let amount = trade
                .item_amount
                .min(building.inventory.available_capacity(item))
                .min(funds / price.max(1));
            (amount, price)
        } else {
            let price = building.sell_price(item, &world.config);
            let amount = trade.item_amount.min(building.inventory.get_amount(item));
            (amount, price)
        }
    }

    /// Start serving `customer` where the conversation stands. A request or
    /// an answer to an offer said before this frame started still gets a
    /// reply. A deal confirmed by an earlier frame that never reached the
    /// counter is called off.
    fn pick_up(&mut self, world: &mut World, id: CitizenId, customer: CitizenId) {
        let trade_line = |from, to| {
            last_line_to(world, from, to).and_then(|m| match m.intention {
                Some(Intention::MarketTrade { trade, .. }) => Some((m.time, trade)),
                _ => None,
            })
        };
        let asked = trade_line(customer, id);
        let answered = trade_line(id, customer);
        let market = self.market;
        let at_counter = world
            .citizen(customer)
            .and_then(|c| c.top_state())
            .is_some_and(|s| matches!(&s.task, Task::MarketPutItemOnCounter(p) if p.market == market));

        self.last_handled = world.time.saturating_sub(1);
        let mut offer = None;
        match (asked, answered) {
            (_, Some((said, trade)))
                if at_counter
                    && trade.step == MarketTradeStep::Confirm
                    && asked.is_none_or(|(time, _)| time <= said) =>
            {
                tracing::debug!(merchant = %id, %customer, "calling off an unfinished deal");
                say(world, id, Intention::MarketTrade {
                    to: customer,
                    trade: MarketTradeIntention {
                        step: MarketTradeStep::Decline,
                        item_amount: 0,
                        ..trade
                    },
                });
            }
            (Some((time, trade)), _) if trade.step == MarketTradeStep::Request => {
                self.last_handled = time.saturating_sub(1);
            }
            (Some((time, trade)), Some((said, made)))
                if matches!(trade.step, MarketTradeStep::Accept | MarketTradeStep::CounterOffer)
                    && made.step == MarketTradeStep::Offer
                    && said <= time =>
            {
                self.last_handled = time.saturating_sub(1);
                offer = Some((made.item_amount, made.single_price));
            }
            _ => {}
        }
        self.phase = ServePhase::Negotiating { customer, offer };
    }

    fn negotiate(&mut self, world: &mut World, id: CitizenId, customer: CitizenId, offer: Option<(u32, u32)>) {
        let Some(message) = read_reply(world, customer, id, self.last_handled) else {
            return;
        };
        self.last_handled = message.time;
        let Some(Intention::MarketTrade { trade, .. }) = message.intention else {
            return;
        };

        let reply = |step, amount, price| MarketTradeIntention {
            step,
            item_amount: amount,
            single_price: price,
            ..trade
        };
        match trade.step {
            MarketTradeStep::Request => {
                let (amount, price) = self.offer_for(world, id, &trade);
                if amount == 0 {
                    say(world, id, Intention::MarketTrade {
                        to: customer,
                        trade: reply(MarketTradeStep::Decline, 0, price),
                    });
                    return;
                }
                say(world, id, Intention::MarketTrade {
                    to: customer,
                    trade: reply(MarketTradeStep::Offer, amount, price),
                });
                self.phase = ServePhase::Negotiating {
                    customer,
                    offer: Some((amount, price)),
                };
            }
            MarketTradeStep::Accept | MarketTradeStep::CounterOffer => {
                let acceptable = offer.filter(|&(max, price)| {
                    trade.item_amount > 0 && trade.item_amount <= max && trade.single_price == price
                });
                let Some((_, price)) = acceptable else {
                    say(world, id, Intention::MarketTrade {
                        to: customer,
                        trade: reply(MarketTradeStep::Decline, 0, trade.single_price),
                    });
                    return;
                };
                say(world, id, Intention::MarketTrade {
                    to: customer,
                    trade: reply(MarketTradeStep::Confirm, trade.item_amount, price),
                });
                tracing::debug!(
                    merchant = %id,
                    %customer,
                    item = %trade.item_name,
                    amount = trade.item_amount,
                    price,
                    "trade agreed"
                );
                self.phase = ServePhase::Exchange {
                    customer,
                    agreement: TradeAgreement {
                        item: trade.item_name,
                        amount: trade.item_amount,
                        single_price: price,
                        sell_to_market: trade.sell_to_market,
                    },
                    done: false,
                };
            }
            MarketTradeStep::Decline => {
                self.phase = ServePhase::Waiting;
            }
            MarketTradeStep::Offer | MarketTradeStep::Confirm => {}
        }
    }

    /// Do the merchant's side of the counter exchange once. Returns `None`
    /// while waiting for the customer's goods, otherwise how many units
    /// changed hands.
    fn exchange(&self, world: &mut World, id: CitizenId, agreement: &TradeAgreement) -> Option<u32> {
        let World { citizens, map, .. } = world;
        let (Some(merchant), Some(building)) = (citizens.get_mut(&id), map.building_mut(self.market))
        else {
            return Some(0);
        };
        let Some(state) = building.market.as_mut() else {
            return Some(0);
        };
        let item: ItemName = agreement.item;
        if !agreement.sell_to_market {
            return Some(move_item_between(
                item,
                &mut building.inventory,
                &mut state.counter.items,
                Some(agreement.amount),
            ));
        }
        let offered = state.counter.items.get_amount(item);
        if offered == 0 {
            return None;
        }
        let affordable = merchant.money / agreement.single_price.max(1);
        let wanted = offered.min(agreement.amount).min(affordable);
        let moved = move_item_between(
            item,
            &mut state.counter.items,
            &mut building.inventory,
            Some(wanted),
        );
        let cost = moved * agreement.single_price;
        merchant.money -= cost;
        state.counter.money += cost;
        Some(moved)
    }
}

fn serving_customer(phase: &ServePhase) -> Option<CitizenId> {
    match phase {
        ServePhase::Exchange { customer, .. } | ServePhase::Negotiating { customer, .. } => {
            Some(*customer)
        }
        ServePhase::Waiting => None,
    }
}

impl TaskBehavior for MarketServe {
    fn tick(&mut self, ctx: &mut TickContext, id: CitizenId, _meta: &mut FrameMeta) -> TaskStep {
        let now = ctx.now();
        let world = &mut *ctx.world;
        if open_market(world, self.market).is_none_or(|b| b.owner != id) {
            return TaskStep::Failed;
        }
        let Some(spot) = merchant_spot(&world.map, self.market) else {
            return TaskStep::Failed;
        };
        let reach = world.config.citizen.interaction_distance;
        if !move_near(world.expect_citizen_mut(id), spot, reach) {
            return TaskStep::Running;
        }

        prune_queue(world, self.market);
        let front = queue_front(&world.map, self.market);
        let serving = serving_customer(&self.phase);
        if serving.is_some() && serving != front {
            sweep_counter(world, self.market);
            self.phase = ServePhase::Waiting;
        }

        match self.phase.clone() {
            ServePhase::Waiting => {
                let Some(customer) = front else {
                    let since = *self.idle_since.get_or_insert(now);
                    if now.saturating_sub(since) >= world.config.market.serve_idle_ms {
                        sweep_counter(world, self.market);
                        return TaskStep::Success(None);
                    }
                    return TaskStep::Running;
                };
                self.idle_since = None;
                self.pick_up(world, id, customer);
                TaskStep::Running
            }
            ServePhase::Negotiating { customer, offer } => {
                self.negotiate(world, id, customer, offer);
                TaskStep::Running
            }
            ServePhase::Exchange {
                customer,
                agreement,
                done,
            } => {
                let mut finished = done;
                if !done {
                    if let Some(moved) = self.exchange(world, id, &agreement) {
                        finished = true;
                        if moved == 0 {
                            let trade = MarketTradeIntention {
                                step: MarketTradeStep::Decline,
                                item_name: agreement.item,
                                item_amount: 0,
                                single_price: agreement.single_price,
                                sell_to_market: agreement.sell_to_market,
                            };
                            say(world, id, Intention::MarketTrade { to: customer, trade });
                        }
                    }
                }
                if let Some(counter) = world
                    .map
                    .building_mut(self.market)
                    .and_then(|b| b.market.as_mut())
                    .map(|m| &mut m.counter)
                {
                    if !agreement.sell_to_market && counter.money > 0 {
                        let earned = std::mem::take(&mut counter.money);
                        if let Some(merchant) = world.citizens.get_mut(&id) {
                            merchant.money += earned;
                        }
                    }
                }
                self.phase = ServePhase::Exchange {
                    customer,
                    agreement,
                    done: finished,
                };
                TaskStep::Running
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BuildingKind, Position};
    use crate::sim::market::{MarketTradeItemWith, join_queue, queue_slot_position};
    use crate::testutil::TestWorld;

    fn request(merchant: CitizenId, amount: u32) -> Intention {
        Intention::MarketTrade {
            to: merchant,
            trade: MarketTradeIntention {
                step: MarketTradeStep::Request,
                item_name: ItemName::Mushroom,
                item_amount: amount,
                single_price: 0,
                sell_to_market: false,
            },
        }
    }

    /// A merchant with a stocked food market and one customer at the front
    /// of its queue.
    fn served_market(tw: &mut TestWorld) -> (CitizenId, BuildingId, CitizenId) {
        let merchant = tw.citizen("Mo", Position::new(200.0, 200.0));
        let market = tw.building(BuildingKind::FoodMarket, merchant, Position::new(200.0, 200.0));
        tw.world
            .map
            .building_mut(market)
            .unwrap()
            .inventory
            .put_item_into(ItemName::Mushroom, 2, Vec::new());
        let customer = tw.citizen("Cy", Position::default());
        let slot = queue_slot_position(&tw.world, market, 0).unwrap();
        tw.world.expect_citizen_mut(customer).position = slot;
        join_queue(&mut tw.world.map, market, customer);
        (merchant, market, customer)
    }

    #[test]
    fn idle_merchant_finishes_after_quiet_period() {
        let mut tw = TestWorld::new();
        let merchant = tw.citizen("Mo", Position::new(200.0, 200.0));
        let market = tw.building(BuildingKind::FoodMarket, merchant, Position::new(200.0, 200.0));
        let mut frame = MarketServe::new(market).into_state(0);
        let step = tw.run_frame(merchant, &mut frame, 1_000);
        assert_eq!(step, TaskStep::Success(None));
        assert!(tw.world.time >= tw.world.config.market.serve_idle_ms);
    }

    #[test]
    fn not_the_owner_cannot_serve() {
        let mut tw = TestWorld::new();
        let owner = tw.citizen("Mo", Position::new(200.0, 200.0));
        let other = tw.citizen("Bo", Position::new(200.0, 200.0));
        let market = tw.building(BuildingKind::FoodMarket, owner, Position::new(200.0, 200.0));
        let mut frame = MarketServe::new(market).into_state(0);
        assert_eq!(tw.tick_frame(other, &mut frame), TaskStep::Failed);
    }

    #[test]
    fn request_gets_an_offer_capped_by_stock() {
        let mut tw = TestWorld::new();
        let merchant = tw.citizen("Mo", Position::new(200.0, 200.0));
        let market = tw.building(BuildingKind::FoodMarket, merchant, Position::new(200.0, 200.0));
        tw.world
            .map
            .building_mut(market)
            .unwrap()
            .inventory
            .put_item_into(ItemName::Mushroom, 2, Vec::new());
        let customer = tw.citizen("Cy", Position::default());
        let slot = queue_slot_position(&tw.world, market, 0).unwrap();
        tw.world.expect_citizen_mut(customer).position = slot;
        join_queue(&mut tw.world.map, market, customer);

        let mut serve = MarketServe::new(market).into_state(0);
        tw.tick_frame(merchant, &mut serve);
        tw.world.time += tw.world.config.tick_ms;
        say(&mut tw.world, customer, request(merchant, 5));
        let reaction = tw.world.config.chat.reaction_time_ms;
        tw.world.time += reaction;
        tw.tick_frame(merchant, &mut serve);
        tw.world.time += reaction;

        let offer = read_reply(&tw.world, merchant, customer, 0).unwrap();
        let Some(Intention::MarketTrade { trade, .. }) = offer.intention else {
            panic!("expected a market reply");
        };
        assert_eq!(trade.step, MarketTradeStep::Offer);
        assert_eq!(trade.item_amount, 2);
        assert_eq!(trade.single_price, ItemName::Mushroom.base_price() + tw.world.config.market.markup);
    }

    #[test]
    fn request_made_before_serving_still_gets_an_offer() {
        let mut tw = TestWorld::new();
        let (merchant, market, customer) = served_market(&mut tw);
        tw.world.time = 100;
        say(&mut tw.world, customer, request(merchant, 5));
        let asked_at = tw.world.time;
        tw.world.time += 5_000;

        let mut serve = MarketServe::new(market).into_state(tw.world.time);
        tw.tick_frame(merchant, &mut serve);
        tw.tick_frame(merchant, &mut serve);
        tw.world.time += tw.world.config.chat.reaction_time_ms;

        let offer = read_reply(&tw.world, merchant, customer, asked_at).unwrap();
        let Some(Intention::MarketTrade { trade, .. }) = offer.intention else {
            panic!("expected a market reply");
        };
        assert_eq!(trade.step, MarketTradeStep::Offer);
        assert_eq!(trade.item_amount, 2);
    }

    #[test]
    fn confirmed_deal_left_waiting_at_the_counter_is_called_off() {
        use crate::sim::market::MarketPutItemOnCounter;
        use crate::sim::state_stack::push_state;

        let mut tw = TestWorld::new();
        let (merchant, market, customer) = served_market(&mut tw);
        let agreement = TradeAgreement {
            item: ItemName::Mushroom,
            amount: 2,
            single_price: 3,
            sell_to_market: false,
        };
        let trade = MarketTradeIntention {
            step: MarketTradeStep::Accept,
            item_name: ItemName::Mushroom,
            item_amount: 2,
            single_price: 3,
            sell_to_market: false,
        };
        tw.world.time = 100;
        say(&mut tw.world, customer, Intention::MarketTrade { to: merchant, trade });
        tw.world.time = 120;
        let confirm = MarketTradeIntention { step: MarketTradeStep::Confirm, ..trade };
        say(&mut tw.world, merchant, Intention::MarketTrade { to: customer, trade: confirm });
        let waiting = CitizenState::new(MarketPutItemOnCounter::new(market, agreement), 120);
        push_state(tw.world.expect_citizen_mut(customer), waiting.clone());
        tw.world.time = 5_000;

        let mut serve = MarketServe::new(market).into_state(tw.world.time);
        tw.tick_frame(merchant, &mut serve);
        tw.world.time += tw.world.config.chat.reaction_time_ms;

        let mut counter = waiting;
        assert_eq!(tw.tick_frame(customer, &mut counter), TaskStep::Failed);
    }

    #[test]
    fn full_purchase_moves_goods_and_money() {
        let mut tw = TestWorld::new();
        let merchant = tw.citizen("Mo", Position::new(200.0, 200.0));
        let market = tw.building(BuildingKind::FoodMarket, merchant, Position::new(200.0, 200.0));
        tw.world
            .map
            .building_mut(market)
            .unwrap()
            .inventory
            .put_item_into(ItemName::Mushroom, 5, Vec::new());
        let customer = tw.citizen("Cy", Position::new(200.0, 260.0));
        tw.world.expect_citizen_mut(customer).money = 50;
        let price = ItemName::Mushroom.base_price() + tw.world.config.market.markup;

        let mut serve = MarketServe::new(market).into_state(0);
        let mut buy = MarketTradeItemWith::buy(market, ItemName::Mushroom, 3).into_state(0);
        let done = tw.run_pair(customer, &mut buy, merchant, &mut serve, 2_000);
        assert_eq!(done, TaskStep::Success(Some(crate::sim::state_stack::ReturnedData::Amount { amount: 3 })));

        let c = tw.world.expect_citizen(customer);
        assert_eq!(c.inventory.get_amount(ItemName::Mushroom), 3);
        assert_eq!(c.money, 50 - 3 * price);
        let stock = tw.world.map.building(market).unwrap().inventory.get_amount(ItemName::Mushroom);
        assert_eq!(stock, 2);
    }
}
