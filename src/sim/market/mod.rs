//! Markets: queue discipline, the counter, and the frames on both sides of
//! a trade.
//!
//! A customer queues, negotiates with the merchant through chat intentions
//! and then exchanges goods over the counter. Queue slots line up in front
//! of the market; slot 0 is the customer being served.

mod customer;
mod merchant;

use serde::{Deserialize, Serialize};

pub use customer::{
    EnterMarketQueue, MarketPutItemOnCounter, MarketTradeInteraction, MarketTradeItemWith,
    NegotiationStep, TradePhase,
};
pub use merchant::{MarketServe, ServePhase};

use crate::id::{BuildingId, CitizenId};
use crate::map::Map;
use crate::model::{Building, ItemName, Position, World, move_item_between};

/// Terms both sides agreed on. `sell_to_market` is from the customer's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeAgreement {
    pub item: ItemName,
    pub amount: u32,
    pub single_price: u32,
    pub sell_to_market: bool,
}

impl TradeAgreement {
    pub fn total(&self) -> u32 {
        self.amount * self.single_price
    }
}

/// Where the merchant stands.
pub fn merchant_spot(map: &Map, market: BuildingId) -> Option<Position> {
    map.position_of(market)
}

/// Position of queue slot `index`; slot 0 faces the counter.
pub fn queue_slot_position(world: &World, market: BuildingId, index: usize) -> Option<Position> {
    let base = world.map.position_of(market)?;
    let offset = world.map.tile_size + index as f64 * world.config.market.queue_spacing;
    Some(base.offset(0.0, offset))
}

/// A built, usable market whose owner is alive.
pub fn market_is_open(world: &World, market: BuildingId) -> bool {
    open_market(world, market).is_some()
}

pub fn open_market(world: &World, market: BuildingId) -> Option<&Building> {
    world
        .map
        .usable_building(market)
        .filter(|b| b.is_built() && b.market.is_some() && world.is_alive(b.owner))
}

/// Drop queue entries whose citizen is gone, dead, or out of interaction
/// range of their slot. Slots are recomputed as entries drop out; a citizen
/// anywhere between the slot held before the shift and the new one stays.
pub fn prune_queue(world: &mut World, market: BuildingId) {
    let Some(base) = world.map.position_of(market) else {
        return;
    };
    let tile = world.map.tile_size;
    let spacing = world.config.market.queue_spacing;
    let reach = world.config.citizen.interaction_distance;
    let Some(queue) = world
        .map
        .building(market)
        .and_then(|b| b.market.as_ref())
        .map(|m| m.queue.clone())
    else {
        return;
    };

    let slot = |index: usize| base.offset(0.0, tile + index as f64 * spacing);
    let mut kept: Vec<CitizenId> = Vec::with_capacity(queue.len());
    for (held, citizen) in queue.into_iter().enumerate() {
        let stays = world.citizen(citizen).is_some_and(|c| {
            c.is_alive() && (kept.len()..=held).any(|i| c.position.distance(&slot(i)) <= reach)
        });
        if stays {
            kept.push(citizen);
        } else {
            tracing::debug!(%citizen, %market, "dropped from market queue");
        }
    }
    if let Some(state) = world
        .map
        .building_mut(market)
        .and_then(|b| b.market.as_mut())
    {
        state.queue = kept;
    }
}

pub fn market_has_queue(world: &mut World, market: BuildingId) -> bool {
    prune_queue(world, market);
    world
        .map
        .building(market)
        .and_then(|b| b.market.as_ref())
        .is_some_and(|m| !m.queue.is_empty())
}

pub fn market_get_queue_position(
    world: &mut World,
    market: BuildingId,
    citizen: CitizenId,
) -> Option<usize> {
    prune_queue(world, market);
    queue_position(&world.map, market, citizen)
}

fn queue_position(map: &Map, market: BuildingId, citizen: CitizenId) -> Option<usize> {
    map.building(market)?
        .market
        .as_ref()?
        .queue
        .iter()
        .position(|&c| c == citizen)
}

pub fn queue_len(map: &Map, market: BuildingId) -> usize {
    map.building(market)
        .and_then(|b| b.market.as_ref())
        .map_or(0, |m| m.queue.len())
}

pub fn queue_front(map: &Map, market: BuildingId) -> Option<CitizenId> {
    map.building(market)?.market.as_ref()?.queue.first().copied()
}

/// Append `citizen` unless already queued. Returns its position.
pub fn join_queue(map: &mut Map, market: BuildingId, citizen: CitizenId) -> Option<usize> {
    let queue = &mut map.building_mut(market)?.market.as_mut()?.queue;
    if let Some(index) = queue.iter().position(|&c| c == citizen) {
        return Some(index);
    }
    queue.push(citizen);
    Some(queue.len() - 1)
}

pub fn leave_queue(map: &mut Map, market: BuildingId, citizen: CitizenId) {
    if let Some(state) = map.building_mut(market).and_then(|b| b.market.as_mut()) {
        state.queue.retain(|&c| c != citizen);
    }
}

/// Remove `citizen` from every market queue.
pub fn leave_all_queues(map: &mut Map, citizen: CitizenId) {
    let markets: Vec<BuildingId> = map
        .buildings()
        .filter(|(_, b)| b.market.as_ref().is_some_and(|m| m.queue.contains(&citizen)))
        .map(|(o, _)| o.id)
        .collect();
    for market in markets {
        leave_queue(map, market, citizen);
    }
}

/// Clear the counter. A seller's goods and whatever the merchant already
/// paid for them go to that seller; otherwise goods go back into the
/// market's stock and money to the merchant.
pub fn sweep_counter(world: &mut World, market: BuildingId) {
    let World { citizens, map, .. } = world;
    let Some(building) = map.building_mut(market) else {
        return;
    };
    let owner = building.owner;
    let Some(state) = building.market.as_mut() else {
        return;
    };
    let items: Vec<ItemName> = state.counter.items.items.iter().map(|i| i.name).collect();
    let seller = state
        .counter
        .placed_by
        .take()
        .and_then(|s| citizens.get_mut(&s))
        .filter(|c| c.is_alive());
    if let Some(seller) = seller {
        tracing::debug!(citizen = %seller.id, %market, "counter goods returned to seller");
        for &item in &items {
            move_item_between(item, &mut state.counter.items, &mut seller.inventory, None);
        }
        seller.money += std::mem::take(&mut state.counter.money);
    }
    for item in items {
        move_item_between(item, &mut state.counter.items, &mut building.inventory, None);
    }
    let money = std::mem::take(&mut state.counter.money);
    if let Some(merchant) = citizens.get_mut(&owner) {
        merchant.money += money;
    }
}
