//! Needs that interrupt whatever a citizen is doing.
//!
//! Needs are checked in priority order. Only the first unfulfilled one acts:
//! it drops the current stack and pushes its remedy, tagged with the need.
//! When it has no remedy, or its last remedy failed recently, it backs off
//! and nothing below it acts either; the job keeps running meanwhile. While a need frame is on the stack only needs of
//! higher priority are looked at. Checking a need may have side effects:
//! the food checks eat from the inventory.

use serde::{Deserialize, Serialize};

use crate::id::CitizenId;
use crate::model::{Citizen, ItemName, World};
use crate::sim::chat::ChatWith;
use crate::sim::helpers::find_market;
use crate::sim::jobs::{JobKind, change_job};
use crate::sim::market::{MarketTradeItemWith, leave_all_queues};
use crate::sim::state_stack::{
    Activity, CitizenState, FrameTag, active_need, push_state, reset_state_to,
};
use crate::sim::tasks::{ClaimHome, GatherMushrooms, GetItem, RepairBuilding, Sleep, Task, Wanted};

/// Declaration order is priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum NeedKind {
    Sleep,
    Starving,
    Food,
    Home,
    Happiness,
}

string_enum!(NeedKind {
    Sleep => "sleep",
    Starving => "starving",
    Food => "food",
    Home => "home",
    Happiness => "happiness",
});

/// Food units fetched when hungry.
const FOOD_BATCH: u32 = 2;

pub trait Need: Sync {
    fn kind(&self) -> NeedKind;

    /// Whether the need is met right now. May eat.
    fn is_fulfilled(&self, world: &mut World, id: CitizenId) -> bool;

    /// The frame that addresses the need, or `None` if nothing can be done
    /// about it at the moment.
    fn remedy(&self, world: &mut World, id: CitizenId) -> Option<CitizenState>;

    /// Thought shown when the remedy starts.
    fn thought(&self) -> &'static str;
}

/// Every need, highest priority first.
pub static NEEDS: &[&dyn Need] = &[&SleepNeed, &StarvingNeed, &FoodNeed, &HomeNeed, &HappinessNeed];

/// Eat single units of the most plentiful food until `food_per_cent`
/// reaches `below` or the food runs out. Returns the units eaten.
pub fn eat_from_inventory(citizen: &mut Citizen, below: f64) -> u32 {
    let mut eaten = 0;
    while citizen.food_per_cent < below {
        let Some(food) = citizen.inventory.most_plentiful_food() else {
            break;
        };
        citizen.inventory.remove_item(food, 1);
        citizen.food_per_cent = (citizen.food_per_cent + food.food_value()).min(1.0);
        eaten += 1;
    }
    if eaten > 0 {
        tracing::trace!(citizen = %citizen.name, eaten, food = citizen.food_per_cent, "ate");
    }
    eaten
}

// --- Needs ---

struct SleepNeed;

impl Need for SleepNeed {
    fn kind(&self) -> NeedKind {
        NeedKind::Sleep
    }

    fn is_fulfilled(&self, world: &mut World, id: CitizenId) -> bool {
        let threshold = world.config.needs.sleep_threshold;
        world.expect_citizen(id).energy_per_cent >= threshold
    }

    fn remedy(&self, world: &mut World, _id: CitizenId) -> Option<CitizenState> {
        Some(CitizenState::new(Sleep::default(), world.time))
    }

    fn thought(&self) -> &'static str {
        "I am so tired."
    }
}

struct StarvingNeed;

impl Need for StarvingNeed {
    fn kind(&self) -> NeedKind {
        NeedKind::Starving
    }

    fn is_fulfilled(&self, world: &mut World, id: CitizenId) -> bool {
        let threshold = world.config.needs.starving_threshold;
        let citizen = world.expect_citizen_mut(id);
        eat_from_inventory(citizen, threshold);
        citizen.food_per_cent >= threshold
    }

    fn remedy(&self, world: &mut World, id: CitizenId) -> Option<CitizenState> {
        let now = world.time;
        if let Some(trade) = affordable_food(world, id) {
            return Some(trade.into_state(now));
        }
        let batch = world.config.jobs.gather_batch;
        let citizen = world.expect_citizen_mut(id);
        if citizen.job.kind() != JobKind::FoodGatherer {
            change_job(citizen, JobKind::FoodGatherer, "I am starving and cannot buy food.", now);
        }
        Some(CitizenState::new(GatherMushrooms::new(batch), now))
    }

    fn thought(&self) -> &'static str {
        "I am starving!"
    }
}

/// A purchase of food from the nearest stocked market this citizen can pay for.
fn affordable_food(world: &World, id: CitizenId) -> Option<MarketTradeItemWith> {
    let citizen = world.expect_citizen(id);
    let batch = world.config.jobs.gather_batch;
    ItemName::food_items().find_map(|item| {
        let market = find_market(world, &citizen.position, item, Some(id))?;
        let building = world.map.building(market)?;
        let stock = building.inventory.get_amount(item);
        let affordable = citizen.money / building.sell_price(item, &world.config).max(1);
        let amount = stock.min(affordable).min(batch);
        (amount > 0).then(|| MarketTradeItemWith::buy(market, item, amount))
    })
}

struct FoodNeed;

impl Need for FoodNeed {
    fn kind(&self) -> NeedKind {
        NeedKind::Food
    }

    fn is_fulfilled(&self, world: &mut World, id: CitizenId) -> bool {
        let threshold = world.config.needs.hunger_threshold;
        let citizen = world.expect_citizen_mut(id);
        eat_from_inventory(citizen, threshold);
        citizen.food_per_cent >= threshold
    }

    fn remedy(&self, world: &mut World, _id: CitizenId) -> Option<CitizenState> {
        Some(CitizenState::new(GetItem::new(Wanted::Food, FOOD_BATCH), world.time))
    }

    fn thought(&self) -> &'static str {
        "I am hungry."
    }
}

struct HomeNeed;

impl Need for HomeNeed {
    fn kind(&self) -> NeedKind {
        NeedKind::Home
    }

    fn is_fulfilled(&self, world: &mut World, id: CitizenId) -> bool {
        let threshold = world.config.needs.home_repair_threshold;
        world
            .expect_citizen(id)
            .home
            .and_then(|h| world.map.usable_building(h))
            .is_some_and(|b| b.is_built() && b.deterioration < threshold)
    }

    fn remedy(&self, world: &mut World, id: CitizenId) -> Option<CitizenState> {
        let now = world.time;
        let citizen = world.expect_citizen(id);
        let standing_home = citizen
            .home
            .filter(|&h| world.map.usable_building(h).is_some_and(|b| b.is_built()));
        match standing_home {
            Some(home) => Some(CitizenState::new(RepairBuilding::new(home), now)),
            None => Some(CitizenState::new(ClaimHome::default(), now)),
        }
    }

    fn thought(&self) -> &'static str {
        "I need a proper home."
    }
}

struct HappinessNeed;

impl Need for HappinessNeed {
    fn kind(&self) -> NeedKind {
        NeedKind::Happiness
    }

    fn is_fulfilled(&self, world: &mut World, id: CitizenId) -> bool {
        let threshold = world.config.needs.happiness_threshold;
        world.expect_citizen(id).happiness >= threshold
    }

    fn remedy(&self, world: &mut World, id: CitizenId) -> Option<CitizenState> {
        let from = world.expect_citizen(id).position;
        let partner = world
            .living_citizens()
            .filter(|c| c.id != id && !is_asleep(c))
            .min_by(|a, b| {
                a.position
                    .distance(&from)
                    .total_cmp(&b.position.distance(&from))
            })?
            .id;
        Some(ChatWith::start(partner, world.time).into_state(world.time))
    }

    fn thought(&self) -> &'static str {
        "I feel lonely."
    }
}

fn is_asleep(citizen: &Citizen) -> bool {
    citizen
        .top_state()
        .is_some_and(|s| matches!(s.task, Task::Sleep(_)))
}

// --- Evaluator ---

/// Check `id`'s needs and start the remedy for the first unmet one.
/// Returns the need that took over, if any.
///
/// # Panics
/// Panics if `id` is not in the world.
pub fn evaluate_needs(world: &mut World, id: CitizenId) -> Option<NeedKind> {
    let now = world.time;
    let cooldown = world.config.needs.check_cooldown_ms;
    let backoff = world.config.needs.failure_backoff_ms;
    let citizen = world.expect_citizen(id);
    if !citizen.is_alive() {
        return None;
    }
    let active = active_need(citizen);
    if active.is_none()
        && citizen
            .last_needs_satisfied
            .is_some_and(|t| now.saturating_sub(t) < cooldown)
    {
        return None;
    }

    let mut all_fulfilled = true;
    for need in NEEDS {
        let kind = need.kind();
        if active.is_some_and(|a| kind >= a) {
            all_fulfilled = false;
            break;
        }
        if need.is_fulfilled(world, id) {
            world.expect_citizen_mut(id).need_failed_at.remove(&kind);
            continue;
        }
        all_fulfilled = false;
        let backing_off = world
            .expect_citizen(id)
            .need_failed_at
            .get(&kind)
            .is_some_and(|&t| now.saturating_sub(t) < backoff);
        if backing_off {
            break;
        }
        let Some(remedy) = need.remedy(world, id) else {
            world.expect_citizen_mut(id).need_failed_at.insert(kind, now);
            break;
        };

        leave_all_queues(&mut world.map, id);
        let citizen = world.expect_citizen_mut(id);
        reset_state_to(citizen, Activity::Need(kind));
        citizen.think(now, need.thought());
        push_state(citizen, remedy.tagged(FrameTag::Need(kind)));
        tracing::debug!(citizen = %citizen.name, need = %kind, "need took over");
        return Some(kind);
    }

    if all_fulfilled {
        world.expect_citizen_mut(id).last_needs_satisfied = Some(now);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BuildingKind, Position};
    use crate::testutil::TestWorld;

    #[test]
    fn priority_order_is_declaration_order() {
        let kinds: Vec<NeedKind> = NEEDS.iter().map(|n| n.kind()).collect();
        let mut sorted = kinds.clone();
        sorted.sort();
        assert_eq!(kinds, sorted);
        assert_eq!(kinds.len(), NeedKind::ALL.len());
    }

    #[test]
    fn hunger_check_eats_from_inventory() {
        let mut tw = TestWorld::new();
        let id = tw.citizen("Ada", Position::new(100.0, 100.0));
        tw.give(id, ItemName::Mushroom, 5);
        tw.world.expect_citizen_mut(id).food_per_cent = 0.3;
        assert!(FoodNeed.is_fulfilled(&mut tw.world, id));
        let c = tw.world.expect_citizen(id);
        assert!(c.food_per_cent >= tw.world.config.needs.hunger_threshold);
        assert!(c.inventory.get_amount(ItemName::Mushroom) < 5);
    }

    #[test]
    fn tired_citizen_goes_to_sleep() {
        let mut tw = TestWorld::new();
        let id = tw.citizen("Ada", Position::new(100.0, 100.0));
        tw.world.expect_citizen_mut(id).energy_per_cent = 0.05;
        assert_eq!(evaluate_needs(&mut tw.world, id), Some(NeedKind::Sleep));
        let c = tw.world.expect_citizen(id);
        assert_eq!(c.state_info.activity, Activity::Need(NeedKind::Sleep));
        let top = c.top_state().unwrap();
        assert_eq!(top.name(), "sleep");
        assert!(top.has_tag(FrameTag::Need(NeedKind::Sleep)));
    }

    #[test]
    fn lower_needs_wait_while_a_higher_one_is_handled() {
        let mut tw = TestWorld::new();
        let id = tw.citizen("Ada", Position::new(100.0, 100.0));
        tw.world.expect_citizen_mut(id).energy_per_cent = 0.05;
        evaluate_needs(&mut tw.world, id);
        tw.world.expect_citizen_mut(id).happiness = -0.9;
        assert_eq!(evaluate_needs(&mut tw.world, id), None);
        assert_eq!(tw.world.expect_citizen(id).top_state().unwrap().name(), "sleep");
    }

    #[test]
    fn starving_without_money_switches_to_gathering() {
        let mut tw = TestWorld::new();
        let id = tw.citizen("Ada", Position::new(100.0, 100.0));
        let c = tw.world.expect_citizen_mut(id);
        c.food_per_cent = 0.1;
        c.money = 0;
        assert_eq!(evaluate_needs(&mut tw.world, id), Some(NeedKind::Starving));
        let c = tw.world.expect_citizen(id);
        assert_eq!(c.job.kind(), JobKind::FoodGatherer);
        assert_eq!(c.top_state().unwrap().name(), "gather_mushrooms");
    }

    #[test]
    fn starving_with_money_buys_from_a_stocked_market() {
        let mut tw = TestWorld::new();
        let merchant = tw.citizen("Mo", Position::new(300.0, 300.0));
        let market = tw.building(BuildingKind::FoodMarket, merchant, Position::new(300.0, 300.0));
        tw.world
            .map
            .building_mut(market)
            .unwrap()
            .inventory
            .put_item_into(ItemName::Mushroom, 10, Vec::new());
        let id = tw.citizen("Ada", Position::new(100.0, 100.0));
        let c = tw.world.expect_citizen_mut(id);
        c.food_per_cent = 0.1;
        c.money = 100;
        assert_eq!(evaluate_needs(&mut tw.world, id), Some(NeedKind::Starving));
        let top = tw.world.expect_citizen(id).top_state().unwrap();
        assert_eq!(top.name(), "market_trade_item_with");
        assert!(top.has_tag(FrameTag::Trade));
    }

    #[test]
    fn homeless_citizen_claims_a_home() {
        let mut tw = TestWorld::new();
        let id = tw.citizen("Ada", Position::new(100.0, 100.0));
        tw.world.expect_citizen_mut(id).home = None;
        assert_eq!(evaluate_needs(&mut tw.world, id), Some(NeedKind::Home));
        assert_eq!(tw.world.expect_citizen(id).top_state().unwrap().name(), "claim_home");
    }

    #[test]
    fn satisfied_citizen_records_time_and_cools_down() {
        let mut tw = TestWorld::new();
        let id = tw.citizen("Ada", Position::new(100.0, 100.0));
        let house = tw.building(BuildingKind::House, id, Position::new(140.0, 100.0));
        tw.world.expect_citizen_mut(id).home = Some(house);
        tw.world.time = 1_000;
        assert_eq!(evaluate_needs(&mut tw.world, id), None);
        assert_eq!(tw.world.expect_citizen(id).last_needs_satisfied, Some(1_000));

        tw.world.expect_citizen_mut(id).energy_per_cent = 0.0;
        tw.world.time += 1;
        assert_eq!(evaluate_needs(&mut tw.world, id), None);
        tw.world.time += tw.world.config.needs.check_cooldown_ms;
        assert_eq!(evaluate_needs(&mut tw.world, id), Some(NeedKind::Sleep));
    }

    #[test]
    fn backing_off_need_still_blocks_lower_ones() {
        let mut tw = TestWorld::new();
        let id = tw.citizen("Ada", Position::new(100.0, 100.0));
        tw.citizen("Bo", Position::new(120.0, 100.0));
        tw.world.time = 1_000;
        let c = tw.world.expect_citizen_mut(id);
        c.food_per_cent = 0.3;
        c.home = None;
        c.happiness = -0.9;
        c.need_failed_at.insert(NeedKind::Food, 1_000);

        assert_eq!(evaluate_needs(&mut tw.world, id), None);
        assert!(tw.world.expect_citizen(id).state_info.stack.is_empty());

        tw.world.time += tw.world.config.needs.failure_backoff_ms;
        assert_eq!(evaluate_needs(&mut tw.world, id), Some(NeedKind::Food));
    }

    #[test]
    fn lonely_citizen_talks_to_the_nearest_awake_neighbour() {
        let mut tw = TestWorld::new();
        let id = tw.citizen("Ada", Position::new(100.0, 100.0));
        let house = tw.building(BuildingKind::House, id, Position::new(140.0, 100.0));
        tw.world.expect_citizen_mut(id).home = Some(house);
        let near = tw.citizen("Bo", Position::new(120.0, 100.0));
        tw.citizen("Cy", Position::new(400.0, 100.0));
        tw.world.expect_citizen_mut(id).happiness = -0.5;
        assert_eq!(evaluate_needs(&mut tw.world, id), Some(NeedKind::Happiness));
        let top = tw.world.expect_citizen(id).top_state().unwrap();
        match &top.task {
            Task::ChatWith(chat) => assert_eq!(chat.partner, near),
            other => panic!("expected chat, got {}", other.name()),
        }
    }
}
