//! Jobs decide what a citizen does once nothing more urgent is on its stack.
//!
//! Each job is a small state machine: `next_task` looks at the world,
//! records the phase it is entering and hands back the frame for it.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::id::{BuildingId, CitizenId};
use crate::map::TileObjectKind;
use crate::model::{BuildingKind, Citizen, ItemName, World};
use crate::sim::helpers::{find_market, owned_market, wander_target};
use crate::sim::market::{MarketServe, MarketTradeItemWith};
use crate::sim::state_stack::{CitizenState, FrameTag};
use crate::sim::tasks::{
    BuildBuilding, CutLogsIntoPlanks, CutTree, GatherMushrooms, MoveTo, PlaceFarmTile,
    RepairBuilding, TendFarmTile, Wait,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum JobKind {
    FoodGatherer,
    FoodMarket,
    Lumberjack,
    Farmer,
    Builder,
    WoodMarket,
}

string_enum!(JobKind {
    FoodGatherer => "food_gatherer",
    FoodMarket => "food_market",
    Lumberjack => "lumberjack",
    Farmer => "farmer",
    Builder => "builder",
    WoodMarket => "wood_market",
});

impl JobKind {
    /// The market building a merchant job runs.
    pub fn market_kind(&self) -> Option<BuildingKind> {
        match self {
            JobKind::FoodMarket => Some(BuildingKind::FoodMarket),
            JobKind::WoodMarket => Some(BuildingKind::WoodMarket),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GathererPhase {
    DecideNext,
    Gathering,
    Selling,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LumberjackPhase {
    DecideNext,
    SearchingTree,
    CutTreeLogIntoPlanks,
    Selling,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FarmerPhase {
    DecideNext,
    PlacingField,
    Tending,
    Selling,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuilderPhase {
    DecideNext,
    Constructing,
    Repairing,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MerchantPhase {
    DecideNext,
    BuildingMarket,
    Serving,
}

/// A citizen's job with its job-local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "phase", rename_all = "snake_case")]
pub enum Job {
    FoodGatherer(GathererPhase),
    FoodMarket(MerchantPhase),
    Lumberjack(LumberjackPhase),
    Farmer(FarmerPhase),
    Builder(BuilderPhase),
    WoodMarket(MerchantPhase),
}

impl Job {
    pub fn new(kind: JobKind) -> Self {
        match kind {
            JobKind::FoodGatherer => Job::FoodGatherer(GathererPhase::DecideNext),
            JobKind::FoodMarket => Job::FoodMarket(MerchantPhase::DecideNext),
            JobKind::Lumberjack => Job::Lumberjack(LumberjackPhase::DecideNext),
            JobKind::Farmer => Job::Farmer(FarmerPhase::DecideNext),
            JobKind::Builder => Job::Builder(BuilderPhase::DecideNext),
            JobKind::WoodMarket => Job::WoodMarket(MerchantPhase::DecideNext),
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            Job::FoodGatherer(_) => JobKind::FoodGatherer,
            Job::FoodMarket(_) => JobKind::FoodMarket,
            Job::Lumberjack(_) => JobKind::Lumberjack,
            Job::Farmer(_) => JobKind::Farmer,
            Job::Builder(_) => JobKind::Builder,
            Job::WoodMarket(_) => JobKind::WoodMarket,
        }
    }
}

/// Replace the citizen's job and say why.
pub fn change_job(citizen: &mut Citizen, kind: JobKind, reason: &str, now: u64) {
    let from = citizen.job.kind();
    citizen.job = Job::new(kind);
    citizen.think(now, format!("{reason} I'll work as {kind} now."));
    tracing::info!(citizen = %citizen.name, %from, to = %kind, reason, "job changed");
}

/// Pick a job for a newcomer: an open merchant role first, otherwise random.
pub fn pick_job(world: &World, rng: &mut dyn RngCore) -> JobKind {
    for kind in [JobKind::FoodMarket, JobKind::WoodMarket] {
        let taken = world.living_citizens().any(|c| c.job.kind() == kind);
        if !taken {
            return kind;
        }
    }
    let workers = [
        JobKind::FoodGatherer,
        JobKind::Lumberjack,
        JobKind::Farmer,
        JobKind::Builder,
    ];
    workers[rng.random_range(0..workers.len())]
}

/// The frame `id`'s job wants to run next. Called when the stack is empty.
///
/// # Panics
/// Panics if `id` is not in the world.
pub fn next_task(world: &mut World, id: CitizenId, rng: &mut dyn RngCore) -> CitizenState {
    let job = world.expect_citizen(id).job;
    let (job, state) = match job {
        Job::FoodGatherer(_) => {
            let (phase, state) = food_gatherer(world, id);
            (Job::FoodGatherer(phase), state)
        }
        Job::Lumberjack(_) => {
            let (phase, state) = lumberjack(world, id);
            (Job::Lumberjack(phase), state)
        }
        Job::Farmer(_) => {
            let (phase, state) = farmer(world, id);
            (Job::Farmer(phase), state)
        }
        Job::Builder(_) => {
            let (phase, state) = builder(world, id);
            (Job::Builder(phase), state)
        }
        Job::FoodMarket(_) => {
            let (phase, state) = merchant(world, id, BuildingKind::FoodMarket);
            (Job::FoodMarket(phase), Some(state))
        }
        Job::WoodMarket(_) => {
            let (phase, state) = merchant(world, id, BuildingKind::WoodMarket);
            (Job::WoodMarket(phase), Some(state))
        }
    };
    let state = state.unwrap_or_else(|| idle(world, id, rng));
    let citizen = world.expect_citizen_mut(id);
    citizen.job = job;
    tracing::trace!(citizen = %citizen.name, ?job, task = state.name(), "job picked next task");
    state.tagged(FrameTag::Work)
}

/// Sell `item` once at least the threshold is held and a market takes it.
fn sell_if_stocked(world: &World, id: CitizenId, item: ItemName) -> Option<CitizenState> {
    let citizen = world.expect_citizen(id);
    let held = citizen.inventory.get_amount(item);
    if held < world.config.jobs.sell_threshold {
        return None;
    }
    let market = find_market(world, &citizen.position, item, Some(id))?;
    Some(MarketTradeItemWith::sell(market, item, held).into_state(world.time))
}

fn has_room_for(world: &World, id: CitizenId, item: ItemName) -> bool {
    world.expect_citizen(id).inventory.available_capacity(item) > 0
}

// --- Workers ---

fn food_gatherer(world: &World, id: CitizenId) -> (GathererPhase, Option<CitizenState>) {
    if let Some(sell) = sell_if_stocked(world, id, ItemName::Mushroom) {
        return (GathererPhase::Selling, Some(sell));
    }
    if !has_room_for(world, id, ItemName::Mushroom) {
        return (GathererPhase::Idle, None);
    }
    let batch = world.config.jobs.gather_batch;
    let state = CitizenState::new(GatherMushrooms::new(batch), world.time);
    (GathererPhase::Gathering, Some(state))
}

fn lumberjack(world: &World, id: CitizenId) -> (LumberjackPhase, Option<CitizenState>) {
    let now = world.time;
    let citizen = world.expect_citizen(id);
    if citizen.inventory.get_amount(ItemName::TreeLog) > 0
        && has_room_for(world, id, ItemName::Wood)
    {
        let state = CitizenState::new(CutLogsIntoPlanks::default(), now);
        return (LumberjackPhase::CutTreeLogIntoPlanks, Some(state));
    }
    if let Some(sell) = sell_if_stocked(world, id, ItemName::Wood) {
        return (LumberjackPhase::Selling, Some(sell));
    }
    if !has_room_for(world, id, ItemName::TreeLog) {
        return (LumberjackPhase::Idle, None);
    }
    (LumberjackPhase::SearchingTree, Some(CitizenState::new(CutTree::default(), now)))
}

fn farmer(world: &World, id: CitizenId) -> (FarmerPhase, Option<CitizenState>) {
    let now = world.time;
    let fields: Vec<_> = world
        .map
        .objects_of_kind(TileObjectKind::FarmTile)
        .filter_map(|o| o.as_farm_tile().filter(|f| f.owner == id).map(|f| (o.id, f)))
        .collect();
    let workable = fields
        .iter()
        .find(|(_, f)| f.crop.is_none() || f.is_ripe())
        .map(|(tile, _)| *tile);
    if let Some(tile) = workable {
        if has_room_for(world, id, ItemName::Wheat) {
            let state = CitizenState::new(TendFarmTile::new(tile), now);
            return (FarmerPhase::Tending, Some(state));
        }
    }
    if let Some(sell) = sell_if_stocked(world, id, ItemName::Wheat) {
        return (FarmerPhase::Selling, Some(sell));
    }
    if fields.len() < world.config.jobs.farm_tiles {
        let state = CitizenState::new(PlaceFarmTile::default(), now);
        return (FarmerPhase::PlacingField, Some(state));
    }
    (FarmerPhase::Idle, None)
}

fn builder(world: &World, id: CitizenId) -> (BuilderPhase, Option<CitizenState>) {
    let now = world.time;
    let from = world.expect_citizen(id).position;
    let site = world.map.find_nearest(
        &from,
        TileObjectKind::Building,
        world.config.citizen.max_search_radius,
        |o| {
            o.as_building()
                .is_some_and(|b| !b.is_built() && b.is_usable() && world.is_alive(b.owner))
        },
    );
    if let Some((site, kind)) = site.and_then(|o| o.as_building().map(|b| (o.id, b.kind))) {
        let state = CitizenState::new(BuildBuilding::resume(kind, site), now);
        return (BuilderPhase::Constructing, Some(state));
    }

    let threshold = world.config.needs.home_repair_threshold;
    let worn = world.map.find_nearest(
        &from,
        TileObjectKind::Building,
        world.config.citizen.max_search_radius,
        |o| {
            o.as_building()
                .is_some_and(|b| b.is_built() && b.deterioration >= threshold)
        },
    );
    if let Some(worn) = worn {
        let state = CitizenState::new(RepairBuilding::new(worn.id), now);
        return (BuilderPhase::Repairing, Some(state));
    }
    (BuilderPhase::Idle, None)
}

fn merchant(world: &World, id: CitizenId, kind: BuildingKind) -> (MerchantPhase, CitizenState) {
    let now = world.time;
    let market: Option<BuildingId> = owned_market(world, id, kind);
    match market {
        Some(market) if world.map.building(market).is_some_and(|b| b.is_built()) => (
            MerchantPhase::Serving,
            MarketServe::new(market).into_state(now),
        ),
        Some(site) => (
            MerchantPhase::BuildingMarket,
            CitizenState::new(BuildBuilding::resume(kind, site), now),
        ),
        None => (
            MerchantPhase::BuildingMarket,
            CitizenState::new(BuildBuilding::new(kind), now),
        ),
    }
}

/// Nothing useful to do: stroll a little or stand around.
fn idle(world: &World, id: CitizenId, rng: &mut dyn RngCore) -> CitizenState {
    let now = world.time;
    if rng.random_bool(0.5) {
        let from = world.expect_citizen(id).position;
        let target = wander_target(&world.map, &from, world.config.jobs.wander_distance, rng);
        CitizenState::new(MoveTo { target, range: 1.0 }, now)
    } else {
        CitizenState::new(
            Wait {
                until: now + world.config.jobs.idle_wait_ms,
            },
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::model::Position;
    use crate::testutil::TestWorld;

    fn with_job(tw: &mut TestWorld, name: &str, kind: JobKind) -> CitizenId {
        let id = tw.citizen(name, Position::new(200.0, 200.0));
        tw.world.expect_citizen_mut(id).job = Job::new(kind);
        id
    }

    #[test]
    fn change_job_logs_reason() {
        let mut tw = TestWorld::new();
        let id = with_job(&mut tw, "Ada", JobKind::Builder);
        let c = tw.world.expect_citizen_mut(id);
        change_job(c, JobKind::Farmer, "Fields need hands.", 5);
        assert_eq!(c.job, Job::Farmer(FarmerPhase::DecideNext));
        assert!(c.log.last().unwrap().message.contains("farmer"));
        assert!(c.state_info.thought.is_some());
    }

    #[test]
    fn newcomers_fill_missing_markets_first() {
        let mut tw = TestWorld::new();
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(pick_job(&tw.world, &mut rng), JobKind::FoodMarket);
        with_job(&mut tw, "Mo", JobKind::FoodMarket);
        assert_eq!(pick_job(&tw.world, &mut rng), JobKind::WoodMarket);
        with_job(&mut tw, "Wo", JobKind::WoodMarket);
        let kind = pick_job(&tw.world, &mut rng);
        assert!(kind.market_kind().is_none());
    }

    #[test]
    fn lumberjack_planks_logs_before_cutting_more() {
        let mut tw = TestWorld::new();
        let id = with_job(&mut tw, "Lu", JobKind::Lumberjack);
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(next_task(&mut tw.world, id, &mut rng).name(), "cut_tree");
        assert_eq!(tw.world.expect_citizen(id).job, Job::Lumberjack(LumberjackPhase::SearchingTree));
        tw.give(id, ItemName::TreeLog, 1);
        let state = next_task(&mut tw.world, id, &mut rng);
        assert_eq!(state.name(), "cut_logs_into_planks");
        assert!(state.has_tag(FrameTag::Work));
    }

    #[test]
    fn gatherer_sells_when_stocked_and_a_market_exists() {
        let mut tw = TestWorld::new();
        let mut rng = SmallRng::seed_from_u64(1);
        let merchant = tw.citizen("Mo", Position::new(300.0, 300.0));
        tw.building(BuildingKind::FoodMarket, merchant, Position::new(300.0, 300.0));
        let id = with_job(&mut tw, "Ga", JobKind::FoodGatherer);
        assert_eq!(next_task(&mut tw.world, id, &mut rng).name(), "gather_mushrooms");
        let threshold = tw.world.config.jobs.sell_threshold;
        tw.give(id, ItemName::Mushroom, threshold);
        let state = next_task(&mut tw.world, id, &mut rng);
        assert_eq!(state.name(), "market_trade_item_with");
        assert_eq!(tw.world.expect_citizen(id).job, Job::FoodGatherer(GathererPhase::Selling));
    }

    #[test]
    fn merchant_builds_then_serves() {
        let mut tw = TestWorld::new();
        let mut rng = SmallRng::seed_from_u64(1);
        let id = with_job(&mut tw, "Mo", JobKind::WoodMarket);
        assert_eq!(next_task(&mut tw.world, id, &mut rng).name(), "build_building");
        tw.building(BuildingKind::WoodMarket, id, Position::new(260.0, 200.0));
        let state = next_task(&mut tw.world, id, &mut rng);
        assert_eq!(state.name(), "market_serve");
        assert!(state.has_tag(FrameTag::Trade));
    }

    #[test]
    fn builder_helps_unfinished_sites() {
        let mut tw = TestWorld::new();
        let mut rng = SmallRng::seed_from_u64(1);
        let owner = tw.citizen("Ow", Position::new(100.0, 100.0));
        let house = tw.building(BuildingKind::House, owner, Position::new(100.0, 100.0));
        tw.world.map.building_mut(house).unwrap().build_progress = Some(0.2);
        let id = with_job(&mut tw, "Bu", JobKind::Builder);
        assert_eq!(next_task(&mut tw.world, id, &mut rng).name(), "build_building");
        assert_eq!(tw.world.expect_citizen(id).job, Job::Builder(BuilderPhase::Constructing));
    }

    #[test]
    fn idle_farmer_with_full_fields_wanders_or_waits() {
        let mut tw = TestWorld::new();
        let mut rng = SmallRng::seed_from_u64(1);
        tw.world.config.jobs.farm_tiles = 0;
        let id = with_job(&mut tw, "Fa", JobKind::Farmer);
        let name = next_task(&mut tw.world, id, &mut rng).name();
        assert!(name == "move_to" || name == "wait");
        assert_eq!(tw.world.expect_citizen(id).job, Job::Farmer(FarmerPhase::Idle));
    }
}
