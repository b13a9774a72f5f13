use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::config::SimConfig;
use crate::id::{BuildingId, CitizenId, ObjectId};
use crate::map::{FarmTile, TileObjectData, Tree};
use crate::model::traits::CitizenTrait;
use crate::model::{Building, BuildingKind, Citizen, ItemName, Position, World};
use crate::sim::jobs::{Job, JobKind};
use crate::sim::{Simulation, default_systems};

// -- Builder-style ref types --

/// Typed reference to a citizen in a [`Scenario`], enabling chained field mutation.
///
/// Created by [`Scenario::citizen`] (creation) or [`Scenario::citizen_mut`] (mutation).
/// Call [`.id()`](CitizenRef::id) to terminate the chain and extract the citizen ID.
pub struct CitizenRef<'a> {
    scenario: &'a mut Scenario,
    id: CitizenId,
}

impl<'a> CitizenRef<'a> {
    fn citizen_mut(&mut self) -> &mut Citizen {
        self.scenario.world.expect_citizen_mut(self.id)
    }

    pub fn job(mut self, kind: JobKind) -> Self { self.citizen_mut().job = Job::new(kind); self }
    pub fn food(mut self, v: f64) -> Self { self.citizen_mut().food_per_cent = v; self }
    pub fn energy(mut self, v: f64) -> Self { self.citizen_mut().energy_per_cent = v; self }
    pub fn happiness(mut self, v: f64) -> Self { self.citizen_mut().happiness = v; self }
    pub fn money(mut self, v: u32) -> Self { self.citizen_mut().money = v; self }
    pub fn home(mut self, v: Option<BuildingId>) -> Self { self.citizen_mut().home = v; self }
    pub fn traits(mut self, v: &[CitizenTrait]) -> Self { self.citizen_mut().traits = v.to_vec(); self }

    /// Put items into the citizen's inventory.
    ///
    /// # Panics
    /// Panics if they do not all fit.
    pub fn item(mut self, item: ItemName, amount: u32) -> Self {
        let put = self
            .citizen_mut()
            .inventory
            .put_item_into(item, amount as i32, Vec::new());
        assert_eq!(put, amount, "scenario: inventory cannot hold {amount} {item}");
        self
    }

    /// Escape hatch: apply an arbitrary closure to the citizen.
    pub fn with(mut self, f: impl FnOnce(&mut Citizen)) -> Self { f(self.citizen_mut()); self }

    /// Terminate the chain and return the citizen ID.
    pub fn id(self) -> CitizenId { self.id }
}

/// Fluent builder for constructing World state.
///
/// Starts from an empty map (no upkeep-spawned trees or mushrooms) so tests
/// control exactly what exists; set `min_trees`/`max_mushrooms` on the config
/// to let the map system restock.
pub struct Scenario {
    world: World,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario {
    /// A scenario with default config and map upkeep switched off.
    pub fn new() -> Self {
        let mut config = SimConfig::default();
        config.map.min_trees = 0;
        config.map.max_mushrooms = 0;
        Self::with_config(config)
    }

    pub fn with_config(config: SimConfig) -> Self {
        Self {
            world: World::new(config),
        }
    }

    /// Change the config before anything runs.
    pub fn configure(mut self, f: impl FnOnce(&mut SimConfig)) -> Self {
        f(&mut self.world.config);
        self
    }

    // -- Citizen creation --

    /// Add a healthy, homeless food gatherer.
    pub fn add_citizen(&mut self, name: &str, position: Position) -> CitizenId {
        let id = self.world.id_gen.next_citizen();
        let citizen = Citizen::new(
            id,
            name,
            position,
            Job::new(JobKind::FoodGatherer),
            &self.world.config,
            self.world.time,
        );
        self.world.citizens.insert(id, citizen);
        id
    }

    /// Add a citizen and return a builder ref for chaining field mutations.
    pub fn citizen(&mut self, name: &str, position: Position) -> CitizenRef<'_> {
        let id = self.add_citizen(name, position);
        CitizenRef { scenario: self, id }
    }

    /// Return a builder ref for an existing citizen.
    pub fn citizen_mut(&mut self, id: CitizenId) -> CitizenRef<'_> {
        assert!(self.world.citizen(id).is_some(), "{id} is not a citizen");
        CitizenRef { scenario: self, id }
    }

    // -- Map objects --

    /// Place an object exactly at `position`.
    ///
    /// # Panics
    /// Panics if the tile is taken.
    fn place(&mut self, data: TileObjectData, position: Position) -> ObjectId {
        self.world
            .map
            .add_object_at(data, &position)
            .unwrap_or_else(|| panic!("scenario: tile at {position:?} is taken"))
    }

    /// Add a grown tree.
    pub fn add_tree(&mut self, position: Position) -> ObjectId {
        self.place(TileObjectData::Tree(Tree { growth: 1.0 }), position)
    }

    /// Add a sapling that grows through the map's deferred queue.
    pub fn add_sapling(&mut self, position: Position) -> ObjectId {
        let id = self.place(TileObjectData::Tree(Tree { growth: 0.0 }), position);
        let due = self.world.time + self.world.config.map.tree_growth_interval_ms;
        self.world.map.schedule(id, due);
        id
    }

    pub fn add_mushroom(&mut self, position: Position) -> ObjectId {
        self.place(TileObjectData::Mushroom, position)
    }

    pub fn add_farm_tile(&mut self, owner: CitizenId, position: Position) -> ObjectId {
        self.place(TileObjectData::FarmTile(FarmTile { owner, crop: None }), position)
    }

    /// Add a finished building that starts deteriorating on the usual schedule.
    pub fn add_building(&mut self, kind: BuildingKind, owner: CitizenId, position: Position) -> BuildingId {
        self.add_building_with(kind, owner, position, |_| {})
    }

    /// Add a finished building, customizing it via closure.
    pub fn add_building_with(
        &mut self,
        kind: BuildingKind,
        owner: CitizenId,
        position: Position,
        modify: impl FnOnce(&mut Building),
    ) -> BuildingId {
        let mut building = Building::new_construction(kind, owner, &self.world.config);
        building.build_progress = None;
        modify(&mut building);
        let id = self.place(TileObjectData::Building(building), position);
        let due = self.world.time + self.world.config.map.deterioration_interval_ms;
        self.world.map.schedule(id, due);
        id
    }

    /// Add a house and move `owner` in.
    pub fn add_home(&mut self, owner: CitizenId, position: Position) -> BuildingId {
        let house = self.add_building_with(BuildingKind::House, owner, position, |b| {
            b.inhabited_by = Some(owner);
        });
        self.world.expect_citizen_mut(owner).home = Some(house);
        house
    }

    // -- Output --

    /// Consume the scenario and return the constructed World.
    pub fn build(self) -> World {
        self.world
    }

    /// Build the world and run the default systems for `ticks` ticks.
    pub fn run(self, ticks: u64, seed: u64) -> World {
        let mut sim = self.into_simulation(seed);
        sim.run(ticks);
        sim.world
    }

    /// Build a simulation with the default systems without running it.
    pub fn into_simulation(self, seed: u64) -> Simulation {
        Simulation::with_systems(self.world, default_systems(), SmallRng::seed_from_u64(seed))
    }

    /// Borrow the world for inspection.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Borrow the world mutably for additional modifications.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}
