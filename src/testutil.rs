use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::config::SimConfig;
use crate::id::{BuildingId, CitizenId};
use crate::map::TileObjectData;
use crate::model::{Building, BuildingKind, Citizen, DeathReason, ItemName, Position, World};
use crate::sim::jobs::{Job, JobKind};
use crate::sim::mortality;
use crate::sim::state_stack::{CitizenState, TaskStep, apply_step, push_state};
use crate::sim::tasks::tick_frame;
use crate::sim::{Signal, SignalKind, SimSystem, TickContext};

// ---------------------------------------------------------------------------
// Tick execution helpers
// ---------------------------------------------------------------------------

/// Run a single system tick at the world's current time. Returns emitted signals.
pub fn tick_system(world: &mut World, system: &mut dyn SimSystem, seed: u64) -> Vec<Signal> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut signals = Vec::new();
    let mut ctx = TickContext {
        world,
        rng: &mut rng,
        signals: &mut signals,
        inbox: &[],
    };
    system.tick(&mut ctx);
    signals
}

/// Run a system's handle_signals with the given inbox. Returns newly emitted signals.
pub fn deliver_signals(
    world: &mut World,
    system: &mut dyn SimSystem,
    inbox: &[Signal],
    seed: u64,
) -> Vec<Signal> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut signals = Vec::new();
    let mut ctx = TickContext {
        world,
        rng: &mut rng,
        signals: &mut signals,
        inbox,
    };
    system.handle_signals(&mut ctx);
    signals
}

/// Run a full tick + handle_signals cycle for a single system. Returns all signals.
pub fn full_tick(world: &mut World, system: &mut dyn SimSystem, seed: u64) -> Vec<Signal> {
    let tick_signals = tick_system(world, system, seed);
    if tick_signals.is_empty() {
        return tick_signals;
    }
    let reaction_signals = deliver_signals(world, system, &tick_signals, seed);
    let mut all = tick_signals;
    all.extend(reaction_signals);
    all
}

// ---------------------------------------------------------------------------
// Construction helpers
// ---------------------------------------------------------------------------

/// A healthy food gatherer with default config and no traits.
pub fn test_citizen(id: u64, name: &str, position: Position) -> Citizen {
    Citizen::new(
        CitizenId(id),
        name,
        position,
        Job::new(JobKind::FoodGatherer),
        &SimConfig::default(),
        0,
    )
}

/// A bare world (no trees or mushrooms) plus the RNG frames are ticked with.
pub struct TestWorld {
    pub world: World,
    pub rng: SmallRng,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    pub fn with_config(config: SimConfig) -> Self {
        let rng = SmallRng::seed_from_u64(config.seed);
        Self {
            world: World::new(config),
            rng,
        }
    }

    /// Add a citizen with full vitals and no traits.
    pub fn citizen(&mut self, name: &str, position: Position) -> CitizenId {
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

    /// Put `amount` of `item` into the citizen's inventory.
    ///
    /// # Panics
    /// Panics if it does not all fit.
    pub fn give(&mut self, id: CitizenId, item: ItemName, amount: u32) {
        let put = self
            .world
            .expect_citizen_mut(id)
            .inventory
            .put_item_into(item, amount as i32, Vec::new());
        assert_eq!(put, amount, "give: inventory full");
    }

    /// Place a finished building exactly at `position`.
    ///
    /// # Panics
    /// Panics if the tile is taken.
    pub fn building(&mut self, kind: BuildingKind, owner: CitizenId, position: Position) -> BuildingId {
        let mut building = Building::new_construction(kind, owner, &self.world.config);
        building.build_progress = None;
        self.world
            .map
            .add_object_at(TileObjectData::Building(building), &position)
            .unwrap_or_else(|| panic!("building: tile at {position:?} is taken"))
    }

    pub fn kill(&mut self, id: CitizenId) {
        mortality::kill(&mut self.world, id, DeathReason::Starved);
    }

    /// Tick `frame` once for `id` without touching its stack.
    pub fn tick_frame(&mut self, id: CitizenId, frame: &mut CitizenState) -> TaskStep {
        let mut signals = Vec::new();
        let mut ctx = TickContext {
            world: &mut self.world,
            rng: &mut self.rng,
            signals: &mut signals,
            inbox: &[],
        };
        tick_frame(&mut ctx, id, frame)
    }

    /// Tick `frame` until it stops running, moving the citizen and advancing
    /// time between ticks. Returns `Running` if `max_ticks` ran out.
    pub fn run_frame(&mut self, id: CitizenId, frame: &mut CitizenState, max_ticks: usize) -> TaskStep {
        for _ in 0..max_ticks {
            let step = self.tick_frame(id, frame);
            self.move_citizen(id);
            self.advance();
            if step != TaskStep::Running {
                return step;
            }
        }
        TaskStep::Running
    }

    /// Run two frames side by side, each with its own child stack, until
    /// `frame_a` settles. `frame_b` stops being ticked once it settles.
    pub fn run_pair(
        &mut self,
        a: CitizenId,
        frame_a: &mut CitizenState,
        b: CitizenId,
        frame_b: &mut CitizenState,
        max_ticks: usize,
    ) -> TaskStep {
        let mut b_running = true;
        for _ in 0..max_ticks {
            let step_a = self.drive(a, frame_a);
            if b_running {
                b_running = self.drive(b, frame_b) == TaskStep::Running;
            }
            self.move_citizen(a);
            self.move_citizen(b);
            self.advance();
            if step_a != TaskStep::Running {
                return step_a;
            }
        }
        TaskStep::Running
    }

    /// One tick of `frame` including any children it pushed onto the
    /// citizen's stack. Children run first; the last child's outcome is
    /// handed to `frame`.
    fn drive(&mut self, id: CitizenId, frame: &mut CitizenState) -> TaskStep {
        let top = self
            .world
            .citizen_mut(id)
            .and_then(|c| c.state_info.stack.pop());
        let Some(mut top) = top else {
            return match self.tick_frame(id, frame) {
                TaskStep::Push(child) => {
                    push_state(self.world.expect_citizen_mut(id), child);
                    TaskStep::Running
                }
                step => step,
            };
        };
        let step = self.tick_frame(id, &mut top);
        let citizen = self.world.expect_citizen_mut(id);
        if citizen.state_info.stack.is_empty() {
            match step {
                TaskStep::Success(data) => {
                    frame.meta.returned_data = data;
                    frame.meta.previous_task_failed = false;
                    return TaskStep::Running;
                }
                TaskStep::Failed => {
                    frame.meta.returned_data = None;
                    frame.meta.previous_task_failed = true;
                    return TaskStep::Running;
                }
                _ => {}
            }
        }
        apply_step(citizen, top, step);
        TaskStep::Running
    }

    fn move_citizen(&mut self, id: CitizenId) {
        if let Some(citizen) = self.world.citizen_mut(id) {
            if let Some(target) = citizen.move_to {
                let speed = citizen.speed;
                if citizen.position.step_toward(&target, speed) {
                    citizen.move_to = None;
                }
            }
        }
    }

    fn advance(&mut self) {
        self.world.time += self.world.config.tick_ms;
    }
}

// ---------------------------------------------------------------------------
// Signal helpers
// ---------------------------------------------------------------------------

/// Check if any signal matches the predicate.
pub fn has_signal(signals: &[Signal], predicate: impl Fn(&SignalKind) -> bool) -> bool {
    signals.iter().any(|s| predicate(&s.kind))
}

/// Count signals matching the predicate.
pub fn count_signals(signals: &[Signal], predicate: impl Fn(&SignalKind) -> bool) -> usize {
    signals.iter().filter(|s| predicate(&s.kind)).count()
}

// ---------------------------------------------------------------------------
// Assertion helpers
// ---------------------------------------------------------------------------

/// Assert a float is approximately equal, with a named context message.
pub fn assert_approx(actual: f64, expected: f64, tolerance: f64, msg: &str) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "{msg}: expected ~{expected} (+-{tolerance}), got {actual}"
    );
}

/// Assert two worlds produced from the same seed are identical in the parts
/// a run changes: time, citizens and map contents.
pub fn assert_deterministic(world1: &World, world2: &World) {
    assert_eq!(world1.time, world2.time, "time mismatch");
    assert_eq!(
        world1.citizens.len(),
        world2.citizens.len(),
        "citizen count mismatch: {} vs {}",
        world1.citizens.len(),
        world2.citizens.len()
    );
    for (id, c1) in &world1.citizens {
        let c2 = world2
            .citizens
            .get(id)
            .unwrap_or_else(|| panic!("assert_deterministic: {id} missing from second run"));
        assert_eq!(c1, c2, "citizen {} diverged", c1.name);
    }
    let objects = |world: &World| -> Vec<(u64, String)> {
        world
            .map
            .chunks()
            .flat_map(|chunk| chunk.tile_objects.values().flatten())
            .map(|o| (o.id.0, format!("{:?}", o.data)))
            .collect()
    };
    assert_eq!(objects(world1), objects(world2), "map contents diverged");
}

/// Assert that a citizen exists and is alive.
pub fn assert_alive(world: &World, id: CitizenId) {
    let citizen = world
        .citizen(id)
        .unwrap_or_else(|| panic!("assert_alive: {id} not found"));
    assert!(
        citizen.is_alive(),
        "assert_alive: {id} ({}) is dead ({:?})",
        citizen.name,
        citizen.death
    );
}
