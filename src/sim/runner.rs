use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

use super::citizens::CitizenSystem;
use super::commands::handle_chat_message;
use super::context::TickContext;
use super::lifecycle;
use super::map_system::MapSystem;
use super::mortality::MortalitySystem;
use super::system::SimSystem;
use crate::config::SimConfig;
use crate::error::Result;
use crate::id::CitizenId;
use crate::model::World;

/// Advance `world.time` by one tick and run every system.
///
/// Signal delivery is **single-pass, non-cascading**:
///
/// 1. **Phase 1 (tick):** Each system's `tick()` runs in registration order.
///    All signals emitted during this phase are collected into a shared buffer.
/// 2. **Phase 2 (react):** If any signals were emitted, each system's
///    `handle_signals()` is called with the full signal buffer as `ctx.inbox`.
///    Signals pushed during this phase are discarded at the end of the cycle.
///
/// A reaction that needs to propagate further mutates world state that the
/// next tick's Phase 1 observes.
pub fn dispatch_systems(
    world: &mut World,
    systems: &mut [Box<dyn SimSystem>],
    rng: &mut dyn RngCore,
) {
    world.time += world.config.tick_ms;

    // Phase 1: tick systems, collecting signals
    let mut signals = Vec::new();
    for system in systems.iter_mut() {
        let mut ctx = TickContext {
            world,
            rng,
            signals: &mut signals,
            inbox: &[],
        };
        system.tick(&mut ctx);
    }

    // Phase 2: deliver signals for reaction (only if any were emitted)
    if !signals.is_empty() {
        for system in systems.iter_mut() {
            let mut new_signals = Vec::new();
            let mut ctx = TickContext {
                world,
                rng,
                signals: &mut new_signals,
                inbox: &signals,
            };
            system.handle_signals(&mut ctx);
        }
    }
}

/// Map upkeep, then citizens, then mortality.
pub fn default_systems() -> Vec<Box<dyn SimSystem>> {
    vec![
        Box::new(MapSystem::new()),
        Box::new(CitizenSystem::new()),
        Box::new(MortalitySystem::new()),
    ]
}

/// A world, its systems and the RNG that drives them.
///
/// The RNG is seeded from `config.seed`, so the same seed and the same
/// sequence of calls always produce the same run.
pub struct Simulation {
    pub world: World,
    pub systems: Vec<Box<dyn SimSystem>>,
    rng: SmallRng,
}

impl Simulation {
    /// A populated world with the default systems.
    pub fn new(config: SimConfig) -> Self {
        let mut rng = SmallRng::seed_from_u64(config.seed);
        let mut world = World::new(config);
        world.populate(&mut rng);
        Self::with_systems(world, default_systems(), rng)
    }

    /// Run an existing world with custom systems.
    pub fn with_systems(world: World, systems: Vec<Box<dyn SimSystem>>, rng: SmallRng) -> Self {
        Self {
            world,
            systems,
            rng,
        }
    }

    pub fn tick(&mut self) {
        dispatch_systems(&mut self.world, &mut self.systems, &mut self.rng);
    }

    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    pub fn add_citizen(&mut self, name: &str) -> Option<CitizenId> {
        lifecycle::add_citizen(&mut self.world, name, &mut self.rng)
    }

    /// See [`handle_chat_message`].
    ///
    /// # Errors
    /// Propagates command errors.
    pub fn handle_chat_message(&mut self, user: &str, text: &str) -> Result<bool> {
        handle_chat_message(&mut self.world, user, text, &mut self.rng)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::sim::signal::{Signal, SignalKind};

    // -- Test helpers --

    struct CountingSystem {
        count: Rc<Cell<u32>>,
    }

    impl SimSystem for CountingSystem {
        fn name(&self) -> &str {
            "counting"
        }
        fn tick(&mut self, _ctx: &mut TickContext) {
            self.count.set(self.count.get() + 1);
        }
    }

    fn quiet_world() -> World {
        World::new(SimConfig::default())
    }

    fn run_with(world: World, systems: Vec<Box<dyn SimSystem>>, ticks: u64) -> World {
        let mut sim = Simulation::with_systems(world, systems, SmallRng::seed_from_u64(0));
        sim.run(ticks);
        sim.world
    }

    #[test]
    fn empty_systems_only_advance_time() {
        let world = run_with(quiet_world(), Vec::new(), 3);
        assert_eq!(world.time, 3 * world.config.tick_ms);
    }

    #[test]
    fn system_ticked_once_per_tick() {
        let count = Rc::new(Cell::new(0));
        let systems: Vec<Box<dyn SimSystem>> = vec![Box::new(CountingSystem {
            count: count.clone(),
        })];
        run_with(quiet_world(), systems, 7);
        assert_eq!(count.get(), 7);
    }

    #[test]
    fn systems_called_in_registration_order() {
        struct LoggingSystem {
            sys_name: String,
            log: Rc<RefCell<Vec<String>>>,
        }

        impl SimSystem for LoggingSystem {
            fn name(&self) -> &str {
                &self.sys_name
            }
            fn tick(&mut self, _ctx: &mut TickContext) {
                self.log.borrow_mut().push(self.sys_name.clone());
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        let systems: Vec<Box<dyn SimSystem>> = vec![
            Box::new(LoggingSystem {
                sys_name: "A".to_string(),
                log: log.clone(),
            }),
            Box::new(LoggingSystem {
                sys_name: "B".to_string(),
                log: log.clone(),
            }),
        ];
        run_with(quiet_world(), systems, 2);
        assert_eq!(*log.borrow(), vec!["A", "B", "A", "B"]);
    }

    // -- Signal bus tests --

    struct EmitterSystem;

    impl SimSystem for EmitterSystem {
        fn name(&self) -> &str {
            "emitter"
        }
        fn tick(&mut self, ctx: &mut TickContext) {
            ctx.emit(SignalKind::CitizenRemoved {
                citizen: CitizenId(42),
            });
        }
    }

    #[test]
    fn signal_emitted_and_received() {
        struct ReceiverSystem {
            received: Rc<Cell<u32>>,
        }

        impl SimSystem for ReceiverSystem {
            fn name(&self) -> &str {
                "receiver"
            }
            fn tick(&mut self, _ctx: &mut TickContext) {}
            fn handle_signals(&mut self, ctx: &mut TickContext) {
                for signal in ctx.inbox {
                    if let SignalKind::CitizenRemoved {
                        citizen: CitizenId(42),
                    } = signal.kind
                    {
                        self.received.set(self.received.get() + 1);
                    }
                }
            }
        }

        let received = Rc::new(Cell::new(0));
        let systems: Vec<Box<dyn SimSystem>> = vec![
            Box::new(EmitterSystem),
            Box::new(ReceiverSystem {
                received: received.clone(),
            }),
        ];
        run_with(quiet_world(), systems, 3);
        assert_eq!(received.get(), 3);
    }

    #[test]
    fn signals_not_accumulated_across_ticks() {
        struct CounterSystem {
            max_inbox_len: Rc<Cell<usize>>,
        }

        impl SimSystem for CounterSystem {
            fn name(&self) -> &str {
                "counter"
            }
            fn tick(&mut self, _ctx: &mut TickContext) {}
            fn handle_signals(&mut self, ctx: &mut TickContext) {
                let len = ctx.inbox.len();
                if len > self.max_inbox_len.get() {
                    self.max_inbox_len.set(len);
                }
                // Reactions are never re-delivered.
                ctx.signals.push(Signal {
                    time: 0,
                    kind: SignalKind::CitizenRemoved {
                        citizen: CitizenId(7),
                    },
                });
            }
        }

        let max_inbox_len = Rc::new(Cell::new(0));
        let systems: Vec<Box<dyn SimSystem>> = vec![
            Box::new(EmitterSystem),
            Box::new(CounterSystem {
                max_inbox_len: max_inbox_len.clone(),
            }),
        ];
        run_with(quiet_world(), systems, 5);
        assert_eq!(max_inbox_len.get(), 1);
    }

    #[test]
    fn new_simulation_is_populated_and_seeded() {
        let sim = Simulation::new(SimConfig::default());
        let cfg = &sim.world.config;
        assert_eq!(
            sim.world.map.count(crate::map::TileObjectKind::Tree),
            cfg.map.min_trees
        );
        assert_eq!(sim.systems.len(), 3);
        assert_eq!(sim.systems[0].name(), "map");
        assert_eq!(sim.systems[2].name(), "mortality");
    }

    #[test]
    fn add_citizen_through_simulation() {
        let mut sim = Simulation::new(SimConfig::default());
        let id = sim.add_citizen("Ada").unwrap();
        assert!(sim.add_citizen("Ada").is_none());
        sim.run(10);
        assert!(sim.world.is_alive(id));
    }
}
