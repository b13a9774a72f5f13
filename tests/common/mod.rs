#![allow(dead_code)]

use citizen_sim::Simulation;
use citizen_sim::model::World;

/// Tick `sim` until `done` holds or `max_ticks` run out. Returns the number
/// of ticks it took.
pub fn run_until(sim: &mut Simulation, max_ticks: u64, done: impl Fn(&World) -> bool) -> Option<u64> {
    for tick in 1..=max_ticks {
        sim.tick();
        if done(&sim.world) {
            return Some(tick);
        }
    }
    None
}

pub fn read_lines(path: &std::path::Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}
