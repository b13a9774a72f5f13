use rand::RngCore;

use super::jobs::{Job, pick_job};
use crate::id::CitizenId;
use crate::model::traits::generate_traits;
use crate::model::{Citizen, Position, World};

/// Add a citizen called `name` at a random free spot.
///
/// Returns `None` if the name is blank or already taken (case-insensitive).
pub fn add_citizen(world: &mut World, name: &str, rng: &mut dyn RngCore) -> Option<CitizenId> {
    let name = name.trim();
    if name.is_empty() || world.citizen_by_name(name).is_some() {
        return None;
    }
    let position = world.map.random_free_position(rng).unwrap_or_else(|| {
        let extent = world.map.extent();
        Position::new(extent.x / 2.0, extent.y / 2.0)
    });
    let job = pick_job(world, rng);
    let id = world.id_gen.next_citizen();
    let mut citizen = Citizen::new(id, name, position, Job::new(job), &world.config, world.time);
    citizen.traits = generate_traits(world.config.citizen.max_traits, rng);
    tracing::info!(citizen = name, %job, traits = ?citizen.traits, "citizen joined");
    world.citizens.insert(id, citizen);
    Some(id)
}
