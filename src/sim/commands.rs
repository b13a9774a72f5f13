//! Chat command intake. Viewers steer their own citizen with `!` commands;
//! the streamer can also tune world upkeep.

use rand::RngCore;

use super::chat::say_text;
use super::jobs::{JobKind, change_job};
use super::lifecycle::add_citizen;
use super::market::leave_all_queues;
use super::state_stack::{Activity, CitizenState, push_state, reset_state_to};
use super::tasks::{Emote, EmoteKind, Sleep};
use crate::error::{Result, SimError};
use crate::id::CitizenId;
use crate::model::World;

/// Handle one chat line from `user`.
///
/// Returns whether the line should still be shown as chat: plain messages and
/// unknown commands are, recognised commands are consumed.
///
/// # Errors
/// `UnknownCitizen` when a command needs the user's citizen and there is
/// none; `InvalidArgument` when a command argument cannot be parsed.
pub fn handle_chat_message(
    world: &mut World,
    user: &str,
    text: &str,
    rng: &mut dyn RngCore,
) -> Result<bool> {
    let text = text.trim();
    let Some(command) = text.strip_prefix('!') else {
        if let Some(id) = world.citizen_by_name(user).map(|c| c.id) {
            say_text(world, id, text);
        }
        return Ok(true);
    };
    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or_default().to_ascii_lowercase();
    let argument = words.next();

    match name.as_str() {
        "join" => {
            match add_citizen(world, user, rng) {
                Some(id) => tracing::info!(user, %id, "joined from chat"),
                None => tracing::debug!(user, "join ignored, name taken"),
            }
            Ok(false)
        }
        "sleep" => {
            let id = own_citizen(world, user)?;
            let frame = CitizenState::new(Sleep::default(), world.time);
            command_frame(world, id, frame);
            Ok(false)
        }
        "wave" => {
            let id = own_citizen(world, user)?;
            let now = world.time;
            let emote = Emote {
                kind: EmoteKind::Wave,
                until: now + world.config.jobs.emote_ms,
            };
            command_frame(world, id, CitizenState::new(emote, now));
            Ok(false)
        }
        "job" => {
            let id = own_citizen(world, user)?;
            let raw = argument.unwrap_or_default();
            let kind = JobKind::parse(raw).ok_or_else(|| invalid("job", raw))?;
            let now = world.time;
            leave_all_queues(&mut world.map, id);
            let citizen = world.expect_citizen_mut(id);
            change_job(citizen, kind, "I was told to switch.", now);
            reset_state_to(citizen, Activity::Working);
            Ok(false)
        }
        "trees" | "mushrooms" => {
            if !user.eq_ignore_ascii_case(&world.config.streamer_name) {
                tracing::warn!(user, command = %name, "streamer-only command ignored");
                return Ok(false);
            }
            let raw = argument.unwrap_or_default();
            let count: usize = raw.parse().map_err(|_| invalid(&name, raw))?;
            if name == "trees" {
                world.config.map.min_trees = count;
            } else {
                world.config.map.max_mushrooms = count;
            }
            tracing::info!(command = %name, count, "world upkeep changed");
            Ok(false)
        }
        _ => {
            if let Some(id) = world.citizen_by_name(user).map(|c| c.id) {
                say_text(world, id, text);
            }
            Ok(true)
        }
    }
}

fn own_citizen(world: &World, user: &str) -> Result<CitizenId> {
    world
        .citizen_by_name(user)
        .filter(|c| c.is_alive())
        .map(|c| c.id)
        .ok_or_else(|| {
            tracing::warn!(user, "command for a citizen that does not exist");
            SimError::UnknownCitizen(user.to_string())
        })
}

fn invalid(command: &str, argument: &str) -> SimError {
    SimError::InvalidArgument {
        command: command.to_string(),
        argument: argument.to_string(),
    }
}

/// Drop whatever `id` was doing and run `frame` instead.
fn command_frame(world: &mut World, id: CitizenId, frame: CitizenState) {
    leave_all_queues(&mut world.map, id);
    let citizen = world.expect_citizen_mut(id);
    reset_state_to(citizen, Activity::Command);
    push_state(citizen, frame);
}
