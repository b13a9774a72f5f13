use super::chat::ChatWith;
use super::context::TickContext;
use super::jobs::next_task;
use super::market::leave_all_queues;
use super::needs::evaluate_needs;
use super::signal::SignalKind;
use super::state_stack::{Activity, FrameTag, has_tag, push_state, reset_state_to};
use super::system::SimSystem;
use super::tasks::{Sleep, Task, tick_top_frame};
use crate::id::CitizenId;
use crate::model::{Citizen, TodoTask, World};

/// Drives every living citizen one step: vitals, todo list, needs, job, the
/// top frame of the task stack, then movement.
#[derive(Debug, Default)]
pub struct CitizenSystem;

impl CitizenSystem {
    pub fn new() -> Self {
        Self
    }
}

impl SimSystem for CitizenSystem {
    fn name(&self) -> &str {
        "citizens"
    }

    fn tick(&mut self, ctx: &mut TickContext) {
        let ids: Vec<CitizenId> = ctx
            .world
            .living_citizens()
            .map(|c| c.id)
            .collect();
        for id in ids {
            // An earlier citizen's frame may have killed or removed this one.
            if !ctx.world.is_alive(id) {
                continue;
            }
            tick_citizen(ctx, id);
        }
    }

    fn handle_signals(&mut self, ctx: &mut TickContext) {
        let now = ctx.now();
        for signal in ctx.inbox {
            match signal.kind {
                SignalKind::CitizenRemoved { citizen: gone } => {
                    leave_all_queues(&mut ctx.world.map, gone);
                    for citizen in ctx.world.citizens.values_mut() {
                        citizen.memory.citizens.retain(|m| m.id != gone);
                        citizen
                            .memory
                            .todo_list
                            .retain(|t| !matches!(t.task, TodoTask::ReplyToChat { partner } if partner == gone));
                    }
                }
                SignalKind::BuildingRemoved { building } => {
                    for citizen in ctx.world.citizens.values_mut() {
                        if citizen.home == Some(building) {
                            citizen.home = None;
                            citizen.think(now, "My home fell apart.");
                            tracing::info!(citizen = %citizen.name, %building, "lost home");
                        }
                    }
                }
                SignalKind::CitizenDied { .. } | SignalKind::BuildingCompleted { .. } => {}
            }
        }
    }
}

fn tick_citizen(ctx: &mut TickContext, id: CitizenId) {
    let now = ctx.now();
    {
        let World {
            citizens, config, ..
        } = &mut *ctx.world;
        let Some(citizen) = citizens.get_mut(&id) else {
            return;
        };
        drain_vitals(citizen, &config.citizen);
        if citizen
            .state_info
            .thought
            .as_ref()
            .is_some_and(|t| now.saturating_sub(t.start_time) > config.citizen.thought_duration_ms)
        {
            citizen.state_info.thought = None;
        }
        citizen.memory.decay(config.citizen.familiarity_decay_per_tick);
        citizen.memory.expire_todos(now, config.citizen.todo_expiry_ms);
    }

    check_todo_list(ctx.world, id);
    evaluate_needs(ctx.world, id);

    if ctx.world.expect_citizen(id).state_info.stack.is_empty() {
        let frame = next_task(ctx.world, id, &mut *ctx.rng);
        let citizen = ctx.world.expect_citizen_mut(id);
        citizen.state_info.activity = Activity::Working;
        push_state(citizen, frame);
    }

    tick_top_frame(ctx, id);

    let Some(citizen) = ctx.world.citizen_mut(id) else {
        return;
    };
    if citizen.state_info.stack.is_empty() {
        if let Activity::Need(kind) = citizen.state_info.activity {
            if citizen.state_info.previous_task_failed == Some(true) {
                citizen.need_failed_at.insert(kind, now);
            }
        }
    }
    if let Some(target) = citizen.move_to {
        let speed = citizen.speed;
        if citizen.position.step_toward(&target, speed) {
            citizen.move_to = None;
        }
    }
}

fn drain_vitals(citizen: &mut Citizen, config: &crate::config::CitizenConfig) {
    let modifiers = citizen.modifiers();
    let asleep = matches!(
        citizen.top_state().map(|s| &s.task),
        Some(Task::Sleep(Sleep { asleep: true }))
    );
    citizen.food_per_cent -= config.food_drain_per_tick * modifiers.food_drain;
    if !asleep {
        citizen.energy_per_cent -= config.energy_drain_per_tick * modifiers.energy_drain;
    }
    citizen.happiness -= config.happiness_drain_per_tick * modifiers.happiness_drain;
}

/// Answer the most urgent todo unless the citizen is busy with a need, a
/// trade or another conversation.
fn check_todo_list(world: &mut World, id: CitizenId) {
    let now = world.time;
    let citizen = world.expect_citizen(id);
    if matches!(citizen.state_info.activity, Activity::Need(_))
        || has_tag(citizen, FrameTag::Trade)
        || has_tag(citizen, FrameTag::Social)
        || citizen.memory.todo_list.is_empty()
    {
        return;
    }
    let todo = world.expect_citizen_mut(id).memory.todo_list.remove(0);
    match todo.task {
        TodoTask::ReplyToChat { partner } => {
            if !world.is_alive(partner) {
                return;
            }
            leave_all_queues(&mut world.map, id);
            let citizen = world.expect_citizen_mut(id);
            reset_state_to(citizen, Activity::Todo);
            push_state(
                citizen,
                ChatWith::respond(partner, todo.created, now).into_state(now),
            );
        }
    }
}
