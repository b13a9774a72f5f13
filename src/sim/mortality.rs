use super::context::TickContext;
use super::market::leave_all_queues;
use super::signal::SignalKind;
use super::state_stack::{Activity, reset_state_to};
use super::system::SimSystem;
use crate::id::{BuildingId, CitizenId};
use crate::map::TileObjectKind;
use crate::model::{Citizen, Death, DeathReason, World};

/// Detects deaths, hands houses on and removes bodies after the display delay.
#[derive(Debug, Default)]
pub struct MortalitySystem;

impl MortalitySystem {
    pub fn new() -> Self {
        Self
    }
}

/// Why `citizen` would die right now, if at all.
pub fn death_reason(citizen: &Citizen) -> Option<DeathReason> {
    if citizen.food_per_cent < 0.0 {
        Some(DeathReason::Starved)
    } else if citizen.energy_per_cent < 0.0 {
        Some(DeathReason::Exhausted)
    } else if citizen.happiness <= -1.0 {
        Some(DeathReason::Unhappy)
    } else {
        None
    }
}

impl SimSystem for MortalitySystem {
    fn name(&self) -> &str {
        "mortality"
    }

    fn tick(&mut self, ctx: &mut TickContext) {
        let now = ctx.now();
        let display = ctx.world.config.citizen.death_display_ms;

        let dying: Vec<(CitizenId, DeathReason)> = ctx
            .world
            .living_citizens()
            .filter_map(|c| death_reason(c).map(|r| (c.id, r)))
            .collect();
        for (citizen, reason) in dying {
            kill(ctx.world, citizen, reason);
            ctx.emit(SignalKind::CitizenDied { citizen, reason });
        }

        let expired: Vec<CitizenId> = ctx
            .world
            .citizens
            .values()
            .filter(|c| {
                c.death
                    .as_ref()
                    .is_some_and(|d| now.saturating_sub(d.time) >= display)
            })
            .map(|c| c.id)
            .collect();
        for citizen in expired {
            remove(ctx.world, citizen);
            ctx.emit(SignalKind::CitizenRemoved { citizen });
        }
    }
}

/// Mark `id` dead, drop its plans and pass its house on.
///
/// # Panics
/// Panics if `id` is not in the world.
pub fn kill(world: &mut World, id: CitizenId, reason: DeathReason) {
    let now = world.time;
    leave_all_queues(&mut world.map, id);
    let citizen = world.expect_citizen_mut(id);
    citizen.death = Some(Death { time: now, reason });
    reset_state_to(citizen, Activity::Working);
    citizen.state_info.thought = None;
    citizen.log.push(now, format!("Died: {reason:?}"));
    tracing::info!(citizen = %citizen.name, ?reason, "citizen died");

    if let Some(home) = citizen.home.take() {
        transfer_home(world, id, home);
    }
}

/// Give `home` to the nearest living homeless citizen, or leave it empty for
/// anyone to claim.
fn transfer_home(world: &mut World, from: CitizenId, home: BuildingId) {
    let Some(at) = world.map.position_of(home) else {
        return;
    };
    let heir = world
        .living_citizens()
        .filter(|c| c.id != from && c.home.is_none())
        .min_by(|a, b| a.position.distance(&at).total_cmp(&b.position.distance(&at)))
        .map(|c| c.id);
    let Some(building) = world.map.building_mut(home) else {
        return;
    };
    match heir {
        Some(heir) => {
            building.owner = heir;
            building.inhabited_by = Some(heir);
            let now = world.time;
            let citizen = world.expect_citizen_mut(heir);
            citizen.home = Some(home);
            citizen.think(now, "I inherited a house.");
            tracing::info!(citizen = %citizen.name, %home, "home passed on");
        }
        None => {
            building.inhabited_by = None;
            tracing::info!(%home, "home left empty");
        }
    }
}

/// Take a dead citizen off the map along with its fields.
fn remove(world: &mut World, id: CitizenId) {
    let fields: Vec<_> = world
        .map
        .objects_of_kind(TileObjectKind::FarmTile)
        .filter(|o| o.as_farm_tile().is_some_and(|f| f.owner == id))
        .map(|o| o.id)
        .collect();
    for field in fields {
        world.map.delete_object(field);
    }
    leave_all_queues(&mut world.map, id);
    if let Some(citizen) = world.citizens.remove(&id) {
        tracing::debug!(citizen = %citizen.name, "citizen removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{FarmTile, TileObjectData};
    use crate::model::{BuildingKind, Position};
    use crate::testutil::{TestWorld, tick_system};

    #[test]
    fn starvation_kills_and_signals() {
        let mut tw = TestWorld::new();
        let id = tw.citizen("Ada", Position::new(100.0, 100.0));
        tw.world.expect_citizen_mut(id).food_per_cent = -0.01;
        let signals = tick_system(&mut tw.world, &mut MortalitySystem::new(), 1);
        let c = tw.world.expect_citizen(id);
        assert_eq!(c.death.as_ref().unwrap().reason, DeathReason::Starved);
        assert!(c.state_info.stack.is_empty());
        assert_eq!(
            signals[0].kind,
            SignalKind::CitizenDied { citizen: id, reason: DeathReason::Starved }
        );
    }

    #[test]
    fn unhappiness_at_minus_one_is_fatal() {
        let mut tw = TestWorld::new();
        let id = tw.citizen("Ada", Position::new(100.0, 100.0));
        let c = tw.world.expect_citizen_mut(id);
        assert_eq!(death_reason(c), None);
        c.happiness = -1.0;
        assert_eq!(death_reason(c), Some(DeathReason::Unhappy));
    }

    #[test]
    fn house_goes_to_nearest_homeless() {
        let mut tw = TestWorld::new();
        let owner = tw.citizen("Ada", Position::new(100.0, 100.0));
        let near = tw.citizen("Bo", Position::new(150.0, 100.0));
        let far = tw.citizen("Cy", Position::new(600.0, 600.0));
        let house = tw.building(BuildingKind::House, owner, Position::new(120.0, 100.0));
        tw.world.expect_citizen_mut(owner).home = Some(house);
        tw.world.map.building_mut(house).unwrap().inhabited_by = Some(owner);

        kill(&mut tw.world, owner, DeathReason::Exhausted);
        assert_eq!(tw.world.expect_citizen(near).home, Some(house));
        assert_eq!(tw.world.expect_citizen(far).home, None);
        let b = tw.world.map.building(house).unwrap();
        assert_eq!(b.owner, near);
        assert_eq!(b.inhabited_by, Some(near));
    }

    #[test]
    fn house_without_heir_becomes_claimable() {
        let mut tw = TestWorld::new();
        let owner = tw.citizen("Ada", Position::new(100.0, 100.0));
        let house = tw.building(BuildingKind::House, owner, Position::new(120.0, 100.0));
        tw.world.expect_citizen_mut(owner).home = Some(house);
        tw.world.map.building_mut(house).unwrap().inhabited_by = Some(owner);
        kill(&mut tw.world, owner, DeathReason::Unhappy);
        assert_eq!(tw.world.map.building(house).unwrap().inhabited_by, None);
    }

    #[test]
    fn body_and_fields_removed_after_display_delay() {
        let mut tw = TestWorld::new();
        let id = tw.citizen("Ada", Position::new(100.0, 100.0));
        let field = tw
            .world
            .map
            .add_object_at(
                TileObjectData::FarmTile(FarmTile { owner: id, crop: None }),
                &Position::new(300.0, 300.0),
            )
            .unwrap();
        kill(&mut tw.world, id, DeathReason::Starved);

        let mut system = MortalitySystem::new();
        assert!(tick_system(&mut tw.world, &mut system, 1).is_empty());
        assert!(tw.world.citizen(id).is_some());

        tw.world.time += tw.world.config.citizen.death_display_ms;
        let signals = tick_system(&mut tw.world, &mut system, 1);
        assert_eq!(signals[0].kind, SignalKind::CitizenRemoved { citizen: id });
        assert!(tw.world.citizen(id).is_none());
        assert!(!tw.world.map.contains(field));
    }
}
