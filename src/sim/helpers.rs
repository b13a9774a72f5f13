use rand::{Rng, RngCore};

use crate::config::CitizenConfig;
use crate::id::{BuildingId, CitizenId, ObjectId};
use crate::map::{Map, TileObject, TileObjectKind};
use crate::model::{BuildingKind, Citizen, ItemName, Position, World};

/// Request movement toward `target` unless already within `range`.
/// Returns true once the citizen is in range.
pub fn move_near(citizen: &mut Citizen, target: Position, range: f64) -> bool {
    if citizen.is_at(&target, range) {
        citizen.move_to = None;
        true
    } else {
        citizen.move_to = Some(target);
        false
    }
}

/// Nearest object of `kind` passing `filter`, looking within the normal
/// search radius first and widening to the maximum radius after.
pub fn search_nearest(
    map: &Map,
    pos: &Position,
    kind: TileObjectKind,
    config: &CitizenConfig,
    filter: impl Fn(&TileObject) -> bool,
) -> Option<(ObjectId, Position)> {
    map.find_nearest(pos, kind, config.search_radius, &filter)
        .or_else(|| map.find_nearest(pos, kind, config.max_search_radius, &filter))
        .map(|o| (o.id, o.position))
}

/// A random point up to `distance` away, kept inside the map.
pub fn wander_target(map: &Map, from: &Position, distance: f64, rng: &mut dyn RngCore) -> Position {
    let extent = map.extent();
    let dx = rng.random_range(-distance..=distance);
    let dy = rng.random_range(-distance..=distance);
    let target = from.offset(dx, dy);
    Position::new(target.x.clamp(0.0, extent.x), target.y.clamp(0.0, extent.y))
}

/// Nearest built, usable market trading `item` whose merchant is alive.
/// Markets owned by `exclude` are skipped.
pub fn find_market(
    world: &World,
    from: &Position,
    item: ItemName,
    exclude: Option<CitizenId>,
) -> Option<BuildingId> {
    world
        .map
        .find_nearest(
            from,
            TileObjectKind::Building,
            world.config.citizen.max_search_radius,
            |o| {
                o.as_building().is_some_and(|b| {
                    b.kind.is_market()
                        && b.is_built()
                        && b.is_usable()
                        && b.kind.traded_items().contains(&item)
                        && Some(b.owner) != exclude
                        && world.is_alive(b.owner)
                })
            },
        )
        .map(|o| o.id)
}

/// A usable building owned by `id` that holds at least one `item`.
pub fn owned_building_with(world: &World, id: CitizenId, item: ItemName) -> Option<BuildingId> {
    world
        .map
        .buildings()
        .filter(|(_, b)| b.owner == id && b.is_built() && b.is_usable())
        .find(|(_, b)| b.inventory.get_amount(item) > 0)
        .map(|(o, _)| o.id)
}

/// The citizen's own market of `kind`, finished or not.
pub fn owned_market(world: &World, id: CitizenId, kind: BuildingKind) -> Option<BuildingId> {
    world
        .map
        .buildings()
        .find(|(_, b)| b.owner == id && b.kind == kind && b.is_usable())
        .map(|(o, _)| o.id)
}
