//! Chunked tile map holding every stationary world object.
//!
//! The world is split into square chunks. Each object sits on exactly one
//! tile of exactly one chunk, chosen from its position when placed. Lookups
//! by id go through a side index; proximity queries only visit the chunks
//! that can intersect the search circle.

mod chunk;
mod object;
mod tick_queue;

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use rand::{Rng, RngCore};

pub use chunk::{Chunk, ChunkKey};
pub use object::{FarmTile, TileCoord, TileObject, TileObjectData, TileObjectKind, Tree};
pub use tick_queue::{TickQueue, TickQueueEntry};

use crate::config::MapConfig;
use crate::id::{BuildingId, IdGenerator, ObjectId};
use crate::model::{Building, Position};

#[derive(Debug, Clone)]
pub struct Map {
    pub width_tiles: i32,
    pub height_tiles: i32,
    pub chunk_tiles: i32,
    pub tile_size: f64,
    placement_probes: u32,
    chunks: BTreeMap<ChunkKey, Chunk>,
    index: BTreeMap<ObjectId, (ChunkKey, TileObjectKind)>,
    tick_queue: TickQueue,
    id_gen: IdGenerator,
}

impl Map {
    pub fn new(config: &MapConfig) -> Self {
        assert!(config.chunk_tiles > 0, "Map::new: chunk_tiles must be positive");
        let mut chunks = BTreeMap::new();
        let chunks_x = (config.width_tiles + config.chunk_tiles - 1) / config.chunk_tiles;
        let chunks_y = (config.height_tiles + config.chunk_tiles - 1) / config.chunk_tiles;
        for cy in 0..chunks_y {
            for cx in 0..chunks_x {
                let key = ChunkKey { x: cx, y: cy };
                let x0 = cx * config.chunk_tiles;
                let y0 = cy * config.chunk_tiles;
                let x1 = (x0 + config.chunk_tiles).min(config.width_tiles);
                let y1 = (y0 + config.chunk_tiles).min(config.height_tiles);
                let tiles = (y0..y1).flat_map(|y| (x0..x1).map(move |x| TileCoord::new(x, y)));
                chunks.insert(key, Chunk::new(key, tiles));
            }
        }
        Self {
            width_tiles: config.width_tiles,
            height_tiles: config.height_tiles,
            chunk_tiles: config.chunk_tiles,
            tile_size: config.tile_size,
            placement_probes: config.placement_probes,
            chunks,
            index: BTreeMap::new(),
            tick_queue: TickQueue::new(),
            id_gen: IdGenerator::new(),
        }
    }

    // -- Coordinates --

    pub fn tile_for(&self, pos: &Position) -> TileCoord {
        TileCoord::new(
            (pos.x / self.tile_size).floor() as i32,
            (pos.y / self.tile_size).floor() as i32,
        )
    }

    pub fn tile_center(&self, tile: TileCoord) -> Position {
        Position::new(
            (f64::from(tile.x) + 0.5) * self.tile_size,
            (f64::from(tile.y) + 0.5) * self.tile_size,
        )
    }

    pub fn chunk_key_for_tile(&self, tile: TileCoord) -> ChunkKey {
        ChunkKey {
            x: tile.x.div_euclid(self.chunk_tiles),
            y: tile.y.div_euclid(self.chunk_tiles),
        }
    }

    pub fn in_bounds(&self, tile: TileCoord) -> bool {
        (0..self.width_tiles).contains(&tile.x) && (0..self.height_tiles).contains(&tile.y)
    }

    /// World-unit extent of the map.
    pub fn extent(&self) -> Position {
        Position::new(
            f64::from(self.width_tiles) * self.tile_size,
            f64::from(self.height_tiles) * self.tile_size,
        )
    }

    fn chunk_units(&self) -> f64 {
        f64::from(self.chunk_tiles) * self.tile_size
    }

    pub fn is_free(&self, tile: TileCoord) -> bool {
        self.in_bounds(tile)
            && self
                .chunks
                .get(&self.chunk_key_for_tile(tile))
                .is_some_and(|c| c.is_free(tile))
    }

    // -- Chunk queries --

    /// Chunks whose rectangle comes within `radius` of `pos`.
    ///
    /// Candidates are the chunks within a chunk-count margin of the center
    /// chunk; each is kept if its closest point lies inside the circle.
    pub fn chunks_in_distance(&self, pos: &Position, radius: f64) -> Vec<&Chunk> {
        let chunk_units = self.chunk_units();
        let margin = (radius / chunk_units).ceil() as i32;
        let center = self.chunk_key_for_tile(self.tile_for(pos));
        let mut result = Vec::new();
        for dy in -margin..=margin {
            for dx in -margin..=margin {
                let key = ChunkKey {
                    x: center.x + dx,
                    y: center.y + dy,
                };
                let Some(chunk) = self.chunks.get(&key) else {
                    continue;
                };
                if chunk.closest_point(pos, chunk_units).distance(pos) <= radius {
                    result.push(chunk);
                }
            }
        }
        result
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    // -- Placement --

    /// Place an object on the free tile nearest to `center` among the center
    /// tile, its neighbours and a bounded number of random probes within
    /// `search_radius`. Returns `None` when no free tile was found.
    pub fn add_object(
        &mut self,
        data: TileObjectData,
        center: &Position,
        search_radius: f64,
        rng: &mut dyn RngCore,
    ) -> Option<ObjectId> {
        let center_tile = self.tile_for(center);
        if self.is_free(center_tile) {
            return Some(self.place(data, center_tile));
        }

        let mut best: Option<(f64, TileCoord)> = None;
        let mut consider = |map: &Map, tile: TileCoord| {
            if !map.is_free(tile) {
                return;
            }
            let dist = map.tile_center(tile).distance(center);
            if dist <= search_radius + map.tile_size && best.is_none_or(|(d, _)| dist < d) {
                best = Some((dist, tile));
            }
        };

        for dy in -1..=1 {
            for dx in -1..=1 {
                consider(self, TileCoord::new(center_tile.x + dx, center_tile.y + dy));
            }
        }
        for _ in 0..self.placement_probes {
            let angle = rng.random::<f64>() * TAU;
            let r = rng.random::<f64>() * search_radius;
            let probe = center.offset(angle.cos() * r, angle.sin() * r);
            consider(self, self.tile_for(&probe));
        }

        let (_, tile) = best?;
        Some(self.place(data, tile))
    }

    /// Place an object exactly on the tile containing `position`.
    pub fn add_object_at(&mut self, data: TileObjectData, position: &Position) -> Option<ObjectId> {
        let tile = self.tile_for(position);
        if !self.is_free(tile) {
            return None;
        }
        Some(self.place(data, tile))
    }

    fn place(&mut self, data: TileObjectData, tile: TileCoord) -> ObjectId {
        let id = self.id_gen.next_object();
        let key = self.chunk_key_for_tile(tile);
        let kind = data.kind();
        let object = TileObject {
            id,
            tile,
            position: self.tile_center(tile),
            data,
        };
        let chunk = self
            .chunks
            .get_mut(&key)
            .unwrap_or_else(|| panic!("place: chunk {key:?} missing for tile {tile:?}"));
        chunk.insert(object);
        self.index.insert(id, (key, kind));
        id
    }

    /// Remove an object and free its tile.
    pub fn delete_object(&mut self, id: ObjectId) -> Option<TileObject> {
        let (key, kind) = self.index.remove(&id)?;
        self.chunks.get_mut(&key)?.remove(kind, id)
    }

    // -- Lookup --

    pub fn contains(&self, id: ObjectId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn object(&self, id: ObjectId) -> Option<&TileObject> {
        let (key, kind) = self.index.get(&id)?;
        self.chunks.get(key)?.objects(*kind).iter().find(|o| o.id == id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut TileObject> {
        let (key, kind) = *self.index.get(&id)?;
        self.chunks.get_mut(&key)?.object_mut(kind, id)
    }

    pub fn position_of(&self, id: ObjectId) -> Option<Position> {
        self.object(id).map(|o| o.position)
    }

    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        self.object(id)?.as_building()
    }

    pub fn building_mut(&mut self, id: BuildingId) -> Option<&mut Building> {
        self.object_mut(id)?.as_building_mut()
    }

    /// A building that still exists and has not rotted away.
    pub fn usable_building(&self, id: BuildingId) -> Option<&Building> {
        self.building(id).filter(|b| b.is_usable())
    }

    pub fn objects_of_kind(&self, kind: TileObjectKind) -> impl Iterator<Item = &TileObject> {
        self.chunks.values().flat_map(move |c| c.objects(kind).iter())
    }

    pub fn count(&self, kind: TileObjectKind) -> usize {
        self.index.values().filter(|(_, k)| *k == kind).count()
    }

    pub fn trees(&self) -> impl Iterator<Item = &TileObject> {
        self.objects_of_kind(TileObjectKind::Tree)
    }

    pub fn mushrooms(&self) -> impl Iterator<Item = &TileObject> {
        self.objects_of_kind(TileObjectKind::Mushroom)
    }

    pub fn buildings(&self) -> impl Iterator<Item = (&TileObject, &Building)> {
        self.objects_of_kind(TileObjectKind::Building)
            .filter_map(|o| o.as_building().map(|b| (o, b)))
    }

    /// Objects of `kind` within `radius` of `pos`.
    pub fn objects_in_distance(
        &self,
        pos: &Position,
        kind: TileObjectKind,
        radius: f64,
    ) -> Vec<&TileObject> {
        self.chunks_in_distance(pos, radius)
            .into_iter()
            .flat_map(|c| c.objects(kind).iter())
            .filter(|o| o.position.distance(pos) <= radius)
            .collect()
    }

    /// Nearest object of `kind` within `radius` that passes `filter`.
    /// Ties go to the lower id.
    pub fn find_nearest(
        &self,
        pos: &Position,
        kind: TileObjectKind,
        radius: f64,
        filter: impl Fn(&TileObject) -> bool,
    ) -> Option<&TileObject> {
        self.objects_in_distance(pos, kind, radius)
            .into_iter()
            .filter(|o| filter(o))
            .min_by(|a, b| {
                a.position
                    .distance(pos)
                    .total_cmp(&b.position.distance(pos))
                    .then(a.id.cmp(&b.id))
            })
    }

    /// A uniformly random free tile center, if one turns up within a few tries.
    pub fn random_free_position(&self, rng: &mut dyn RngCore) -> Option<Position> {
        for _ in 0..self.placement_probes.max(1) {
            let tile = TileCoord::new(
                rng.random_range(0..self.width_tiles.max(1)),
                rng.random_range(0..self.height_tiles.max(1)),
            );
            if self.is_free(tile) {
                return Some(self.tile_center(tile));
            }
        }
        None
    }

    // -- Deferred updates --

    pub fn schedule(&mut self, id: ObjectId, due: u64) {
        self.tick_queue.insert(id, due);
    }

    pub fn tick_queue(&self) -> &TickQueue {
        &self.tick_queue
    }

    /// Pop every entry due at `now`, dropping those whose object is gone.
    pub fn drain_due(&mut self, now: u64) -> Vec<ObjectId> {
        let mut due = Vec::new();
        while let Some(entry) = self.tick_queue.pop_due(now) {
            if self.index.contains_key(&entry.object) {
                due.push(entry.object);
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn small_map() -> Map {
        Map::new(&MapConfig {
            width_tiles: 20,
            height_tiles: 20,
            chunk_tiles: 5,
            tile_size: 10.0,
            ..MapConfig::default()
        })
    }

    #[test]
    fn new_map_covers_all_tiles() {
        let map = small_map();
        assert_eq!(map.chunks().count(), 16);
        let free: usize = map.chunks().map(|c| c.empty_tiles.len()).sum();
        assert_eq!(free, 400);
    }

    #[test]
    fn object_lands_in_chunk_of_its_position() {
        let mut map = small_map();
        let id = map
            .add_object_at(TileObjectData::Mushroom, &Position::new(73.0, 12.0))
            .unwrap();
        let obj = map.object(id).unwrap();
        assert_eq!(obj.tile, TileCoord::new(7, 1));
        assert_eq!(obj.position, Position::new(75.0, 15.0));
        let chunk = map
            .chunks()
            .find(|c| c.used_tiles.contains(&obj.tile))
            .unwrap();
        assert_eq!(chunk.key, ChunkKey { x: 1, y: 0 });
        assert_eq!(chunk.objects(TileObjectKind::Mushroom).len(), 1);
    }

    #[test]
    fn occupied_tile_rejects_exact_placement() {
        let mut map = small_map();
        let pos = Position::new(5.0, 5.0);
        assert!(map.add_object_at(TileObjectData::Mushroom, &pos).is_some());
        assert!(map.add_object_at(TileObjectData::Mushroom, &pos).is_none());
    }

    #[test]
    fn add_object_picks_nearby_free_tile() {
        let mut map = small_map();
        let mut rng = SmallRng::seed_from_u64(1);
        let center = Position::new(55.0, 55.0);
        let first = map
            .add_object(TileObjectData::Mushroom, &center, 30.0, &mut rng)
            .unwrap();
        let second = map
            .add_object(TileObjectData::Mushroom, &center, 30.0, &mut rng)
            .unwrap();
        assert_eq!(map.object(first).unwrap().tile, TileCoord::new(5, 5));
        let second_pos = map.object(second).unwrap().position;
        assert!(second_pos.distance(&center) <= 15.0, "neighbour tile expected");
    }

    #[test]
    fn add_object_fails_when_full() {
        let mut map = Map::new(&MapConfig {
            width_tiles: 1,
            height_tiles: 1,
            chunk_tiles: 1,
            tile_size: 10.0,
            ..MapConfig::default()
        });
        let mut rng = SmallRng::seed_from_u64(1);
        let c = Position::new(5.0, 5.0);
        assert!(map.add_object(TileObjectData::Mushroom, &c, 50.0, &mut rng).is_some());
        assert!(map.add_object(TileObjectData::Mushroom, &c, 50.0, &mut rng).is_none());
    }

    #[test]
    fn delete_frees_tile_and_index() {
        let mut map = small_map();
        let pos = Position::new(5.0, 5.0);
        let id = map.add_object_at(TileObjectData::Mushroom, &pos).unwrap();
        let removed = map.delete_object(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(map.object(id).is_none());
        assert!(map.is_free(removed.tile));
        assert!(map.delete_object(id).is_none());
    }

    #[test]
    fn chunks_in_distance_limits_to_circle() {
        let map = small_map();
        let near = map.chunks_in_distance(&Position::new(25.0, 25.0), 1.0);
        assert_eq!(near.len(), 1);
        let corner = map.chunks_in_distance(&Position::new(50.0, 50.0), 1.0);
        assert_eq!(corner.len(), 4);
        let all = map.chunks_in_distance(&Position::new(100.0, 100.0), 1_000.0);
        assert_eq!(all.len(), 16);
    }

    #[test]
    fn find_nearest_respects_radius_and_filter() {
        let mut map = small_map();
        let a = map
            .add_object_at(TileObjectData::Tree(Tree { growth: 0.2 }), &Position::new(15.0, 5.0))
            .unwrap();
        let b = map
            .add_object_at(TileObjectData::Tree(Tree { growth: 1.0 }), &Position::new(45.0, 5.0))
            .unwrap();
        let origin = Position::new(5.0, 5.0);
        let nearest = map.find_nearest(&origin, TileObjectKind::Tree, 100.0, |_| true);
        assert_eq!(nearest.unwrap().id, a);
        let grown = map.find_nearest(&origin, TileObjectKind::Tree, 100.0, |o| {
            o.as_tree().is_some_and(Tree::is_grown)
        });
        assert_eq!(grown.unwrap().id, b);
        assert!(map.find_nearest(&origin, TileObjectKind::Tree, 5.0, |_| true).is_none());
    }

    #[test]
    fn drain_skips_removed_objects() {
        let mut map = small_map();
        let a = map.add_object_at(TileObjectData::Mushroom, &Position::new(5.0, 5.0)).unwrap();
        let b = map.add_object_at(TileObjectData::Mushroom, &Position::new(15.0, 5.0)).unwrap();
        map.schedule(a, 10);
        map.schedule(b, 20);
        map.delete_object(a);
        assert!(map.drain_due(5).is_empty());
        assert_eq!(map.drain_due(25), vec![b]);
        assert!(map.tick_queue().is_empty());
    }
}
