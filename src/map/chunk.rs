use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::object::{TileCoord, TileObject, TileObjectKind};
use crate::id::ObjectId;
use crate::model::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    pub x: i32,
    pub y: i32,
}

/// Fixed-size square of tiles. Owns the objects placed on its tiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub key: ChunkKey,
    pub tile_objects: BTreeMap<TileObjectKind, Vec<TileObject>>,
    pub empty_tiles: BTreeSet<TileCoord>,
    pub used_tiles: BTreeSet<TileCoord>,
}

impl Chunk {
    pub fn new(key: ChunkKey, tiles: impl IntoIterator<Item = TileCoord>) -> Self {
        Self {
            key,
            tile_objects: BTreeMap::new(),
            empty_tiles: tiles.into_iter().collect(),
            used_tiles: BTreeSet::new(),
        }
    }

    pub fn is_free(&self, tile: TileCoord) -> bool {
        self.empty_tiles.contains(&tile)
    }

    /// Claim `tile` and store the object. The tile must be free.
    pub(super) fn insert(&mut self, object: TileObject) {
        let tile = object.tile;
        assert!(
            self.empty_tiles.remove(&tile),
            "chunk insert: tile {tile:?} already used"
        );
        self.used_tiles.insert(tile);
        self.tile_objects
            .entry(object.kind())
            .or_default()
            .push(object);
    }

    /// Remove the object and free its tile.
    pub(super) fn remove(&mut self, kind: TileObjectKind, id: ObjectId) -> Option<TileObject> {
        let list = self.tile_objects.get_mut(&kind)?;
        let index = list.iter().position(|o| o.id == id)?;
        let object = list.remove(index);
        self.used_tiles.remove(&object.tile);
        self.empty_tiles.insert(object.tile);
        Some(object)
    }

    pub fn objects(&self, kind: TileObjectKind) -> &[TileObject] {
        self.tile_objects
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(super) fn object_mut(&mut self, kind: TileObjectKind, id: ObjectId) -> Option<&mut TileObject> {
        self.tile_objects
            .get_mut(&kind)?
            .iter_mut()
            .find(|o| o.id == id)
    }

    /// Closest point of the chunk's rectangle to `pos`.
    pub fn closest_point(&self, pos: &Position, chunk_units: f64) -> Position {
        let min_x = f64::from(self.key.x) * chunk_units;
        let min_y = f64::from(self.key.y) * chunk_units;
        Position::new(
            pos.x.clamp(min_x, min_x + chunk_units),
            pos.y.clamp(min_y, min_y + chunk_units),
        )
    }
}
