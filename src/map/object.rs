use serde::{Deserialize, Serialize};

use crate::id::{CitizenId, ObjectId};
use crate::model::{Building, Position};

/// Global tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TileObjectKind {
    Tree,
    Mushroom,
    FarmTile,
    Building,
}

string_enum!(TileObjectKind {
    Tree => "tree",
    Mushroom => "mushroom",
    FarmTile => "farm_tile",
    Building => "building",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    /// 1.0 is fully grown and can be cut.
    pub growth: f64,
}

impl Tree {
    pub fn is_grown(&self) -> bool {
        self.growth >= 1.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmTile {
    pub owner: CitizenId,
    /// `None` while unplanted, otherwise crop growth where 1.0 is ripe.
    pub crop: Option<f64>,
}

impl FarmTile {
    pub fn is_ripe(&self) -> bool {
        self.crop.is_some_and(|g| g >= 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TileObjectData {
    Tree(Tree),
    Mushroom,
    FarmTile(FarmTile),
    Building(Building),
}

impl TileObjectData {
    pub fn kind(&self) -> TileObjectKind {
        match self {
            TileObjectData::Tree(_) => TileObjectKind::Tree,
            TileObjectData::Mushroom => TileObjectKind::Mushroom,
            TileObjectData::FarmTile(_) => TileObjectKind::FarmTile,
            TileObjectData::Building(_) => TileObjectKind::Building,
        }
    }
}

/// A stationary object occupying exactly one tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileObject {
    pub id: ObjectId,
    pub tile: TileCoord,
    /// Center of `tile` in world units.
    pub position: Position,
    pub data: TileObjectData,
}

impl TileObject {
    pub fn kind(&self) -> TileObjectKind {
        self.data.kind()
    }

    pub fn as_tree(&self) -> Option<&Tree> {
        match &self.data {
            TileObjectData::Tree(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_farm_tile(&self) -> Option<&FarmTile> {
        match &self.data {
            TileObjectData::FarmTile(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_farm_tile_mut(&mut self) -> Option<&mut FarmTile> {
        match &mut self.data {
            TileObjectData::FarmTile(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_building(&self) -> Option<&Building> {
        match &self.data {
            TileObjectData::Building(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_building_mut(&mut self) -> Option<&mut Building> {
        match &mut self.data {
            TileObjectData::Building(b) => Some(b),
            _ => None,
        }
    }
}
