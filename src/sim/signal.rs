use serde::{Deserialize, Serialize};

use crate::id::{BuildingId, CitizenId};
use crate::model::DeathReason;

/// A signal emitted by one system and consumed by others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// World time at which it was emitted.
    pub time: u64,
    /// What happened.
    pub kind: SignalKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalKind {
    /// A citizen died this tick. The body stays until the display delay ends.
    CitizenDied {
        citizen: CitizenId,
        reason: DeathReason,
    },

    /// A dead citizen was removed from the world.
    CitizenRemoved { citizen: CitizenId },

    /// A building rotted away and left the map.
    BuildingRemoved { building: BuildingId },

    /// Construction finished.
    BuildingCompleted { building: BuildingId },
}
