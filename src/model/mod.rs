#[macro_use]
mod macros;

pub mod building;
pub mod chat;
pub mod citizen;
pub mod inventory;
pub mod item;
pub mod position;
pub mod traits;
pub mod world;

pub use building::{Building, BuildingKind, MarketCounter, MarketState};
pub use chat::{ChatLog, Intention, MarketTradeIntention, MarketTradeStep, Message, SmallTalkStep};
pub use citizen::{
    Citizen, CitizenLog, CitizenMemory, Death, DeathReason, LogEntry, RememberedCitizen,
    StateInfo, ThoughtBubble, TodoEntry, TodoTask,
};
pub use inventory::{Inventory, InventoryItem, ItemUnitData, ReservedSpace, move_item_between};
pub use item::ItemName;
pub use position::Position;
pub use traits::{CitizenTrait, TraitModifiers};
pub use world::World;
