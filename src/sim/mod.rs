pub mod chat;
pub mod citizens;
pub mod commands;
mod context;
pub mod helpers;
pub mod jobs;
pub mod lifecycle;
pub mod map_system;
pub mod market;
pub mod mortality;
pub mod needs;
mod runner;
pub mod signal;
pub mod state_stack;
mod system;
pub mod tasks;

pub use citizens::CitizenSystem;
pub use commands::handle_chat_message;
pub use context::TickContext;
pub use lifecycle::add_citizen;
pub use map_system::MapSystem;
pub use mortality::MortalitySystem;
pub use runner::{Simulation, default_systems, dispatch_systems};
pub use signal::{Signal, SignalKind};
pub use system::SimSystem;
