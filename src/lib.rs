#[macro_use]
pub mod model;

pub mod config;
pub mod error;
pub mod flush;
pub mod id;
pub mod map;
pub mod scenario;
pub mod sim;
pub mod testutil;

pub use config::SimConfig;
pub use error::{Result, SimError};
pub use id::{BuildingId, CitizenId, IdGenerator, ObjectId};
pub use model::{Citizen, World};
pub use sim::{Simulation, handle_chat_message};
