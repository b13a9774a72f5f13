//! Error types for the fallible edges of the simulation.
//!
//! Invariant violations inside a tick panic instead; see the `# Panics`
//! sections on the inventory and construction code.

use thiserror::Error;

/// Top-level error type for config loading, snapshots and chat intake.
#[derive(Error, Debug)]
pub enum SimError {
    /// Configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A chat command named a citizen that does not exist.
    #[error("Unknown citizen: {0}")]
    UnknownCitizen(String),

    /// A chat command carried an argument that could not be understood.
    #[error("Invalid command argument for {command}: {argument}")]
    InvalidArgument {
        /// The command being parsed.
        command: String,
        /// The offending argument.
        argument: String,
    },

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, SimError>;
