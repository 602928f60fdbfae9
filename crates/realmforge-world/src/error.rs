//! Error types for the world layer.

use realmforge_session::MapInstanceId;

/// Errors that can occur while loading game data or managing instances.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// No map with this id in the game data.
    #[error("map {0} not found")]
    MapNotFound(i16),

    /// The instance does not exist (or was already removed).
    #[error("map instance {0} not found")]
    InstanceNotFound(MapInstanceId),

    /// Base instances live as long as the world and cannot be removed.
    #[error("map instance {0} is a base instance")]
    BaseInstance(MapInstanceId),

    /// The game data file could not be read.
    #[error("failed to read game data: {0}")]
    Io(#[from] std::io::Error),

    /// The game data is not valid JSON for the expected shape.
    #[error("failed to parse game data: {0}")]
    Parse(#[from] serde_json::Error),

    /// The game data parsed but is inconsistent.
    #[error("invalid game data: {0}")]
    InvalidData(String),

    /// The simulation thread pool could not be built.
    #[error("failed to build simulation pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
