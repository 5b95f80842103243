//! Episodes, turns and temporal queries (spec §4.2).

pub mod error;
pub mod repository;
pub mod service;

pub use error::TemporalError;
pub use repository::{
    EpisodeRepository, InMemoryEpisodeRepository, InMemoryTurnRepository, SharedEpisodeRepository,
    SharedTurnRepository, TurnRepository,
};
pub use service::{TemporalMemory, TimeRange};
