//! Configuration layer for the Zoe conversation core.
//!
//! Settings are layered from `config/default.yaml`, an optional
//! `config/{env}.yaml`, and `ZOE__`-prefixed environment variables, using
//! the `config` crate the same way the upstream voice-agent settings module
//! does. The `Settings` struct is hot-reloadable: `zoe-server`'s `Services`
//! container keeps it behind a `parking_lot::RwLock` and swaps it wholesale
//! on reload rather than mutating fields in place.

pub mod error;
pub mod settings;

pub use error::ConfigError;
pub use settings::{
    CacheConfig, EpisodeTimeoutConfig, ExpertsConfig, InferenceConfig, MemoryConfig,
    ObservabilityConfig, PersistenceConfig, RuntimeEnvironment, SatisfactionConfig, ServerConfig,
    Settings, load_settings,
};
