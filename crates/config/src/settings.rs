//! Main settings module.
//!
//! Layers, in increasing precedence: `config/default.yaml`,
//! `config/{env}.yaml`, then `ZOE__`-prefixed environment variables. This
//! mirrors the voice-agent's `VOICE_AGENT__`-prefixed layering, renamed to
//! the environment variables enumerated in spec §6.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Runtime environment: relaxes/tightens validation strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Top-level application settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub inference: InferenceConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub episode_timeouts: EpisodeTimeoutConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub experts: ExpertsConfig,

    #[serde(default)]
    pub satisfaction: SatisfactionConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_enabled: bool,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_request_soft_budget_seconds")]
    pub request_soft_budget_seconds: u64,
    /// Base URL of the auth collaborator (spec §6). `None` when unset, in
    /// which case every request resolves to `UserId::default_user()`.
    #[serde(default = "default_auth_url")]
    pub auth_url: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_soft_budget_seconds() -> u64 {
    std::env::var("REQUEST_SOFT_BUDGET_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60)
}

fn default_auth_url() -> Option<String> {
    std::env::var("AUTH_URL").ok()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            auth_url: default_auth_url(),
            request_soft_budget_seconds: default_request_soft_budget_seconds(),
        }
    }
}

/// Inference backend (consumed collaborator, spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_inference_url")]
    pub url: String,
    #[serde(default = "default_inference_model")]
    pub default_model: String,
    #[serde(default = "default_intent_timeout_seconds")]
    pub intent_analysis_timeout_seconds: u64,
}

fn default_inference_url() -> String {
    std::env::var("INFERENCE_URL").unwrap_or_else(|_| "http://localhost:11434".to_string())
}

fn default_inference_model() -> String {
    std::env::var("INFERENCE_DEFAULT_MODEL").unwrap_or_else(|_| "qwen2.5:7b-instruct".to_string())
}

fn default_intent_timeout_seconds() -> u64 {
    5
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            url: default_inference_url(),
            default_model: default_inference_model(),
            intent_analysis_timeout_seconds: default_intent_timeout_seconds(),
        }
    }
}

/// Memory store configuration (spec §4.1, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    #[serde(default = "default_decay_halflife_days")]
    pub decay_halflife_days: f64,
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
}

fn default_embedding_dim() -> usize {
    std::env::var("MEMORY_EMBEDDING_DIM")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(384)
}

fn default_decay_halflife_days() -> f64 {
    std::env::var("MEMORY_DECAY_HALFLIFE_DAYS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30.0)
}

fn default_min_similarity() -> f32 {
    0.3
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            embedding_dim: default_embedding_dim(),
            decay_halflife_days: default_decay_halflife_days(),
            min_similarity: default_min_similarity(),
        }
    }
}

/// Per context_type idle timeout, in minutes (spec §4.2, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeTimeoutConfig {
    #[serde(default = "default_chat_timeout")]
    pub chat_minutes: i64,
    #[serde(default = "default_general_timeout")]
    pub general_minutes: i64,
    #[serde(default = "default_planning_timeout")]
    pub planning_minutes: i64,
    #[serde(default = "default_development_timeout")]
    pub development_minutes: i64,
}

fn env_or(key: &str, default: i64) -> i64 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn default_chat_timeout() -> i64 {
    env_or("EPISODE_TIMEOUT_CHAT_MIN", 30)
}
fn default_general_timeout() -> i64 {
    env_or("EPISODE_TIMEOUT_GENERAL_MIN", 45)
}
fn default_planning_timeout() -> i64 {
    env_or("EPISODE_TIMEOUT_PLANNING_MIN", 60)
}
fn default_development_timeout() -> i64 {
    env_or("EPISODE_TIMEOUT_DEVELOPMENT_MIN", 120)
}

impl Default for EpisodeTimeoutConfig {
    fn default() -> Self {
        Self {
            chat_minutes: default_chat_timeout(),
            general_minutes: default_general_timeout(),
            planning_minutes: default_planning_timeout(),
            development_minutes: default_development_timeout(),
        }
    }
}

/// Context cache configuration (spec §4.3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: i64,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_cache_min_fetch_ms")]
    pub min_fetch_ms: u64,
}

fn default_cache_ttl() -> i64 {
    env_or("CACHE_TTL_SECONDS", 86_400)
}
fn default_cache_max_entries() -> usize {
    env_or("CACHE_MAX_ENTRIES", 1000) as usize
}
fn default_cache_min_fetch_ms() -> u64 {
    100
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_ttl(),
            max_entries: default_cache_max_entries(),
            min_fetch_ms: default_cache_min_fetch_ms(),
        }
    }
}

/// Expert execution configuration (spec §4.4, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertsConfig {
    #[serde(default = "default_expert_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_can_handle_timeout_ms")]
    pub can_handle_timeout_ms: u64,
    /// Base URL of the home automation controller the `home_automation`
    /// expert is allowed to call.
    #[serde(default = "default_home_automation_url")]
    pub home_automation_url: String,
    /// Device names the `home_automation` expert may toggle. Empty means no
    /// device may be controlled; the expert still answers in text only.
    #[serde(default)]
    pub home_automation_allow_list: Vec<String>,
}

fn default_expert_timeout_seconds() -> u64 {
    env_or("EXPERT_TIMEOUT_SECONDS", 30) as u64
}
fn default_can_handle_timeout_ms() -> u64 {
    200
}
fn default_home_automation_url() -> String {
    std::env::var("HOME_AUTOMATION_URL").unwrap_or_else(|_| "http://localhost:8123".to_string())
}

impl Default for ExpertsConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_expert_timeout_seconds(),
            can_handle_timeout_ms: default_can_handle_timeout_ms(),
            home_automation_url: default_home_automation_url(),
            home_automation_allow_list: Vec::new(),
        }
    }
}

/// Satisfaction composite weights (spec §4.7; configurable per Open Question decision).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SatisfactionConfig {
    pub response_time_weight: f32,
    pub task_completion_weight: f32,
    pub follow_up_density_weight: f32,
    pub engagement_duration_weight: f32,
    pub rolling_window_days: i64,
}

impl Default for SatisfactionConfig {
    fn default() -> Self {
        Self {
            response_time_weight: 0.3,
            task_completion_weight: 0.3,
            follow_up_density_weight: 0.2,
            engagement_duration_weight: 0.2,
            rolling_window_days: 30,
        }
    }
}

/// ScyllaDB persistence configuration, adapted from the teacher's `PersistenceConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_scylla_hosts")]
    pub scylla_hosts: Vec<String>,
    #[serde(default = "default_scylla_keyspace")]
    pub keyspace: String,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u8,
}

fn default_scylla_hosts() -> Vec<String> {
    std::env::var("SCYLLA_HOSTS")
        .map(|s| s.split(',').map(|h| h.trim().to_string()).collect())
        .unwrap_or_else(|_| vec!["127.0.0.1:9042".to_string()])
}

fn default_scylla_keyspace() -> String {
    std::env::var("SCYLLA_KEYSPACE").unwrap_or_else(|_| "zoe".to_string())
}

fn default_replication_factor() -> u8 {
    1
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scylla_hosts: default_scylla_hosts(),
            keyspace: default_scylla_keyspace(),
            replication_factor: default_replication_factor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub json_logs: bool,
    #[serde(default)]
    pub telemetry_enabled: bool,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_memory()?;
        self.validate_satisfaction()?;
        self.validate_server()?;
        Ok(())
    }

    fn validate_memory(&self) -> Result<(), ConfigError> {
        if self.memory.embedding_dim == 0 {
            return Err(ConfigError::InvalidValue {
                field: "memory.embedding_dim".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.memory.min_similarity) {
            return Err(ConfigError::InvalidValue {
                field: "memory.min_similarity".to_string(),
                message: format!("must be in [0,1], got {}", self.memory.min_similarity),
            });
        }
        Ok(())
    }

    fn validate_satisfaction(&self) -> Result<(), ConfigError> {
        let s = &self.satisfaction;
        let sum = s.response_time_weight
            + s.task_completion_weight
            + s.follow_up_density_weight
            + s.engagement_duration_weight;
        if (sum - 1.0).abs() > 0.01 {
            return Err(ConfigError::InvalidValue {
                field: "satisfaction.*_weight".to_string(),
                message: format!("weights must sum to 1.0, got {}", sum),
            });
        }
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "port cannot be 0".to_string(),
            });
        }
        if self.environment.is_production() && self.server.cors_enabled && self.server.cors_origins.is_empty() {
            tracing::warn!(
                "CORS is enabled in production but no origins are configured; this may block legitimate requests"
            );
        }
        Ok(())
    }
}

/// Load settings layering, in increasing precedence:
/// 1. `config/default.yaml`
/// 2. `config/{env}.yaml` (if `env` given)
/// 3. `ZOE__`-prefixed environment variables
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder = builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("ZOE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.memory.embedding_dim, 384);
    }

    #[test]
    fn episode_timeouts_match_spec_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.episode_timeouts.chat_minutes, 30);
        assert_eq!(settings.episode_timeouts.general_minutes, 45);
        assert_eq!(settings.episode_timeouts.planning_minutes, 60);
        assert_eq!(settings.episode_timeouts.development_minutes, 120);
    }

    #[test]
    fn satisfaction_weights_must_sum_to_one() {
        let mut settings = Settings::default();
        settings.satisfaction.response_time_weight = 0.9;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn invalid_embedding_dim_rejected() {
        let mut settings = Settings::default();
        settings.memory.embedding_dim = 0;
        assert!(settings.validate().is_err());
    }
}
