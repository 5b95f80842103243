//! Shared application state.
//!
//! `Services` is built once at startup and cloned (cheaply, via `Arc`) into
//! every handler through axum's `State` extractor.

use std::sync::Arc;

use parking_lot::RwLock;

use zoe_cache::ContextCache;
use zoe_config::Settings;
use zoe_experts::{Expert, ExpertRegistry, HomeAutomationConfig};
use zoe_llm::{HttpInferenceBackend, InferenceBackend, LlmConfig};
use zoe_memory::{
    Embedder, EmbeddingConfig, InMemoryEntityRepository, InMemoryFactRepository, InMemoryRelationshipRepository,
    MemoryStore,
};
use zoe_orchestrator::Orchestrator;
use zoe_satisfaction::{InMemoryFeedbackRepository, InMemoryInteractionRepository, SatisfactionTelemetry};
use zoe_temporal::{InMemoryEpisodeRepository, InMemoryTurnRepository, TemporalMemory};

use crate::sessions::{InMemorySessionRepository, SharedSessionRepository};
use crate::ServerError;

/// Every repository/registry/client the handlers need, wired once and
/// shared behind `Arc`s. `config` is the one field that is hot-reloadable
/// (spec §6's admin reload surface), so it sits behind a `RwLock` on its
/// own rather than being swapped as part of the whole struct.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<RwLock<Settings>>,
    pub inference: Arc<dyn InferenceBackend>,
    pub memory: Arc<MemoryStore>,
    pub temporal: Arc<TemporalMemory>,
    pub cache: Arc<ContextCache>,
    pub experts: Arc<ExpertRegistry>,
    pub orchestrator: Arc<Orchestrator>,
    pub satisfaction: Arc<SatisfactionTelemetry>,
    pub sessions: SharedSessionRepository,
}

impl Services {
    /// Wires every in-memory-backed component from `config`. There is no
    /// `zoe-persistence`-backed variant of `Services` yet — swapping a
    /// repository for a ScyllaDB-backed one means constructing it here
    /// directly, field by field (see DESIGN.md).
    pub fn new(config: Settings) -> Result<Self, ServerError> {
        let llm_config = LlmConfig {
            model: config.inference.default_model.clone(),
            endpoint: config.inference.url.clone(),
            ..LlmConfig::default()
        };
        let inference: Arc<dyn InferenceBackend> =
            Arc::new(HttpInferenceBackend::new(llm_config).map_err(|e| ServerError::Internal(e.to_string()))?);

        let embedding_config = EmbeddingConfig { embedding_dim: config.memory.embedding_dim, ..EmbeddingConfig::default() };
        let embedder = Arc::new(
            Embedder::new("", "", embedding_config).map_err(|e| ServerError::Internal(e.to_string()))?,
        );
        let memory = Arc::new(MemoryStore::new(
            embedder,
            Arc::new(InMemoryFactRepository::default()),
            Arc::new(InMemoryEntityRepository::default()),
            Arc::new(InMemoryRelationshipRepository::default()),
        ));

        let temporal = Arc::new(TemporalMemory::new(
            Arc::new(InMemoryEpisodeRepository::default()),
            Arc::new(InMemoryTurnRepository::default()),
            memory.clone(),
            inference.clone(),
        ));

        let cache = Arc::new(
            ContextCache::new(inference.clone())
                .with_ttl_seconds(config.cache.ttl_seconds)
                .with_min_fetch_ms(config.cache.min_fetch_ms),
        );

        let home_automation_config = HomeAutomationConfig {
            controller_url: config.experts.home_automation_url.clone(),
            allow_list: config.experts.home_automation_allow_list.clone(),
        };
        let mut registry = ExpertRegistry::new();
        for expert in Expert::all() {
            registry.register(expert.build_handler(inference.clone(), &home_automation_config));
        }
        let experts = Arc::new(registry);

        let orchestrator = Arc::new(Orchestrator::new(experts.clone(), inference.clone()));

        let satisfaction = Arc::new(SatisfactionTelemetry::new(
            Arc::new(InMemoryFeedbackRepository::default()),
            Arc::new(InMemoryInteractionRepository::default()),
        ));

        let sessions: SharedSessionRepository = Arc::new(InMemorySessionRepository::default());

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            inference,
            memory,
            temporal,
            cache,
            experts,
            orchestrator,
            satisfaction,
            sessions,
        })
    }

    /// Reads the current soft request budget (spec §5), re-read on every
    /// call so an admin config reload takes effect without a restart.
    pub fn request_soft_budget_seconds(&self) -> u64 {
        self.config.read().server.request_soft_budget_seconds
    }

    pub fn expert_timeout_seconds(&self) -> u64 {
        self.config.read().experts.timeout_seconds
    }

    /// Runs once before the HTTP listener starts accepting connections.
    /// Confirms the inference backend is reachable; logs and continues if
    /// not, since the chat pipeline must still degrade gracefully without
    /// it (spec §8 scenario 6).
    pub async fn startup(&self) {
        if !self.inference.is_available().await {
            tracing::warn!(model = self.inference.model_name(), "inference backend unreachable at startup");
        }
    }

    /// Runs on graceful shutdown. Nothing here blocks on network I/O: every
    /// repository in this build is in-memory, so there is nothing to flush.
    /// A `zoe-persistence`-backed `Services` overrides this to drain its
    /// connection pool.
    pub async fn shutdown(&self) {
        tracing::info!("services shutting down");
    }
}
