use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use zoe_core::{ErrorKind, UserId};

use crate::handler::ExpertHandler;
use crate::types::{ExpertContext, ExpertResult};
use crate::ExpertError;

const EXECUTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Registry of experts, keyed by name, with the timeout/idempotency/retry
/// policy from spec §4.4 applied uniformly at dispatch time.
///
/// Registration happens once at startup; there is no runtime patching of the
/// registered set.
pub struct ExpertRegistry {
    experts: Vec<Arc<dyn ExpertHandler>>,
    idempotency_cache: DashMap<String, ExpertResult>,
}

impl ExpertRegistry {
    pub fn new() -> Self {
        Self { experts: Vec::new(), idempotency_cache: DashMap::new() }
    }

    pub fn register(&mut self, expert: Arc<dyn ExpertHandler>) {
        self.experts.push(expert);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ExpertHandler>> {
        self.experts.iter().find(|e| e.name() == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.experts.iter().map(|e| e.name()).collect()
    }

    /// Ranks every registered expert by `can_handle` confidence for `query`,
    /// highest first.
    pub async fn rank(&self, query: &str, context: &ExpertContext) -> Vec<(Arc<dyn ExpertHandler>, f32)> {
        let mut ranked = Vec::with_capacity(self.experts.len());
        for expert in &self.experts {
            let confidence = expert.can_handle(query, context).await;
            ranked.push((expert.clone(), confidence));
        }
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    /// Executes `name` under the 30s hard timeout, deduplicating on
    /// `idempotency_key` and retrying once if the first attempt's
    /// `error_kind` is transient or timeout (spec §4.4).
    pub async fn execute(
        &self,
        name: &str,
        query: &str,
        user_id: &UserId,
        context: &ExpertContext,
        idempotency_key: Option<&str>,
    ) -> Result<ExpertResult, ExpertError> {
        if let Some(key) = idempotency_key {
            if let Some(cached) = self.idempotency_cache.get(key) {
                return Ok(cached.clone());
            }
        }

        let expert = self.get(name).ok_or_else(|| ExpertError::NotRegistered(name.to_string()))?.clone();

        let mut result = Self::execute_once(&expert, query, user_id, context).await;
        if let Ok(ref r) = result {
            if !r.success && r.is_retryable() {
                result = Self::execute_once(&expert, query, user_id, context).await;
            }
        }
        let result = result?;

        if let Some(key) = idempotency_key {
            self.idempotency_cache.insert(key.to_string(), result.clone());
        }

        Ok(result)
    }

    async fn execute_once(
        expert: &Arc<dyn ExpertHandler>,
        query: &str,
        user_id: &UserId,
        context: &ExpertContext,
    ) -> Result<ExpertResult, ExpertError> {
        match tokio::time::timeout(EXECUTE_TIMEOUT, expert.execute(query, user_id, context)).await {
            Ok(result) => result,
            Err(_elapsed) => Ok(ExpertResult::failed(format!("{} timed out", expert.name()), ErrorKind::Timeout)),
        }
    }
}

impl Default for ExpertRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FlakyExpert {
        attempts: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl ExpertHandler for FlakyExpert {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn can_handle(&self, _query: &str, _context: &ExpertContext) -> f32 {
            1.0
        }

        async fn execute(&self, _query: &str, _user_id: &UserId, _context: &ExpertContext) -> Result<ExpertResult, ExpertError> {
            let n = self.attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n == 0 {
                Ok(ExpertResult::failed("transient hiccup", ErrorKind::Transient))
            } else {
                Ok(ExpertResult::ok("recovered", 0.9))
            }
        }
    }

    #[tokio::test]
    async fn not_registered_returns_error() {
        let registry = ExpertRegistry::new();
        let user_id = UserId("u1".to_string());
        let err = registry.execute("lists", "q", &user_id, &ExpertContext::default(), None).await.unwrap_err();
        assert!(matches!(err, ExpertError::NotRegistered(_)));
    }

    #[tokio::test]
    async fn retries_once_on_transient_failure() {
        let mut registry = ExpertRegistry::new();
        registry.register(Arc::new(FlakyExpert { attempts: std::sync::atomic::AtomicUsize::new(0) }));
        let user_id = UserId("u1".to_string());
        let result = registry.execute("flaky", "q", &user_id, &ExpertContext::default(), None).await.unwrap();
        assert!(result.success);
        assert_eq!(result.content, "recovered");
    }

    #[tokio::test]
    async fn idempotency_key_short_circuits_second_call() {
        let mut registry = ExpertRegistry::new();
        registry.register(Arc::new(FlakyExpert { attempts: std::sync::atomic::AtomicUsize::new(0) }));
        let user_id = UserId("u1".to_string());
        let first = registry.execute("flaky", "q", &user_id, &ExpertContext::default(), Some("key-1")).await.unwrap();
        let second = registry.execute("flaky", "q", &user_id, &ExpertContext::default(), Some("key-1")).await.unwrap();
        assert_eq!(first.content, second.content);
    }
}
