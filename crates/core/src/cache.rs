//! TTL cache over detection results with single-flight batch passes.
//!
//! Validity is cache-wide: either the whole store is fresh (stamp younger
//! than the TTL and non-empty) or the whole store is stale. There is no
//! per-entry expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::Mutex;
use toolgate_api_types::{DetectedTool, DetectionRequest, DetectionResult, ToolId, ToolStatus};
use tracing::{debug, info};

use crate::detect::ToolProbe;

/// Default time-to-live for detection results.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Shared, mutex-guarded detection cache. Explicitly constructed; the
/// composition root owns the only instance.
pub struct DetectionCache {
    probe: Arc<dyn ToolProbe>,
    ttl: Duration,
    store: Mutex<CacheStore>,
}

#[derive(Default)]
struct CacheStore {
    entries: HashMap<ToolId, DetectedTool>,
    stamped_at: Option<Instant>,
    stamped_wall: Option<DateTime<Utc>>,
}

impl CacheStore {
    fn is_valid(&self, ttl: Duration) -> bool {
        match self.stamped_at {
            Some(stamp) => !self.entries.is_empty() && stamp.elapsed() < ttl,
            None => false,
        }
    }

    fn stamp(&mut self) {
        self.stamped_at = Some(Instant::now());
        self.stamped_wall = Some(Utc::now());
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.stamped_at = None;
        self.stamped_wall = None;
    }

    /// Snapshot in stable tool order.
    fn snapshot(&self) -> Vec<DetectedTool> {
        ToolId::all()
            .iter()
            .filter_map(|tool| self.entries.get(tool).cloned())
            .collect()
    }
}

impl DetectionCache {
    pub fn new(probe: Arc<dyn ToolProbe>, ttl: Duration) -> Self {
        Self {
            probe,
            ttl,
            store: Mutex::new(CacheStore::default()),
        }
    }

    pub fn with_default_ttl(probe: Arc<dyn ToolProbe>) -> Self {
        Self::new(probe, DEFAULT_CACHE_TTL)
    }

    /// Status of a single tool: the cached entry while the cache is valid,
    /// otherwise a fresh single-tool probe that refreshes the stamp.
    pub async fn get_status(&self, tool: ToolId) -> DetectedTool {
        {
            let store = self.store.lock().await;
            if store.is_valid(self.ttl) {
                if let Some(found) = store.entries.get(&tool) {
                    debug!(tool = %tool, "detection cache hit");
                    return found.clone();
                }
            }
        }

        let found = self.probe.detect(tool).await;
        let mut store = self.store.lock().await;
        store.entries.insert(tool, found.clone());
        store.stamp();
        found
    }

    /// Batch detection. A valid cache satisfies non-forced requests with a
    /// zero-latency snapshot; otherwise the whole pass runs under the store
    /// lock, one pass system-wide at a time. Per-tool failures become
    /// error-status placeholders and entries in `errors`; they never abort
    /// the batch.
    pub async fn detect_all(&self, request: &DetectionRequest) -> DetectionResult {
        let started = Instant::now();
        let mut store = self.store.lock().await;

        if !request.force_refresh && store.is_valid(self.ttl) {
            let tools = store.snapshot();
            debug!(count = tools.len(), "serving cached detection snapshot");
            return DetectionResult {
                total_detected: count_available(&tools),
                detection_timestamp: store.stamped_wall.unwrap_or_else(Utc::now),
                tools,
                errors: Vec::new(),
                execution_time_ms: 0.0,
            };
        }

        if request.force_refresh {
            store.reset();
        }

        let mut tools = Vec::with_capacity(request.tools_to_detect.len());
        let mut errors = Vec::new();

        for &tool in &request.tools_to_detect {
            let found = self.probe.detect(tool).await;
            if found.status == ToolStatus::Error {
                if let Some(cause) = found.metadata.get("error") {
                    errors.push(format!("Error detecting {tool}: {cause}"));
                }
            }
            store.entries.insert(tool, found.clone());
            tools.push(found);
        }
        store.stamp();

        let result = DetectionResult {
            total_detected: count_available(&tools),
            detection_timestamp: Utc::now(),
            tools,
            errors,
            execution_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        };

        info!(
            tools = result.tools.len(),
            available = result.total_detected,
            errors = result.errors.len(),
            elapsed_ms = result.execution_time_ms,
            "detection pass completed"
        );

        result
    }

    /// Version of a single tool, if it is available.
    pub async fn get_version(&self, tool: ToolId) -> Option<String> {
        let found = self.get_status(tool).await;
        if found.is_available() {
            found.version
        } else {
            None
        }
    }

    /// Drop all entries and the stamp atomically.
    pub async fn clear(&self) {
        let mut store = self.store.lock().await;
        store.reset();
        info!("detection cache cleared");
    }

    /// Count of cached tools currently reported available.
    pub async fn available_count(&self) -> usize {
        let store = self.store.lock().await;
        store
            .entries
            .values()
            .filter(|t| t.is_available())
            .count()
    }

    /// Summary of cache state for status/health reporting.
    pub async fn summary(&self) -> serde_json::Value {
        let store = self.store.lock().await;
        json!({
            "cache_valid": store.is_valid(self.ttl),
            "cache_timestamp": store.stamped_wall,
            "cached_tools": store.entries.len(),
            "supported_tools": ToolId::all().len(),
            "cache_ttl_secs": self.ttl.as_secs(),
        })
    }
}

fn count_available(tools: &[DetectedTool]) -> usize {
    tools.iter().filter(|t| t.is_available()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Probe that counts invocations and answers from a canned table.
    struct CountingProbe {
        calls: AtomicUsize,
        available: Vec<ToolId>,
        failing: Vec<ToolId>,
    }

    impl CountingProbe {
        fn new(available: Vec<ToolId>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                available,
                failing: Vec::new(),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ToolProbe for CountingProbe {
        async fn detect(&self, tool: ToolId) -> DetectedTool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(&tool) {
                DetectedTool::error(tool, "probe exploded")
            } else if self.available.contains(&tool) {
                let mut found = DetectedTool::missing(tool, "unused");
                found.status = ToolStatus::Available;
                found.version = Some("1.0.0".to_string());
                found.metadata.clear();
                found
                    .metadata
                    .insert("command".to_string(), tool.executable().to_string());
                found
            } else {
                DetectedTool::missing(tool, "not found")
            }
        }
    }

    fn cache_with(probe: CountingProbe, ttl: Duration) -> (Arc<CountingProbe>, DetectionCache) {
        let probe = Arc::new(probe);
        let cache = DetectionCache::new(probe.clone(), ttl);
        (probe, cache)
    }

    #[tokio::test]
    async fn get_status_is_idempotent_within_ttl() {
        let (probe, cache) = cache_with(
            CountingProbe::new(vec![ToolId::ClaudeCode]),
            Duration::from_secs(300),
        );

        let first = cache.get_status(ToolId::ClaudeCode).await;
        let second = cache.get_status(ToolId::ClaudeCode).await;

        assert_eq!(probe.calls(), 1, "second call must not probe");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn expired_cache_reprobes() {
        let (probe, cache) = cache_with(
            CountingProbe::new(vec![ToolId::ClaudeCode]),
            Duration::ZERO,
        );

        cache.get_status(ToolId::ClaudeCode).await;
        cache.get_status(ToolId::ClaudeCode).await;
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test]
    async fn valid_cache_serves_snapshot_with_zero_latency() {
        let (probe, cache) = cache_with(
            CountingProbe::new(vec![ToolId::ClaudeCode]),
            Duration::from_secs(300),
        );

        let request = DetectionRequest::default();
        let first = cache.detect_all(&request).await;
        assert_eq!(probe.calls(), 3);
        assert_eq!(first.total_detected, 1);

        let second = cache.detect_all(&request).await;
        assert_eq!(probe.calls(), 3, "cached snapshot must not probe");
        assert_eq!(second.execution_time_ms, 0.0);
        assert_eq!(second.tools.len(), 3);
        assert!(second.errors.is_empty());
    }

    #[tokio::test]
    async fn force_refresh_always_reprobes() {
        let (probe, cache) = cache_with(
            CountingProbe::new(vec![ToolId::ClaudeCode]),
            Duration::from_secs(300),
        );

        let request = DetectionRequest {
            tools_to_detect: ToolId::all().to_vec(),
            force_refresh: true,
        };
        cache.detect_all(&request).await;
        cache.detect_all(&request).await;
        assert_eq!(probe.calls(), 6);
    }

    #[tokio::test]
    async fn per_tool_errors_do_not_abort_the_batch() {
        let probe = CountingProbe {
            calls: AtomicUsize::new(0),
            available: vec![ToolId::GeminiCli],
            failing: vec![ToolId::ClaudeCode],
        };
        let (_, cache) = cache_with(probe, Duration::from_secs(300));

        let result = cache.detect_all(&DetectionRequest::default()).await;
        assert_eq!(result.tools.len(), 3);
        assert_eq!(result.total_detected, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("claude_code"));
    }

    #[tokio::test]
    async fn clear_invalidates_the_cache() {
        let (probe, cache) = cache_with(
            CountingProbe::new(vec![ToolId::ClaudeCode]),
            Duration::from_secs(300),
        );

        cache.get_status(ToolId::ClaudeCode).await;
        cache.clear().await;
        cache.get_status(ToolId::ClaudeCode).await;
        assert_eq!(probe.calls(), 2);

        let summary = cache.summary().await;
        assert_eq!(summary["cached_tools"], 1);
        assert_eq!(summary["supported_tools"], 3);
    }

    #[tokio::test]
    async fn version_only_for_available_tools() {
        let (_, cache) = cache_with(
            CountingProbe::new(vec![ToolId::ClaudeCode]),
            Duration::from_secs(300),
        );

        assert_eq!(
            cache.get_version(ToolId::ClaudeCode).await.as_deref(),
            Some("1.0.0")
        );
        assert_eq!(cache.get_version(ToolId::QwenCode).await, None);
    }
}
