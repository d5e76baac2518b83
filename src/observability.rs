use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Default, Serialize, Clone)]
pub struct MetricsSnapshot {
    pub actions: BTreeMap<String, ActionMetrics>,
    pub effects: BTreeMap<String, u64>,
    pub saves_succeeded: u64,
    pub saves_failed: u64,
    pub fetches_failed: u64,
    pub stale_completions: u64,
}

#[derive(Debug, Default, Serialize, Clone)]
pub struct ActionMetrics {
    pub dispatched: u64,
    pub total_duration_ms: f64,
    pub max_duration_ms: f64,
}

/// Per-session counters. Clones share the same underlying snapshot.
#[derive(Debug, Default, Clone)]
pub struct EditorMetrics {
    inner: Arc<Mutex<MetricsSnapshot>>,
}

impl EditorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_action(&self, kind: &'static str) -> ActionTimer {
        ActionTimer {
            kind,
            started_at: Instant::now(),
            collector: self.inner.clone(),
        }
    }

    pub fn record_effect(&self, kind: &'static str) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard.effects.entry(kind.to_string()).or_default() += 1;
        }
    }

    pub fn record_save(&self, succeeded: bool) {
        if let Ok(mut guard) = self.inner.lock() {
            if succeeded {
                guard.saves_succeeded += 1;
            } else {
                guard.saves_failed += 1;
            }
        }
    }

    pub fn record_fetch_failure(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.fetches_failed += 1;
        }
    }

    pub fn record_stale_completion(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.stale_completions += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn reset(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = MetricsSnapshot::default();
        }
    }
}

/// Records the reducer time for one action when dropped.
pub struct ActionTimer {
    kind: &'static str,
    started_at: Instant,
    collector: Arc<Mutex<MetricsSnapshot>>,
}

impl Drop for ActionTimer {
    fn drop(&mut self) {
        let duration_ms = self.started_at.elapsed().as_secs_f64() * 1_000.0;
        if let Ok(mut guard) = self.collector.lock() {
            let metrics = guard.actions.entry(self.kind.to_string()).or_default();
            metrics.dispatched += 1;
            metrics.total_duration_ms += duration_ms;
            if duration_ms > metrics.max_duration_ms {
                metrics.max_duration_ms = duration_ms;
            }
        }
        debug!(action = self.kind, duration_ms, "Action applied");
    }
}

pub fn log_snapshot(snapshot: &MetricsSnapshot) {
    info!(
        action_kinds = snapshot.actions.len(),
        saves_succeeded = snapshot.saves_succeeded,
        saves_failed = snapshot.saves_failed,
        fetches_failed = snapshot.fetches_failed,
        stale_completions = snapshot.stale_completions,
        "Editor metrics summary"
    );
    for (action, metrics) in &snapshot.actions {
        info!(
            action = action.as_str(),
            dispatched = metrics.dispatched,
            total_ms = metrics.total_duration_ms,
            max_ms = metrics.max_duration_ms,
            "Action metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_records_on_drop() {
        let metrics = EditorMetrics::new();
        drop(metrics.start_action("save"));
        drop(metrics.start_action("save"));
        metrics.record_effect("save_pipeline");
        metrics.record_save(false);

        let snapshot = metrics.clone().snapshot();
        assert_eq!(snapshot.actions["save"].dispatched, 2);
        assert_eq!(snapshot.effects["save_pipeline"], 1);
        assert_eq!(snapshot.saves_failed, 1);

        metrics.reset();
        assert!(metrics.snapshot().actions.is_empty());
    }
}
