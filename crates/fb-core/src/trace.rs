use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TraceRegistry
// ---------------------------------------------------------------------------

/// Process-wide map from trace id to the most recent activity appended under
/// that trace, used for best-effort auto-chaining when a caller supplies a
/// trace id but no explicit parent.
///
/// Deliberately non-persistent: losing it on restart only affects chaining of
/// *new* activities, never already-persisted ones. Lookup and head update are
/// separate lock acquisitions, so two appends racing on the same trace may
/// resolve the same parent; the last writer's activity becomes the new head.
/// That looseness is accepted — the chain is diagnostic, not a ledger of
/// record.
#[derive(Debug, Clone, Default)]
pub struct TraceRegistry {
    heads: Arc<RwLock<HashMap<String, Uuid>>>,
}

impl TraceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current head activity for a trace, if any.
    pub async fn head(&self, trace_id: &str) -> Option<Uuid> {
        self.heads.read().await.get(trace_id).copied()
    }

    /// Point the trace at a new head activity (last-writer-wins).
    pub async fn set_head(&self, trace_id: &str, activity_id: Uuid) {
        let mut heads = self.heads.write().await;
        heads.insert(trace_id.to_string(), activity_id);
    }

    /// Drop a trace's head pointer. Returns `true` if one was present.
    pub async fn clear(&self, trace_id: &str) -> bool {
        self.heads.write().await.remove(trace_id).is_some()
    }

    /// Number of traces currently tracked.
    pub async fn len(&self) -> usize {
        self.heads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.heads.read().await.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn head_follows_most_recent_set() {
        let registry = TraceRegistry::new();
        assert!(registry.head("t1").await.is_none());

        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        registry.set_head("t1", first).await;
        assert_eq!(registry.head("t1").await, Some(first));

        registry.set_head("t1", second).await;
        assert_eq!(registry.head("t1").await, Some(second));
    }

    #[tokio::test]
    async fn traces_are_independent() {
        let registry = TraceRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.set_head("t1", a).await;
        registry.set_head("t2", b).await;
        assert_eq!(registry.head("t1").await, Some(a));
        assert_eq!(registry.head("t2").await, Some(b));
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn clear_removes_head() {
        let registry = TraceRegistry::new();
        registry.set_head("t1", Uuid::new_v4()).await;
        assert!(registry.clear("t1").await);
        assert!(!registry.clear("t1").await);
        assert!(registry.is_empty().await);
    }
}
