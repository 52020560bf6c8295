use std::sync::Arc;

use chrono::Utc;
use fb_core::store::{AgentStore, StoreError};
use fb_core::types::{ActivityKind, Agent, AgentStatus, Heartbeat};

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Map an activity classification to the operating status it implies.
///
/// Reasoning-style activity means the agent is thinking; tool or API
/// execution means it is working; a completion or error returns it to idle.
/// Every other kind carries no status signal.
pub fn classify(kind: &ActivityKind) -> Option<AgentStatus> {
    match kind {
        ActivityKind::Turn | ActivityKind::Thought => Some(AgentStatus::Thinking),
        ActivityKind::ToolCall | ActivityKind::ApiCall => Some(AgentStatus::Working),
        ActivityKind::Completion | ActivityKind::Error => Some(AgentStatus::Idle),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// StatusEngine
// ---------------------------------------------------------------------------

/// Derives each agent's operating status from the activity stream and from
/// heartbeats, maintaining the bounded per-agent transition history.
///
/// Updates are read-modify-write through the store; two concurrent updates
/// for the same agent are not serialized against each other. A transition can
/// be dropped from the diagnostic history under that race, but the current
/// status always converges to the most recent event processed.
#[derive(Clone)]
pub struct StatusEngine {
    store: Arc<dyn AgentStore>,
}

impl StatusEngine {
    pub fn new(store: Arc<dyn AgentStore>) -> Self {
        Self { store }
    }

    /// React to one ingested activity. Upserts an idle agent record on first
    /// sight, accumulates token usage, and applies the classification table.
    pub async fn on_activity(
        &self,
        agent_id: &str,
        kind: &ActivityKind,
        total_tokens: u64,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut agent = match self.store.get_agent(agent_id).await? {
            Some(agent) => agent,
            None => Agent::new(agent_id, agent_id),
        };

        agent.last_active = now;
        agent.tokens_used += total_tokens;

        if let Some(target) = classify(kind) {
            agent.transition_to(target, now, kind.as_str());
        }

        self.store.upsert_agent(agent).await
    }

    /// Apply a liveness self-report. Always refreshes heartbeat/activity
    /// timestamps and health, and upserts the agent if unseen. A reported
    /// status is authoritative: it is applied directly, bypassing the
    /// activity classification table.
    pub async fn on_heartbeat(&self, heartbeat: Heartbeat) -> Result<Agent, StoreError> {
        let now = Utc::now();
        let mut agent = match self.store.get_agent(&heartbeat.agent_id).await? {
            Some(agent) => agent,
            None => {
                tracing::info!(agent_id = %heartbeat.agent_id, "registering agent on first heartbeat");
                Agent::new(heartbeat.agent_id.clone(), heartbeat.agent_id.clone())
            }
        };

        agent.last_heartbeat = now;
        agent.last_active = now;
        if let Some(health) = heartbeat.health {
            agent.health = health;
        }
        for (key, value) in heartbeat.metadata {
            agent.metadata.insert(key, value);
        }
        if let Some(status) = heartbeat.status {
            agent.transition_to(status, now, "heartbeat");
        }

        self.store.upsert_agent(agent.clone()).await?;
        Ok(agent)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fb_core::store::MemoryStore;
    use fb_core::types::MAX_STATUS_HISTORY;

    fn engine() -> (StatusEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (StatusEngine::new(store.clone()), store)
    }

    #[tokio::test]
    async fn tool_call_moves_idle_agent_to_working() {
        let (engine, store) = engine();

        engine
            .on_activity("a1", &ActivityKind::ToolCall, 1500)
            .await
            .unwrap();

        let agent = store.get_agent("a1").await.unwrap().unwrap();
        assert_eq!(agent.status, AgentStatus::Working);
        assert_eq!(agent.tokens_used, 1500);
        assert_eq!(agent.status_history.len(), 1);
        let entry = &agent.status_history[0];
        assert_eq!(entry.status, AgentStatus::Idle);
        assert_eq!(entry.reason, "tool_call");
    }

    #[tokio::test]
    async fn classification_table() {
        assert_eq!(classify(&ActivityKind::Turn), Some(AgentStatus::Thinking));
        assert_eq!(classify(&ActivityKind::Thought), Some(AgentStatus::Thinking));
        assert_eq!(classify(&ActivityKind::ToolCall), Some(AgentStatus::Working));
        assert_eq!(classify(&ActivityKind::ApiCall), Some(AgentStatus::Working));
        assert_eq!(classify(&ActivityKind::Completion), Some(AgentStatus::Idle));
        assert_eq!(classify(&ActivityKind::Error), Some(AgentStatus::Idle));
        assert_eq!(classify(&ActivityKind::Heartbeat), None);
        assert_eq!(classify(&ActivityKind::Other("deploy".into())), None);
    }

    #[tokio::test]
    async fn unclassified_activity_keeps_status_but_counts_tokens() {
        let (engine, store) = engine();
        engine
            .on_activity("a1", &ActivityKind::ToolCall, 100)
            .await
            .unwrap();
        engine
            .on_activity("a1", &ActivityKind::Other("sync".into()), 50)
            .await
            .unwrap();

        let agent = store.get_agent("a1").await.unwrap().unwrap();
        assert_eq!(agent.status, AgentStatus::Working);
        assert_eq!(agent.tokens_used, 150);
        assert_eq!(agent.status_history.len(), 1);
    }

    #[tokio::test]
    async fn repeated_same_classification_records_no_self_transition() {
        let (engine, store) = engine();
        for _ in 0..5 {
            engine
                .on_activity("a1", &ActivityKind::ToolCall, 0)
                .await
                .unwrap();
        }
        let agent = store.get_agent("a1").await.unwrap().unwrap();
        assert_eq!(agent.status, AgentStatus::Working);
        assert_eq!(agent.status_history.len(), 1); // only Idle -> Working
    }

    #[tokio::test]
    async fn sixty_transitions_keep_bounded_history() {
        let (engine, store) = engine();
        for i in 0..60 {
            let kind = if i % 2 == 0 {
                ActivityKind::ToolCall
            } else {
                ActivityKind::Completion
            };
            engine.on_activity("a1", &kind, 0).await.unwrap();
        }
        let agent = store.get_agent("a1").await.unwrap().unwrap();
        assert!(agent.status_history.len() <= MAX_STATUS_HISTORY);
        // Most recent entries survive truncation.
        let last = agent.status_history.last().unwrap();
        assert!(last.reason == "tool_call" || last.reason == "completion");
    }

    #[tokio::test]
    async fn heartbeat_upserts_unknown_agent() {
        let (engine, store) = engine();
        let agent = engine.on_heartbeat(Heartbeat::new("fresh")).await.unwrap();
        assert_eq!(agent.status, AgentStatus::Idle);
        assert!(store.get_agent("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn heartbeat_status_is_authoritative() {
        let (engine, _store) = engine();
        // An activity would never produce Offline, but a heartbeat may.
        let agent = engine
            .on_heartbeat(Heartbeat::new("a1").with_status(AgentStatus::Offline))
            .await
            .unwrap();
        assert_eq!(agent.status, AgentStatus::Offline);
        assert_eq!(agent.status_history.len(), 1);
        assert_eq!(agent.status_history[0].reason, "heartbeat");
    }

    #[tokio::test]
    async fn heartbeat_merges_health_and_metadata() {
        let (engine, _store) = engine();
        let mut hb = Heartbeat::new("a1");
        hb.health = Some(serde_json::json!({"cpu": 0.4}));
        hb.metadata
            .insert("region".into(), serde_json::json!("us-east-1"));
        let agent = engine.on_heartbeat(hb).await.unwrap();
        assert_eq!(agent.health["cpu"], 0.4);
        assert_eq!(agent.metadata["region"], "us-east-1");

        // A later heartbeat without a health payload keeps the previous blob.
        let agent = engine.on_heartbeat(Heartbeat::new("a1")).await.unwrap();
        assert_eq!(agent.health["cpu"], 0.4);
    }

    #[tokio::test]
    async fn heartbeat_explicit_null_clears_health() {
        let (engine, _store) = engine();
        let mut hb = Heartbeat::new("a1");
        hb.health = Some(serde_json::json!({"cpu": 0.4}));
        engine.on_heartbeat(hb).await.unwrap();

        let mut clear = Heartbeat::new("a1");
        clear.health = Some(serde_json::Value::Null);
        let agent = engine.on_heartbeat(clear).await.unwrap();
        assert!(agent.health.is_null());
    }
}
