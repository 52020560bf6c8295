use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::types::{Activity, Agent, Ticket};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("storage backend error: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// ActivityFilter
// ---------------------------------------------------------------------------

/// Predicate for activity scans. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub agent_id: Option<String>,
    pub ticket_id: Option<Uuid>,
    pub model: Option<String>,
    pub trace_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl ActivityFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn for_ticket(mut self, ticket_id: Uuid) -> Self {
        self.ticket_id = Some(ticket_id);
        self
    }

    pub fn for_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn for_trace(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Half-open time window: `since <= created_at < until`.
    pub fn between(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    pub fn matches(&self, activity: &Activity) -> bool {
        if let Some(agent_id) = &self.agent_id {
            if &activity.agent_id != agent_id {
                return false;
            }
        }
        if let Some(ticket_id) = &self.ticket_id {
            if activity.ticket_id.as_ref() != Some(ticket_id) {
                return false;
            }
        }
        if let Some(model) = &self.model {
            if activity.model.as_ref() != Some(model) {
                return false;
            }
        }
        if let Some(trace_id) = &self.trace_id {
            if activity.trace_id.as_ref() != Some(trace_id) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if activity.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if activity.created_at >= until {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Store traits — the persistence collaborator boundary
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn insert_activity(&self, activity: Activity) -> Result<(), StoreError>;
    async fn get_activity(&self, id: Uuid) -> Result<Option<Activity>, StoreError>;
    /// Full-record replacement; errors when the activity does not exist.
    async fn update_activity(&self, activity: Activity) -> Result<(), StoreError>;
    /// Administrative removal. Does not reverse ticket-counter or status
    /// side effects. Returns `true` when a record was removed.
    async fn delete_activity(&self, id: Uuid) -> Result<bool, StoreError>;
    /// Matching activities ordered by `created_at` ascending.
    async fn list_activities(&self, filter: &ActivityFilter) -> Result<Vec<Activity>, StoreError>;
}

#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn upsert_agent(&self, agent: Agent) -> Result<(), StoreError>;
    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, StoreError>;
    async fn list_agents(&self) -> Result<Vec<Agent>, StoreError>;
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn upsert_ticket(&self, ticket: Ticket) -> Result<(), StoreError>;
    async fn get_ticket(&self, id: Uuid) -> Result<Option<Ticket>, StoreError>;
    /// Increment the ticket's monotone token counters.
    async fn add_ticket_tokens(
        &self,
        id: Uuid,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<(), StoreError>;
}

/// The full persistence surface the engine writes through.
pub trait FleetStore: ActivityStore + AgentStore + TicketStore {}

impl<T: ActivityStore + AgentStore + TicketStore> FleetStore for T {}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory reference store backing tests and single-process deployments.
///
/// Durable backends implement the same traits; the engine never assumes more
/// than the trait contracts.
#[derive(Clone, Default)]
pub struct MemoryStore {
    activities: Arc<RwLock<HashMap<Uuid, Activity>>>,
    agents: Arc<RwLock<HashMap<String, Agent>>>,
    tickets: Arc<RwLock<HashMap<Uuid, Ticket>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn insert_activity(&self, activity: Activity) -> Result<(), StoreError> {
        let mut activities = self.activities.write().await;
        activities.insert(activity.id, activity);
        Ok(())
    }

    async fn get_activity(&self, id: Uuid) -> Result<Option<Activity>, StoreError> {
        Ok(self.activities.read().await.get(&id).cloned())
    }

    async fn update_activity(&self, activity: Activity) -> Result<(), StoreError> {
        let mut activities = self.activities.write().await;
        if !activities.contains_key(&activity.id) {
            return Err(StoreError::NotFound {
                entity: "activity",
                id: activity.id.to_string(),
            });
        }
        activities.insert(activity.id, activity);
        Ok(())
    }

    async fn delete_activity(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.activities.write().await.remove(&id).is_some())
    }

    async fn list_activities(&self, filter: &ActivityFilter) -> Result<Vec<Activity>, StoreError> {
        let activities = self.activities.read().await;
        let mut matched: Vec<Activity> = activities
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matched)
    }
}

#[async_trait]
impl AgentStore for MemoryStore {
    async fn upsert_agent(&self, agent: Agent) -> Result<(), StoreError> {
        let mut agents = self.agents.write().await;
        agents.insert(agent.id.clone(), agent);
        Ok(())
    }

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, StoreError> {
        Ok(self.agents.read().await.get(id).cloned())
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        let agents = self.agents.read().await;
        let mut all: Vec<Agent> = agents.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn upsert_ticket(&self, ticket: Ticket) -> Result<(), StoreError> {
        let mut tickets = self.tickets.write().await;
        tickets.insert(ticket.id, ticket);
        Ok(())
    }

    async fn get_ticket(&self, id: Uuid) -> Result<Option<Ticket>, StoreError> {
        Ok(self.tickets.read().await.get(&id).cloned())
    }

    async fn add_ticket_tokens(
        &self,
        id: Uuid,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<(), StoreError> {
        let mut tickets = self.tickets.write().await;
        let ticket = tickets.get_mut(&id).ok_or_else(|| StoreError::NotFound {
            entity: "ticket",
            id: id.to_string(),
        })?;
        ticket.total_input_tokens += input_tokens;
        ticket.total_output_tokens += output_tokens;
        ticket.updated_at = Utc::now();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
