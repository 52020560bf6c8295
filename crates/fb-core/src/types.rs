use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ActivityKind
// ---------------------------------------------------------------------------

/// Classification of one unit of agent work.
///
/// Wire format is an open string; the known kinds below drive status
/// derivation, and anything else is preserved verbatim in `Other` so new
/// activity kinds are cheap to add without breaking ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityKind {
    Turn,
    Thought,
    ToolCall,
    ApiCall,
    Completion,
    Error,
    Heartbeat,
    StatusChange,
    Other(String),
}

impl ActivityKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActivityKind::Turn => "turn",
            ActivityKind::Thought => "thought",
            ActivityKind::ToolCall => "tool_call",
            ActivityKind::ApiCall => "api_call",
            ActivityKind::Completion => "completion",
            ActivityKind::Error => "error",
            ActivityKind::Heartbeat => "heartbeat",
            ActivityKind::StatusChange => "status_change",
            ActivityKind::Other(s) => s.as_str(),
        }
    }
}

impl From<&str> for ActivityKind {
    fn from(s: &str) -> Self {
        match s {
            "turn" => ActivityKind::Turn,
            "thought" => ActivityKind::Thought,
            "tool_call" => ActivityKind::ToolCall,
            "api_call" => ActivityKind::ApiCall,
            "completion" => ActivityKind::Completion,
            "error" => ActivityKind::Error,
            "heartbeat" => ActivityKind::Heartbeat,
            "status_change" => ActivityKind::StatusChange,
            other => ActivityKind::Other(other.to_string()),
        }
    }
}

impl From<String> for ActivityKind {
    fn from(s: String) -> Self {
        ActivityKind::from(s.as_str())
    }
}

impl From<ActivityKind> for String {
    fn from(kind: ActivityKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for ActivityKind {
    fn default() -> Self {
        ActivityKind::Other(String::new())
    }
}

// ---------------------------------------------------------------------------
// AgentStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Idle,
    Thinking,
    Working,
    Offline,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Thinking => "thinking",
            AgentStatus::Working => "working",
            AgentStatus::Offline => "offline",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// StatusHistoryEntry
// ---------------------------------------------------------------------------

/// One closed-out entry in an agent's bounded status history.
///
/// Records the status the agent is *leaving*, when it was entered, and how
/// long it was held. Appended only when the status actually changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: AgentStatus,
    pub entered_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub reason: String,
}

/// Upper bound on the diagnostic status history kept per agent.
pub const MAX_STATUS_HISTORY: usize = 50;

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub agent_type: String,
    pub status: AgentStatus,
    pub tokens_available: u64,
    pub tokens_used: u64,
    pub last_heartbeat: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    /// Changes only together with `status` (atomic pair).
    pub current_status_since: DateTime<Utc>,
    pub status_history: Vec<StatusHistoryEntry>,
    pub health: serde_json::Value,
    pub config: serde_json::Value,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Agent {
    /// Create a freshly registered agent starting in `Idle`.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            agent_type: "worker".to_string(),
            status: AgentStatus::Idle,
            tokens_available: 0,
            tokens_used: 0,
            last_heartbeat: now,
            last_active: now,
            current_status_since: now,
            status_history: Vec::new(),
            health: serde_json::Value::Null,
            config: serde_json::Value::Null,
            metadata: HashMap::new(),
        }
    }

    /// Close out the current status and move to `next`, recording a bounded
    /// history entry. No-op when `next` equals the current status.
    pub fn transition_to(&mut self, next: AgentStatus, now: DateTime<Utc>, reason: &str) {
        if next == self.status {
            return;
        }
        let held_ms = now
            .signed_duration_since(self.current_status_since)
            .num_milliseconds()
            .max(0) as u64;
        self.status_history.push(StatusHistoryEntry {
            status: self.status,
            entered_at: self.current_status_since,
            duration_ms: held_ms,
            reason: reason.to_string(),
        });
        if self.status_history.len() > MAX_STATUS_HISTORY {
            let excess = self.status_history.len() - MAX_STATUS_HISTORY;
            self.status_history.drain(..excess);
        }
        tracing::debug!(
            agent_id = %self.id,
            from = %self.status,
            to = %next,
            reason = reason,
            "agent status transition"
        );
        self.status = next;
        self.current_status_since = now;
    }
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

/// A periodic liveness self-report from an agent.
///
/// Unlike activities, a heartbeat's `status` is authoritative: it may set any
/// status directly, bypassing the activity classification table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub agent_id: String,
    pub status: Option<AgentStatus>,
    /// `None` means the report carries no health payload and the agent's
    /// stored blob is kept; `Some(Value::Null)` explicitly clears it.
    #[serde(default)]
    pub health: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Heartbeat {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            status: None,
            health: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = Some(status);
        self
    }
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

/// An immutable record of one unit of agent work.
///
/// `total_tokens` and the cost triple are always derived at append time and
/// never trusted from callers. Cost fields are present iff a model name is
/// set and at least one token count is nonzero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub agent_id: String,
    pub kind: ActivityKind,
    pub description: String,
    pub input: Option<String>,
    pub output: Option<String>,
    /// Structured request/response/headers/metadata blob, stored verbatim.
    pub content_parts: Option<serde_json::Value>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cache_hits: u64,
    pub tool_name: Option<String>,
    pub tool_input: Option<String>,
    pub tool_output: Option<String>,
    pub api_endpoint: Option<String>,
    pub api_method: Option<String>,
    pub api_status_code: Option<u16>,
    pub duration_ms: Option<u64>,
    pub ticket_id: Option<Uuid>,
    pub parent_activity_id: Option<Uuid>,
    pub trace_id: Option<String>,
    pub session_id: Option<String>,
    pub request_id: Option<String>,
    pub model: Option<String>,
    pub cost_input: Option<f64>,
    pub cost_output: Option<f64>,
    pub cost_total: Option<f64>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    /// A minimal activity with derived fields zeroed; the ledger fills in
    /// tokens, cost, and chaining during append.
    pub fn new(agent_id: impl Into<String>, kind: ActivityKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            kind,
            description: String::new(),
            input: None,
            output: None,
            content_parts: None,
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            cache_hits: 0,
            tool_name: None,
            tool_input: None,
            tool_output: None,
            api_endpoint: None,
            api_method: None,
            api_status_code: None,
            duration_ms: None,
            ticket_id: None,
            parent_activity_id: None,
            trace_id: None,
            session_id: None,
            request_id: None,
            model: None,
            cost_input: None,
            cost_output: None,
            cost_total: None,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// ActivityDraft
// ---------------------------------------------------------------------------

/// Caller-supplied input for one ledger append.
///
/// Token counts are optional; missing counts are estimated from the text
/// payloads. `total_tokens` is intentionally absent — it is always derived.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityDraft {
    pub agent_id: String,
    pub kind: ActivityKind,
    #[serde(default)]
    pub description: String,
    pub input: Option<String>,
    pub output: Option<String>,
    pub content_parts: Option<serde_json::Value>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub cache_hits: u64,
    pub tool_name: Option<String>,
    pub tool_input: Option<String>,
    pub tool_output: Option<String>,
    pub api_endpoint: Option<String>,
    pub api_method: Option<String>,
    pub api_status_code: Option<u16>,
    pub duration_ms: Option<u64>,
    pub ticket_id: Option<Uuid>,
    pub parent_activity_id: Option<Uuid>,
    pub trace_id: Option<String>,
    pub session_id: Option<String>,
    pub request_id: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ActivityDraft {
    pub fn new(agent_id: impl Into<String>, kind: ActivityKind) -> Self {
        Self {
            agent_id: agent_id.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn with_tokens(mut self, input: u64, output: u64) -> Self {
        self.input_tokens = Some(input);
        self.output_tokens = Some(output);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_ticket(mut self, ticket_id: Uuid) -> Self {
        self.ticket_id = Some(ticket_id);
        self
    }

    pub fn with_trace(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

// ---------------------------------------------------------------------------
// ActivityPatch
// ---------------------------------------------------------------------------

/// The single follow-up update an activity may receive, e.g. attaching
/// output once a long-running tool call finishes.
///
/// Only the fields here are replaceable; metadata is shallow-merged. A new
/// `output_tokens` triggers recomputation of `total_tokens` and cost from the
/// *stored* input tokens, never from caller-supplied totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityPatch {
    pub output: Option<String>,
    pub output_tokens: Option<u64>,
    pub duration_ms: Option<u64>,
    pub api_status_code: Option<u16>,
    pub tool_output: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// TicketStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Backlog,
    Assigned,
    InProgress,
    Review,
    Done,
}

impl TicketStatus {
    /// Returns `true` when a board transition from `self` to `target` is
    /// allowed. The observed rule set is deliberately permissive: any column
    /// to any column, except that entering `Assigned` requires an assignee.
    pub fn can_transition_to(&self, target: &TicketStatus, has_assignee: bool) -> bool {
        if *target == TicketStatus::Assigned && !has_assignee {
            return false;
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Ticket
// ---------------------------------------------------------------------------

/// A board work item. This engine only owns the two monotone token counters;
/// the Kanban lifecycle itself belongs to the surrounding CRUD layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub title: String,
    pub status: TicketStatus,
    pub assignee: Option<String>,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            status: TicketStatus::Backlog,
            assignee: None,
            total_input_tokens: 0,
            total_output_tokens: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
