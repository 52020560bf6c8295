//! Core domain types and persistence boundary for the fleetboard telemetry
//! engine.
//!
//! Everything the engine persists flows through the async store traits in
//! [`store`]; a single-process [`store::MemoryStore`] reference implementation
//! backs tests and small deployments, and durable backends plug in behind the
//! same traits. [`trace::TraceRegistry`] holds the best-effort in-memory
//! trace-to-head-activity map used for causal chaining.

pub mod store;
pub mod trace;
pub mod types;

pub use store::{
    ActivityFilter, ActivityStore, AgentStore, FleetStore, MemoryStore, StoreError, TicketStore,
};
pub use trace::TraceRegistry;
pub use types::{
    Activity, ActivityDraft, ActivityKind, ActivityPatch, Agent, AgentStatus, Heartbeat,
    StatusHistoryEntry, Ticket, TicketStatus, MAX_STATUS_HISTORY,
};
