//! Agent status derivation: the activity-driven status engine and the
//! stale-heartbeat reconciler.
//!
//! The two write paths are deliberately different in authority: activities
//! are inferred signals routed through a classification table, heartbeats
//! are authoritative self-reports that may set any status directly. The
//! reconciler is the only path that can force OFFLINE without a heartbeat
//! saying so, and the display-time status readers see is recomputed from
//! heartbeat recency rather than read straight from storage.

pub mod heartbeat;
pub mod status;

pub use heartbeat::{effective_status, HeartbeatReconciler, ReconcilerConfig};
pub use status::{classify, StatusEngine};
