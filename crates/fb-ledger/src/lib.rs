//! The activity ledger: append-only ingest of agent work with derived token
//! counts, cost, causal chaining, ticket accounting, and status notification.

pub mod ledger;

pub use ledger::{ActivityLedger, LedgerError};
