//! Pricing resolution, cost calculation, and token estimation.
//!
//! The resolver turns free-text model names into per-1K-token price pairs
//! (never failing; resolution order documented on [`PricingTable`]); the
//! calculator is a pure function over token counts; the estimator fills in
//! token counts the caller omitted, from text or structured payloads.

pub mod cost;
pub mod estimator;
pub mod pricing;

pub use cost::{calculate_cost, format_cost, CostBreakdown};
pub use estimator::{ContentClass, EstimatorConfig, TokenEstimator};
pub use pricing::{PricingEntry, PricingTable};
