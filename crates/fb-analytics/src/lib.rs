//! Derived analytics over the activity ledger: usage rollups, trend series,
//! period comparison, budget forecasting, and cost-anomaly detection.
//!
//! Everything here is computed on read from the stored activities. There are
//! no materialized aggregates to drift out of sync with the ledger.

pub mod aggregate;
pub mod anomaly;
pub mod engine;
pub mod forecast;

pub use aggregate::{
    compare_periods, daily_trend, group_totals, window_totals, Dimension, GroupedTotals,
    PeriodDelta, TrendPoint, UsageTotals,
};
pub use anomaly::{
    detect_anomalies, detect_budget_threshold, detect_spikes, detect_unusual_models, AnomalyConfig,
    AnomalyKind, CostAnomaly, Severity,
};
pub use engine::AnalyticsEngine;
pub use forecast::{forecast_month, BudgetForecast, BudgetParams};
