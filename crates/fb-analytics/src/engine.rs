use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc};
use fb_core::store::{ActivityFilter, ActivityStore, StoreError};

use crate::aggregate::{
    compare_periods, daily_trend, group_totals, window_totals, Dimension, GroupedTotals,
    PeriodDelta, TrendPoint, UsageTotals,
};
use crate::anomaly::{detect_anomalies, AnomalyConfig, CostAnomaly};
use crate::forecast::{forecast_month, BudgetForecast, BudgetParams};

// ---------------------------------------------------------------------------
// AnalyticsEngine
// ---------------------------------------------------------------------------

/// Read-side analytics over the activity ledger.
///
/// Every query rescans the store through [`ActivityStore::list_activities`];
/// nothing here is cached or materialized, so results always reflect the
/// ledger as of the call.
pub struct AnalyticsEngine {
    store: Arc<dyn ActivityStore>,
    anomaly_config: AnomalyConfig,
}

impl AnalyticsEngine {
    pub fn new(store: Arc<dyn ActivityStore>) -> Self {
        Self {
            store,
            anomaly_config: AnomalyConfig::default(),
        }
    }

    pub fn with_anomaly_config(mut self, config: AnomalyConfig) -> Self {
        self.anomaly_config = config;
        self
    }

    fn window_filter(since: DateTime<Utc>, until: DateTime<Utc>) -> ActivityFilter {
        ActivityFilter::all().between(since, until)
    }

    /// Ungrouped totals over `[since, until)`.
    pub async fn usage_totals(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<UsageTotals, StoreError> {
        let activities = self
            .store
            .list_activities(&Self::window_filter(since, until))
            .await?;
        Ok(window_totals(&activities))
    }

    /// Totals over `[since, until)` grouped along one dimension, ordered by
    /// cost descending.
    pub async fn usage_by(
        &self,
        dimension: Dimension,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<GroupedTotals>, StoreError> {
        let activities = self
            .store
            .list_activities(&Self::window_filter(since, until))
            .await?;
        Ok(group_totals(&activities, dimension))
    }

    /// Per-day series over the trailing `days` ending now.
    pub async fn trend(&self, days: u32) -> Result<Vec<TrendPoint>, StoreError> {
        let until = Utc::now();
        let since = until - Duration::days(days as i64);
        let activities = self
            .store
            .list_activities(&Self::window_filter(since, until))
            .await?;
        Ok(daily_trend(&activities))
    }

    /// Compare the trailing `days` window against the one immediately before
    /// it, grouped along `dimension`.
    pub async fn compare(
        &self,
        dimension: Dimension,
        days: u32,
    ) -> Result<Vec<PeriodDelta>, StoreError> {
        let until = Utc::now();
        let split = until - Duration::days(days as i64);
        let since = split - Duration::days(days as i64);

        let current = self
            .store
            .list_activities(&Self::window_filter(split, until))
            .await?;
        let previous = self
            .store
            .list_activities(&Self::window_filter(since, split))
            .await?;
        Ok(compare_periods(&current, &previous, dimension))
    }

    /// Scan the trailing `days` window for cost anomalies, ordered critical
    /// first.
    pub async fn anomalies(&self, days: u32) -> Result<Vec<CostAnomaly>, StoreError> {
        let until = Utc::now();
        let since = until - Duration::days(days as i64);
        let activities = self
            .store
            .list_activities(&Self::window_filter(since, until))
            .await?;
        let anomalies = detect_anomalies(&activities, days, &self.anomaly_config);
        if !anomalies.is_empty() {
            tracing::info!(count = anomalies.len(), window_days = days, "cost anomalies detected");
        }
        Ok(anomalies)
    }

    /// Project current-month spend against a budget.
    pub async fn budget_forecast(&self, params: BudgetParams) -> Result<BudgetForecast, StoreError> {
        let now = Utc::now();
        let month_start = now
            .date_naive()
            .with_day(1)
            .unwrap_or_else(|| now.date_naive())
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc();
        let days_in_month = days_in_month(now.year(), now.month());

        let spent = self.usage_totals(month_start, now).await?.cost;
        Ok(forecast_month(spent, now.day(), days_in_month, params))
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
            if leap {
                29
            } else {
                28
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use fb_core::store::MemoryStore;
    use fb_core::types::{Activity, ActivityKind};

    async fn seed(store: &MemoryStore, agent: &str, model: &str, cost: f64, age: Duration) {
        let mut a = Activity::new(agent, ActivityKind::ApiCall);
        a.model = Some(model.to_string());
        a.input_tokens = 100;
        a.output_tokens = 50;
        a.total_tokens = 150;
        a.cost_total = Some(cost);
        a.created_at = Utc::now() - age;
        store.insert_activity(a).await.unwrap();
    }

    #[tokio::test]
    async fn usage_totals_respect_window() {
        let store = MemoryStore::new();
        seed(&store, "a1", "gpt-4", 1.0, Duration::hours(1)).await;
        seed(&store, "a1", "gpt-4", 1.0, Duration::days(10)).await;

        let engine = AnalyticsEngine::new(Arc::new(store));
        let totals = engine
            .usage_totals(Utc::now() - Duration::days(7), Utc::now())
            .await
            .unwrap();
        assert_eq!(totals.activity_count, 1);
        assert!((totals.cost - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn usage_by_model_ranks_by_cost() {
        let store = MemoryStore::new();
        seed(&store, "a1", "gpt-4", 0.10, Duration::hours(1)).await;
        seed(&store, "a2", "claude-3-opus", 0.50, Duration::hours(2)).await;

        let engine = AnalyticsEngine::new(Arc::new(store));
        let groups = engine
            .usage_by(Dimension::Model, Utc::now() - Duration::days(1), Utc::now())
            .await
            .unwrap();
        assert_eq!(groups[0].key, "claude-3-opus");
    }

    #[tokio::test]
    async fn compare_splits_adjacent_windows() {
        let store = MemoryStore::new();
        seed(&store, "a1", "gpt-4", 0.30, Duration::days(1)).await;
        seed(&store, "a1", "gpt-4", 0.20, Duration::days(8)).await;

        let engine = AnalyticsEngine::new(Arc::new(store));
        let deltas = engine.compare(Dimension::Model, 7).await.unwrap();
        assert_eq!(deltas.len(), 1);
        assert!((deltas[0].cost_change_pct - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn anomalies_surface_spike_days() {
        let store = MemoryStore::new();
        for day in 1..=4 {
            seed(&store, "a1", "gpt-4", 2.0, Duration::days(day)).await;
        }
        seed(&store, "a1", "gpt-4", 80.0, Duration::hours(2)).await;

        let engine = AnalyticsEngine::new(Arc::new(store));
        let anomalies = engine.anomalies(7).await.unwrap();
        assert!(!anomalies.is_empty());
        assert!((anomalies[0].observed - 80.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn budget_forecast_counts_month_to_date_spend() {
        let store = MemoryStore::new();
        seed(&store, "a1", "gpt-4", 5.0, Duration::minutes(1)).await;

        let engine = AnalyticsEngine::new(Arc::new(store));
        let forecast = engine
            .budget_forecast(BudgetParams {
                monthly_budget: 10_000.0,
                daily_budget: 500.0,
            })
            .await
            .unwrap();
        assert!(forecast.spent_to_date >= 5.0 - 1e-9);
        assert!(!forecast.at_risk);
    }

    #[test]
    fn february_day_counts() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2026, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2026, 8), 31);
    }
}
